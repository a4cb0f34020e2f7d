use anyhow::{bail, Context, Result};
use comfy_table::{presets::UTF8_FULL, Table};
use raffle_core::{
    Amount, InMemoryBank, Keeper, KeeperOutcome, ManualClock, MockCoordinator, Network,
    ParticipantId, Raffle, RaffleConfig, RaffleError, RaffleEvent, Settlement,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

fn parse_network(name: &str) -> Result<Network> {
    name.parse::<Network>()
        .with_context(|| format!("unsupported network '{}'", name))
}

/// Counts events until the raffle is dropped, including any the receiver lagged past.
async fn count_events(mut events: broadcast::Receiver<RaffleEvent>) -> usize {
    let mut seen = 0usize;
    loop {
        match events.recv().await {
            Ok(event) => {
                seen += 1;
                if let RaffleEvent::WinnerPicked { winner, payout, .. } = &event {
                    tracing::info!(
                        "Event: round {} won by {}, {} wei",
                        event.round_number(),
                        winner,
                        payout
                    );
                }
            }
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!("Event listener lagged, {} events missed", missed);
                seen += missed as usize;
            }
            Err(RecvError::Closed) => break,
        }
    }
    seen
}

pub async fn simulate(
    network: &str,
    players: usize,
    rounds: usize,
    fail_first_payout: bool,
    snapshot: Option<&Path>,
) -> Result<()> {
    let network = parse_network(network)?;
    if !network.is_local() {
        bail!("simulation only runs on local networks, got {}", network);
    }
    if players == 0 {
        bail!("need at least one player per round");
    }

    let config = RaffleConfig::from_env(network)?;
    let interval = chrono::Duration::from_std(config.interval)?;
    let coordinator = Arc::new(MockCoordinator::with_seed(
        config.oracle.coordinator.clone(),
        [0x5a; 32],
    ));
    let bank = Arc::new(InMemoryBank::new());
    let clock = Arc::new(ManualClock::default());
    let raffle = Arc::new(Raffle::new(
        config.clone(),
        coordinator.clone(),
        bank.clone(),
        clock.clone(),
    )?);
    let keeper = Keeper::new(raffle.clone(), Duration::from_secs(1));

    let listener = tokio::spawn(count_events(raffle.subscribe()));

    println!("Raffle {} on {}", raffle.id(), network);
    println!("Entrance fee: {} wei", config.entrance_fee);
    println!("Interval: {}s", config.interval.as_secs());
    println!();

    let mut settlements: Vec<Settlement> = Vec::new();
    for round in 1..=rounds {
        for i in 0..players {
            let participant = ParticipantId::new(format!("player-{}-{}", round, i));
            raffle.enter(participant, config.entrance_fee).await?;
        }

        clock.advance(interval + chrono::Duration::seconds(1));
        let request_id = match keeper.poll_once().await {
            KeeperOutcome::Performed(request_id) => request_id,
            other => bail!("round {} did not close: {:?}", round, other),
        };

        let fail_this_round = fail_first_payout && round == 1;
        if fail_this_round {
            bank.set_rejecting(true);
        }

        let settlement = match coordinator
            .fulfill_random_words(request_id, raffle.as_ref())
            .await
        {
            Ok(settlement) => settlement,
            Err(RaffleError::TransferFailed(reason)) => {
                println!("Round {}: payout failed ({}), retrying", round, reason);
                bank.set_rejecting(false);
                raffle.retry_payout().await?
            }
            Err(e) => return Err(e.into()),
        };
        settlements.push(settlement);
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Round", "Request", "Entrants", "Winner", "Payout (wei)", "Winner balance"]);
    for s in &settlements {
        table.add_row(vec![
            s.round_number.to_string(),
            s.request_id.to_string(),
            s.entrants.to_string(),
            s.winner.to_string(),
            s.payout.to_string(),
            bank.balance_of(&s.winner).to_string(),
        ]);
    }
    println!("{table}");

    let total = settlements
        .iter()
        .fold(Amount::ZERO, |acc, s| acc.checked_add(s.payout).unwrap_or(acc));
    println!("Total paid out: {} wei", total);
    println!("Bank total: {} wei", bank.total_paid());

    if let Some(path) = snapshot {
        raffle.export_snapshot(path).await?;
        println!("Snapshot written to {}", path.display());
    }

    drop(keeper);
    drop(raffle);
    let seen = listener.await?;
    println!("Events observed: {}", seen);

    Ok(())
}

pub fn show_config(network: &str, json: bool) -> Result<()> {
    let network = parse_network(network)?;
    let config = RaffleConfig::new(network);

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Setting", "Value"]);
    table.add_row(vec!["Network".to_string(), network.to_string()]);
    table.add_row(vec!["Chain ID".to_string(), network.chain_id().to_string()]);
    table.add_row(vec![
        "Block confirmations".to_string(),
        network.block_confirmations().to_string(),
    ]);
    table.add_row(vec![
        "Entrance fee (wei)".to_string(),
        config.entrance_fee.to_string(),
    ]);
    table.add_row(vec![
        "Interval (s)".to_string(),
        config.interval.as_secs().to_string(),
    ]);
    table.add_row(vec!["Coordinator".to_string(), config.oracle.coordinator.clone()]);
    table.add_row(vec!["Key hash".to_string(), config.oracle.key_hash.clone()]);
    table.add_row(vec![
        "Subscription".to_string(),
        config.oracle.subscription_id.to_string(),
    ]);
    table.add_row(vec![
        "Callback gas limit".to_string(),
        config.oracle.callback_gas_limit.to_string(),
    ]);
    table.add_row(vec![
        "Request confirmations".to_string(),
        config.oracle.request_confirmations.to_string(),
    ]);
    table.add_row(vec!["Words".to_string(), config.oracle.num_words.to_string()]);
    println!("{table}");

    if let Err(e) = config.validate() {
        println!("Warning: {}", e);
    }

    Ok(())
}
