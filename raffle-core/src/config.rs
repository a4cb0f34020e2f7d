use crate::error::{RaffleError, Result};
use crate::types::Amount;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Networks the raffle ships presets for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Localhost,
    Ganache,
    Sepolia,
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Localhost => 31337,
            Network::Ganache => 5777,
            Network::Sepolia => 11155111,
        }
    }

    pub fn block_confirmations(&self) -> u64 {
        match self {
            Network::Localhost | Network::Ganache => 1,
            Network::Sepolia => 6,
        }
    }

    /// Local networks run against the mock coordinator.
    pub fn is_local(&self) -> bool {
        matches!(self, Network::Localhost | Network::Ganache)
    }
}

impl std::str::FromStr for Network {
    type Err = RaffleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "localhost" | "hardhat" => Ok(Network::Localhost),
            "ganache" => Ok(Network::Ganache),
            "sepolia" => Ok(Network::Sepolia),
            other => Err(RaffleError::config(format!("Unknown network: {}", other))),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Network::Localhost => "localhost",
            Network::Ganache => "ganache",
            Network::Sepolia => "sepolia",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaffleConfig {
    pub network: Network,
    pub entrance_fee: Amount,
    /// Minimum time between settlements.
    pub interval: Duration,
    pub oracle: OracleConfig,
}

/// Fixed parameters attached to every randomness request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Identity of the only caller allowed to deliver randomness.
    pub coordinator: String,
    /// Gas lane, hex encoded 32 bytes.
    pub key_hash: String,
    pub subscription_id: u64,
    pub callback_gas_limit: u32,
    pub request_confirmations: u16,
    pub num_words: u32,
}

pub const LOCAL_COORDINATOR: &str = "vrf-coordinator-mock";

const GAS_LANE_150_GWEI: &str =
    "0x787d74caea10b2b357790d5b5247c2f63d1d91572a9846f780606e4d953677ae";

impl Default for RaffleConfig {
    fn default() -> Self {
        Self {
            network: Network::Localhost,
            entrance_fee: Amount::from_ether_fraction(100), // 0.01 ETH
            interval: Duration::from_secs(30),
            oracle: OracleConfig {
                coordinator: LOCAL_COORDINATOR.to_string(),
                key_hash: GAS_LANE_150_GWEI.to_string(),
                subscription_id: 1,
                callback_gas_limit: 500_000,
                request_confirmations: 1,
                num_words: 1,
            },
        }
    }
}

impl RaffleConfig {
    pub fn new(network: Network) -> Self {
        let mut config = Self::default();
        config.network = network;

        match network {
            Network::Sepolia => {
                config.oracle.coordinator =
                    "0x9DdfaCa8183c41ad55329BdeeD9F6A8d53168B1B".to_string();
                // must be created and funded per deployment
                config.oracle.subscription_id = 0;
                config.oracle.request_confirmations = 3;
            }
            Network::Localhost | Network::Ganache => {
                // keep defaults for local chains
            }
        }

        config
    }

    /// Preset for `network` with `RAFFLE_*` environment overrides applied.
    pub fn from_env(network: Network) -> Result<Self> {
        let mut config = Self::new(network);

        if let Ok(fee) = std::env::var("RAFFLE_ENTRANCE_FEE_WEI") {
            config.entrance_fee = Amount::from_wei(parse_var("RAFFLE_ENTRANCE_FEE_WEI", &fee)?);
        }
        if let Ok(secs) = std::env::var("RAFFLE_INTERVAL_SECS") {
            config.interval = Duration::from_secs(parse_var("RAFFLE_INTERVAL_SECS", &secs)?);
        }
        if let Ok(coordinator) = std::env::var("RAFFLE_COORDINATOR") {
            config.oracle.coordinator = coordinator;
        }
        if let Ok(key_hash) = std::env::var("RAFFLE_KEY_HASH") {
            config.oracle.key_hash = key_hash;
        }
        if let Ok(sub_id) = std::env::var("RAFFLE_SUBSCRIPTION_ID") {
            config.oracle.subscription_id = parse_var("RAFFLE_SUBSCRIPTION_ID", &sub_id)?;
        }
        if let Ok(gas) = std::env::var("RAFFLE_CALLBACK_GAS_LIMIT") {
            config.oracle.callback_gas_limit = parse_var("RAFFLE_CALLBACK_GAS_LIMIT", &gas)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.entrance_fee.is_zero() {
            return Err(RaffleError::config("Entrance fee must be greater than 0"));
        }

        if self.interval.is_zero() {
            return Err(RaffleError::config("Interval must be greater than 0"));
        }

        if self.oracle.coordinator.is_empty() {
            return Err(RaffleError::config("Coordinator cannot be empty"));
        }

        let key_hash = self
            .oracle
            .key_hash
            .strip_prefix("0x")
            .unwrap_or(&self.oracle.key_hash);
        match hex::decode(key_hash) {
            Ok(bytes) if bytes.len() == 32 => {}
            _ => return Err(RaffleError::config("Key hash must be 32 hex-encoded bytes")),
        }

        if self.oracle.callback_gas_limit == 0 {
            return Err(RaffleError::config("Callback gas limit must be greater than 0"));
        }

        if self.oracle.request_confirmations == 0 {
            return Err(RaffleError::config(
                "Request confirmations must be greater than 0",
            ));
        }

        // one word picks one winner
        if self.oracle.num_words != 1 {
            return Err(RaffleError::config("Exactly one random word is requested"));
        }

        if !self.network.is_local() && self.oracle.subscription_id == 0 {
            return Err(RaffleError::config(format!(
                "Subscription id must be set for {}",
                self.network
            )));
        }

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RaffleError::config(format!("Invalid value for {}: {}", name, value)))
}
