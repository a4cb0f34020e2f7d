use serde::{Deserialize, Serialize};

/// Which of the upkeep conditions currently hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpkeepDiagnostic {
    pub time_passed: bool,
    pub is_open: bool,
    pub has_players: bool,
    pub has_balance: bool,
}

impl UpkeepDiagnostic {
    pub fn is_ready(&self) -> bool {
        self.time_passed && self.is_open && self.has_players && self.has_balance
    }
}

/// Result of polling the automation check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpkeepCheck {
    pub upkeep_needed: bool,
    pub diagnostic: UpkeepDiagnostic,
    /// Opaque payload handed back to `perform_upkeep`; JSON of the diagnostic.
    pub perform_data: Vec<u8>,
}

impl UpkeepCheck {
    pub fn from_diagnostic(diagnostic: UpkeepDiagnostic) -> Self {
        let perform_data = serde_json::to_vec(&diagnostic).unwrap_or_default();
        Self {
            upkeep_needed: diagnostic.is_ready(),
            diagnostic,
            perform_data,
        }
    }
}
