// =============================================================================
// Shared types used across the options signal engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Whether orders are simulated locally or submitted to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradingMode {
    Paper,
    Live,
}

impl Default for TradingMode {
    fn default() -> Self {
        Self::Paper
    }
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Paper => write!(f, "Paper"),
            Self::Live => write!(f, "Live"),
        }
    }
}

/// Option side for entries and instrument resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionSide {
    Call,
    Put,
}

impl OptionSide {
    /// Exchange instrument-type code: "CE" for calls, "PE" for puts.
    pub fn instrument_type(&self) -> &'static str {
        match self {
            Self::Call => "CE",
            Self::Put => "PE",
        }
    }
}

impl std::fmt::Display for OptionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "CALL"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

/// Which open positions an exit signal closes.
///
/// `AllPositions` reproduces the original behavior of this strategy: any exit
/// signal flattens every open position, whichever side opened it.
/// `MatchingSide` restricts the exit to positions whose instrument type (CE
/// or PE) matches the side whose exit rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitScope {
    AllPositions,
    MatchingSide,
}

impl Default for ExitScope {
    fn default() -> Self {
        Self::AllPositions
    }
}

impl std::fmt::Display for ExitScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllPositions => write!(f, "AllPositions"),
            Self::MatchingSide => write!(f, "MatchingSide"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instrument_type_codes() {
        assert_eq!(OptionSide::Call.instrument_type(), "CE");
        assert_eq!(OptionSide::Put.instrument_type(), "PE");
    }

    #[test]
    fn defaults_are_safe() {
        assert_eq!(TradingMode::default(), TradingMode::Paper);
        assert_eq!(ExitScope::default(), ExitScope::AllPositions);
    }
}
