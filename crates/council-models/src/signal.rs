use serde::{Deserialize, Serialize};

/// Canonical action label extracted from a free-form decision.
///
/// `Unknown` is a valid outcome, not an error: callers must branch on it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
    Unknown,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
            Signal::Unknown => "UNKNOWN",
        }
    }

    /// Match a single action word, ignoring case. `UNKNOWN` is never parsed.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "BUY" => Some(Signal::Buy),
            "SELL" => Some(Signal::Sell),
            "HOLD" => Some(Signal::Hold),
            _ => None,
        }
    }

    pub fn is_actionable(&self) -> bool {
        !matches!(self, Signal::Unknown)
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_case_insensitive() {
        assert_eq!(Signal::from_token("buy"), Some(Signal::Buy));
        assert_eq!(Signal::from_token("Sell"), Some(Signal::Sell));
        assert_eq!(Signal::from_token("HOLD"), Some(Signal::Hold));
        assert_eq!(Signal::from_token("unknown"), None);
        assert_eq!(Signal::from_token("buying"), None);
    }

    #[test]
    fn serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Signal::Hold).unwrap(), "\"HOLD\"");
        let s: Signal = serde_json::from_str("\"UNKNOWN\"").unwrap();
        assert_eq!(s, Signal::Unknown);
        assert!(!s.is_actionable());
    }
}
