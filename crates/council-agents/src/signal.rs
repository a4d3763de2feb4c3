use std::sync::Arc;

use council_models::signal::Signal;
use tracing::{debug, warn};

use crate::llm::{GenerationRequest, LanguageModel};
use crate::prompts::signal_system_prompt;

pub const FINAL_PROPOSAL_MARKER: &str = "FINAL TRANSACTION PROPOSAL:";

/// Read the action after the last `FINAL TRANSACTION PROPOSAL:` marker.
///
/// Emphasis (`**BUY**`, `_SELL_`, `` `HOLD` ``) and surrounding whitespace are skipped. A
/// template left unfilled, such as `**BUY/HOLD/SELL**`, yields `None`.
pub fn parse_marker(text: &str) -> Option<Signal> {
    // ASCII uppercasing keeps byte offsets aligned with `text`.
    let upper = text.to_ascii_uppercase();
    let start = upper.rfind(FINAL_PROPOSAL_MARKER)? + FINAL_PROPOSAL_MARKER.len();

    let rest = upper[start..].trim_start_matches(|c: char| c.is_whitespace() || is_emphasis(c));
    let word_len = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    let (word, after) = rest.split_at(word_len);

    if after.starts_with('/') {
        return None;
    }
    Signal::from_token(word)
}

/// The first standalone BUY/SELL/HOLD word in `text`.
pub fn parse_action_token(text: &str) -> Option<Signal> {
    text.split(|c: char| !c.is_ascii_alphabetic())
        .find_map(Signal::from_token)
}

fn is_emphasis(c: char) -> bool {
    matches!(c, '*' | '_' | '`')
}

/// Turns a free-form final decision into a canonical `Signal`.
pub struct SignalExtractor {
    fallback: Option<Arc<dyn LanguageModel>>,
}

impl SignalExtractor {
    pub fn new(fallback: Option<Arc<dyn LanguageModel>>) -> Self {
        Self { fallback }
    }

    /// Never fails: anything that cannot be resolved is `Signal::Unknown`.
    pub async fn extract(&self, text: &str) -> Signal {
        if let Some(signal) = parse_marker(text) {
            return signal;
        }

        let Some(model) = &self.fallback else {
            debug!("No proposal marker and no fallback model");
            return Signal::Unknown;
        };

        let request =
            GenerationRequest::new("signal_extractor", signal_system_prompt()).with_user(text);
        match model.generate(&request).await {
            Ok(generation) => parse_action_token(&generation.text).unwrap_or(Signal::Unknown),
            Err(e) => {
                warn!(error = %e, "Signal fallback failed");
                Signal::Unknown
            }
        }
    }
}
