use council_models::state::ToolCall;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AgentError;
use crate::llm::Generation;

/// Extract the first JSON object from model output that may carry surrounding prose.
///
/// Accepts a bare object, a fenced ```json block, or an object embedded in text.
pub fn extract_json(text: &str) -> Result<String, AgentError> {
    let trimmed = text.trim();

    let candidates = [
        trimmed.starts_with('{').then(|| trimmed.to_string()),
        fenced_block(trimmed),
        first_balanced_object(trimmed),
    ];

    candidates
        .into_iter()
        .flatten()
        .find(|c| serde_json::from_str::<serde_json::Value>(c).is_ok())
        .ok_or_else(|| {
            AgentError::Parse(format!(
                "No valid JSON object found in response (length={})",
                text.len()
            ))
        })
}

fn fenced_block(text: &str) -> Option<String> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    // Skip an optional language tag on the fence line.
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim().to_string())
}

fn first_balanced_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match (escaped, ch) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..=start + offset].to_string());
                }
            }
            _ => {}
        }
    }

    None
}

#[derive(Deserialize)]
struct ToolEnvelope {
    #[serde(default)]
    text: String,
    #[serde(default)]
    tool_calls: Vec<RequestedCall>,
}

#[derive(Deserialize)]
struct RequestedCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

/// Turn raw model output into a `Generation`.
///
/// When tools were offered, a JSON envelope `{"tool_calls": [{"name", "arguments"}]}`
/// is read as tool requests. Anything else is plain text.
pub fn parse_generation(raw: &str, tools_offered: bool) -> Generation {
    if tools_offered {
        if let Ok(json) = extract_json(raw) {
            if let Ok(envelope) = serde_json::from_str::<ToolEnvelope>(&json) {
                if !envelope.tool_calls.is_empty() {
                    let tool_calls = envelope
                        .tool_calls
                        .into_iter()
                        .map(|c| ToolCall {
                            id: format!("call_{}", Uuid::new_v4().simple()),
                            name: c.name,
                            arguments: c.arguments,
                        })
                        .collect();
                    return Generation {
                        text: envelope.text,
                        tool_calls,
                    };
                }
            }
        }
    }

    Generation::text(raw.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_clean_json() {
        let input = r#"{"tool_calls": [], "text": "done"}"#;
        assert_eq!(extract_json(input).unwrap(), input);
    }

    #[test]
    fn extract_from_markdown() {
        let input = "Calling tools:\n```json\n{\"tool_calls\": []}\n```\nDone.";
        assert_eq!(extract_json(input).unwrap(), r#"{"tool_calls": []}"#);
    }

    #[test]
    fn extract_with_braces_inside_strings() {
        let input = r#"Here: {"text": "range {low} to {high}", "n": 2} trailing"#;
        let parsed: serde_json::Value =
            serde_json::from_str(&extract_json(input).unwrap()).unwrap();
        assert_eq!(parsed["n"], 2);
    }

    #[test]
    fn extract_no_json() {
        assert!(extract_json("plain prose, nothing structured").is_err());
    }

    #[test]
    fn tool_envelope_becomes_tool_calls() {
        let raw = r#"{"tool_calls": [{"name": "get_price_history", "arguments": {"symbol": "NVDA"}}]}"#;
        let generation = parse_generation(raw, true);

        assert_eq!(generation.tool_calls.len(), 1);
        assert_eq!(generation.tool_calls[0].name, "get_price_history");
        assert_eq!(generation.tool_calls[0].arguments["symbol"], "NVDA");
        assert!(generation.tool_calls[0].id.starts_with("call_"));
    }

    #[test]
    fn envelope_ignored_when_no_tools_offered() {
        let raw = r#"{"tool_calls": [{"name": "get_news"}]}"#;
        let generation = parse_generation(raw, false);
        assert!(generation.tool_calls.is_empty());
        assert_eq!(generation.text, raw);
    }

    #[test]
    fn prose_report_is_text() {
        let generation = parse_generation("  The trend is up.\n", true);
        assert!(generation.tool_calls.is_empty());
        assert_eq!(generation.text, "The trend is up.");
    }
}
