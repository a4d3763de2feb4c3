use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::llm::{render_transcript, tool_protocol, Generation, GenerationRequest, LanguageModel};
use crate::parser::parse_generation;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// A language model behind an OpenAI-compatible chat-completions endpoint.
///
/// Also covers self-hosted servers that speak the same API (Ollama, vLLM) through
/// `backend_url`. Tool calls use the same JSON envelope as the CLI backend.
pub struct ChatCompletionsModel {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl ChatCompletionsModel {
    pub fn new(
        model: String,
        backend_url: Option<&str>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        let base = backend_url.unwrap_or(OPENAI_BASE_URL);
        let mut builder = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90));
        // Self-hosted servers on this machine are never reached through a proxy.
        if is_loopback(base) {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| AgentError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: chat_endpoint(base),
            model,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionsModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, AgentError> {
        let body = ChatRequest {
            model: &self.model,
            messages: build_messages(request)?,
            temperature: 0.2,
        };
        debug!(endpoint = %self.endpoint, model = %self.model, agent = %request.agent, "Sending chat completion");

        let mut http = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let response = http.send().await.map_err(|e| {
            if e.is_timeout() {
                AgentError::Timeout(self.timeout.as_secs())
            } else {
                AgentError::Http(format!("request to {} failed: {e}", self.endpoint))
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AgentError::Http(format!("Failed to read response: {e}")))?;
        if !status.is_success() {
            warn!(status = %status, body = %text, "Chat completion failed");
            return Err(AgentError::Http(format!("{status}: {text}")));
        }

        let content = parse_response(&text)?;
        Ok(parse_generation(&content, !request.tools.is_empty()))
    }
}

fn is_loopback(base: &str) -> bool {
    let Ok(url) = reqwest::Url::parse(base) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    host.eq_ignore_ascii_case("localhost")
        || host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<std::net::IpAddr>()
            .is_ok_and(|ip| ip.is_loopback())
}

fn chat_endpoint(base: &str) -> String {
    format!("{}/chat/completions", base.trim_end_matches('/'))
}

fn build_messages(request: &GenerationRequest) -> Result<Vec<ChatMessage>, AgentError> {
    let system = if request.tools.is_empty() {
        request.system.clone()
    } else {
        format!("{}\n\n{}", request.system, tool_protocol(&request.tools)?)
    };
    Ok(vec![
        ChatMessage {
            role: "system",
            content: system,
        },
        ChatMessage {
            role: "user",
            content: render_transcript(&request.messages),
        },
    ])
}

fn parse_response(body: &str) -> Result<String, AgentError> {
    let data: ChatResponse = serde_json::from_str(body)
        .map_err(|e| AgentError::Parse(format!("Invalid chat completion: {e}")))?;

    if let Some(usage) = &data.usage {
        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Token usage"
        );
    }

    data.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AgentError::Parse("Chat completion had no content".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolSpec;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer one HTTP request with `status` and `body`, returning the raw request.
    async fn serve_once(status: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/v1", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });

        (base, handle)
    }

    fn completion(content: &str) -> String {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 5}
        })
        .to_string()
    }

    #[test]
    fn endpoint_joins_base_url() {
        assert_eq!(
            chat_endpoint("http://localhost:11434/v1/"),
            "http://localhost:11434/v1/chat/completions"
        );
        assert_eq!(
            chat_endpoint(OPENAI_BASE_URL),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn only_local_backends_are_loopback() {
        assert!(is_loopback("http://localhost:11434/v1"));
        assert!(is_loopback("http://127.0.0.1:8000/v1"));
        assert!(is_loopback("http://[::1]:8000/v1"));
        assert!(!is_loopback(OPENAI_BASE_URL));
        assert!(!is_loopback("not a url"));
    }

    #[test]
    fn response_without_content_is_a_parse_error() {
        assert_eq!(parse_response(&completion("HOLD")).unwrap(), "HOLD");
        assert!(matches!(
            parse_response(r#"{"choices": []}"#),
            Err(AgentError::Parse(_))
        ));
        assert!(matches!(
            parse_response(r#"{"choices": [{"message": {"content": null}}]}"#),
            Err(AgentError::Parse(_))
        ));
        assert!(matches!(parse_response("not json"), Err(AgentError::Parse(_))));
    }

    #[test]
    fn tools_are_advertised_in_the_system_message() {
        let request = GenerationRequest::new("news_analyst", "You are a news analyst.")
            .with_user("Analyze NVDA")
            .with_tools(vec![ToolSpec {
                name: "get_company_news".to_string(),
                description: "Company news".to_string(),
            }]);

        let messages = build_messages(&request).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("get_company_news"));
        assert_eq!(messages[1].content, "Analyze NVDA");
    }

    #[tokio::test]
    async fn generate_posts_chat_completion() {
        let (base, server) =
            serve_once("200 OK", completion("Bullish. FINAL TRANSACTION PROPOSAL: **BUY**")).await;
        let model = ChatCompletionsModel::new(
            "gpt-4o-mini".to_string(),
            Some(&base),
            Some("sk-test".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();

        let request = GenerationRequest::new("trader", "You are a trader.").with_user("Plan?");
        let generation = model.generate(&request).await.unwrap();
        assert!(generation.text.ends_with("**BUY**"));
        assert!(generation.tool_calls.is_empty());

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /v1/chat/completions"));
        assert!(raw.to_ascii_lowercase().contains("authorization: bearer sk-test"));
        assert!(raw.contains("\"model\":\"gpt-4o-mini\""));
    }

    #[tokio::test]
    async fn tool_envelope_becomes_tool_calls() {
        let envelope = r#"{"tool_calls": [{"name": "get_company_news", "arguments": {"symbol": "NVDA"}}]}"#;
        let (base, server) = serve_once("200 OK", completion(envelope)).await;
        let model =
            ChatCompletionsModel::new("llama3.1".to_string(), Some(&base), None, Duration::from_secs(5))
                .unwrap();

        let request = GenerationRequest::new("news_analyst", "system")
            .with_user("Analyze NVDA")
            .with_tools(vec![ToolSpec {
                name: "get_company_news".to_string(),
                description: "Company news".to_string(),
            }]);
        let generation = model.generate(&request).await.unwrap();
        assert_eq!(generation.tool_calls.len(), 1);
        assert_eq!(generation.tool_calls[0].name, "get_company_news");

        let raw = server.await.unwrap();
        assert!(!raw.to_ascii_lowercase().contains("authorization:"));
    }

    #[tokio::test]
    async fn error_status_is_an_http_error() {
        let (base, server) = serve_once(
            "401 Unauthorized",
            r#"{"error": {"message": "bad key"}}"#.to_string(),
        )
        .await;
        let model = ChatCompletionsModel::new(
            "gpt-4o-mini".to_string(),
            Some(&base),
            Some("sk-wrong".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = model
            .generate(&GenerationRequest::new("trader", "system").with_user("Plan?"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Http(msg) if msg.contains("401") && msg.contains("bad key")));
        server.await.unwrap();
    }
}
