use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};

use gambit_core::errors::OracleError;
use gambit_core::oracle::{Feedback, MoveOracle};

use crate::prompt::{build_user_prompt, ChatRequest};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const REFERER: &str = "lichess-bot-a2a-ai-agent";
const TITLE: &str = "Lichess Bot A2A AI Agent";

#[derive(Clone, Debug)]
pub struct OpenRouterConfig {
    pub api_key: SecretString,
    pub model: String,
    /// Base URL without trailing `/chat/completions`.
    pub base_url: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl OpenRouterConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            temperature: 0.5,
            timeout: REQUEST_TIMEOUT,
        }
    }
}

/// Move oracle backed by an OpenRouter chat-completion model.
pub struct OpenRouterOracle {
    client: Client,
    config: OpenRouterConfig,
}

impl OpenRouterOracle {
    pub fn new(config: OpenRouterConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::Request(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ProviderError>,
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
struct ProviderError {
    #[serde(default)]
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Pull the suggestion text out of a completion body.
fn parse_completion(body: &str) -> Result<String, OracleError> {
    let parsed: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| OracleError::Decode(format!("{e}. Body: {body}")))?;

    if let Some(err) = parsed.error.filter(|e| !e.message.is_empty()) {
        return Err(OracleError::Provider {
            message: err.message,
            kind: err.kind,
        });
    }

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(OracleError::EmptyResponse)
}

#[async_trait]
impl MoveOracle for OpenRouterOracle {
    fn name(&self) -> &str {
        "openrouter"
    }

    #[instrument(skip_all, fields(model = %self.config.model, moves = moves.len(), feedback = feedback.is_some()))]
    async fn suggest(
        &self,
        moves: &[String],
        feedback: Option<&Feedback>,
    ) -> Result<String, OracleError> {
        let feedback_text = feedback.map(|f| f.describe(moves));
        let prompt = build_user_prompt(moves, feedback_text.as_deref());
        debug!(prompt_len = prompt.len(), "querying oracle");

        let body = ChatRequest::new(&self.config.model, &prompt, self.config.temperature);
        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.config.api_key.expose_secret())
            .header("HTTP-Referer", REFERER)
            .header("X-Title", TITLE)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Request(e.to_string()))?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| OracleError::Request(e.to_string()))?;
        debug!(status, body = %text, "oracle raw response");

        if status != 200 {
            return Err(OracleError::Api { status, body: text });
        }
        parse_completion(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn oracle_for(server: &MockServer) -> OpenRouterOracle {
        let mut config = OpenRouterConfig::new(SecretString::from("sk-test"));
        config.base_url = server.uri();
        OpenRouterOracle::new(config).unwrap()
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
    }

    #[test]
    fn parse_trims_content() {
        let body = completion("  e7e5\n").to_string();
        assert_eq!(parse_completion(&body).unwrap(), "e7e5");
    }

    #[test]
    fn parse_provider_error() {
        let body = r#"{"error":{"message":"rate limited","type":"rate_limit","code":429}}"#;
        match parse_completion(body) {
            Err(OracleError::Provider { message, kind }) => {
                assert_eq!(message, "rate limited");
                assert_eq!(kind.as_deref(), Some("rate_limit"));
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[test]
    fn parse_empty_choices() {
        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(OracleError::EmptyResponse)
        ));
        assert!(matches!(
            parse_completion(&completion("   ").to_string()),
            Err(OracleError::EmptyResponse)
        ));
    }

    #[test]
    fn parse_garbage() {
        assert!(matches!(
            parse_completion("<html>oops</html>"),
            Err(OracleError::Decode(_))
        ));
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let mut config = OpenRouterConfig::new(SecretString::from("k"));
        config.base_url = "http://localhost:9/api/v1/".into();
        let oracle = OpenRouterOracle::new(config).unwrap();
        assert_eq!(oracle.endpoint(), "http://localhost:9/api/v1/chat/completions");
        assert_eq!(oracle.model(), DEFAULT_MODEL);
        assert_eq!(oracle.name(), "openrouter");
    }

    #[tokio::test]
    async fn suggest_sends_auth_headers_and_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("HTTP-Referer", REFERER))
            .and(header("X-Title", TITLE))
            .and(body_partial_json(serde_json::json!({
                "model": "openai/gpt-4o",
                "temperature": 0.5
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("e7e5")))
            .expect(1)
            .mount(&server)
            .await;

        let oracle = oracle_for(&server);
        let mv = oracle.suggest(&["e2e4".to_string()], None).await.unwrap();
        assert_eq!(mv, "e7e5");
    }

    #[tokio::test]
    async fn suggest_includes_feedback_in_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("e7e6")))
            .mount(&server)
            .await;

        let oracle = oracle_for(&server);
        let feedback = Feedback {
            failed_move: "e7e5".into(),
            reason: "Illegal move".into(),
        };
        oracle
            .suggest(&["e2e4".to_string()], Some(&feedback))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("IMPORTANT: Your previous suggested move e7e5"));
        assert!(user.contains("Illegal move"));
    }

    #[tokio::test]
    async fn suggest_non_200_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(402).set_body_string("insufficient credits"))
            .mount(&server)
            .await;

        let oracle = oracle_for(&server);
        match oracle.suggest(&[], None).await {
            Err(OracleError::Api { status, body }) => {
                assert_eq!(status, 402);
                assert_eq!(body, "insufficient credits");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }
}
