use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use gambit_core::errors::TransportError;
use gambit_core::ids::{ChallengeId, SessionId};
use gambit_core::transport::{DeclineReason, Identity, RecordStream, Transport};

use crate::ndjson::NdjsonStream;

pub const DEFAULT_BASE_URL: &str = "https://lichess.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const NDJSON: &str = "application/x-ndjson";

#[derive(Clone, Debug)]
pub struct LichessConfig {
    pub token: SecretString,
    pub base_url: String,
    /// Applies to one-shot calls only; feeds have no overall timeout.
    pub request_timeout: Duration,
}

impl LichessConfig {
    pub fn new(token: SecretString) -> Self {
        Self {
            token,
            base_url: DEFAULT_BASE_URL.into(),
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

/// Lichess Bot API transport.
pub struct LichessClient {
    api: Client,
    streaming: Client,
    base_url: String,
    token: SecretString,
}

impl LichessClient {
    pub fn new(config: LichessConfig) -> Result<Self, TransportError> {
        let api = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let streaming = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self {
            api,
            streaming,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(self.token.expose_secret())
    }

    async fn send(req: RequestBuilder) -> Result<Response, TransportError> {
        req.send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))
    }

    /// Fail with the body as message unless the response is 200.
    async fn expect_ok(resp: Response) -> Result<Response, TransportError> {
        let status = resp.status().as_u16();
        if status == 200 {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(TransportError::from_status(status, body))
    }

    async fn open_feed(&self, path: &str) -> Result<RecordStream, TransportError> {
        let req = self
            .authed(self.streaming.get(self.url(path)))
            .header(reqwest::header::ACCEPT, NDJSON);
        let resp = Self::expect_ok(Self::send(req).await?).await?;
        Ok(Box::pin(NdjsonStream::new(resp.bytes_stream())))
    }
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    username: String,
}

#[derive(Debug, Deserialize)]
struct MoveResponse {
    ok: Option<bool>,
    error: Option<String>,
}

/// Map a move-submission response to success or a classified failure.
///
/// A 200 is a success unless its body carries an `error` field. Any other
/// status fails with the JSON `error` field if present, else the raw body.
fn classify_move_response(status: u16, body: &str) -> Result<(), TransportError> {
    let parsed: Option<MoveResponse> = serde_json::from_str(body).ok();
    if status == 200 {
        return match parsed {
            Some(MoveResponse { ok: Some(true), .. }) => Ok(()),
            Some(MoveResponse {
                error: Some(message),
                ..
            }) => Err(TransportError::Rejected { status, message }),
            Some(_) => {
                debug!(body, "move accepted without explicit ok");
                Ok(())
            }
            None => {
                debug!(body, "move accepted with undecodable body");
                Ok(())
            }
        };
    }
    let message = parsed
        .and_then(|r| r.error)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| body.to_string());
    Err(TransportError::from_status(status, message))
}

#[async_trait]
impl Transport for LichessClient {
    #[instrument(skip(self))]
    async fn fetch_identity(&self) -> Result<Identity, TransportError> {
        let req = self.authed(self.api.get(self.url("/api/account")));
        let resp = Self::expect_ok(Self::send(req).await?).await?;
        let account: AccountResponse = resp
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        if account.id.is_empty() || account.username.is_empty() {
            return Err(TransportError::Decode(format!(
                "username or id missing from account info: {account:?}"
            )));
        }
        info!(username = %account.username, id = %account.id, "fetched bot account");
        Ok(Identity {
            id: account.id,
            username: account.username,
        })
    }

    async fn accept_challenge(&self, id: &ChallengeId) -> Result<(), TransportError> {
        let req = self.authed(
            self.api
                .post(self.url(&format!("/api/challenge/{id}/accept"))),
        );
        Self::expect_ok(Self::send(req).await?).await?;
        Ok(())
    }

    async fn decline_challenge(
        &self,
        id: &ChallengeId,
        reason: DeclineReason,
    ) -> Result<(), TransportError> {
        let req = self
            .authed(
                self.api
                    .post(self.url(&format!("/api/challenge/{id}/decline"))),
            )
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(format!("reason={}", reason.as_str()));
        Self::expect_ok(Self::send(req).await?).await?;
        Ok(())
    }

    async fn submit_move(&self, session: &SessionId, mv: &str) -> Result<(), TransportError> {
        let req = self.authed(
            self.api
                .post(self.url(&format!("/api/bot/game/{session}/move/{mv}"))),
        );
        let resp = Self::send(req).await?;
        let status = resp.status().as_u16();
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(session_id = %session, error = %e, "failed to read move response body");
                String::new()
            }
        };
        classify_move_response(status, &body)
    }

    async fn lifecycle_stream(&self) -> Result<RecordStream, TransportError> {
        self.open_feed("/api/stream/event").await
    }

    async fn session_stream(&self, session: &SessionId) -> Result<RecordStream, TransportError> {
        self.open_feed(&format!("/api/bot/game/stream/{session}"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> LichessClient {
        let mut config = LichessConfig::new(SecretString::from("lip_test"));
        config.base_url = server.uri();
        LichessClient::new(config).unwrap()
    }

    #[test]
    fn move_ok_true_is_success() {
        assert!(classify_move_response(200, r#"{"ok":true}"#).is_ok());
    }

    #[test]
    fn move_200_with_error_field_fails() {
        let err = classify_move_response(200, r#"{"error":"Not your turn"}"#).unwrap_err();
        assert!(matches!(err, TransportError::Rejected { status: 200, ref message } if message == "Not your turn"));
        assert!(!err.is_illegal_move());
    }

    #[test]
    fn move_200_without_ok_or_error_is_success() {
        assert!(classify_move_response(200, r#"{"something":"else"}"#).is_ok());
        assert!(classify_move_response(200, "").is_ok());
        assert!(classify_move_response(200, "not json").is_ok());
    }

    #[test]
    fn move_400_uses_json_error_field() {
        let err =
            classify_move_response(400, r#"{"error":"Piece on e7 cannot move to e5"}"#).unwrap_err();
        assert!(matches!(err, TransportError::Rejected { status: 400, ref message } if message == "Piece on e7 cannot move to e5"));
        assert!(err.is_illegal_move());
    }

    #[test]
    fn move_non_200_falls_back_to_body() {
        let err = classify_move_response(502, "<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, TransportError::ServerError { status: 502, ref body } if body == "<html>Bad Gateway</html>"));
        let err = classify_move_response(401, r#"{"error":"No such token"}"#).unwrap_err();
        assert!(matches!(err, TransportError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn fetch_identity_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/account"))
            .and(header("authorization", "Bearer lip_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "gambitbot",
                "username": "GambitBot",
                "title": "BOT"
            })))
            .mount(&server)
            .await;

        let identity = client_for(&server).fetch_identity().await.unwrap();
        assert_eq!(identity.id, "gambitbot");
        assert_eq!(identity.username, "GambitBot");
    }

    #[tokio::test]
    async fn fetch_identity_missing_fields_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/account"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "gambitbot" })),
            )
            .mount(&server)
            .await;

        assert!(matches!(
            client_for(&server).fetch_identity().await,
            Err(TransportError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn fetch_identity_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/account"))
            .respond_with(ResponseTemplate::new(401).set_body_string("No such token"))
            .mount(&server)
            .await;

        assert!(matches!(
            client_for(&server).fetch_identity().await,
            Err(TransportError::Unauthorized(body)) if body == "No such token"
        ));
    }

    #[tokio::test]
    async fn decline_posts_reason_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/challenge/ch1/decline"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("reason=standardOnly"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .decline_challenge(&ChallengeId::from_raw("ch1"), DeclineReason::StandardOnly)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn accept_failure_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/challenge/ch2/accept"))
            .respond_with(ResponseTemplate::new(404).set_body_string("challenge not found"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .accept_challenge(&ChallengeId::from_raw("ch2"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Rejected { status: 404, .. }));
    }

    #[tokio::test]
    async fn submit_move_hits_move_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/bot/game/g1/move/e2e4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .submit_move(&SessionId::from_raw("g1"), "e2e4")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn session_stream_yields_records() {
        let server = MockServer::start().await;
        let body = "{\"type\":\"gameState\",\"moves\":\"e2e4\",\"status\":\"started\"}\n\n\
                    {\"type\":\"chatLine\",\"username\":\"x\",\"text\":\"hi\",\"room\":\"player\"}\n";
        Mock::given(method("GET"))
            .and(path("/api/bot/game/stream/g1"))
            .and(header("accept", NDJSON))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let stream = client_for(&server)
            .session_stream(&SessionId::from_raw("g1"))
            .await
            .unwrap();
        let records: Vec<String> = stream.map(Result::unwrap).collect().await;
        assert_eq!(records.len(), 2);
        assert!(records[0].contains("gameState"));
        assert!(records[1].contains("chatLine"));
    }

    #[tokio::test]
    async fn lifecycle_stream_non_200_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/stream/event"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let result = client_for(&server).lifecycle_stream().await;
        assert!(matches!(
            result,
            Err(TransportError::ServerError { status: 503, .. })
        ));
    }
}
