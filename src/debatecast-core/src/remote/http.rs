//! HTTP implementation of the turn client.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{DebateError, StatusCategory};
use crate::remote::{CredentialSupplier, TurnClient};
use crate::session::{SessionId, SessionSnapshot, SessionSummary};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionList {
    #[serde(default)]
    debates: Vec<SessionSummary>,
}

/// Debate service client over HTTP/JSON.
pub struct HttpTurnClient {
    base_url: String,
    audience: String,
    http: reqwest::Client,
    credentials: Option<Arc<dyn CredentialSupplier>>,
}

impl HttpTurnClient {
    pub fn new(
        config: &ServerConfig,
        credentials: Option<Arc<dyn CredentialSupplier>>,
    ) -> Result<Self, DebateError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| DebateError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            audience: config.audience.clone(),
            http,
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, DebateError> {
        match &self.credentials {
            Some(credentials) => {
                let token = credentials.bearer_token(&self.audience).await?;
                Ok(request.bearer_auth(token))
            }
            None => Ok(request),
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        action: &str,
    ) -> Result<T, DebateError> {
        let request = self.authorize(request).await?;
        let response = request.send().await.inspect_err(|e| {
            warn!(action, error = %e, "Request to debate service failed");
        })?;
        decode(response, action).await
    }

    async fn post_turn(
        &self,
        path: &str,
        body: serde_json::Value,
        action: &str,
    ) -> Result<SessionSnapshot, DebateError> {
        info!(action, "Calling debate service");
        self.send(self.http.post(self.url(path)).json(&body), action)
            .await
    }
}

async fn decode<T: DeserializeOwned>(response: Response, action: &str) -> Result<T, DebateError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        let err = error_from_response(status, &body);
        warn!(action, status = status.as_u16(), error = %err, "Debate service returned an error");
        return Err(err);
    }
    debug!(action, bytes = body.len(), "Debate service responded");
    serde_json::from_str(&body).map_err(|e| DebateError::Remote {
        category: StatusCategory::Decode,
        message: format!("Invalid {} response: {}", action, e),
    })
}

/// Map a non-success response to an error, preferring the service's own message.
fn error_from_response(status: StatusCode, body: &str) -> DebateError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| match status.canonical_reason() {
            Some(reason) => format!("Request failed with status {} ({})", status.as_u16(), reason),
            None => format!("Request failed with status {}", status.as_u16()),
        });

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DebateError::Auth(message),
        _ => DebateError::Remote {
            category: StatusCategory::from_status(status.as_u16()),
            message,
        },
    }
}

#[async_trait]
impl TurnClient for HttpTurnClient {
    async fn start_session(&self, topic: &str) -> Result<SessionSnapshot, DebateError> {
        self.post_turn("start_debate", json!({ "topic": topic }), "start_session")
            .await
    }

    async fn submit_question(
        &self,
        id: &SessionId,
        question: &str,
    ) -> Result<SessionSnapshot, DebateError> {
        self.post_turn(
            "process_turn",
            json!({ "debate_id": id, "question": question }),
            "submit_question",
        )
        .await
    }

    async fn request_closing(&self, id: &SessionId) -> Result<SessionSnapshot, DebateError> {
        self.post_turn("closing_arguments", json!({ "debate_id": id }), "request_closing")
            .await
    }

    async fn request_judgment(&self, id: &SessionId) -> Result<SessionSnapshot, DebateError> {
        self.post_turn("judge_debate", json!({ "debate_id": id }), "request_judgment")
            .await
    }

    async fn fetch_session(&self, id: &SessionId) -> Result<SessionSnapshot, DebateError> {
        info!(action = "fetch_session", session = %id, "Calling debate service");
        let request = self
            .http
            .get(self.url("get_debate"))
            .query(&[("debate_id", id.as_str())]);
        self.send(request, "fetch_session").await
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, DebateError> {
        info!(action = "list_sessions", "Calling debate service");
        let list: SessionList = self
            .send(self.http.get(self.url("get_user_debates")), "list_sessions")
            .await?;
        Ok(list.debates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::StatementKind;

    #[test]
    fn test_error_body_message_is_used() {
        let err = error_from_response(StatusCode::NOT_FOUND, r#"{"error": "Debate not found"}"#);
        match err {
            DebateError::Remote { category, message } => {
                assert_eq!(category, StatusCategory::NotFound);
                assert_eq!(message, "Debate not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_error_body_uses_status() {
        let err = error_from_response(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
        assert_eq!(err.category(), Some(StatusCategory::Server));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_unauthorized_is_auth_error() {
        let err = error_from_response(StatusCode::UNAUTHORIZED, r#"{"error": "Token expired"}"#);
        assert!(err.is_auth());
        assert!(err.to_string().contains("Token expired"));
    }

    #[test]
    fn test_process_turn_response_decodes() {
        let body = r#"{
            "message": "Turn processed",
            "question": "Is it safe?",
            "pro_side_response": "Yes.",
            "con_side_response": "No.",
            "pro_side_rebuttal": "Still yes.",
            "con_side_rebuttal": "Still no.",
            "logs": [
                {"speaker": "moderator", "response_type": "opening_statement", "text": "Welcome."},
                {"speaker": "moderator", "response_type": "intitial_question_response", "text": "Is it safe?"},
                {"speaker": "pro", "response_type": "intitial_question_response", "text": "Yes."},
                {"speaker": "con", "response_type": "rebuttal", "text": "Still no."}
            ],
            "questions": ["Is it safe?"]
        }"#;
        let snapshot: SessionSnapshot = serde_json::from_str(body).unwrap();
        let statements = snapshot.statements.clone().unwrap();

        assert_eq!(statements.len(), 4);
        assert_eq!(statements[1].kind, StatementKind::Response);
        assert_eq!(statements[3].kind, StatementKind::Rebuttal);
        assert_eq!(snapshot.questions.clone().unwrap(), vec!["Is it safe?".to_string()]);
        assert_eq!(snapshot.phase_marker.as_deref(), Some("Turn processed"));
        assert_eq!(snapshot.decided_winner(), None);
    }

    #[test]
    fn test_session_list_decodes() {
        let body = r#"{"debates": [
            {"id": 3, "user_id": 1, "topic": "Cats vs dogs", "questions": [], "logs": [], "winner": "con"},
            {"id": 4, "user_id": 1, "topic": "Tabs vs spaces", "questions": ["Why?"], "logs": [], "winner": null}
        ]}"#;
        let list: SessionList = serde_json::from_str(body).unwrap();

        assert_eq!(list.debates.len(), 2);
        assert_eq!(list.debates[0].id, SessionId::new("3"));
        assert_eq!(list.debates[0].winner.as_deref(), Some("con"));
        assert_eq!(list.debates[1].winner, None);
    }

    #[test]
    fn test_url_joining() {
        let config = ServerConfig {
            base_url: "https://debates.example.com/api/".to_string(),
            ..Default::default()
        };
        let client = HttpTurnClient::new(&config, None).unwrap();
        assert_eq!(client.url("/start_debate"), "https://debates.example.com/api/start_debate");
    }
}
