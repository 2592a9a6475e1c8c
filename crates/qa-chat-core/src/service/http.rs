use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::QaService;
use crate::error::RequestFailed;
use crate::state::{Message, Speaker};

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(message: &'a Message) -> Self {
        let role = match message.role {
            Speaker::User => "user",
            Speaker::Agent => "ai",
        };
        Self {
            role,
            content: &message.content,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    question: &'a str,
    chat_history: Vec<WireMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    answer: Option<String>,
}

/// HTTP client for the `POST /chat` endpoint
#[derive(Clone)]
pub struct QaClient {
    client: Client,
    base_url: String,
}

impl QaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl QaService for QaClient {
    async fn ask(&self, question: &str, history: &[Message]) -> Result<Option<String>, RequestFailed> {
        let url = format!("{}/chat", self.base_url);

        let request = ChatRequest {
            question,
            chat_history: history.iter().map(WireMessage::from).collect(),
        };

        tracing::debug!(%url, history_len = history.len(), "posting question");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RequestFailed::Status(response.status()));
        }

        let body = response.bytes().await?;
        Ok(decode_answer(&body)?)
    }
}

/// Pull `answer` out of a response body, which must be a JSON object
fn decode_answer(body: &[u8]) -> Result<Option<String>, serde_json::Error> {
    let value: Value = serde_json::from_slice(body)?;
    if !value.is_object() {
        return Err(serde_json::Error::custom("response body is not a JSON object"));
    }
    let chat_response: ChatResponse = serde_json::from_value(value)?;
    Ok(chat_response.answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    /// Serve `router` on an ephemeral local port and return its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base_url: &str) -> QaClient {
        QaClient::new(base_url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_posts_question_and_wire_history() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let captured = seen.clone();
        let router = Router::new().route(
            "/chat",
            post(move |Json(body): Json<Value>| {
                let captured = captured.clone();
                async move {
                    *captured.lock().unwrap() = Some(body);
                    Json(json!({ "answer": "4", "sources": [] }))
                }
            }),
        );
        let base_url = serve(router).await;

        let history = vec![
            Message::user("hi"),
            Message::agent("hello"),
            Message::user("What is 2+2?"),
        ];
        let answer = client(&base_url).ask("What is 2+2?", &history).await.unwrap();
        assert_eq!(answer.as_deref(), Some("4"));

        let body = seen.lock().unwrap().take().unwrap();
        assert_eq!(
            body,
            json!({
                "question": "What is 2+2?",
                "chat_history": [
                    { "role": "user", "content": "hi" },
                    { "role": "ai", "content": "hello" },
                    { "role": "user", "content": "What is 2+2?" },
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_missing_answer_is_none() {
        let router = Router::new().route("/chat", post(|| async { Json(json!({ "other": 1 })) }));
        let base_url = serve(router).await;

        let answer = client(&base_url).ask("q", &[Message::user("q")]).await.unwrap();
        assert_eq!(answer, None);
    }

    #[tokio::test]
    async fn test_server_error_is_status_failure() {
        let router = Router::new().route(
            "/chat",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base_url = serve(router).await;

        let err = client(&base_url).ask("q", &[Message::user("q")]).await.unwrap_err();
        assert!(matches!(err, RequestFailed::Status(s) if s.as_u16() == 500));
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let router = Router::new().route("/chat", post(|| async { "definitely not json" }));
        let base_url = serve(router).await;

        let err = client(&base_url).ask("q", &[Message::user("q")]).await.unwrap_err();
        assert!(matches!(err, RequestFailed::Malformed(_)));
    }

    #[tokio::test]
    async fn test_array_body_is_malformed() {
        for body in [json!([]), json!(["hi"])] {
            let router = Router::new().route(
                "/chat",
                post(move || {
                    let body = body.clone();
                    async move { Json(body) }
                }),
            );
            let base_url = serve(router).await;

            let err = client(&base_url).ask("q", &[Message::user("q")]).await.unwrap_err();
            assert!(matches!(err, RequestFailed::Malformed(_)));
        }
    }

    #[test]
    fn test_decode_answer_field_types() {
        assert_eq!(decode_answer(br#"{"answer":"4"}"#).unwrap().as_deref(), Some("4"));
        assert_eq!(decode_answer(br#"{"answer":null}"#).unwrap(), None);
        assert_eq!(decode_answer(br#"{}"#).unwrap(), None);
        assert!(decode_answer(br#"{"answer":42}"#).is_err());
        assert!(decode_answer(br#""just a string""#).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_failure() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{}", addr))
            .ask("q", &[Message::user("q")])
            .await
            .unwrap_err();
        assert!(matches!(err, RequestFailed::Transport(_)));
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = QaClient::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
    }
}
