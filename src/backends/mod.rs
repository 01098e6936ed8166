pub mod azure;
pub mod openrouter;

pub use azure::ManagedBackend;
pub use openrouter::MarketplaceBackend;

use crate::llm_adapter::DispatchError;
use crate::types::Result;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::time::Duration;

/// Longest slice of an error body kept in a `DispatchError::Status`.
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// HTTP client shared by the chat-completion backends. Timeouts are set per request.
pub fn build_client(user_agent: &str) -> Result<Client> {
    let client = Client::builder().user_agent(user_agent).build()?;
    Ok(client)
}

/// Pull `choices[0].message.content` out of an OpenAI-style response body.
pub fn extract_reply(body: &str) -> std::result::Result<String, DispatchError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| DispatchError::MalformedResponse(format!("invalid JSON body: {}", e)))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| DispatchError::MalformedResponse("missing choices[0].message.content".to_string()))
}

/// Send a prepared chat-completion request and map every failure to a `DispatchError`.
pub(crate) async fn send_chat(
    request: RequestBuilder,
    timeout: Duration,
) -> std::result::Result<String, DispatchError> {
    let response = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| transport_error(e, timeout))?;

    let status = response.status();
    let body = response.text().await.map_err(|e| transport_error(e, timeout))?;

    if !status.is_success() {
        return Err(DispatchError::Status {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }

    extract_reply(&body)
}

fn transport_error(error: reqwest::Error, timeout: Duration) -> DispatchError {
    if error.is_timeout() {
        DispatchError::Timeout { after: timeout }
    } else {
        DispatchError::Transport(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn reply_is_trimmed_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Yes.\n"}}]}"#;
        assert_eq!(extract_reply(body).unwrap(), "Yes.");
    }

    #[test]
    fn missing_reply_field_is_malformed() {
        for body in [r#"{"choices":[]}"#, r#"{"error":{"message":"nope"}}"#, r#"{"choices":[{"message":{"content":null}}]}"#, "<html>"] {
            assert!(matches!(extract_reply(body), Err(DispatchError::MalformedResponse(_))), "{}", body);
        }
    }

    async fn serve_once(response: String, delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 8192];
            let _ = socket.read(&mut buf).await;
            tokio::time::sleep(delay).await;
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}/chat/completions", addr)
    }

    fn http_response(status: &str, content_type: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            content_type,
            body.len(),
            body
        )
    }

    async fn post(url: &str, timeout: Duration) -> std::result::Result<String, DispatchError> {
        let client = Client::builder().no_proxy().build().unwrap();
        send_chat(client.post(url).body("{}"), timeout).await
    }

    #[tokio::test]
    async fn success_returns_reply_text() {
        let body = r#"{"choices":[{"message":{"content":"Yes."}}]}"#;
        let url = serve_once(http_response("200 OK", "application/json", body), Duration::ZERO).await;
        assert_eq!(post(&url, Duration::from_secs(5)).await.unwrap(), "Yes.");
    }

    #[tokio::test]
    async fn error_status_is_typed() {
        let url = serve_once(http_response("500 Internal Server Error", "text/plain", "boom"), Duration::ZERO).await;
        assert_eq!(
            post(&url, Duration::from_secs(5)).await,
            Err(DispatchError::Status { status: 500, body: "boom".to_string() })
        );
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let url = serve_once(http_response("200 OK", "text/html", "<html>"), Duration::ZERO).await;
        assert!(matches!(
            post(&url, Duration::from_secs(5)).await,
            Err(DispatchError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn slow_reply_is_timeout_with_subsecond_duration() {
        let timeout = Duration::from_millis(200);
        let url = serve_once(http_response("200 OK", "application/json", "{}"), Duration::from_secs(5)).await;
        assert_eq!(post(&url, timeout).await, Err(DispatchError::Timeout { after: timeout }));
    }
}
