/*
 * @file ai.rs
 * @brief n8n AI agent client
 * @author Kevin Thomas
 * @date 2025
 *
 * MIT License
 *
 * Copyright (c) 2025 Kevin Thomas
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

//! AI agent client: forwards user requests to an n8n webhook.

use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::Config;

/// User agent sent with every request.
const USER_AGENT: &str = "AI-Robot/1.0";

/// Agent the webhook routes general questions to.
const ACTIVE_AGENT: &str = "general";

/// Back-off before the first retry; doubles for every further attempt.
const DEFAULT_BACKOFF: Duration = Duration::from_millis(300);

/// Statuses worth retrying.
const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Keys checked, in order, for the agent's reply.
const REPLY_KEYS: [&str; 4] = ["output", "message", "response", "text"];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    user_id: &'a str,
    active_agent: &'a str,
    message: &'a str,
}

/// Chat client for the n8n AI agent.
///
/// # Details
/// Failures never propagate: the assistant treats an empty reply as
/// "nothing to say" and keeps listening.
#[derive(Clone)]
pub struct N8nClient {
    client: reqwest::Client,
    url: String,
    retries: u32,
    backoff: Duration,
}

impl N8nClient {
    /// Builds a client with its own connection pool.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .pool_max_idle_per_host(5)
            .build()?;
        Ok(Self::new(client, &config.n8n_url, config.retries))
    }

    /// Wraps an existing HTTP client.
    ///
    /// # Arguments
    /// * `client` - Shared client; its timeout applies to every attempt.
    /// * `url` - n8n webhook URL. Empty means no agent is configured.
    /// * `retries` - Attempts per request before giving up.
    ///
    /// # Returns
    /// * `N8nClient` - Client with the default 2 s initial back-off.
    pub fn new(client: reqwest::Client, url: &str, retries: u32) -> Self {
        Self {
            client,
            url: url.to_string(),
            retries,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Overrides the initial retry back-off.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sends a message and returns the agent's reply.
    ///
    /// # Arguments
    /// * `user_id` - Conversation identity (the robot's session id).
    /// * `message` - User request; blank input returns `""` immediately.
    ///
    /// # Returns
    /// The reply text, or `""` on any failure.
    pub async fn chat(&self, user_id: &str, message: &str) -> String {
        let message = message.trim();
        if message.is_empty() {
            return String::new();
        }
        if self.url.is_empty() {
            warn!("N8N_URL is not set; skipping AI request");
            return String::new();
        }

        let payload = ChatRequest {
            user_id,
            active_agent: ACTIVE_AGENT,
            message,
        };
        let started = Instant::now();
        let mut attempt = 0;
        loop {
            let sent = self
                .client
                .post(&self.url)
                .header(reqwest::header::USER_AGENT, USER_AGENT)
                .json(&payload)
                .send()
                .await;
            match sent {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if status == 200 {
                        let body = response.text().await.unwrap_or_default();
                        info!(elapsed = ?started.elapsed(), "n8n reply received");
                        return extract_reply(&body);
                    }
                    if !RETRY_STATUSES.contains(&status) {
                        error!(status, "n8n unexpected status");
                        return String::new();
                    }
                    if attempt >= self.retries {
                        if status == 429 {
                            warn!("n8n rate limited (429)");
                        } else {
                            error!(status, "n8n server error");
                        }
                        return String::new();
                    }
                    warn!(status, attempt, "n8n retryable status");
                }
                Err(err) => {
                    if attempt >= self.retries {
                        if err.is_timeout() {
                            error!(elapsed = ?started.elapsed(), "n8n timeout");
                        } else if err.is_connect() {
                            error!(%err, "n8n connection error");
                        } else {
                            error!(%err, "n8n request error");
                        }
                        return String::new();
                    }
                    warn!(%err, attempt, "n8n request failed, retrying");
                }
            }
            tokio::time::sleep(self.backoff * 2u32.saturating_pow(attempt)).await;
            attempt += 1;
        }
    }
}

/// Extracts the reply from a 200 response body.
///
/// # Details
/// JSON objects yield the first non-empty of `output`, `message`,
/// `response`, `text`, or the whole object as text. Other JSON yields its
/// text form and non-JSON bodies are returned trimmed.
pub fn extract_reply(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    match value {
        Value::Object(ref map) => {
            let reply = REPLY_KEYS
                .iter()
                .filter_map(|key| map.get(*key))
                .find(|v| is_truthy(v));
            match reply {
                Some(reply) => value_text(reply),
                None => {
                    warn!(%value, "unexpected n8n JSON structure");
                    value.to_string()
                }
            }
        }
        other => value_text(&other),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockResponse, MockServer};

    fn client(url: &str, retries: u32) -> N8nClient {
        N8nClient::new(reqwest::Client::new(), url, retries).with_backoff(Duration::from_millis(1))
    }

    #[test]
    fn reply_extraction() {
        assert_eq!(extract_reply(r#"{"output":" Hi there "}"#), "Hi there");
        assert_eq!(extract_reply(r#"{"output":"","message":"fallback"}"#), "fallback");
        assert_eq!(extract_reply(r#"{"text":"last"}"#), "last");
        assert_eq!(extract_reply(r#"{"foo":1}"#), r#"{"foo":1}"#);
        assert_eq!(extract_reply(r#"["a"]"#), r#"["a"]"#);
        assert_eq!(extract_reply(r#""quoted""#), "quoted");
        assert_eq!(extract_reply("  plain text\n"), "plain text");
    }

    #[tokio::test]
    async fn blank_message_skips_the_request() {
        let n8n = client("http://127.0.0.1:9", 0);
        assert_eq!(n8n.chat("robot-1", "   ").await, "");
    }

    #[tokio::test]
    async fn sends_payload_and_user_agent() {
        let server = MockServer::start(vec![MockResponse::json(200, r#"{"output":"done"}"#)]);
        let n8n = client(&server.url, 3);
        assert_eq!(n8n.chat("robot-7", "  explain rust ").await, "done");
        let requests = server.finish();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].header("user-agent"), Some(USER_AGENT));
        let body: Value = serde_json::from_slice(&requests[0].body).expect("json");
        assert_eq!(
            body,
            serde_json::json!({"userId": "robot-7", "activeAgent": "general", "message": "explain rust"})
        );
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let server = MockServer::start(vec![
            MockResponse::text(503, "busy"),
            MockResponse::text(502, "busy"),
            MockResponse::json(200, r#"{"response":"finally"}"#),
        ]);
        let n8n = client(&server.url, 3);
        assert_eq!(n8n.chat("robot-1", "hello").await, "finally");
        assert_eq!(server.finish().len(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_retries() {
        let server = MockServer::start(vec![
            MockResponse::text(500, "x"),
            MockResponse::text(500, "x"),
            MockResponse::text(500, "x"),
        ]);
        let n8n = client(&server.url, 2);
        assert_eq!(n8n.chat("robot-1", "hello").await, "");
        assert_eq!(server.finish().len(), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start(vec![MockResponse::text(404, "missing")]);
        let n8n = client(&server.url, 3);
        assert_eq!(n8n.chat("robot-1", "hello").await, "");
        assert_eq!(server.finish().len(), 1);
    }

    #[tokio::test]
    async fn plain_text_reply() {
        let server = MockServer::start(vec![MockResponse::text(200, " sure thing ")]);
        let n8n = client(&server.url, 0);
        assert_eq!(n8n.chat("robot-1", "hello").await, "sure thing");
    }
}
