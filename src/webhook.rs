use reqwest::{Client, StatusCode, header};
use serde::Serialize;
use tracing::debug;

use crate::{config::WebhookConfig, embed::Embed, error::DeliveryError};

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<&'a str>,
    embeds: [&'a Embed; 1],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The channel is disabled or has no URL; nothing was sent.
    Skipped,
    Sent(StatusCode),
}

/// Posts embeds to Discord webhooks.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    client: Client,
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub async fn notify(&self, channel: &WebhookConfig, embed: &Embed) -> Result<Delivery, DeliveryError> {
        if !channel.is_configured() {
            return Ok(Delivery::Skipped);
        }

        let payload = WebhookPayload {
            username: &channel.username,
            avatar_url: Some(channel.avatar_url.as_str()).filter(|u| !u.is_empty()),
            embeds: [embed],
        };

        let response = self
            .client
            .post(&channel.url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(DeliveryError::Status { status, body });
        }

        debug!("Webhook delivered with status {}", status);
        Ok(Delivery::Sent(status))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Json, Router, extract::State, http::StatusCode as AxumStatus, routing::post};
    use serde_json::{Value, json};

    use super::*;
    use crate::{config::EmbedsConfig, embed::{EmbedFactory, Tone}};

    #[derive(Clone)]
    pub struct Sink {
        pub url: String,
        pub received: Arc<Mutex<Vec<Value>>>,
    }

    impl Sink {
        pub fn bodies(&self) -> Vec<Value> {
            self.received.lock().unwrap().clone()
        }
    }

    /// Local webhook endpoint that records every body and answers `status`.
    pub async fn spawn_sink(status: u16) -> Sink {
        let received = Arc::new(Mutex::new(Vec::new()));
        let state = (received.clone(), status);
        let app = Router::new()
            .route(
                "/hook",
                post(
                    |State((received, status)): State<(Arc<Mutex<Vec<Value>>>, u16)>,
                     Json(body): Json<Value>| async move {
                        received.lock().unwrap().push(body);
                        (AxumStatus::from_u16(status).unwrap(), "sink says no")
                    },
                ),
            )
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Sink {
            url: format!("http://{addr}/hook"),
            received,
        }
    }

    fn channel(url: &str) -> WebhookConfig {
        WebhookConfig {
            enabled: true,
            url: url.to_owned(),
            username: "Neodyme Server".to_owned(),
            avatar_url: String::new(),
        }
    }

    fn embed() -> Embed {
        let mut config = EmbedsConfig::default();
        config.show_timestamp = false;
        EmbedFactory::new(config)
            .create("Server Online", Tone::ServerOnline)
            .field("Status", "Online", true)
    }

    #[tokio::test]
    async fn posts_payload_to_sink() {
        let sink = spawn_sink(204).await;
        let delivery = Notifier::new().notify(&channel(&sink.url), &embed()).await.unwrap();
        assert_eq!(delivery, Delivery::Sent(StatusCode::NO_CONTENT));

        let bodies = sink.bodies();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["username"], "Neodyme Server");
        assert!(bodies[0].get("avatar_url").is_none());
        assert_eq!(bodies[0]["embeds"][0]["title"], "Server Online");
        assert_eq!(bodies[0]["embeds"][0]["fields"][0], json!({ "name": "Status", "value": "Online", "inline": true }));
    }

    #[tokio::test]
    async fn avatar_is_sent_when_set() {
        let sink = spawn_sink(200).await;
        let mut channel = channel(&sink.url);
        channel.avatar_url = "https://cdn.example/a.png".to_owned();
        Notifier::new().notify(&channel, &embed()).await.unwrap();
        assert_eq!(sink.bodies()[0]["avatar_url"], "https://cdn.example/a.png");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let sink = spawn_sink(400).await;
        let err = Notifier::new().notify(&channel(&sink.url), &embed()).await.unwrap_err();
        match err {
            DeliveryError::Status { status, body } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(body, "sink says no");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_failure_is_an_error() {
        let err = Notifier::new()
            .notify(&channel("http://127.0.0.1:1/hook"), &embed())
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(_)));
    }

    #[tokio::test]
    async fn disabled_or_unconfigured_channel_is_skipped() {
        let sink = spawn_sink(200).await;
        let notifier = Notifier::new();

        let mut disabled = channel(&sink.url);
        disabled.enabled = false;
        assert_eq!(notifier.notify(&disabled, &embed()).await.unwrap(), Delivery::Skipped);
        assert_eq!(notifier.notify(&channel(""), &embed()).await.unwrap(), Delivery::Skipped);

        assert!(sink.bodies().is_empty());
    }
}
