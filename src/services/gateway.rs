use crate::models::OutboundMessage;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when handing messages to the platform gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Gateway rejected message: {0}")]
    Rejected(StatusCode),

    #[error("Unauthorized: invalid gateway token")]
    Unauthorized,

    /// The recipient can no longer be reached (blocked the bot, left the platform)
    #[error("Recipient unreachable: {0}")]
    Unreachable(i64),
}

/// Delivery of outbound messages to the messaging platform
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), GatewayError>;
}

/// Gateway that POSTs each message as JSON to a platform adapter
pub struct HttpGateway {
    url: String,
    api_token: Option<String>,
    client: Client,
}

impl HttpGateway {
    pub fn new(
        url: String,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            url,
            api_token,
            client,
        })
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), GatewayError> {
        let mut request = self.client.post(&self.url).json(message);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        match status {
            s if s.is_success() => {
                tracing::trace!("Delivered {:?} to {}", message.kind, message.recipient);
                Ok(())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GatewayError::Unauthorized),
            StatusCode::GONE => Err(GatewayError::Unreachable(message.recipient)),
            other => Err(GatewayError::Rejected(other)),
        }
    }
}

/// Gateway that only logs, for running without a platform adapter
pub struct LogGateway;

#[async_trait]
impl Gateway for LogGateway {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), GatewayError> {
        tracing::info!(
            recipient = message.recipient,
            kind = ?message.kind,
            "Outbound message: {}",
            message.text
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_deliver_posts_json_with_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/send")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "recipient": 42,
                "text": "hello",
                "kind": "reply"
            })))
            .with_status(200)
            .create_async()
            .await;

        let gateway = HttpGateway::new(
            format!("{}/send", server.url()),
            Some("secret".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();

        gateway
            .deliver(&OutboundMessage::reply(42, "hello"))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_deliver_maps_status_codes() {
        let mut server = mockito::Server::new_async().await;
        let _gone = server
            .mock("POST", "/gone")
            .with_status(410)
            .create_async()
            .await;
        let _broken = server
            .mock("POST", "/broken")
            .with_status(502)
            .create_async()
            .await;

        let gone = HttpGateway::new(format!("{}/gone", server.url()), None, Duration::from_secs(5))
            .unwrap();
        assert!(matches!(
            gone.deliver(&OutboundMessage::reply(7, "x")).await,
            Err(GatewayError::Unreachable(7))
        ));

        let broken =
            HttpGateway::new(format!("{}/broken", server.url()), None, Duration::from_secs(5))
                .unwrap();
        assert!(matches!(
            broken.deliver(&OutboundMessage::reply(7, "x")).await,
            Err(GatewayError::Rejected(StatusCode::BAD_GATEWAY))
        ));
    }
}
