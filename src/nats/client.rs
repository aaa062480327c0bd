use anyhow::{Context, Result};
use async_nats::Client;
use serde::Serialize;
use tracing::{debug, info};

pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client })
    }

    /// Serialize `message` as JSON and publish it on `subject`
    pub async fn publish_json<T: Serialize>(&self, subject: &str, message: &T) -> Result<()> {
        let payload = serde_json::to_vec(message).context("Failed to serialize NATS message")?;
        let bytes = payload.len();

        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .with_context(|| format!("Failed to publish to {}", subject))?;

        debug!("Published {} bytes to {}", bytes, subject);
        Ok(())
    }

    pub async fn subscribe(&self, subject: &str) -> Result<async_nats::Subscriber> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .with_context(|| format!("Failed to subscribe to {}", subject))?;

        info!("Subscribed to {}", subject);
        Ok(subscriber)
    }

    /// Flush pending publishes
    pub async fn flush(&self) -> Result<()> {
        self.client.flush().await.context("Failed to flush NATS connection")?;
        Ok(())
    }
}
