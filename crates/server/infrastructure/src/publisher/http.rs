//! HTTP event publisher
//!
//! One authenticated POST per publish call, no batching across calls and no
//! internal retry. The request body carries each event as its own JSON
//! string inside the outer array — the double encoding is the wire format of
//! the downstream transport and is preserved byte-for-byte.

use async_trait::async_trait;
use printfleet_server_domain::publisher::{
    EventPublisher, MAX_EVENTS_PER_PUBLISH, MAX_PUBLISH_BYTES, PublishError,
};
use printfleet_server_domain::signer::ChannelSigner;
use printfleet_shared::auth::{Principal, SignDirection};
use printfleet_shared::channel::Channel;
use printfleet_shared::config::RealtimeConfig;
use printfleet_shared::events::Event;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use tracing::debug;

pub struct HttpEventPublisher {
    client: reqwest::Client,
    publish_url: String,
    signer: Arc<dyn ChannelSigner>,
    principal: Principal,
}

impl HttpEventPublisher {
    pub fn new(
        realtime: &RealtimeConfig,
        signer: Arc<dyn ChannelSigner>,
        principal: Principal,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            publish_url: format!("{}/event", realtime.http_endpoint.trim_end_matches('/')),
            signer,
            principal,
        }
    }

    /// Builds the publish body: `{ "channel": ..., "events": [<string>...] }`.
    fn build_body(channel: &Channel, events: &[Event]) -> Result<String, PublishError> {
        let encoded: Vec<String> = events
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<_, _>>()
            .map_err(|e| PublishError::Serialization(e.to_string()))?;

        serde_json::to_string(&serde_json::json!({
            "channel": channel.as_str(),
            "events": encoded,
        }))
        .map_err(|e| PublishError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl EventPublisher for HttpEventPublisher {
    async fn publish(&self, channel: &Channel, events: &[Event]) -> Result<(), PublishError> {
        if events.is_empty() {
            return Err(PublishError::EmptyBatch);
        }
        if events.len() > MAX_EVENTS_PER_PUBLISH {
            return Err(PublishError::TooManyEvents {
                count: events.len(),
            });
        }

        let body = Self::build_body(channel, events)?;
        if body.len() > MAX_PUBLISH_BYTES {
            return Err(PublishError::PayloadTooLarge { bytes: body.len() });
        }

        // Fresh signature per request; signed material is never reused.
        let auth = self
            .signer
            .sign(SignDirection::Publish, channel, &self.principal)
            .await?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/json; charset=UTF-8"),
        );
        headers.insert("content-encoding", HeaderValue::from_static("amz-1.0"));
        headers.insert(
            "accept",
            HeaderValue::from_static("application/json, text/javascript"),
        );
        for (name, value) in &auth.headers {
            // The HTTP stack owns the host header; the signed copy stays in
            // the material for verification.
            if name == "host" {
                continue;
            }
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| PublishError::Transport(e.to_string()))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| PublishError::Transport(e.to_string()))?;
            headers.insert(header_name, header_value);
        }

        debug!(
            channel = %channel,
            events = events.len(),
            bytes = body.len(),
            "Publishing events"
        );

        let response = self
            .client
            .post(&self.publish_url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
