//! Outbound notifications to devices.
//!
//! Devices pick up configuration changes from a message queue. This module
//! provides:
//! - [`NotificationPublisher`], the seam the sync orchestrator publishes
//!   through
//! - [`Message`], the content type, headers and opaque body sent
//! - [`RabbitPublisher`], a publisher speaking AMQP 0-9-1 to RabbitMQ

pub mod rabbit;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

pub use rabbit::RabbitPublisher;

/// Errors that can occur while publishing a notification.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// The broker could not be reached or refused the login.
    #[error("Broker connection error: {0}")]
    Connect(String),

    /// The broker URL could not be parsed.
    #[error("Invalid broker endpoint: {0}")]
    Endpoint(String),

    /// Opening the channel, declaring the queue or publishing failed.
    #[error("Broker channel error: {0}")]
    Channel(String),

    /// The broker negatively acknowledged the message.
    #[error("Broker refused message for {0}")]
    Refused(String),

    /// The broker accepted the message but no queue received it.
    #[error("Message for {0} was not routed to any queue")]
    Unrouted(String),

    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),
}

/// A message bound for a device queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub content_type: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl Message {
    pub fn new(content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            headers: BTreeMap::new(),
            body,
        }
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Publishes messages to a named destination.
///
/// A call returns once the broker has accepted or refused the message.
/// Delivery is at-most-once and implementations never retry on their own.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, destination: &str, message: &Message)
    -> Result<(), NotificationError>;
}
