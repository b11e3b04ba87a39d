//! RabbitMQ publisher speaking AMQP 0-9-1.
//!
//! Every publish opens its own connection and channel, declares the
//! destination queue, publishes through the default exchange with the queue
//! name as routing key, and closes the connection again. The connection is
//! held by a [`ScopedConnection`] so it is closed on every exit path,
//! including when the caller drops the publish on a timeout.

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::uri::{AMQPUri, AMQPUserInfo};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use patio_core::config::{AmqpConfig, Secret};
use tracing::debug;

use super::{Message, NotificationError, NotificationPublisher};

/// The default exchange routes by queue name.
const DEFAULT_EXCHANGE: &str = "";

/// AMQP reply-success.
const REPLY_SUCCESS: u16 = 200;

/// Transient delivery, matching the non-durable default queue.
const DELIVERY_MODE_TRANSIENT: u8 = 1;

/// Publisher for a single RabbitMQ virtual host.
#[derive(Debug)]
pub struct RabbitPublisher {
    /// Broker address with login and vhost applied. The password is left
    /// empty here and only filled in when connecting.
    uri: AMQPUri,
    password: Secret,
    durable: bool,
}

impl RabbitPublisher {
    /// Build a publisher from broker settings and the login password.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Endpoint` when `config.url` is not an
    /// AMQP URL.
    pub fn new(config: &AmqpConfig, password: Secret) -> Result<Self, NotificationError> {
        let mut uri: AMQPUri = config
            .url
            .parse()
            .map_err(|e: String| NotificationError::Endpoint(format!("{}: {e}", config.url)))?;
        uri.authority.userinfo = AMQPUserInfo {
            username: config.login.clone(),
            password: String::new(),
        };
        uri.vhost.clone_from(&config.vhost);

        debug!(
            host = %uri.authority.host,
            port = uri.authority.port,
            vhost = %uri.vhost,
            "RabbitMQ publisher initialized"
        );
        Ok(Self {
            uri,
            password,
            durable: config.durable,
        })
    }

    fn connect_uri(&self) -> AMQPUri {
        let mut uri = self.uri.clone();
        uri.authority.userinfo.password = self.password.expose().to_string();
        uri
    }
}

#[async_trait]
impl NotificationPublisher for RabbitPublisher {
    async fn publish(
        &self,
        destination: &str,
        message: &Message,
    ) -> Result<(), NotificationError> {
        let connection = ScopedConnection::open(self.connect_uri()).await?;
        let outcome = connection.publish(destination, message, self.durable).await;
        connection.close().await;
        outcome
    }
}

/// A broker connection owned by one publish.
///
/// [`ScopedConnection::close`] closes it in place. If the value is dropped
/// instead, the close is handed to the runtime.
struct ScopedConnection {
    inner: Option<Connection>,
}

impl ScopedConnection {
    async fn open(uri: AMQPUri) -> Result<Self, NotificationError> {
        let connection = Connection::connect_uri(uri, ConnectionProperties::default())
            .await
            .map_err(|e| NotificationError::Connect(e.to_string()))?;
        debug!("Broker connection opened");
        Ok(Self {
            inner: Some(connection),
        })
    }

    async fn publish(
        &self,
        queue: &str,
        message: &Message,
        durable: bool,
    ) -> Result<(), NotificationError> {
        let Some(connection) = &self.inner else {
            return Err(NotificationError::Channel("connection already closed".into()));
        };
        let channel = connection.create_channel().await.map_err(channel_error)?;
        let outcome = deliver(&channel, queue, message, durable).await;
        if let Err(e) = channel.close(REPLY_SUCCESS, "publish done").await {
            debug!(error = %e, "Broker channel close failed");
        }
        outcome
    }

    async fn close(mut self) {
        if let Some(connection) = self.inner.take() {
            match connection.close(REPLY_SUCCESS, "publish done").await {
                Ok(()) => debug!("Broker connection closed"),
                Err(e) => debug!(error = %e, "Broker connection close failed"),
            }
        }
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        let Some(connection) = self.inner.take() else {
            return;
        };
        debug!("Broker connection released after an abandoned publish");
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = connection.close(REPLY_SUCCESS, "publish abandoned").await;
            });
        }
    }
}

/// Declare `queue` and publish `message` to it with publisher confirms.
async fn deliver(
    channel: &Channel,
    queue: &str,
    message: &Message,
    durable: bool,
) -> Result<(), NotificationError> {
    channel
        .confirm_select(ConfirmSelectOptions::default())
        .await
        .map_err(channel_error)?;
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(channel_error)?;

    let confirmation = channel
        .basic_publish(
            DEFAULT_EXCHANGE,
            queue,
            BasicPublishOptions {
                mandatory: true,
                ..BasicPublishOptions::default()
            },
            &message.body,
            properties(message),
        )
        .await
        .map_err(channel_error)?
        .await
        .map_err(channel_error)?;

    check_confirmation(queue, &confirmation)?;
    debug!(queue, bytes = message.body.len(), "Message published");
    Ok(())
}

fn properties(message: &Message) -> BasicProperties {
    let mut headers = FieldTable::default();
    for (key, value) in &message.headers {
        headers.insert(
            ShortString::from(key.clone()),
            AMQPValue::LongString(LongString::from(value.clone())),
        );
    }
    BasicProperties::default()
        .with_content_type(ShortString::from(message.content_type.clone()))
        .with_delivery_mode(DELIVERY_MODE_TRANSIENT)
        .with_headers(headers)
}

/// A mandatory message that comes back with its ack was not routed.
fn check_confirmation(queue: &str, confirmation: &Confirmation) -> Result<(), NotificationError> {
    match confirmation {
        Confirmation::Ack(None) | Confirmation::NotRequested => Ok(()),
        Confirmation::Ack(Some(_)) => Err(NotificationError::Unrouted(queue.to_string())),
        Confirmation::Nack(_) => Err(NotificationError::Refused(queue.to_string())),
    }
}

fn channel_error(e: lapin::Error) -> NotificationError {
    NotificationError::Channel(e.to_string())
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(url: &str) -> AmqpConfig {
        AmqpConfig {
            url: url.to_string(),
            ..AmqpConfig::default()
        }
    }

    fn publisher(url: &str) -> RabbitPublisher {
        RabbitPublisher::new(&config(url), Secret::from("guest".to_string())).unwrap()
    }

    fn device_message() -> Message {
        Message::new("application/json", br#"{"config":0}"#.to_vec())
            .with_header("device", "45:36:17:E3:1C:70")
    }

    #[test]
    fn login_and_vhost_come_from_config() {
        let cfg = AmqpConfig {
            url: "amqp://broker.example.com:5673".to_string(),
            login: "hub".to_string(),
            vhost: "patio".to_string(),
            ..AmqpConfig::default()
        };
        let p = RabbitPublisher::new(&cfg, Secret::from("s3cret-broker".to_string())).unwrap();

        let uri = p.connect_uri();
        assert_eq!(uri.authority.host, "broker.example.com");
        assert_eq!(uri.authority.port, 5673);
        assert_eq!(uri.authority.userinfo.username, "hub");
        assert_eq!(uri.authority.userinfo.password, "s3cret-broker");
        assert_eq!(uri.vhost, "patio");
    }

    #[test]
    fn default_vhost_is_root() {
        let uri = publisher("amqp://localhost:5672").connect_uri();
        assert_eq!(uri.vhost, "/");
        assert_eq!(uri.authority.userinfo.username, "guest");
    }

    #[test]
    fn unusable_url_is_rejected() {
        let err =
            RabbitPublisher::new(&config("not a url"), Secret::from("x".to_string())).unwrap_err();
        assert!(matches!(err, NotificationError::Endpoint(_)), "got {err}");

        let err = RabbitPublisher::new(
            &config("http://localhost:15672"),
            Secret::from("x".to_string()),
        )
        .unwrap_err();
        assert!(matches!(err, NotificationError::Endpoint(_)), "got {err}");
    }

    #[test]
    fn password_is_not_logged() {
        let p = RabbitPublisher::new(
            &config("amqp://localhost:5672"),
            Secret::from("hunter2-broker".to_string()),
        )
        .unwrap();
        let rendered = format!("{p:?}");
        assert!(!rendered.contains("hunter2-broker"), "{rendered}");
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn message_properties_carry_content_type_and_headers() {
        let props = properties(&device_message());

        assert_eq!(
            props.content_type().as_ref().map(ShortString::as_str),
            Some("application/json")
        );
        assert_eq!(*props.delivery_mode(), Some(DELIVERY_MODE_TRANSIENT));
        let headers = props.headers().as_ref().unwrap();
        assert_eq!(
            headers.inner().get(&ShortString::from("device".to_string())),
            Some(&AMQPValue::LongString(LongString::from(
                "45:36:17:E3:1C:70".to_string()
            )))
        );
    }

    #[test]
    fn confirmations_map_to_outcomes() {
        assert!(check_confirmation("patio.config", &Confirmation::Ack(None)).is_ok());
        assert!(check_confirmation("patio.config", &Confirmation::NotRequested).is_ok());
        assert!(matches!(
            check_confirmation("patio.config", &Confirmation::Nack(None)),
            Err(NotificationError::Refused(ref q)) if q == "patio.config"
        ));
    }

    #[tokio::test]
    async fn unreachable_broker_is_connect_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let p = publisher(&format!("amqp://127.0.0.1:{port}"));

        let err = p
            .publish("patio.config", &device_message())
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::Connect(_)), "got {err}");
    }
}
