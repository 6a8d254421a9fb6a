//! Message bus subscription.
//!
//! This module provides:
//! - Broker configuration loaded from the environment
//! - The per-delivery [`NotificationHandler`]
//! - The [`BusSubscriber`] owning the connection and channel lifecycle
//!
//! The subscriber uses lapin (AMQP 0-9-1) against a RabbitMQ topic exchange.

mod error;
mod handler;
mod subscriber;

pub use error::BusError;
pub use handler::{HandleOutcome, NotificationHandler};
pub use subscriber::{
    process_deliveries, BusSubscriber, DeliveryLoopExit, InboundMessage, LoopExitReason,
    SubscriptionState,
};

use anyhow::{Context, Result};

/// Broker connection and binding settings.
#[derive(Clone)]
pub struct BusConfig {
    /// Broker host name.
    pub host: String,

    /// Broker AMQP port.
    pub port: u16,

    /// Broker username.
    pub user: String,

    /// Broker password.
    pub password: String,

    /// Client-provided connection name shown in the broker UI.
    pub client_name: String,

    /// Virtual host.
    pub vhost: String,

    /// Durable queue to declare and consume from.
    pub queue: String,

    /// Topic exchange the identity provider publishes to.
    pub exchange: String,

    /// App segment of the routing-key patterns.
    pub app_id: String,
}

impl std::fmt::Debug for BusConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("client_name", &self.client_name)
            .field("vhost", &self.vhost)
            .field("queue", &self.queue)
            .field("exchange", &self.exchange)
            .field("app_id", &self.app_id)
            .finish()
    }
}

impl BusConfig {
    /// Load configuration from environment variables.
    ///
    /// Host, port, user, password and client name are required.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("Missing message bus setting. Set {key}."))
        };

        let host = required("RABBITMQ_HOST")?;
        let port = required("RABBITMQ_PORT")?
            .parse::<u16>()
            .context("RABBITMQ_PORT must be a port number (0-65535).")?;
        let user = required("RABBITMQ_USER")?;
        let password = required("RABBITMQ_PASSWORD")?;
        let client_name = required("RABBITMQ_CLIENT_NAME")?;

        let vhost = lookup("RABBITMQ_VHOST").unwrap_or_else(|| "/".to_string());
        let queue = lookup("PRIDR_BUS_QUEUE").unwrap_or_else(|| "user-event-service".to_string());
        let exchange = lookup("PRIDR_BUS_EXCHANGE").unwrap_or_else(|| "amq.topic".to_string());
        let app_id = lookup("PRIDR_BUS_APP_ID").unwrap_or_else(|| "pridr".to_string());

        Ok(Self {
            host,
            port,
            user,
            password,
            client_name,
            vhost,
            queue,
            exchange,
            app_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("RABBITMQ_HOST", "rabbitmq".to_string()),
            ("RABBITMQ_PORT", "5672".to_string()),
            ("RABBITMQ_USER", "guest".to_string()),
            ("RABBITMQ_PASSWORD", "s3cret".to_string()),
            ("RABBITMQ_CLIENT_NAME", "UserEventService".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<BusConfig> {
        BusConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_loads_required_and_defaults() {
        let config = load(&full_env()).unwrap();
        assert_eq!(config.host, "rabbitmq");
        assert_eq!(config.port, 5672);
        assert_eq!(config.client_name, "UserEventService");
        assert_eq!(config.vhost, "/");
        assert_eq!(config.queue, "user-event-service");
        assert_eq!(config.exchange, "amq.topic");
        assert_eq!(config.app_id, "pridr");
    }

    #[rstest]
    #[case("RABBITMQ_HOST")]
    #[case("RABBITMQ_PORT")]
    #[case("RABBITMQ_USER")]
    #[case("RABBITMQ_PASSWORD")]
    #[case("RABBITMQ_CLIENT_NAME")]
    fn test_missing_required_setting_is_fatal(#[case] key: &'static str) {
        let mut env = full_env();
        env.remove(key);
        let err = load(&env).unwrap_err();
        assert!(err.to_string().contains(key));
    }

    #[test]
    fn test_blank_required_setting_is_missing() {
        let mut env = full_env();
        env.insert("RABBITMQ_HOST", "  ".to_string());
        assert!(load(&env).is_err());
    }

    #[rstest]
    #[case("amqp")]
    #[case("70000")]
    #[case("-1")]
    fn test_invalid_port(#[case] port: &str) {
        let mut env = full_env();
        env.insert("RABBITMQ_PORT", port.to_string());
        assert!(load(&env).is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = load(&full_env()).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }
}
