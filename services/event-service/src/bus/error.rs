//! Message bus error types.

use thiserror::Error;

/// Failures of the bus subscription.
#[derive(Debug, Error)]
pub enum BusError {
    /// Failed to open the broker connection.
    #[error("failed to connect to message bus at {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: lapin::Error,
    },

    /// Failed to open a channel on the connection.
    #[error("failed to open channel: {0}")]
    Channel(#[source] lapin::Error),

    /// Failed to declare the queue.
    #[error("failed to declare queue '{queue}': {source}")]
    Declare {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    /// Failed to bind the queue on the exchange.
    #[error("failed to bind queue '{queue}' to '{exchange}' with '{routing_key}': {source}")]
    Bind {
        queue: String,
        exchange: String,
        routing_key: String,
        #[source]
        source: lapin::Error,
    },

    /// Failed to start consuming.
    #[error("failed to start consuming from '{queue}': {source}")]
    Consume {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    /// The connection or channel dropped while consuming.
    #[error("message bus connection lost: {0}")]
    ConnectionLost(String),

    /// The broker ended the delivery stream.
    #[error("consumer was cancelled by the broker")]
    ConsumerCancelled,
}
