//! Broker connection lifecycle and the delivery loop.
//!
//! The subscriber runs once through these states:
//! 1. `Connecting`: open the connection and a channel
//! 2. `Bound`: declare the durable queue and bind every routing-key pattern
//! 3. `Consuming`: hand each delivery to the handler, one at a time
//! 4. `ShuttingDown` then `Closed`: cancel the consumer, close channel and connection
//!
//! A lost connection ends the run in `Disconnected`. There is no reconnect;
//! the state is published so readiness checks can report it.

use futures_util::{Stream, StreamExt};
use lapin::message::Delivery;
use lapin::options::{
    BasicCancelOptions, BasicConsumeOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};
use lapin::{Channel, Connection, ConnectionProperties};
use pridr_events::SubscriptionBinding;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::{BusConfig, BusError, NotificationHandler};

/// Where the subscriber is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Disconnected,
    Connecting,
    Bound,
    Consuming,
    ShuttingDown,
    Closed,
}

impl SubscriptionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionState::Disconnected => "disconnected",
            SubscriptionState::Connecting => "connecting",
            SubscriptionState::Bound => "bound",
            SubscriptionState::Consuming => "consuming",
            SubscriptionState::ShuttingDown => "shutting_down",
            SubscriptionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parts of a delivery the handler needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub routing_key: String,
    pub body: Vec<u8>,
}

impl From<Delivery> for InboundMessage {
    fn from(delivery: Delivery) -> Self {
        Self {
            routing_key: delivery.routing_key.as_str().to_string(),
            body: delivery.data,
        }
    }
}

/// Why the delivery loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExitReason {
    Shutdown,
    StreamEnded,
    ConnectionLost(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryLoopExit {
    pub processed: u64,
    pub reason: LoopExitReason,
}

/// Feed deliveries to `handler` until shutdown, stream end or a stream error.
///
/// Deliveries are handled strictly in order. Shutdown is only observed
/// between deliveries, so a cleanup in flight always runs to completion.
/// A failed delivery never stops the loop.
pub async fn process_deliveries<S>(
    deliveries: S,
    handler: &NotificationHandler,
    shutdown: &mut watch::Receiver<bool>,
) -> DeliveryLoopExit
where
    S: Stream<Item = Result<InboundMessage, lapin::Error>>,
{
    let mut deliveries = std::pin::pin!(deliveries);
    let mut processed: u64 = 0;

    let exit = |processed, reason| DeliveryLoopExit { processed, reason };

    loop {
        if *shutdown.borrow() {
            return exit(processed, LoopExitReason::Shutdown);
        }

        let next = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return exit(processed, LoopExitReason::Shutdown);
                }
                continue;
            }
            next = deliveries.next() => next,
        };

        match next {
            Some(Ok(message)) => {
                let outcome = handler.handle(&message.routing_key, &message.body).await;
                debug!(outcome = ?outcome, "Delivery handled");
                processed += 1;
            }
            Some(Err(e)) => {
                return exit(processed, LoopExitReason::ConnectionLost(e.to_string()));
            }
            None => return exit(processed, LoopExitReason::StreamEnded),
        }
    }
}

/// Owns the broker connection for one subscription.
pub struct BusSubscriber {
    config: BusConfig,
    binding: SubscriptionBinding,
    handler: NotificationHandler,
    state: watch::Sender<SubscriptionState>,
}

impl BusSubscriber {
    pub fn new(
        config: BusConfig,
        binding: SubscriptionBinding,
        handler: NotificationHandler,
    ) -> Self {
        let (state, _) = watch::channel(SubscriptionState::Disconnected);
        Self {
            config,
            binding,
            handler,
            state,
        }
    }

    /// Subscribe to state changes.
    pub fn state(&self) -> watch::Receiver<SubscriptionState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: SubscriptionState) {
        debug!(state = %state, "Subscription state changed");
        self.state.send_replace(state);
    }

    /// Run the subscription until shutdown or connection loss.
    ///
    /// Startup failures are returned before any delivery is consumed.
    #[instrument(skip_all, name = "bus_subscriber", fields(queue = %self.binding.queue_name()))]
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), BusError> {
        self.set_state(SubscriptionState::Connecting);

        let connection = match self.connect().await {
            Ok(connection) => connection,
            Err(e) => {
                self.set_state(SubscriptionState::Disconnected);
                return Err(e);
            }
        };

        let channel = match self.open_and_bind(&connection).await {
            Ok(channel) => channel,
            Err(e) => {
                self.set_state(SubscriptionState::Disconnected);
                close_connection(&connection).await;
                return Err(e);
            }
        };
        self.set_state(SubscriptionState::Bound);

        let consumer = match channel
            .basic_consume(
                self.binding.queue_name(),
                &self.config.client_name,
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
        {
            Ok(consumer) => consumer,
            Err(source) => {
                self.set_state(SubscriptionState::Disconnected);
                close_connection(&connection).await;
                return Err(BusError::Consume {
                    queue: self.binding.queue_name().to_string(),
                    source,
                });
            }
        };
        let consumer_tag = consumer.tag().as_str().to_string();

        self.set_state(SubscriptionState::Consuming);
        info!(consumer_tag = %consumer_tag, "Consuming account notifications");

        let deliveries = consumer.map(|delivery| delivery.map(InboundMessage::from));
        let exit = process_deliveries(deliveries, &self.handler, &mut shutdown).await;

        match exit.reason {
            LoopExitReason::Shutdown => {
                info!(processed = exit.processed, "Shutdown signal received, closing subscription");
                self.set_state(SubscriptionState::ShuttingDown);

                if channel.status().connected() {
                    if let Err(e) = channel
                        .basic_cancel(&consumer_tag, BasicCancelOptions::default())
                        .await
                    {
                        warn!(error = %e, "Failed to cancel consumer");
                    }
                }
                close_channel(&channel).await;
                close_connection(&connection).await;

                self.set_state(SubscriptionState::Closed);
                info!("Subscription closed");
                Ok(())
            }
            LoopExitReason::StreamEnded => {
                warn!(processed = exit.processed, "Delivery stream ended");
                self.set_state(SubscriptionState::Disconnected);
                close_channel(&channel).await;
                close_connection(&connection).await;
                Err(BusError::ConsumerCancelled)
            }
            LoopExitReason::ConnectionLost(reason) => {
                error!(
                    processed = exit.processed,
                    error = %reason,
                    "Message bus connection lost, no further notifications will be consumed"
                );
                self.set_state(SubscriptionState::Disconnected);
                Err(BusError::ConnectionLost(reason))
            }
        }
    }

    async fn connect(&self) -> Result<Connection, BusError> {
        let uri = AMQPUri {
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.config.user.clone(),
                    password: self.config.password.clone(),
                },
                host: self.config.host.clone(),
                port: self.config.port,
            },
            vhost: self.config.vhost.clone(),
            ..Default::default()
        };
        let properties = ConnectionProperties::default()
            .with_connection_name(self.config.client_name.clone().into());

        info!(
            host = %self.config.host,
            port = self.config.port,
            vhost = %self.config.vhost,
            "Connecting to message bus"
        );

        let connection = Connection::connect_uri(uri, properties)
            .await
            .map_err(|source| BusError::Connect {
                host: self.config.host.clone(),
                port: self.config.port,
                source,
            })?;

        connection.on_error(|e| {
            error!(error = %e, "Message bus connection error");
        });

        Ok(connection)
    }

    async fn open_and_bind(&self, connection: &Connection) -> Result<Channel, BusError> {
        let channel = connection.create_channel().await.map_err(BusError::Channel)?;
        let queue = self.binding.queue_name();

        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|source| BusError::Declare {
                queue: queue.to_string(),
                source,
            })?;

        for pattern in self.binding.routing_key_patterns() {
            channel
                .queue_bind(
                    queue,
                    self.binding.exchange_name(),
                    pattern,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|source| BusError::Bind {
                    queue: queue.to_string(),
                    exchange: self.binding.exchange_name().to_string(),
                    routing_key: pattern.clone(),
                    source,
                })?;
            info!(
                exchange = %self.binding.exchange_name(),
                routing_key = %pattern,
                "Queue bound"
            );
        }

        Ok(channel)
    }
}

async fn close_channel(channel: &Channel) {
    if !channel.status().connected() {
        return;
    }
    if let Err(e) = channel.close(200, "subscriber shutdown").await {
        warn!(error = %e, "Failed to close channel");
    }
}

async fn close_connection(connection: &Connection) {
    if !connection.status().connected() {
        return;
    }
    if let Err(e) = connection.close(200, "subscriber shutdown").await {
        warn!(error = %e, "Failed to close connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{FailPoint, MemoryRecordStore};
    use futures_util::stream;
    use std::sync::Arc;

    const DELETE_KEY: &str = "KK.EVENT.CLIENT.pridr.SUCCESS.pridr-web.DELETE_ACCOUNT";

    fn message(body: &str) -> Result<InboundMessage, lapin::Error> {
        Ok(InboundMessage {
            routing_key: DELETE_KEY.to_string(),
            body: body.as_bytes().to_vec(),
        })
    }

    fn handler(store: &MemoryRecordStore) -> NotificationHandler {
        NotificationHandler::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_stop_the_loop() {
        let store = MemoryRecordStore::with_records(&[(1, "U1"), (2, "U1"), (3, "U2")]);
        store.fail_once(FailPoint::Commit);
        let (_tx, mut shutdown) = watch::channel(false);

        let deliveries = stream::iter(vec![
            message(r#"{"type":"DELETE_ACCOUNT","userId":"U1"}"#),
            message(r#"{"type":"DELETE_ACCOUNT","userId":"U1"}"#),
        ]);
        let exit = process_deliveries(deliveries, &handler(&store), &mut shutdown).await;

        assert_eq!(
            exit,
            DeliveryLoopExit {
                processed: 2,
                reason: LoopExitReason::StreamEnded,
            }
        );
        assert_eq!(store.snapshot(), vec![(3, "U2".to_string())]);
        assert_eq!(store.commits(), 1);
    }

    #[tokio::test]
    async fn test_malformed_delivery_is_skipped() {
        let store = MemoryRecordStore::with_records(&[(1, "U1")]);
        let (_tx, mut shutdown) = watch::channel(false);

        let deliveries = stream::iter(vec![
            message("{{{"),
            message(r#"{"type":"DELETE_ACCOUNT","userId":"U1"}"#),
        ]);
        let exit = process_deliveries(deliveries, &handler(&store), &mut shutdown).await;

        assert_eq!(exit.processed, 2);
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_loop() {
        let store = MemoryRecordStore::default();
        let (tx, mut shutdown) = watch::channel(false);
        let handler = handler(&store);

        let run = tokio::spawn(async move {
            process_deliveries(stream::pending(), &handler, &mut shutdown).await
        });
        tx.send(true).unwrap();

        let exit = run.await.unwrap();
        assert_eq!(exit.reason, LoopExitReason::Shutdown);
        assert_eq!(exit.processed, 0);
    }

    #[tokio::test]
    async fn test_shutdown_already_requested() {
        let store = MemoryRecordStore::with_records(&[(1, "U1")]);
        let (_tx, mut shutdown) = watch::channel(true);

        let deliveries = stream::iter(vec![message(r#"{"type":"DELETE_ACCOUNT","userId":"U1"}"#)]);
        let exit = process_deliveries(deliveries, &handler(&store), &mut shutdown).await;

        assert_eq!(exit.reason, LoopExitReason::Shutdown);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_error_is_connection_loss() {
        let store = MemoryRecordStore::with_records(&[(1, "U1")]);
        let (_tx, mut shutdown) = watch::channel(false);

        let deliveries = stream::iter(vec![
            message(r#"{"type":"LOGIN","userId":"U1"}"#),
            Err(lapin::Error::ChannelsLimitReached),
            message(r#"{"type":"DELETE_ACCOUNT","userId":"U1"}"#),
        ]);
        let exit = process_deliveries(deliveries, &handler(&store), &mut shutdown).await;

        assert_eq!(exit.processed, 1);
        assert!(matches!(exit.reason, LoopExitReason::ConnectionLost(_)));
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(SubscriptionState::Consuming.to_string(), "consuming");
        assert_eq!(SubscriptionState::ShuttingDown.to_string(), "shutting_down");
    }

    #[test]
    fn test_new_subscriber_starts_disconnected() {
        let config = BusConfig {
            host: "localhost".to_string(),
            port: 5672,
            user: "guest".to_string(),
            password: "guest".to_string(),
            client_name: "test".to_string(),
            vhost: "/".to_string(),
            queue: "user-event-service".to_string(),
            exchange: "amq.topic".to_string(),
            app_id: "pridr".to_string(),
        };
        let binding =
            SubscriptionBinding::for_app(&config.queue, &config.exchange, &config.app_id).unwrap();
        let subscriber = BusSubscriber::new(
            config,
            binding,
            handler(&MemoryRecordStore::default()),
        );

        assert_eq!(*subscriber.state().borrow(), SubscriptionState::Disconnected);
    }
}
