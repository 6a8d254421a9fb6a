//! Routing-key grammar for identity-provider events on a topic exchange.
//!
//! Client events are published under
//! `KK.EVENT.CLIENT.<realm>.<result>.<clientId>.<TYPE>`. The consumer binds
//! one pattern per subscribed kind, pinning the app segment and the
//! `SUCCESS` result and matching any client with `#`:
//!
//! ```text
//! KK.EVENT.CLIENT.pridr.SUCCESS.#.DELETE_ACCOUNT
//! ```

use crate::{BindingError, EventKind};

/// Prefix shared by all client event routing keys.
pub const CLIENT_EVENT_PREFIX: &str = "KK.EVENT.CLIENT";

/// Result segment for successful events.
pub const SUCCESS_SEGMENT: &str = "SUCCESS";

/// Builds the binding pattern for one kind, or `None` for `Undetermined`.
pub fn routing_key_pattern(app_id: &str, kind: EventKind) -> Option<String> {
    let action = kind.as_tag()?;
    Some(format!(
        "{CLIENT_EVENT_PREFIX}.{app_id}.{SUCCESS_SEGMENT}.#.{action}"
    ))
}

/// Kind implied by the last segment of a delivered routing key.
///
/// Diagnostic only: the payload `type` is what the handler acts on.
pub fn routing_action(routing_key: &str) -> EventKind {
    routing_key
        .rsplit('.')
        .next()
        .map(EventKind::from_tag)
        .unwrap_or(EventKind::Undetermined)
}

/// Queue declaration plus the patterns bound on the exchange.
///
/// Established once per connection and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionBinding {
    queue_name: String,
    exchange_name: String,
    routing_key_patterns: Vec<String>,
}

impl SubscriptionBinding {
    /// Binding for every subscribed kind of the given app.
    pub fn for_app(
        queue_name: impl Into<String>,
        exchange_name: impl Into<String>,
        app_id: &str,
    ) -> Result<Self, BindingError> {
        let queue_name = queue_name.into();
        let exchange_name = exchange_name.into();

        if queue_name.trim().is_empty() {
            return Err(BindingError::Empty { field: "queue name" });
        }
        if exchange_name.trim().is_empty() {
            return Err(BindingError::Empty {
                field: "exchange name",
            });
        }
        if app_id.is_empty() {
            return Err(BindingError::Empty { field: "app id" });
        }
        if app_id.contains(['.', '*', '#']) {
            return Err(BindingError::InvalidSegment {
                field: "app id",
                value: app_id.to_string(),
            });
        }

        let routing_key_patterns = EventKind::SUBSCRIBED
            .iter()
            .filter_map(|kind| routing_key_pattern(app_id, *kind))
            .collect();

        Ok(Self {
            queue_name,
            exchange_name,
            routing_key_patterns,
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn exchange_name(&self) -> &str {
        &self.exchange_name
    }

    /// Patterns in binding order.
    pub fn routing_key_patterns(&self) -> &[String] {
        &self.routing_key_patterns
    }
}

// =============================================================================
// Tests
// =============================================================================
