//! # pridr-events
//!
//! Account lifecycle notifications published by the identity provider
//! (Keycloak) onto a topic exchange.
//!
//! ## Pipeline
//!
//! - [`Notification::decode`] turns a raw delivery body into a
//!   [`Notification`]. Malformed bodies yield a [`DecodeError`].
//! - [`EventKind::classify`] maps the notification's `type` tag onto a closed
//!   set of kinds, with [`EventKind::Undetermined`] for everything else.
//! - [`SubscriptionBinding`] describes the queue and the routing-key patterns
//!   the consumer binds on the exchange.
//!
//! Nothing in this crate performs I/O.

mod error;
mod notification;
mod routing;
mod types;

pub use error::{BindingError, DecodeError};
pub use notification::Notification;
pub use routing::{routing_action, routing_key_pattern, SubscriptionBinding};
pub use types::*;
