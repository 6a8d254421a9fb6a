//! # pridr-id
//!
//! Identifier types shared by the pridr event service.
//!
//! Three kinds of identifier cross the service boundary:
//!
//! - [`AccountId`]: the subject issued by the identity provider. It arrives
//!   in bus notifications (`userId`) and in bearer tokens (`sub`) and is
//!   stored verbatim as the owner of every user event.
//! - [`UserEventId`]: the integer key the relational store assigns to a
//!   user event.
//! - [`RequestId`]: a prefixed ULID (`req_…`) used to correlate HTTP
//!   requests with log lines and problem responses.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
