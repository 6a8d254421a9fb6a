//! Notification decoding.

use chrono::{DateTime, Utc};
use pridr_id::AccountId;
use serde::Deserialize;

use crate::{DecodeError, EventKind};

/// Wire shape of a Keycloak event as published on the exchange.
///
/// Only the fields this service reads are listed; serde ignores the rest
/// (`ipAddress`, `sessionId`, `details`, ...).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeycloakEventDto {
    #[serde(rename = "type")]
    event_type: Option<String>,
    user_id: Option<serde_json::Value>,
    account_id: Option<serde_json::Value>,
    realm_id: Option<String>,
    client_id: Option<String>,
    time: Option<serde_json::Value>,
}

/// A decoded account notification.
///
/// Exists only for the duration of one delivery and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    event_type: String,
    account_id: Option<AccountId>,
    realm_id: Option<String>,
    client_id: Option<String>,
    occurred_at: Option<DateTime<Utc>>,
}

/// A string id that parses as an [`AccountId`]; anything else is absent.
fn usable_account_id(value: Option<&serde_json::Value>) -> Option<AccountId> {
    value
        .and_then(serde_json::Value::as_str)
        .and_then(|id| AccountId::parse(id).ok())
}

impl Notification {
    /// Decodes a UTF-8 JSON delivery body.
    ///
    /// Fails when the body is not UTF-8, not a JSON object, or has no string
    /// `type`. An unusable account id (missing, blank, not a string, too
    /// long) is not an error: the identity provider emits some events
    /// without a user. `userId` wins over `accountId` when both are usable.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(raw).map_err(|e| DecodeError::InvalidUtf8(e.to_string()))?;
        let dto: KeycloakEventDto = serde_json::from_str(text)?;

        let event_type = dto.event_type.ok_or(DecodeError::MissingType)?;
        let account_id = usable_account_id(dto.user_id.as_ref())
            .or_else(|| usable_account_id(dto.account_id.as_ref()));
        let occurred_at = dto
            .time
            .as_ref()
            .and_then(serde_json::Value::as_i64)
            .and_then(DateTime::from_timestamp_millis);

        Ok(Self {
            event_type,
            account_id,
            realm_id: dto.realm_id,
            client_id: dto.client_id,
            occurred_at,
        })
    }

    /// Builds a notification directly, mostly for tests and replays.
    pub fn new(event_type: impl Into<String>, account_id: Option<AccountId>) -> Self {
        Self {
            event_type: event_type.into(),
            account_id,
            realm_id: None,
            client_id: None,
            occurred_at: None,
        }
    }

    /// The raw upstream `type` tag.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The affected account, when the event names one.
    pub fn account_id(&self) -> Option<&AccountId> {
        self.account_id.as_ref()
    }

    pub fn realm_id(&self) -> Option<&str> {
        self.realm_id.as_deref()
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// When the identity provider recorded the event.
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        self.occurred_at
    }

    /// Shorthand for [`EventKind::classify`].
    pub fn kind(&self) -> EventKind {
        EventKind::classify(self)
    }
}

// =============================================================================
// Tests
// =============================================================================
