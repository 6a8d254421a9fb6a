//! Event kinds recognised by the service.

use crate::Notification;

// =============================================================================
// Event Type Tags
// =============================================================================

/// Upstream `type` tags, as published by the identity provider.
pub mod event_types {
    pub const LOGIN: &str = "LOGIN";
    pub const LOGOUT: &str = "LOGOUT";
    pub const REGISTER: &str = "REGISTER";
    pub const DELETE_ACCOUNT: &str = "DELETE_ACCOUNT";
}

// =============================================================================
// Event Kind
// =============================================================================

/// Semantic kind of an account notification.
///
/// Tags are matched exactly and case-sensitively. Anything not listed here,
/// including new upstream event types, is `Undetermined` so the consumer keeps
/// running when the identity provider starts publishing something new.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Login,
    Logout,
    Register,
    AccountDeleted,
    Undetermined,
}

impl EventKind {
    /// Kinds bound on the exchange, in binding order.
    pub const SUBSCRIBED: [EventKind; 4] = [
        EventKind::Login,
        EventKind::Logout,
        EventKind::Register,
        EventKind::AccountDeleted,
    ];

    /// Maps an upstream `type` tag onto a kind.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            event_types::LOGIN => EventKind::Login,
            event_types::LOGOUT => EventKind::Logout,
            event_types::REGISTER => EventKind::Register,
            event_types::DELETE_ACCOUNT => EventKind::AccountDeleted,
            _ => EventKind::Undetermined,
        }
    }

    /// Classifies a decoded notification.
    pub fn classify(notification: &Notification) -> Self {
        Self::from_tag(notification.event_type())
    }

    /// The upstream tag for this kind; `None` for `Undetermined`.
    pub fn as_tag(&self) -> Option<&'static str> {
        match self {
            EventKind::Login => Some(event_types::LOGIN),
            EventKind::Logout => Some(event_types::LOGOUT),
            EventKind::Register => Some(event_types::REGISTER),
            EventKind::AccountDeleted => Some(event_types::DELETE_ACCOUNT),
            EventKind::Undetermined => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventKind::Login => "login",
            EventKind::Logout => "logout",
            EventKind::Register => "register",
            EventKind::AccountDeleted => "account_deleted",
            EventKind::Undetermined => "undetermined",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("LOGIN", EventKind::Login)]
    #[case("LOGOUT", EventKind::Logout)]
    #[case("REGISTER", EventKind::Register)]
    #[case("DELETE_ACCOUNT", EventKind::AccountDeleted)]
    #[case("PASSWORD_RESET", EventKind::Undetermined)]
    #[case("LOGIN_ERROR", EventKind::Undetermined)]
    #[case("login", EventKind::Undetermined)]
    #[case("Delete_Account", EventKind::Undetermined)]
    #[case(" LOGIN", EventKind::Undetermined)]
    #[case("", EventKind::Undetermined)]
    fn test_from_tag(#[case] tag: &str, #[case] expected: EventKind) {
        assert_eq!(EventKind::from_tag(tag), expected);
    }

    #[test]
    fn test_subscribed_kinds_roundtrip_through_tags() {
        for kind in EventKind::SUBSCRIBED {
            let tag = kind.as_tag().unwrap();
            assert_eq!(EventKind::from_tag(tag), kind);
        }
        assert_eq!(EventKind::Undetermined.as_tag(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(EventKind::AccountDeleted.to_string(), "account_deleted");
        assert_eq!(EventKind::Undetermined.to_string(), "undetermined");
    }

    proptest! {
        #[test]
        fn unknown_tags_are_undetermined(tag in "\\PC*") {
            prop_assume!(!["LOGIN", "LOGOUT", "REGISTER", "DELETE_ACCOUNT"].contains(&tag.as_str()));
            prop_assert_eq!(EventKind::from_tag(&tag), EventKind::Undetermined);
        }
    }
}
