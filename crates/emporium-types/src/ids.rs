//! Type-safe identifier wrappers.
//!
//! Entities stored in the document store carry monotonically assigned
//! integer ids. Each entity kind gets its own newtype so a factory id can
//! never be passed where a company id is expected. Sessions are keyed by
//! a 32-character alphanumeric code instead, and users by their external
//! chat id (which may be negative for group chats).

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `u64` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Return the inner integer value.
            pub const fn into_inner(self) -> u64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl From<$name> for serde_json::Value {
            fn from(id: $name) -> Self {
                Self::from(id.0)
            }
        }
    };
}

define_id! {
    /// Unique identifier for a company.
    CompanyId
}

define_id! {
    /// Unique identifier for a factory owned by a company.
    FactoryId
}

define_id! {
    /// Unique identifier for an exchange offer.
    ExchangeId
}

define_id! {
    /// Unique identifier for a supply contract.
    ContractId
}

define_id! {
    /// Unique identifier for a wall-clock scheduled task.
    TimeTaskId
}

define_id! {
    /// Unique identifier for a step-schedule record.
    StepScheduleId
}

define_id! {
    /// Unique identifier for a per-turn statistic snapshot.
    StatisticId
}

/// External participant identifier (the chat id of the user).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<UserId> for serde_json::Value {
    fn from(id: UserId) -> Self {
        Self::from(id.0)
    }
}

/// Session code: 32 alphanumeric characters, unique per process.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Length of generated session codes.
    pub const LENGTH: usize = 32;

    /// Borrow the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(code: &str) -> Self {
        Self(code.to_owned())
    }
}

impl From<String> for SessionId {
    fn from(code: String) -> Self {
        Self(code)
    }
}

impl From<SessionId> for serde_json::Value {
    fn from(id: SessionId) -> Self {
        Self::String(id.0)
    }
}

impl From<&SessionId> for serde_json::Value {
    fn from(id: &SessionId) -> Self {
        Self::String(id.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_bare_numbers() {
        let json = serde_json::to_string(&CompanyId(7)).unwrap_or_default();
        assert_eq!(json, "7");
        let back: FactoryId = serde_json::from_str("12").unwrap_or_default();
        assert_eq!(back, FactoryId(12));
    }

    #[test]
    fn session_id_serializes_as_string() {
        let id = SessionId::from("ABC123");
        let json = serde_json::to_value(&id).unwrap_or_default();
        assert_eq!(json, serde_json::Value::String(String::from("ABC123")));
        assert_eq!(id.to_string(), "ABC123");
    }

    #[test]
    fn user_ids_may_be_negative() {
        let back: UserId = serde_json::from_str("-1001").unwrap_or_default();
        assert_eq!(back, UserId(-1001));
    }
}
