//! Identity types for AgentPay
//!
//! All identity types are strongly typed wrappers around UUIDs to prevent
//! accidental mixing of different ID types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }
    };
}

define_id_type!(AgentId, "agent", "Unique identifier for a spending agent (authorization principal)");
define_id_type!(PolicyId, "policy", "Unique identifier for a policy version");
define_id_type!(IntentId, "intent", "Unique identifier for a purchase intent");
define_id_type!(MandateId, "mandate", "Unique identifier for a signed mandate");
define_id_type!(PaymentId, "payment", "Unique identifier for a payment");
define_id_type!(ReceiptId, "receipt", "Unique identifier for a chained receipt");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let id = MandateId::new();
        let parsed = MandateId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_with_prefix() {
        let id = AgentId::new();
        let prefixed = format!("agent_{}", id.0);
        assert_eq!(AgentId::parse(&prefixed).unwrap(), id);
    }

    #[test]
    fn test_ids_do_not_mix() {
        let uuid = Uuid::new_v4();
        let agent = AgentId::from_uuid(uuid);
        let intent = IntentId::from_uuid(uuid);
        // Same UUID, different types; equality is only defined within a type.
        assert_eq!(agent.as_uuid(), intent.as_uuid());
    }
}
