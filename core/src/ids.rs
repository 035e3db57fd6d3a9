//! Entity identifiers.
//!
//! Every entity is addressed by a UUID wrapped in its own newtype so that an
//! offer id can never be passed where a request id is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id!(
    /// Identity of a registered account (the login owner of profiles and payment methods).
    AccountId
);
define_id!(
    /// Identity of a consumer profile.
    ConsumerId
);
define_id!(
    /// Identity of a provider profile.
    ProviderId
);
define_id!(
    /// Identity of a posted service request.
    RequestId
);
define_id!(
    /// Identity of an offer made on a request.
    OfferId
);
define_id!(
    /// Identity of a registered payment method.
    PaymentMethodId
);
define_id!(
    /// Identity of a ledger row.
    PaymentCommandId
);
define_id!(
    /// Identity of a persisted notification.
    NotificationId
);
define_id!(
    /// Identity of a review left on a completed request.
    ReviewId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_uuid() {
        let uuid = Uuid::new_v4();
        let id = RequestId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), &uuid);
        assert_eq!(id.to_string(), uuid.to_string());
    }

    #[test]
    fn ids_serialize_as_bare_uuid() {
        let id = OfferId::new();
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
    }
}
