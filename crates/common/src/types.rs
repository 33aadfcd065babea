use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype with the usual conversions.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
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

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Storage-native product key assigned by the catalog.
    ProductId
);

uuid_id!(
    /// Identifier of a single sale ledger entry.
    SaleId
);

uuid_id!(
    /// Identifier shared by every ledger entry written for one checkout attempt.
    CheckoutId
);

/// Outcome of checking whether a caller-supplied string is a well-formed product key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierCheck {
    Valid(ProductId),
    Invalid,
}

impl IdentifierCheck {
    /// Returns the parsed id when the check passed.
    pub fn valid(self) -> Option<ProductId> {
        match self {
            IdentifierCheck::Valid(id) => Some(id),
            IdentifierCheck::Invalid => None,
        }
    }
}

impl ProductId {
    /// Validates the shape of a raw identifier without touching storage.
    ///
    /// Surrounding whitespace is ignored. Anything that is not a UUID,
    /// including the empty string, is [`IdentifierCheck::Invalid`].
    pub fn parse(raw: &str) -> IdentifierCheck {
        match Uuid::parse_str(raw.trim()) {
            Ok(uuid) => IdentifierCheck::Valid(Self(uuid)),
            Err(_) => IdentifierCheck::Invalid,
        }
    }
}

/// Opaque buyer identity (typically an email) forwarded by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuyerId(String);

impl BuyerId {
    const ANONYMOUS: &'static str = "anonymous";

    /// Creates a buyer identity; blank input becomes the anonymous buyer.
    pub fn new(identity: impl Into<String>) -> Self {
        let identity = identity.into();
        let trimmed = identity.trim();
        if trimmed.is_empty() {
            Self::anonymous()
        } else {
            Self(trimmed.to_string())
        }
    }

    /// The identity used when the caller is not authenticated.
    pub fn anonymous() -> Self {
        Self(Self::ANONYMOUS.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BuyerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BuyerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for BuyerId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_id_new_creates_unique_ids() {
        let id1 = ProductId::new();
        let id2 = ProductId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn product_id_parse_accepts_uuid() {
        let id = ProductId::new();
        assert_eq!(ProductId::parse(&id.to_string()), IdentifierCheck::Valid(id));
        assert_eq!(
            ProductId::parse(&format!("  {id}\n")),
            IdentifierCheck::Valid(id)
        );
    }

    #[test]
    fn product_id_parse_rejects_malformed_input() {
        assert_eq!(ProductId::parse("zzz"), IdentifierCheck::Invalid);
        assert_eq!(ProductId::parse(""), IdentifierCheck::Invalid);
        assert_eq!(
            ProductId::parse("507f1f77bcf86cd799439011"),
            IdentifierCheck::Invalid
        );
        assert_eq!(ProductId::parse("zzz").valid(), None);
    }

    #[test]
    fn sale_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = SaleId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn checkout_id_serialization_roundtrip() {
        let id = CheckoutId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: CheckoutId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn blank_buyer_is_anonymous() {
        assert_eq!(BuyerId::new("   "), BuyerId::anonymous());
        assert_eq!(BuyerId::new(" ana@example.com ").as_str(), "ana@example.com");
    }
}
