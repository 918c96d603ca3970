//! Identifier and revision newtypes.
//!
//! Product IDs are opaque strings chosen by the storefront; the client never
//! interprets them beyond equality. Revisions are the server's monotonic
//! cart version counter.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ProductId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductIdError {
    /// The input string is empty (after trimming).
    #[error("product id cannot be empty")]
    Empty,
}

/// Opaque identifier of a cart line's product.
///
/// Unique key within the operation queue: at most one pending operation
/// exists per `ProductId`. Deserialization applies the same rules as
/// [`ProductId::parse`].
///
/// ## Examples
///
/// ```
/// use cartsync_core::ProductId;
///
/// assert!(ProductId::parse("42").is_ok());
/// assert_eq!(ProductId::parse("  sku 7 ").unwrap().as_str(), "sku 7");
///
/// assert!(ProductId::parse("").is_err());
/// assert!(ProductId::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductId(String);

impl ProductId {
    /// Parse a product ID, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty.
    pub fn parse(s: &str) -> Result<Self, ProductIdError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ProductIdError::Empty);
        }
        Ok(Self(s.to_owned()))
    }

    /// Get the product ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProductId {
    type Error = ProductIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ProductId> for String {
    fn from(id: ProductId) -> Self {
        id.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl core::str::FromStr for ProductId {
    type Err = ProductIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Last server-acknowledged cart revision.
///
/// Starts at 0 and only moves forward: [`ClientRevision::advance`] refuses
/// to regress, so out-of-order responses can be detected as stale.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClientRevision(u64);

impl ClientRevision {
    /// Create a revision from a raw value.
    #[must_use]
    pub const fn new(rev: u64) -> Self {
        Self(rev)
    }

    /// Get the underlying value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Whether a server revision is older than this one.
    #[must_use]
    pub const fn is_stale(&self, server_rev: Self) -> bool {
        server_rev.0 < self.0
    }

    /// Move forward to `server_rev`.
    ///
    /// Returns `false` (and leaves the revision untouched) if `server_rev`
    /// is older than the current revision.
    pub const fn advance(&mut self, server_rev: Self) -> bool {
        if self.is_stale(server_rev) {
            return false;
        }
        self.0 = server_rev.0;
        true
    }
}

impl fmt::Display for ClientRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ClientRevision {
    fn from(rev: u64) -> Self {
        Self(rev)
    }
}

impl From<ClientRevision> for u64 {
    fn from(rev: ClientRevision) -> Self {
        rev.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_trims() {
        let id = ProductId::parse("  42 ").unwrap();
        assert_eq!(id.as_str(), "42");
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_product_id_rejects_empty() {
        assert_eq!(ProductId::parse("   "), Err(ProductIdError::Empty));
    }

    #[test]
    fn test_product_id_is_opaque() {
        assert_eq!(ProductId::parse("a b").unwrap().as_str(), "a b");
        let long = "x".repeat(200);
        assert_eq!(ProductId::parse(&long).unwrap().as_str(), long);
    }

    #[test]
    fn test_product_id_serializes_as_string() {
        let id = ProductId::parse("42").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"42\"");
    }

    #[test]
    fn test_product_id_deserializes_like_parse() {
        let id: ProductId = serde_json::from_str("\" sku 7 \"").unwrap();
        assert_eq!(id, ProductId::parse("sku 7").unwrap());
        assert!(serde_json::from_str::<ProductId>("\"  \"").is_err());
    }

    #[test]
    fn test_revision_starts_at_zero() {
        assert_eq!(ClientRevision::default().as_u64(), 0);
    }

    #[test]
    fn test_revision_advances() {
        let mut rev = ClientRevision::default();
        assert!(rev.advance(ClientRevision::new(3)));
        assert_eq!(rev.as_u64(), 3);
        // Same revision is not stale (idempotent reconcile)
        assert!(rev.advance(ClientRevision::new(3)));
        assert_eq!(rev.as_u64(), 3);
    }

    #[test]
    fn test_revision_never_regresses() {
        let mut rev = ClientRevision::new(7);
        assert!(rev.is_stale(ClientRevision::new(6)));
        assert!(!rev.advance(ClientRevision::new(6)));
        assert_eq!(rev.as_u64(), 7);
    }
}
