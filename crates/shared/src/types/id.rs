//! Typed document names for type-safe references between ERP records.
//!
//! ERP documents are addressed by their human-readable name (`PINV-0001`),
//! so most ids wrap a `String`. Using typed names prevents accidentally passing
//! a `VoucherId` where an `InvoiceId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed document-name wrappers.
macro_rules! typed_name {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Creates a name from anything string-like.
            #[must_use]
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            /// Returns the name as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the name is empty or whitespace only.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self(name.to_string())
            }
        }

        impl From<String> for $name {
            fn from(name: String) -> Self {
                Self(name)
            }
        }
    };
}

typed_name!(InvoiceId, "Name of a purchase invoice.");
typed_name!(VoucherId, "Name of a landed cost (charge) voucher.");
typed_name!(ItemCode, "Code of a stock or service item.");
typed_name!(SupplierId, "Name of a supplier party.");
typed_name!(CompanyId, "Name of a company.");
typed_name!(AccountId, "Name of a chart of accounts entry.");
typed_name!(CurrencyCode, "ISO 4217 currency code.");

/// Unique identifier for an allocation row.
///
/// Derived deterministically (UUID v5) from the row's target, source and
/// position, so recomputing an unchanged group reproduces the same ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationRowId(pub Uuid);

impl AllocationRowId {
    /// Namespace for allocation row ids.
    const NAMESPACE: Uuid = Uuid::from_u128(0x6c61_6e64_6564_4000_8000_616c_6c6f_6321);

    /// Derives the id of the `position`-th row of a source group.
    #[must_use]
    pub fn derive(target: &InvoiceId, source_key: &str, position: usize) -> Self {
        let name = format!("{target}/{source_key}/{position}");
        Self(Uuid::new_v5(&Self::NAMESPACE, name.as_bytes()))
    }

    /// Returns the inner UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for AllocationRowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
