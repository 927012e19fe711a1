//! Self-validating value objects held by the [`Ticket`](crate::ticket::Ticket) aggregate.
//!
//! Every value object:
//!
//! - validates its primitive on construction and is immutable afterwards
//! - compares by value through [`ValueObject::equals`], which is only ever
//!   true for the same concrete kind
//! - converts to and from its storage primitive through [`StoredValue`]
//!
//! # Example
//!
//! ```
//! use ticketing_core::value_object::{Allocation, Name, ValueObject};
//!
//! let name = Name::new("Concert")?;
//! let allocation = Allocation::new(100)?;
//!
//! assert!(name.equals(Some(&Name::new("Concert")?)));
//! assert!(!name.equals(Some(&allocation)));
//! assert!(!name.equals(None));
//! # Ok::<(), ticketing_core::TicketError>(())
//! ```

use crate::error::{Result, TicketError};
use std::any::Any;
use std::fmt;

/// Capability shared by all value objects.
pub trait ValueObject: Any + fmt::Debug + Send + Sync {
    /// Upcast used for same-kind comparisons.
    fn as_any(&self) -> &dyn Any;

    /// Value equality against another value object.
    ///
    /// Returns `false` when `other` is absent or of a different concrete kind.
    fn equals(&self, other: Option<&dyn ValueObject>) -> bool;
}

/// Conversion between a value object and its column representation.
///
/// Stored values are trusted: decoding adopts the primitive verbatim without
/// re-running construction checks. A NULL column decodes to `None`.
pub trait StoredValue: Sized {
    /// Primitive type persisted in the column.
    type Primitive;

    /// Adopt a stored primitive.
    fn decode(stored: Option<Self::Primitive>) -> Option<Self>;

    /// Emit the wrapped primitive unchanged.
    fn encode(&self) -> Self::Primitive;
}

fn same_kind_eq<T>(this: &T, other: Option<&dyn ValueObject>) -> bool
where
    T: ValueObject + PartialEq,
{
    other
        .and_then(|other| other.as_any().downcast_ref::<T>())
        .is_some_and(|other| other == this)
}

// ============================================================================
// Name
// ============================================================================

/// Ticket name. Never empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Name(String);

impl Name {
    /// Build a name.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::ValidationFailed`] if `value` is empty.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(TicketError::validation("name", "Name cannot be empty"));
        }
        Ok(Self(value))
    }

    /// The wrapped string.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Name {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: Option<&dyn ValueObject>) -> bool {
        same_kind_eq(self, other)
    }
}

impl StoredValue for Name {
    type Primitive = String;

    fn decode(stored: Option<String>) -> Option<Self> {
        stored.map(Self)
    }

    fn encode(&self) -> String {
        self.0.clone()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Description
// ============================================================================

/// Ticket description. Never empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Description(String);

impl Description {
    /// Build a description.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::ValidationFailed`] if `value` is empty.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(TicketError::validation(
                "description",
                "Description cannot be empty",
            ));
        }
        Ok(Self(value))
    }

    /// The wrapped string.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Description {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: Option<&dyn ValueObject>) -> bool {
        same_kind_eq(self, other)
    }
}

impl StoredValue for Description {
    type Primitive = String;

    fn decode(stored: Option<String>) -> Option<Self> {
        stored.map(Self)
    }

    fn encode(&self) -> String {
        self.0.clone()
    }
}

impl fmt::Display for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Allocation
// ============================================================================

/// Remaining purchasable quantity. Never negative; zero is allowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Allocation(i32);

impl Allocation {
    /// Build an allocation.
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::ValidationFailed`] if `value` is negative.
    pub fn new(value: i32) -> Result<Self> {
        if value < 0 {
            return Err(TicketError::validation(
                "allocation",
                "Allocation cannot be negative",
            ));
        }
        Ok(Self(value))
    }

    /// The wrapped quantity.
    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }

    /// Whether nothing is left to sell.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl ValueObject for Allocation {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn equals(&self, other: Option<&dyn ValueObject>) -> bool {
        same_kind_eq(self, other)
    }
}

impl StoredValue for Allocation {
    type Primitive = i32;

    fn decode(stored: Option<i32>) -> Option<Self> {
        stored.map(Self)
    }

    fn encode(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
