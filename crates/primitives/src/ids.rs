//! Provides identifiers such as `Tag`.
use core::fmt;

/// The stable identity of a column.
///
/// A tag is assigned when a column is created and never changes afterwards,
/// regardless of renames, retyping or repositioning of the column.
/// Indexes and foreign keys refer to columns by tag, never by name or position.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[repr(transparent)]
pub struct Tag(pub u64);

impl Tag {
    /// The sentinel for "no tag was supplied";
    /// a fresh tag is generated whenever this is seen on a new column.
    pub const INVALID: Self = Self(u64::MAX);

    /// Generated tags are confined to the low 50 bits,
    /// leaving the rest of the range for user-assigned tags.
    pub const GENERATED_MASK: u64 = (1 << 50) - 1;

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

macro_rules! system_id {
    ($name:ident) => {
        impl $name {
            pub fn idx(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value as u64)
            }
        }
        impl From<$name> for u64 {
            fn from(value: $name) -> Self {
                value.0
            }
        }
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}
system_id!(Tag);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_tag_is_not_generated() {
        assert!(!Tag::INVALID.is_valid());
        assert!(Tag(Tag::GENERATED_MASK).is_valid());
        assert!(Tag::INVALID.0 > Tag::GENERATED_MASK);
    }
}
