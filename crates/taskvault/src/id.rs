use core::fmt;
use core::hash::Hash;
use core::str::FromStr;
use std::sync::Arc;

/// A trait for types that wrap a `u64` task identifier.
///
/// Two identifier spaces exist and must never be confused: the raw,
/// store-assigned sequence number ([`TaskId`]) and the scrambled form handed
/// to clients ([`PublicId`]). Both implement `Id` so generic code can move
/// between the wrapper and its scalar.
pub trait Id:
    Copy + Clone + fmt::Display + PartialOrd + Ord + PartialEq + Eq + Hash + fmt::Debug
{
    /// Converts this type into its raw scalar representation.
    fn to_raw(&self) -> u64;

    /// Converts a raw scalar into this type.
    fn from_raw(raw: u64) -> Self;
}

macro_rules! define_task_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialOrd, Ord, PartialEq, Eq, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wraps a scalar value.
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Returns the scalar value.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl Id for $name {
            fn to_raw(&self) -> u64 {
                self.0
            }

            fn from_raw(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }

        impl FromStr for $name {
            type Err = core::num::ParseIntError;

            /// Parses unsigned decimal digits only. A leading `+`, which
            /// `u64::from_str` tolerates, is rejected.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = if s.starts_with('+') { "+" } else { s };
                digits.parse::<u64>().map(Self)
            }
        }
    };
}

define_task_id!(
    /// The store-internal identifier of a task.
    ///
    /// Assigned from a single monotonic counter starting at 1. A persisted task
    /// never carries `TaskId(0)`, and a value is never handed out twice within
    /// one process lifetime.
    TaskId
);

define_task_id!(
    /// The client-visible identifier of a task.
    ///
    /// This is a [`TaskId`] passed through an [`IdObfuscator`]. It hides the
    /// sequence and cardinality of the underlying counter but is not a secret.
    ///
    /// [`IdObfuscator`]: crate::IdObfuscator
    PublicId
);

/// Opaque identity of the owner of a set of tasks.
///
/// The store only compares owners for equality. Cloning is cheap, so the same
/// identity can be stamped onto every task in a partition.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(Arc<str>);

impl OwnerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OwnerId {
    fn from(id: &str) -> Self {
        Self(Arc::from(id))
    }
}

impl From<String> for OwnerId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl AsRef<str> for OwnerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OwnerId").field(&self.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_parse_from_decimal() {
        assert_eq!("42".parse::<PublicId>().unwrap(), PublicId::new(42));
        assert_eq!(
            "18446744073709551615".parse::<TaskId>().unwrap(),
            TaskId::new(u64::MAX)
        );
        assert!("-1".parse::<PublicId>().is_err());
        assert!("not-a-number".parse::<PublicId>().is_err());
        assert!("18446744073709551616".parse::<PublicId>().is_err());
    }

    #[test]
    fn ids_reject_sign_and_whitespace() {
        let err = "+42".parse::<PublicId>().unwrap_err();
        assert_eq!(err.kind(), &core::num::IntErrorKind::InvalidDigit);
        assert!("+".parse::<TaskId>().is_err());
        assert!("+0".parse::<TaskId>().is_err());
        assert!(" 42".parse::<PublicId>().is_err());
        assert!("".parse::<PublicId>().is_err());
    }

    #[test]
    fn ids_display_as_scalar() {
        assert_eq!(TaskId::new(7).to_string(), "7");
        assert_eq!(format!("{:?}", PublicId::new(9)), "PublicId(9)");
    }

    #[test]
    fn owner_equality_is_by_value() {
        let a = OwnerId::from("u1");
        let b = OwnerId::from(String::from("u1"));
        assert_eq!(a, b);
        assert_ne!(a, OwnerId::from("u2"));
        assert_eq!(a.as_str(), "u1");
    }
}
