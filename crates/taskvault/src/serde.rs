//! Serde support for [`PublicId`].
//!
//! Public identifiers span the full `u64` range, which JavaScript numbers
//! cannot represent exactly, so they serialize as decimal strings. Both
//! strings and plain integers are accepted when deserializing.

use crate::PublicId;
use core::fmt;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

impl Serialize for PublicId {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PublicId {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PublicIdVisitor;

        impl Visitor<'_> for PublicIdVisitor {
            type Value = PublicId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a u64 task identifier as a decimal string or integer")
            }

            #[inline]
            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(PublicId::new(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                u64::try_from(v)
                    .map(PublicId::new)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            #[inline]
            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                v.parse()
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        d.deserialize_any(PublicIdVisitor)
    }
}
