//! Reversible scrambling of sequential task identifiers.
//!
//! The store hands out raw identifiers from a counter (`1, 2, 3, ...`).
//! Exposing those directly leaks how many tasks exist and lets clients guess
//! neighbouring identifiers. An [`IdObfuscator`] maps every raw identifier to
//! a public one and back, as a bijection on the full `u64` range.
//!
//! This is obfuscation, not encryption: the constants are fixed and the
//! mapping is trivially derivable by anyone with the binary.

use crate::{Id, PublicId, TaskId};

/// A bijection between raw and public task identifiers.
///
/// Implementations must be total and mutually inverse:
/// `deobfuscate(obfuscate(x)) == x` and `obfuscate(deobfuscate(y)) == y` for
/// every `u64`.
pub trait IdObfuscator: Send + Sync + 'static {
    /// Maps a raw identifier to its public form.
    fn obfuscate(&self, id: TaskId) -> PublicId;

    /// Maps a public identifier back to its raw form.
    fn deobfuscate(&self, id: PublicId) -> TaskId;
}

/// Number of bit positions the scrambled value is rotated by.
const ROTATION: u32 = 7;

/// XOR / multiply / add / rotate obfuscator.
///
/// Forward: `rotl((raw ^ key) * prime + offset, 7) ^ (key * prime)`, with all
/// arithmetic wrapping modulo 2^64. Each step is a bijection on `u64`; the
/// multiply is undone with the multiplicative inverse of `prime` modulo 2^64,
/// which only exists for odd multipliers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RotateXorObfuscator {
    key: u64,
    offset: u64,
    prime: u64,
    prime_inv: u64,
    mask: u64,
}

impl RotateXorObfuscator {
    /// XOR key of the default deployment.
    pub const DEFAULT_KEY: u64 = 14;
    /// Additive offset of the default deployment.
    pub const DEFAULT_OFFSET: u64 = 78;
    /// Multiplier of the default deployment.
    pub const DEFAULT_PRIME: u64 = 21;

    /// Creates an obfuscator from its three constants.
    ///
    /// Returns `None` when `prime` is even, since an even multiplier discards
    /// the low bit and the mapping would no longer be invertible.
    pub const fn new(key: u64, offset: u64, prime: u64) -> Option<Self> {
        if prime & 1 == 0 {
            return None;
        }
        Some(Self {
            key,
            offset,
            prime,
            prime_inv: mod_inverse(prime),
            mask: key.wrapping_mul(prime),
        })
    }

    #[inline]
    pub const fn encode(&self, raw: u64) -> u64 {
        let mixed = (raw ^ self.key)
            .wrapping_mul(self.prime)
            .wrapping_add(self.offset);
        mixed.rotate_left(ROTATION) ^ self.mask
    }

    #[inline]
    pub const fn decode(&self, public: u64) -> u64 {
        let mixed = (public ^ self.mask).rotate_right(ROTATION);
        mixed.wrapping_sub(self.offset).wrapping_mul(self.prime_inv) ^ self.key
    }
}

impl Default for RotateXorObfuscator {
    fn default() -> Self {
        DEFAULT
    }
}

impl IdObfuscator for RotateXorObfuscator {
    fn obfuscate(&self, id: TaskId) -> PublicId {
        PublicId::from_raw(self.encode(id.to_raw()))
    }

    fn deobfuscate(&self, id: PublicId) -> TaskId {
        TaskId::from_raw(self.decode(id.to_raw()))
    }
}

const DEFAULT: RotateXorObfuscator = match RotateXorObfuscator::new(
    RotateXorObfuscator::DEFAULT_KEY,
    RotateXorObfuscator::DEFAULT_OFFSET,
    RotateXorObfuscator::DEFAULT_PRIME,
) {
    Some(obfuscator) => obfuscator,
    None => panic!("default multiplier must be odd"),
};

/// Obfuscates a raw identifier with the default constants.
#[inline]
pub fn obfuscate(id: TaskId) -> PublicId {
    DEFAULT.obfuscate(id)
}

/// Reverses [`obfuscate`].
#[inline]
pub fn deobfuscate(id: PublicId) -> TaskId {
    DEFAULT.deobfuscate(id)
}

/// Multiplicative inverse of an odd `a` modulo 2^64.
///
/// Newton's iteration: `a` is its own inverse modulo 2^3, and each step
/// doubles the number of correct low bits (3 -> 6 -> 12 -> 24 -> 48 -> 96).
const fn mod_inverse(a: u64) -> u64 {
    let mut inv = a;
    let mut i = 0;
    while i < 5 {
        inv = inv.wrapping_mul(2u64.wrapping_sub(a.wrapping_mul(inv)));
        i += 1;
    }
    inv
}
