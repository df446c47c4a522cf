#![doc = include_str!("../README.md")]

mod error;
mod id;
mod obfuscate;
#[cfg(feature = "serde")]
mod serde;
mod service;
mod store;
mod task;

pub use crate::error::*;
pub use crate::id::*;
pub use crate::obfuscate::*;
pub use crate::service::*;
pub use crate::store::*;
pub use crate::task::*;
