//! Array, bitmap and run-length containers for a compressed 32-bit integer
//! set, plus the cross-container set algebra (`and`/`or`/`xor`/`andNot`)
//! between them.
//!
//! This crate implements the per-key container layer of a roaring bitmap:
//! [`Container`] is a closed sum type over [`array_store::ArrayContainer`],
//! [`bitmap_store::BitmapContainer`] and [`run_store::RunContainer`], each
//! covering up to 2^16 contiguous values. The outer facade that maps a full
//! `u32` onto a 16-bit high key plus one of these containers, and decides
//! when to call [`Container::run_optimize`], is intentionally out of scope.
mod array_store;
mod bitmap_store;
mod container;
mod error;
mod run_store;
mod serialization;
mod util;

pub use array_store::ArrayContainer;
pub use bitmap_store::BitmapContainer;
pub use container::{Container, ARRAY_MAX};
pub use error::{Result, RoaringCoreError};
pub use run_store::RunContainer;
