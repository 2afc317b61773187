//! Voice gateway trait interfaces for presenced
//!
//! This crate defines the interface between the scheduler core and whatever
//! chat platform client actually joins voice channels. It contains no
//! platform code itself, only the contract and an in-memory mock.

mod handle;
mod membership;
mod mock;
mod traits;

pub use handle::*;
pub use membership::*;
pub use mock::*;
pub use traits::*;
