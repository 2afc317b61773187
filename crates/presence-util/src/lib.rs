//! Shared utilities for presenced
//!
//! This crate provides:
//! - ID types (GuildId, ChannelId, MemberId, SessionId)
//! - Wall-clock time with a debug-only mock override
//! - The daily active window and its boundary math
//! - Default paths for the configuration file

mod ids;
mod paths;
mod time;

pub use ids::*;
pub use paths::*;
pub use time::*;
