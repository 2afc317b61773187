//! Session scheduler and connection state machine for presenced
//!
//! This crate is the heart of presenced, containing:
//! - Wall-clock abstraction and cancellable, re-armable timers
//! - Occupancy monitoring (who else is in the channel)
//! - Session state machine (Idle -> Connecting -> Active -> Disconnecting -> Idle)
//! - Daily reset at the end of the active window

mod clock;
mod engine;
mod events;
mod occupancy;
mod reset;
mod session;
mod timer;

pub use clock::*;
pub use engine::*;
pub use events::*;
pub use occupancy::*;
pub use reset::*;
pub use session::*;
pub use timer::*;
