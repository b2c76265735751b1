//! Time subsystem.
//!
//! - one `FrameClock` per render loop
//! - call `tick()` once per presented frame to obtain `FrameTime`
//! - `stop()`/`start()` bracket intervals (minimized, inactive) that must not
//!   count as simulated time

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
