//! Explicit graphics API surface.
//!
//! This module is responsible for:
//! - the `Instance`/`Device` traits the engine programs against
//! - typed object ids, descriptors and the recorded `Command` stream
//! - the backends implementing them:
//!   - `reference`: in-process device with a queue thread and strict validation
//!   - `wgpu_backend`: hardware device on top of wgpu

mod command;
mod error;
mod traits;
mod types;

pub mod reference;
pub mod wgpu_backend;

pub use command::Command;
pub use error::{HalError, HalResult};
pub use traits::{Device, Instance};
pub use types::*;
