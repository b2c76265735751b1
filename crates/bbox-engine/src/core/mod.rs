//! Core engine-facing contracts.
//!
//! Defines the interface between the runtime (platform loop) and the frame
//! orchestrator. The runtime owns the window and the event pump; the handler
//! is injected at construction and receives one callback per event category.

mod handler;

pub use handler::{AppControl, WindowHandler};
