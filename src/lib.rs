//! ButtonFlow Library
//!
//! This library turns raw button signals from programmable input devices
//! into classified gestures and dispatches the actions bound to them,
//! including adapting binary reports and diagnostic text lines, timing
//! presses, persisting the mapping configuration and running live sessions.

// Module declarations
pub mod adapters;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod models;
pub mod session;

// Re-export commonly used types
pub use adapters::{Adapter, RawInput};
pub use classifier::GesturePipeline;
pub use config::MappingStore;
pub use dispatch::{DispatchResult, Dispatcher};
pub use models::{ButtonId, CanonicalEdge, Edge, GestureEvent, GestureKind, MappingConfig};
pub use session::{SessionController, StopReason};
