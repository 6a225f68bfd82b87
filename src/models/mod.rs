//! Data models for edges, gestures, bindings and mapping configuration.
//!
//! This module contains the vocabulary shared by adapters, the classifier,
//! the mapping store and the dispatcher. Models are independent of any
//! input source or host automation mechanism.

pub mod binding;
pub mod edge;
pub mod gesture;
pub mod mapping;

// Re-export all model types
pub use binding::{ActionBinding, ActionCategory};
pub use edge::{ButtonId, CanonicalEdge, Edge};
pub use gesture::{GestureEvent, GestureKind};
pub use mapping::{BitBinding, ButtonBindings, MappingConfig, PressStartPolicy, Settings};
