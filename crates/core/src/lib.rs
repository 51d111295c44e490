//! # fsmkit Core
//!
//! Domain types, traits, and error definitions for the fsmkit agent runtime.
//! This crate defines the seams the state machine consumes: the model
//! responder, the tool registry, conversation memory and the progress bus.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here. Implementations live with
//! their callers. This enables:
//! - Swapping model backends without touching the runtime
//! - Easy testing with scripted models and closure tools
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod kind;
pub mod message;
pub mod model;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{AgentError, Error, ModelError, Result, ToolError};
pub use event::{EventBus, ProgressEvent};
pub use kind::StateKind;
pub use message::{Memory, Message, Role};
pub use model::{Generation, Model, ReplayModel, Usage};
pub use tool::{FnTool, Tool, ToolArgs, ToolDescriptor, ToolRegistry, number_value, render_value};
