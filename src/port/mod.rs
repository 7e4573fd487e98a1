//! Extension points through which the host observes the orchestrator.
//!
//! # Available Ports
//!
//! - [`ErrorHandler`] - Receives lifecycle errors absorbed during reconciliation
//! - [`Listener`] - Receives reconciliation and first-mount events

pub mod error_handler;
pub mod listener;

pub use error_handler::{ErrorHandler, ErrorHandlerRegistry, HandlerId};
pub use listener::{Event, Listener, ListenerRegistry, LogListener, NullListener};
