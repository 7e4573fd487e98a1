//! Stagehand - lifecycle orchestration for independently loaded applications.
//!
//! A host process registers applications with a loader and an activity
//! predicate. Whenever the location changes, the orchestrator reconciles:
//! applications that should be active are loaded, bootstrapped and mounted,
//! the others are unmounted. Each application exposes the same lifecycle
//! hooks and the orchestrator only sequences them; it never looks inside.
//!
//! # Architecture
//!
//! - **Status machine** - every application carries a [`domain::Status`]
//!   that doubles as a compare-and-set gate, so two transitions never run on
//!   one application at once.
//! - **Lifecycle functions** ([`lifecycle`]) - one async function per
//!   transition, each racing the hook against a configurable deadline and
//!   absorbing failures into the application's status.
//! - **Reconciler** ([`reconcile`]) - classifies applications into
//!   load / mount / unmount / unload buckets and drives them, unmounting
//!   before mounting within a pass.
//!
//! # Modules
//!
//! - [`activity`] - Activity predicates and their composition
//! - [`cli`] - Demo runner commands used by the `stagehand` binary
//! - [`config`] - TOML configuration and logging setup
//! - [`domain`] - Statuses, locations, props, module descriptors, units
//! - [`error`] - Error types for the crate
//! - [`lifecycle`] - Per-application transition functions
//! - [`orchestrator`] - The public service object
//! - [`path`] - Path pattern to predicate compiler
//! - [`port`] - Error handler and event listener hooks
//! - [`reconcile`] - Change classification and execution
//! - [`registration`] - Registration validation and the loader catalog
//! - [`registry`] - Insertion-ordered application registry
//!
//! # Features
//!
//! - `testkit` - Scripted modules and loaders for integration tests

pub mod activity;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod orchestrator;
pub mod path;
pub mod port;
pub mod reconcile;
pub mod registration;
pub mod registry;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use orchestrator::{Orchestrator, UnloadOptions};
pub use registration::{AppSource, LoaderCatalog, Registration, RegistrationConfig};
