//! Recipe API Bootstrap Library
//!
//! Process entry point for the recipe REST backend. Before anything is
//! served it:
//!
//! - **Waits for PostgreSQL**: polls with a bounded, backed-off attempt budget
//! - **Collects static assets**: merges source directories into `STATIC_ROOT`
//! - **Synchronizes the schema**: applies pending SQL migrations in order
//! - **Serves**: runs the Axum gateway until SIGTERM / Ctrl+C
//!
//! Any failure is fatal and ends the process with a non-zero status.
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from environment variables
//! - [`db`]: Database connectivity, probes and migration history
//! - [`sequencer`]: The ordered startup steps
//! - [`server`]: Router, runtime and shutdown handling
//! - [`error`]: Startup and HTTP error types
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use recipe_bootstrap::{
//!     config::Settings,
//!     sequencer::{Sequencer, StartupContext},
//! };
//!
//! async fn start() -> Result<(), recipe_bootstrap::sequencer::StepFailure> {
//!     let settings = Arc::new(Settings::from_env().expect("valid environment"));
//!     let mut ctx = StartupContext::new(settings);
//!     Sequencer::standard().run(&mut ctx).await
//! }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod result_ext;
pub mod sequencer;
pub mod server;
pub mod state;

pub use error::{AppError, AppResult, SequencerError, SequencerResult};
pub use result_ext::ResultExt;
