//! Startup sequencer.
//!
//! The bootstrap is an ordered list of named [`Step`]s executed by
//! [`Sequencer::run`]. Each step runs only after the previous one
//! succeeded; the first failure moves the sequencer to
//! [`Stage::Terminated`] and is returned to the caller.
//!
//! ```text
//! Init -> WaitingForDatastore -> CollectingAssets -> SynchronizingSchema -> Serving -> Terminated
//! ```

pub mod assets;
pub mod schema;
pub mod serve;
pub mod wait;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Settings;
use crate::db::DbPool;
use crate::error::{SequencerError, SequencerResult};

pub use assets::CollectAssets;
pub use schema::SynchronizeSchema;
pub use serve::Serve;
pub use wait::WaitForDatastore;

/// Lifecycle stage of the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    WaitingForDatastore,
    CollectingAssets,
    SynchronizingSchema,
    Serving,
    Terminated,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::WaitingForDatastore => "waiting_for_datastore",
            Stage::CollectingAssets => "collecting_assets",
            Stage::SynchronizingSchema => "synchronizing_schema",
            Stage::Serving => "serving",
            Stage::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// State handed from step to step.
///
/// Settings are shared read-only; the datastore pool appears once the
/// readiness wait has succeeded.
#[derive(Debug)]
pub struct StartupContext {
    pub settings: Arc<Settings>,
    pool: Option<DbPool>,
}

impl StartupContext {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            pool: None,
        }
    }

    /// Install the datastore pool.
    pub fn set_pool(&mut self, pool: DbPool) {
        self.pool = Some(pool);
    }

    /// The datastore pool, or `NotReady` if the readiness wait has not run.
    pub fn pool(&self) -> SequencerResult<&DbPool> {
        self.pool
            .as_ref()
            .ok_or(SequencerError::NotReady("the datastore pool"))
    }
}

/// One named unit of the startup sequence.
#[async_trait]
pub trait Step: Send {
    /// Name used in logs and failure reports.
    fn name(&self) -> &'static str;

    /// Stage the sequencer is in while this step runs.
    fn stage(&self) -> Stage;

    /// Run the step to completion. Steps run once, so they consume themselves.
    async fn run(self: Box<Self>, ctx: &mut StartupContext) -> SequencerResult<()>;
}

/// A step failure, naming the step that failed.
#[derive(Error, Debug)]
#[error("step '{step}' failed: {error}")]
pub struct StepFailure {
    pub step: &'static str,
    #[source]
    pub error: SequencerError,
}

impl StepFailure {
    pub fn exit_code(&self) -> u8 {
        self.error.exit_code()
    }
}

/// Runs steps in order and stops at the first failure.
pub struct Sequencer {
    steps: Vec<Box<dyn Step>>,
    transitions: Vec<Stage>,
}

impl Sequencer {
    /// An empty sequencer in the `Init` stage.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            transitions: vec![Stage::Init],
        }
    }

    /// The four production steps: wait, collect, migrate, serve.
    pub fn standard() -> Self {
        Self::new()
            .step(WaitForDatastore::new())
            .step(CollectAssets)
            .step(SynchronizeSchema)
            .step(Serve::new())
    }

    /// Append a step.
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.transitions.last().copied().unwrap_or(Stage::Init)
    }

    /// Every stage entered so far, starting with `Init`.
    pub fn transitions(&self) -> &[Stage] {
        &self.transitions
    }

    /// Execute all steps in order.
    ///
    /// Ends in `Terminated` either way. A step that returns `Ok` after
    /// serving (graceful shutdown) counts as success.
    pub async fn run(&mut self, ctx: &mut StartupContext) -> Result<(), StepFailure> {
        let steps = std::mem::take(&mut self.steps);

        for step in steps {
            let name = step.name();
            self.enter(step.stage());

            tracing::info!(step = name, stage = %self.stage(), "Starting step");
            let started = Instant::now();

            match step.run(ctx).await {
                Ok(()) => {
                    tracing::info!(
                        step = name,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Step finished"
                    );
                }
                Err(error) => {
                    self.enter(Stage::Terminated);
                    return Err(StepFailure { step: name, error });
                }
            }
        }

        self.enter(Stage::Terminated);
        Ok(())
    }

    fn enter(&mut self, stage: Stage) {
        if self.stage() != stage {
            tracing::debug!(from = %self.stage(), to = %stage, "Stage transition");
            self.transitions.push(stage);
        }
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer")
            .field(
                "steps",
                &self.steps.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("transitions", &self.transitions)
            .finish()
    }
}
