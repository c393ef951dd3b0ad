//! Datastore readiness wait.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Stage, StartupContext, Step};
use crate::config::RetryPolicy;
use crate::db::{create_lazy_pool, DatastoreProbe, PgProbe, ProbeError};
use crate::error::{SequencerError, SequencerResult};

/// Probe until one attempt succeeds or the policy's budget is spent.
///
/// Returns the number of attempts made. A fatal probe error ends the wait
/// immediately. There is no delay after the last attempt.
pub async fn wait_for_datastore<P>(probe: &P, policy: &RetryPolicy) -> SequencerResult<u32>
where
    P: DatastoreProbe + ?Sized,
{
    let mut last_error = String::from("no connection attempt was made");

    for attempt in 1..=policy.max_attempts {
        match probe.probe().await {
            Ok(()) => {
                tracing::info!(attempt, "Database available");
                return Ok(attempt);
            }
            Err(ProbeError::Fatal(error)) => {
                tracing::error!(attempt, error = %error, "Database rejected the connection");
                return Err(SequencerError::DatastoreUnavailable {
                    attempts: attempt,
                    last_error: error,
                });
            }
            Err(ProbeError::Transient(error)) => {
                if attempt < policy.max_attempts {
                    let delay = policy.delay_after(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Database unavailable, waiting"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_error = error;
            }
        }
    }

    tracing::error!(
        attempts = policy.max_attempts,
        error = %last_error,
        "Database still unavailable, giving up"
    );
    Err(SequencerError::DatastoreUnavailable {
        attempts: policy.max_attempts,
        last_error,
    })
}

/// Step 1: block until PostgreSQL accepts connections, then install the pool.
#[derive(Default)]
pub struct WaitForDatastore {
    probe: Option<Arc<dyn DatastoreProbe>>,
}

impl WaitForDatastore {
    /// Probe with real PostgreSQL connections built from `DB_*` settings.
    pub fn new() -> Self {
        Self { probe: None }
    }

    /// Probe with a caller-supplied probe instead.
    pub fn with_probe(probe: Arc<dyn DatastoreProbe>) -> Self {
        Self { probe: Some(probe) }
    }
}

#[async_trait]
impl Step for WaitForDatastore {
    fn name(&self) -> &'static str {
        "wait_for_db"
    }

    fn stage(&self) -> Stage {
        Stage::WaitingForDatastore
    }

    async fn run(self: Box<Self>, ctx: &mut StartupContext) -> SequencerResult<()> {
        let config = &ctx.settings.database;
        let options = config.connect_options()?;
        let policy = config.retry_policy();

        tracing::info!(
            url = %config.display_url(),
            max_attempts = policy.max_attempts,
            "Waiting for database"
        );

        let probe: Arc<dyn DatastoreProbe> = match self.probe {
            Some(probe) => probe,
            None => Arc::new(PgProbe::new(options, config.connect_timeout())),
        };
        wait_for_datastore(probe.as_ref(), &policy).await?;

        let pool = create_lazy_pool(config)?;
        ctx.set_pool(pool);
        Ok(())
    }
}
