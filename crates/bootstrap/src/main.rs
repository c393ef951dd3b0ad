//! Recipe API Bootstrap
//!
//! Waits for the database, collects static assets, applies migrations and
//! then serves. Takes no arguments; everything comes from the environment.

use std::process::ExitCode;
use std::sync::Arc;

use recipe_bootstrap::{
    config::{LogFormat, Settings},
    logging::init_tracing,
    sequencer::{Sequencer, StartupContext},
    server::build_runtime,
    SequencerError,
};

fn main() -> ExitCode {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            init_tracing(LogFormat::default());
            let err = SequencerError::from(e);
            tracing::error!(error = %err, "Failed to load configuration");
            return ExitCode::from(err.exit_code());
        }
    };

    init_tracing(settings.log.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting recipe API bootstrap"
    );
    tracing::info!(
        database = %settings.database.display_url(),
        bind = %settings.gateway.bind_address(),
        worker_threads = settings.gateway.worker_threads(),
        "Configuration loaded"
    );

    let runtime = match build_runtime(&settings.gateway) {
        Ok(runtime) => runtime,
        Err(e) => {
            let err = SequencerError::Serve(format!("cannot start runtime: {e}"));
            tracing::error!(error = %err, "Failed to build async runtime");
            return ExitCode::from(err.exit_code());
        }
    };

    let settings = Arc::new(settings);
    runtime.block_on(async move {
        let mut ctx = StartupContext::new(settings);
        let mut sequencer = Sequencer::standard();

        match sequencer.run(&mut ctx).await {
            Ok(()) => {
                tracing::info!("Bootstrap finished");
                ExitCode::SUCCESS
            }
            Err(failure) => {
                tracing::error!(
                    step = failure.step,
                    error = %failure.error,
                    exit_code = failure.exit_code(),
                    "Startup failed"
                );
                ExitCode::from(failure.exit_code())
            }
        }
    })
}
