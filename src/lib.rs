pub mod agent_engine;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;

pub use agent_engine::engine::AgentEngine;
pub use agent_engine::state::{StepOutcome, StepSignal};
pub use config::{load_config, AppConfig};
pub use errors::{DeskGroundError, DeskGroundResult};
pub use executor::actions::GroundedCommand;
pub use llm::provider::ModelClient;
pub use perception::types::Observation;

/// Install the fmt subscriber, filtered by `RUST_LOG` (default `info`).
/// Calling it again is a no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
