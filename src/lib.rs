pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logic;
pub mod model;
pub mod store;

pub use error::{ReportError, ReportResult};

// Export logic types
pub use logic::{
    AggregationEngine, CarryForwardResolver, HistoryRecorder, MergeEngine, ReportOrchestrator,
    StatusScale, TemplateApplicator,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{InMemoryStore, PostgresStore, Store};

/// Build the orchestrator described by `config` on top of `store`.
pub fn build_orchestrator<S: Store>(
    store: std::sync::Arc<S>,
    config: &crate::config::AppConfig,
) -> anyhow::Result<ReportOrchestrator<S>> {
    use crate::gateway::{Gateways, StaticDirectory};
    use std::sync::Arc;

    let directory = match &config.gateway.fixture_path {
        Some(path) => StaticDirectory::from_json_file(path)?,
        None => {
            log::warn!("No directory fixture configured; every directory lookup will be empty");
            StaticDirectory::default()
        }
    };
    let gateways = Gateways::from_directory(Arc::new(directory), config.gateway_timeout());

    Ok(ReportOrchestrator::new(store, gateways)
        .with_status_scale(config.status_scale()?)
        .with_fetch_concurrency(config.aggregation.fetch_concurrency))
}
