use tempora_config::TemporaConfig;
use tempora_db::HistoryService;

/// Shared state for command handlers.
pub struct AppContext {
    pub config: TemporaConfig,
    pub service: HistoryService,
}

impl AppContext {
    pub async fn init(config: TemporaConfig) -> anyhow::Result<Self> {
        if config.database.is_in_memory() {
            tracing::warn!("database.path is in-memory; nothing will be persisted");
        }
        let service = HistoryService::from_config(&config).await?;
        Ok(Self { config, service })
    }
}
