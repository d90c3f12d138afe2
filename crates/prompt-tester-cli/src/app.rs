use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use prompt_tester_core::chat::{ChatEngine, ChatStore, EngineConfig, EngineServices};
use prompt_tester_core::repositories::{
    CatalogRepository, CatalogSqliteRepository, CredentialSqliteRepository, Database,
    SessionRepository, SessionSqliteRepository,
};
use prompt_tester_core::services::{
    CredentialCipher, CredentialService, OpenRouterClient, PricingCache,
};
use prompt_tester_core::settings::{SettingsJsonRepository, SettingsRepository};

/// Everything a command needs, wired once per process
pub struct App {
    pub credentials: CredentialService,
    pub catalog: Arc<dyn CatalogRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub pricing: PricingCache,
    pub engine: ChatEngine,
}

impl App {
    pub async fn open(db: Option<PathBuf>, api_base: Option<String>) -> Result<Self> {
        let settings_repo =
            SettingsJsonRepository::new().context("Failed to locate settings file")?;
        let mut settings = settings_repo
            .load()
            .await
            .with_context(|| format!("Failed to read {}", settings_repo.path().display()))?;
        if let Some(api_base) = api_base {
            settings.api_base_url = api_base;
        }

        let db_path = match db.or_else(|| settings.database_path.clone()) {
            Some(path) => path,
            None => Database::default_path().context("Failed to locate database")?,
        };
        let db = Database::open(&db_path)
            .await
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;

        let credentials = CredentialService::new(
            Arc::new(CredentialSqliteRepository::new(&db)),
            CredentialCipher::from_env(),
        );
        let catalog: Arc<dyn CatalogRepository> = Arc::new(CatalogSqliteRepository::new(&db));
        let sessions: Arc<dyn SessionRepository> = Arc::new(SessionSqliteRepository::new(&db));
        let pricing = PricingCache::new(&settings);

        let engine = ChatEngine::new(
            Arc::new(ChatStore::new()),
            EngineServices {
                credentials: credentials.clone(),
                catalog: catalog.clone(),
                sessions: sessions.clone(),
                provider: Arc::new(OpenRouterClient::new(&settings)),
                pricing: pricing.clone(),
            },
            EngineConfig::from(&settings),
        );

        info!(db = %db_path.display(), api = %settings.api_base_url, "Ready");
        Ok(Self {
            credentials,
            catalog,
            sessions,
            pricing,
            engine,
        })
    }

    /// Let queued message writes land before the process exits
    pub async fn shutdown(&self) {
        self.engine.flush().await;
    }
}
