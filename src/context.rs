//! Startup assembly.
//!
//! [`AppContext::bootstrap`] is the only place where stores, backend,
//! tools and agents are wired together. Everything downstream receives
//! explicit handles.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::agent::{
    LlmGateway, LlmProvider, OrchestraConfig, PromptSet, Router, Specialists, create_provider,
};
use crate::error::{Result, StorageError};
use crate::storage::SqliteStorage;
use crate::tools::{Sandbox, ToolRegistry, install_builtin_tools};

/// Fully assembled application state.
#[derive(Debug)]
pub struct AppContext {
    /// Resolved configuration.
    pub config: OrchestraConfig,
    /// Response cache store.
    pub cache: Arc<SqliteStorage>,
    /// Session history store.
    pub sessions: Arc<SqliteStorage>,
    /// Cached model access.
    pub gateway: LlmGateway,
    /// Registered tools.
    pub tools: Arc<ToolRegistry>,
    /// System prompts in effect.
    pub prompts: Arc<PromptSet>,
    /// Query router.
    pub router: Router,
}

impl AppContext {
    /// Builds the application from `config`.
    ///
    /// # Errors
    ///
    /// Fails on unusable configuration (unsupported provider, missing
    /// credential), on a session store that cannot be opened, and on
    /// duplicate tool names. An unusable cache database is moved aside and
    /// recreated instead.
    pub fn bootstrap(config: OrchestraConfig) -> Result<Self> {
        let cache = Arc::new(open_cache(&config.cache_db_path())?);
        let sessions = Arc::new(SqliteStorage::open(&config.sessions_db_path())?);

        let provider: Arc<dyn LlmProvider> = Arc::from(create_provider(&config)?);
        let gateway = LlmGateway::new(provider, cache.clone(), config.model.clone());

        let sandbox = Sandbox::new(&config.sandbox_root()).map_err(StorageError::from)?;
        let mut registry = ToolRegistry::new();
        install_builtin_tools(&mut registry, &sandbox)?;
        let tools = Arc::new(registry);

        let prompts = Arc::new(PromptSet::load(config.prompt_dir()));
        let specialists = Specialists::new(
            gateway.clone(),
            tools.clone(),
            prompts.clone(),
            config.temperature,
        );
        let router = Router::new(gateway.clone(), specialists, prompts.router.clone());

        info!(
            provider = gateway.provider_name(),
            model = %config.model,
            tools = tools.len(),
            sandbox = %sandbox.root().display(),
            "orchestra context ready"
        );

        Ok(Self {
            config,
            cache,
            sessions,
            gateway,
            tools,
            prompts,
            router,
        })
    }
}

/// Opens the response cache, recreating it if the file is unusable.
///
/// A database that fails to open is renamed to `<name>.corrupt` and a fresh
/// one is created in its place. If that also fails the cache lives in memory
/// for this run.
fn open_cache(path: &Path) -> std::result::Result<SqliteStorage, StorageError> {
    let err = match SqliteStorage::open(path) {
        Ok(store) => return Ok(store),
        Err(err) => err,
    };
    warn!(path = %path.display(), error = %err, "cache database unusable, recreating");

    let aside = path.with_extension("db.corrupt");
    if let Err(e) = std::fs::rename(path, &aside) {
        warn!(path = %path.display(), error = %e, "could not move cache aside, removing");
        let _ = std::fs::remove_file(path);
    }

    SqliteStorage::open(path).or_else(|e| {
        warn!(path = %path.display(), error = %e, "falling back to in-memory cache");
        SqliteStorage::in_memory()
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::storage::SessionLog;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> OrchestraConfig {
        OrchestraConfig::builder()
            .mock_mode(true)
            .cache_dir(dir.path().join("cache"))
            .data_dir(dir.path().join("data"))
            .prompt_dir(dir.path().join("prompts"))
            .build()
            .unwrap_or_else(|e| panic!("config failed: {e}"))
    }

    #[test]
    fn test_bootstrap_wires_mock_backend_and_builtins() {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let ctx = AppContext::bootstrap(config(&dir)).unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(ctx.gateway.provider_name(), "mock");
        let names: Vec<_> = ctx.tools.specs().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![
            "calc",
            "http_get",
            "file_write",
            "file_read",
            "file_list",
            "text_stats",
        ]);
        assert!(dir.path().join("data").join("files").is_dir());
        assert!(dir.path().join("cache").join("llm-cache.db").exists());
        assert_eq!(ctx.prompts.as_ref(), &PromptSet::defaults());
    }

    #[tokio::test]
    async fn test_cache_survives_restart() {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir failed: {e}"));

        let first = AppContext::bootstrap(config(&dir)).unwrap_or_else(|e| panic!("{e}"));
        let a = first
            .router
            .run("write a haiku")
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(a.metadata["cached"], serde_json::json!(false));
        first
            .sessions
            .append("s", crate::agent::Role::User, "hello")
            .unwrap_or_else(|e| panic!("{e}"));
        drop(first);

        let second = AppContext::bootstrap(config(&dir)).unwrap_or_else(|e| panic!("{e}"));
        let b = second
            .router
            .run("write a haiku")
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(b.text, a.text);
        assert_eq!(b.metadata["cached"], serde_json::json!(true));
        assert_eq!(second.sessions.load("s").unwrap_or_else(|e| panic!("{e}")).len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_recreated() {
        let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let cache_dir = dir.path().join("cache");
        std::fs::create_dir_all(&cache_dir).unwrap_or_else(|e| panic!("{e}"));
        std::fs::write(cache_dir.join("llm-cache.db"), vec![0xAB_u8; 8192])
            .unwrap_or_else(|e| panic!("{e}"));

        let ctx = AppContext::bootstrap(config(&dir)).unwrap_or_else(|e| panic!("{e}"));
        assert!(cache_dir.join("llm-cache.db.corrupt").exists());
        assert_eq!(ctx.cache.cache_len().unwrap_or_else(|e| panic!("{e}")), 0);

        let first = ctx.router.run("write a haiku").await.unwrap_or_else(|e| panic!("{e}"));
        let again = ctx.router.run("write a haiku").await.unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(first.metadata["cached"], serde_json::json!(false));
        assert_eq!(again.metadata["cached"], serde_json::json!(true));
    }
}
