use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::HotkeysConfig;
use crate::error::Result;
use crate::query::processor::QueryProcessor;
use crate::query::results::{context_actions, ContextAction, ResultRow};
use crate::storage::repository::{RepositoryStats, ShortcutRepository, ShortcutSource, ShortcutsChanged};

/// Host-facing entry point: wires the repository and query processor
/// together and applies the wall-clock query timeout.
///
/// ```no_run
/// # async fn demo() -> hotkeys::Result<()> {
/// let hotkeys = hotkeys::Hotkeys::builder()
///     .shortcuts_dir("./Shortcuts")
///     .cache_ttl(60)
///     .build()?;
///
/// for row in hotkeys.query("copy /word").await {
///     println!("{} ({})", row.title, row.subtitle);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Hotkeys {
    config: HotkeysConfig,
    repository: Arc<ShortcutRepository>,
    processor: QueryProcessor,
}

impl Hotkeys {
    pub fn builder() -> HotkeysBuilder {
        HotkeysBuilder::new()
    }

    pub fn from_config(config: HotkeysConfig) -> Result<Self> {
        config.validate()?;

        let repository = Arc::new(ShortcutRepository::new(&config));
        let source: Arc<dyn ShortcutSource> = repository.clone();
        let processor = QueryProcessor::from_config(source, &config);

        info!(
            path = %config.shortcuts_dir.display(),
            keyword = %config.action_keyword,
            "Hotkeys initialized"
        );

        Ok(Self {
            config,
            repository,
            processor,
        })
    }

    /// Run a query. Never fails: errors and timeouts come back as rows.
    pub async fn query(&self, raw: &str) -> Vec<ResultRow> {
        self.query_with_cancel(raw, &CancellationToken::new()).await
    }

    /// Like [`Hotkeys::query`], but a cancelled query yields no rows at all
    /// ("no results yet") rather than an error row.
    pub async fn query_with_cancel(&self, raw: &str, cancel: &CancellationToken) -> Vec<ResultRow> {
        let timeout = self.config.query_timeout();
        match tokio::time::timeout(timeout, self.processor.process(raw, cancel)).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(e)) if e.is_cancelled() => Vec::new(),
            Ok(Err(e)) => {
                warn!(query = raw, error = %e, "Query failed");
                vec![ResultRow::failed(raw, &e.to_string())]
            }
            Err(_) => {
                warn!(query = raw, timeout_ms = timeout.as_millis() as u64, "Query timed out");
                vec![ResultRow::timed_out(raw)]
            }
        }
    }

    pub fn context_menu(&self, row: &ResultRow) -> Vec<ContextAction> {
        context_actions(row, &self.config.action_keyword)
    }

    pub async fn reload(&self) -> Result<()> {
        self.repository.reload(&CancellationToken::new()).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShortcutsChanged> {
        self.repository.subscribe()
    }

    pub fn repository(&self) -> &Arc<ShortcutRepository> {
        &self.repository
    }

    pub fn processor(&self) -> &QueryProcessor {
        &self.processor
    }

    pub fn stats(&self) -> RepositoryStats {
        self.repository.stats()
    }

    pub fn config(&self) -> &HotkeysConfig {
        &self.config
    }
}

#[derive(Debug, Clone, Default)]
pub struct HotkeysBuilder {
    config: HotkeysConfig,
}

impl HotkeysBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a fully loaded configuration.
    pub fn config(mut self, config: HotkeysConfig) -> Self {
        self.config = config;
        self
    }

    pub fn shortcuts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.shortcuts_dir = dir.into();
        self
    }

    pub fn action_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.config.action_keyword = keyword.into();
        self
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.config.search.max_results = max;
        self
    }

    pub fn cache_ttl(mut self, seconds: u64) -> Self {
        self.config.cache.ttl_secs = seconds;
        self
    }

    pub fn cache_max_entries(mut self, max: usize) -> Self {
        self.config.cache.max_entries = max;
        self
    }

    pub fn watch(mut self, enabled: bool) -> Self {
        self.config.watcher.enabled = enabled;
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.watcher.debounce_ms = ms;
        self
    }

    pub fn coalesce_events(mut self, coalesce: bool) -> Self {
        self.config.watcher.coalesce = coalesce;
        self
    }

    pub fn load_concurrency(mut self, files: usize) -> Self {
        self.config.loader.concurrency = files;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn build(self) -> Result<Hotkeys> {
        Hotkeys::from_config(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::results::ResultAction;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("vscode.json"),
            r#"[
                {"shortcut": "Ctrl+Shift+P", "description": "Command palette", "category": "General"},
                {"shortcut": "Ctrl+P", "description": "Quick open", "category": "Navigation"}
            ]"#,
        )
        .unwrap();
        dir
    }

    fn hotkeys(dir: &TempDir) -> Hotkeys {
        Hotkeys::builder()
            .shortcuts_dir(dir.path())
            .watch(false)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        assert!(Hotkeys::builder().max_results(0).build().is_err());
        assert!(Hotkeys::builder().cache_max_entries(0).build().is_err());
    }

    #[test]
    fn test_builder_applies_settings() {
        let hotkeys = Hotkeys::builder()
            .shortcuts_dir("/tmp/shortcuts")
            .action_keyword("keys")
            .cache_ttl(60)
            .debounce_ms(250)
            .coalesce_events(true)
            .query_timeout(Duration::from_secs(2))
            .build()
            .unwrap();

        let config = hotkeys.config();
        assert_eq!(config.shortcuts_dir, PathBuf::from("/tmp/shortcuts"));
        assert_eq!(config.action_keyword, "keys");
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.watcher.debounce_ms, 250);
        assert!(config.watcher.coalesce);
        assert_eq!(config.query_timeout_ms, 2000);
        assert_eq!(hotkeys.processor().action_keyword(), "keys");
    }

    #[tokio::test]
    async fn test_query_end_to_end() {
        let dir = fixture();
        let hotkeys = hotkeys(&dir);

        let rows = hotkeys.query("palette").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Ctrl+Shift+P - Command palette");

        let menu = hotkeys.context_menu(&rows[0]);
        assert_eq!(menu[2].action, ResultAction::ChangeQuery("hk list:vscode".to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_query_has_no_rows() {
        let dir = fixture();
        let hotkeys = hotkeys(&dir);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(hotkeys.query_with_cancel("palette", &cancel).await.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_substitutes_row() {
        let dir = fixture();
        let hotkeys = Hotkeys::builder()
            .shortcuts_dir(dir.path())
            .watch(false)
            .query_timeout(Duration::ZERO)
            .build()
            .unwrap();

        let rows = hotkeys.query("palette").await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Query timed out");
    }
}
