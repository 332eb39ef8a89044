use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::HotkeysConfig;
use crate::error::{HotkeysError, Result};
use crate::query::cache::ResultCache;
use crate::query::parser::{parse_query, Command, ParsedQuery};
use crate::query::ranker::{self, SearchQuery};
use crate::query::results::ResultRow;
use crate::storage::repository::ShortcutSource;

/// Turns raw query text into result rows.
///
/// Failures while handling one query become a single error row; only
/// cancellation is reported as an error so the host can show "no results
/// yet" instead.
pub struct QueryProcessor {
    source: Arc<dyn ShortcutSource>,
    cache: ResultCache,
    action_keyword: String,
}

impl std::fmt::Debug for QueryProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryProcessor")
            .field("cache", &self.cache)
            .field("action_keyword", &self.action_keyword)
            .finish()
    }
}

impl QueryProcessor {
    pub fn new(source: Arc<dyn ShortcutSource>, cache: ResultCache, action_keyword: impl Into<String>) -> Self {
        Self {
            source,
            cache,
            action_keyword: action_keyword.into(),
        }
    }

    pub fn from_config(source: Arc<dyn ShortcutSource>, config: &HotkeysConfig) -> Self {
        Self::new(source, ResultCache::from_config(&config.cache), config.action_keyword.clone())
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn action_keyword(&self) -> &str {
        &self.action_keyword
    }

    pub async fn process(&self, raw: &str, cancel: &CancellationToken) -> Result<Vec<ResultRow>> {
        let outcome = AssertUnwindSafe(self.dispatch(raw, cancel)).catch_unwind().await;

        match outcome {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(HotkeysError::Cancelled)) => Err(HotkeysError::Cancelled),
            Ok(Err(e)) => {
                error!(query = raw, error = %e, "Query processing failed");
                Ok(vec![ResultRow::error(raw, &e.to_string())])
            }
            Err(panic) => {
                let message = panic_message(&*panic);
                error!(query = raw, %message, "Query processing panicked");
                Ok(vec![ResultRow::error(raw, &message)])
            }
        }
    }

    async fn dispatch(&self, raw: &str, cancel: &CancellationToken) -> Result<Vec<ResultRow>> {
        if raw.trim().is_empty() {
            return Ok(ResultRow::help(&self.action_keyword));
        }

        let parsed = parse_query(raw);
        debug!(?parsed, "Parsed query");

        match parsed.command {
            Command::Apps => self.apps(cancel).await,
            Command::List => self.list(parsed.list_target(), cancel).await,
            Command::Search => self.search(&parsed, raw, cancel).await,
        }
    }

    /// Every source with its record count, alphabetically.
    async fn apps(&self, cancel: &CancellationToken) -> Result<Vec<ResultRow>> {
        let by_source = self.source.get_by_source(cancel).await?;
        if by_source.is_empty() {
            return Ok(vec![ResultRow::no_apps()]);
        }

        let mut apps: Vec<(String, usize)> = by_source
            .into_iter()
            .map(|(name, records)| (name, records.len()))
            .collect();
        apps.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(apps
            .iter()
            .map(|(name, count)| ResultRow::app(name, *count, &self.action_keyword))
            .collect())
    }

    /// Shortcuts of every source whose name contains `app`, grouped by
    /// source and ordered by category then description.
    async fn list(&self, app: &str, cancel: &CancellationToken) -> Result<Vec<ResultRow>> {
        let needle = app.trim().to_lowercase();
        let by_source = self.source.get_by_source(cancel).await?;

        let mut matching: Vec<_> = by_source
            .into_iter()
            .filter(|(name, _)| name.to_lowercase().contains(&needle))
            .collect();
        matching.sort_by(|a, b| a.0.cmp(&b.0));

        let mut rows = Vec::new();
        for (_, mut records) in matching {
            records.sort_by_cached_key(|r| (r.category.to_lowercase(), r.description.to_lowercase()));
            rows.extend(records.into_iter().map(ResultRow::listed));
        }

        if rows.is_empty() {
            rows.push(ResultRow::no_app(app.trim(), &self.action_keyword));
        }
        Ok(rows)
    }

    async fn search(&self, parsed: &ParsedQuery, raw: &str, cancel: &CancellationToken) -> Result<Vec<ResultRow>> {
        let query = SearchQuery::from(parsed);
        if query.is_empty() {
            return Ok(ResultRow::help(&self.action_keyword));
        }

        // Cached rows are tied to the index generation they came from
        let generation = self.source.generation(cancel).await?;
        let key = query.cache_key();
        if let Some(rows) = self.cache.get(&key, generation) {
            return Ok(rows.as_ref().clone());
        }

        let records = self.source.search(&query, cancel).await?;
        let app = query.scoring_app();
        let rows = if records.is_empty() {
            vec![ResultRow::no_results(query.term.trim(), app, raw)]
        } else {
            let mut rows: Vec<ResultRow> = records
                .into_iter()
                .map(|record| {
                    let score = ranker::score(&record, &query.term, app);
                    ResultRow::shortcut(record, score, app)
                })
                .collect();
            rows.sort_by(|a, b| b.score.cmp(&a.score));
            rows
        };

        self.cache.insert(key, generation, Arc::new(rows.clone()));
        Ok(rows)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unexpected panic".to_string()
    }
}
