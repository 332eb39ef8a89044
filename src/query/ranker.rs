use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tokio_util::sync::CancellationToken;

use crate::error::{HotkeysError, Result};
use crate::query::parser::{Command, FilterType, ParsedQuery};
use crate::record::{normalize_shortcut, ShortcutRecord};

// Scoring weights
pub const APP_EXACT_BONUS: i32 = 200;
pub const APP_CONTAINS_BONUS: i32 = 100;
pub const SHORTCUT_EXACT: i32 = 1000;
pub const SHORTCUT_CONTAINS: i32 = 800;
pub const DESCRIPTION_EXACT: i32 = 900;
pub const DESCRIPTION_PREFIX: i32 = 700;
pub const DESCRIPTION_CONTAINS: i32 = 500;
pub const KEYWORD_EXACT: i32 = 600;
pub const KEYWORD_CONTAINS: i32 = 300;
pub const POPULAR_SOURCE_BONUS: i32 = 50;

static POPULAR_SOURCES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["chrome", "firefox", "vscode", "word", "excel", "windows", "photoshop"]
        .into_iter()
        .collect()
});

// Cancellation is polled once per this many records
const CANCEL_CHECK_INTERVAL: usize = 1024;

/// Input to a repository search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub term: String,
    pub app_filter: Option<String>,
    pub filter_type: FilterType,
    pub filter_value: Option<String>,
}

impl SearchQuery {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            ..Default::default()
        }
    }

    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.app_filter = Some(app.into());
        self
    }

    pub fn with_filter(mut self, filter_type: FilterType, value: impl Into<String>) -> Self {
        self.filter_type = filter_type;
        self.filter_value = Some(value.into());
        self
    }

    /// No term and no filter: nothing to search for.
    pub fn is_empty(&self) -> bool {
        self.term.trim().is_empty() && self.app_filter().is_none() && self.filter().is_none()
    }

    pub fn app_filter(&self) -> Option<&str> {
        non_blank(self.app_filter.as_deref())
    }

    fn filter(&self) -> Option<(FilterType, &str)> {
        match self.filter_type {
            FilterType::None => None,
            filter_type => non_blank(self.filter_value.as_deref()).map(|value| (filter_type, value)),
        }
    }

    /// App name used for the app-filter score bonus: the explicit app filter,
    /// else the value of an `app:` filter.
    pub fn scoring_app(&self) -> Option<&str> {
        self.app_filter().or(match self.filter() {
            Some((FilterType::App, value)) => Some(value),
            _ => None,
        })
    }

    /// `term|app|filterType|filterValue`
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.term,
            self.app_filter.as_deref().unwrap_or_default(),
            self.filter_type,
            self.filter_value.as_deref().unwrap_or_default()
        )
    }

    /// Whether a record passes the app filter and the typed filter.
    pub fn accepts(&self, record: &ShortcutRecord) -> bool {
        if let Some(app) = self.app_filter() {
            if !contains_ignore_case(&record.source, app) {
                return false;
            }
        }

        match self.filter() {
            None => true,
            Some((FilterType::App, value)) => contains_ignore_case(&record.source, value),
            Some((FilterType::Source, value)) => record.source.trim().eq_ignore_ascii_case(value.trim()),
            Some((FilterType::Category, value)) => contains_ignore_case(&record.category, value),
            Some((FilterType::Keyword, value)) => record.keywords.iter().any(|k| contains_ignore_case(k, value)),
            Some((FilterType::None, _)) => true,
        }
    }
}

impl From<&ParsedQuery> for SearchQuery {
    fn from(parsed: &ParsedQuery) -> Self {
        let term = match parsed.command {
            Command::Search => parsed.search_term.clone().unwrap_or_default(),
            Command::List | Command::Apps => String::new(),
        };
        Self {
            term,
            app_filter: parsed.app_filter.clone(),
            filter_type: parsed.filter_type,
            filter_value: parsed.filter_value.clone(),
        }
    }
}

/// Whether the term appears in the shortcut, description, a keyword, the
/// category, or (separator-insensitively) the normalized shortcut. An empty
/// term matches everything.
pub fn matches(record: &ShortcutRecord, term: &str) -> bool {
    let query = term.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }

    if record.shortcut.to_lowercase().contains(&query)
        || record.description.to_lowercase().contains(&query)
        || record.keywords.iter().any(|k| k.to_lowercase().contains(&query))
        || record.category.to_lowercase().contains(&query)
    {
        return true;
    }

    let compact_query = squash(&normalize_shortcut(&query));
    !compact_query.is_empty() && squash(&record.normalized_shortcut).contains(&compact_query)
}

/// Additive relevance score. All comparisons are case-insensitive; an empty
/// term only earns the app-filter and popularity bonuses.
pub fn score(record: &ShortcutRecord, term: &str, app_filter: Option<&str>) -> i32 {
    let query = term.trim().to_lowercase();
    let source = record.source.to_lowercase();
    let mut score = 0;

    if let Some(filter) = non_blank(app_filter) {
        let filter = filter.to_lowercase();
        if source == filter {
            score += APP_EXACT_BONUS;
        } else if source.contains(&filter) {
            score += APP_CONTAINS_BONUS;
        }
    }

    if !query.is_empty() {
        let shortcut = record.shortcut.to_lowercase();
        if shortcut == query {
            score += SHORTCUT_EXACT;
        } else if shortcut.contains(&query) {
            score += SHORTCUT_CONTAINS;
        }

        let description = record.description.to_lowercase();
        if description == query {
            score += DESCRIPTION_EXACT;
        } else if description.starts_with(&query) {
            score += DESCRIPTION_PREFIX;
        } else if description.contains(&query) {
            score += DESCRIPTION_CONTAINS;
        }

        let keywords: Vec<String> = record.keywords.iter().map(|k| k.to_lowercase()).collect();
        if keywords.iter().any(|k| *k == query) {
            score += KEYWORD_EXACT;
        } else if keywords.iter().any(|k| k.contains(&query)) {
            score += KEYWORD_CONTAINS;
        }
    }

    if POPULAR_SOURCES.contains(source.as_str()) {
        score += POPULAR_SOURCE_BONUS;
    }

    score
}

/// Filter, match, score and sort `records`, keeping at most `limit`.
///
/// Records that fail the filters or the match predicate are excluded, not
/// just scored low. Ties keep load order.
pub fn rank(
    records: &[Arc<ShortcutRecord>],
    query: &SearchQuery,
    limit: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Arc<ShortcutRecord>>> {
    let app = query.scoring_app();
    let mut scored = Vec::new();

    for (i, record) in records.iter().enumerate() {
        if i % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(HotkeysError::Cancelled);
        }
        if query.accepts(record) && matches(record, &query.term) {
            scored.push((score(record, &query.term, app), record));
        }
    }

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(scored
        .into_iter()
        .take(limit)
        .map(|(_, record)| Arc::clone(record))
        .collect())
}

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn squash(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn copy_record() -> ShortcutRecord {
        ShortcutRecord::new("Ctrl+C", "Copy", "notepad")
    }

    #[test]
    fn test_description_exact_alone() {
        assert_eq!(score(&copy_record(), "copy", None), 900);
        assert_eq!(score(&copy_record(), "COPY", None), 900);
    }

    #[test]
    fn test_shortcut_tiers() {
        let record = copy_record();
        assert_eq!(score(&record, "ctrl+c", None), SHORTCUT_EXACT);
        assert_eq!(score(&record, "ctrl", None), SHORTCUT_CONTAINS);
    }

    #[test]
    fn test_description_tiers_take_highest_only() {
        let record = ShortcutRecord::new("Ctrl+Shift+T", "Reopen closed tab", "edge");
        assert_eq!(score(&record, "reopen", None), DESCRIPTION_PREFIX);
        assert_eq!(score(&record, "closed", None), DESCRIPTION_CONTAINS);
        assert_eq!(score(&record, "reopen closed tab", None), DESCRIPTION_EXACT);
    }

    #[test]
    fn test_keyword_tiers() {
        let record = ShortcutRecord::new("F2", "Edit cell", "calc").with_keywords(["rename", "modify"]);
        assert_eq!(score(&record, "rename", None), KEYWORD_EXACT);
        assert_eq!(score(&record, "ren", None), KEYWORD_CONTAINS);
    }

    #[test]
    fn test_bonuses_are_additive() {
        let record = ShortcutRecord::new("Ctrl+T", "New tab", "Chrome").with_keywords(["tab"]);
        let expected = DESCRIPTION_CONTAINS + KEYWORD_EXACT + APP_EXACT_BONUS + POPULAR_SOURCE_BONUS;
        assert_eq!(score(&record, "tab", Some("chrome")), expected);

        let expected = DESCRIPTION_CONTAINS + KEYWORD_EXACT + APP_CONTAINS_BONUS + POPULAR_SOURCE_BONUS;
        assert_eq!(score(&record, "tab", Some("chr")), expected);
    }

    #[test]
    fn test_empty_term_scores_only_bonuses() {
        let record = ShortcutRecord::new("Ctrl+B", "Bold", "word");
        assert_eq!(score(&record, "", None), POPULAR_SOURCE_BONUS);
        assert_eq!(score(&record, "  ", Some("word")), APP_EXACT_BONUS + POPULAR_SOURCE_BONUS);
        assert_eq!(score(&copy_record(), "", None), 0);
    }

    #[test]
    fn test_matches_fields() {
        let record = ShortcutRecord::new("Ctrl+Shift+P", "Command palette", "vscode")
            .with_category("Navigation")
            .with_keywords(["commands"]);
        assert!(matches(&record, "palette"));
        assert!(matches(&record, "navig"));
        assert!(matches(&record, "COMMANDS"));
        assert!(matches(&record, "shift+p"));
        assert!(!matches(&record, "terminal"));
    }

    #[test]
    fn test_matches_normalized_shortcut_ignores_separators() {
        let record = ShortcutRecord::new("Ctrl+Shift+P", "Command palette", "vscode");
        assert!(matches(&record, "ctrl shift p"));
        assert!(matches(&record, "control+shift"));
        assert!(matches(&record, "shiftp"));
        assert!(!matches(&record, "alt shift"));
    }

    #[test]
    fn test_filters() {
        let record = ShortcutRecord::new("Ctrl+K", "Insert link", "Word")
            .with_category("Editing")
            .with_keywords(["hyperlink"]);

        assert!(SearchQuery::new("").with_app("wor").accepts(&record));
        assert!(!SearchQuery::new("").with_app("excel").accepts(&record));
        assert!(SearchQuery::new("").with_filter(FilterType::App, "WO").accepts(&record));
        assert!(SearchQuery::new("").with_filter(FilterType::Source, "word").accepts(&record));
        assert!(!SearchQuery::new("").with_filter(FilterType::Source, "wor").accepts(&record));
        assert!(SearchQuery::new("").with_filter(FilterType::Category, "edit").accepts(&record));
        assert!(SearchQuery::new("").with_filter(FilterType::Keyword, "link").accepts(&record));
        assert!(!SearchQuery::new("").with_filter(FilterType::Keyword, "table").accepts(&record));
    }

    #[test]
    fn test_cache_key_covers_all_fields() {
        let a = SearchQuery::new("copy").with_app("word");
        let b = SearchQuery::new("copy").with_filter(FilterType::App, "word");
        assert_eq!(a.cache_key(), "copy|word|None|");
        assert_eq!(b.cache_key(), "copy||App|word");
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_scoring_app_prefers_explicit_filter() {
        let query = SearchQuery::new("x").with_filter(FilterType::App, "word");
        assert_eq!(query.scoring_app(), Some("word"));
        let query = SearchQuery::new("x").with_filter(FilterType::Category, "edit");
        assert_eq!(query.scoring_app(), None);
        let query = SearchQuery::new("x").with_app("excel").with_filter(FilterType::App, "word");
        assert_eq!(query.scoring_app(), Some("excel"));
    }

    #[test]
    fn test_rank_excludes_sorts_and_bounds() {
        let mut records = Vec::new();
        records.push(Arc::new(ShortcutRecord::new("Ctrl+C", "Copy", "notepad")));
        records.push(Arc::new(ShortcutRecord::new("Ctrl+V", "Paste", "notepad")));
        records.push(Arc::new(ShortcutRecord::new("Ctrl+Shift+C", "Copy path", "explorer")));
        for i in 0..100 {
            records.push(Arc::new(ShortcutRecord::new(format!("F{}", i), "Copy variant", "bulk")));
        }

        let ranked = rank(&records, &SearchQuery::new("copy"), 50, &CancellationToken::new()).unwrap();
        assert_eq!(ranked.len(), 50);
        assert_eq!(ranked[0].description, "Copy");
        assert_eq!(ranked[1].description, "Copy path");
        assert!(ranked.iter().all(|r| r.description != "Paste"));
    }

    #[test]
    fn test_rank_ties_keep_load_order() {
        let records: Vec<Arc<ShortcutRecord>> = (0..5)
            .map(|i| Arc::new(ShortcutRecord::new(format!("F{}", i), "Run task", "tool")))
            .collect();
        let ranked = rank(&records, &SearchQuery::new("task"), 50, &CancellationToken::new()).unwrap();
        let shortcuts: Vec<&str> = ranked.iter().map(|r| r.shortcut.as_str()).collect();
        assert_eq!(shortcuts, vec!["F0", "F1", "F2", "F3", "F4"]);
    }

    #[test]
    fn test_rank_reports_cancellation() {
        let records = vec![Arc::new(copy_record())];
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = rank(&records, &SearchQuery::new("copy"), 50, &cancel);
        assert!(matches!(result, Err(HotkeysError::Cancelled)));
    }

    #[test]
    fn test_search_query_from_parsed() {
        let parsed = crate::query::parser::parse_query("copy file /explorer");
        let query = SearchQuery::from(&parsed);
        assert_eq!(query.term, "copy file");
        assert_eq!(query.app_filter.as_deref(), Some("explorer"));
        assert_eq!(query.filter_type, FilterType::App);
        assert!(!query.is_empty());

        assert!(SearchQuery::from(&crate::query::parser::parse_query("")).is_empty());
        assert!(!SearchQuery::from(&crate::query::parser::parse_query("category:edit")).is_empty());
    }
}
