//! Presentation-ready result rows handed to the host.
//!
//! Rows carry their actions as data; the host decides how to copy to the
//! clipboard or re-run a query.

use std::sync::Arc;

use serde::Serialize;

use crate::record::ShortcutRecord;

const FILTER_MARKER: &str = "\u{1F4CD}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tooltip {
    pub title: String,
    pub body: String,
}

/// What a row refers to, used later by context-menu actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResultPayload {
    Shortcut(Arc<ShortcutRecord>),
    App(String),
    Query(String),
    None,
}

/// What happens when a row is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResultAction {
    CopyToClipboard(String),
    /// Ask the host to replace the query text and search again.
    ChangeQuery(String),
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    pub title: String,
    pub subtitle: String,
    pub tooltip: Option<Tooltip>,
    pub score: i32,
    pub payload: ResultPayload,
    pub action: ResultAction,
}

impl ResultRow {
    fn message(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
            tooltip: None,
            score: 0,
            payload: ResultPayload::None,
            action: ResultAction::None,
        }
    }

    fn with_action(mut self, action: ResultAction) -> Self {
        self.action = action;
        self
    }

    fn with_payload(mut self, payload: ResultPayload) -> Self {
        self.payload = payload;
        self
    }

    /// A shortcut search hit. `app_filter` marks the subtitle when the
    /// results were narrowed to an app.
    pub fn shortcut(record: Arc<ShortcutRecord>, score: i32, app_filter: Option<&str>) -> Self {
        let mut subtitle = format!("{} | {}", record.source, record.display_category());
        if let Some(app) = app_filter.filter(|a| !a.trim().is_empty()) {
            subtitle = format!("{} {} (filtered by {})", FILTER_MARKER, subtitle, app);
        }

        Self {
            title: format!("{} - {}", record.shortcut, record.description),
            subtitle,
            tooltip: Some(Tooltip {
                title: record.description.clone(),
                body: format!(
                    "{}\n\nSource: {}\nCategory: {}",
                    record.shortcut,
                    record.source,
                    record.display_category()
                ),
            }),
            score,
            action: ResultAction::CopyToClipboard(record.shortcut.clone()),
            payload: ResultPayload::Shortcut(record),
        }
    }

    /// A shortcut shown by `list`, without search context.
    pub fn listed(record: Arc<ShortcutRecord>) -> Self {
        Self {
            title: format!("{} - {}", record.shortcut, record.description),
            subtitle: format!("{} | {}", record.source, record.display_category()),
            tooltip: Some(Tooltip {
                title: record.description.clone(),
                body: format!("{}\n\nCategory: {}", record.shortcut, record.display_category()),
            }),
            score: 0,
            action: ResultAction::CopyToClipboard(record.shortcut.clone()),
            payload: ResultPayload::Shortcut(record),
        }
    }

    pub fn app(name: &str, count: usize, keyword: &str) -> Self {
        Self::message(
            format!("{} ({} shortcuts)", name, count),
            format!("Click to see all {} shortcuts", name),
        )
        .with_action(ResultAction::ChangeQuery(change_query(keyword, &format!("list:{}", name))))
        .with_payload(ResultPayload::App(name.to_string()))
    }

    pub fn no_app(app: &str, keyword: &str) -> Self {
        Self::message(
            format!("No app found matching '{}'", app),
            "Type 'apps' to see all available applications",
        )
        .with_action(ResultAction::ChangeQuery(change_query(keyword, "apps")))
    }

    pub fn no_apps() -> Self {
        Self::message("No apps found", "Add *.json shortcut files to the Shortcuts directory")
    }

    pub fn no_results(term: &str, app_filter: Option<&str>, original_query: &str) -> Self {
        let row = match app_filter.filter(|a| !a.trim().is_empty()) {
            Some(app) => Self::message(
                format!("No hotkeys found for '{}' in {}", term, app),
                format!("Try removing /{} filter or check app name", app),
            ),
            None => Self::message(
                format!("No hotkeys found for '{}'", term),
                "Try: 'apps' to see available apps, or 'search /appname' to filter by app",
            ),
        };
        row.with_payload(ResultPayload::Query(original_query.to_string()))
    }

    pub fn help(keyword: &str) -> Vec<Self> {
        vec![
            Self::message("Search hotkeys by keyword", "Example: 'copy', 'paste', 'ctrl+c'"),
            Self::message("List all available apps", "Type: apps")
                .with_action(ResultAction::ChangeQuery(change_query(keyword, "apps"))),
            Self::message("List shortcuts for specific app", "Type: list:appname (e.g., 'list:chrome')"),
        ]
    }

    pub fn error(query: &str, message: &str) -> Self {
        Self::message("Error processing query", format!("Query: '{}' - {}", query, message))
    }

    pub fn timed_out(query: &str) -> Self {
        Self::message(
            "Query timed out",
            format!("Search for '{}' took too long. Please try again.", query),
        )
    }

    pub fn failed(query: &str, message: &str) -> Self {
        Self::message("Error occurred", format!("Failed to process '{}': {}", query, message))
    }

    pub fn record(&self) -> Option<&Arc<ShortcutRecord>> {
        match &self.payload {
            ResultPayload::Shortcut(record) => Some(record),
            _ => None,
        }
    }
}

/// An entry of a row's context menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextAction {
    pub title: String,
    pub action: ResultAction,
}

/// Context-menu entries for a row, derived from its payload alone.
pub fn context_actions(row: &ResultRow, keyword: &str) -> Vec<ContextAction> {
    match &row.payload {
        ResultPayload::Shortcut(record) => vec![
            ContextAction {
                title: "Copy shortcut to clipboard (Ctrl+C)".to_string(),
                action: ResultAction::CopyToClipboard(record.shortcut.clone()),
            },
            ContextAction {
                title: "Copy description".to_string(),
                action: ResultAction::CopyToClipboard(record.description.clone()),
            },
            ContextAction {
                title: format!("Show all {} shortcuts", record.source),
                action: ResultAction::ChangeQuery(change_query(keyword, &format!("list:{}", record.source))),
            },
        ],
        ResultPayload::Query(query) => vec![ContextAction {
            title: "Copy query to clipboard".to_string(),
            action: ResultAction::CopyToClipboard(query.clone()),
        }],
        ResultPayload::App(_) | ResultPayload::None => Vec::new(),
    }
}

fn change_query(keyword: &str, query: &str) -> String {
    if keyword.is_empty() {
        query.to_string()
    } else {
        format!("{} {}", keyword, query)
    }
}
