//! Shortcut record model and the JSON source format.
//!
//! Source files hold one JSON array of shortcut objects. Property names are
//! matched case-insensitively, so `"Shortcut"`, `"shortcut"` and `"SHORTCUT"`
//! all land in the same field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_PLATFORM: &str = "Windows";
pub const DEFAULT_DIFFICULTY: &str = "Beginner";

/// One keyboard shortcut definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortcutRecord {
    pub shortcut: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub category: String,
    /// Owning application or context. Falls back to the file's base name.
    pub source: String,
    pub language: Option<String>,
    pub url: Option<String>,
    pub aliases: Vec<String>,
    pub notes: Option<String>,
    pub is_global: bool,
    pub platform: String,
    pub version: Option<String>,
    pub difficulty: String,
    /// Lower-cased, modifier-expanded form of `shortcut`. Always derived,
    /// never read from source data.
    #[serde(skip)]
    pub normalized_shortcut: String,
}

impl ShortcutRecord {
    pub fn new(shortcut: impl Into<String>, description: impl Into<String>, source: impl Into<String>) -> Self {
        let shortcut = shortcut.into();
        let normalized_shortcut = normalize_shortcut(&shortcut);
        Self {
            shortcut,
            description: description.into(),
            keywords: Vec::new(),
            category: String::new(),
            source: source.into(),
            language: None,
            url: None,
            aliases: Vec::new(),
            notes: None,
            is_global: false,
            platform: DEFAULT_PLATFORM.to_string(),
            version: None,
            difficulty: DEFAULT_DIFFICULTY.to_string(),
            normalized_shortcut,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Natural key used to deduplicate records within one load:
    /// `source_shortcut_description`.
    pub fn composite_key(&self) -> String {
        format!("{}_{}_{}", self.source, self.shortcut, self.description)
    }

    /// Category for display, `General` when the source left it blank.
    pub fn display_category(&self) -> &str {
        if self.category.trim().is_empty() {
            "General"
        } else {
            &self.category
        }
    }

    fn from_raw(raw: RawShortcut, default_source: &str) -> Self {
        let shortcut = raw.shortcut.unwrap_or_default();
        let normalized_shortcut = normalize_shortcut(&shortcut);
        Self {
            shortcut,
            description: raw.description.unwrap_or_default(),
            keywords: raw.keywords.unwrap_or_default(),
            category: raw.category.unwrap_or_default(),
            source: non_blank(raw.source).unwrap_or_else(|| default_source.to_string()),
            language: raw.language,
            url: raw.url,
            aliases: raw.aliases.unwrap_or_default(),
            notes: raw.notes,
            is_global: raw.is_global.unwrap_or(false),
            platform: non_blank(raw.platform).unwrap_or_else(|| DEFAULT_PLATFORM.to_string()),
            version: raw.version,
            difficulty: non_blank(raw.difficulty).unwrap_or_else(|| DEFAULT_DIFFICULTY.to_string()),
            normalized_shortcut,
        }
    }
}

/// On-disk shape. Keys are lower-cased before this is deserialized.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawShortcut {
    shortcut: Option<String>,
    description: Option<String>,
    keywords: Option<Vec<String>>,
    category: Option<String>,
    source: Option<String>,
    language: Option<String>,
    url: Option<String>,
    aliases: Option<Vec<String>>,
    notes: Option<String>,
    #[serde(rename = "isglobal")]
    is_global: Option<bool>,
    platform: Option<String>,
    version: Option<String>,
    difficulty: Option<String>,
}

/// Parse the contents of one shortcut file. Records without their own
/// `source` take `default_source` (the file's base name).
pub fn parse_shortcut_file(contents: &str, default_source: &str) -> serde_json::Result<Vec<ShortcutRecord>> {
    let contents = contents.trim_start_matches('\u{feff}');
    let value: Value = serde_json::from_str(contents)?;
    let raw: Vec<RawShortcut> = serde_json::from_value(lowercase_keys(value))?;

    Ok(raw
        .into_iter()
        .map(|entry| ShortcutRecord::from_raw(entry, default_source))
        .collect())
}

/// Normalize a key combination for separator-insensitive matching:
/// `"Ctrl+Shift+P"` becomes `"control shift p"`.
pub fn normalize_shortcut(shortcut: &str) -> String {
    shortcut
        .split(|c: char| c == '+' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            let token = token.to_lowercase();
            match token.as_str() {
                "ctrl" => "control".to_string(),
                "win" => "windows".to_string(),
                _ => token,
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(lowercase_keys).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key.to_lowercase(), value))
                .collect(),
        ),
        other => other,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
