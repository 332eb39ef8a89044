//! Keyboard-shortcut index with hot reload and a small query language.
//!
//! Shortcut definitions live in a directory tree of `*.json` files. The
//! [`ShortcutRepository`] loads them lazily, rebuilds the index when files
//! change and answers searches; the [`QueryProcessor`] parses query text,
//! ranks and caches results and renders [`ResultRow`]s for a host launcher.
//! [`Hotkeys`] wires both together.

pub mod cli;
pub mod cli_types;
pub mod config;
pub mod error;
pub mod plugin;
pub mod query;
pub mod record;
pub mod storage;

// Re-export commonly used types
pub use cli::CliApp;
pub use config::HotkeysConfig;
pub use error::{HotkeysError, Result};
pub use plugin::{Hotkeys, HotkeysBuilder};
pub use query::{
    parse_query, Command, ContextAction, FilterType, ParsedQuery, QueryProcessor, ResultAction, ResultCache,
    ResultPayload, ResultRow, SearchQuery,
};
pub use record::{normalize_shortcut, ShortcutRecord};
pub use storage::{ChangeType, RepositoryStats, ShortcutIndex, ShortcutRepository, ShortcutSource, ShortcutsChanged};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
