pub mod loader;
pub mod memory;
pub mod repository;
pub mod watcher;

pub use loader::ShortcutLoader;
pub use memory::{IndexBuilder, IndexMetadata, ShortcutIndex};
pub use repository::{ChangeType, RepositoryStats, ShortcutRepository, ShortcutSource, ShortcutsChanged};
pub use watcher::ShortcutWatcher;
