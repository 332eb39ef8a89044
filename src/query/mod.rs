pub mod cache;
pub mod parser;
pub mod processor;
pub mod ranker;
pub mod results;

pub use cache::{CacheStats, ResultCache};
pub use parser::{parse_query, Command, FilterType, ParsedQuery};
pub use processor::QueryProcessor;
pub use ranker::{matches, rank, score, SearchQuery};
pub use results::{context_actions, ContextAction, ResultAction, ResultPayload, ResultRow, Tooltip};
