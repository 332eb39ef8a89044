//! Search syntax.
//!
//! The grammar is permissive and order-sensitive. Rules are tried in this
//! order and the first one that matches wins:
//!
//! 1. blank text                  -> search with an empty term
//! 2. `apps`                      -> list every source with its count
//! 3. `list:<app>`                -> list shortcuts of matching sources
//! 4. `app:` / `category:` / `keyword:` / `source:<value> [term]`
//!                                -> filtered search (`app:<value>` alone lists)
//! 5. `/<app> [term]`             -> list or search within an app
//! 6. `<term> /<app>`             -> search within an app
//! 7. anything else               -> plain search
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Search,
    List,
    Apps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterType {
    #[default]
    None,
    App,
    Category,
    Keyword,
    Source,
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterType::None => "None",
            FilterType::App => "App",
            FilterType::Category => "Category",
            FilterType::Keyword => "Keyword",
            FilterType::Source => "Source",
        };
        f.write_str(name)
    }
}

const FILTER_PREFIXES: [(&str, FilterType); 4] = [
    ("app:", FilterType::App),
    ("category:", FilterType::Category),
    ("keyword:", FilterType::Keyword),
    ("source:", FilterType::Source),
];

/// Structured form of one query. Produced fresh per query, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub command: Command,
    pub app_filter: Option<String>,
    pub search_term: Option<String>,
    pub filter_type: FilterType,
    pub filter_value: Option<String>,
}

impl ParsedQuery {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            command: Command::Search,
            app_filter: None,
            search_term: Some(term.into()),
            filter_type: FilterType::None,
            filter_value: None,
        }
    }

    pub fn apps() -> Self {
        Self {
            command: Command::Apps,
            app_filter: None,
            search_term: None,
            filter_type: FilterType::None,
            filter_value: None,
        }
    }

    pub fn list(app: impl Into<String>) -> Self {
        let app = app.into();
        Self {
            command: Command::List,
            app_filter: Some(app.clone()),
            search_term: Some(app),
            filter_type: FilterType::None,
            filter_value: None,
        }
    }

    /// Search restricted to an app, as written with the slash forms.
    pub fn search_in_app(term: impl Into<String>, app: impl Into<String>) -> Self {
        let app = app.into();
        Self {
            command: Command::Search,
            app_filter: Some(app.clone()),
            search_term: Some(term.into()),
            filter_type: FilterType::App,
            filter_value: Some(app),
        }
    }

    fn with_filter(mut self, filter_type: FilterType, value: impl Into<String>) -> Self {
        self.filter_type = filter_type;
        self.filter_value = Some(value.into());
        self
    }

    /// App name the `list` command should match against.
    pub fn list_target(&self) -> &str {
        self.app_filter
            .as_deref()
            .or(self.search_term.as_deref())
            .unwrap_or_default()
    }
}

pub fn parse_query(input: &str) -> ParsedQuery {
    let text = input.trim();

    if text.is_empty() {
        return ParsedQuery::search("");
    }

    if text.eq_ignore_ascii_case("apps") {
        return ParsedQuery::apps();
    }

    if let Some(rest) = strip_prefix_ignore_case(text, "list:") {
        return ParsedQuery::list(rest.trim());
    }

    for (prefix, filter_type) in FILTER_PREFIXES {
        if let Some(rest) = strip_prefix_ignore_case(text, prefix) {
            return parse_filter(rest, filter_type);
        }
    }

    if let Some(rest) = text.strip_prefix('/') {
        if !rest.contains('/') {
            return parse_leading_app(rest);
        }
    }

    if let Some(slash) = text.char_indices().skip(1).find(|&(_, c)| c == '/').map(|(i, _)| i) {
        let term = text[..slash].trim();
        let app = text[slash + 1..].trim();
        if app.is_empty() {
            return ParsedQuery::search(term);
        }
        return ParsedQuery::search_in_app(term, app);
    }

    ParsedQuery::search(text)
}

fn parse_filter(rest: &str, filter_type: FilterType) -> ParsedQuery {
    let (value, term) = split_first_word(rest);

    if term.is_empty() && filter_type == FilterType::App {
        return ParsedQuery::list(value).with_filter(filter_type, value);
    }

    ParsedQuery::search(term).with_filter(filter_type, value)
}

fn parse_leading_app(rest: &str) -> ParsedQuery {
    let (app, term) = split_first_word(rest);

    if app.is_empty() {
        return ParsedQuery::search("");
    }
    if term.is_empty() {
        return ParsedQuery::list(app).with_filter(FilterType::App, app);
    }
    ParsedQuery::search_in_app(term, app)
}

fn split_first_word(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim()),
        None => (text, ""),
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_blank_is_empty_search() {
        for input in ["", "   ", "\t\n"] {
            let parsed = parse_query(input);
            assert_eq!(parsed.command, Command::Search);
            assert_eq!(parsed.search_term.as_deref(), Some(""));
            assert_eq!(parsed.filter_type, FilterType::None);
        }
    }

    #[test]
    fn test_apps_command() {
        assert_eq!(parse_query("apps"), ParsedQuery::apps());
        assert_eq!(parse_query("  APPS "), ParsedQuery::apps());
        assert_eq!(parse_query("apps chrome").command, Command::Search);
    }

    #[test]
    fn test_list_command() {
        let parsed = parse_query("list:chrome");
        assert_eq!(parsed.command, Command::List);
        assert_eq!(parsed.app_filter.as_deref(), Some("chrome"));
        assert_eq!(parsed.search_term.as_deref(), Some("chrome"));
        assert_eq!(parsed.list_target(), "chrome");

        assert_eq!(parse_query("LIST: visual studio").list_target(), "visual studio");
    }

    #[test]
    fn test_app_prefix_with_term() {
        let parsed = parse_query("app:word paste");
        assert_eq!(parsed.command, Command::Search);
        assert_eq!(parsed.filter_type, FilterType::App);
        assert_eq!(parsed.filter_value.as_deref(), Some("word"));
        assert_eq!(parsed.search_term.as_deref(), Some("paste"));
        assert_eq!(parsed.app_filter, None);
    }

    #[test]
    fn test_app_prefix_alone_lists() {
        let parsed = parse_query("app:excel");
        assert_eq!(parsed.command, Command::List);
        assert_eq!(parsed.list_target(), "excel");
        assert_eq!(parsed.filter_type, FilterType::App);
    }

    #[test]
    fn test_other_filter_prefixes() {
        let parsed = parse_query("category:editing");
        assert_eq!(parsed.command, Command::Search);
        assert_eq!(parsed.filter_type, FilterType::Category);
        assert_eq!(parsed.filter_value.as_deref(), Some("editing"));
        assert_eq!(parsed.search_term.as_deref(), Some(""));

        let parsed = parse_query("Keyword:clipboard copy all");
        assert_eq!(parsed.filter_type, FilterType::Keyword);
        assert_eq!(parsed.filter_value.as_deref(), Some("clipboard"));
        assert_eq!(parsed.search_term.as_deref(), Some("copy all"));

        let parsed = parse_query("source:vscode  terminal");
        assert_eq!(parsed.filter_type, FilterType::Source);
        assert_eq!(parsed.filter_value.as_deref(), Some("vscode"));
        assert_eq!(parsed.search_term.as_deref(), Some("terminal"));
    }

    #[test]
    fn test_leading_slash_forms() {
        let parsed = parse_query("/firefox bookmarks");
        assert_eq!(parsed.command, Command::Search);
        assert_eq!(parsed.app_filter.as_deref(), Some("firefox"));
        assert_eq!(parsed.search_term.as_deref(), Some("bookmarks"));
        assert_eq!(parsed.filter_type, FilterType::App);

        let parsed = parse_query("/firefox");
        assert_eq!(parsed.command, Command::List);
        assert_eq!(parsed.app_filter.as_deref(), Some("firefox"));
    }

    #[test]
    fn test_trailing_slash_form() {
        let parsed = parse_query("copy file /explorer");
        assert_eq!(parsed.command, Command::Search);
        assert_eq!(parsed.search_term.as_deref(), Some("copy file"));
        assert_eq!(parsed.app_filter.as_deref(), Some("explorer"));
        assert_eq!(parsed.filter_type, FilterType::App);
    }

    #[test]
    fn test_ambiguous_slashes_resolve_by_rule_order() {
        // Leading slash with another slash falls through to the "term /app" rule
        let parsed = parse_query("/a/b");
        assert_eq!(parsed.search_term.as_deref(), Some("/a"));
        assert_eq!(parsed.app_filter.as_deref(), Some("b"));

        // Only the first slash after text splits
        let parsed = parse_query("open tab/window /chrome");
        assert_eq!(parsed.search_term.as_deref(), Some("open tab"));
        assert_eq!(parsed.app_filter.as_deref(), Some("window /chrome"));

        // Dangling slash drops the empty app filter
        let parsed = parse_query("copy /");
        assert_eq!(parsed, ParsedQuery::search("copy"));

        assert_eq!(parse_query("/"), ParsedQuery::search(""));
    }

    #[test]
    fn test_plain_search() {
        assert_eq!(parse_query("ctrl+c"), ParsedQuery::search("ctrl+c"));
        assert_eq!(parse_query("  new tab "), ParsedQuery::search("new tab"));
    }

    #[test]
    fn test_filter_type_display() {
        assert_eq!(FilterType::None.to_string(), "None");
        assert_eq!(FilterType::Category.to_string(), "Category");
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(input in "\\PC{0,40}") {
            let _ = parse_query(&input);
        }

        #[test]
        fn prop_whitespace_is_empty_search(input in "[ \\t\\n]{0,10}") {
            prop_assert_eq!(parse_query(&input), ParsedQuery::search(""));
        }

        #[test]
        fn prop_plain_words_are_searches(input in "[a-z][a-z ]{0,20}") {
            prop_assume!(input.trim() != "apps");
            let parsed = parse_query(&input);
            prop_assert_eq!(parsed.command, Command::Search);
            prop_assert_eq!(parsed.search_term.as_deref(), Some(input.trim()));
        }
    }
}
