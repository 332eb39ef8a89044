use anyhow::{Context, Result};
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    cli_types::{QueryArgs, StatsArgs, WatchArgs},
    query::results::{ResultAction, ResultRow},
    storage::repository::ShortcutSource,
    Hotkeys, HotkeysConfig,
};

/// Command-line host. Stands in for a launcher: renders rows, follows
/// "change query" actions and prints clipboard actions instead of running them.
pub struct CliApp {
    hotkeys: Hotkeys,
    verbose: bool,
}

impl CliApp {
    pub fn new(config: HotkeysConfig, verbose: bool, colors_enabled: bool) -> Result<Self> {
        info!("Initializing hotkeys CLI");
        colored::control::set_override(colors_enabled);

        let hotkeys = Hotkeys::from_config(config).context("Failed to initialize hotkeys")?;
        Ok(Self { hotkeys, verbose })
    }

    pub fn hotkeys(&self) -> &Hotkeys {
        &self.hotkeys
    }

    pub async fn query(&self, args: QueryArgs) -> Result<()> {
        let text = args.query();
        let mut rows = self.hotkeys.query(&text).await;
        if let Some(limit) = args.limit {
            rows.truncate(limit);
        }

        if args.json {
            println!("{}", serde_json::to_string_pretty(&rows).context("Failed to serialize rows")?);
        } else {
            self.print_rows(&rows);
        }
        Ok(())
    }

    pub async fn interactive(&self) -> Result<()> {
        self.print_header("Hotkeys");
        self.print_info("Type a query, a row number to choose it, or 'help'.");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut rows: Vec<ResultRow> = Vec::new();
        let mut pending: Option<String> = None;

        loop {
            let input = match pending.take() {
                Some(query) => {
                    println!("{} {}", ">".cyan(), query);
                    query
                }
                None => {
                    print!("\n{} ", ">".cyan().bold());
                    std::io::Write::flush(&mut std::io::stdout()).context("Failed to flush stdout")?;
                    match lines.next_line().await.context("Failed to read input")? {
                        Some(line) => line,
                        None => break,
                    }
                }
            };
            let input = input.trim();

            match input {
                "exit" | "quit" | "q" => break,
                "help" | "h" => {
                    self.print_help_interactive();
                    continue;
                }
                "stats" => {
                    self.print_stats();
                    continue;
                }
                "reload" => {
                    match self.hotkeys.reload().await {
                        Ok(()) => self.print_success("Reloaded"),
                        Err(e) => self.print_error(&format!("Reload failed: {}", e)),
                    }
                    continue;
                }
                _ => {}
            }

            if let Some(index) = input.strip_prefix("menu ").and_then(|n| n.trim().parse::<usize>().ok()) {
                match index.checked_sub(1).and_then(|i| rows.get(i)) {
                    Some(row) => {
                        for (n, item) in self.hotkeys.context_menu(row).iter().enumerate() {
                            println!("  {}. {}", n + 1, item.title);
                        }
                    }
                    None => self.print_warning(&format!("No row {}", index)),
                }
                continue;
            }

            if let Ok(index) = input.parse::<usize>() {
                match index.checked_sub(1).and_then(|i| rows.get(i)) {
                    Some(row) => pending = self.choose(row),
                    None => self.print_warning(&format!("No row {}", index)),
                }
                continue;
            }

            rows = self.hotkeys.query(input).await;
            self.print_rows(&rows);
        }

        self.print_success("Goodbye!");
        Ok(())
    }

    pub async fn watch(&self, args: WatchArgs) -> Result<()> {
        let mut changes = self.hotkeys.subscribe();

        // Loading also installs the file watcher
        let records = self
            .hotkeys
            .repository()
            .get_all(&CancellationToken::new())
            .await
            .context("Failed to load shortcuts")?;
        self.print_info(&format!(
            "Watching {} ({} shortcuts). Press Ctrl+C to stop.",
            self.hotkeys.config().shortcuts_dir.display(),
            records.len()
        ));

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                change = changes.recv() => match change {
                    Ok(change) => {
                        println!(
                            "{} {:?} {} (generation {})",
                            change.at.format("%H:%M:%S").to_string().dimmed(),
                            change.change_type,
                            change.source,
                            change.generation
                        );
                        if let Some(query) = &args.query {
                            self.print_rows(&self.hotkeys.query(query).await);
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        self.print_warning(&format!("Missed {} change notifications", missed));
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        Ok(())
    }

    pub async fn stats(&self, args: StatsArgs) -> Result<()> {
        self.hotkeys
            .repository()
            .get_all(&CancellationToken::new())
            .await
            .context("Failed to load shortcuts")?;

        if args.json {
            let stats = self.hotkeys.stats();
            println!("{}", serde_json::to_string_pretty(&stats).context("Failed to serialize stats")?);
        } else {
            self.print_stats();
        }
        Ok(())
    }

    /// Perform a row's action. Returns the follow-up query, if any.
    fn choose(&self, row: &ResultRow) -> Option<String> {
        match &row.action {
            ResultAction::CopyToClipboard(text) => {
                self.print_success(&format!("Copied '{}'", text));
                None
            }
            ResultAction::ChangeQuery(query) => Some(self.strip_keyword(query).to_string()),
            ResultAction::None => None,
        }
    }

    fn strip_keyword<'a>(&self, query: &'a str) -> &'a str {
        let keyword = self.hotkeys.config().action_keyword.as_str();
        if keyword.is_empty() {
            return query;
        }
        query
            .strip_prefix(keyword)
            .map(str::trim_start)
            .unwrap_or(query)
    }

    fn print_rows(&self, rows: &[ResultRow]) {
        if rows.is_empty() {
            self.print_info("No results yet");
            return;
        }

        for (i, row) in rows.iter().enumerate() {
            let score = if row.score != 0 {
                format!(" ({})", row.score).cyan().to_string()
            } else {
                String::new()
            };
            println!("{:>3}. {}{}", i + 1, row.title.bold(), score);
            println!("     {}", row.subtitle.dimmed());
            if self.verbose {
                if let Some(tooltip) = &row.tooltip {
                    for line in tooltip.body.lines().filter(|l| !l.is_empty()) {
                        println!("     {}", line.dimmed());
                    }
                }
            }
        }
    }

    fn print_stats(&self) {
        let stats = self.hotkeys.stats();
        self.print_header("Repository");
        println!("  Directory:   {}", self.hotkeys.config().shortcuts_dir.display());
        println!("  Records:     {}", stats.records);
        println!("  Sources:     {}", stats.sources);
        println!("  Files:       {} loaded, {} failed", stats.files_loaded, stats.files_failed);
        println!("  Duplicates:  {}", stats.duplicates_dropped);
        println!("  Generation:  {}", stats.generation);
        println!("  Reloads:     {}", stats.reloads);
        println!("  Searches:    {}", stats.searches);
        println!("  Watching:    {}", if stats.watching { "yes" } else { "no" });
        if let Some(at) = stats.last_reload {
            println!("  Last reload: {}", at.to_rfc3339());
        }
        let cache = self.hotkeys.processor().cache().stats();
        println!("  Cache:       {} entries, {} hits, {} misses", cache.entries, cache.hits, cache.misses);
    }

    fn print_help_interactive(&self) {
        self.print_header("Interactive Commands");
        self.print_info("  <query>          - Search, e.g. 'copy', 'copy /word', 'list:chrome', 'apps'");
        self.print_info("  <n>              - Choose row n");
        self.print_info("  menu <n>         - Show the context menu of row n");
        self.print_info("  reload           - Reload the shortcuts directory");
        self.print_info("  stats            - Show repository statistics");
        self.print_info("  exit, quit, q    - Exit interactive mode");
    }

    fn print_header(&self, title: &str) {
        println!("\n{}", title.bold().underline());
    }

    fn print_success(&self, message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    fn print_info(&self, message: &str) {
        println!("{}", message);
    }

    fn print_warning(&self, message: &str) {
        println!("{} {}", "!".yellow(), message.yellow());
    }

    fn print_error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message.red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_app(dir: &TempDir) -> CliApp {
        let mut config = HotkeysConfig::default().with_shortcuts_dir(dir.path());
        config.watcher.enabled = false;
        CliApp::new(config, false, false).unwrap()
    }

    fn create_shortcut_file(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[tokio::test]
    async fn test_cli_app_creation() {
        let dir = TempDir::new().unwrap();
        let app = create_test_app(&dir);
        assert_eq!(app.hotkeys().config().action_keyword, "hk");
    }

    #[tokio::test]
    async fn test_query_command() {
        let dir = TempDir::new().unwrap();
        create_shortcut_file(&dir, "chrome.json", r#"[{"shortcut": "Ctrl+T", "description": "New tab"}]"#);
        let app = create_test_app(&dir);

        let args = QueryArgs {
            text: vec!["new".to_string(), "tab".to_string()],
            json: true,
            limit: Some(5),
        };
        assert!(app.query(args).await.is_ok());
        assert_eq!(app.hotkeys().stats().searches, 1);
    }

    #[tokio::test]
    async fn test_stats_command_loads_index() {
        let dir = TempDir::new().unwrap();
        create_shortcut_file(&dir, "word.json", r#"[{"shortcut": "Ctrl+B", "description": "Bold"}]"#);
        let app = create_test_app(&dir);

        assert!(app.stats(StatsArgs { json: true }).await.is_ok());
        assert_eq!(app.hotkeys().stats().records, 1);
    }

    #[tokio::test]
    async fn test_choose_follows_change_query() {
        let dir = TempDir::new().unwrap();
        let app = create_test_app(&dir);

        let row = ResultRow::app("chrome", 3, "hk");
        assert_eq!(app.choose(&row), Some("list:chrome".to_string()));

        let row = ResultRow::error("x", "boom");
        assert_eq!(app.choose(&row), None);
    }

    #[test]
    fn test_strip_keyword_leaves_other_text() {
        let dir = TempDir::new().unwrap();
        let app = create_test_app(&dir);
        assert_eq!(app.strip_keyword("hk apps"), "apps");
        assert_eq!(app.strip_keyword("apps"), "apps");
    }
}
