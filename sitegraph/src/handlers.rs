use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use sitegraph_core::data::Database;
use sitegraph_core::load::{Loader, generate_crawl_summary, load_local_files, record_session};
use sitegraph_core::rank::{ReferenceGraph, candidate_limit, rank_with_graph};
use sitegraph_core::report::{ReportData, ReportFormat, generate_report, save_report};
use sitegraph_core::sanitize::{AssumeReachable, HttpLinkChecker, LinkChecker, Sanitizer};
use sitegraph_core::{LoaderConfig, PageSet};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/sitegraph/";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DATABASE_FILE_NAME: &str = "sitegraph.db";

/// Printed on stderr so `-f json` output on stdout stays parseable.
pub fn print_banner() {
    eprintln!(
        "{} {}",
        "sitegraph".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").bright_black()
    );
    eprintln!("{}", "bounded site crawler and reference-graph page ranker".bright_black());
    eprintln!();
}

/// Logs go to stderr so reports on stdout stay clean.
pub fn init_tracing(quiet: bool) {
    let level = if quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .try_init();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> String {
    print!("{} ", msg.bright_cyan().bold());
    let _ = io::stdout().flush();
    let mut response = String::new();
    if io::stdin().read_line(&mut response).is_err() {
        return String::new();
    }
    response.trim().to_lowercase()
}

// Input helpers

/// Parse a single line as a URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if Url::parse(line).is_ok() {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    eprintln!("{} Skipping invalid URL '{}'", "⚠".yellow(), line);
    None
}

/// Load and parse newline-delimited URLs from a file
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL file {}", path.display()))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        bail!("No valid URLs found in {}", path.display());
    }

    Ok(urls)
}

/// Parses a `FROM=TO` replacement pair. `TO` may be empty.
pub fn parse_replacement(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((from, to)) if !from.is_empty() => Ok((from.to_string(), to.to_string())),
        _ => bail!("Invalid replacement '{}', expected FROM=TO", raw),
    }
}

/// Reads a file, or stdin when no path is given.
pub fn read_input_text(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Explicit config file, else the one written by `init`, else defaults.
pub fn load_config(explicit: Option<&PathBuf>) -> Result<LoaderConfig> {
    if let Some(path) = explicit {
        return LoaderConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    let default_path = expand_path(DEFAULT_CONFIG_DIR).join(CONFIG_FILE_NAME);
    if default_path.exists() {
        return LoaderConfig::from_file(&default_path)
            .with_context(|| format!("Failed to load config {}", default_path.display()));
    }
    Ok(LoaderConfig::default())
}

/// Overlays crawl flags onto a loaded config.
pub fn apply_crawl_args(mut config: LoaderConfig, args: &ArgMatches) -> LoaderConfig {
    if let Some(url) = args.get_one::<Url>("url") {
        config.seed_url = Some(url.as_str().to_string());
    }
    if let Some(max_pages) = args.get_one::<usize>("max-pages") {
        config.max_pages = *max_pages;
    }
    if let Some(threads) = args.get_one::<usize>("threads") {
        config.workers = *threads;
    }
    if let Some(exclude) = args.get_many::<String>("exclude") {
        config.excluded_extensions = exclude.cloned().collect();
    }
    if let Some(browser) = args.get_one::<PathBuf>("browser") {
        config.browser = Some(browser.clone());
    }
    if let Some(timeout) = args.get_one::<u64>("render-timeout") {
        config.render_timeout_secs = Some(*timeout);
    }
    if let Some(retries) = args.get_one::<usize>("retries") {
        config.render_retries = *retries;
    }
    config
}

// Init

pub struct InitSummary {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
    pub database_path: PathBuf,
    pub wrote_config: bool,
}

/// Creates the config directory, a default config file and the database.
/// Existing files are replaced only when `force` is set.
pub fn initialize_workspace(config_dir: &Path, force: bool) -> Result<InitSummary> {
    fs::create_dir_all(config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;

    let config_path = config_dir.join(CONFIG_FILE_NAME);
    let wrote_config = force || !config_path.exists();
    if wrote_config {
        let raw = serde_json::to_string_pretty(&LoaderConfig::default())?;
        fs::write(&config_path, raw)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
    }

    let database_path = config_dir.join(DATABASE_FILE_NAME);
    if force && Database::exists(&database_path) {
        Database::drop(&database_path)
            .with_context(|| format!("Failed to remove {}", database_path.display()))?;
    }
    Database::new(&database_path)
        .with_context(|| format!("Failed to create database {}", database_path.display()))?;

    Ok(InitSummary {
        config_dir: config_dir.to_path_buf(),
        config_path,
        database_path,
        wrote_config,
    })
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  SITEGRAPH INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let raw_path = args
        .get_one::<String>("PATH")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_DIR);
    let mut force = args.get_flag("force");
    let config_dir = expand_path(raw_path);

    println!(
        "{} Target: {}",
        "→".blue(),
        config_dir.display().to_string().bright_white()
    );
    println!();

    let database_path = config_dir.join(DATABASE_FILE_NAME);
    if Database::exists(&database_path) && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("Database already exists at:");
        println!(
            "  {} {}",
            "•".yellow(),
            database_path.display().to_string().bright_white()
        );
        println!();

        let response = print_prompt("Would you like to overwrite it? [y/N]:");
        println!();
        if response == "y" || response == "yes" {
            force = true;
        } else {
            println!("{} Keeping existing database", "→".blue());
            println!();
        }
    }

    let summary = initialize_workspace(&config_dir, force)?;

    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Config directory: {}",
        "✓".green().bold(),
        summary.config_dir.display().to_string().bright_white()
    );
    println!(
        "{} Config file: {}{}",
        "✓".green().bold(),
        summary.config_path.display().to_string().bright_white(),
        if summary.wrote_config { "" } else { " (kept)" }
    );
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        summary.database_path.display().to_string().bright_white()
    );
    println!();
    Ok(())
}

// Crawl / load

fn open_database(args: &ArgMatches) -> Result<Option<Database>> {
    match args.get_one::<String>("db") {
        Some(raw) => {
            let path = expand_path(raw);
            let db = Database::new(&path)
                .with_context(|| format!("Failed to open database {}", path.display()))?;
            Ok(Some(db))
        }
        None => Ok(None),
    }
}

fn print_crawl_settings(config: &LoaderConfig) {
    eprintln!(
        "{} Crawling {}",
        "→".blue(),
        config
            .seed_url
            .as_deref()
            .unwrap_or_default()
            .bright_white()
    );
    eprintln!("  Page budget: {}", config.max_pages);
    eprintln!("  Workers: {}", config.workers);
    if let Some(ref browser) = config.browser {
        eprintln!("  Renderer: {}", browser.display());
    }
    eprintln!();
}

pub async fn handle_crawl(args: &ArgMatches, config_path: Option<&PathBuf>, quiet: bool) -> Result<()> {
    let config = apply_crawl_args(load_config(config_path)?, args);
    let output = args
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("pages.json"));

    let loader = Loader::new(config)?.with_progress_bars(!quiet);
    if !quiet {
        print_crawl_settings(loader.config());
    }

    let mut pages = loader.crawl_pages().await?;
    if let Some(files) = args.get_many::<PathBuf>("file") {
        let files: Vec<PathBuf> = files.cloned().collect();
        let local = load_local_files(&files, pages.len()).await;
        pages.extend(local);
    }

    PageSet::new(loader.seed_url(), pages.clone())
        .save(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if let Some(db) = open_database(args)? {
        let (graph, ranked) = loader.rank(&pages);
        let session_id = record_session(&db, loader.config(), &pages, &graph, &ranked)?;
        println!("{} Session recorded: {}", "✓".green().bold(), session_id);
    }

    if !quiet {
        print!("{}", generate_crawl_summary(&pages));
    }
    println!(
        "{} Saved {} pages to {}",
        "✓".green().bold(),
        pages.len(),
        output.display().to_string().bright_white()
    );
    Ok(())
}

pub async fn handle_load(args: &ArgMatches, config_path: Option<&PathBuf>, quiet: bool) -> Result<()> {
    let config = apply_crawl_args(load_config(config_path)?, args);
    let output = args
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("pages.json"));
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);

    let loader = Loader::new(config)?
        .with_progress_bars(!quiet)
        .with_refresh(args.get_flag("refresh"));
    if !quiet {
        print_crawl_settings(loader.config());
    }

    let outcome = loader.load(&output).await?;
    if outcome.from_cache && !quiet {
        eprintln!(
            "{} Reused pages from {}",
            "→".blue(),
            output.display().to_string().bright_white()
        );
    }

    let mut data = ReportData::from_ranking(
        loader.seed_url(),
        &outcome.pages,
        &outcome.graph,
        &outcome.ranked,
    );
    if let Some(db) = open_database(args)? {
        let session_id = record_session(
            &db,
            loader.config(),
            &outcome.pages,
            &outcome.graph,
            &outcome.ranked,
        )?;
        data = data.with_session(session_id);
    }

    print!("{}", generate_report(&data, format)?);
    Ok(())
}

// Rank

pub fn handle_rank(args: &ArgMatches, config_path: Option<&PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let input = args
        .get_one::<PathBuf>("input")
        .context("--input is required")?;
    let page_set = PageSet::load(input)
        .with_context(|| format!("Failed to read page set {}", input.display()))?;

    let limit = args
        .get_one::<usize>("limit")
        .copied()
        .unwrap_or_else(|| candidate_limit(config.max_pages));
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);

    let graph = ReferenceGraph::build(&page_set.pages);
    let ranked = rank_with_graph(&page_set.pages, &graph, limit, &config.rank_options());
    let data = ReportData::from_ranking(&page_set.seed_url, &page_set.pages, &graph, &ranked);
    let report = generate_report(&data, format)?;

    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            save_report(&report, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", report),
    }
    Ok(())
}

// Sanitize

pub async fn handle_sanitize(args: &ArgMatches) -> Result<()> {
    let answer = read_input_text(args.get_one::<PathBuf>("input"))?;
    let prompt = match args.get_one::<PathBuf>("prompt") {
        Some(path) => read_input_text(Some(path))?,
        None => String::new(),
    };
    let known = match args.get_one::<PathBuf>("known") {
        Some(path) => load_urls_from_file(path)?,
        None => Vec::new(),
    };
    let replacements = args
        .get_many::<String>("replace")
        .map(|values| values.map(|raw| parse_replacement(raw)).collect::<Result<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();

    let checker: Arc<dyn LinkChecker> = if args.get_flag("no-network") {
        Arc::new(AssumeReachable)
    } else {
        let timeout = args.get_one::<u64>("timeout").copied().unwrap_or(10);
        Arc::new(HttpLinkChecker::new(Duration::from_secs(timeout))?)
    };

    let sanitizer = Sanitizer::new(checker).with_known_urls(known);
    let cleaned = sanitizer
        .process_answer(&answer, &prompt, &replacements)
        .await;
    println!("{}", cleaned.trim_end());
    Ok(())
}
