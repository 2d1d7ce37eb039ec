//!
//! wadarchive CLI binary
//! ---------------------
//! Browse and search the archive catalog from the command line. Results are
//! printed to stdout as JSON; failures print the `AppError` JSON and exit
//! non-zero. Logs go to stderr.

use std::process::ExitCode;

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use wadarchive::query::RawParams;
use wadarchive::settings::{Settings, ENV_FIXTURE, ENV_PG_DSN};
use wadarchive::storage::{CatalogStore, MemoryStore, PgStore};
use wadarchive::{AppError, AppResult, Catalog};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} list <collection> [path] [query-string]\n  {program} search <query-string>\n  {program} entry <collection> <path>\n  {program} latest\n  {program} updated\n\nQuery-string keys:\n  list:    sort_field=title|date  sort_order=asc|desc  limit=1..200  offset=N\n  search:  search_key=<words>  search_fields=title,description,filename,textfile\n           collections=<c,..>  filter_game=<g,..>  filter_gameplay=singleplayer,cooperative,deathmatch\n           sort_field=relevance|title|updated  sort_order=asc|desc  limit=1..200  offset=N\n\nEnvironment:\n  {ENV_PG_DSN}        PostgreSQL connection string\n  {ENV_FIXTURE}       JSON catalog fixture (used when no DSN is set)\n  WADARCHIVE_FACETS         JSON facet tables overriding the built-in ones\n  WADARCHIVE_RECENT_DAYS    latest/updated window in days (default 30)\n  WADARCHIVE_RECENT_LIMIT   latest/updated size (default 20)\n\nExamples:\n  {program} list idgames levels/doom2 'sort_field=date&sort_order=desc&limit=10'\n  {program} search 'search_key=alien+vendetta&filter_game=doom2'"
    );
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    List { collection: String, path: Option<String>, query: RawParams },
    Search { query: RawParams },
    Entry { collection: String, path: String },
    Latest,
    Updated,
}

fn parse_args(args: &[String]) -> Result<Command> {
    let word = |i: usize| args.get(i).map(String::as_str);
    match word(1) {
        Some("list") => {
            let collection = word(2).ok_or_else(|| anyhow!("list needs a collection"))?.to_string();
            // A lone third argument containing '=' is the query string, not a path.
            let (path, qs) = match (word(3), word(4)) {
                (Some(p), None) if p.contains('=') => (None, Some(p)),
                (p, qs) => (p.map(str::to_string), qs),
            };
            Ok(Command::List { collection, path, query: RawParams::from_query_string(qs.unwrap_or("")) })
        }
        Some("search") => {
            let qs = word(2).ok_or_else(|| anyhow!("search needs a query string"))?;
            Ok(Command::Search { query: RawParams::from_query_string(qs) })
        }
        Some("entry") => match (word(2), word(3)) {
            (Some(c), Some(p)) => Ok(Command::Entry { collection: c.to_string(), path: p.to_string() }),
            _ => Err(anyhow!("entry needs a collection and a path")),
        },
        Some("latest") => Ok(Command::Latest),
        Some("updated") => Ok(Command::Updated),
        Some(other) => Err(anyhow!("unknown command '{}'", other)),
        None => Err(anyhow!("missing command")),
    }
}

fn to_json<T: Serialize>(v: &T) -> AppResult<serde_json::Value> {
    serde_json::to_value(v).map_err(|e| AppError::internal("serialize_failed", e.to_string()))
}

async fn execute<S: CatalogStore>(catalog: &Catalog<S>, cmd: &Command) -> AppResult<serde_json::Value> {
    match cmd {
        Command::List { collection, path, query } => to_json(&catalog.list_at(collection, path.as_deref(), query).await?),
        Command::Search { query } => to_json(&catalog.search_raw(query).await?),
        Command::Entry { collection, path } => to_json(&catalog.entry(collection, path).await?),
        Command::Latest => to_json(&catalog.latest(Utc::now()).await?),
        Command::Updated => to_json(&catalog.updated(Utc::now()).await?),
    }
}

async fn run(settings: &Settings, cmd: &Command) -> AppResult<serde_json::Value> {
    let facets = settings.load_facets().map_err(AppError::from)?;
    if let Some(dsn) = &settings.pg_dsn {
        let store = PgStore::connect(dsn)
            .await
            .map_err(|e| AppError::storage("storage_unavailable", format!("{:#}", e)))?;
        let catalog = Catalog::new(store, facets).with_feeds(settings.feeds);
        return execute(&catalog, cmd).await;
    }
    let store = match &settings.fixture {
        Some(path) => MemoryStore::load(path)?,
        None => {
            warn!(target: "wadarchive", "neither {} nor {} is set; using an empty catalog", ENV_PG_DSN, ENV_FIXTURE);
            MemoryStore::new()
        }
    };
    let catalog = Catalog::new(store, facets).with_feeds(settings.feeds);
    execute(&catalog, cmd).await
}

fn print_json(v: &serde_json::Value) {
    match serde_json::to_string_pretty(v) {
        Ok(s) => println!("{}", s),
        Err(_) => println!("{}", v),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("wadarchive").to_string();
    if args.iter().skip(1).any(|a| a == "-h" || a == "--help") {
        print_usage(&program);
        return ExitCode::SUCCESS;
    }
    let cmd = match parse_args(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}\n", e);
            print_usage(&program);
            return ExitCode::from(2);
        }
    };

    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            let err = AppError::internal("invalid_settings", format!("{:#}", e));
            print_json(&to_json(&err).unwrap_or_default());
            return ExitCode::FAILURE;
        }
    };

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "wadarchive",
        "wadarchive {} starting: RUST_LOG='{}', backend={}, recent_days={}, recent_limit={}",
        env!("CARGO_PKG_VERSION"),
        rust_log,
        if settings.pg_dsn.is_some() { "postgres" } else { "memory" },
        settings.feeds.recent_days,
        settings.feeds.recent_limit
    );

    match run(&settings, &cmd).await {
        Ok(v) => {
            print_json(&v);
            ExitCode::SUCCESS
        }
        Err(e) => {
            warn!(target: "wadarchive", "{} (status {})", e, e.http_status());
            print_json(&to_json(&e).unwrap_or_default());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        std::iter::once("wadarchive").chain(v.iter().copied()).map(str::to_string).collect()
    }

    #[test]
    fn parses_list_forms() {
        match parse_args(&args(&["list", "idgames"])).unwrap() {
            Command::List { collection, path, query } => {
                assert_eq!(collection, "idgames");
                assert_eq!(path, None);
                assert_eq!(query, RawParams::new());
            }
            other => panic!("unexpected {:?}", other),
        }
        match parse_args(&args(&["list", "idgames", "limit=5"])).unwrap() {
            Command::List { path, query, .. } => {
                assert_eq!(path, None);
                assert_eq!(query.get("limit"), Some("5"));
            }
            other => panic!("unexpected {:?}", other),
        }
        match parse_args(&args(&["list", "idgames", "levels/", "sort_field=date"])).unwrap() {
            Command::List { path, query, .. } => {
                assert_eq!(path.as_deref(), Some("levels/"));
                assert_eq!(query.get("sort_field"), Some("date"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rejects_bad_invocations() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["list"])).is_err());
        assert!(parse_args(&args(&["entry", "idgames"])).is_err());
        assert!(parse_args(&args(&["frobnicate"])).is_err());
        assert_eq!(parse_args(&args(&["latest"])).unwrap(), Command::Latest);
    }
}
