use clap::Parser;
use cryptag_scope::{
    CacheDir,
    ConfigDb,
    Scope,
    ScopeConfig,
    backend::LocalBackend,
    config::SERVER_INFO_ENV_VAR,
    error::{self, Error},
    mcp,
    preview::ActionMetadata,
    reply::CollectingReply,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{AddArgs, Cli, Command, ConfigAction, PreviewArgs, SearchArgs, TagsArgs};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("CRYPTAG_SCOPE_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    init_tracing(cli.verbose, cli.quiet);

    let cache_dir = CacheDir::resolve(cli.cache_dir.as_deref())?;
    let config_db = ConfigDb::open(&cache_dir.config_db())?;
    let server_info = cli
        .server_info
        .clone()
        .or_else(|| std::env::var(SERVER_INFO_ENV_VAR).ok());

    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Show { json } => {
                config_show(cache_dir, &config_db, server_info.as_deref(), *json)
            }
            ConfigAction::Set { server_info } => {
                config_set(cache_dir, &config_db, server_info)
            }
        };
    }

    let config =
        ScopeConfig::resolve(cache_dir, &config_db, server_info.as_deref())?;
    drop(config_db);

    if let Command::Add(args) = &cli.command {
        return cmd_add(&config, args);
    }

    let scope = Scope::new();
    scope.init(config)?;

    match cli.command {
        Command::Search(args) => cmd_search(&scope, &args)?,
        Command::Preview(args) => cmd_preview(&scope, &args)?,
        Command::Departments { json } => cmd_departments(&scope, json)?,
        Command::Tags(args) => cmd_tags(&scope, &args)?,
        Command::Mcp => mcp::run_mcp(scope)?,
        Command::Add(_) | Command::Config { .. } | Command::Completions(_) => {}
    }

    Ok(())
}

fn config_show(
    cache_dir: CacheDir,
    config_db: &ConfigDb,
    server_info: Option<&str>,
    json: bool,
) -> error::Result<()> {
    let root = cache_dir.root().to_path_buf();
    let config = ScopeConfig::lookup(cache_dir, config_db, server_info)?;
    let backend = &config.backend;

    if json {
        let value = json!({
            "cache_dir": root.display().to_string(),
            "backend": backend.name,
            "base_url": backend.base_url,
            "has_auth_token": !backend.auth_token.is_empty(),
            "stored_backends": config_db
                .list_backend_configs()?
                .iter()
                .map(|b| b.name.clone())
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("cache dir: {}", root.display());
        println!("backend: {}", backend.name);
        println!("base url: {}", backend.base_url);
        let token = if backend.auth_token.is_empty() {
            "(none)"
        } else {
            "(set)"
        };
        println!("auth token: {token}");
    }
    Ok(())
}

fn config_set(
    cache_dir: CacheDir,
    config_db: &ConfigDb,
    server_info: &str,
) -> error::Result<()> {
    let config = ScopeConfig::resolve(cache_dir, config_db, Some(server_info))?;
    println!(
        "Backend '{}' now points at {}",
        config.backend.name, config.backend.base_url
    );
    Ok(())
}

fn cmd_add(config: &ScopeConfig, args: &AddArgs) -> error::Result<()> {
    let Some(root) = config.backend.local_path() else {
        return Err(Error::Config(format!(
            "rows can only be added to a local backend, not {}",
            config.backend.base_url
        )));
    };

    let data = match (&args.content, &args.file) {
        (Some(content), _) => content.clone().into_bytes(),
        (None, Some(path)) => std::fs::read(path)?,
        (None, None) => Vec::new(),
    };

    let backend = LocalBackend::open(&config.backend.name, &root)?;
    let row = backend.add_row(data, args.tags.iter().cloned())?;
    println!("Added row {}", row.id().unwrap_or_default());
    Ok(())
}

fn cmd_search(scope: &Scope, args: &SearchArgs) -> error::Result<()> {
    let query = args.query_text();
    let mut reply = CollectingReply::default();
    scope.search(&query, &args.department, &mut reply, &CancellationToken::new())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reply.results)?);
        return Ok(());
    }

    if reply.results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    for result in &reply.results {
        println!("{}\t{}", result.get("row_id"), result.title());
        let subtitle = result.get("short_summary");
        if !subtitle.is_empty() {
            println!("    {subtitle}");
        }
    }
    Ok(())
}

fn cmd_preview(scope: &Scope, args: &PreviewArgs) -> error::Result<()> {
    let result = scope.find_result(&args.row_id, &args.department)?;
    let mut reply = CollectingReply::default();
    scope.preview(&result, &ActionMetadata::default(), &mut reply)?;

    if args.json {
        let widgets: Vec<_> = reply
            .widgets
            .iter()
            .map(|w| {
                json!({
                    "id": w.id,
                    "type": w.kind,
                    "attributes": w.resolve(&result),
                })
            })
            .collect();
        let value = json!({ "layout": reply.layouts.first(), "widgets": widgets });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for widget in &reply.widgets {
        let attributes = widget.resolve(&result);
        for (name, value) in &attributes {
            if let Some(text) = value.as_str()
                && !text.is_empty()
            {
                println!("{}.{name}: {text}", widget.id);
            }
        }
    }
    Ok(())
}

fn cmd_departments(scope: &Scope, json: bool) -> error::Result<()> {
    let tree = scope.departments("");
    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
        return Ok(());
    }

    println!("{}", tree.label);
    for department in &tree.subdepartments {
        println!("  {}\t{}", department.id, department.label);
    }
    Ok(())
}

fn cmd_tags(scope: &Scope, args: &TagsArgs) -> error::Result<()> {
    let cache = scope.tag_cache()?;

    if args.refresh {
        let client = scope.client()?;
        let outcome = client.refresh_tag_cache_now(cache);
        tracing::info!(
            backend = client.backend().name(),
            ?outcome,
            "tag cache refreshed"
        );
    }

    let pairs = cache.load_all()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&pairs)?);
    } else if pairs.is_empty() {
        println!("No cached tag pairs.");
    } else {
        for pair in &pairs {
            println!("{}\t{}", pair.random, pair.plain);
        }
    }
    Ok(())
}
