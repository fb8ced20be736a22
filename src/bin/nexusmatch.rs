use clap::{Parser, Subcommand};
use nexusmatch::collection::Collection;
use nexusmatch::config::AppConfig;
use nexusmatch::errors::DbError;
use nexusmatch::query::{FindOptions, IndexDirection, parse_query_json};
use nexusmatch::utils::json::read_ndjson;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "nexusmatch", version, about = "Query matching and index planning over NDJSON", long_about = None)]
struct Cli {
    /// Path to a config file (TOML)
    #[arg(long, help = "Path to a config file (TOML). If omitted, NEXUSMATCH_CONFIG or ./nexusmatch.toml is used.")]
    config: Option<PathBuf>,
    /// Override the log level (error|warn|info|debug|trace)
    #[arg(long)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Compile a query and report its clause count")]
    Check {
        #[arg(long, help = "Query as JSON, e.g. '{\"i\":{\"$not\":{\"$gt\":\"b\"}}}'")]
        query: String,
    },
    #[command(about = "Count documents in an NDJSON file matching a query")]
    Count {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        query: String,
        #[arg(long = "index", help = "Field to index before running (repeatable)")]
        indexes: Vec<String>,
    },
    #[command(about = "Print matching documents as NDJSON")]
    Find {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        query: String,
        #[arg(long = "index")]
        indexes: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        batch_size: Option<usize>,
    },
    #[command(about = "Print the plan chosen for a query against one index")]
    Explain {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        query: String,
        #[arg(long)]
        index: String,
        #[arg(long, help = "Build the index in descending order")]
        desc: bool,
    },
}

fn load_collection(
    cfg: &AppConfig,
    data: &Path,
    indexes: &[String],
    direction: IndexDirection,
) -> Result<Collection, DbError> {
    let name = data.file_stem().and_then(|s| s.to_str()).unwrap_or("data").to_string();
    let col = Collection::new(name, cfg.query.clone());
    for doc in read_ndjson(BufReader::new(File::open(data)?))? {
        col.insert(doc);
    }
    for field in indexes {
        col.create_index(field, direction);
    }
    Ok(col)
}

fn run(cli: Cli, cfg: &AppConfig) -> Result<(), DbError> {
    let mut out = std::io::stdout().lock();
    match cli.command {
        Commands::Check { query } => {
            let q = parse_query_json(&query, &cfg.query)?;
            writeln!(out, "ok: {} field(s), {} clause(s)", q.fields.len(), q.clause_count())?;
        }
        Commands::Count { data, query, indexes } => {
            let col = load_collection(cfg, &data, &indexes, IndexDirection::Asc)?;
            writeln!(out, "{}", col.count_json(&query)?)?;
        }
        Commands::Find { data, query, indexes, limit, batch_size } => {
            let col = load_collection(cfg, &data, &indexes, IndexDirection::Asc)?;
            let cursor = col.find_json(&query, &FindOptions { limit, batch_size })?;
            for rec in cursor {
                let json = bson::Bson::Document(rec.data.clone()).into_relaxed_extjson();
                writeln!(out, "{json}")?;
            }
        }
        Commands::Explain { data, query, index, desc } => {
            let direction = if desc { IndexDirection::Desc } else { IndexDirection::Asc };
            let col = load_collection(cfg, &data, std::slice::from_ref(&index), direction)?;
            let q = parse_query_json(&query, &cfg.query)?;
            let explain = col.explain(&q);
            writeln!(out, "{}", serde_json::to_string_pretty(&explain)?)?;
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let mut cfg = match AppConfig::resolve(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };
    if let Some(level) = &cli.log_level {
        cfg.log.level = Some(level.clone());
    }
    // File logging only when a log directory is configured; otherwise stderr.
    // Without a config file or --log-level, NEXUSMATCH_* alone drive logging (incl. NEXUSMATCH_DEV6).
    let env_only = cli.config.is_none()
        && cli.log_level.is_none()
        && std::env::var_os("NEXUSMATCH_LOG_DIR").is_some();
    let logged = if env_only {
        nexusmatch::logger::configure_from_env()
    } else if cfg.log.dir.is_some() {
        nexusmatch::logger::configure_from_config(&cfg.log)
    } else {
        nexusmatch::logger::init_console(cfg.log.level.as_deref().or(Some("warn")))
    };
    if let Err(e) = logged {
        eprintln!("warning: logging disabled: {e}");
    }

    if let Err(e) = run(cli, &cfg) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
