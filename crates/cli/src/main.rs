//! scmlink command-line diagnostic tool.
//!
//! Runs the core utilities against values pasted from an SCM engine:
//! canonicalizing paths, parsing and comparing timestamps, resolving the
//! capability variant for a reported server version, and decoding raw
//! change records into a change log.

mod style;

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use scmlink_core::capability::{CacheScope, VersionSource};
use scmlink_core::changelog::{ChangeLog, EditType, RawChange};
use scmlink_core::config::{CodecConfig, LinkConfig, DEFAULT_CONFIG_TOML};
use scmlink_core::errors::BoxError;
use scmlink_core::path::{revision_qualifier, strip_revision};
use scmlink_core::session::Session;
use scmlink_core::timestamp::{self, CodecZone};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// scmlink command-line diagnostic tool.
#[derive(Parser, Debug)]
#[command(
    name = "scmlink",
    version,
    about = "Inspect how scmlink interprets data reported by an SCM engine"
)]
struct Cli {
    /// Path to the TOML configuration file. Defaults to
    /// `<config dir>/scmlink/config.toml` when that file exists.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Canonicalize raw SCM paths.
    Strip {
        /// Raw paths as reported by the engine.
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Parse a timestamp and show its canonical form.
    Parse {
        /// Timestamp text.
        text: String,

        /// Zone for zone-less patterns: local, utc or +HH:MM.
        #[arg(long)]
        zone: Option<String>,
    },

    /// Check that a timestamp round-trips exactly through its pattern.
    Validate {
        /// Timestamp text.
        text: String,
    },

    /// Compare two timestamps with a tolerance.
    Compare {
        first: String,
        second: String,

        /// Tolerance in milliseconds (default from config).
        #[arg(long)]
        tolerance_ms: Option<i64>,

        /// Zone for zone-less patterns: local, utc or +HH:MM.
        #[arg(long)]
        zone: Option<String>,
    },

    /// Resolve the capability variant for a reported server version list.
    Resolve {
        /// Reported server versions; only the first one is consulted.
        #[arg(long = "server-version", required = true)]
        versions: Vec<String>,

        /// Baseline hint passed through to the adapter.
        #[arg(long)]
        baseline: Option<String>,

        /// Request hint passed through to the adapter.
        #[arg(long)]
        request: Option<String>,

        /// Give up on the version query after this many seconds.
        #[arg(long, default_value = "30")]
        timeout_secs: u64,
    },

    /// Decode raw change records from a JSON file into a change log.
    Decode {
        /// JSON file holding an array of raw change records.
        file: PathBuf,

        /// Server version the records came from.
        #[arg(long, default_value = "14.0")]
        server_version: String,

        /// Only show changes later than this timestamp.
        #[arg(long)]
        since: Option<String>,

        /// Print the change log as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./scmlink.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    CheckConfig,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    // init and check-config handle the file themselves.
    let needs_config = !matches!(cli.command, Commands::Init { .. } | Commands::CheckConfig);
    let loaded = if needs_config {
        load_config(cli.config.as_deref())
    } else {
        Ok(None)
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let level = config
        .as_ref()
        .map(|c| c.log.level.clone())
        .unwrap_or_else(|| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .without_time()
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let outcome = runtime.block_on(run(cli, config));
    // A version query abandoned after a timeout may still be blocked; don't
    // wait for it on the way out.
    runtime.shutdown_background();

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: Option<LinkConfig>) -> Result<ExitCode> {
    let codec = config
        .as_ref()
        .map(|c| c.codec.clone())
        .unwrap_or_default();

    match cli.command {
        Commands::Strip { paths } => cmd_strip(&paths),
        Commands::Parse { text, zone } => cmd_parse(&text, zone_for(&codec, zone.as_deref())?),
        Commands::Validate { text } => Ok(cmd_validate(&text)),
        Commands::Compare {
            first,
            second,
            tolerance_ms,
            zone,
        } => cmd_compare(
            &first,
            &second,
            tolerance_ms.unwrap_or(codec.tolerance_ms),
            zone_for(&codec, zone.as_deref())?,
        ),
        Commands::Resolve {
            versions,
            baseline,
            request,
            timeout_secs,
        } => {
            let session = open_session(config.as_ref(), &codec, versions)?;
            cmd_resolve(session, baseline, request, Duration::from_secs(timeout_secs)).await
        }
        Commands::Decode {
            file,
            server_version,
            since,
            json,
        } => {
            let session = open_session(config.as_ref(), &codec, vec![server_version])?;
            cmd_decode(&session, &file, since.as_deref(), json)
        }
        Commands::Init { output } => cmd_init(&output),
        Commands::CheckConfig => cmd_check_config(cli.config.as_deref()),
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

/// Load the explicit config file, or the default one if it exists.
fn load_config(explicit: Option<&Path>) -> Result<Option<LinkConfig>> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match dirs::config_dir().map(|dir| LinkConfig::default_path(&dir)) {
            Some(path) if path.exists() => path,
            _ => return Ok(None),
        },
    };
    let config = LinkConfig::load_and_validate(&path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    Ok(Some(config))
}

fn zone_for(codec: &CodecConfig, flag: Option<&str>) -> Result<CodecZone> {
    match flag {
        Some(zone) => zone
            .parse()
            .map_err(|e: String| anyhow::anyhow!("invalid --zone: {}", e)),
        None => codec.zone().context("invalid codec.timezone"),
    }
}

/// A connection that reports a fixed version list.
struct FixedVersions {
    identity: String,
    versions: Vec<String>,
}

impl VersionSource for FixedVersions {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn server_versions(&self) -> Result<Vec<String>, BoxError> {
        Ok(self.versions.clone())
    }
}

fn open_session(
    config: Option<&LinkConfig>,
    codec: &CodecConfig,
    versions: Vec<String>,
) -> Result<Session<FixedVersions>> {
    let identity = config
        .map(|c| c.connection.identity())
        .unwrap_or_else(|| "cli".to_string());
    let scope = config
        .map(|c| c.capability.cache_scope)
        .unwrap_or(CacheScope::Connection);
    let source = FixedVersions { identity, versions };
    Ok(Session::new(source, scope, codec.zone()?, codec.tolerance_ms))
}

fn parse_instant(text: &str, zone: CodecZone) -> Result<DateTime<Utc>> {
    Ok(zone
        .parse(text)
        .with_context(|| format!("cannot parse '{}'", text))?
        .instant())
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_strip(paths: &[String]) -> Result<ExitCode> {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Raw", "Canonical", "Qualifier"]);

    for raw in paths {
        table.add_row(vec![
            Cell::new(raw),
            Cell::new(strip_revision(raw)),
            Cell::new(revision_qualifier(raw).unwrap_or("—")),
        ]);
    }

    println!("{}", table);
    Ok(ExitCode::SUCCESS)
}

fn cmd_parse(text: &str, zone: CodecZone) -> Result<ExitCode> {
    let parsed = zone
        .parse(text)
        .with_context(|| format!("cannot parse '{}'", text))?;

    println!("{}", style::header("Timestamp"));
    println!("  Input    : {}", text);
    println!(
        "  Pattern  : {} {}",
        parsed.pattern(),
        style::dim(&format!("(#{})", parsed.pattern().index() + 1))
    );
    println!("  Instant  : {}", parsed.instant().to_rfc3339());
    println!("  Canonical: {} {}", zone.format(&parsed.instant()), style::dim(&zone.to_string()));
    Ok(ExitCode::SUCCESS)
}

fn cmd_validate(text: &str) -> ExitCode {
    if timestamp::validate(text) {
        println!("{}", style::success(&format!("'{}' is a canonical timestamp", text)));
        ExitCode::SUCCESS
    } else {
        println!("{}", style::error(&format!("'{}' does not round-trip", text)));
        ExitCode::FAILURE
    }
}

fn cmd_compare(first: &str, second: &str, tolerance_ms: i64, zone: CodecZone) -> Result<ExitCode> {
    let t1 = parse_instant(first, zone)?;
    let t2 = parse_instant(second, zone)?;
    let delta_ms = t1.signed_duration_since(t2).num_milliseconds();

    let verdict = match timestamp::compare_with_tolerance(&t1, &t2, tolerance_ms) {
        Ordering::Less => "earlier than",
        Ordering::Equal => "the same as",
        Ordering::Greater => "later than",
    };
    println!("'{}' is {} '{}'", first, verdict, second);
    println!(
        "{}",
        style::dim(&format!("difference {} ms, tolerance {} ms", delta_ms, tolerance_ms.abs()))
    );
    Ok(ExitCode::SUCCESS)
}

async fn cmd_resolve<C: VersionSource + 'static>(
    session: Session<C>,
    baseline: Option<String>,
    request: Option<String>,
    timeout: Duration,
) -> Result<ExitCode> {
    let query = tokio::task::spawn_blocking(move || {
        session
            .adapter(baseline.as_deref(), request.as_deref())
            .map(|adapter| (adapter.variant(), adapter.hints().clone(), adapter.date_zone()))
    });
    let (variant, hints, zone) = tokio::time::timeout(timeout, query)
        .await
        .context("server version query timed out")?
        .context("version query task failed")?
        .context("failed to resolve server capabilities")?;

    debug!(%variant, "resolved");
    println!("{}", style::success(&format!("capability variant: {}", variant)));
    println!("  Baseline : {}", hints.baseline.as_deref().unwrap_or("—"));
    println!("  Request  : {}", hints.request.as_deref().unwrap_or("—"));
    println!("  Date zone: {}", zone);
    Ok(ExitCode::SUCCESS)
}

fn cmd_decode(
    session: &Session<FixedVersions>,
    file: &Path,
    since: Option<&str>,
    json: bool,
) -> Result<ExitCode> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let raws: Vec<RawChange> =
        serde_json::from_str(&contents).context("failed to parse raw change records")?;

    let mut log = session
        .decode_changes(&raws, None, None)
        .context("failed to decode changes")?;
    log.sort_by_date();

    let log: ChangeLog = match since {
        Some(text) => {
            let reference = parse_instant(text, session.zone())?;
            log.since(&reference, session.tolerance_ms())
                .into_iter()
                .cloned()
                .collect()
        }
        None => log,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&log)?);
        return Ok(ExitCode::SUCCESS);
    }

    if log.is_empty() {
        println!("No changes.");
        return Ok(ExitCode::SUCCESS);
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Date", "Type", "Path", "Rev", "Author", "Comment"]);

    for entry in &log {
        let type_cell = match entry.edit_type {
            EditType::Add => Cell::new("added").fg(comfy_table::Color::Green),
            EditType::Edit => Cell::new("edited").fg(comfy_table::Color::Yellow),
            EditType::Delete => Cell::new("deleted").fg(comfy_table::Color::Red),
        };
        table.add_row(vec![
            Cell::new(session.zone().format(&entry.date)),
            type_cell,
            Cell::new(&entry.path),
            Cell::new(entry.revision.as_deref().unwrap_or("—")),
            Cell::new(&entry.author),
            Cell::new(&entry.comment),
        ]);
    }

    println!("{}", table);
    println!(
        "{}",
        style::dim(&format!(
            "{} change(s), {} adapter",
            log.len(),
            session.variant(None, None)?
        ))
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_init(output: &Path) -> Result<ExitCode> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, DEFAULT_CONFIG_TOML).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file with your server details");
    println!(
        "  2. Validate with: scmlink check-config --config {}",
        output.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_check_config(explicit: Option<&Path>) -> Result<ExitCode> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => dirs::config_dir()
            .map(|dir| LinkConfig::default_path(&dir))
            .context("no config directory on this platform; pass --config")?,
    };
    println!("Validating configuration: {}", path.display());
    println!();

    let config = LinkConfig::load_from_file(&path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    if let Err(e) = config.validate() {
        println!("  [FAIL] Validation error: {}", e);
        anyhow::bail!("configuration validation failed");
    }
    println!("  [OK] All required fields are valid");

    println!();
    println!("Configuration summary:");
    println!("  Connection : {}", config.connection.identity());
    println!("  Time zone  : {}", config.codec.timezone);
    println!("  Tolerance  : {} ms", config.codec.tolerance_ms);
    println!("  Cache scope: {:?}", config.capability.cache_scope);
    println!();
    println!("Configuration is valid.");
    Ok(ExitCode::SUCCESS)
}
