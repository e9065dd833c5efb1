//! autoload-watch: boot the autoloaders against a config and report.
//!
//! Prints the classified roots and the names that resolved, optionally as
//! JSON. With `--watch` it keeps running and reloads the main loader whenever
//! a definition file under one of its roots changes.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tracing::{error, info, warn};

use autoload::{take_over, Bootstrap, Context, ReloadWatcher, Resolution, YamlMaterializer};
use autoload_core::{load_dotenv, AutoloadConfig, Policy};

// ── CLI ─────────────────────────────────────────────────────────────

/// Load definitions on demand and reload them when files change.
#[derive(Parser, Debug)]
#[command(name = "autoload-watch", version, about)]
struct Cli {
    /// Path to the autoload TOML config file.
    #[arg(long, env = "AUTOLOAD_CONFIG", default_value = "autoload.toml")]
    config: String,

    /// Resolve this symbolic name after startup (repeatable).
    #[arg(long = "resolve", value_name = "NAME")]
    names: Vec<String>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    /// Keep running and reload on source changes until Ctrl-C.
    #[arg(long)]
    watch: bool,
}

// ── Report ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Report {
    config: serde_json::Value,
    roots: Vec<RootReport>,
    loaded: Vec<String>,
    resolved: Vec<Resolved>,
}

#[derive(Serialize)]
struct RootReport {
    path: String,
    policy: Policy,
}

#[derive(Serialize)]
struct Resolved {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    loader: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn build_report(config: &AutoloadConfig, context: &Context, names: &[String]) -> Report {
    let deps = context.dependencies();
    let resolved = names
        .iter()
        .map(|name| match deps.resolve(name) {
            Ok(handle) => Resolved {
                name: name.clone(),
                loader: deps
                    .autoloaders()
                    .iter()
                    .find(|l| l.owns(&handle))
                    .map(|l| l.tag()),
                error: None,
            },
            Err(e) => Resolved {
                name: name.clone(),
                loader: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    Report {
        config: config.summary(),
        roots: context
            .roots()
            .iter()
            .map(|r| RootReport {
                path: r.path.display().to_string(),
                policy: r.policy(),
            })
            .collect(),
        loaded: deps
            .autoloaders()
            .iter()
            .flat_map(|l| l.loaded_names())
            .collect(),
        resolved,
    }
}

fn print_report(report: &Report, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for root in &report.roots {
        println!("{:<16} {}", format!("{:?}", root.policy), root.path);
    }
    println!("loaded: {}", report.loaded.join(", "));
    for r in &report.resolved {
        match (&r.loader, &r.error) {
            (Some(loader), _) => println!("{} -> {loader}", r.name),
            (None, Some(e)) => println!("{} !! {e}", r.name),
            (None, None) => println!("{} -> ?", r.name),
        }
    }
    Ok(())
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let config = match AutoloadConfig::from_file(&cli.config) {
        Ok(cfg) => {
            info!(path = %cli.config, "loaded autoload config");
            cfg
        }
        Err(e) => {
            warn!(
                error = %e,
                path = %cli.config,
                "failed to load config, using environment"
            );
            AutoloadConfig::from_env()?
        }
    };
    config.log_summary();

    let mut bootstrap = Bootstrap::from_config(&config)?;
    let context = take_over(&mut bootstrap, Arc::new(YamlMaterializer))?;

    print_report(&build_report(&config, &context, &cli.names), cli.json)?;

    if !cli.watch {
        return Ok(());
    }

    let poll = Duration::from_millis(config.watch.poll_interval_ms);
    let watcher = ReloadWatcher::watch(context.autoloaders().main(), poll)?;
    let mut ticker = tokio::time::interval(poll);
    info!(interval_ms = config.watch.poll_interval_ms, "watching for changes, Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match watcher.execute_if_updated(context.resolution()) {
                    Ok(Some(summary)) => {
                        info!(
                            unloaded = summary.unloaded,
                            eager_loaded = summary.eager_loaded,
                            failed = summary.failed,
                            "reloaded after source change"
                        );
                        print_report(&build_report(&config, &context, &cli.names), cli.json)?;
                    }
                    Ok(None) => {}
                    Err(e) => error!(error = %e, "reload failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("autoload-watch shutting down");
                break;
            }
        }
    }

    context.resolution().unhook();
    Ok(())
}
