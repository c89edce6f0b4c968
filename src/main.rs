mod cli;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};

use sshd_reconcile::control::platform_backend;
use sshd_reconcile::fragment::{EXTRA_FRAGMENT, HOST_KEY_FRAGMENT, render};
use sshd_reconcile::{Reconciler, RemoteLoginState, SshdConfig, SystemRunner, Transition};

fn main() {
    // Initialize logger with custom format
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(e) = real_main() {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<()> {
    let args = cli::Args::parse();
    let cfg_path = config_path(&args.source)?;
    let mut cfg = SshdConfig::load_or_create(&cfg_path)
        .with_context(|| format!("Failed to load {}", cfg_path.display()))?;
    info!("Using config from: {}", cfg_path.display());

    match args.sub.unwrap_or(cli::Cmd::Apply { fragment_dir: None }) {
        cli::Cmd::Apply { fragment_dir } => {
            if let Some(dir) = fragment_dir {
                cfg.fragment_dir = dir;
            }
            handle_apply(&cfg)
        }
        cli::Cmd::Render => handle_render(&cfg),
        cli::Cmd::Keys => handle_keys(&cfg),
        cli::Cmd::Enablement => handle_enablement(&cfg),
        cli::Cmd::Status => handle_status(&cfg),
    }
}

fn config_path(source: &cli::ConfigSource) -> Result<PathBuf> {
    if let Some(path) = &source.config {
        // User specified an explicit config path
        Ok(path.clone())
    } else if source.system {
        Ok(PathBuf::from("/etc/sshd-reconcile/sshd.toml"))
    } else {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("sshd-reconcile");
        Ok(config_dir.join("sshd.toml"))
    }
}

fn warn_if_unprivileged() {
    if !nix::unistd::geteuid().is_root() {
        warn!("Not running as root; writes under /etc and service changes will likely fail");
    }
}

fn handle_apply(cfg: &SshdConfig) -> Result<()> {
    warn_if_unprivileged();
    let runner = SystemRunner;
    let backend = platform_backend(&runner, &cfg.service_unit);
    let report = Reconciler::new(cfg, &runner)
        .run(&*backend)
        .context("Failed to reconcile SSH daemon")?;

    info!("Wrote {}", report.fragments.extra.display());
    if let Some(keys) = &report.host_keys {
        info!(
            "Host keys: {} generated, {} already present",
            keys.generated.len(),
            keys.present.len()
        );
    }
    report_transition(report.transition);
    Ok(())
}

fn handle_render(cfg: &SshdConfig) -> Result<()> {
    let rendered = render(&cfg.host_keys, &cfg.extra_config);
    match rendered.host_keys {
        Some(text) => println!("# {HOST_KEY_FRAGMENT}\n{text}\n"),
        None => println!("# {HOST_KEY_FRAGMENT} (omitted, no host keys declared)\n"),
    }
    println!("# {EXTRA_FRAGMENT}\n{}", rendered.extra);
    Ok(())
}

fn handle_keys(cfg: &SshdConfig) -> Result<()> {
    warn_if_unprivileged();
    let runner = SystemRunner;
    if Reconciler::new(cfg, &runner)
        .apply_host_keys()
        .context("Failed to materialize host keys")?
        .is_none()
    {
        println!("generate_host_keys is off, nothing to do");
    }
    Ok(())
}

fn handle_enablement(cfg: &SshdConfig) -> Result<()> {
    warn_if_unprivileged();
    let runner = SystemRunner;
    let backend = platform_backend(&runner, &cfg.service_unit);
    let transition = Reconciler::new(cfg, &runner)
        .apply_enablement(&*backend)
        .context("Failed to converge SSH daemon state")?;
    report_transition(transition);
    Ok(())
}

/// Handle status command - print observed Remote Login state
fn handle_status(cfg: &SshdConfig) -> Result<()> {
    let runner = SystemRunner;
    let backend = platform_backend(&runner, &cfg.service_unit);
    match backend.query()? {
        RemoteLoginState::On => {
            println!("Remote Login: On");
            std::process::exit(0);
        }
        RemoteLoginState::Off => {
            println!("Remote Login: Off");
            std::process::exit(1);
        }
    }
}

fn report_transition(transition: Transition) {
    match transition {
        Transition::None => info!("SSH daemon state already matches the declaration"),
        Transition::Enable => println!("SSH daemon enabled"),
        Transition::Disable => println!("SSH daemon disabled"),
    }
}
