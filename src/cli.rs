use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "Reconcile SSH daemon host keys, config fragments and Remote Login")]
pub struct Args {
    #[command(flatten)]
    pub source: ConfigSource,

    /// Sub‑commands (apply, render, etc.)
    #[command(subcommand)]
    pub sub: Option<Cmd>,
}

#[derive(clap::Args, Debug, Default)]
pub struct ConfigSource {
    /// Path to the declaration file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Use the system-wide declaration (/etc/sshd-reconcile/sshd.toml)
    #[arg(long, global = true, conflicts_with = "config")]
    pub system: bool,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Write fragments, generate missing keys and converge Remote Login (default)
    Apply {
        /// Override the sshd_config.d directory from the declaration
        #[arg(long)]
        fragment_dir: Option<PathBuf>,
    },
    /// Print the rendered fragments without writing anything
    Render,
    /// Only generate missing host keys
    Keys,
    /// Only converge the daemon's enabled state
    Enablement,
    /// Print the observed Remote Login state (Exit 0 = on, 1 = off)
    Status,
}
