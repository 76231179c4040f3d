//! Command-line interface definition.
//!
//! - `sluice serve` - compile and serve assets on demand
//! - `sluice deps` - print the files an asset is built from
//! - `sluice build` - run the full pipeline over a set of assets

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::ConfigOverrides;

/// Sluice - compile, minify and serve stylesheets and scripts
#[derive(Parser, Debug)]
#[command(
    name = "sluice",
    version,
    about = "Compile, minify and serve stylesheets and scripts",
    long_about = "Sluice translates LESS, TypeScript and other source dialects through external\n\
                  compilers, picks minified variants in release mode, and serves the result\n\
                  from a cache that is invalidated whenever any imported file changes."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve assets over HTTP, recompiling when sources change
    Serve(ServeArgs),

    /// Print the dependency list of one asset
    Deps(DepsArgs),

    /// Run the full pipeline over assets and write the output
    Build(BuildArgs),
}

/// Where the project and its configuration live.
#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// Asset root directory (overrides `root` in sluice.toml)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Path to the config file [default: ./sluice.toml]
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Serve minified variants with long-lived cache headers
    #[arg(long)]
    pub release: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DepsArgs {
    /// Virtual path of the asset, e.g. /styles/site.less
    pub path: String,

    #[command(flatten)]
    pub project: ProjectArgs,

    /// Print JSON instead of one path per line
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Virtual paths of the assets to build
    #[arg(required = true)]
    pub paths: Vec<String>,

    #[command(flatten)]
    pub project: ProjectArgs,

    /// Output directory
    #[arg(short, long, default_value = "dist")]
    pub out_dir: PathBuf,

    /// Pick minified variants and run minifiers
    #[arg(long)]
    pub release: bool,
}

impl ProjectArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config: self.config.clone(),
            root: self.root.clone(),
            ..Default::default()
        }
    }
}

impl ServeArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            port: self.port,
            release: self.release,
            ..self.project.overrides()
        }
    }
}

impl BuildArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            release: self.release,
            ..self.project.overrides()
        }
    }
}
