use std::net::SocketAddr;
use std::sync::Arc;

use sluice::{FileStore, NativeFileStore, UnnecessaryAssetsFilter};

use crate::cli::ServeArgs;
use crate::commands::load_config;
use crate::config::SluiceConfig;
use crate::error::{CliError, ConfigError, Result};
use crate::pipelines::{PipelineSet, variant_selector};
use crate::server::{self, AssetServer};

/// Execute `sluice serve`.
pub async fn execute(args: ServeArgs) -> Result<()> {
    let config = load_config(&args.overrides())?;
    let addr = listen_addr(&config)?;
    let server = build_server(&config)?;
    server::start(addr, Arc::new(server)).await
}

/// Asset server over the configured root directory.
pub fn build_server(config: &SluiceConfig) -> Result<AssetServer> {
    if !config.root.is_dir() {
        return Err(CliError::FileNotFound(config.root.clone()));
    }
    let store: Arc<dyn FileStore> = Arc::new(NativeFileStore::new(&config.root));
    let pipelines = Arc::new(PipelineSet::from_config(config, store.clone())?);
    let selector = variant_selector(config, store.clone())?;

    Ok(AssetServer::new(store, pipelines, selector)
        .with_ignore(UnnecessaryAssetsFilter::new(&config.assets.ignore)?)
        .with_max_age(config.server.max_age_secs))
}

fn listen_addr(config: &SluiceConfig) -> Result<SocketAddr> {
    let host = config.server.host.trim();
    let host = if host.eq_ignore_ascii_case("localhost") {
        "127.0.0.1"
    } else {
        host
    };
    let addr = if host.contains(':') {
        format!("[{}]:{}", host, config.server.port)
    } else {
        format!("{}:{}", host, config.server.port)
    };
    addr.parse().map_err(|_| {
        ConfigError::InvalidValue {
            field: "server.host".to_string(),
            value: config.server.host.clone(),
            hint: "Use an IP address such as 127.0.0.1 or 0.0.0.0".to_string(),
        }
        .into()
    })
}
