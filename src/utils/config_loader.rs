use std::path::Path;
use anyhow::{anyhow, Result};

use crate::config::proc_loader::{file_to_config, ConfigMode};
use crate::config::service::ServiceConfig;

pub async fn run(config_path: &str, mode: ConfigMode) -> Result<ServiceConfig> {
    let path = Path::new(config_path);
    file_to_config(path, mode)
        .await
        .map_err(|e| anyhow!("invalid config '{}': {}", config_path, e))
}
