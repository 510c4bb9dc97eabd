use std::path::PathBuf;

use crate::common::config::PathsConfig;
use crate::provision::templates::{render_supervisord_conf, MIME_TYPES, UWSGI_PARAMS};
use anyhow::Result;

/// Creates the node's working directories and the proxy support files the
/// generated proxy configs include.
pub async fn prepare_node_dirs(paths: &PathsConfig) -> Result<()> {
    for dir in [
        paths.apps_dir(),
        paths.log_dir(),
        paths.state_dir(),
        paths.env_dir(),
        paths.supervisor_conf_dir(),
        paths.proxy_conf_dir(),
    ] {
        tokio::fs::create_dir_all(&dir).await?;
        log::debug!("Directory ready: {}", dir.display());
    }
    for (name, content) in [("mime.types", MIME_TYPES), ("uwsgi_params", UWSGI_PARAMS)] {
        let path = paths.proxy_conf_dir().join(name);
        if !tokio::fs::try_exists(&path).await? {
            tokio::fs::write(&path, content).await?;
            log::info!("Wrote {}", path.display());
        }
    }
    Ok(())
}

pub async fn write_supervisord_conf(app_name: &str, paths: &PathsConfig) -> Result<PathBuf> {
    let path = paths.supervisord_conf();
    tokio::fs::create_dir_all(paths.supervisor_conf_dir()).await?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, render_supervisord_conf(app_name, paths)).await?;
    log::info!("Wrote {}", path.display());
    Ok(path)
}
