//! Serializes configuration back to a commented INI document.

use super::settings::ConfigFile;

/// Renders the configuration as an INI string with explanatory
/// comments, suitable for writing to config.ini.
pub fn to_config_string(config: &ConfigFile) -> String {
    let directory = config
        .logging
        .directory
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    format!(
        "# geolift configuration\n\
         \n\
         [worker]\n\
         # Directory holding per-task artifact directories\n\
         workspace = {workspace}\n\
         # Lease length in seconds for the task lock\n\
         lease_seconds = {lease_seconds}\n\
         # Redelivery attempts before an environment failure is fatal\n\
         retry_ceiling = {retry_ceiling}\n\
         \n\
         [store]\n\
         # Shared store connection URL\n\
         url = {url}\n\
         \n\
         [logging]\n\
         # Log level: trace, debug, info, warn, error\n\
         level = {level}\n\
         # Log file directory; leave empty to log to stdout only\n\
         directory = {directory}\n",
        workspace = config.worker.workspace.display(),
        lease_seconds = config.worker.lease_seconds,
        retry_ceiling = config.worker.retry_ceiling,
        url = config.store.url,
        level = config.logging.level,
        directory = directory,
    )
}
