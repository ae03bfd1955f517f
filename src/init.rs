//! Global initialization: creating the devback config file.

use std::fs;
use std::path::Path;

use log::info;

use crate::config::{render_config_file, ConfigFile};
use crate::error::{Error, Result};
use crate::filesystem;

/// Options for [`init`].
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Value for `backup.base_dir`. May use `~`.
    pub backup_dir: String,
    /// Replace an existing config (the old file is kept as `.bak`).
    pub force: bool,
    /// Plan without writing.
    pub dry_run: bool,
}

/// Writes the default configuration file to `config_path`.
pub fn init(opts: &InitOptions, config_path: &Path) -> Result<()> {
    if opts.backup_dir.trim().is_empty() {
        return Err(Error::usage(format!(
            "--backup-dir is required (suggested: {})",
            crate::defaults::SUGGESTED_BACKUP_DIR
        )));
    }

    let exists = config_path.exists();
    if exists && !opts.force {
        return Err(Error::usage(format!(
            "config already exists: {} (use --force to replace it)",
            config_path.display()
        )));
    }

    let mut file = ConfigFile::default();
    file.backup.base_dir = opts.backup_dir.trim().to_string();
    let rendered = render_config_file(&file)?;

    if opts.dry_run {
        info!("dry run: would write {}", config_path.display());
        return Ok(());
    }

    if exists {
        let backup = config_path.with_extension("toml.bak");
        fs::rename(config_path, &backup)
            .map_err(|e| Error::critical(format!("back up old config: {}", e)))?;
        info!("previous config saved as {}", backup.display());
    }

    if let Some(parent) = config_path.parent() {
        filesystem::ensure_dir(parent)
            .map_err(|e| Error::critical(format!("create config dir: {}", e)))?;
    }
    fs::write(config_path, rendered)
        .map_err(|e| Error::critical(format!("write config: {}", e)))?;
    info!("✓ wrote {}", config_path.display());
    Ok(())
}
