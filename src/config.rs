use crate::models::FolderSource;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Folders the user picked; their paths are the allowed roots
    pub sources: Vec<FolderSource>,

    /// Most recent first
    pub recent_files: Vec<String>,

    pub recent_files_limit: usize,

    pub autosave_enabled: bool,

    pub autosave_delay_ms: u64,

    /// Deny every file operation until at least one source exists
    pub deny_when_unconfigured: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            recent_files: Vec::new(),
            recent_files_limit: 10,
            autosave_enabled: true,
            autosave_delay_ms: 1500,
            deny_when_unconfigured: false,
        }
    }
}

impl AppConfig {
    pub fn root_paths(&self) -> Vec<PathBuf> {
        self.sources.iter().map(|s| PathBuf::from(&s.path)).collect()
    }
}

/// Persists `AppConfig` as JSON and keeps the current copy in memory.
pub struct ConfigManager {
    config_path: PathBuf,
    config: Arc<Mutex<AppConfig>>,
}

impl ConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self {
            config_path,
            config: Arc::new(Mutex::new(AppConfig::default())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load settings from disk, writing defaults on first run.
    pub async fn load(&self) -> Result<AppConfig> {
        let mut current = self.config.lock().await;

        let raw = match tokio::fs::read_to_string(&self.config_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {:?}, writing defaults", self.config_path);
                let default_config = AppConfig::default();
                self.persist(&default_config).await?;
                *current = default_config.clone();
                return Ok(default_config);
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read config {:?}", self.config_path)
                })
            }
        };

        let mut config: AppConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config {:?}", self.config_path))?;

        for source in &mut config.sources {
            check_source(source).await;
        }

        log::info!("Loaded config with {} sources", config.sources.len());
        *current = config.clone();
        Ok(config)
    }

    /// Save settings to disk
    pub async fn save(&self, config: &AppConfig) -> Result<()> {
        let mut current = self.config.lock().await;
        self.persist(config).await?;

        // Update in-memory config
        *current = config.clone();
        Ok(())
    }

    /// Get current config (from memory)
    pub async fn get(&self) -> AppConfig {
        self.config.lock().await.clone()
    }

    pub async fn root_paths(&self) -> Vec<PathBuf> {
        self.config.lock().await.root_paths()
    }

    /// Register a notes folder. The path must be an existing directory that is
    /// not already a source.
    pub async fn add_source(&self, path: &str) -> Result<FolderSource> {
        let is_dir = tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            bail!("Not a directory: {}", path);
        }

        let source = FolderSource {
            path: path.to_string(),
            name: Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string()),
            added_at: chrono::Utc::now().timestamp_millis(),
            is_valid: Some(true),
            error: None,
        };

        let added = source.clone();
        self.update(|config| {
            if config.sources.iter().any(|s| s.path == path) {
                bail!("Folder is already a source: {}", path);
            }
            config.sources.push(source);
            Ok(true)
        })
        .await?;

        log::info!("Added folder source: {}", path);
        Ok(added)
    }

    /// Returns whether a source was removed.
    pub async fn remove_source(&self, path: &str) -> Result<bool> {
        let removed = self
            .update(|config| {
                let before = config.sources.len();
                config.sources.retain(|s| s.path != path);
                Ok(config.sources.len() != before)
            })
            .await?;

        if removed {
            log::info!("Removed folder source: {}", path);
        }
        Ok(removed)
    }

    /// Move `path` to the front of the recent list, trimming it to the limit.
    pub async fn add_recent_file(&self, path: &str) -> Result<()> {
        self.update(|config| {
            config.recent_files.retain(|p| p != path);
            config.recent_files.insert(0, path.to_string());
            config.recent_files.truncate(config.recent_files_limit);
            Ok(true)
        })
        .await?;
        Ok(())
    }

    pub async fn forget_recent_file(&self, path: &str) -> Result<()> {
        self.update(|config| {
            let before = config.recent_files.len();
            config.recent_files.retain(|p| p != path);
            Ok(config.recent_files.len() != before)
        })
        .await?;
        Ok(())
    }

    /// Point a recent entry at a renamed file, keeping its position.
    pub async fn replace_recent_file(&self, old_path: &str, new_path: &str) -> Result<()> {
        self.update(|config| {
            let Some(pos) = config.recent_files.iter().position(|p| p == old_path) else {
                return Ok(false);
            };

            config.recent_files[pos] = new_path.to_string();

            // keep only the first copy of the new path
            let mut seen = false;
            config.recent_files.retain(|p| {
                if p != new_path {
                    return true;
                }
                !std::mem::replace(&mut seen, true)
            });
            Ok(true)
        })
        .await?;
        Ok(())
    }

    /// Apply `edit` to a copy of the config while holding the lock, and write
    /// it out when `edit` reports a change. The lock stays held until the
    /// file and the in-memory copy agree, so concurrent edits apply in turn.
    async fn update<F>(&self, edit: F) -> Result<bool>
    where
        F: FnOnce(&mut AppConfig) -> Result<bool>,
    {
        let mut current = self.config.lock().await;

        let mut config = current.clone();
        if !edit(&mut config)? {
            return Ok(false);
        }

        self.persist(&config).await?;
        *current = config;
        Ok(true)
    }

    /// Write `config` to disk. Callers hold the config lock, which also keeps
    /// the shared temp file to one writer.
    async fn persist(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create config dir {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;

        // Write beside the target then swap it in, so a crash never leaves half a file
        let tmp_path = self.config_path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json)
            .await
            .with_context(|| format!("Failed to write {:?}", tmp_path))?;
        tokio::fs::rename(&tmp_path, &self.config_path)
            .await
            .with_context(|| format!("Failed to replace {:?}", self.config_path))?;

        Ok(())
    }
}

async fn check_source(source: &mut FolderSource) {
    match tokio::fs::metadata(&source.path).await {
        Ok(metadata) if metadata.is_dir() => {
            source.is_valid = Some(true);
            source.error = None;
        }
        Ok(_) => {
            log::warn!("Folder source is not a directory: {}", source.path);
            source.is_valid = Some(false);
            source.error = Some("Not a directory".to_string());
        }
        Err(e) => {
            log::warn!("Folder source unavailable {}: {}", source.path, e);
            source.is_valid = Some(false);
            source.error = Some(e.to_string());
        }
    }
}
