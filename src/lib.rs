pub mod commands;
pub mod config;
pub mod error;
pub mod files;
pub mod models;
pub mod paths;
pub mod search;
pub mod tree;

use anyhow::Result;
use config::ConfigManager;
use files::{EmptyRootsPolicy, FileStore};
use search::SearchIndex;
use std::path::PathBuf;
use std::sync::Arc;

/// The services behind the editor, built once by whoever hosts the UI.
#[derive(Clone)]
pub struct AppState {
    pub files: Arc<FileStore>,
    pub index: Arc<SearchIndex>,
    pub config: Arc<ConfigManager>,
}

impl AppState {
    /// Load the config at `config_path` and point the file store at its
    /// sources. The index starts empty; call `commands::rebuild_index`.
    pub async fn open(config_path: PathBuf) -> Result<Self> {
        let config = ConfigManager::new(config_path);
        let loaded = config.load().await?;

        let policy = if loaded.deny_when_unconfigured {
            EmptyRootsPolicy::DenyAll
        } else {
            EmptyRootsPolicy::AllowAll
        };

        let files = FileStore::with_policy(policy);
        files.configure(loaded.root_paths());

        log::info!("NoteVault initialized with config {:?}", config.path());

        Ok(Self {
            files: Arc::new(files),
            index: Arc::new(SearchIndex::new()),
            config: Arc::new(config),
        })
    }
}

/// Install the `env_logger` backend, `info` unless `RUST_LOG` says otherwise.
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
