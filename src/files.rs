use crate::error::{FileError, Result};
use crate::models::FileInfo;
use crate::paths::{
    ensure_txt_extension, is_path_within_roots, is_valid_txt_path, resolve, sanitize_filename,
};
use crate::tree;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// What containment means before any root has been configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyRootsPolicy {
    /// No roots yet means no restriction (first-run behaviour)
    #[default]
    AllowAll,
    /// No roots yet means every path is denied
    DenyAll,
}

/// Validated access to the documents under the configured root folders.
///
/// Every operation resolves its path lexically, checks containment, and then
/// touches the disk only through that resolved path. A symlink inside a root
/// that points elsewhere is still followed by the OS; roots are trusted to be
/// the user's own folders.
pub struct FileStore {
    roots: RwLock<Vec<PathBuf>>,
    policy: EmptyRootsPolicy,
}

impl FileStore {
    pub fn new() -> Self {
        Self::with_policy(EmptyRootsPolicy::default())
    }

    pub fn with_policy(policy: EmptyRootsPolicy) -> Self {
        Self {
            roots: RwLock::new(Vec::new()),
            policy,
        }
    }

    /// Replace the allowed roots wholesale.
    pub fn configure(&self, roots: Vec<PathBuf>) {
        log::info!("Allowed roots updated: {} configured", roots.len());

        let mut guard = self.roots.write().unwrap_or_else(PoisonError::into_inner);
        *guard = roots;
    }

    pub fn roots(&self) -> Vec<PathBuf> {
        self.roots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn read(&self, path: &Path) -> Result<String> {
        let path = self.validate_document(path)?;

        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| FileError::from_io(&path, e))
    }

    /// Overwrite `path` with `content`. Last writer wins.
    pub async fn write(&self, path: &Path, content: &str) -> Result<()> {
        let path = self.validate_document(path)?;

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| FileError::from_io(&path, e))
    }

    /// Create an empty document named after `name` inside `folder` and return
    /// its path.
    pub async fn create(&self, folder: &Path, name: &str) -> Result<PathBuf> {
        let folder = self.validate_path(folder)?;

        // The sanitized name should never escape, but check what we will touch
        let file_path = self.validate_path(&folder.join(Self::document_name(name)?))?;

        // create_new makes the existence check and the creation one step
        tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&file_path)
            .await
            .map_err(|e| FileError::from_io(&file_path, e))?;

        log::info!("Created document: {}", file_path.display());
        Ok(file_path)
    }

    pub async fn delete(&self, path: &Path) -> Result<()> {
        let path = self.validate_document(path)?;

        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| FileError::from_io(&path, e))?;

        log::info!("Deleted document: {}", path.display());
        Ok(())
    }

    /// Rename `old_path` within its folder and return the new path.
    ///
    /// The new name is claimed with a hard link, which fails atomically when
    /// the destination exists. On filesystems without hard links the move
    /// falls back to an existence check followed by a rename, and a file
    /// created in between can still be replaced.
    pub async fn rename(&self, old_path: &Path, new_name: &str) -> Result<PathBuf> {
        let old_path = self.validate_document(old_path)?;

        let folder = old_path
            .parent()
            .ok_or_else(|| FileError::InvalidPath(old_path.clone()))?;
        let new_path = self.validate_path(&folder.join(Self::document_name(new_name)?))?;

        if new_path == old_path {
            return Ok(new_path);
        }

        match tokio::fs::hard_link(&old_path, &new_path).await {
            Ok(()) => {
                if let Err(e) = tokio::fs::remove_file(&old_path).await {
                    // Undo the link so the document is not left under two names
                    let _ = tokio::fs::remove_file(&new_path).await;
                    return Err(FileError::from_io(&old_path, e));
                }
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(FileError::AlreadyExists(new_path));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FileError::from_io(&old_path, e));
            }
            Err(e) => {
                log::debug!("Hard link unavailable, renaming in place: {}", e);
                Self::rename_unless_taken(&old_path, &new_path).await?;
            }
        }

        log::info!("Renamed {} -> {}", old_path.display(), new_path.display());
        Ok(new_path)
    }

    /// Whether anything exists at `path`. Absence and unreadable parents both
    /// report `false`.
    pub async fn exists(&self, path: &Path) -> Result<bool> {
        let path = self.validate_path(path)?;

        match tokio::fs::try_exists(&path).await {
            Ok(found) => Ok(found),
            Err(e) => {
                log::debug!("Existence check failed for {}: {}", path.display(), e);
                Ok(false)
            }
        }
    }

    /// Build a fresh document tree for `folder`.
    pub async fn list(&self, folder: &Path) -> Result<Vec<FileInfo>> {
        let folder = self.validate_path(folder)?;

        let scan_root = folder.clone();
        tokio::task::spawn_blocking(move || tree::scan_folder(&scan_root))
            .await
            .map_err(|e| FileError::Io(std::io::Error::other(e)))?
            .map_err(|e| FileError::from_io(&folder, e))
    }

    async fn rename_unless_taken(old_path: &Path, new_path: &Path) -> Result<()> {
        if tokio::fs::try_exists(new_path)
            .await
            .map_err(|e| FileError::from_io(new_path, e))?
        {
            return Err(FileError::AlreadyExists(new_path.to_path_buf()));
        }

        tokio::fs::rename(old_path, new_path)
            .await
            .map_err(|e| FileError::from_io(old_path, e))
    }

    fn document_name(raw: &str) -> Result<String> {
        let sanitized = sanitize_filename(raw);
        if sanitized.is_empty() {
            return Err(FileError::InvalidName(raw.to_string()));
        }

        Ok(ensure_txt_extension(&sanitized))
    }

    /// `validate_path` plus the document extension check.
    fn validate_document(&self, path: &Path) -> Result<PathBuf> {
        let resolved = self.validate_path(path)?;

        if !is_valid_txt_path(&resolved) {
            return Err(FileError::InvalidPath(path.to_path_buf()));
        }

        Ok(resolved)
    }

    /// Resolve `path` and check it against the roots. Callers must use the
    /// returned path for disk access: the OS would resolve `..` after a
    /// symlink differently from the lexical check.
    fn validate_path(&self, path: &Path) -> Result<PathBuf> {
        let resolved = resolve(path);
        let roots = self.roots.read().unwrap_or_else(PoisonError::into_inner);

        if roots.is_empty() {
            return match self.policy {
                EmptyRootsPolicy::AllowAll => Ok(resolved),
                EmptyRootsPolicy::DenyAll => {
                    log::warn!("Access denied (no roots configured): {}", path.display());
                    Err(FileError::AccessDenied(path.to_path_buf()))
                }
            };
        }

        if !is_path_within_roots(&resolved, roots.as_slice()) {
            log::warn!("Access denied outside allowed roots: {}", path.display());
            return Err(FileError::AccessDenied(path.to_path_buf()));
        }

        Ok(resolved)
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}
