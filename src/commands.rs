use crate::config::AppConfig;
use crate::models::*;
use crate::paths::resolve;
use crate::AppState;
use std::path::{Path, PathBuf};

// Every handler returns `Result<_, String>` so the UI bridge can hand the
// message straight to the frontend.

pub async fn configure_roots(state: &AppState, roots: Vec<String>) -> Result<(), String> {
    state
        .files
        .configure(roots.into_iter().map(PathBuf::from).collect());
    Ok(())
}

pub async fn read_document(state: &AppState, path: String) -> Result<String, String> {
    state
        .files
        .read(Path::new(&path))
        .await
        .map_err(|e| e.to_string())
}

/// Save a document and refresh its index entry
pub async fn write_document(state: &AppState, path: String, content: String) -> Result<(), String> {
    let path = resolve(Path::new(&path));

    state
        .files
        .write(&path, &content)
        .await
        .map_err(|e| e.to_string())?;

    state.index.update_file(&path, &content);
    Ok(())
}

pub async fn create_document(
    state: &AppState,
    folder_path: String,
    name: String,
) -> Result<String, String> {
    let path = state
        .files
        .create(Path::new(&folder_path), &name)
        .await
        .map_err(|e| e.to_string())?;

    state.index.update_file(&path, "");
    Ok(path.to_string_lossy().to_string())
}

pub async fn delete_document(state: &AppState, path: String) -> Result<(), String> {
    log::info!("Deleting document: {}", path);

    state
        .files
        .delete(Path::new(&path))
        .await
        .map_err(|e| e.to_string())?;

    state.index.remove_file(&resolve(Path::new(&path)));

    // The file is gone either way; a stale recent entry is not worth failing over
    if let Err(e) = state.config.forget_recent_file(&path).await {
        log::warn!("Failed to update recent files after delete: {}", e);
    }

    Ok(())
}

pub async fn rename_document(
    state: &AppState,
    old_path: String,
    new_name: String,
) -> Result<String, String> {
    let new_path = state
        .files
        .rename(Path::new(&old_path), &new_name)
        .await
        .map_err(|e| e.to_string())?;

    state.index.rename_file(&resolve(Path::new(&old_path)), &new_path);

    let new_path = new_path.to_string_lossy().to_string();
    if let Err(e) = state.config.replace_recent_file(&old_path, &new_path).await {
        log::warn!("Failed to update recent files after rename: {}", e);
    }

    Ok(new_path)
}

pub async fn list_documents(state: &AppState, folder_path: String) -> Result<Vec<FileInfo>, String> {
    state
        .files
        .list(Path::new(&folder_path))
        .await
        .map_err(|e| e.to_string())
}

pub async fn document_exists(state: &AppState, path: String) -> Result<bool, String> {
    state
        .files
        .exists(Path::new(&path))
        .await
        .map_err(|e| e.to_string())
}

pub async fn build_index(state: &AppState, roots: Vec<String>) -> Result<BuildStatus, String> {
    let roots: Vec<PathBuf> = roots.into_iter().map(PathBuf::from).collect();
    Ok(state.index.build(&roots).await)
}

/// Rebuild from the folder sources in the config
pub async fn rebuild_index(state: &AppState) -> Result<BuildStatus, String> {
    let roots = state.config.root_paths().await;
    Ok(state.index.build(&roots).await)
}

pub async fn query_index(state: &AppState, query: String) -> Result<Vec<SearchResult>, String> {
    log::debug!("Searching for: {}", query);
    Ok(state.index.search(&query))
}

pub async fn update_index_entry(state: &AppState, path: String, content: String) -> Result<(), String> {
    state.index.update_file(&resolve(Path::new(&path)), &content);
    Ok(())
}

pub async fn remove_index_entry(state: &AppState, path: String) -> Result<(), String> {
    state.index.remove_file(&resolve(Path::new(&path)));
    Ok(())
}

pub async fn list_tags(state: &AppState) -> Result<Vec<TagCount>, String> {
    Ok(state.index.tag_counts())
}

/// Indexed documents carrying `tag`, for the tag filter in the sidebar
pub async fn files_with_tag(state: &AppState, tag: String) -> Result<Vec<String>, String> {
    Ok(state
        .index
        .files_with_tag(&tag)
        .into_iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect())
}

pub async fn get_config(state: &AppState) -> Result<AppConfig, String> {
    Ok(state.config.get().await)
}

/// Register a notes folder, widen the allowed roots and reindex
pub async fn add_folder_source(state: &AppState, path: String) -> Result<FolderSource, String> {
    let source = state
        .config
        .add_source(&path)
        .await
        .map_err(|e| e.to_string())?;

    state.files.configure(state.config.root_paths().await);
    rebuild_index(state).await?;

    Ok(source)
}

pub async fn remove_folder_source(state: &AppState, path: String) -> Result<bool, String> {
    let removed = state
        .config
        .remove_source(&path)
        .await
        .map_err(|e| e.to_string())?;

    if removed {
        state.files.configure(state.config.root_paths().await);
        rebuild_index(state).await?;
    }

    Ok(removed)
}

pub async fn add_recent_file(state: &AppState, path: String) -> Result<(), String> {
    state
        .config
        .add_recent_file(&path)
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        notes: PathBuf,
        state: AppState,
    }

    impl Fixture {
        fn notes_str(&self) -> String {
            self.notes.to_string_lossy().to_string()
        }

        fn note(&self, name: &str) -> String {
            self.notes.join(name).to_string_lossy().to_string()
        }
    }

    async fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let notes = dir.path().join("notes");
        fs::create_dir(&notes).unwrap();

        let state = AppState::open(dir.path().join("config/config.json"))
            .await
            .unwrap();
        configure_roots(&state, vec![notes.to_string_lossy().to_string()])
            .await
            .unwrap();

        Fixture {
            _dir: dir,
            notes,
            state,
        }
    }

    #[tokio::test]
    async fn test_end_to_end_note_lifecycle() {
        let fx = fixture().await;
        let state = &fx.state;

        let path = create_document(state, fx.notes_str(), "draft".to_string())
            .await
            .unwrap();
        assert_eq!(path, fx.note("draft.txt"));

        write_document(state, path.clone(), "hello #work world".to_string())
            .await
            .unwrap();
        assert_eq!(read_document(state, path.clone()).await.unwrap(), "hello #work world");

        let status = build_index(state, vec![fx.notes_str()]).await.unwrap();
        assert!(matches!(status, BuildStatus::Completed(stats) if stats.indexed == 1));

        let results = query_index(state, "hello".to_string()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].line_number, 1);
        assert_eq!(results[0].match_index, 0);

        let tags = list_tags(state).await.unwrap();
        assert_eq!(
            tags,
            vec![TagCount {
                tag: "work".to_string(),
                count: 1
            }]
        );

        delete_document(state, path.clone()).await.unwrap();
        assert!(query_index(state, "hello".to_string()).await.unwrap().is_empty());
        assert!(!document_exists(state, path).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_outside_roots_is_rejected() {
        let fx = fixture().await;

        let err = write_document(&fx.state, "/etc/passwd".to_string(), "x".to_string())
            .await
            .unwrap_err();
        assert!(err.starts_with("Access denied"));
        assert!(fx.state.index.is_empty());
    }

    #[tokio::test]
    async fn test_new_document_is_searchable_without_rebuild() {
        let fx = fixture().await;
        let state = &fx.state;

        let path = create_document(state, fx.notes_str(), "fresh".to_string())
            .await
            .unwrap();
        write_document(state, path.clone(), "unindexed words".to_string())
            .await
            .unwrap();

        let results = query_index(state, "unindexed".to_string()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, PathBuf::from(path));
    }

    #[tokio::test]
    async fn test_rename_moves_index_entry_and_recent_file() {
        let fx = fixture().await;
        let state = &fx.state;
        let old = fx.note("old.txt");
        fs::write(&old, "renamed content").unwrap();

        build_index(state, vec![fx.notes_str()]).await.unwrap();
        add_recent_file(state, old.clone()).await.unwrap();

        let new = rename_document(state, old.clone(), "new".to_string())
            .await
            .unwrap();
        assert_eq!(new, fx.note("new.txt"));

        let results = query_index(state, "renamed".to_string()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, PathBuf::from(&new));

        let config = get_config(state).await.unwrap();
        assert_eq!(config.recent_files, vec![new]);
    }

    #[tokio::test]
    async fn test_index_entry_hooks() {
        let fx = fixture().await;
        let state = &fx.state;
        let path = fx.note("manual.txt");

        update_index_entry(state, path.clone(), "manual entry".to_string())
            .await
            .unwrap();
        assert_eq!(query_index(state, "manual".to_string()).await.unwrap().len(), 1);

        remove_index_entry(state, path.clone()).await.unwrap();
        remove_index_entry(state, path).await.unwrap();
        assert!(query_index(state, "manual".to_string()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_files_with_tag_filters_documents() {
        let fx = fixture().await;
        let state = &fx.state;
        fs::write(fx.notes.join("b.txt"), "#work later").unwrap();
        fs::write(fx.notes.join("a.txt"), "#work #home").unwrap();
        fs::write(fx.notes.join("c.txt"), "#home only").unwrap();

        build_index(state, vec![fx.notes_str()]).await.unwrap();

        let work = files_with_tag(state, "work".to_string()).await.unwrap();
        assert_eq!(work, vec![fx.note("a.txt"), fx.note("b.txt")]);

        let renamed = rename_document(state, fx.note("c.txt"), "d".to_string())
            .await
            .unwrap();
        let home = files_with_tag(state, "#home".to_string()).await.unwrap();
        assert_eq!(home, vec![fx.note("a.txt"), renamed]);
        assert!(files_with_tag(state, "none".to_string()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_through_parent_segments_updates_one_entry() {
        let fx = fixture().await;
        let state = &fx.state;
        fs::create_dir(fx.notes.join("sub")).unwrap();
        let roundabout = fx.note("sub/../plain.txt");

        write_document(state, roundabout, "detour".to_string())
            .await
            .unwrap();

        let results = query_index(state, "detour".to_string()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, fx.notes.join("plain.txt"));
    }

    #[tokio::test]
    async fn test_list_documents() {
        let fx = fixture().await;
        fs::create_dir(fx.notes.join("projects")).unwrap();
        fs::write(fx.notes.join("projects/plan.txt"), "p").unwrap();
        fs::write(fx.notes.join("inbox.txt"), "i").unwrap();

        let tree = list_documents(&fx.state, fx.notes_str()).await.unwrap();
        let names: Vec<_> = tree.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["projects", "inbox.txt"]);
    }

    #[tokio::test]
    async fn test_folder_sources_drive_roots_and_index() {
        let fx = fixture().await;
        let state = &fx.state;
        fs::write(fx.notes.join("a.txt"), "source content").unwrap();

        let source = add_folder_source(state, fx.notes_str()).await.unwrap();
        assert_eq!(source.name, "notes");
        assert_eq!(state.files.roots(), vec![fx.notes.clone()]);
        assert_eq!(query_index(state, "source".to_string()).await.unwrap().len(), 1);

        assert!(remove_folder_source(state, fx.notes_str()).await.unwrap());
        assert!(state.files.roots().is_empty());
        assert!(query_index(state, "source".to_string()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_strict_config_denies_until_configured() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        fs::write(&config_path, r#"{"denyWhenUnconfigured":true}"#).unwrap();

        let state = AppState::open(config_path).await.unwrap();
        let target = dir.path().join("x.txt").to_string_lossy().to_string();

        let err = write_document(&state, target, "x".to_string())
            .await
            .unwrap_err();
        assert!(err.starts_with("Access denied"));
    }
}
