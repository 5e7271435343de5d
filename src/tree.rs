use crate::models::FileInfo;
use crate::paths::{has_document_extension, is_hidden_name};
use std::cmp::Ordering;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Deepest nesting a scan descends into. Symlinked directories are never
/// followed, so this only bounds genuinely deep trees.
pub const MAX_SCAN_DEPTH: usize = 64;

/// A directory whose entries are still being collected
struct OpenDir {
    name: String,
    path: PathBuf,
    children: Vec<FileInfo>,
}

/// Walk `folder` and build the document tree beneath it.
///
/// Rules:
/// 1. Dotfiles and dot-directories are skipped at every level
/// 2. Only `.txt` files (any case) are kept
/// 3. Directories without a document somewhere below them are pruned
/// 4. Directories sort before files, names compare case-insensitively
///
/// No containment check happens here; callers validate `folder` first.
pub fn scan_folder(folder: &Path) -> io::Result<Vec<FileInfo>> {
    let mut walker = WalkDir::new(folder)
        .follow_links(false)
        .max_depth(MAX_SCAN_DEPTH)
        .sort_by(compare_entries)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    match walker.next() {
        Some(Ok(root)) if root.file_type().is_dir() => {}
        Some(Ok(root)) => {
            return Err(io::Error::other(format!(
                "Not a directory: {}",
                root.path().display()
            )))
        }
        Some(Err(err)) => return Err(err.into()),
        None => return Ok(Vec::new()),
    }

    let mut open_dirs: Vec<OpenDir> = Vec::new();
    let mut top_level: Vec<FileInfo> = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // Only the root being unreadable fails the scan
            Err(err) if err.depth() == 0 => return Err(err.into()),
            Err(err) => {
                log::warn!("Skipping unreadable entry during scan: {}", err);
                continue;
            }
        };

        // Entries arrive depth-first, so anything at or above this depth is done
        while open_dirs.len() >= entry.depth() {
            close_dir(&mut open_dirs, &mut top_level);
        }

        if entry.file_type().is_dir() {
            open_dirs.push(OpenDir {
                name: entry_name(&entry),
                path: entry.path().to_path_buf(),
                children: Vec::new(),
            });
            continue;
        }

        if !has_document_extension(entry.path()) {
            continue;
        }

        if let Some(info) = describe_file(&entry) {
            match open_dirs.last_mut() {
                Some(dir) => dir.children.push(info),
                None => top_level.push(info),
            }
        }
    }

    while !open_dirs.is_empty() {
        close_dir(&mut open_dirs, &mut top_level);
    }

    Ok(top_level)
}

/// Paths of every file in a tree, in listing order.
pub fn document_paths(tree: &[FileInfo]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    collect_paths(tree, &mut paths);
    paths
}

fn collect_paths(nodes: &[FileInfo], out: &mut Vec<PathBuf>) {
    for node in nodes {
        match &node.children {
            Some(children) => collect_paths(children, out),
            None if !node.is_directory => out.push(node.path.clone()),
            None => {}
        }
    }
}

/// Case-insensitive name order that files accented Latin letters with their
/// base letter, so "émile" lands among the e's. Unaccented names come first
/// on ties, then lowercase. Scripts beyond Latin compare by code point.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();

    a_lower
        .chars()
        .map(fold_accent)
        .cmp(b_lower.chars().map(fold_accent))
        .then_with(|| a_lower.cmp(&b_lower))
        .then_with(|| b.cmp(a))
}

/// Base letter of a lowercase accented Latin letter
fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
        'ď' | 'đ' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
        'ĥ' | 'ħ' => 'h',
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => 'i',
        'ĵ' => 'j',
        'ķ' => 'k',
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => 'l',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => 'o',
        'ŕ' | 'ŗ' | 'ř' => 'r',
        'ś' | 'ŝ' | 'ş' | 'š' => 's',
        'ţ' | 'ť' | 'ŧ' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'ŵ' => 'w',
        'ý' | 'ÿ' | 'ŷ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        _ => c,
    }
}

/// Modification time of `metadata` in epoch milliseconds, 0 if unavailable.
pub fn modified_millis(metadata: &Metadata) -> i64 {
    metadata
        .modified()
        .map(|time| chrono::DateTime::<chrono::Utc>::from(time).timestamp_millis())
        .unwrap_or(0)
}

fn compare_entries(a: &DirEntry, b: &DirEntry) -> Ordering {
    let a_dir = a.file_type().is_dir();
    let b_dir = b.file_type().is_dir();

    b_dir
        .cmp(&a_dir)
        .then_with(|| compare_names(&entry_name(a), &entry_name(b)))
}

fn close_dir(open_dirs: &mut Vec<OpenDir>, top_level: &mut Vec<FileInfo>) {
    let Some(dir) = open_dirs.pop() else {
        return;
    };

    if dir.children.is_empty() {
        return;
    }

    let info = FileInfo::directory(dir.name, dir.path, dir.children);
    match open_dirs.last_mut() {
        Some(parent) => parent.children.push(info),
        None => top_level.push(info),
    }
}

fn describe_file(entry: &DirEntry) -> Option<FileInfo> {
    // Symlinks are listed by what they point at
    let metadata = match std::fs::metadata(entry.path()) {
        Ok(metadata) => metadata,
        Err(e) if entry.path_is_symlink() => {
            log::warn!("Skipping broken link {}: {}", entry.path().display(), e);
            return None;
        }
        Err(e) => {
            log::warn!("Skipping {}: {}", entry.path().display(), e);
            return None;
        }
    };

    if !metadata.is_file() {
        return None;
    }

    Some(FileInfo::file(
        entry_name(entry),
        entry.path().to_path_buf(),
        metadata.len(),
        modified_millis(&metadata),
    ))
}

fn is_hidden(entry: &DirEntry) -> bool {
    is_hidden_name(&entry_name(entry))
}

fn entry_name(entry: &DirEntry) -> String {
    entry.file_name().to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn names(nodes: &[FileInfo]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn test_scan_filters_and_orders() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        fs::write(root.join("beta.txt"), "b").unwrap();
        fs::write(root.join("Alpha.TXT"), "a").unwrap();
        fs::write(root.join("image.png"), "x").unwrap();
        fs::write(root.join(".hidden.txt"), "h").unwrap();
        fs::create_dir(root.join("zeta")).unwrap();
        fs::write(root.join("zeta/inner.txt"), "i").unwrap();
        fs::create_dir(root.join("archive")).unwrap();
        fs::write(root.join("archive/old.txt"), "o").unwrap();

        let tree = scan_folder(root).unwrap();

        assert_eq!(names(&tree), vec!["archive", "zeta", "Alpha.TXT", "beta.txt"]);
        assert!(tree[0].is_directory);
        assert_eq!(names(tree[0].children.as_ref().unwrap()), vec!["old.txt"]);
        assert_eq!(tree[3].size, Some(1));
        assert!(tree[3].modified_at.unwrap() > 0);
    }

    #[test]
    fn test_scan_prunes_empty_branches() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("empty/deeper/deepest")).unwrap();
        fs::create_dir_all(root.join("only-images")).unwrap();
        fs::write(root.join("only-images/pic.jpg"), "x").unwrap();
        fs::create_dir_all(root.join("nested/a/b")).unwrap();
        fs::write(root.join("nested/a/b/deep.txt"), "d").unwrap();

        let tree = scan_folder(root).unwrap();

        assert_eq!(names(&tree), vec!["nested"]);
        let a = &tree[0].children.as_ref().unwrap()[0];
        assert_eq!(a.name, "a");
        let b = &a.children.as_ref().unwrap()[0];
        assert_eq!(b.name, "b");
        assert_eq!(names(b.children.as_ref().unwrap()), vec!["deep.txt"]);
    }

    #[test]
    fn test_scan_skips_hidden_directories() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join(".git/objects")).unwrap();
        fs::write(root.join(".git/objects/note.txt"), "x").unwrap();
        fs::create_dir_all(root.join("visible/.cache")).unwrap();
        fs::write(root.join("visible/.cache/c.txt"), "x").unwrap();

        let tree = scan_folder(root).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn test_scan_missing_folder_fails() {
        let dir = tempdir().unwrap();
        let err = scan_folder(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_scan_rejects_file_root() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "x").unwrap();

        assert!(scan_folder(&file).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_does_not_follow_directory_links() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        fs::create_dir(root.join("loop")).unwrap();
        fs::write(root.join("loop/a.txt"), "x").unwrap();
        std::os::unix::fs::symlink(root, root.join("loop/back")).unwrap();
        std::os::unix::fs::symlink(root.join("loop/a.txt"), root.join("alias.txt")).unwrap();

        let tree = scan_folder(root).unwrap();
        let paths = document_paths(&tree);

        assert_eq!(paths.len(), 2);
        assert!(paths.contains(&root.join("loop/a.txt")));
        assert!(paths.contains(&root.join("alias.txt")));
    }

    #[test]
    fn test_document_paths_flattens_in_order() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/one.txt"), "1").unwrap();
        fs::write(root.join("two.txt"), "2").unwrap();

        let tree = scan_folder(root).unwrap();
        assert_eq!(
            document_paths(&tree),
            vec![root.join("sub/one.txt"), root.join("two.txt")]
        );
    }

    #[test]
    fn test_compare_names() {
        assert_eq!(compare_names("apple", "Banana"), Ordering::Less);
        assert_eq!(compare_names("a", "A"), Ordering::Less);
        assert_eq!(compare_names("same", "same"), Ordering::Equal);
    }

    #[test]
    fn test_compare_names_folds_accents() {
        assert_eq!(compare_names("émile", "zeta"), Ordering::Less);
        assert_eq!(compare_names("Émile", "fred"), Ordering::Less);
        assert_eq!(compare_names("dan", "émile"), Ordering::Less);
        assert_eq!(compare_names("emile", "émile"), Ordering::Less);
        assert_eq!(compare_names("Ångström", "anchor"), Ordering::Greater);
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_skips_unreadable_subdirectory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let root = dir.path();
        let locked = root.join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("hidden away.txt"), "x").unwrap();
        fs::write(root.join("visible.txt"), "v").unwrap();

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // root ignores permission bits, so there is nothing to check there
        let enforced = fs::read_dir(&locked).is_err();

        let tree = scan_folder(root);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let tree = tree.unwrap();
        if enforced {
            assert_eq!(names(&tree), vec!["visible.txt"]);
        } else {
            assert_eq!(names(&tree), vec!["locked", "visible.txt"]);
        }
    }
}
