use std::path::{Component, Path, PathBuf};

/// The only document type the store will read, write or list.
pub const DOCUMENT_EXTENSION: &str = "txt";

/// Check that `candidate` is one of `roots` or nested beneath one of them.
///
/// Both sides are made absolute and normalized lexically (symlinks are not
/// resolved) before the comparison, which is done per path component. An
/// empty root list never contains anything; whether that means "deny" or
/// "no restriction yet" is decided by the caller.
pub fn is_path_within_roots<P: AsRef<Path>>(candidate: &Path, roots: &[P]) -> bool {
    if roots.is_empty() {
        return false;
    }

    let candidate = resolve(candidate);

    roots.iter().any(|root| {
        let root = resolve(root.as_ref());
        // Path::starts_with compares whole components, and a prefix mismatch
        // (different drive) never matches.
        candidate.starts_with(&root)
    })
}

/// Make `path` absolute against the working directory and collapse `.` and
/// `..` segments without touching the filesystem.
pub fn resolve(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    normalize_lexically(&absolute)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the filesystem root stays at the root
                if matches!(normalized.components().next_back(), Some(Component::Normal(_))) {
                    normalized.pop();
                }
            }
            Component::Normal(part) => normalized.push(part),
        }
    }

    normalized
}

/// Strip everything from a user supplied name that could steer it out of its
/// folder or hide it: path separators, NUL, every `..`, leading dots and
/// surrounding whitespace.
///
/// Never fails. An empty result means the name was unusable.
pub fn sanitize_filename(raw: &str) -> String {
    let without_separators: String = raw
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .collect();

    let without_parents = without_separators.replace("..", "");

    without_parents
        .trim_start_matches(|c: char| c == '.' || c.is_whitespace())
        .trim_end()
        .to_string()
}

/// Sanitize `raw` and append `.txt` unless it already ends in exactly `.txt`.
///
/// The suffix check is case sensitive, so `NOTE.TXT` becomes `NOTE.TXT.txt`.
pub fn ensure_txt_extension(raw: &str) -> String {
    let sanitized = sanitize_filename(raw);
    let suffix = format!(".{}", DOCUMENT_EXTENSION);

    if sanitized.ends_with(&suffix) {
        sanitized
    } else {
        format!("{}{}", sanitized, suffix)
    }
}

/// Case-insensitive `.txt` suffix check that also rejects embedded NULs.
pub fn is_valid_txt_path(path: &Path) -> bool {
    let lowered = path.to_string_lossy().to_lowercase();
    let suffix = format!(".{}", DOCUMENT_EXTENSION);

    lowered.ends_with(&suffix) && !lowered.contains('\0')
}

/// True for names the listing and indexing walks never surface.
pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

/// Extension check used for directory entries, where only the final
/// component's extension counts.
pub fn has_document_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(DOCUMENT_EXTENSION))
        .unwrap_or(false)
}
