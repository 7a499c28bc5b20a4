use crate::snapshot::SnapshotId;
use std::io;
use std::path::{Path, PathBuf};

/// Characters that are not allowed in folder names on at least one platform.
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '\'', '/', '\\', '|', '?', '*'];

/// Name of the directory, inside the snapshot folder, that receives text files.
pub const TEXT_DIR_NAME: &str = "text files";

/// Derive a filesystem-legal folder name from a page URL.
///
/// Scheme-qualified URLs are reduced to their host ("https://example.com/a" ->
/// "example.com"); anything else is kept whole with forbidden characters
/// replaced by `-`.
pub fn folder_name_for(url: &str) -> String {
    let trimmed = url.trim();
    let name = match trimmed.split_once("://") {
        Some((scheme, rest)) if scheme.starts_with("http") => {
            rest.split('/').next().unwrap_or(rest)
        }
        _ => trimmed,
    };

    name.chars()
        .map(|c| if FORBIDDEN_CHARS.contains(&c) { '-' } else { c })
        .collect()
}

/// Maps snapshot identifiers to files inside one storage folder.
///
/// The presence of a snapshot's file is the only dedup signal; contents are
/// never compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStore {
    folder: PathBuf,
}

impl SnapshotStore {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    /// Store for `url` under `output_dir`, named by [`folder_name_for`].
    pub fn for_url(output_dir: impl AsRef<Path>, url: &str) -> Self {
        Self::new(output_dir.as_ref().join(folder_name_for(url)))
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// `<folder>/<id>.html`
    pub fn html_path(&self, id: SnapshotId) -> PathBuf {
        self.folder.join(format!("{id}.html"))
    }

    pub fn contains(&self, id: SnapshotId) -> bool {
        self.html_path(id).exists()
    }

    pub fn text_dir(&self) -> PathBuf {
        self.folder.join(TEXT_DIR_NAME)
    }

    /// Companion text path for a saved HTML file: `<folder>/text files/<stem>.txt`.
    pub fn text_path_for(&self, html_path: &Path) -> Option<PathBuf> {
        let stem = html_path.file_stem()?;
        let mut name = stem.to_os_string();
        name.push(".txt");
        Some(self.text_dir().join(name))
    }

    /// Create the folder (and parents). An existing folder is reused.
    pub fn create(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.folder)
    }
}
