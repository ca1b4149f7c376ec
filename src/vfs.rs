use crate::types::DirFileItem;
use eyre::{Result, WrapErr, eyre};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// One breadcrumb of the browser's address bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderLink {
    /// Absolute path up to and including this folder.
    pub id: String,
    pub name: String,
}

/// Breadcrumbs for an absolute remote address.
pub fn folder_chain(address: &str) -> Result<Vec<FolderLink>> {
    if !address.starts_with('/') {
        return Err(eyre!("path must start with \"/\", got `{address}`"));
    }
    let mut current = String::new();
    let chain = address
        .split('/')
        .filter(|p| !p.is_empty())
        .map(|part| {
            current.push('/');
            current.push_str(part);
            FolderLink {
                id: current.clone(),
                name: part.to_string(),
            }
        })
        .collect();
    Ok(chain)
}

/// Drop the last path component: `/a/b/c.bin` -> `/a/b`, `/a` -> `/`.
pub fn parent_dir(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    }
}

/// Whether a browser selection of `count` entries may be submitted.
pub fn can_select(count: usize, multiple: bool) -> bool {
    count > 0 && (multiple || count == 1)
}

/// Files picked for an offload, in the order they were added, unique by path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileSelection {
    items: Vec<DirFileItem>,
}

impl FileSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append entries not already selected; returns how many were added.
    pub fn add<I: IntoIterator<Item = DirFileItem>>(&mut self, files: I) -> usize {
        let mut seen: HashSet<String> = self.items.iter().map(|f| f.id.clone()).collect();
        let before = self.items.len();
        for file in files {
            if seen.insert(file.id.clone()) {
                self.items.push(file);
            }
        }
        let added = self.items.len() - before;
        tracing::debug!(added, total = self.items.len(), "selection extended");
        added
    }

    /// Remove entries by path; returns how many were removed.
    pub fn remove<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        let drop: HashSet<&str> = ids.iter().map(AsRef::as_ref).collect();
        let before = self.items.len();
        self.items.retain(|f| !drop.contains(f.id.as_str()));
        before - self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[DirFileItem] {
        &self.items
    }

    /// Paths in selection order, as sent in `src_files`.
    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|f| f.id.clone()).collect()
    }
}

/// Remembers the last directory a file was picked from, per named form field.
#[derive(Debug, Clone)]
pub struct LastDirStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl LastDirStore {
    /// Default location under the user's data directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("au", "APPN", "phenomate")
            .map(|d| d.data_dir().join("last_dirs.json"))
    }

    /// Load from `path`; a missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let text = fs::read_to_string(path)
                .wrap_err_with(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text)
                .wrap_err_with(|| format!("parsing {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        tracing::debug!(store = %path.display(), fields = entries.len(), "opened last-dir store");
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.entries.get(field).map(String::as_str)
    }

    /// Remember the directory containing `selected` for `field` and persist.
    pub fn remember(&mut self, field: &str, selected: &str) -> Result<()> {
        let dir = parent_dir(selected);
        tracing::debug!(field, dir = %dir, "remembering directory");
        self.entries.insert(field.to_string(), dir);
        if let Some(parent) = self.path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)
            .wrap_err_with(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}
