//! Font file loaders
//!
//! [`DirectoryLoader`] serves fonts from disk, [`MemoryLoader`] from memory.
//! Both prefer a VF file over a TFM file of the same name, the way DVI
//! drivers do.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use walkdir::WalkDir;

use texfm_core::{FontError, FontLoader, FontSource, Result};

use crate::config::SearchPath;

#[derive(Debug, Clone, Default)]
struct FileSet {
    tfm: Option<PathBuf>,
    vf: Option<PathBuf>,
}

/// Loads fonts from a set of directories
///
/// The directories are indexed recursively once, at construction. A name is
/// served from the first directory that has it.
#[derive(Debug, Default)]
pub struct DirectoryLoader {
    search_path: SearchPath,
    index: HashMap<String, FileSet>,
}

impl DirectoryLoader {
    pub fn new(search_path: SearchPath) -> Self {
        let mut index: HashMap<String, FileSet> = HashMap::new();
        for dir in search_path.dirs() {
            for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        log::warn!("Skipping unreadable font directory entry: {e}");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                let (Some(stem), Some(ext)) = (
                    path.file_stem().and_then(|s| s.to_str()),
                    path.extension().and_then(|e| e.to_str()),
                ) else {
                    continue;
                };
                let files = index.entry(stem.to_string()).or_default();
                let slot = match ext.to_ascii_lowercase().as_str() {
                    "tfm" => &mut files.tfm,
                    "vf" => &mut files.vf,
                    _ => continue,
                };
                if slot.is_none() {
                    *slot = Some(path.to_path_buf());
                }
            }
        }
        index.retain(|_, files| files.tfm.is_some() || files.vf.is_some());
        log::debug!(
            "Indexed {} font names in {} directories",
            index.len(),
            search_path.dirs().len()
        );
        Self { search_path, index }
    }

    /// Loader over `TEXFM_FONT_PATH`
    pub fn from_env() -> Self {
        Self::new(SearchPath::from_env())
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    /// Number of distinct font names found
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Files for a name carrying a directory part, looked up directly
    fn files_at(&self, name: &str) -> FileSet {
        let candidates = std::iter::once(PathBuf::from(name))
            .chain(self.search_path.dirs().iter().map(|dir| dir.join(name)));
        let mut files = FileSet::default();
        for base in candidates {
            let tfm = base.with_extension("tfm");
            let vf = base.with_extension("vf");
            if files.tfm.is_none() && tfm.is_file() {
                files.tfm = Some(tfm);
            }
            if files.vf.is_none() && vf.is_file() {
                files.vf = Some(vf);
            }
        }
        files
    }
}

fn read(name: &str, path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| FontError::Load {
        name: name.to_string(),
        reason: format!("{}: {e}", path.display()),
    })
}

impl FontLoader for DirectoryLoader {
    fn load(&self, name: &str) -> Result<FontSource> {
        let files = if name.contains(['/', '\\']) {
            self.files_at(name)
        } else {
            self.index.get(name).cloned().unwrap_or_default()
        };
        match files {
            FileSet {
                vf: Some(vf),
                tfm: Some(tfm),
            } => Ok(FontSource::Virtual {
                vf: read(name, &vf)?,
                tfm: read(name, &tfm)?,
            }),
            FileSet {
                vf: Some(vf),
                tfm: None,
            } => Err(FontError::Load {
                name: name.to_string(),
                reason: format!("{} has no companion TFM file", vf.display()),
            }),
            FileSet { tfm: Some(tfm), .. } => Ok(FontSource::Tfm(read(name, &tfm)?)),
            FileSet { tfm: None, vf: None } => Err(FontError::NotFound(name.to_string())),
        }
    }
}

/// Serves fonts registered in memory
#[derive(Debug, Default)]
pub struct MemoryLoader {
    fonts: RwLock<HashMap<String, FontSource>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_tfm(&self, name: impl Into<String>, tfm: Vec<u8>) {
        self.fonts.write().insert(name.into(), FontSource::Tfm(tfm));
    }

    pub fn insert_virtual(&self, name: impl Into<String>, vf: Vec<u8>, tfm: Vec<u8>) {
        self.fonts
            .write()
            .insert(name.into(), FontSource::Virtual { vf, tfm });
    }

    pub fn remove(&self, name: &str) -> Option<FontSource> {
        self.fonts.write().remove(name)
    }

    pub fn len(&self) -> usize {
        self.fonts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.read().is_empty()
    }
}

impl FontLoader for MemoryLoader {
    fn load(&self, name: &str) -> Result<FontSource> {
        self.fonts
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| FontError::NotFound(name.to_string()))
    }
}
