//! Where to look for fonts and how much to keep
//!
//! The search path comes from code or from the `TEXFM_FONT_PATH`
//! environment variable, which is read once per process:
//!
//! ```bash
//! TEXFM_FONT_PATH="~/texmf/fonts:/usr/share/texmf/fonts" texfm info cmr10
//! ```

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Environment variable holding the default search path
pub const FONT_PATH_ENV: &str = "TEXFM_FONT_PATH";

static ENV_PATH: OnceLock<SearchPath> = OnceLock::new();

/// Ordered list of font directories; earlier ones win
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.push(dir);
        self
    }

    pub fn push(&mut self, dir: impl Into<PathBuf>) {
        self.dirs.push(dir.into());
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Parses a list in the platform's `PATH` syntax
    ///
    /// Each entry has `~` and `$VAR` expanded; entries that fail to expand
    /// are kept literally.
    pub fn parse(value: &str) -> Self {
        let dirs = std::env::split_paths(value)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| expand(&dir))
            .collect();
        Self { dirs }
    }

    /// The path from `TEXFM_FONT_PATH`, empty when unset
    pub fn from_env() -> Self {
        ENV_PATH
            .get_or_init(|| match std::env::var(FONT_PATH_ENV) {
                Ok(value) => {
                    let path = Self::parse(&value);
                    log::info!("Font search path from {FONT_PATH_ENV}: {:?}", path.dirs);
                    path
                }
                Err(_) => Self::default(),
            })
            .clone()
    }
}

fn expand(dir: &Path) -> PathBuf {
    let raw = dir.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            log::warn!("Cannot expand font directory {raw}: {e}");
            dir.to_path_buf()
        }
    }
}

/// Cache limits for a [`FontResolver`](crate::FontResolver)
///
/// `None` keeps every entry, which is what makes repeated resolution return
/// the identical handle. With a bound, evicted instances are rebuilt on the
/// next request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Maximum number of decoded files
    pub max_files: Option<u64>,
    /// Maximum number of font instances
    pub max_fonts: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_order_and_skips_empty_entries() {
        let sep = if cfg!(windows) { ";" } else { ":" };
        let path = SearchPath::parse(&format!("/a{sep}{sep}/b"));
        assert_eq!(path.dirs(), &[PathBuf::from("/a"), PathBuf::from("/b")]);
    }

    #[test]
    fn test_parse_expands_variables() {
        std::env::set_var("TEXFM_TEST_FONT_ROOT", "/opt/fonts");
        let path = SearchPath::parse("$TEXFM_TEST_FONT_ROOT/tfm");
        assert_eq!(path.dirs(), &[PathBuf::from("/opt/fonts/tfm")]);
    }

    #[test]
    fn test_unknown_variables_are_kept_literally() {
        let path = SearchPath::parse("$TEXFM_SURELY_UNSET_VARIABLE/x");
        assert_eq!(path.dirs(), &[PathBuf::from("$TEXFM_SURELY_UNSET_VARIABLE/x")]);
    }

    #[test]
    fn test_builder() {
        let path = SearchPath::new().with_dir("fonts");
        assert!(!path.is_empty());
        assert_eq!(path.dirs().len(), 1);
        assert_eq!(ResolverConfig::default().max_fonts, None);
    }
}
