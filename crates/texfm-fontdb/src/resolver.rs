//! Turning font keys into shared font instances
//!
//! Two caches sit behind [`FontResolver::resolve`]: decoded files by name and
//! scaled instances by key. Both initialise each entry once even under
//! concurrent requests, so every caller asking for the same key gets the same
//! `Arc` and every file is read once no matter how many sizes use it.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashSet;
use moka::sync::Cache;

use texfm_core::scaler::design_size_to_dimen;
use texfm_core::{
    actual_size, FontError, FontHandle, FontKey, FontLoader, FontSource, MetricTable, Result,
    Scaler, ScaledFont, VfProgram,
};

use crate::config::ResolverConfig;
use crate::loader::DirectoryLoader;

/// A decoded font file: the TFM, plus the VF program for virtual fonts
#[derive(Debug)]
pub struct FontFile {
    name: String,
    metrics: Arc<MetricTable>,
    program: Option<Arc<VfProgram>>,
}

impl FontFile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<MetricTable> {
        &self.metrics
    }

    pub fn program(&self) -> Option<&Arc<VfProgram>> {
        self.program.as_ref()
    }

    /// Names of the local fonts a virtual font refers to
    fn references(&self) -> Vec<String> {
        self.program
            .iter()
            .flat_map(|program| program.fonts().iter().map(|def| def.full_name()))
            .collect()
    }
}

/// Counters for cache behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    /// Files loaded and decoded
    pub files_decoded: u64,
    /// Font instances constructed
    pub fonts_built: u64,
    /// Files currently cached
    pub cached_files: u64,
    /// Instances currently cached
    pub cached_fonts: u64,
}

/// Resolves font keys through a loader, caching everything it builds
///
/// Virtual fonts resolve their local fonts through the same resolver, so a
/// base font shared by several virtual fonts exists once.
pub struct FontResolver {
    loader: Arc<dyn FontLoader>,
    files: Cache<String, Arc<FontFile>>,
    fonts: Cache<FontKey, FontHandle>,
    acyclic: DashSet<String>,
    files_decoded: AtomicU64,
    fonts_built: AtomicU64,
}

fn cache<K, V>(capacity: Option<u64>) -> Cache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    match capacity {
        Some(capacity) => Cache::new(capacity),
        None => Cache::builder().build(),
    }
}

impl FontResolver {
    pub fn new(loader: Arc<dyn FontLoader>) -> Self {
        Self::with_config(loader, ResolverConfig::default())
    }

    pub fn with_config(loader: Arc<dyn FontLoader>, config: ResolverConfig) -> Self {
        Self {
            loader,
            files: cache(config.max_files),
            fonts: cache(config.max_fonts),
            acyclic: DashSet::new(),
            files_decoded: AtomicU64::new(0),
            fonts_built: AtomicU64::new(0),
        }
    }

    /// Resolver over the directories in `TEXFM_FONT_PATH`
    pub fn from_env() -> Self {
        Self::new(Arc::new(DirectoryLoader::from_env()))
    }

    /// The instance for `key`, built on first use
    pub fn resolve(&self, key: &FontKey) -> Result<FontHandle> {
        if let Some(font) = self.fonts.get(key) {
            return Ok(font);
        }
        self.fonts
            .try_get_with(key.clone(), || self.build(key))
            .map_err(|e| (*e).clone())
    }

    /// Shorthand for a key with no size or parameters
    pub fn resolve_name(&self, name: &str) -> Result<FontHandle> {
        self.resolve(&FontKey::new(name))
    }

    /// The decoded file for `name`, loaded on first use
    pub fn file(&self, name: &str) -> Result<Arc<FontFile>> {
        if let Some(file) = self.files.get(name) {
            return Ok(file);
        }
        self.files
            .try_get_with(name.to_string(), || self.decode(name))
            .map_err(|e| (*e).clone())
    }

    pub fn stats(&self) -> ResolverStats {
        self.files.run_pending_tasks();
        self.fonts.run_pending_tasks();
        ResolverStats {
            files_decoded: self.files_decoded.load(Ordering::Relaxed),
            fonts_built: self.fonts_built.load(Ordering::Relaxed),
            cached_files: self.files.entry_count(),
            cached_fonts: self.fonts.entry_count(),
        }
    }

    /// Drops every cached file and instance
    ///
    /// Handles held by callers stay valid; new requests load afresh.
    pub fn clear(&self) {
        self.fonts.invalidate_all();
        self.files.invalidate_all();
        self.acyclic.clear();
        log::debug!("Font resolver caches cleared");
    }

    fn decode(&self, name: &str) -> Result<Arc<FontFile>> {
        log::debug!("Loading font file {name}");
        let (tfm, vf) = match self.loader.load(name)? {
            FontSource::Tfm(tfm) => (tfm, None),
            FontSource::Virtual { vf, tfm } => (tfm, Some(vf)),
        };
        let metrics = MetricTable::decode(&tfm)?;
        let program = vf.map(|vf| VfProgram::decode(&vf)).transpose()?;
        if let Some(program) = &program {
            if program.design_size() != metrics.design_size() {
                log::warn!(
                    "{name}: VF design size {} differs from TFM design size {}",
                    design_size_to_dimen(program.design_size()),
                    metrics.design_size_dimen()
                );
            }
            if program.checksum() != 0
                && metrics.checksum() != 0
                && program.checksum() != metrics.checksum()
            {
                log::warn!(
                    "{name}: VF checksum {:#010x} differs from TFM checksum {:#010x}",
                    program.checksum(),
                    metrics.checksum()
                );
            }
        }
        self.files_decoded.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(FontFile {
            name: name.to_string(),
            metrics: Arc::new(metrics),
            program: program.map(Arc::new),
        }))
    }

    fn build(&self, key: &FontKey) -> Result<FontHandle> {
        let file = self.file(key.name())?;
        let font = match file.program() {
            None => ScaledFont::physical(key.clone(), file.metrics.clone())?,
            Some(program) => {
                self.check_acyclic(key.name())?;
                let size = actual_size(key, file.metrics.design_size_dimen())?;
                let scaler = Scaler::new(size)?;
                let mut local_fonts = BTreeMap::new();
                for def in program.fonts() {
                    let local_key = FontKey::new(def.full_name()).at(scaler.try_scale(def.scaled_size)?);
                    let local = self.resolve(&local_key)?;
                    if def.checksum != 0
                        && local.get_checksum() != 0
                        && def.checksum != local.get_checksum()
                    {
                        log::warn!(
                            "{key}: checksum of local font {} is {:#010x}, expected {:#010x}",
                            def.full_name(),
                            local.get_checksum(),
                            def.checksum
                        );
                    }
                    if design_size_to_dimen(def.design_size) != local.get_design_size() {
                        log::warn!(
                            "{key}: design size of local font {} is {}, expected {}",
                            def.full_name(),
                            local.get_design_size(),
                            design_size_to_dimen(def.design_size)
                        );
                    }
                    local_fonts.insert(def.number, local);
                }
                ScaledFont::virtual_font(key.clone(), file.metrics.clone(), program.clone(), local_fonts)?
            }
        };
        self.fonts_built.fetch_add(1, Ordering::Relaxed);
        log::debug!("Built font {}", font.actual_font_key());
        Ok(Arc::new(font))
    }

    /// Walks the font name graph below `root`, failing on a cycle
    ///
    /// Resolving a cyclic graph would recurse forever, so the whole graph is
    /// checked before any of its instances is built.
    fn check_acyclic(&self, root: &str) -> Result<()> {
        if self.acyclic.contains(root) {
            return Ok(());
        }
        // names on the current path, with the references still to visit
        let mut path: Vec<(String, Vec<String>)> = Vec::new();
        let mut on_path: HashSet<String> = HashSet::new();
        let mut done: HashSet<String> = HashSet::new();

        path.push((root.to_string(), self.file(root)?.references()));
        on_path.insert(root.to_string());

        while let Some((_, pending)) = path.last_mut() {
            let Some(next) = pending.pop() else {
                if let Some((name, _)) = path.pop() {
                    on_path.remove(&name);
                    done.insert(name);
                }
                continue;
            };
            if on_path.contains(&next) {
                let start = path.iter().position(|(name, _)| *name == next).unwrap_or(0);
                let mut chain: Vec<String> = path[start..].iter().map(|(name, _)| name.clone()).collect();
                chain.push(next);
                return Err(FontError::CyclicReference(chain));
            }
            if done.contains(&next) || self.acyclic.contains(&next) {
                continue;
            }
            let references = self.file(&next)?.references();
            on_path.insert(next.clone());
            path.push((next, references));
        }

        for name in done {
            self.acyclic.insert(name);
        }
        Ok(())
    }
}

impl std::fmt::Debug for FontResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontResolver")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use texfm_core::test_util::{Packet, TfmBuilder, VfBuilder};
    use texfm_core::FixWord;

    fn vf_referencing(names: &[&str]) -> Vec<u8> {
        names
            .iter()
            .enumerate()
            .fold(VfBuilder::new(10), |vf, (n, name)| {
                vf.font(n as u32, name, FixWord::ONE, 10)
            })
            .build()
    }

    fn tfm() -> Vec<u8> {
        TfmBuilder::new(10).build()
    }

    #[test]
    fn test_cycle_is_reported_with_its_chain() {
        let loader = MemoryLoader::new();
        loader.insert_virtual("a", vf_referencing(&["b"]), tfm());
        loader.insert_virtual("b", vf_referencing(&["c"]), tfm());
        loader.insert_virtual("c", vf_referencing(&["a"]), tfm());
        let resolver = FontResolver::new(Arc::new(loader));
        assert_eq!(
            resolver.resolve_name("a").unwrap_err(),
            FontError::CyclicReference(vec!["a".into(), "b".into(), "c".into(), "a".into()])
        );
        assert_eq!(resolver.stats().fonts_built, 0);
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let loader = MemoryLoader::new();
        loader.insert_virtual("loop", vf_referencing(&["loop"]), tfm());
        let resolver = FontResolver::new(Arc::new(loader));
        assert!(matches!(
            resolver.resolve_name("loop"),
            Err(FontError::CyclicReference(chain)) if chain.len() == 2
        ));
    }

    #[test]
    fn test_shared_dependencies_are_not_cycles() {
        let loader = MemoryLoader::new();
        loader.insert_tfm("base", tfm());
        loader.insert_virtual("left", vf_referencing(&["base"]), tfm());
        loader.insert_virtual("right", vf_referencing(&["base"]), tfm());
        loader.insert_virtual("top", vf_referencing(&["left", "right", "base"]), tfm());
        let resolver = FontResolver::new(Arc::new(loader));
        let top = resolver.resolve_name("top").unwrap();
        let vf = top.as_virtual().unwrap();
        assert_eq!(vf.local_fonts().len(), 3);
        let base = resolver.resolve(&FontKey::new("base").at(texfm_core::Dimen::pt(10))).unwrap();
        assert!(Arc::ptr_eq(vf.local_font(2).unwrap(), &base));
        assert_eq!(resolver.stats().files_decoded, 4);
    }

    #[test]
    fn test_missing_local_font_fails_fast() {
        let loader = MemoryLoader::new();
        loader.insert_virtual("v", vf_referencing(&["gone"]), tfm());
        let resolver = FontResolver::new(Arc::new(loader));
        assert_eq!(
            resolver.resolve_name("v").unwrap_err(),
            FontError::NotFound("gone".into())
        );
    }

    #[test]
    fn test_decode_errors_are_not_cached_as_success() {
        let loader = Arc::new(MemoryLoader::new());
        loader.insert_tfm("bad", vec![0; 8]);
        let resolver = FontResolver::new(loader.clone());
        assert!(matches!(resolver.resolve_name("bad"), Err(FontError::Metric(_))));
        loader.insert_tfm("bad", tfm());
        assert!(resolver.resolve_name("bad").is_ok());
    }

    #[test]
    fn test_char_packets_survive_resolution() {
        let loader = MemoryLoader::new();
        loader.insert_tfm("base", TfmBuilder::new(10).char(b'a', FixWord::ONE, FixWord::ONE, FixWord::ZERO).build());
        loader.insert_virtual(
            "v",
            VfBuilder::new(10)
                .font(0, "base", FixWord::ONE, 10)
                .char(1, FixWord::ONE, Packet::new().set_char(u32::from(b'a')))
                .build(),
            tfm(),
        );
        let resolver = FontResolver::new(Arc::new(loader));
        let font = resolver.resolve_name("v").unwrap();
        assert!(font.has_glyph(1));
        assert_eq!(resolver.file("v").unwrap().name(), "v");
    }
}
