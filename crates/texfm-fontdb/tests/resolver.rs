//! Resolver behaviour over synthetic fonts

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use texfm_core::test_util::{Packet, TfmBuilder, VfBuilder};
use texfm_core::{
    DefaultNodeFactory, Dimen, FixWord, FontKey, FontLoader, FontSource, Node, Result,
};
use texfm_fontdb::{FontResolver, MemoryLoader, ResolverConfig};

const HALF: FixWord = FixWord(1 << 19);

/// Counts how often each load reaches the backing loader
#[derive(Default)]
struct CountingLoader {
    inner: MemoryLoader,
    loads: AtomicUsize,
}

impl FontLoader for CountingLoader {
    fn load(&self, name: &str) -> Result<FontSource> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(name)
    }
}

fn base_tfm() -> Vec<u8> {
    TfmBuilder::new(10)
        .char(b'a', HALF, HALF, FixWord::ZERO)
        .char(b'b', HALF, HALF, FixWord(1 << 18))
        .kern(b'a', b'b', FixWord(-(1 << 16)))
        .params(&[
            FixWord::ZERO,
            FixWord(1 << 18),
            FixWord::ZERO,
            FixWord::ZERO,
            HALF,
            FixWord::ONE,
        ])
        .build()
}

fn fonts() -> CountingLoader {
    let loader = CountingLoader::default();
    loader.inner.insert_tfm("base", base_tfm());
    // "mid" uses base at its own size and base at twice its size
    loader.inner.insert_virtual(
        "mid",
        VfBuilder::new(10)
            .font(0, "base", FixWord::ONE, 10)
            .font(1, "base", FixWord(2 << 20), 10)
            .char(
                1,
                FixWord::ONE,
                Packet::new()
                    .set_char(u32::from(b'a'))
                    .font(1)
                    .set_char(u32::from(b'a')),
            )
            .build(),
        TfmBuilder::new(10).char(1, FixWord(3 << 19), HALF, FixWord::ZERO).build(),
    );
    // "top" is virtual over virtual
    loader.inner.insert_virtual(
        "top",
        VfBuilder::new(10)
            .font(0, "mid", FixWord::ONE, 10)
            .char(1, FixWord(3 << 19), Packet::new().push().set_char(1).pop().right(FixWord(3 << 19)))
            .build(),
        TfmBuilder::new(10).char(1, FixWord(3 << 19), HALF, FixWord::ZERO).build(),
    );
    loader
}

#[test]
fn test_resolve_when_called_twice_then_returns_identical_handle() {
    let loader = Arc::new(fonts());
    let resolver = FontResolver::new(loader.clone());
    let key = FontKey::new("base").at(Dimen::pt(12));
    let first = resolver.resolve(&key).unwrap();
    let second = resolver.resolve(&key).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    assert_eq!(resolver.stats().fonts_built, 1);
}

#[test]
fn test_resolve_when_param_order_differs_then_keys_match() {
    let resolver = FontResolver::new(Arc::new(fonts()));
    let a = FontKey::new("base").with_param("x", 1).with_param("y", 2);
    let b = FontKey::new("base").with_param("y", 2).with_param("x", 1);
    assert!(Arc::ptr_eq(&resolver.resolve(&a).unwrap(), &resolver.resolve(&b).unwrap()));
}

#[test]
fn test_file_decoded_once_for_many_sizes() {
    let loader = Arc::new(fonts());
    let resolver = FontResolver::new(loader.clone());
    for points in [5, 10, 12, 17] {
        resolver.resolve(&FontKey::new("base").at(Dimen::pt(points))).unwrap();
    }
    let stats = resolver.stats();
    assert_eq!(stats.files_decoded, 1);
    assert_eq!(stats.fonts_built, 4);
    assert_eq!(stats.cached_fonts, 4);
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_resolution_initialises_once() {
    let loader = Arc::new(fonts());
    let resolver = Arc::new(FontResolver::new(loader.clone()));
    let key = FontKey::new("top").at(Dimen::pt(12));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let resolver = resolver.clone();
            let key = key.clone();
            thread::spawn(move || resolver.resolve(&key).unwrap())
        })
        .collect();
    let fonts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(fonts.iter().all(|f| Arc::ptr_eq(f, &fonts[0])));
    // top, mid, base
    assert_eq!(loader.loads.load(Ordering::SeqCst), 3);
    assert_eq!(resolver.stats().files_decoded, 3);
}

#[test]
fn test_local_fonts_are_scaled_relative_to_the_virtual_size() {
    let resolver = FontResolver::new(Arc::new(fonts()));
    let mid = resolver.resolve(&FontKey::new("mid").at(Dimen::pt(12))).unwrap();
    let vf = mid.as_virtual().unwrap();
    assert_eq!(vf.local_font(0).unwrap().get_actual_size(), Dimen::pt(12));
    assert_eq!(vf.local_font(1).unwrap().get_actual_size(), Dimen::pt(24));
    let shared = resolver.resolve(&FontKey::new("base").at(Dimen::pt(24))).unwrap();
    assert!(Arc::ptr_eq(vf.local_font(1).unwrap(), &shared));
}

#[test]
fn test_nested_virtual_character() {
    let resolver = FontResolver::new(Arc::new(fonts()));
    let top = resolver.resolve_name("top").unwrap();
    let Some(Node::Box(root)) = top.build_char_node(1, &DefaultNodeFactory).unwrap() else {
        panic!("expected a box");
    };
    assert_eq!(root.width, Dimen::pt(15));
    assert_eq!(root.height, Dimen::pt(5));
    let run = root.boxes().next().unwrap();
    let Node::Box(mid_char) = &run.children[0] else {
        panic!("expected the nested character box");
    };
    let parts: Vec<_> = mid_char.boxes().collect();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].width, Dimen::pt(5));
    assert_eq!(parts[1].offset, Dimen::pt(5));
    assert_eq!(parts[1].width, Dimen::pt(10));
    let leaf = parts[1].children[0].as_char().unwrap();
    assert_eq!(leaf.font.get_actual_size(), Dimen::pt(20));
}

#[test]
fn test_scale_factor_and_scaled_keys() {
    let resolver = FontResolver::new(Arc::new(fonts()));
    let scaled = resolver.resolve(&FontKey::new("base").scaled(1200)).unwrap();
    assert_eq!(scaled.get_scale_factor(), 1200);
    assert_eq!(scaled.get_actual_size(), Dimen::pt(12));
    assert_eq!(scaled.actual_font_key(), &FontKey::new("base").at(Dimen::pt(12)));
    assert_eq!(scaled.get_em(), Dimen::pt(12));
    assert_eq!(scaled.get_ex(), Dimen::pt(6));
    assert_eq!(scaled.get_space(), Dimen::pt(3));
}

#[test]
fn test_kerning_and_range_through_resolver() {
    let resolver = FontResolver::new(Arc::new(fonts()));
    let base = resolver.resolve_name("base").unwrap();
    assert!(base.get_kerning(u32::from(b'a'), u32::from(b'b')) < Dimen::ZERO);
    assert_eq!(base.get_kerning(u32::from(b'b'), u32::from(b'a')), Dimen::ZERO);
    assert!(!base.has_glyph(0xFFFF));
    assert_eq!(base.get_width(0xFFFF), None);
    assert!(base.build_char_node(0xFFFF, &DefaultNodeFactory).unwrap().is_none());
}

#[test]
fn test_missing_font_is_not_found() {
    let resolver = FontResolver::new(Arc::new(fonts()));
    let err = resolver.resolve_name("nosuchfont").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_clear_rebuilds_instances() {
    let loader = Arc::new(fonts());
    let resolver = FontResolver::new(loader.clone());
    let before = resolver.resolve_name("base").unwrap();
    resolver.clear();
    let after = resolver.resolve_name("base").unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(before.actual_font_key(), after.actual_font_key());
    assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
}

#[test]
fn test_bounded_caches_still_resolve() {
    let config = ResolverConfig {
        max_files: Some(1),
        max_fonts: Some(1),
    };
    let resolver = FontResolver::with_config(Arc::new(fonts()), config);
    let top = resolver.resolve(&FontKey::new("top").at(Dimen::pt(10))).unwrap();
    assert!(top.has_glyph(1));
}
