//! Font lookup and caching for texfm
//!
//! A [`FontResolver`] takes a [`FontKey`](texfm_core::FontKey), finds the
//! files through a [`FontLoader`](texfm_core::FontLoader), and hands back a
//! shared [`FontHandle`](texfm_core::FontHandle). Virtual fonts come back
//! with all their local fonts resolved.
//!
//! ```ignore
//! use std::sync::Arc;
//! use texfm_core::{Dimen, FontKey};
//! use texfm_fontdb::{DirectoryLoader, FontResolver, SearchPath};
//!
//! let loader = DirectoryLoader::new(SearchPath::new().with_dir("/usr/share/texmf/fonts"));
//! let resolver = FontResolver::new(Arc::new(loader));
//! let cmr10 = resolver.resolve(&FontKey::new("cmr10").at(Dimen::pt(12)))?;
//! println!("quad: {}", cmr10.get_em());
//! ```

pub mod config;
pub mod loader;
pub mod resolver;

pub use config::{ResolverConfig, SearchPath, FONT_PATH_ENV};
pub use loader::{DirectoryLoader, MemoryLoader};
pub use resolver::{FontFile, FontResolver, ResolverStats};
