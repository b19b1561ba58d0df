//! texfm core: TeX font metrics and virtual fonts
//!
//! Everything needed to go from TFM and VF bytes to measured characters:
//!
//! 1. **Scaling** - [`Scaler`] turns fix_words into scaled points exactly
//!    the way TeX does
//! 2. **Decoding** - [`MetricTable`] and [`VfProgram`] parse the two file
//!    formats into immutable tables
//! 3. **Instances** - [`ScaledFont`] puts a table at a size and answers
//!    metric queries
//! 4. **Interpretation** - [`ScaledFont::build_char_node`] runs a virtual
//!    character's packet and returns its [`Node`] tree
//!
//! Finding files and caching instances is left to a resolver such as the
//! one in `texfm-fontdb`; this crate only defines the [`FontLoader`] seam.
//!
//! ```ignore
//! use std::sync::Arc;
//! use texfm_core::{FontKey, MetricTable, ScaledFont, Dimen};
//!
//! let metrics = Arc::new(MetricTable::decode(&std::fs::read("cmr10.tfm")?)?);
//! let font = ScaledFont::physical(FontKey::new("cmr10").at(Dimen::pt(12)), metrics)?;
//! assert_eq!(font.get_scale_factor(), 1200);
//! ```

pub mod error;
pub mod font;
pub mod interpreter;
pub mod node;
mod reader;
pub mod scaler;
pub mod tfm;
pub mod traits;
pub mod types;
pub mod vf;

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;

pub use error::{FontError, MetricError, Result, VirtualFontError};
pub use font::{actual_size, FontHandle, FontKind, ScaledFont, VirtualFont};
pub use node::{BoxNode, CharNode, KernNode, Node, RuleNode};
pub use scaler::{convert, Scaler};
pub use tfm::{CharTag, ExtensibleRecipe, Ligature, MetricTable};
pub use traits::{DefaultNodeFactory, FontLoader, FontSource, NodeFactory};
pub use types::{Dimen, FixWord, FontKey, SCALE};
pub use vf::{CharProgram, Instruction, LocalFontDef, VfProgram};
