//! Source adapters
//!
//! Every supported website implements the [`SourceAdapter`] contract: search,
//! fetch-info, list-chapters, list-chapter-pages and resolve-image-url. The set
//! of sources is closed ([`SourceKind`]) and selected through the
//! [`SourceRegistry`]; callers pass the source explicitly, the registry only
//! falls back to the configured default when none is given.
//!
//! - [`MangaKatana`]: HTML pages, image list embedded in an inline script
//! - [`KissLove`]: signed JSON API

pub mod kisslove;
pub mod mangakatana;
mod registry;
mod traits;

pub use kisslove::KissLove;
pub use mangakatana::MangaKatana;
pub use registry::{SourceKind, SourceRegistry};
pub use traits::SourceAdapter;
