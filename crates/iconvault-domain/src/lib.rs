#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod document;
pub mod feeds;
pub mod index;
pub mod key;
pub mod versions;

pub use document::CacheDocument;
pub use feeds::{Manifest, VersionDiff, VersionMarker};
pub use index::build_index;
pub use key::{image_stem, normalize_item_id};
pub use versions::{DEFAULT_VERSION, KNOWN_VERSIONS};
