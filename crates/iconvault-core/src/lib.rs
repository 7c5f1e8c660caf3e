#![deny(clippy::all, warnings)]

mod config;
mod fetch;
mod net;
mod store;
mod sync;
mod ui;

pub use config::{
    resolve_cache_root, CacheLayout, CacheLocation, RemoteEndpoints, CACHE_FILE_NAME,
};
pub use store::CacheStore;
pub use sync::{AssetCache, ExportSummary, SyncSummary, DOWNLOAD_WIDTH};
