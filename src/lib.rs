//! # recrop
//!
//! On-demand image crops with file-backed caching. A template asks for
//! `team/jane.jpg` at 200x300 and gets back a URL like
//! `team/jane-200x300.jpg`; the first browser request for that URL
//! generates the variant and writes it next to (or wherever crops are
//! configured to live relative to) the original. Every later request is a
//! plain file read — the deterministic path *is* the cache key, so there
//! is no index, no database, and no TTL. Crops live until something
//! deletes them.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`url`] | The crop path grammar: generation, decoding, route matching |
//! | [`store`] | `Disk` capability trait, local filesystem and in-memory backends |
//! | [`storage`] | The two stores, crop enumeration, cap, bulk purge |
//! | [`handler`] | Per-request state machine: decode → check → generate → persist |
//! | [`imaging`] | `CropRenderer` seam and the resize/filter/encode pipeline |
//! | [`api`] | `Cropper` facade: url/tag/render/delete/reset/purge |
//! | [`config`] | Flat `recrop.toml` loading and validation |
//!
//! # Design Decisions
//!
//! ## One Grammar, Three Jobs
//!
//! The same pattern drives URL generation, HTTP route matching, and
//! storage-listing filters. Because every consumer shares
//! [`url::CROP_PATTERN`], a generated URL is routable by construction and
//! a stored crop is always reconstructible back to its source during
//! listing and purge. Decode-then-reencode reproduces any accepted path
//! byte for byte, which listing correctness depends on.
//!
//! ## Races Resolved by the Store, Not by Locks
//!
//! Concurrent first-requests for the same crop all render independently;
//! the crops store's atomic create picks a winner and the losers treat
//! "already exists" as success. Redundant CPU on a cache-miss stampede is
//! the accepted price for having no locks, no leases, and no single-flight
//! machinery.
//!
//! ## Stores Behind a Capability Trait
//!
//! Sources and crops each sit behind [`store::Disk`] — five operations and
//! an `is_local` flag. Local directories and remote object stores are
//! interchangeable; the only place remoteness leaks is
//! [`storage::Storage::crops_are_remote`], which tells the serving layer
//! whether the web server can be left to serve crop files directly.
//!
//! ## Closed Vocabulary, Fails Closed
//!
//! Crop options are a closed set of tokens. An unknown token doesn't
//! degrade to "ignore it" — the whole path stops matching the grammar, so
//! it can neither route nor be listed as a crop. Filters are an enum
//! dispatching to pure `DynamicImage -> DynamicImage` functions; adding
//! one is a new variant, not a new subclass.

pub mod api;
pub mod config;
pub mod handler;
pub mod imaging;
pub mod storage;
pub mod store;
pub mod url;

pub use api::{ApiError, Cropper};
pub use config::{Config, ConfigError};
pub use handler::{AllowAll, HandleError, RequestVerifier, Served};
pub use imaging::{CropRenderer, FilterKind, ImageRenderer, RenderError};
pub use storage::{Storage, StorageError};
pub use store::{Disk, LocalDisk, MemoryDisk, StoreError};
pub use url::{CropOption, CropSpec, Quadrant, UrlCodec, UrlError};

#[cfg(test)]
pub(crate) mod test_helpers;
