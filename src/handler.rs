//! Per-request orchestration: decode, check, generate, persist.
//!
//! [`handle`] is the whole lifecycle of one inbound crop request, written
//! as a straight-line state machine that terminates on the first matching
//! branch:
//!
//! 1. verify (when a signing key is configured)
//! 2. decode the path — non-crops bounce with [`HandleError::NotACrop`] so
//!    the outer router can fall through
//! 3. source existence — authoritative, checked against the store every
//!    time
//! 4. cache check — an existing crop is served as-is, before the cap is
//!    even consulted
//! 5. cap check — refuses *new* variants once a source has accumulated
//!    `max_crops`
//! 6. render and persist — a lost write race is success (see
//!    [`Storage::write_crop`])
//!
//! Each request is an independent execution unit: no shared in-process
//! cache, no locks, no single-flight. Concurrent first-requests for the
//! same crop all render redundantly and the store's write atomicity picks
//! the winner.

use crate::imaging::{CropRenderer, RenderError};
use crate::storage::Storage;
use crate::store::StoreError;
use crate::url;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum HandleError {
    /// Path doesn't match the crop grammar; not ours to handle.
    #[error("not a crop request")]
    NotACrop,
    #[error("source image not found: {0}")]
    SourceNotFound(String),
    /// The source already carries the configured maximum number of
    /// distinct crops. Distinct from not-found so operators can tell quota
    /// exhaustion from a bad link.
    #[error("crop limit reached for source: {0}")]
    TooManyCrops(String),
    #[error("crop request failed verification")]
    VerificationFailed,
    #[error("image transform failed: {0}")]
    Transform(#[from] RenderError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How a successful request was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Served {
    /// The crop already existed. `remote` tells the caller whether the
    /// crops store can be fronted by the local web server or needs a
    /// redirect/stream.
    Cached { path: String, remote: bool },
    /// Generated on this request; bytes are returned so the caller can
    /// respond without a second store read.
    Fresh { path: String, bytes: Vec<u8> },
}

impl Served {
    pub fn path(&self) -> &str {
        match self {
            Served::Cached { path, .. } | Served::Fresh { path, .. } => path,
        }
    }
}

/// Authorizes crop requests against the configured signing key.
///
/// The verification scheme is deliberately unspecified here — adopting
/// systems plug in whatever their URLs carry (HMAC, shared token, ...).
/// Without a configured key no verifier runs at all.
pub trait RequestVerifier: Send + Sync {
    fn verify(&self, path: &str, key: &str) -> bool;
}

/// Verifier that accepts everything; the default when no scheme is wired.
pub struct AllowAll;

impl RequestVerifier for AllowAll {
    fn verify(&self, _path: &str, _key: &str) -> bool {
        true
    }
}

/// Handle one crop request for a store-relative path.
pub fn handle(
    storage: &Storage,
    renderer: &dyn CropRenderer,
    signing: Option<(&dyn RequestVerifier, &str)>,
    path: &str,
) -> Result<Served, HandleError> {
    if let Some((verifier, key)) = signing
        && !verifier.verify(path, key)
    {
        return Err(HandleError::VerificationFailed);
    }

    let crop = url::decode(path).map_err(|_| HandleError::NotACrop)?;

    let source = crop.source_path();
    if !storage.src_exists(&source)? {
        return Err(HandleError::SourceNotFound(source));
    }

    if storage.crop_exists(path)? {
        debug!(path, "crop cache hit");
        return Ok(Served::Cached {
            path: path.to_string(),
            remote: storage.crops_are_remote(),
        });
    }

    if storage.too_many_crops(&source)? {
        return Err(HandleError::TooManyCrops(source));
    }

    debug!(path, source, "crop cache miss, generating");
    let src_bytes = storage.read_src(&source).map_err(|e| match e {
        StoreError::NotFound(p) => HandleError::SourceNotFound(p),
        other => HandleError::Store(other),
    })?;

    let bytes = renderer.render(&src_bytes, &crop.ext, &crop.spec)?;

    storage.write_crop(path, &bytes)?;
    Ok(Served::Fresh {
        path: path.to_string(),
        bytes,
    })
}
