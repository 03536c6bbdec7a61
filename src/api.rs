//! The public application-facing API.
//!
//! [`Cropper`] bundles the codec, the storage manager, and the renderer
//! behind the handful of calls host applications actually make:
//!
//! - [`Cropper::url`] / [`Cropper::tag`] — build crop URLs / `<img>` tags
//!   for templates. Nothing is generated at this point; the crop comes
//!   into existence when the browser requests the URL.
//! - [`Cropper::render`] — serve one inbound crop request (the piece an
//!   HTTP route delegates to).
//! - [`Cropper::delete`] / [`Cropper::reset`] — lifecycle: drop a source
//!   with all its crops, or just the crops.
//! - [`Cropper::purge`] — bulk crop deletion with optional filter and
//!   dry-run.

use crate::config::Config;
use crate::handler::{self, HandleError, RequestVerifier, Served};
use crate::imaging::ImageRenderer;
use crate::storage::{Storage, StorageError};
use crate::store::StoreError;
use crate::url::{CropOption, UrlCodec, UrlError};
use maud::{Markup, html};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Url(#[from] UrlError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct Cropper {
    codec: UrlCodec,
    storage: Storage,
    renderer: ImageRenderer,
    signing_key: Option<String>,
    verifier: Option<Box<dyn RequestVerifier>>,
    url_prefix: Option<String>,
}

impl Cropper {
    /// Build from config with both stores on the local filesystem.
    pub fn new(config: &Config) -> Self {
        Self::with_storage(config, Storage::from_config(config))
    }

    /// Build with custom storage backends.
    pub fn with_storage(config: &Config, storage: Storage) -> Self {
        Self {
            codec: UrlCodec::new(config.url_prefix.clone()),
            storage,
            renderer: ImageRenderer::new(config.quality),
            signing_key: config.signing_key.clone(),
            verifier: None,
            url_prefix: config.url_prefix.clone(),
        }
    }

    /// Install a request verifier. Only takes effect when a `signing_key`
    /// is configured.
    pub fn set_verifier(&mut self, verifier: Box<dyn RequestVerifier>) {
        self.verifier = Some(verifier);
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Public URL for a crop of `src_url`. Deterministic: equivalent
    /// requests yield the identical URL, which is what makes the crops
    /// store a cache.
    pub fn url(
        &self,
        src_url: &str,
        width: Option<u32>,
        height: Option<u32>,
        options: &[CropOption],
    ) -> Result<String, UrlError> {
        let path = self.codec.generate(src_url, width, height, options)?;
        Ok(match &self.url_prefix {
            Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), path),
            None => format!("/{path}"),
        })
    }

    /// An `<img>` tag whose `src` is the crop URL.
    pub fn tag(
        &self,
        src_url: &str,
        width: Option<u32>,
        height: Option<u32>,
        options: &[CropOption],
    ) -> Result<Markup, UrlError> {
        let url = self.url(src_url, width, height, options)?;
        Ok(html! { img src=(url); })
    }

    /// Serve one crop request. `path` may carry the configured URL prefix.
    pub fn render(&self, path: &str) -> Result<Served, HandleError> {
        let relative = self
            .codec
            .relative_path(path)
            .map_err(|_| HandleError::NotACrop)?;
        let signing = match (&self.verifier, &self.signing_key) {
            (Some(verifier), Some(key)) => Some((verifier.as_ref(), key.as_str())),
            _ => None,
        };
        handler::handle(&self.storage, &self.renderer, signing, &relative)
    }

    /// Delete a source image and every crop generated from it. Returns the
    /// deleted crop paths. A missing source is a hard error.
    pub fn delete(&self, src_url: &str) -> Result<Vec<String>, ApiError> {
        let path = self.codec.relative_path(src_url)?;
        self.storage.delete_src(&path)?;
        Ok(self.storage.delete_crops(&path)?)
    }

    /// Delete only the crops of a source, keeping the original.
    pub fn reset(&self, src_url: &str) -> Result<Vec<String>, ApiError> {
        let path = self.codec.relative_path(src_url)?;
        Ok(self.storage.delete_crops(&path)?)
    }

    /// Bulk purge across the whole crops store.
    pub fn purge(&self, filter: Option<&str>, dry_run: bool) -> Result<Vec<String>, ApiError> {
        Ok(self.storage.delete_all_crops(filter, dry_run)?)
    }
}
