//! Image transformation for crop generation.
//!
//! The [`CropRenderer`] trait is the seam between the request handler and
//! the pixel work: the handler hands it source bytes plus a decoded
//! [`CropSpec`](crate::url::CropSpec) and gets encoded crop bytes back. The
//! production implementation is [`ImageRenderer`] (the `image` crate, pure
//! Rust, statically linked); tests substitute a recording stub.
//!
//! Submodules:
//! - [`render`] — the trim → resize/crop → filter → encode pipeline
//! - [`filters`] — the closed set of named filters

pub mod filters;
pub mod render;

pub use filters::FilterKind;
pub use render::{ImageRenderer, RenderError};

use crate::url::CropSpec;

/// Renders a source image into crop bytes according to a decoded spec.
///
/// Implementations must be pure with respect to storage: they see bytes in
/// and produce bytes out, and never touch the stores themselves.
pub trait CropRenderer: Send + Sync {
    /// Transform `source` (encoded image data in the format implied by
    /// `ext`) according to `spec`, returning data encoded in the same
    /// format. Crops never change format.
    fn render(&self, source: &[u8], ext: &str, spec: &CropSpec) -> Result<Vec<u8>, RenderError>;
}
