//! Crop URL grammar: generation, decoding, and route matching.
//!
//! A crop path encodes a full transform request in its filename:
//!
//! ```text
//! <stem>-<width>x<height>(-<option>)*.<ext>
//!
//! uploads/team/jane-200x300-quadrant-T-bw.jpg
//!         └─┬─┘ └┬┘ └┬┘ └────┬─────┘ └┤ └┬┘
//!          stem  W   H    anchor  filter ext
//! ```
//!
//! Width and height are plain decimal numbers; either may be empty, meaning
//! "derive from the other dimension's aspect ratio". Option tokens come from
//! a closed vocabulary — an unknown token makes the whole path fail to match,
//! so arbitrary strings can never be smuggled into the crops store.
//!
//! ## One grammar, three consumers
//!
//! The same pattern ([`CROP_PATTERN`]) is used for:
//!
//! 1. **Generation** — [`UrlCodec::generate`] builds crop paths, so every
//!    path we hand out is matchable by construction.
//! 2. **Route matching** — [`route_pattern`] lets the HTTP layer recognize
//!    crop-shaped requests and hand them to the handler.
//! 3. **Listing filters** — [`is_crop`] and [`decode`] distinguish crops from
//!    plain files when the storage layer enumerates directories.
//!
//! Keeping a single source of truth guarantees the three can never drift:
//! a path we generate is always routable, and a path we route is always
//! reconstructible during listing and purge.
//!
//! ## Determinism
//!
//! [`UrlCodec::generate`] emits a canonical form — dimensions first, then
//! option tokens in a fixed sort — so equivalent requests always map to the
//! same stored path. That determinism is what lets the crops store double as
//! a cache without any index.

use crate::imaging::FilterKind;
use regex::Regex;
use std::fmt::Write as _;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UrlError {
    /// The path does not match the crop grammar. Used by the router to fall
    /// through to other handlers and by listing code to skip plain files.
    #[error("not a crop path")]
    NotACrop,
    /// The transform request itself is malformed (bad source URL, no
    /// dimensions and no options, missing extension).
    #[error("invalid crop descriptor: {0}")]
    InvalidDescriptor(String),
}

/// The crop grammar as an unanchored regex, suitable for router `where`
/// clauses. Capture groups: stem, width, height, option tokens, extension.
///
/// Dimensions deliberately exclude leading zeros so that every accepted
/// numeral re-encodes to the identical string.
pub const CROP_PATTERN: &str = r"(.+)-((?:[1-9][0-9]*)?)x((?:[1-9][0-9]*)?)((?:-(?:resize|quadrant-(?:TL|TR|BL|BR|T|B|L|R|C)|bw|blur|darkgray|negative|orangewarhol|turquoisewarhol|q(?:100|[1-9][0-9]|[0-9])|trim|noupscale))*)\.([A-Za-z0-9]+)";

static CROP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{CROP_PATTERN}$")).expect("crop pattern is a valid regex")
});

/// The grammar as a pattern string for the outer HTTP router.
pub fn route_pattern() -> &'static str {
    CROP_PATTERN
}

/// Whether a path is accepted by the crop grammar (full match).
pub fn is_crop(path: &str) -> bool {
    CROP_RE.is_match(path)
}

/// Crop anchor for crop-to-fill resizes. Names the region of the scaled
/// image that survives the crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    TopLeft,
    Top,
    TopRight,
    Left,
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl Quadrant {
    pub fn code(self) -> &'static str {
        match self {
            Quadrant::TopLeft => "TL",
            Quadrant::Top => "T",
            Quadrant::TopRight => "TR",
            Quadrant::Left => "L",
            Quadrant::Center => "C",
            Quadrant::Right => "R",
            Quadrant::BottomLeft => "BL",
            Quadrant::Bottom => "B",
            Quadrant::BottomRight => "BR",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "TL" => Quadrant::TopLeft,
            "T" => Quadrant::Top,
            "TR" => Quadrant::TopRight,
            "L" => Quadrant::Left,
            "C" => Quadrant::Center,
            "R" => Quadrant::Right,
            "BL" => Quadrant::BottomLeft,
            "B" => Quadrant::Bottom,
            "BR" => Quadrant::BottomRight,
            _ => return None,
        })
    }
}

/// One option token from the closed vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropOption {
    /// Scale to exactly width x height, allowing distortion, instead of
    /// crop-to-fill.
    Resize,
    /// Crop anchor for crop-to-fill (default is center).
    Quadrant(Quadrant),
    /// Named post-resize filter.
    Filter(FilterKind),
    /// Output encoding quality, 0–100.
    Quality(u8),
    /// Strip a uniform-color border before resizing.
    Trim,
    /// Never scale beyond the source dimensions.
    NoUpscale,
}

impl CropOption {
    /// The token exactly as it appears in a crop path.
    pub fn token(&self) -> String {
        match self {
            CropOption::Resize => "resize".to_string(),
            CropOption::Quadrant(q) => format!("quadrant-{}", q.code()),
            CropOption::Filter(f) => f.token().to_string(),
            CropOption::Quality(q) => format!("q{q}"),
            CropOption::Trim => "trim".to_string(),
            CropOption::NoUpscale => "noupscale".to_string(),
        }
    }

    /// Parse a single token. `None` for anything outside the vocabulary.
    pub fn parse_token(token: &str) -> Option<Self> {
        match token {
            "resize" => return Some(CropOption::Resize),
            "trim" => return Some(CropOption::Trim),
            "noupscale" => return Some(CropOption::NoUpscale),
            _ => {}
        }
        if let Some(code) = token.strip_prefix("quadrant-") {
            return Quadrant::from_code(code).map(CropOption::Quadrant);
        }
        if let Some(f) = FilterKind::from_token(token) {
            return Some(CropOption::Filter(f));
        }
        if let Some(digits) = token.strip_prefix('q')
            && !digits.is_empty()
            && digits.chars().all(|c| c.is_ascii_digit())
            && let Ok(q) = digits.parse::<u8>()
            && q <= 100
        {
            return Some(CropOption::Quality(q));
        }
        None
    }
}

/// The decoded transform request a crop path encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropSpec {
    /// Target width. `None` means "derive from height".
    pub width: Option<u32>,
    /// Target height. `None` means "derive from width".
    pub height: Option<u32>,
    /// Option tokens in path order. For generated paths this is the
    /// canonical sort; decoded paths keep whatever order they carried.
    pub options: Vec<CropOption>,
}

impl CropSpec {
    /// A spec with neither dimensions nor options encodes nothing and is
    /// indistinguishable from the plain source — always rejected.
    pub fn is_noop(&self) -> bool {
        self.width.is_none() && self.height.is_none() && self.options.is_empty()
    }

    pub fn resize(&self) -> bool {
        self.options.contains(&CropOption::Resize)
    }

    pub fn trim(&self) -> bool {
        self.options.contains(&CropOption::Trim)
    }

    pub fn no_upscale(&self) -> bool {
        self.options.contains(&CropOption::NoUpscale)
    }

    pub fn quadrant(&self) -> Option<Quadrant> {
        self.options.iter().find_map(|o| match o {
            CropOption::Quadrant(q) => Some(*q),
            _ => None,
        })
    }

    pub fn quality(&self) -> Option<u8> {
        self.options.iter().find_map(|o| match o {
            CropOption::Quality(q) => Some(*q),
            _ => None,
        })
    }

    /// Filters in application order (path order).
    pub fn filters(&self) -> impl Iterator<Item = FilterKind> + '_ {
        self.options.iter().filter_map(|o| match o {
            CropOption::Filter(f) => Some(*f),
            _ => None,
        })
    }
}

/// A successfully decoded crop path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCrop {
    /// Source path without its extension, directory preserved.
    pub stem: String,
    /// The source's original extension. Crops never change format.
    pub ext: String,
    pub spec: CropSpec,
}

impl DecodedCrop {
    /// Reconstruct the source path this crop belongs to.
    pub fn source_path(&self) -> String {
        format!("{}.{}", self.stem, self.ext)
    }

    /// Re-serialize to a crop path, preserving the decoded token order.
    /// For every path [`decode`] accepts, this reproduces it byte for byte —
    /// listing and purge rely on that to match stored paths exactly.
    pub fn crop_path(&self) -> String {
        encode_path(&self.stem, self.spec.width, self.spec.height, &self.spec.options, &self.ext)
    }
}

fn encode_path(
    stem: &str,
    width: Option<u32>,
    height: Option<u32>,
    options: &[CropOption],
    ext: &str,
) -> String {
    let mut path = String::with_capacity(stem.len() + ext.len() + 16);
    path.push_str(stem);
    path.push('-');
    if let Some(w) = width {
        let _ = write!(path, "{w}");
    }
    path.push('x');
    if let Some(h) = height {
        let _ = write!(path, "{h}");
    }
    for option in options {
        path.push('-');
        path.push_str(&option.token());
    }
    path.push('.');
    path.push_str(ext);
    path
}

/// Decode a path against the crop grammar.
///
/// Fails with [`UrlError::NotACrop`] for anything outside the grammar:
/// unknown tokens, dimensionless descriptors with no options, numeric
/// overflow, or path traversal in the stem. All failures are indistinct by
/// design — a non-matching path is simply not a crop.
pub fn decode(path: &str) -> Result<DecodedCrop, UrlError> {
    let caps = CROP_RE.captures(path).ok_or(UrlError::NotACrop)?;

    let stem = caps.get(1).map_or("", |m| m.as_str());
    if stem.starts_with('/') || stem.split('/').any(|seg| seg == "..") {
        return Err(UrlError::NotACrop);
    }

    let width = parse_dim(caps.get(2).map_or("", |m| m.as_str()))?;
    let height = parse_dim(caps.get(3).map_or("", |m| m.as_str()))?;
    let options = parse_options(caps.get(4).map_or("", |m| m.as_str()))?;
    let ext = caps.get(5).map_or("", |m| m.as_str());

    let spec = CropSpec {
        width,
        height,
        options,
    };
    if spec.is_noop() {
        return Err(UrlError::NotACrop);
    }

    Ok(DecodedCrop {
        stem: stem.to_string(),
        ext: ext.to_string(),
        spec,
    })
}

fn parse_dim(raw: &str) -> Result<Option<u32>, UrlError> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u32>().map(Some).map_err(|_| UrlError::NotACrop)
}

/// Parse the option-token group (`-tok1-tok2...`). The grammar has already
/// vetted it, but parsing stays defensive so the vocabulary lives in exactly
/// one place ([`CropOption::parse_token`]).
fn parse_options(group: &str) -> Result<Vec<CropOption>, UrlError> {
    let mut options = Vec::new();
    let mut parts = group.split('-').skip(1).peekable();
    while let Some(part) = parts.next() {
        // `quadrant-X` is the one token containing a dash; stitch it back.
        let token = if part == "quadrant" {
            let code = parts.next().ok_or(UrlError::NotACrop)?;
            format!("quadrant-{code}")
        } else {
            part.to_string()
        };
        options.push(CropOption::parse_token(&token).ok_or(UrlError::NotACrop)?);
    }
    Ok(options)
}

/// Generates crop paths from application requests. Holds the configured URL
/// prefix so callers can pass full public URLs.
#[derive(Debug, Clone, Default)]
pub struct UrlCodec {
    prefix: Option<String>,
}

impl UrlCodec {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Resolve a public URL to a store-relative source path: strips the
    /// configured prefix and any leading slash, and rejects traversal.
    pub fn relative_path(&self, url: &str) -> Result<String, UrlError> {
        let mut path = url;
        if let Some(prefix) = &self.prefix
            && let Some(rest) = path.strip_prefix(prefix.as_str())
        {
            path = rest;
        }
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return Err(UrlError::InvalidDescriptor("empty source path".into()));
        }
        if path.split('/').any(|seg| seg == "..") {
            return Err(UrlError::InvalidDescriptor(format!(
                "source path escapes the store: {url}"
            )));
        }
        Ok(path.to_string())
    }

    /// Build the canonical crop path for a transform request.
    ///
    /// Width or height of zero means "derive from the other dimension" and
    /// encodes as empty. Tokens are sorted into a fixed order so equivalent
    /// requests produce identical paths.
    pub fn generate(
        &self,
        url: &str,
        width: Option<u32>,
        height: Option<u32>,
        options: &[CropOption],
    ) -> Result<String, UrlError> {
        let source = self.relative_path(url)?;
        let (stem, ext) = source
            .rsplit_once('.')
            .filter(|(stem, ext)| {
                !stem.is_empty() && !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .ok_or_else(|| {
                UrlError::InvalidDescriptor(format!("source has no usable extension: {source}"))
            })?;

        let width = width.filter(|w| *w > 0);
        let height = height.filter(|h| *h > 0);

        let mut options = options.to_vec();
        options.sort_by_key(|o| o.token());

        let spec = CropSpec {
            width,
            height,
            options,
        };
        if spec.is_noop() {
            return Err(UrlError::InvalidDescriptor(
                "crop needs at least one dimension or option".into(),
            ));
        }

        Ok(encode_path(stem, spec.width, spec.height, &spec.options, ext))
    }
}
