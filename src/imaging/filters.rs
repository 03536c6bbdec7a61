//! The closed set of named crop filters.
//!
//! Each filter is a pure `DynamicImage -> DynamicImage` transform selected
//! by its URL token. Adding a filter means adding a variant, its token, and
//! its `apply` arm — the URL grammar picks the new token up through
//! [`FilterKind::from_token`].

use image::DynamicImage;

/// A named filter from the crop URL vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Plain grayscale.
    BlackWhite,
    /// Gaussian blur.
    Blur,
    /// Grayscale pushed down toward black.
    Darkgray,
    /// Inverted colors with a contrast boost.
    Negative,
    /// Warhol-style duotone: gray, brightened, tinted orange.
    OrangeWarhol,
    /// Warhol-style duotone: gray, brightened, tinted turquoise.
    TurquoiseWarhol,
}

impl FilterKind {
    /// The URL token selecting this filter.
    pub fn token(self) -> &'static str {
        match self {
            FilterKind::BlackWhite => "bw",
            FilterKind::Blur => "blur",
            FilterKind::Darkgray => "darkgray",
            FilterKind::Negative => "negative",
            FilterKind::OrangeWarhol => "orangewarhol",
            FilterKind::TurquoiseWarhol => "turquoisewarhol",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "bw" => FilterKind::BlackWhite,
            "blur" => FilterKind::Blur,
            "darkgray" => FilterKind::Darkgray,
            "negative" => FilterKind::Negative,
            "orangewarhol" => FilterKind::OrangeWarhol,
            "turquoisewarhol" => FilterKind::TurquoiseWarhol,
            _ => return None,
        })
    }

    /// Apply the filter. Pure: consumes and returns the image.
    pub fn apply(self, image: DynamicImage) -> DynamicImage {
        match self {
            FilterKind::BlackWhite => image.grayscale(),
            FilterKind::Blur => image.blur(1.5),
            FilterKind::Darkgray => colorize(image.grayscale(), -80, -80, -80),
            FilterKind::Negative => {
                let mut inverted = image;
                inverted.invert();
                inverted.adjust_contrast(25.0)
            }
            FilterKind::OrangeWarhol => colorize(image.grayscale().brighten(80), -30, -143, -255),
            FilterKind::TurquoiseWarhol => colorize(image.grayscale().brighten(80), -137, -45, -73),
        }
    }
}

/// Shift every channel by a fixed offset, clamping to the 8-bit range.
fn colorize(image: DynamicImage, red: i16, green: i16, blue: i16) -> DynamicImage {
    let mut rgb = image.to_rgb8();
    for pixel in rgb.pixels_mut() {
        pixel[0] = clamp_add(pixel[0], red);
        pixel[1] = clamp_add(pixel[1], green);
        pixel[2] = clamp_add(pixel[2], blue);
    }
    DynamicImage::ImageRgb8(rgb)
}

fn clamp_add(channel: u8, offset: i16) -> u8 {
    (channel as i16 + offset).clamp(0, 255) as u8
}
