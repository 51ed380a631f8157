//! Colour conversion of raw frames before they reach a sink.
//!
//! Only formats with a known conversion are touched; every other format is
//! passed through unchanged.

use crate::error::DeviceError;
use crate::feature::{FeatureRange, HasFeatures};
use crate::format::PixelFormat;
use crate::frame::Frame;
use crate::{Error, Result};
use std::borrow::Cow;
use std::collections::HashMap;
use lazy_static::lazy_static;
use tracing::debug;



#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Conversion {
    /// Demosaic an 8-bit Bayer mosaic; the value is the colour at (0,0),
    /// (1,0), (0,1), (1,1) of every 2x2 cell.
    BayerToRgb([Channel; 4]),
    BgrToRgb
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel { R, G, B }

lazy_static! {
    static ref CONVERSIONS: HashMap<PixelFormat, Conversion> = {
        use Channel::*;

        HashMap::from([
            (PixelFormat::BayerRG8, Conversion::BayerToRgb([R, G, G, B])),
            (PixelFormat::BayerGR8, Conversion::BayerToRgb([G, R, B, G])),
            (PixelFormat::BayerGB8, Conversion::BayerToRgb([G, B, R, G])),
            (PixelFormat::BayerBG8, Conversion::BayerToRgb([B, G, G, R])),
            (PixelFormat::Bgr8, Conversion::BgrToRgb),
        ])
    };
}

pub fn conversion_for(format: PixelFormat) -> Option<Conversion> {
    CONVERSIONS.get(&format).copied()
}

/// Whether frames in `format` can be written as an image, directly or after
/// conversion.
pub fn is_writable(format: PixelFormat) -> bool {
    matches!(format, PixelFormat::Mono8 | PixelFormat::Rgb8) || conversion_for(format).is_some()
}

fn is_colour(format: PixelFormat) -> bool {
    format.is_color() || format.is_bayer()
}

/// Put the camera in a pixel format its frames can be written in.
///
/// A writable colour format that is already selected is kept. Otherwise the
/// first writable colour format the camera offers is chosen, then the first
/// writable mono one.
pub fn select_pixel_format<C: HasFeatures>(camera: &C) -> Result<PixelFormat> {
    const FEATURE: &str = "PixelFormat";

    let entries = match camera.feature_range(FEATURE)? {
        FeatureRange::Enum(entries) => entries,
        _ => return Err(DeviceError::WrongType.on_feature(FEATURE))
    };
    let writable: Vec<PixelFormat> = entries.iter()
        .filter_map(|e| e.parse().ok())
        .filter(|f| is_writable(*f))
        .collect();

    let current = camera.get_feature_enum(FEATURE)?.parse::<PixelFormat>().ok();
    if let Some(format) = current.filter(|f| is_writable(*f) && is_colour(*f)) {
        return Ok(format)
    }

    let chosen = writable.iter().copied().find(|f| is_colour(*f))
        .or_else(|| writable.first().copied())
        .ok_or(Error::NoWritableFormat)?;

    if current != Some(chosen) {
        camera.set_feature_enum(FEATURE, chosen.name())?;
        debug!("pixel format set to {}", chosen.name());
    }

    Ok(chosen)
}



#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    Rgb8,
    /// Untouched frame data in the given pixel format code.
    Raw(u32)
}

impl Layout {
    /// Pixel format code of the data in this layout.
    pub fn code(&self) -> u32 {
        match self {
            Layout::Rgb8 => PixelFormat::Rgb8.code(),
            Layout::Raw(code) => *code
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Image<'a> {
    pub width: u32,
    pub height: u32,
    pub layout: Layout,
    pub data: Cow<'a, [u8]>
}

impl<'a> Image<'a> {
    pub fn is_converted(&self) -> bool {
        matches!(self.data, Cow::Owned(_))
    }
}

/// Apply the known conversion for the frame's pixel format, if any.
pub fn to_image<'a>(frame: &Frame<'a>) -> Image<'a> {
    let conversion = frame.format().and_then(conversion_for);
    let (w, h) = (frame.width, frame.height);

    match conversion {
        Some(Conversion::BayerToRgb(pattern)) if frame.data.len() >= (w * h) as usize => Image {
            width: w,
            height: h,
            layout: Layout::Rgb8,
            data: Cow::Owned(demosaic(frame.data, w as usize, h as usize, pattern))
        },
        Some(Conversion::BgrToRgb) if frame.data.len() >= (w * h * 3) as usize => {
            let mut rgb = frame.data[..(w * h * 3) as usize].to_vec();
            rgb.chunks_exact_mut(3).for_each(|px| px.swap(0, 2));

            Image { width: w, height: h, layout: Layout::Rgb8, data: Cow::Owned(rgb) }
        },
        _ => Image {
            width: w,
            height: h,
            layout: Layout::Raw(frame.pixel_format),
            data: Cow::Borrowed(frame.data)
        }
    }
}

// Every pixel takes the red and blue sample of its 2x2 cell and the mean of
// the cell's two greens. Cells on an odd right/bottom edge are clamped.
fn demosaic(raw: &[u8], width: usize, height: usize, pattern: [Channel; 4]) -> Vec<u8> {
    let mut out = vec![0u8; width * height * 3];

    for cy in (0..height).step_by(2) {
        for cx in (0..width).step_by(2) {
            let (mut r, mut g, mut b) = (0u16, 0u16, 0u16);

            for (i, channel) in pattern.iter().enumerate() {
                let x = (cx + (i & 1)).min(width - 1);
                let y = (cy + (i >> 1)).min(height - 1);
                let v = raw[y * width + x] as u16;

                match channel {
                    Channel::R => r = v,
                    Channel::G => g += v,
                    Channel::B => b = v
                }
            }

            let px = [r as u8, (g / 2) as u8, b as u8];

            for y in cy..(cy + 2).min(height) {
                for x in cx..(cx + 2).min(width) {
                    let at = (y * width + x) * 3;
                    out[at..at + 3].copy_from_slice(&px);
                }
            }
        }
    }

    out
}



#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{AccessMode, Driver};
    use crate::frame::FrameStatus;
    use crate::sim::{SimCameraSpec, SimDriver};

    fn camera(current: PixelFormat, offered: Vec<PixelFormat>) -> crate::sim::SimCamera {
        let spec = SimCameraSpec::new("F").with_format(current).with_formats(offered);
        SimDriver::new(vec![spec]).open_camera("F", AccessMode::FULL).unwrap()
    }

    fn frame(format: PixelFormat, width: u32, height: u32, data: &[u8]) -> Frame<'_> {
        Frame {
            status: FrameStatus::Complete,
            pixel_format: format.code(),
            width,
            height,
            frame_id: 0,
            timestamp: 0,
            data
        }
    }

    #[test]
    fn bayer_rg8_is_demosaiced() {
        let raw = [10, 20, 30, 40];
        let image = to_image(&frame(PixelFormat::BayerRG8, 2, 2, &raw));

        assert_eq!(image.layout, Layout::Rgb8);
        assert!(image.is_converted());
        assert_eq!(image.data.len(), 12);

        for px in image.data.chunks_exact(3) {
            assert_eq!(px, [10, 25, 40]);
        }
    }

    #[test]
    fn bayer_bg8_swaps_red_and_blue() {
        let raw = [10, 20, 30, 40];
        let image = to_image(&frame(PixelFormat::BayerBG8, 2, 2, &raw));

        assert_eq!(&image.data[..3], &[40, 25, 10]);
    }

    #[test]
    fn odd_sized_mosaic_is_clamped() {
        let raw = [1u8; 9];
        let image = to_image(&frame(PixelFormat::BayerGR8, 3, 3, &raw));

        assert_eq!(image.data.len(), 27);
        assert!(image.data.chunks_exact(3).all(|px| px == [1, 1, 1]));
    }

    #[test]
    fn mono8_passes_through() {
        let raw = [1, 2, 3, 4];
        let image = to_image(&frame(PixelFormat::Mono8, 2, 2, &raw));

        assert_eq!(image.layout, Layout::Raw(PixelFormat::Mono8.code()));
        assert!(!image.is_converted());
        assert_eq!(&*image.data, &raw);
    }

    #[test]
    fn unknown_code_passes_through() {
        let raw = [7u8; 4];
        let f = Frame { pixel_format: 0x0BAD_F00D, ..frame(PixelFormat::Mono8, 2, 2, &raw) };
        let image = to_image(&f);

        assert_eq!(image.layout, Layout::Raw(0x0BAD_F00D));
        assert_eq!(&*image.data, &raw);
    }

    #[test]
    fn bgr8_becomes_rgb8() {
        let raw = [1, 2, 3];
        let image = to_image(&frame(PixelFormat::Bgr8, 1, 1, &raw));

        assert_eq!(image.layout, Layout::Rgb8);
        assert_eq!(&*image.data, &[3, 2, 1]);
    }

    #[test]
    fn colour_format_is_preferred_over_mono() {
        let cam = camera(PixelFormat::Mono16, vec![PixelFormat::Mono8, PixelFormat::BayerGR12, PixelFormat::BayerRG8]);

        assert_eq!(select_pixel_format(&cam).unwrap(), PixelFormat::BayerRG8);
        assert_eq!(cam.get_feature_enum("PixelFormat").unwrap(), "BayerRG8");
    }

    #[test]
    fn writable_colour_format_is_kept() {
        let cam = camera(PixelFormat::Bgr8, vec![PixelFormat::Rgb8, PixelFormat::Bgr8]);

        assert_eq!(select_pixel_format(&cam).unwrap(), PixelFormat::Bgr8);
    }

    #[test]
    fn mono_is_the_fallback() {
        let cam = camera(PixelFormat::Mono12, vec![PixelFormat::Mono16, PixelFormat::Mono8]);

        assert_eq!(select_pixel_format(&cam).unwrap(), PixelFormat::Mono8);
    }

    #[test]
    fn no_writable_format_is_an_error() {
        let cam = camera(PixelFormat::Mono16, vec![PixelFormat::Mono12, PixelFormat::BayerRG12]);

        assert!(matches!(select_pixel_format(&cam), Err(Error::NoWritableFormat)));
        assert_eq!(cam.get_feature_enum("PixelFormat").unwrap(), "Mono16");
    }
}
