use crate::convert::{Image, Layout};
use crate::format::PixelFormat;
use crate::{Error, Result};
use chrono::{DateTime, Local};
use image::{imageops, ColorType, GrayImage, ImageFormat, RgbImage};
use std::path::{Path, PathBuf};
use tracing::debug;



pub const DEFAULT_LIVE_VIEW: (u32, u32) = (520, 400);



#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkKind {
    /// Live view; has no natural end, so it cannot drive a frame limit.
    Display,
    Export
}

/// Consumer of converted frames. `counter` is the running count of frames
/// written so far in the session, starting at 1.
pub trait FrameSink: Send {
    fn kind(&self) -> SinkKind;
    fn consume(&mut self, image: &Image<'_>, counter: u64) -> Result<()>;
}



#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Naming {
    Timestamp,
    Counter
}

pub fn timestamp_filename(at: DateTime<Local>) -> String {
    at.format("%Y-%m-%d_%Hh%Mm%Ss%6fus.jpg").to_string()
}

pub fn counter_filename(counter: u64) -> String {
    format!("{counter}.jpg")
}

/// Encode an image as JPEG at `path`.
pub fn write_jpeg(image: &Image<'_>, path: &Path) -> Result<()> {
    let color = match image.layout {
        Layout::Rgb8 => ColorType::Rgb8,
        Layout::Raw(code) => match PixelFormat::from_code(code) {
            Some(PixelFormat::Mono8) => ColorType::L8,
            Some(PixelFormat::Rgb8) => ColorType::Rgb8,
            _ => return Err(Error::UnsupportedFormat(code))
        }
    };

    let len = image.width as usize * image.height as usize * color.bytes_per_pixel() as usize;
    let data = image.data.get(..len).ok_or(Error::UnsupportedFormat(image.layout.code()))?;

    image::save_buffer_with_format(path, data, image.width, image.height, color, ImageFormat::Jpeg)?;
    debug!("wrote {}", path.display());

    Ok(())
}



/// Writes every frame as a JPEG file under a directory.
#[derive(Debug, Clone)]
pub struct ExportSink {
    dir: PathBuf,
    naming: Naming
}

impl ExportSink {
    pub fn new(dir: impl Into<PathBuf>, naming: Naming) -> Result<Self> {
        let dir = dir.into();

        if !dir.is_dir() {
            return Err(Error::config(format!("output path {} is not a directory", dir.display())))
        }

        Ok(Self { dir, naming })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn filename(&self, counter: u64) -> String {
        match self.naming {
            Naming::Timestamp => timestamp_filename(Local::now()),
            Naming::Counter => counter_filename(counter)
        }
    }
}

impl FrameSink for ExportSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Export
    }

    fn consume(&mut self, image: &Image<'_>, counter: u64) -> Result<()> {
        write_jpeg(image, &self.dir.join(self.filename(counter)))
    }
}



pub trait Viewer: Send + FnMut(&RgbImage) {}

impl<T> Viewer for T where T: Send + FnMut(&RgbImage) {}

/// Resizes frames to the live-view size and hands them to a viewer.
pub struct DisplaySink {
    width: u32,
    height: u32,
    viewer: Box<dyn Viewer>
}

impl DisplaySink {
    pub fn new<V: Viewer + 'static>(viewer: V) -> Self {
        Self::with_size(DEFAULT_LIVE_VIEW.0, DEFAULT_LIVE_VIEW.1, viewer)
    }

    pub fn with_size<V: Viewer + 'static>(width: u32, height: u32, viewer: V) -> Self {
        Self::from_boxed(width, height, Box::new(viewer))
    }

    pub fn from_boxed(width: u32, height: u32, viewer: Box<dyn Viewer>) -> Self {
        Self { width, height, viewer }
    }
}

impl FrameSink for DisplaySink {
    fn kind(&self) -> SinkKind {
        SinkKind::Display
    }

    fn consume(&mut self, image: &Image<'_>, _counter: u64) -> Result<()> {
        let rgb = to_rgb(image)?;
        let resized = imageops::resize(&rgb, self.width, self.height, imageops::FilterType::Triangle);

        (self.viewer)(&resized);

        Ok(())
    }
}

fn to_rgb(image: &Image<'_>) -> Result<RgbImage> {
    let (w, h) = (image.width, image.height);
    let code = image.layout.code();
    let rgb = match PixelFormat::from_code(code) {
        Some(PixelFormat::Rgb8) => RgbImage::from_raw(w, h, image.data.to_vec()),
        Some(PixelFormat::Mono8) => GrayImage::from_raw(w, h, image.data.to_vec())
            .map(|gray| image::DynamicImage::ImageLuma8(gray).to_rgb8()),
        _ => None
    };

    rgb.ok_or(Error::UnsupportedFormat(code))
}



#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::borrow::Cow;
    use std::sync::{Arc, Mutex};

    fn mono(width: u32, height: u32) -> Image<'static> {
        Image {
            width,
            height,
            layout: Layout::Raw(PixelFormat::Mono8.code()),
            data: Cow::Owned(vec![128; (width * height) as usize])
        }
    }

    #[test]
    fn timestamp_names_carry_microseconds() {
        let at = Local.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap()
            + chrono::Duration::microseconds(89);

        assert_eq!(timestamp_filename(at), "2021-03-04_05h06m07s000089us.jpg");
    }

    #[test]
    fn counter_names_are_plain() {
        assert_eq!(counter_filename(1), "1.jpg");
        assert_eq!(counter_filename(120), "120.jpg");
    }

    #[test]
    fn export_requires_existing_directory() {
        let err = ExportSink::new("/definitely/not/here", Naming::Counter).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn export_with_counter_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ExportSink::new(dir.path(), Naming::Counter).unwrap();

        sink.consume(&mono(8, 8), 7).unwrap();

        assert!(dir.path().join("7.jpg").is_file());
    }

    #[test]
    fn unsupported_raw_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let image = Image {
            width: 2,
            height: 2,
            layout: Layout::Raw(PixelFormat::Mono16.code()),
            data: Cow::Owned(vec![0; 8])
        };

        let err = write_jpeg(&image, &dir.path().join("x.jpg")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn display_resizes_to_live_view() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut sink = {
            let seen = seen.clone();
            DisplaySink::with_size(32, 16, move |img: &RgbImage| {
                seen.lock().unwrap().push(img.dimensions());
            })
        };

        sink.consume(&mono(64, 64), 1).unwrap();

        assert_eq!(sink.kind(), SinkKind::Display);
        assert_eq!(*seen.lock().unwrap(), vec![(32, 16)]);
    }
}
