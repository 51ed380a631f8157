//! One-call helpers around a single camera.
//!
//! Every method opens the camera, does its work and closes it again, so a
//! [`CameraInstance`] holds no device resources between calls.

use crate::camera::{AcquisitionMode, CameraControl, Driver, OpenCamera};
use crate::convert;
use crate::feature::{FeatureRange, FeatureValue, HasFeatures};
use crate::session::{StreamConfig, StreamSession, StreamSummary};
use crate::sink::{self, DisplaySink, ExportSink, Naming, Viewer, DEFAULT_LIVE_VIEW};
use crate::{Error, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};



pub const SINGLE_FRAME_TIMEOUT: Duration = Duration::from_millis(2000);

/// How streamed frames are handled.
pub enum Callback {
    /// Resize to the live-view size and hand to the viewer.
    Display(Box<dyn Viewer>),
    /// Write timestamp-named JPEGs.
    Export,
    /// Write `1.jpg`, `2.jpg`, ...
    ExportWithCounter
}

impl Callback {
    pub fn display<V: Viewer + 'static>(viewer: V) -> Self {
        Callback::Display(Box::new(viewer))
    }
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Callback::Display(_) => f.write_str("Display"),
            Callback::Export => f.write_str("Export"),
            Callback::ExportWithCounter => f.write_str("ExportWithCounter")
        }
    }
}



pub struct CameraInstance<'d, D: Driver> {
    driver: &'d D,
    camera_id: String,
    path: PathBuf,
    live_view: (u32, u32)
}

impl<'d, D: Driver> CameraInstance<'d, D> {
    /// Live view defaults to 520x400 and files go to the working directory.
    pub fn new(driver: &'d D, camera_id: &str) -> Self {
        let path = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        Self { driver, camera_id: camera_id.to_string(), path, live_view: DEFAULT_LIVE_VIEW }
    }

    pub fn with_live_view(mut self, width: u32, height: u32) -> Self {
        self.live_view = (width, height);
        self
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn live_view(&self) -> (u32, u32) {
        self.live_view
    }

    fn open(&self) -> Result<OpenCamera<D::Camera>> {
        OpenCamera::open(self.driver, &self.camera_id)
    }

    pub fn list_features(&self) -> Result<Vec<String>> {
        let camera = self.open()?;
        let names = camera.camera().list_features()?.into_iter().map(|f| f.name).collect();

        camera.release()?;

        Ok(names)
    }

    /// Current value and valid range of a feature.
    pub fn feature_info(&self, name: &str) -> Result<(FeatureValue, FeatureRange)> {
        let camera = self.open()?;
        let value = camera.camera().get_feature(name)?;
        let range = camera.camera().feature_range(name)?;

        camera.release()?;

        Ok((value, range))
    }

    pub fn set_feature(&self, name: &str, value: FeatureValue, verbose: bool) -> Result<()> {
        self.set_features(&[(name.to_string(), value)], verbose)
    }

    /// Set features in order, stopping at the first failure.
    pub fn set_features(&self, features: &[(String, FeatureValue)], verbose: bool) -> Result<()> {
        let camera = self.open()?;
        apply_features(camera.camera(), features, verbose)?;

        camera.release()
    }

    /// Capture one frame and write it as a JPEG. The camera is switched to a
    /// writable pixel format after `features` are set.
    ///
    /// The file goes to `path`, or the instance path when that is `None`,
    /// and is named `filename`, or after the current local time. Returns the
    /// path of the written file.
    pub fn acquire_frame(
        &self,
        features: &[(String, FeatureValue)],
        path: Option<&Path>,
        filename: Option<&str>
    ) -> Result<PathBuf> {
        let mut camera = self.open()?;

        apply_features(camera.camera(), features, false)?;
        convert::select_pixel_format(camera.camera())?;
        camera.arm(AcquisitionMode::SingleFrame, 1, None)?;

        let frame = camera.camera_mut().acquire_frame(SINGLE_FRAME_TIMEOUT)?;
        debug!("{}: got frame {} ({:?})", self.camera_id, frame.frame_id, frame.status);

        if !frame.as_frame().is_complete() {
            return Err(Error::IncompleteFrame { frame_id: frame.frame_id })
        }

        let image = convert::to_image(&frame.as_frame());
        let filename = match filename {
            Some(name) => name.to_string(),
            None => sink::timestamp_filename(Local::now())
        };
        let target = path.unwrap_or(self.path.as_path()).join(filename);

        sink::write_jpeg(&image, &target)?;
        camera.release()?;

        info!("{}: saved frame to {}", self.camera_id, target.display());

        Ok(target)
    }

    /// Stream with the given callback. Exported files go to
    /// `config.output_path`. The camera is switched to a writable pixel
    /// format after the feature overrides.
    pub fn stream(&self, config: &StreamConfig, callback: Callback) -> Result<StreamSummary> {
        let mut session = StreamSession::new(self.driver, &self.camera_id);
        let config = config.clone().select_pixel_format();
        let dir = &config.output_path;

        match callback {
            Callback::Display(viewer) => {
                let (w, h) = self.live_view;
                session.run(&config, DisplaySink::from_boxed(w, h, viewer))
            },
            Callback::Export => session.run(&config, ExportSink::new(dir, Naming::Timestamp)?),
            Callback::ExportWithCounter => session.run(&config, ExportSink::new(dir, Naming::Counter)?)
        }
    }

    /// Stream settings pre-filled with this instance's output path.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig::default().output_path(&self.path)
    }
}

fn apply_features<C: HasFeatures>(camera: &C, features: &[(String, FeatureValue)], verbose: bool) -> Result<()> {
    for (name, value) in features {
        if verbose {
            let initial = camera.get_feature(name)?;
            camera.apply_feature(name, value.clone())?;
            info!("{name} is now {value}, was {initial}");
        } else {
            camera.apply_feature(name, value.clone())?;
        }
    }

    Ok(())
}
