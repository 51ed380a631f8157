//! Continuous acquisition under a single stop policy.
//!
//! A [`StreamSession`] opens its camera, applies feature overrides, arms
//! continuous acquisition and then either sleeps for a fixed duration or
//! blocks until the frame callback has seen enough frames. However the run
//! ends, the camera is disarmed and closed exactly once.

use crate::camera::{AcquisitionMode, CameraControl, Driver, OpenCamera};
use crate::convert;
use crate::feature::{FeatureValue, HasFeatures};
use crate::frame::Frame;
use crate::latch::Latch;
use crate::sink::{FrameSink, SinkKind};
use crate::{Error, Flow, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};



/// Acquisition has to quiesce before the camera can be disarmed.
pub const SETTLE_DELAY: Duration = Duration::from_millis(10);

pub const DEFAULT_BUFFER_DEPTH: usize = 10;



#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    pub duration: Option<Duration>,
    pub frame_limit: Option<u64>,
    pub buffer_depth: usize,
    pub output_path: PathBuf,
    /// Applied in order, before the camera is armed.
    pub feature_overrides: Vec<(String, FeatureValue)>,
    /// After the overrides, switch the camera to a pixel format that can be
    /// written as an image.
    pub select_pixel_format: bool
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            duration: None,
            frame_limit: None,
            buffer_depth: DEFAULT_BUFFER_DEPTH,
            output_path: PathBuf::from("."),
            feature_overrides: Vec::new(),
            select_pixel_format: false
        }
    }
}

impl StreamConfig {
    pub fn for_duration(duration: Duration) -> Self {
        Self { duration: Some(duration), ..Self::default() }
    }

    pub fn for_frames(frame_limit: u64) -> Self {
        Self { frame_limit: Some(frame_limit), ..Self::default() }
    }

    pub fn buffer_depth(mut self, depth: usize) -> Self {
        self.buffer_depth = depth;
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn feature(mut self, name: &str, value: FeatureValue) -> Self {
        self.feature_overrides.push((name.to_string(), value));
        self
    }

    pub fn select_pixel_format(mut self) -> Self {
        self.select_pixel_format = true;
        self
    }

    /// Check the config and return the stop policy it describes.
    pub fn stop_policy(&self) -> Result<StopPolicy> {
        if self.buffer_depth == 0 {
            return Err(Error::config("buffer depth must be at least 1"))
        }

        match (self.duration, self.frame_limit) {
            (Some(d), None) if d.is_zero() => Err(Error::config("duration must be positive")),
            (Some(d), None) => Ok(StopPolicy::Duration(d)),
            (None, Some(0)) => Err(Error::config("frame limit must be positive")),
            (None, Some(n)) => Ok(StopPolicy::FrameLimit(n)),
            (Some(_), Some(_)) => Err(Error::config("set either a duration or a frame limit, not both")),
            (None, None) => Err(Error::config("set either a duration or a frame limit"))
        }
    }
}



#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopPolicy {
    Duration(Duration),
    FrameLimit(u64)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Configuring,
    Armed,
    Acquiring,
    Stopping,
    Closed
}



/// State shared between the controlling thread and the frame callback for
/// one run.
#[derive(Debug)]
pub struct StreamState {
    counter: AtomicU64,
    delivered: AtomicU64,
    incomplete: AtomicU64,
    failed: AtomicU64,
    latch: Latch
}

impl StreamState {
    fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
            delivered: AtomicU64::new(0),
            incomplete: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            latch: Latch::new()
        }
    }

    pub fn counter(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    pub fn latch(&self) -> &Latch {
        &self.latch
    }

    fn summary(&self) -> StreamSummary {
        StreamSummary {
            delivered: self.delivered.load(Ordering::Acquire),
            written: self.counter() - 1,
            incomplete: self.incomplete.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            limit_reached: self.latch.is_set()
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Callback invocations, including the one that tripped the limit.
    pub delivered: u64,
    pub written: u64,
    pub incomplete: u64,
    pub failed: u64,
    pub limit_reached: bool
}



/// Per-frame work: drop incomplete frames, convert, hand to the sink.
fn handle_frame<S: FrameSink>(
    frame: &Frame<'_>,
    sink: &mut S,
    state: &StreamState,
    frame_limit: Option<u64>
) -> Flow {
    state.delivered.fetch_add(1, Ordering::AcqRel);

    let counter = state.counter();

    if let Some(limit) = frame_limit {
        if counter > limit {
            if state.latch.set() {
                debug!("frame limit of {limit} reached");
            }
            return Flow::Break
        }
    }

    if !frame.is_complete() {
        state.incomplete.fetch_add(1, Ordering::AcqRel);
        warn!("frame {} was incomplete ({:?})", frame.frame_id, frame.status);
        return Flow::Continue
    }

    let image = convert::to_image(frame);

    match sink.consume(&image, counter) {
        Ok(()) => { state.counter.fetch_add(1, Ordering::AcqRel); },
        Err(e) => {
            state.failed.fetch_add(1, Ordering::AcqRel);
            error!("could not process frame {}: {e}", frame.frame_id);
        }
    }

    Flow::Continue
}



pub struct StreamSession<'d, D: Driver> {
    driver: &'d D,
    camera_id: String,
    state: SessionState
}

impl<'d, D: Driver> StreamSession<'d, D> {
    pub fn new(driver: &'d D, camera_id: &str) -> Self {
        Self { driver, camera_id: camera_id.to_string(), state: SessionState::Idle }
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!("{}: {:?} -> {:?}", self.camera_id, self.state, next);
        self.state = next;
    }

    /// Stream frames into `sink` until the configured stop condition.
    pub fn run<S>(&mut self, config: &StreamConfig, sink: S) -> Result<StreamSummary>
    where S: FrameSink + 'static {
        self.transition(SessionState::Configuring);

        let policy = match Self::validate(config, &sink) {
            Ok(policy) => policy,
            Err(e) => {
                self.transition(SessionState::Idle);
                return Err(e)
            }
        };

        info!("{}: streaming with {:?}, {} buffers", self.camera_id, policy, config.buffer_depth);

        let state = Arc::new(StreamState::new());
        let mut camera = match OpenCamera::open(self.driver, &self.camera_id) {
            Ok(camera) => camera,
            Err(e) => {
                self.transition(SessionState::Closed);
                return Err(e)
            }
        };

        let res = self.acquire(&mut camera, config, policy, sink, &state);

        self.transition(SessionState::Stopping);
        thread::sleep(SETTLE_DELAY);

        let released = camera.release();
        self.transition(SessionState::Closed);

        res.and(released)?;

        let summary = state.summary();
        info!("{}: wrote {} frames ({} delivered, {} incomplete, {} failed)", self.camera_id,
              summary.written, summary.delivered, summary.incomplete, summary.failed);

        Ok(summary)
    }

    fn validate<S: FrameSink>(config: &StreamConfig, sink: &S) -> Result<StopPolicy> {
        let policy = config.stop_policy()?;

        if matches!(policy, StopPolicy::FrameLimit(_)) && sink.kind() == SinkKind::Display {
            return Err(Error::config("a display sink cannot be used with a frame limit"))
        }

        Ok(policy)
    }

    fn acquire<S>(
        &mut self,
        camera: &mut OpenCamera<D::Camera>,
        config: &StreamConfig,
        policy: StopPolicy,
        mut sink: S,
        state: &Arc<StreamState>
    ) -> Result<()>
    where S: FrameSink + 'static {
        for (name, value) in &config.feature_overrides {
            camera.camera().apply_feature(name, value.clone())?;
        }

        if config.select_pixel_format {
            convert::select_pixel_format(camera.camera())?;
        }

        let frame_limit = match policy {
            StopPolicy::FrameLimit(n) => Some(n),
            StopPolicy::Duration(_) => None
        };
        let callback = {
            let state = state.clone();
            move |frame: &Frame<'_>| handle_frame(frame, &mut sink, &state, frame_limit)
        };

        camera.arm(AcquisitionMode::Continuous, config.buffer_depth, Some(Box::new(callback)))?;
        self.transition(SessionState::Armed);

        camera.camera_mut().start_acquisition()?;
        self.transition(SessionState::Acquiring);

        match policy {
            StopPolicy::Duration(d) => thread::sleep(d),
            StopPolicy::FrameLimit(_) => state.latch.wait()
        }

        camera.camera_mut().stop_acquisition()
    }
}



#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_one_stop_condition() {
        assert!(matches!(StreamConfig::default().stop_policy(), Err(Error::Config(_))));

        let both = StreamConfig { frame_limit: Some(3), ..StreamConfig::for_duration(Duration::from_secs(5)) };
        assert!(matches!(both.stop_policy(), Err(Error::Config(_))));

        assert_eq!(StreamConfig::for_frames(3).stop_policy().unwrap(), StopPolicy::FrameLimit(3));
        assert_eq!(
            StreamConfig::for_duration(Duration::from_secs(5)).stop_policy().unwrap(),
            StopPolicy::Duration(Duration::from_secs(5))
        );
    }

    #[test]
    fn zero_values_are_rejected() {
        assert!(StreamConfig::for_frames(0).stop_policy().is_err());
        assert!(StreamConfig::for_duration(Duration::ZERO).stop_policy().is_err());
        assert!(StreamConfig::for_frames(1).buffer_depth(0).stop_policy().is_err());
    }
}
