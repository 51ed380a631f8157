//! An in-process software camera implementing the SDK traits.
//!
//! Frames are delivered from a spawned thread, following an optional script
//! of frame statuses. Every SDK call is recorded in a shared [`CallLog`] and
//! individual calls can be made to fail through [`SimFaults`], which makes
//! this backend suitable both for tests and for trying the tools without
//! hardware.

use crate::camera::{AccessMode, AcquisitionMode, CameraControl, CameraInfo, Driver, FrameCallback};
use crate::error::DeviceError;
use crate::feature::*;
use crate::format::PixelFormat;
use crate::frame::{Frame, FrameStatus, OwnedFrame};
use crate::{Flow, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};



#[derive(Debug, Clone, PartialEq)]
pub enum SimCall {
    Open(String),
    SetFeature(String, FeatureValue),
    RunCommand(String),
    Arm(AcquisitionMode, usize),
    StartAcquisition,
    QueueFrame(u64),
    StopAcquisition,
    AcquireFrame,
    Disarm,
    Close
}

/// Every call made against a simulated driver and its cameras, in order.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<SimCall>>>);

impl CallLog {
    fn lock(&self) -> MutexGuard<'_, Vec<SimCall>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, call: SimCall) {
        self.lock().push(call);
    }

    pub fn calls(&self) -> Vec<SimCall> {
        self.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&SimCall) -> bool) -> usize {
        self.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}



/// Calls that should fail. A failing call is still recorded in the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimFaults {
    pub open: bool,
    pub arm: bool,
    pub start: bool,
    pub stop: bool,
    pub disarm: bool
}



#[derive(Debug, Clone)]
pub struct SimCameraSpec {
    pub info: CameraInfo,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    /// Entries of the `PixelFormat` feature, besides `pixel_format` itself.
    pub formats: Vec<PixelFormat>,
    pub frame_interval: Duration,
    /// Statuses of the frames to deliver; `None` delivers complete frames
    /// until acquisition stops.
    pub script: Option<Vec<FrameStatus>>
}

impl SimCameraSpec {
    pub fn new(id: &str) -> Self {
        Self {
            info: CameraInfo {
                id: id.to_string(),
                name: format!("Simulated camera {id}"),
                serial: format!("SIM-{id}"),
                model_name: "Simulated Mako".to_string(),
                interface_id: "sim0".to_string(),
                access_mode: AccessMode::FULL | AccessMode::READ | AccessMode::CONFIG
            },
            width: 64,
            height: 48,
            pixel_format: PixelFormat::Mono8,
            formats: vec![PixelFormat::Mono8, PixelFormat::BayerRG8, PixelFormat::BayerGR8,
                          PixelFormat::Rgb8, PixelFormat::Bgr8, PixelFormat::Mono16],
            frame_interval: Duration::from_millis(1),
            script: None
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    pub fn with_formats(mut self, formats: Vec<PixelFormat>) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn with_script(mut self, script: Vec<FrameStatus>) -> Self {
        self.script = Some(script);
        self
    }
}



type FeatureStore = Arc<Mutex<BTreeMap<String, SimFeature>>>;

pub struct SimDriver {
    // Feature values outlive a single open, as they do on a real device
    cameras: Vec<(SimCameraSpec, FeatureStore)>,
    faults: SimFaults,
    log: CallLog
}

impl SimDriver {
    pub const DEFAULT_ID: &'static str = "DEV_SIM0001";

    pub fn new(cameras: Vec<SimCameraSpec>) -> Self {
        let cameras = cameras.into_iter()
            .map(|spec| {
                let features = Arc::new(Mutex::new(default_features(&spec)));
                (spec, features)
            })
            .collect();

        Self { cameras, faults: SimFaults::default(), log: CallLog::default() }
    }

    /// One endless Mono8 camera with id [`SimDriver::DEFAULT_ID`].
    pub fn single() -> Self {
        Self::new(vec![SimCameraSpec::new(Self::DEFAULT_ID)])
    }

    pub fn with_faults(mut self, faults: SimFaults) -> Self {
        self.faults = faults;
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl Driver for SimDriver {
    type Camera = SimCamera;

    fn version(&self) -> Result<String> {
        Ok(format!("sim-{}", env!("CARGO_PKG_VERSION")))
    }

    fn list_cameras(&self) -> Result<Vec<CameraInfo>> {
        Ok(self.cameras.iter().map(|(spec, _)| spec.info.clone()).collect())
    }

    fn open_camera(&self, id: &str, _access_mode: AccessMode) -> Result<SimCamera> {
        self.log.push(SimCall::Open(id.to_string()));

        if self.faults.open {
            return Err(DeviceError::InvalidAccess.during("open camera"))
        }

        let (spec, features) = self.cameras.iter()
            .find(|(spec, _)| spec.info.id == id)
            .ok_or(DeviceError::NotFound.during("open camera"))?;

        Ok(SimCamera::new(spec.clone(), features.clone(), self.faults, self.log.clone()))
    }
}



#[derive(Debug, Clone)]
struct SimFeature {
    value: Option<FeatureValue>,
    range: FeatureRange,
    data_type: FeatureType,
    flags: FeatureFlag
}

impl SimFeature {
    fn rw(value: FeatureValue, range: FeatureRange) -> Self {
        let data_type = value.feature_type();
        Self { value: Some(value), range, data_type, flags: FeatureFlag::READ | FeatureFlag::WRITE }
    }

    fn ro(value: FeatureValue) -> Self {
        let data_type = value.feature_type();
        Self { value: Some(value), range: FeatureRange::None, data_type, flags: FeatureFlag::READ }
    }

    fn command() -> Self {
        Self {
            value: None,
            range: FeatureRange::None,
            data_type: FeatureType::Command,
            flags: FeatureFlag::WRITE
        }
    }
}

fn enum_range(entries: &[&str]) -> FeatureRange {
    FeatureRange::Enum(entries.iter().map(|e| e.to_string()).collect())
}

fn default_features(spec: &SimCameraSpec) -> BTreeMap<String, SimFeature> {
    use FeatureValue::*;

    let mut format_names: Vec<&str> = spec.formats.iter()
        .chain([&spec.pixel_format])
        .map(|f| f.name())
        .collect();
    format_names.sort_unstable();
    format_names.dedup();

    BTreeMap::from([
        ("AcquisitionMode".to_string(), SimFeature::rw(
            Enum("Continuous".into()), enum_range(&["SingleFrame", "MultiFrame", "Continuous"]))),
        ("AcquisitionFrameRate".to_string(), SimFeature::rw(
            Float(30.0), FeatureRange::Float { min: 1.0, max: 200.0 })),
        ("AcquisitionStart".to_string(), SimFeature::command()),
        ("AcquisitionStop".to_string(), SimFeature::command()),
        ("BlackLevel".to_string(), SimFeature::rw(
            Float(0.0), FeatureRange::Float { min: 0.0, max: 10.0 })),
        ("DeviceModelName".to_string(), SimFeature::ro(String(spec.info.model_name.clone()))),
        ("ExposureAuto".to_string(), SimFeature::rw(
            Enum("Continuous".into()), enum_range(&["Off", "Once", "Continuous"]))),
        ("ExposureTime".to_string(), SimFeature::rw(
            Float(5000.0), FeatureRange::Float { min: 10.0, max: 1_000_000.0 })),
        ("Gain".to_string(), SimFeature::rw(
            Float(0.0), FeatureRange::Float { min: 0.0, max: 24.0 })),
        ("Height".to_string(), SimFeature::rw(
            Int(spec.height as i64), FeatureRange::Int { min: 1, max: 4096, increment: 1 })),
        ("PayloadSize".to_string(), SimFeature::ro(Int(0))),
        ("PixelFormat".to_string(), SimFeature::rw(
            Enum(spec.pixel_format.name().into()), enum_range(&format_names))),
        ("Width".to_string(), SimFeature::rw(
            Int(spec.width as i64), FeatureRange::Int { min: 1, max: 4096, increment: 1 })),
    ])
}



struct Delivery {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Box<dyn FrameCallback>>
}

/// Geometry of the frames a camera produces with its current settings.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    width: u32,
    height: u32,
    format: PixelFormat
}

impl Geometry {
    fn payload_size(&self) -> usize {
        self.format.buffer_len(self.width, self.height)
    }
}

pub struct SimCamera {
    spec: SimCameraSpec,
    features: FeatureStore,
    faults: SimFaults,
    log: CallLog,
    armed: Option<AcquisitionMode>,
    buffer_depth: usize,
    callback: Option<Box<dyn FrameCallback>>,
    delivery: Option<Delivery>,
    single_shots: usize
}

impl SimCamera {
    fn new(spec: SimCameraSpec, features: FeatureStore, faults: SimFaults, log: CallLog) -> Self {
        Self {
            spec,
            features,
            faults,
            log,
            armed: None,
            buffer_depth: 0,
            callback: None,
            delivery: None,
            single_shots: 0
        }
    }

    fn features(&self) -> MutexGuard<'_, BTreeMap<String, SimFeature>> {
        self.features.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn geometry(&self) -> Result<Geometry> {
        let format = self.get_feature_enum("PixelFormat")?;

        Ok(Geometry {
            width: self.get_feature_int("Width")? as u32,
            height: self.get_feature_int("Height")? as u32,
            format: format.parse().map_err(|_| DeviceError::InvalidValue.on_feature("PixelFormat"))?
        })
    }

    /// Stop the delivery thread, if any, and keep its callback for a restart.
    fn halt_delivery(&mut self) {
        if let Some(delivery) = self.delivery.take() {
            delivery.stop.store(true, Ordering::Release);

            match delivery.handle.join() {
                Ok(callback) => self.callback = Some(callback),
                Err(_) => debug!("delivery thread of {} panicked", self.spec.info.id)
            }
        }
    }
}

fn fill_pattern(buffer: &mut [u8], frame_id: u64) {
    for (i, b) in buffer.iter_mut().enumerate() {
        *b = (i as u64).wrapping_add(frame_id) as u8;
    }
}

fn deliver(
    mut callback: Box<dyn FrameCallback>,
    geometry: Geometry,
    depth: usize,
    interval: Duration,
    script: Option<Vec<FrameStatus>>,
    stop: Arc<AtomicBool>,
    log: CallLog
) -> Box<dyn FrameCallback> {
    let started = Instant::now();
    let mut buffers = vec![vec![0u8; geometry.payload_size()]; depth];
    let mut script = script.map(|s| s.into_iter());

    for frame_id in 0u64.. {
        if stop.load(Ordering::Acquire) { break }

        let status = match script.as_mut() {
            Some(statuses) => match statuses.next() {
                Some(status) => status,
                None => break
            },
            None => FrameStatus::Complete
        };

        let buffer = &mut buffers[frame_id as usize % depth];
        fill_pattern(buffer, frame_id);

        let frame = Frame {
            status,
            pixel_format: geometry.format.code(),
            width: geometry.width,
            height: geometry.height,
            frame_id,
            timestamp: started.elapsed().as_nanos() as u64,
            data: buffer.as_slice()
        };

        let flow = callback(&frame);

        // The buffer goes back to the queue whatever the callback decided
        log.push(SimCall::QueueFrame(frame_id));

        if flow == Flow::Break { break }

        thread::sleep(interval);
    }

    callback
}

impl HasFeatures for SimCamera {
    fn list_features(&self) -> Result<Vec<FeatureInfo>> {
        Ok(self.features().iter()
            .map(|(name, f)| FeatureInfo { name: name.clone(), data_type: f.data_type, flags: f.flags })
            .collect())
    }

    fn feature_info(&self, name: &str) -> Result<FeatureInfo> {
        let features = self.features();
        let f = features.get(name).ok_or(DeviceError::NotFound.on_feature(name))?;

        Ok(FeatureInfo { name: name.to_string(), data_type: f.data_type, flags: f.flags })
    }

    fn get_feature(&self, name: &str) -> Result<FeatureValue> {
        if name == "PayloadSize" {
            let size = self.geometry()?.payload_size();
            return Ok(FeatureValue::Int(size as i64))
        }

        let features = self.features();
        let f = features.get(name).ok_or(DeviceError::NotFound.on_feature(name))?;

        f.value.clone().ok_or(DeviceError::WrongType.on_feature(name))
    }

    fn set_feature(&self, name: &str, value: FeatureValue) -> Result<()> {
        self.log.push(SimCall::SetFeature(name.to_string(), value.clone()));

        let mut features = self.features();
        let f = features.get_mut(name).ok_or(DeviceError::NotFound.on_feature(name))?;

        if !f.flags.contains(FeatureFlag::WRITE) || f.data_type == FeatureType::Command {
            return Err(DeviceError::InvalidAccess.on_feature(name))
        }
        if value.feature_type() != f.data_type {
            return Err(DeviceError::WrongType.on_feature(name))
        }
        if !f.range.contains(&value) {
            return Err(DeviceError::InvalidValue.on_feature(name))
        }

        f.value = Some(value);

        Ok(())
    }

    fn feature_range(&self, name: &str) -> Result<FeatureRange> {
        let features = self.features();
        let f = features.get(name).ok_or(DeviceError::NotFound.on_feature(name))?;

        Ok(f.range.clone())
    }

    fn run_command(&self, name: &str) -> Result<()> {
        self.log.push(SimCall::RunCommand(name.to_string()));

        match self.feature_info(name)?.data_type {
            FeatureType::Command => Ok(()),
            _ => Err(DeviceError::WrongType.on_feature(name))
        }
    }

    fn is_command_done(&self, name: &str) -> Result<bool> {
        self.feature_info(name).map(|_| true)
    }
}

impl CameraControl for SimCamera {
    fn id(&self) -> &str {
        &self.spec.info.id
    }

    fn arm(
        &mut self,
        mode: AcquisitionMode,
        buffer_depth: usize,
        callback: Option<Box<dyn FrameCallback>>
    ) -> Result<()> {
        self.log.push(SimCall::Arm(mode, buffer_depth));

        if self.faults.arm { return Err(DeviceError::IO.during("arm")) }
        if self.armed.is_some() { return Err(DeviceError::DeviceBusy.during("arm")) }
        if buffer_depth == 0 { return Err(DeviceError::BadParameter.during("arm")) }
        if mode == AcquisitionMode::Continuous && callback.is_none() {
            return Err(DeviceError::BadParameter.during("arm"))
        }

        self.set_feature_enum("AcquisitionMode", mode.feature_entry())?;
        self.armed = Some(mode);
        self.buffer_depth = buffer_depth;
        self.callback = callback;

        Ok(())
    }

    fn disarm(&mut self) -> Result<()> {
        self.log.push(SimCall::Disarm);
        self.halt_delivery();
        self.armed = None;
        self.callback = None;

        if self.faults.disarm { return Err(DeviceError::IO.during("disarm")) }

        Ok(())
    }

    fn start_acquisition(&mut self) -> Result<()> {
        self.log.push(SimCall::StartAcquisition);

        if self.faults.start { return Err(DeviceError::IO.during("start acquisition")) }
        if self.armed != Some(AcquisitionMode::Continuous) {
            return Err(DeviceError::NotArmed.during("start acquisition"))
        }
        if self.delivery.is_some() { return Err(DeviceError::DeviceBusy.during("start acquisition")) }

        let callback = self.callback.take().ok_or(DeviceError::InvalidCall.during("start acquisition"))?;
        let geometry = self.geometry()?;
        let stop = Arc::new(AtomicBool::new(false));
        let depth = self.buffer_depth;
        let interval = self.spec.frame_interval;
        let script = self.spec.script.clone();
        let log = self.log.clone();

        info!("{}: delivering {}x{} {} frames", self.spec.info.id,
              geometry.width, geometry.height, geometry.format.name());

        let handle = {
            let stop = stop.clone();
            thread::spawn(move || deliver(callback, geometry, depth, interval, script, stop, log))
        };

        self.delivery = Some(Delivery { stop, handle });

        Ok(())
    }

    fn stop_acquisition(&mut self) -> Result<()> {
        self.log.push(SimCall::StopAcquisition);

        if self.faults.stop { return Err(DeviceError::Timeout.during("stop acquisition")) }

        self.halt_delivery();

        Ok(())
    }

    fn acquire_frame(&mut self, _timeout: Duration) -> Result<OwnedFrame> {
        self.log.push(SimCall::AcquireFrame);

        if self.armed != Some(AcquisitionMode::SingleFrame) {
            return Err(DeviceError::NotArmed.during("acquire frame"))
        }

        let geometry = self.geometry()?;
        let status = self.spec.script.as_ref()
            .and_then(|script| script.get(self.single_shots).copied())
            .unwrap_or(FrameStatus::Complete);
        let frame_id = self.single_shots as u64;
        let mut data = vec![0u8; geometry.payload_size()];
        fill_pattern(&mut data, frame_id);

        self.single_shots += 1;

        Ok(OwnedFrame {
            status,
            pixel_format: geometry.format.code(),
            width: geometry.width,
            height: geometry.height,
            frame_id,
            timestamp: 0,
            data
        })
    }

    fn close(&mut self) -> Result<()> {
        self.log.push(SimCall::Close);
        self.halt_delivery();

        Ok(())
    }
}

impl Drop for SimCamera {
    fn drop(&mut self) {
        self.halt_delivery();
    }
}



#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn open(driver: &SimDriver) -> SimCamera {
        driver.open_camera(SimDriver::DEFAULT_ID, AccessMode::FULL).unwrap()
    }

    #[test]
    fn lists_configured_cameras() {
        let driver = SimDriver::new(vec![SimCameraSpec::new("A"), SimCameraSpec::new("B")]);
        let ids: Vec<String> = driver.list_cameras().unwrap().into_iter().map(|c| c.id).collect();

        assert_eq!(ids, ["A", "B"]);
    }

    #[test]
    fn unknown_camera_is_not_found() {
        let driver = SimDriver::single();
        let err = driver.open_camera("nope", AccessMode::FULL).err().unwrap();

        assert!(matches!(err, crate::Error::Device { source: DeviceError::NotFound, .. }));
    }

    #[test]
    fn feature_writes_are_validated() {
        let driver = SimDriver::single();
        let cam = open(&driver);

        cam.set_feature_float("ExposureTime", 2000.0).unwrap();
        assert_eq!(cam.get_feature_float("ExposureTime").unwrap(), 2000.0);

        let err = cam.set_feature_float("Gain", 99.0).unwrap_err();
        assert!(matches!(err, crate::Error::Feature { source: DeviceError::InvalidValue, .. }));

        let err = cam.set_feature_int("Nonexistent", 1).unwrap_err();
        assert!(matches!(err, crate::Error::Feature { source: DeviceError::NotFound, .. }));

        let err = cam.set_feature_int("PayloadSize", 1).unwrap_err();
        assert!(matches!(err, crate::Error::Feature { source: DeviceError::InvalidAccess, .. }));
    }

    #[test]
    fn settings_survive_reopening() {
        let driver = SimDriver::single();

        open(&driver).set_feature_float("Gain", 6.0).unwrap();
        assert_eq!(open(&driver).get_feature_float("Gain").unwrap(), 6.0);
    }

    #[test]
    fn payload_follows_geometry() {
        let driver = SimDriver::single();
        let cam = open(&driver);

        assert_eq!(cam.get_feature_int("PayloadSize").unwrap(), 64 * 48);

        cam.set_feature_enum("PixelFormat", "RGB8").unwrap();
        assert_eq!(cam.get_feature_int("PayloadSize").unwrap(), 64 * 48 * 3);
    }

    #[test]
    fn scripted_delivery_stops_at_end_of_script() {
        let spec = SimCameraSpec::new("S").with_script(vec![FrameStatus::Complete; 4]);
        let driver = SimDriver::new(vec![spec]);
        let mut cam = driver.open_camera("S", AccessMode::FULL).unwrap();
        let seen = Arc::new(AtomicUsize::new(0));

        let callback = {
            let seen = seen.clone();
            move |_: &Frame<'_>| {
                seen.fetch_add(1, Ordering::SeqCst);
                Flow::Continue
            }
        };

        cam.arm(AcquisitionMode::Continuous, 2, Some(Box::new(callback))).unwrap();
        cam.start_acquisition().unwrap();
        thread::sleep(Duration::from_millis(100));
        cam.stop_acquisition().unwrap();
        cam.disarm().unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 4);
        assert_eq!(driver.log().count(|c| matches!(c, SimCall::QueueFrame(_))), 4);
    }

    #[test]
    fn break_stops_delivery() {
        let driver = SimDriver::single();
        let mut cam = open(&driver);
        let callback = |_: &Frame<'_>| Flow::Break;

        cam.arm(AcquisitionMode::Continuous, 1, Some(Box::new(callback))).unwrap();
        cam.start_acquisition().unwrap();
        thread::sleep(Duration::from_millis(50));
        cam.stop_acquisition().unwrap();

        assert_eq!(driver.log().count(|c| matches!(c, SimCall::QueueFrame(_))), 1);
    }

    #[test]
    fn single_frame_requires_single_frame_arming() {
        let driver = SimDriver::single();
        let mut cam = open(&driver);

        assert!(cam.acquire_frame(Duration::from_millis(10)).is_err());

        cam.arm(AcquisitionMode::SingleFrame, 1, None).unwrap();
        let frame = cam.acquire_frame(Duration::from_millis(10)).unwrap();

        assert_eq!(frame.status, FrameStatus::Complete);
        assert_eq!(frame.data.len(), 64 * 48);
    }
}
