use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vimba_helpers::camera::{AccessMode, AcquisitionMode, Driver};
use vimba_helpers::convert::{Image, Layout};
use vimba_helpers::feature::{FeatureValue, HasFeatures};
use vimba_helpers::format::PixelFormat;
use vimba_helpers::frame::FrameStatus;
use vimba_helpers::session::{SessionState, StreamConfig, StreamSession};
use vimba_helpers::sim::{SimCall, SimCameraSpec, SimDriver, SimFaults};
use vimba_helpers::sink::{DisplaySink, ExportSink, FrameSink, Naming, SinkKind};
use vimba_helpers::{DeviceError, Error};



const ID: &str = "DEV_TEST";

fn driver_with(script: Vec<FrameStatus>) -> SimDriver {
    SimDriver::new(vec![SimCameraSpec::new(ID).with_size(16, 12).with_script(script)])
}

fn jpegs(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir).unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".jpg"))
        .collect();
    names.sort();
    names
}

/// Records what reached it instead of writing files.
#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<(Layout, usize, u64)>>>,
    fail: bool
}

impl FrameSink for Recorder {
    fn kind(&self) -> SinkKind {
        SinkKind::Export
    }

    fn consume(&mut self, image: &Image<'_>, counter: u64) -> vimba_helpers::Result<()> {
        if self.fail {
            return Err(Error::UnsupportedFormat(image.layout.code()))
        }

        self.seen.lock().unwrap().push((image.layout, image.data.len(), counter));
        Ok(())
    }
}



#[test]
fn both_or_neither_stop_condition_is_rejected_before_any_device_call() {
    let driver = SimDriver::single();
    let dir = tempfile::tempdir().unwrap();
    let mut session = StreamSession::new(&driver, SimDriver::DEFAULT_ID);

    let neither = StreamConfig::default();
    let both = StreamConfig { frame_limit: Some(3), ..StreamConfig::for_duration(Duration::from_secs(1)) };

    for config in [neither, both] {
        let err = session.run(&config, ExportSink::new(dir.path(), Naming::Counter).unwrap()).unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    assert!(driver.log().is_empty());
}

#[test]
fn frame_limit_writes_exactly_that_many_counter_named_files() {
    let driver = driver_with(vec![FrameStatus::Complete; 5]);
    let dir = tempfile::tempdir().unwrap();
    let mut session = StreamSession::new(&driver, ID);

    let config = StreamConfig::for_frames(3).output_path(dir.path());
    let sink = ExportSink::new(dir.path(), Naming::Counter).unwrap();
    let summary = session.run(&config, sink).unwrap();

    assert_eq!(jpegs(dir.path()), ["1.jpg", "2.jpg", "3.jpg"]);
    assert_eq!(summary.written, 3);
    // The fourth delivery trips the latch and is not processed
    assert_eq!(summary.delivered, 4);
    assert!(summary.limit_reached);
    assert_eq!(session.state(), SessionState::Closed);

    let log = driver.log();
    assert_eq!(log.count(|c| matches!(c, SimCall::QueueFrame(_))), 4);
    assert_eq!(log.count(|c| *c == SimCall::Arm(AcquisitionMode::Continuous, 10)), 1);
    assert_eq!(log.count(|c| *c == SimCall::Disarm), 1);
    assert_eq!(log.count(|c| *c == SimCall::Close), 1);
}

#[test]
fn incomplete_frames_are_not_counted() {
    use FrameStatus::*;

    let driver = driver_with(vec![Complete, Incomplete, Complete, TooSmall, Complete, Complete]);
    let recorder = Recorder::default();
    let mut session = StreamSession::new(&driver, ID);

    let summary = session.run(&StreamConfig::for_frames(3), recorder.clone()).unwrap();

    let counters: Vec<u64> = recorder.seen.lock().unwrap().iter().map(|s| s.2).collect();
    assert_eq!(counters, [1, 2, 3]);
    assert_eq!(summary.incomplete, 2);
    assert_eq!(summary.written, 3);
    assert_eq!(summary.delivered, 6);
}

#[test]
fn cleanup_runs_once_when_stop_fails() {
    let faults = SimFaults { stop: true, ..SimFaults::default() };
    let driver = SimDriver::single().with_faults(faults);
    let mut session = StreamSession::new(&driver, SimDriver::DEFAULT_ID);

    let config = StreamConfig::for_duration(Duration::from_millis(20));
    let err = session.run(&config, Recorder::default()).unwrap_err();

    assert!(matches!(err, Error::Device { source: DeviceError::Timeout, .. }));
    assert_eq!(session.state(), SessionState::Closed);

    let log = driver.log();
    assert_eq!(log.count(|c| *c == SimCall::StopAcquisition), 1);
    assert_eq!(log.count(|c| *c == SimCall::Disarm), 1);
    assert_eq!(log.count(|c| *c == SimCall::Close), 1);
}

#[test]
fn cleanup_runs_once_when_arming_fails() {
    let faults = SimFaults { arm: true, ..SimFaults::default() };
    let driver = SimDriver::single().with_faults(faults);
    let mut session = StreamSession::new(&driver, SimDriver::DEFAULT_ID);

    let err = session.run(&StreamConfig::for_frames(2), Recorder::default()).unwrap_err();

    assert!(matches!(err, Error::Device { .. }));
    assert_eq!(driver.log().count(|c| *c == SimCall::StartAcquisition), 0);
    assert_eq!(driver.log().count(|c| *c == SimCall::Disarm), 1);
    assert_eq!(driver.log().count(|c| *c == SimCall::Close), 1);
}

#[test]
fn display_sink_cannot_use_a_frame_limit() {
    let driver = SimDriver::single();
    let mut session = StreamSession::new(&driver, SimDriver::DEFAULT_ID);
    let sink = DisplaySink::new(|_: &image::RgbImage| {});

    let err = session.run(&StreamConfig::for_frames(5), sink).unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert!(driver.log().is_empty());
}

#[test]
fn display_sink_with_duration_and_frame_limit_opens_nothing() {
    let driver = SimDriver::single();
    let mut session = StreamSession::new(&driver, SimDriver::DEFAULT_ID);
    let sink = DisplaySink::new(|_: &image::RgbImage| {});
    let config = StreamConfig { frame_limit: Some(5), ..StreamConfig::for_duration(Duration::from_secs(5)) };

    let err = session.run(&config, sink).unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert!(driver.log().is_empty());
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn bayer_frames_are_converted_and_mono_passes_through() {
    for (format, layout, len) in [
        (PixelFormat::BayerRG8, Layout::Rgb8, 16 * 12 * 3),
        (PixelFormat::Mono8, Layout::Raw(PixelFormat::Mono8.code()), 16 * 12),
    ] {
        let spec = SimCameraSpec::new(ID).with_size(16, 12).with_format(format)
            .with_script(vec![FrameStatus::Complete; 3]);
        let driver = SimDriver::new(vec![spec]);
        let recorder = Recorder::default();

        StreamSession::new(&driver, ID).run(&StreamConfig::for_frames(2), recorder.clone()).unwrap();

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|s| s.0 == layout && s.1 == len));
    }
}

#[test]
fn overrides_are_applied_in_order_before_arming() {
    let driver = driver_with(vec![FrameStatus::Complete; 2]);
    let config = StreamConfig::for_frames(1)
        .feature("ExposureTime", FeatureValue::Int(1500))
        .feature("ExposureAuto", FeatureValue::String("Off".into()));

    StreamSession::new(&driver, ID).run(&config, Recorder::default()).unwrap();

    let calls = driver.log().calls();
    let arm_at = calls.iter().position(|c| matches!(c, SimCall::Arm(..))).unwrap();

    assert_eq!(&calls[1..3], &[
        SimCall::SetFeature("ExposureTime".into(), FeatureValue::Float(1500.0)),
        SimCall::SetFeature("ExposureAuto".into(), FeatureValue::Enum("Off".into())),
    ]);
    assert!(arm_at > 2);

    let cam = driver.open_camera(ID, AccessMode::FULL).unwrap();
    assert_eq!(cam.get_feature_float("ExposureTime").unwrap(), 1500.0);
}

#[test]
fn bad_override_fails_without_starting() {
    let driver = SimDriver::single();
    let config = StreamConfig::for_frames(1).feature("Gain", FeatureValue::Float(1000.0));

    let err = StreamSession::new(&driver, SimDriver::DEFAULT_ID).run(&config, Recorder::default()).unwrap_err();

    assert!(matches!(err, Error::Feature { source: DeviceError::InvalidValue, .. }));
    assert_eq!(driver.log().count(|c| matches!(c, SimCall::Arm(..))), 0);
    assert_eq!(driver.log().count(|c| *c == SimCall::Close), 1);
}

#[test]
fn sink_failures_are_counted_not_fatal() {
    let driver = SimDriver::single();
    let recorder = Recorder { fail: true, ..Recorder::default() };

    let config = StreamConfig::for_duration(Duration::from_millis(30));
    let summary = StreamSession::new(&driver, SimDriver::DEFAULT_ID).run(&config, recorder).unwrap();

    assert!(summary.failed > 0);
    assert_eq!(summary.written, 0);
    assert!(!summary.limit_reached);
}

#[test]
fn duration_mode_writes_sequential_names() {
    let driver = SimDriver::single();
    let dir = tempfile::tempdir().unwrap();
    let config = StreamConfig::for_duration(Duration::from_millis(40));

    let summary = StreamSession::new(&driver, SimDriver::DEFAULT_ID)
        .run(&config, ExportSink::new(dir.path(), Naming::Counter).unwrap())
        .unwrap();

    let expected: Vec<String> = {
        let mut v: Vec<String> = (1..=summary.written).map(|n| format!("{n}.jpg")).collect();
        v.sort();
        v
    };

    assert!(summary.written > 0);
    assert_eq!(jpegs(dir.path()), expected);
}
