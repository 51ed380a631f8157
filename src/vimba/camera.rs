use super::sys::*;
use super::VimbaContext;
use crate::camera::{AcquisitionMode, CameraControl, FrameCallback};
use crate::error::DeviceError;
use crate::feature::*;
use crate::frame::{Frame, FrameStatus, OwnedFrame};
use crate::{Flow, Result};
use std::ffi::c_void;
use std::mem;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};



const FRAME_SIZE: u32 = mem::size_of::<VmbFrame_t>() as u32;
const IDLE_POLL: Duration = Duration::from_millis(10);



/// Everything the SDK's delivery thread touches while the camera is armed.
/// It is pinned because the announced frames point into it.
struct CaptureContext {
    handler: Option<Mutex<Box<dyn FrameCallback>>>,
    frames: Vec<VmbFrame_t>,
    buffers: Vec<Vec<u8>>,
    stopped: AtomicBool
}

impl CaptureContext {
    fn new(depth: usize, payload: usize, handler: Option<Box<dyn FrameCallback>>) -> Pin<Box<Self>> {
        let mut ctx = Box::pin(Self {
            handler: handler.map(Mutex::new),
            frames: (0..depth).map(|_| VmbFrame_t::default()).collect(),
            buffers: vec![vec![0u8; payload]; depth],
            stopped: AtomicBool::new(false)
        });

        let inner: &mut CaptureContext = &mut ctx;
        let ctx_ptr = inner as *mut CaptureContext as *mut c_void;

        for (frame, buffer) in inner.frames.iter_mut().zip(inner.buffers.iter_mut()) {
            frame.buffer = buffer.as_mut_ptr() as *mut c_void;
            frame.bufferSize = buffer.len() as u32;
            frame.context[0] = ctx_ptr;
        }

        ctx
    }
}

fn view(frame: &VmbFrame_t) -> Frame<'_> {
    let len = frame.imageSize.min(frame.bufferSize) as usize;

    Frame {
        status: FrameStatus::from_code(frame.receiveStatus),
        pixel_format: frame.pixelFormat,
        width: frame.width,
        height: frame.height,
        frame_id: frame.frameID,
        timestamp: frame.timestamp,
        data: unsafe { std::slice::from_raw_parts(frame.buffer as *const u8, len) }
    }
}

// Runs on the SDK's delivery thread for every filled frame. The frame goes
// back on the queue after the handler returns unless the handler asked to
// stop, or acquisition is being stopped. The handler lock is held until the
// frame is requeued.
unsafe extern "C" fn on_frame(camera: VmbHandle_t, frame: *mut VmbFrame_t) {
    let ctx = &*((*frame).context[0] as *const CaptureContext);

    if ctx.stopped.load(Ordering::Acquire) { return }

    let Some(handler) = ctx.handler.as_ref() else { return };
    let Ok(mut handler) = handler.lock() else { return };

    // Checked again under the lock, which disarm takes after stopping
    if ctx.stopped.load(Ordering::Acquire) { return }

    if (*handler)(&view(&*frame)) == Flow::Break {
        ctx.stopped.store(true, Ordering::Release);
        return
    }

    if let Err(e) = vmbcall!(VmbCaptureFrameQueue, camera, frame, Some(on_frame)) {
        warn!("could not requeue frame: {e}");
    }
}



pub struct VimbaCamera {
    id: String,
    handle: VmbHandle_t,
    open: bool,
    mode: Option<AcquisitionMode>,
    capture: Option<Pin<Box<CaptureContext>>>,
    _ctx: Arc<VimbaContext>
}

// The handle is only used through &mut self or from the SDK's own thread
unsafe impl Send for VimbaCamera {}

impl VimbaCamera {
    pub(super) fn from_handle(id: &str, handle: VmbHandle_t, ctx: Arc<VimbaContext>) -> Self {
        Self { id: id.to_string(), handle, open: true, mode: None, capture: None, _ctx: ctx }
    }

    // AcquisitionStop returns before the camera has actually stopped
    fn wait_until_idle(&self) -> Result<()> {
        while self.get_feature_bool("AcquisitionStatus")? {
            std::thread::sleep(IDLE_POLL);
        }

        Ok(())
    }
}

impl HasFeatures for VimbaCamera {
    fn list_features(&self) -> Result<Vec<FeatureInfo>> {
        self.handle.list_features()
    }

    fn feature_info(&self, name: &str) -> Result<FeatureInfo> {
        self.handle.feature_info(name)
    }

    fn get_feature(&self, name: &str) -> Result<FeatureValue> {
        self.handle.get_feature(name)
    }

    fn set_feature(&self, name: &str, value: FeatureValue) -> Result<()> {
        self.handle.set_feature(name, value)
    }

    fn feature_range(&self, name: &str) -> Result<FeatureRange> {
        self.handle.feature_range(name)
    }

    fn run_command(&self, name: &str) -> Result<()> {
        self.handle.run_command(name)
    }

    fn is_command_done(&self, name: &str) -> Result<bool> {
        self.handle.is_command_done(name)
    }
}

impl CameraControl for VimbaCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn arm(
        &mut self,
        mode: AcquisitionMode,
        buffer_depth: usize,
        callback: Option<Box<dyn FrameCallback>>
    ) -> Result<()> {
        if self.capture.is_some() { return Err(DeviceError::DeviceBusy.during("arm")) }
        if buffer_depth == 0 { return Err(DeviceError::BadParameter.during("arm")) }
        if mode == AcquisitionMode::Continuous && callback.is_none() {
            return Err(DeviceError::BadParameter.during("arm"))
        }

        self.set_feature_enum("AcquisitionMode", mode.feature_entry())?;
        // AcquisitionStatus then reads true while the camera is acquiring
        self.set_feature_enum("AcquisitionStatusSelector", "AcquisitionActive")?;

        let payload = self.get_feature_int("PayloadSize")? as usize;
        let depth = if mode == AcquisitionMode::SingleFrame { 1 } else { buffer_depth };
        // Kept before announcing: the SDK holds pointers into the context
        // until disarm revokes them
        let ctx = self.capture.insert(CaptureContext::new(depth, payload, callback));
        self.mode = Some(mode);

        for frame in &ctx.frames {
            vmbcall!(VmbFrameAnnounce, self.handle, frame, FRAME_SIZE).map_err(|e| e.during("announce frame"))?;
        }

        vmbcall!(VmbCaptureStart, self.handle).map_err(|e| e.during("start capture"))?;

        if mode == AcquisitionMode::Continuous {
            for frame in &ctx.frames {
                vmbcall!(VmbCaptureFrameQueue, self.handle, frame, Some(on_frame))
                    .map_err(|e| e.during("queue frame"))?;
            }
        }

        debug!("{}: armed for {:?} with {depth} buffers of {payload} bytes", self.id, mode);

        Ok(())
    }

    fn disarm(&mut self) -> Result<()> {
        let Some(ctx) = self.capture.take() else { return Ok(()) };
        self.mode = None;

        // Waits out a handler that is still running, and keeps any later
        // delivery from calling it
        if let Some(handler) = &ctx.handler {
            let _guard = handler.lock().unwrap_or_else(PoisonError::into_inner);
            ctx.stopped.store(true, Ordering::Release);
        }

        let ended = vmbcall!(VmbCaptureEnd, self.handle).map_err(|e| e.during("end capture"));
        let flushed = vmbcall!(VmbCaptureQueueFlush, self.handle).map_err(|e| e.during("flush queue"));
        let revoked = vmbcall!(VmbFrameRevokeAll, self.handle).map_err(|e| e.during("revoke frames"));

        if revoked.is_err() {
            // The SDK may still write into the announced frames
            warn!("{}: frames not revoked, leaking their buffers", self.id);
            mem::forget(ctx);
        }

        debug!("{}: disarmed", self.id);

        ended.and(flushed).and(revoked)
    }

    fn start_acquisition(&mut self) -> Result<()> {
        if self.mode != Some(AcquisitionMode::Continuous) {
            return Err(DeviceError::NotArmed.during("start acquisition"))
        }

        self.run_command("AcquisitionStart")
    }

    fn stop_acquisition(&mut self) -> Result<()> {
        // The handler must not run again once stopping has begun
        if let Some(ctx) = &self.capture {
            ctx.stopped.store(true, Ordering::Release);
        }

        self.run_command("AcquisitionStop")?;
        self.wait_until_idle()
    }

    fn acquire_frame(&mut self, timeout: Duration) -> Result<OwnedFrame> {
        if self.mode != Some(AcquisitionMode::SingleFrame) {
            return Err(DeviceError::NotArmed.during("acquire frame"))
        }

        let frame = match &self.capture {
            Some(ctx) => &ctx.frames[0] as *const VmbFrame_t,
            None => return Err(DeviceError::NotArmed.during("acquire frame"))
        };
        let timeout_ms = timeout.as_millis().min(u32::MAX as u128) as u32;

        vmbcall!(VmbCaptureFrameQueue, self.handle, frame, None).map_err(|e| e.during("queue frame"))?;
        self.run_command("AcquisitionStart")?;

        let waited = vmbcall!(VmbCaptureFrameWait, self.handle, frame, timeout_ms)
            .map_err(|e| e.during("wait for frame"));
        let stopped = self.run_command("AcquisitionStop").and_then(|_| self.wait_until_idle());

        waited.and(stopped)?;

        Ok(view(unsafe { &*frame }).copy_out())
    }

    fn close(&mut self) -> Result<()> {
        if !self.open { return Ok(()) }

        let res = vmbcall!(VmbCameraClose, self.handle).map_err(|e| e.during("close camera"));

        if res.is_ok() {
            self.open = false;
            self.capture = None;
        }

        res
    }
}

impl Drop for VimbaCamera {
    fn drop(&mut self) {
        if let Err(e) = self.disarm().and_then(|_| self.close()) {
            warn!("could not release camera {} during drop: {e}", self.id);
        }
    }
}
