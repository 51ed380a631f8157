use crate::feature::HasFeatures;
use crate::frame::{Frame, OwnedFrame};
use crate::{Flow, Result};
use std::time::Duration;
use bitflags::bitflags;
use tracing::{debug, warn};



bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct AccessMode: u32 {
        const NONE = 0;
        const FULL = 1;
        const READ = 2;
        const CONFIG = 4;
        const LITE = 8;
    }
}



#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub id: String,
    pub name: String,
    pub serial: String,
    pub model_name: String,
    pub interface_id: String,
    pub access_mode: AccessMode,
}



#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AcquisitionMode { SingleFrame, Continuous }

impl AcquisitionMode {
    /// Entry of the `AcquisitionMode` feature selecting this mode.
    pub fn feature_entry(&self) -> &'static str {
        match self {
            AcquisitionMode::SingleFrame => "SingleFrame",
            AcquisitionMode::Continuous => "Continuous"
        }
    }
}



pub trait FrameCallback: Send + FnMut(&Frame<'_>) -> Flow {}

impl<T> FrameCallback for T where T: Send + FnMut(&Frame<'_>) -> Flow {}



/// Acquisition control over one open camera.
///
/// Continuous acquisition invokes the armed callback once per arriving frame
/// on the backend's delivery thread. The backend hands each buffer back to
/// the device after the callback returns. Once a callback returns
/// `Flow::Break` it is not invoked again for this arming.
pub trait CameraControl: HasFeatures + Send {
    fn id(&self) -> &str;

    fn arm(
        &mut self,
        mode: AcquisitionMode,
        buffer_depth: usize,
        callback: Option<Box<dyn FrameCallback>>
    ) -> Result<()>;

    fn disarm(&mut self) -> Result<()>;
    fn start_acquisition(&mut self) -> Result<()>;
    fn stop_acquisition(&mut self) -> Result<()>;

    /// Capture one frame; the camera must be armed in `SingleFrame` mode.
    fn acquire_frame(&mut self, timeout: Duration) -> Result<OwnedFrame>;

    fn close(&mut self) -> Result<()>;
}



/// Entry point of a camera SDK: discovery and opening.
pub trait Driver {
    type Camera: CameraControl + 'static;

    fn version(&self) -> Result<String>;
    fn list_cameras(&self) -> Result<Vec<CameraInfo>>;
    fn open_camera(&self, id: &str, access_mode: AccessMode) -> Result<Self::Camera>;
}

/// Ids of every camera currently visible to the host.
pub fn camera_ids<D: Driver>(driver: &D) -> Result<Vec<String>> {
    Ok(driver.list_cameras()?.into_iter().map(|info| info.id).collect())
}



/// An open camera that is disarmed (if armed) and closed when it goes out
/// of scope, whichever way the scope is left.
pub struct OpenCamera<C: CameraControl> {
    camera: C,
    armed: bool,
    open: bool
}

impl<C: CameraControl> OpenCamera<C> {
    pub fn open<D>(driver: &D, id: &str) -> Result<Self>
    where D: Driver<Camera = C> {
        let camera = driver.open_camera(id, AccessMode::FULL)?;
        debug!("opened camera {id}");

        Ok(Self { camera, armed: false, open: true })
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut C {
        &mut self.camera
    }

    pub fn arm(
        &mut self,
        mode: AcquisitionMode,
        buffer_depth: usize,
        callback: Option<Box<dyn FrameCallback>>
    ) -> Result<()> {
        // A failed arm can leave buffers announced, so it still needs a disarm
        self.armed = true;
        self.camera.arm(mode, buffer_depth, callback)
    }

    /// Disarm and close now, reporting the first failure. Both steps are
    /// attempted even if the first one fails.
    pub fn release(mut self) -> Result<()> {
        let disarmed = self.disarm_once();
        let closed = self.close_once();

        disarmed.and(closed)
    }

    fn disarm_once(&mut self) -> Result<()> {
        if !self.armed { return Ok(()) }

        self.armed = false;
        self.camera.disarm()
    }

    fn close_once(&mut self) -> Result<()> {
        if !self.open { return Ok(()) }

        self.open = false;
        let res = self.camera.close();
        debug!("closed camera {}", self.camera.id());

        res
    }
}

impl<C: CameraControl> Drop for OpenCamera<C> {
    fn drop(&mut self) {
        if let Err(e) = self.disarm_once() {
            warn!("could not disarm camera {} during drop: {e}", self.camera.id());
        }

        if let Err(e) = self.close_once() {
            warn!("could not close camera {} during drop: {e}", self.camera.id());
        }
    }
}
