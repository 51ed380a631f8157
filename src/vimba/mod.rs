//! Allied Vision Vimba backend over the VimbaC library.

macro_rules! vmbcall {
    ($func: ident $(, $arg: expr)*) => {
        {
            use $crate::error::error_code_to_result;
            error_code_to_result(unsafe { $func($($arg),*) })
        }
    }
}

mod sys;
mod util;
mod feature;
mod camera;

pub use camera::VimbaCamera;

use sys::*;
use util::{feature_cstring, pointer_to_string};
use crate::camera::{AccessMode, CameraInfo, Driver};
use crate::feature::*;
use crate::Result;
use std::{mem, ptr};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use lazy_static::lazy_static;
use tracing::debug;



const VERSION_INFO_SIZE: u32 = mem::size_of::<VmbVersionInfo_t>() as u32;
const CAMERA_INFO_SIZE: u32 = mem::size_of::<VmbCameraInfo_t>() as u32;
const GLOBAL_HANDLE: VmbHandle_t = 1 as VmbHandle_t;



pub(crate) struct VimbaContext;

impl VimbaContext {
    fn new() -> Result<Self> {
        vmbcall!(VmbStartup).map_err(|e| e.during("start Vimba"))?;
        debug!("Vimba started");

        Ok(Self {})
    }
}

impl Drop for VimbaContext {
    fn drop(&mut self) {
        unsafe { VmbShutdown(); }
        debug!("Vimba shut down");
    }
}

lazy_static! {
    static ref CONTEXT: Mutex<Weak<VimbaContext>> = Mutex::new(Weak::new());
}



fn camera_info_from_c(info: &VmbCameraInfo_t) -> CameraInfo {
    unsafe {
        CameraInfo {
            id: pointer_to_string(info.cameraIdString),
            name: pointer_to_string(info.cameraName),
            serial: pointer_to_string(info.serialString),
            model_name: pointer_to_string(info.modelName),
            interface_id: pointer_to_string(info.interfaceIdString),
            access_mode: AccessMode::from_bits_truncate(info.permittedAccess)
        }
    }
}

/// The Vimba API. It stays started while any `Vimba` or camera opened
/// through one is alive.
pub struct Vimba {
    ctx: Arc<VimbaContext>
}

impl Vimba {
    pub fn new() -> Result<Self> {
        let mut ctx_weak = CONTEXT.lock().unwrap_or_else(PoisonError::into_inner);

        match ctx_weak.upgrade() {
            Some(ctx) => Ok(Self { ctx }),
            None => {
                let ctx = Arc::new(VimbaContext::new()?);
                *ctx_weak = Arc::downgrade(&ctx);

                Ok(Self { ctx })
            }
        }
    }

    pub fn num_cameras(&self) -> Result<usize> {
        let mut n: u32 = 0;

        vmbcall!(VmbCamerasList, ptr::null_mut(), 0, &mut n, CAMERA_INFO_SIZE)
            .map_err(|e| e.during("list cameras"))?;

        Ok(n as usize)
    }
}

impl Driver for Vimba {
    type Camera = VimbaCamera;

    fn version(&self) -> Result<String> {
        let mut version = VmbVersionInfo_t::default();

        vmbcall!(VmbVersionQuery, &mut version, VERSION_INFO_SIZE)
            .map_err(|e| e.during("query version"))?;

        Ok(format!("{}.{}.{}", version.major, version.minor, version.patch))
    }

    fn list_cameras(&self) -> Result<Vec<CameraInfo>> {
        let mut n = self.num_cameras()? as u32;
        let mut cameras = vec![VmbCameraInfo_t::default(); n as usize];

        vmbcall!(VmbCamerasList, cameras.as_mut_ptr(), n, &mut n, CAMERA_INFO_SIZE)
            .map_err(|e| e.during("list cameras"))?;

        cameras.truncate(n as usize);

        Ok(cameras.iter().map(camera_info_from_c).collect())
    }

    fn open_camera(&self, id: &str, access_mode: AccessMode) -> Result<VimbaCamera> {
        let id_c = feature_cstring("camera id", id)?;
        let mut handle: VmbHandle_t = ptr::null_mut();

        vmbcall!(VmbCameraOpen, id_c.as_ptr(), access_mode.bits(), &mut handle)
            .map_err(|e| e.during("open camera"))?;

        Ok(VimbaCamera::from_handle(id, handle, self.ctx.clone()))
    }
}

// System-wide features such as `GeVDiscoveryAllOnce`
impl HasFeatures for Vimba {
    fn list_features(&self) -> Result<Vec<FeatureInfo>> {
        GLOBAL_HANDLE.list_features()
    }

    fn feature_info(&self, name: &str) -> Result<FeatureInfo> {
        GLOBAL_HANDLE.feature_info(name)
    }

    fn get_feature(&self, name: &str) -> Result<FeatureValue> {
        GLOBAL_HANDLE.get_feature(name)
    }

    fn set_feature(&self, name: &str, value: FeatureValue) -> Result<()> {
        GLOBAL_HANDLE.set_feature(name, value)
    }

    fn feature_range(&self, name: &str) -> Result<FeatureRange> {
        GLOBAL_HANDLE.feature_range(name)
    }

    fn run_command(&self, name: &str) -> Result<()> {
        GLOBAL_HANDLE.run_command(name)
    }

    fn is_command_done(&self, name: &str) -> Result<bool> {
        GLOBAL_HANDLE.is_command_done(name)
    }
}
