//! Declarations for the parts of the VimbaC API used by this crate.

#![allow(non_camel_case_types, non_snake_case, non_upper_case_globals, dead_code)]

use std::ffi::{c_char, c_void};
use std::ptr;



pub type VmbError_t = i32;
pub type VmbHandle_t = *mut c_void;
pub type VmbBool_t = c_char;
pub type VmbAccessMode_t = u32;
pub type VmbFeatureData_t = u32;
pub type VmbFeatureFlags_t = u32;
pub type VmbFrameStatus_t = i32;
pub type VmbPixelFormat_t = u32;

pub const VmbErrorSuccess: VmbError_t = 0;

pub mod VmbFeatureDataType {
    pub const VmbFeatureDataUnknown: u32 = 0;
    pub const VmbFeatureDataInt: u32 = 1;
    pub const VmbFeatureDataFloat: u32 = 2;
    pub const VmbFeatureDataEnum: u32 = 3;
    pub const VmbFeatureDataString: u32 = 4;
    pub const VmbFeatureDataBool: u32 = 5;
    pub const VmbFeatureDataCommand: u32 = 6;
    pub const VmbFeatureDataRaw: u32 = 7;
    pub const VmbFeatureDataNone: u32 = 8;
}



#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct VmbVersionInfo_t {
    pub major: u32,
    pub minor: u32,
    pub patch: u32
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VmbCameraInfo_t {
    pub cameraIdString: *const c_char,
    pub cameraName: *const c_char,
    pub modelName: *const c_char,
    pub serialString: *const c_char,
    pub permittedAccess: VmbAccessMode_t,
    pub interfaceIdString: *const c_char
}

impl Default for VmbCameraInfo_t {
    fn default() -> Self {
        Self {
            cameraIdString: ptr::null(),
            cameraName: ptr::null(),
            modelName: ptr::null(),
            serialString: ptr::null(),
            permittedAccess: 0,
            interfaceIdString: ptr::null()
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VmbFeatureInfo_t {
    pub name: *const c_char,
    pub featureDataType: VmbFeatureData_t,
    pub featureFlags: VmbFeatureFlags_t,
    pub category: *const c_char,
    pub displayName: *const c_char,
    pub pollingTime: u32,
    pub unit: *const c_char,
    pub representation: *const c_char,
    pub visibility: u32,
    pub tooltip: *const c_char,
    pub description: *const c_char,
    pub sfncNamespace: *const c_char,
    pub isStreamable: VmbBool_t,
    pub hasAffectedFeatures: VmbBool_t,
    pub hasSelectedFeatures: VmbBool_t
}

impl Default for VmbFeatureInfo_t {
    fn default() -> Self {
        Self {
            name: ptr::null(),
            featureDataType: 0,
            featureFlags: 0,
            category: ptr::null(),
            displayName: ptr::null(),
            pollingTime: 0,
            unit: ptr::null(),
            representation: ptr::null(),
            visibility: 0,
            tooltip: ptr::null(),
            description: ptr::null(),
            sfncNamespace: ptr::null(),
            isStreamable: 0,
            hasAffectedFeatures: 0,
            hasSelectedFeatures: 0
        }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct VmbFrame_t {
    pub buffer: *mut c_void,
    pub bufferSize: u32,
    pub context: [*mut c_void; 4],
    pub receiveStatus: VmbFrameStatus_t,
    pub receiveFlags: u32,
    pub imageSize: u32,
    pub ancillarySize: u32,
    pub pixelFormat: VmbPixelFormat_t,
    pub width: u32,
    pub height: u32,
    pub offsetX: u32,
    pub offsetY: u32,
    pub frameID: u64,
    pub timestamp: u64
}

impl Default for VmbFrame_t {
    fn default() -> Self {
        Self {
            buffer: ptr::null_mut(),
            bufferSize: 0,
            context: [ptr::null_mut(); 4],
            receiveStatus: 0,
            receiveFlags: 0,
            imageSize: 0,
            ancillarySize: 0,
            pixelFormat: 0,
            width: 0,
            height: 0,
            offsetX: 0,
            offsetY: 0,
            frameID: 0,
            timestamp: 0
        }
    }
}

pub type VmbFrameCallback = Option<unsafe extern "C" fn(camera: VmbHandle_t, frame: *mut VmbFrame_t)>;



extern "C" {
    pub fn VmbVersionQuery(info: *mut VmbVersionInfo_t, size: u32) -> VmbError_t;
    pub fn VmbStartup() -> VmbError_t;
    pub fn VmbShutdown();

    pub fn VmbCamerasList(list: *mut VmbCameraInfo_t, len: u32, found: *mut u32, size: u32) -> VmbError_t;
    pub fn VmbCameraOpen(id: *const c_char, mode: VmbAccessMode_t, handle: *mut VmbHandle_t) -> VmbError_t;
    pub fn VmbCameraClose(handle: VmbHandle_t) -> VmbError_t;

    pub fn VmbFeaturesList(
        handle: VmbHandle_t, list: *mut VmbFeatureInfo_t, len: u32, found: *mut u32, size: u32
    ) -> VmbError_t;
    pub fn VmbFeatureInfoQuery(
        handle: VmbHandle_t, name: *const c_char, info: *mut VmbFeatureInfo_t, size: u32
    ) -> VmbError_t;

    pub fn VmbFeatureIntGet(handle: VmbHandle_t, name: *const c_char, value: *mut i64) -> VmbError_t;
    pub fn VmbFeatureIntSet(handle: VmbHandle_t, name: *const c_char, value: i64) -> VmbError_t;
    pub fn VmbFeatureIntRangeQuery(
        handle: VmbHandle_t, name: *const c_char, min: *mut i64, max: *mut i64
    ) -> VmbError_t;
    pub fn VmbFeatureIntIncrementQuery(handle: VmbHandle_t, name: *const c_char, value: *mut i64) -> VmbError_t;

    pub fn VmbFeatureFloatGet(handle: VmbHandle_t, name: *const c_char, value: *mut f64) -> VmbError_t;
    pub fn VmbFeatureFloatSet(handle: VmbHandle_t, name: *const c_char, value: f64) -> VmbError_t;
    pub fn VmbFeatureFloatRangeQuery(
        handle: VmbHandle_t, name: *const c_char, min: *mut f64, max: *mut f64
    ) -> VmbError_t;

    pub fn VmbFeatureEnumGet(handle: VmbHandle_t, name: *const c_char, value: *mut *const c_char) -> VmbError_t;
    pub fn VmbFeatureEnumSet(handle: VmbHandle_t, name: *const c_char, value: *const c_char) -> VmbError_t;
    pub fn VmbFeatureEnumRangeQuery(
        handle: VmbHandle_t, name: *const c_char, entries: *mut *const c_char, len: u32, filled: *mut u32
    ) -> VmbError_t;

    pub fn VmbFeatureStringGet(
        handle: VmbHandle_t, name: *const c_char, buffer: *mut c_char, len: u32, filled: *mut u32
    ) -> VmbError_t;
    pub fn VmbFeatureStringSet(handle: VmbHandle_t, name: *const c_char, value: *const c_char) -> VmbError_t;

    pub fn VmbFeatureBoolGet(handle: VmbHandle_t, name: *const c_char, value: *mut VmbBool_t) -> VmbError_t;
    pub fn VmbFeatureBoolSet(handle: VmbHandle_t, name: *const c_char, value: VmbBool_t) -> VmbError_t;

    pub fn VmbFeatureCommandRun(handle: VmbHandle_t, name: *const c_char) -> VmbError_t;
    pub fn VmbFeatureCommandIsDone(handle: VmbHandle_t, name: *const c_char, done: *mut VmbBool_t) -> VmbError_t;

    pub fn VmbFeatureRawGet(
        handle: VmbHandle_t, name: *const c_char, buffer: *mut c_char, len: u32, filled: *mut u32
    ) -> VmbError_t;
    pub fn VmbFeatureRawSet(handle: VmbHandle_t, name: *const c_char, buffer: *const c_char, len: u32) -> VmbError_t;
    pub fn VmbFeatureRawLengthQuery(handle: VmbHandle_t, name: *const c_char, len: *mut u32) -> VmbError_t;

    pub fn VmbFrameAnnounce(handle: VmbHandle_t, frame: *const VmbFrame_t, size: u32) -> VmbError_t;
    pub fn VmbFrameRevokeAll(handle: VmbHandle_t) -> VmbError_t;

    pub fn VmbCaptureStart(handle: VmbHandle_t) -> VmbError_t;
    pub fn VmbCaptureEnd(handle: VmbHandle_t) -> VmbError_t;
    pub fn VmbCaptureFrameQueue(
        handle: VmbHandle_t, frame: *const VmbFrame_t, callback: VmbFrameCallback
    ) -> VmbError_t;
    pub fn VmbCaptureFrameWait(handle: VmbHandle_t, frame: *const VmbFrame_t, timeout_ms: u32) -> VmbError_t;
    pub fn VmbCaptureQueueFlush(handle: VmbHandle_t) -> VmbError_t;
}
