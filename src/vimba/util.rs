use crate::error::DeviceError;
use crate::Result;
use std::ffi::{c_char, CStr, CString};



/// Copy a string returned by Vimba. A null pointer reads as empty.
pub unsafe fn pointer_to_string(p: *const c_char) -> String {
    if p.is_null() { return String::new() }

    CStr::from_ptr(p).to_string_lossy().into_owned()
}

/// Feature names and values cannot carry interior zeros across the C API.
pub fn feature_cstring(name: &str, s: &str) -> Result<CString> {
    CString::new(s).map_err(|_| DeviceError::BadParameter.on_feature(name))
}
