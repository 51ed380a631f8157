use std::fmt;
use std::path::PathBuf;
use thiserror::Error;



/// Status codes reported by the camera SDK, plus a few of our own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceError {
    // Vimba's own errors
    InternalFault,
    ApiNotStarted,
    NotFound,
    BadHandle,
    DeviceNotOpen,
    InvalidAccess,
    BadParameter,
    StructSize,
    MoreData,
    WrongType,
    InvalidValue,
    Timeout,
    Other,
    Resources,
    InvalidCall,
    NoTL,
    NotImplemented,
    NotSupported,
    Incomplete,
    IO,

    // Our additional errors
    DeviceBusy,
    NotArmed
}

impl DeviceError {
    /// Attach the name of the failed device operation.
    pub fn during(self, op: &'static str) -> Error {
        Error::Device { op, source: self }
    }

    /// Attach the name of the feature the failure concerns.
    pub fn on_feature(self, name: &str) -> Error {
        Error::Feature { name: name.to_string(), source: self }
    }
}

#[cfg(feature = "vimba")]
impl From<i32> for DeviceError {
    fn from(v: i32) -> Self {
        use DeviceError::*;

        match v {
            -1 => InternalFault,
            -2 => ApiNotStarted,
            -3 => NotFound,
            -4 => BadHandle,
            -5 => DeviceNotOpen,
            -6 => InvalidAccess,
            -7 => BadParameter,
            -8 => StructSize,
            -9 => MoreData,
            -10 => WrongType,
            -11 => InvalidValue,
            -12 => Timeout,
            -13 => Other,
            -14 => Resources,
            -15 => InvalidCall,
            -16 => NoTL,
            -17 => NotImplemented,
            -18 => NotSupported,
            -19 => Incomplete,
            -20 => IO,
            _ => Other
        }
    }
}

#[cfg(feature = "vimba")]
pub fn error_code_to_result(code: i32) -> std::result::Result<(), DeviceError> {
    if code == 0 { Ok(()) } else { Err(DeviceError::from(code)) }
}

impl std::error::Error for DeviceError {}

impl fmt::Display for DeviceError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use DeviceError::*;

        let msg = match *self {
            InternalFault => "internal fault",
            ApiNotStarted => "API not started (open Vimba context needed)",
            NotFound => "device or feature not found",
            BadHandle => "invalid handle",
            DeviceNotOpen => "device not open",
            InvalidAccess => "invalid access (due to access mode or current API state)",
            BadParameter => "invalid parameter value",
            StructSize => "invalid struct size for this version of Vimba",
            MoreData => "not all data was read",
            WrongType => "incorrect feature type",
            InvalidValue => "invalid feature value (out of range or bad increment)",
            Timeout => "timed out",
            Other => "other unknown error",
            Resources => "resources (e.g. memory) not available",
            InvalidCall => "call is invalid in the current context",
            NoTL => "transport layer(s) not found",
            NotImplemented => "not implemented",
            NotSupported => "not supported",
            Incomplete => "operation was not completed",
            IO => "transport layer I/O error",

            DeviceBusy => "device busy",
            NotArmed => "camera is not armed for this acquisition mode"
        };

        write!(fmt, "{:?}: {}", self, msg)
    }
}



#[derive(Debug, Error)]
pub enum Error {
    /// Caller mistake, detected before any device interaction.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{op} failed: {source}")]
    Device { op: &'static str, source: DeviceError },

    #[error("feature '{name}': {source}")]
    Feature { name: String, source: DeviceError },

    #[error("camera returned incomplete frame {frame_id}")]
    IncompleteFrame { frame_id: u64 },

    #[error("pixel format 0x{0:08X} cannot be written as an image")]
    UnsupportedFormat(u32),

    #[error("camera offers no pixel format that can be written as an image")]
    NoWritableFormat,

    #[error("could not read settings from {path}: {message}")]
    Settings { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
