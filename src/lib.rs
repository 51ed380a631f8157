// Hardware backend, only built against an installed Vimba SDK
#[cfg(feature = "vimba")]
mod vimba;

mod error;

// Public modules
pub mod camera;
pub mod config;
pub mod convert;
pub mod feature;
pub mod format;
pub mod frame;
pub mod instance;
pub mod latch;
pub mod session;
pub mod sim;
pub mod sink;



pub use error::{DeviceError, Error};
#[cfg(feature = "vimba")]
pub use vimba::{Vimba, VimbaCamera};

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Flow { Continue, Break }

pub type Result<T> = std::result::Result<T, Error>;



pub mod prelude {
    pub use crate::camera::{AccessMode, AcquisitionMode, CameraControl, Driver, OpenCamera};
    pub use crate::feature::{FeatureValue, HasFeatures};
    pub use crate::instance::{Callback, CameraInstance};
    pub use crate::session::{StreamConfig, StreamSession, StreamSummary};
    pub use crate::sink::{DisplaySink, ExportSink, FrameSink, Naming};
    pub use crate::Flow;
}
