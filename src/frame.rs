use crate::format::PixelFormat;



#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameStatus {
    Complete,
    Incomplete,
    TooSmall,
    Invalid
}

impl FrameStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => FrameStatus::Complete,
            -1 => FrameStatus::Incomplete,
            -2 => FrameStatus::TooSmall,
            _ => FrameStatus::Invalid
        }
    }
}



/// A frame as delivered by the camera. The pixel data is borrowed from the
/// SDK's buffer, which is handed back to the device once the callback that
/// received it returns.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub status: FrameStatus,
    pub pixel_format: u32,
    pub width: u32,
    pub height: u32,
    pub frame_id: u64,
    pub timestamp: u64,
    pub data: &'a [u8]
}

impl<'a> Frame<'a> {
    pub fn is_complete(&self) -> bool {
        self.status == FrameStatus::Complete
    }

    pub fn format(&self) -> Option<PixelFormat> {
        PixelFormat::from_code(self.pixel_format)
    }

    pub fn copy_out(&self) -> OwnedFrame {
        OwnedFrame {
            status: self.status,
            pixel_format: self.pixel_format,
            width: self.width,
            height: self.height,
            frame_id: self.frame_id,
            timestamp: self.timestamp,
            data: self.data.to_vec()
        }
    }
}



/// A frame copied out of the SDK buffer, as returned by single-frame capture.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnedFrame {
    pub status: FrameStatus,
    pub pixel_format: u32,
    pub width: u32,
    pub height: u32,
    pub frame_id: u64,
    pub timestamp: u64,
    pub data: Vec<u8>
}

impl OwnedFrame {
    pub fn as_frame(&self) -> Frame<'_> {
        Frame {
            status: self.status,
            pixel_format: self.pixel_format,
            width: self.width,
            height: self.height,
            frame_id: self.frame_id,
            timestamp: self.timestamp,
            data: &self.data
        }
    }
}
