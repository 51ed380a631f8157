#![allow(non_camel_case_types)]

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::str::FromStr;



const FORMAT_COLOR_MASK: u32     = 0xFF000000;
const FORMAT_BIT_DEPTH_MASK: u32 = 0x00FF0000;
const FORMAT_COLOR: u32          = 0x02000000;

/// Pixel formats by their GenICam PFNC code, as carried in every frame.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
pub enum PixelFormat {
    // Mono formats
    Mono8 = 0x01080001,
    Mono10 = 0x01100003,
    Mono12 = 0x01100005,
    Mono14 = 0x01100025,
    Mono16 = 0x01100007,

    // Bayer formats
    BayerGR8 = 0x01080008,
    BayerRG8 = 0x01080009,
    BayerGB8 = 0x0108000A,
    BayerBG8 = 0x0108000B,
    BayerGR12 = 0x01100010,
    BayerRG12 = 0x01100011,
    BayerGB12 = 0x01100012,
    BayerBG12 = 0x01100013,

    // RGB formats
    Rgb8 = 0x02180014,
    Bgr8 = 0x02180015,
    Rgba8 = 0x02200016,
    Bgra8 = 0x02200017,

    // YUV formats
    Yuv422 = 0x0210001F
}

impl Default for PixelFormat {
    fn default() -> Self {
        Self::Mono8
    }
}

impl PixelFormat {
    pub fn from_code(code: u32) -> Option<Self> {
        Self::from_u32(code)
    }

    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn bits_per_pixel(&self) -> usize {
        const SHIFT: u32 = FORMAT_BIT_DEPTH_MASK.trailing_zeros();

        ((*self as u32 & FORMAT_BIT_DEPTH_MASK) >> SHIFT) as usize
    }

    /// Bytes a `width` by `height` image occupies in this format.
    pub fn buffer_len(&self, width: u32, height: u32) -> usize {
        (width as usize * height as usize * self.bits_per_pixel()).div_ceil(8)
    }

    pub fn is_color(&self) -> bool {
        *self as u32 & FORMAT_COLOR_MASK == FORMAT_COLOR
    }

    pub fn is_bayer(&self) -> bool {
        use PixelFormat::*;

        matches!(self,
            BayerGR8 | BayerRG8 | BayerGB8 | BayerBG8
            | BayerGR12 | BayerRG12 | BayerGB12 | BayerBG12)
    }

    /// The GenICam name, as used by the `PixelFormat` feature.
    pub fn name(&self) -> &'static str {
        use PixelFormat::*;

        match self {
            Mono8 => "Mono8",
            Mono10 => "Mono10",
            Mono12 => "Mono12",
            Mono14 => "Mono14",
            Mono16 => "Mono16",
            BayerGR8 => "BayerGR8",
            BayerRG8 => "BayerRG8",
            BayerGB8 => "BayerGB8",
            BayerBG8 => "BayerBG8",
            BayerGR12 => "BayerGR12",
            BayerRG12 => "BayerRG12",
            BayerGB12 => "BayerGB12",
            BayerBG12 => "BayerBG12",
            Rgb8 => "RGB8",
            Bgr8 => "BGR8",
            Rgba8 => "RGBa8",
            Bgra8 => "BGRa8",
            Yuv422 => "YUV422Packed"
        }
    }

    pub const ALL: [PixelFormat; 18] = [
        PixelFormat::Mono8, PixelFormat::Mono10, PixelFormat::Mono12, PixelFormat::Mono14,
        PixelFormat::Mono16, PixelFormat::BayerGR8, PixelFormat::BayerRG8, PixelFormat::BayerGB8,
        PixelFormat::BayerBG8, PixelFormat::BayerGR12, PixelFormat::BayerRG12,
        PixelFormat::BayerGB12, PixelFormat::BayerBG12, PixelFormat::Rgb8, PixelFormat::Bgr8,
        PixelFormat::Rgba8, PixelFormat::Bgra8, PixelFormat::Yuv422
    ];
}

impl FromStr for PixelFormat {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        PixelFormat::ALL.iter().copied().find(|f| f.name() == s).ok_or(())
    }
}



#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_names() {
        for format in PixelFormat::ALL {
            assert_eq!(PixelFormat::from_code(format.code()), Some(format));
            assert_eq!(format.name().parse::<PixelFormat>(), Ok(format));
        }

        assert_eq!(PixelFormat::from_code(0xDEADBEEF), None);
    }

    #[test]
    fn layout_from_code_bits() {
        assert_eq!(PixelFormat::Mono8.bits_per_pixel(), 8);
        assert_eq!(PixelFormat::Mono12.bits_per_pixel(), 16);
        assert_eq!(PixelFormat::Rgb8.bits_per_pixel(), 24);
        assert_eq!(PixelFormat::Bgra8.bits_per_pixel(), 32);
        assert_eq!(PixelFormat::Rgb8.buffer_len(4, 2), 24);

        assert!(PixelFormat::Rgb8.is_color());
        assert!(!PixelFormat::BayerRG8.is_color());
        assert!(PixelFormat::BayerRG8.is_bayer());
    }
}
