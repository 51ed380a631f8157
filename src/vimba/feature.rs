use super::sys::*;
use super::util::{feature_cstring, pointer_to_string};
use crate::error::DeviceError;
use crate::feature::*;
use crate::Result;
use std::ffi::c_char;
use std::{mem, ptr};



const FEATURE_INFO_SIZE: u32 = mem::size_of::<VmbFeatureInfo_t>() as u32;



impl TryFrom<u32> for FeatureType {
    type Error = ();

    fn try_from(v: u32) -> std::result::Result<Self, Self::Error> {
        use VmbFeatureDataType::*;
        use FeatureType::*;

        match v {
            VmbFeatureDataInt => Ok(Int),
            VmbFeatureDataFloat => Ok(Float),
            VmbFeatureDataEnum => Ok(Enum),
            VmbFeatureDataString => Ok(String),
            VmbFeatureDataBool => Ok(Bool),
            VmbFeatureDataCommand => Ok(Command),
            VmbFeatureDataRaw => Ok(Raw),
            VmbFeatureDataNone => Ok(None),
            _ => Err(())
        }
    }
}

fn feature_info_from_c(info: &VmbFeatureInfo_t) -> FeatureInfo {
    FeatureInfo {
        name: unsafe { pointer_to_string(info.name) },
        data_type: FeatureType::try_from(info.featureDataType).unwrap_or(FeatureType::None),
        flags: FeatureFlag::from_bits_truncate(info.featureFlags)
    }
}

fn query_info(handle: VmbHandle_t, name: &str) -> Result<(VmbFeatureInfo_t, FeatureType)> {
    let name_c = feature_cstring(name, name)?;
    let mut info = VmbFeatureInfo_t::default();

    vmbcall!(VmbFeatureInfoQuery, handle, name_c.as_ptr(), &mut info, FEATURE_INFO_SIZE)
        .map_err(|e| e.on_feature(name))?;

    let data_type = FeatureType::try_from(info.featureDataType)
        .map_err(|_| DeviceError::WrongType.on_feature(name))?;

    Ok((info, data_type))
}



impl HasFeatures for VmbHandle_t {
    fn list_features(&self) -> Result<Vec<FeatureInfo>> {
        let mut n: u32 = 0;

        vmbcall!(VmbFeaturesList, *self, ptr::null_mut(), 0, &mut n, FEATURE_INFO_SIZE)
            .map_err(|e| e.during("list features"))?;

        let mut features = vec![VmbFeatureInfo_t::default(); n as usize];

        vmbcall!(VmbFeaturesList, *self, features.as_mut_ptr(), n, &mut n, FEATURE_INFO_SIZE)
            .map_err(|e| e.during("list features"))?;

        features.truncate(n as usize);

        Ok(features.iter().map(feature_info_from_c).collect())
    }

    fn feature_info(&self, name: &str) -> Result<FeatureInfo> {
        let (info, _) = query_info(*self, name)?;

        Ok(feature_info_from_c(&info))
    }

    fn get_feature(&self, name: &str) -> Result<FeatureValue> {
        use FeatureValue::*;

        let (_, data_type) = query_info(*self, name)?;
        let name_c = feature_cstring(name, name)?;
        let name_ptr = name_c.as_ptr();
        let on_feature = |e: DeviceError| e.on_feature(name);

        match data_type {
            FeatureType::Int => {
                let mut v: i64 = 0;
                vmbcall!(VmbFeatureIntGet, *self, name_ptr, &mut v).map_err(on_feature)?;

                Ok(Int(v))
            },
            FeatureType::Float => {
                let mut v: f64 = 0.0;
                vmbcall!(VmbFeatureFloatGet, *self, name_ptr, &mut v).map_err(on_feature)?;

                Ok(Float(v))
            },
            FeatureType::Enum => {
                let mut v: *const c_char = ptr::null();
                vmbcall!(VmbFeatureEnumGet, *self, name_ptr, &mut v).map_err(on_feature)?;

                Ok(Enum(unsafe { pointer_to_string(v) }))
            },
            FeatureType::String => {
                let mut len: u32 = 0;
                vmbcall!(VmbFeatureStringGet, *self, name_ptr, ptr::null_mut(), 0, &mut len)
                    .map_err(on_feature)?;

                let mut buf = vec![0u8; len as usize];
                vmbcall!(
                    VmbFeatureStringGet,
                    *self, name_ptr, buf.as_mut_ptr() as *mut c_char, len, &mut len
                ).map_err(on_feature)?;

                // Vimba counts the terminating zero
                let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
                Ok(String(std::string::String::from_utf8_lossy(&buf[..end]).into_owned()))
            },
            FeatureType::Bool => {
                let mut v: VmbBool_t = 0;
                vmbcall!(VmbFeatureBoolGet, *self, name_ptr, &mut v).map_err(on_feature)?;

                Ok(Bool(v != 0))
            },
            FeatureType::Raw => {
                let mut len: u32 = 0;
                vmbcall!(VmbFeatureRawLengthQuery, *self, name_ptr, &mut len).map_err(on_feature)?;

                let mut buf = vec![0u8; len as usize];
                let mut filled: u32 = 0;
                vmbcall!(
                    VmbFeatureRawGet,
                    *self, name_ptr, buf.as_mut_ptr() as *mut c_char, len, &mut filled
                ).map_err(on_feature)?;

                buf.truncate(filled as usize);
                Ok(Raw(buf))
            },
            FeatureType::Command | FeatureType::None => Err(DeviceError::WrongType.on_feature(name))
        }
    }

    fn set_feature(&self, name: &str, value: FeatureValue) -> Result<()> {
        use FeatureValue::*;

        let name_c = feature_cstring(name, name)?;
        let name_ptr = name_c.as_ptr();

        let res = match value {
            Int(v) => vmbcall!(VmbFeatureIntSet, *self, name_ptr, v),
            Float(v) => vmbcall!(VmbFeatureFloatSet, *self, name_ptr, v),
            Enum(v) => {
                let v = feature_cstring(name, &v)?;

                vmbcall!(VmbFeatureEnumSet, *self, name_ptr, v.as_ptr())
            },
            String(v) => {
                let v = feature_cstring(name, &v)?;

                vmbcall!(VmbFeatureStringSet, *self, name_ptr, v.as_ptr())
            },
            Bool(v) => vmbcall!(VmbFeatureBoolSet, *self, name_ptr, v as VmbBool_t),
            Raw(v) => {
                let ptr = v.as_ptr() as *const c_char;
                let len = v.len() as u32;

                vmbcall!(VmbFeatureRawSet, *self, name_ptr, ptr, len)
            }
        };

        res.map_err(|e| e.on_feature(name))
    }

    fn feature_range(&self, name: &str) -> Result<FeatureRange> {
        let (_, data_type) = query_info(*self, name)?;
        let name_c = feature_cstring(name, name)?;
        let name_ptr = name_c.as_ptr();
        let on_feature = |e: DeviceError| e.on_feature(name);

        match data_type {
            FeatureType::Int => {
                let (mut min, mut max, mut increment) = (0i64, 0i64, 1i64);
                vmbcall!(VmbFeatureIntRangeQuery, *self, name_ptr, &mut min, &mut max).map_err(on_feature)?;
                vmbcall!(VmbFeatureIntIncrementQuery, *self, name_ptr, &mut increment).map_err(on_feature)?;

                Ok(FeatureRange::Int { min, max, increment })
            },
            FeatureType::Float => {
                let (mut min, mut max) = (0.0f64, 0.0f64);
                vmbcall!(VmbFeatureFloatRangeQuery, *self, name_ptr, &mut min, &mut max).map_err(on_feature)?;

                Ok(FeatureRange::Float { min, max })
            },
            FeatureType::Enum => {
                let mut n: u32 = 0;
                vmbcall!(VmbFeatureEnumRangeQuery, *self, name_ptr, ptr::null_mut(), 0, &mut n)
                    .map_err(on_feature)?;

                let mut entries = vec![ptr::null::<c_char>(); n as usize];
                vmbcall!(VmbFeatureEnumRangeQuery, *self, name_ptr, entries.as_mut_ptr(), n, &mut n)
                    .map_err(on_feature)?;

                entries.truncate(n as usize);
                Ok(FeatureRange::Enum(entries.into_iter().map(|e| unsafe { pointer_to_string(e) }).collect()))
            },
            _ => Ok(FeatureRange::None)
        }
    }

    fn run_command(&self, name: &str) -> Result<()> {
        let name_c = feature_cstring(name, name)?;

        vmbcall!(VmbFeatureCommandRun, *self, name_c.as_ptr()).map_err(|e| e.on_feature(name))
    }

    fn is_command_done(&self, name: &str) -> Result<bool> {
        let name_c = feature_cstring(name, name)?;
        let mut done: VmbBool_t = 0;

        vmbcall!(VmbFeatureCommandIsDone, *self, name_c.as_ptr(), &mut done)
            .map_err(|e| e.on_feature(name))?;

        Ok(done != 0)
    }
}
