use crate::error::DeviceError;
use crate::Result;
use std::fmt;
use bitflags::bitflags;
use enum_as_inner::EnumAsInner;



#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeatureType {
    Int, Float, Enum, String, Bool, Command, Raw, None
}



#[derive(Clone, Debug, PartialEq, EnumAsInner)]
pub enum FeatureValue {
    Int(i64),
    Float(f64),
    Enum(String),
    String(String),
    Bool(bool),
    Raw(Vec<u8>)
}

impl FeatureValue {
    pub fn feature_type(&self) -> FeatureType {
        match self {
            FeatureValue::Int(_) => FeatureType::Int,
            FeatureValue::Float(_) => FeatureType::Float,
            FeatureValue::Enum(_) => FeatureType::Enum,
            FeatureValue::String(_) => FeatureType::String,
            FeatureValue::Bool(_) => FeatureType::Bool,
            FeatureValue::Raw(_) => FeatureType::Raw
        }
    }

    /// Interpret a command-line literal: integers, then floats, then
    /// booleans, falling back to a string.
    pub fn parse_literal(s: &str) -> Self {
        if let Ok(v) = s.parse::<i64>() { return FeatureValue::Int(v) }
        if let Ok(v) = s.parse::<f64>() { return FeatureValue::Float(v) }

        match s {
            "true" | "True" => FeatureValue::Bool(true),
            "false" | "False" => FeatureValue::Bool(false),
            _ => FeatureValue::String(s.to_string())
        }
    }

    /// Convert a loosely typed value to the type a feature actually has.
    /// An integer may become a float, and a string may name an enum entry.
    pub fn coerce(self, name: &str, target: FeatureType) -> Result<Self> {
        use FeatureValue::*;

        let value = match (self, target) {
            (v, t) if v.feature_type() == t => v,
            (Int(v), FeatureType::Float) => Float(v as f64),
            (Float(v), FeatureType::Int) if v.fract() == 0.0 => Int(v as i64),
            (String(v), FeatureType::Enum) => Enum(v),
            (Enum(v), FeatureType::String) => String(v),
            (Int(0), FeatureType::Bool) => Bool(false),
            (Int(1), FeatureType::Bool) => Bool(true),
            _ => return Err(DeviceError::WrongType.on_feature(name))
        };

        Ok(value)
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Int(v) => write!(f, "{v}"),
            FeatureValue::Float(v) => write!(f, "{v}"),
            FeatureValue::Enum(v) | FeatureValue::String(v) => f.write_str(v),
            FeatureValue::Bool(v) => write!(f, "{v}"),
            FeatureValue::Raw(v) => write!(f, "<{} raw bytes>", v.len())
        }
    }
}



/// Valid values of a feature, where the SDK defines any.
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureRange {
    Int { min: i64, max: i64, increment: i64 },
    Float { min: f64, max: f64 },
    Enum(Vec<String>),
    None
}

impl FeatureRange {
    pub fn contains(&self, value: &FeatureValue) -> bool {
        match (self, value) {
            (FeatureRange::Int { min, max, increment }, FeatureValue::Int(v)) => {
                *v >= *min && *v <= *max && (*increment <= 1 || (*v - *min) % *increment == 0)
            },
            (FeatureRange::Float { min, max }, FeatureValue::Float(v)) => *v >= *min && *v <= *max,
            (FeatureRange::Enum(entries), FeatureValue::Enum(v)) => entries.iter().any(|e| e == v),
            (FeatureRange::None, _) => true,
            _ => false
        }
    }
}

impl fmt::Display for FeatureRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureRange::Int { min, max, increment } => write!(f, "[{min}, {max}] step {increment}"),
            FeatureRange::Float { min, max } => write!(f, "[{min}, {max}]"),
            FeatureRange::Enum(entries) => write!(f, "{{{}}}", entries.join(", ")),
            FeatureRange::None => f.write_str("-")
        }
    }
}



bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct FeatureFlag: u32 {
        const NONE = 0;
        const READ = 1;
        const WRITE = 2;
        const UNDOCUMENTED = 4;
        const VOLATILE = 8;
        const MODIFY_WRITE = 16;
    }
}



#[derive(Debug, Clone)]
pub struct FeatureInfo {
    pub name: String,
    pub data_type: FeatureType,
    pub flags: FeatureFlag
}



pub trait HasFeatures {
    fn list_features(&self) -> Result<Vec<FeatureInfo>>;
    fn feature_info(&self, name: &str) -> Result<FeatureInfo>;
    fn get_feature(&self, name: &str) -> Result<FeatureValue>;
    fn set_feature(&self, name: &str, value: FeatureValue) -> Result<()>;
    fn feature_range(&self, name: &str) -> Result<FeatureRange>;
    fn run_command(&self, name: &str) -> Result<()>;
    fn is_command_done(&self, name: &str) -> Result<bool>;

    /// Set a feature from a loosely typed value, converting it to the
    /// feature's declared type first.
    fn apply_feature(&self, name: &str, value: FeatureValue) -> Result<()> {
        let info = self.feature_info(name)?;
        self.set_feature(name, value.coerce(name, info.data_type)?)
    }

    fn set_feature_int(&self, name: &str, v: i64) -> Result<()> {
        self.set_feature(name, FeatureValue::Int(v))
    }

    fn set_feature_float(&self, name: &str, v: f64) -> Result<()> {
        self.set_feature(name, FeatureValue::Float(v))
    }

    fn set_feature_enum(&self, name: &str, v: &str) -> Result<()> {
        self.set_feature(name, FeatureValue::Enum(v.to_string()))
    }

    fn set_feature_string(&self, name: &str, v: &str) -> Result<()> {
        self.set_feature(name, FeatureValue::String(v.to_string()))
    }

    fn set_feature_bool(&self, name: &str, v: bool) -> Result<()> {
        self.set_feature(name, FeatureValue::Bool(v))
    }

    fn set_feature_raw(&self, name: &str, v: Vec<u8>) -> Result<()> {
        self.set_feature(name, FeatureValue::Raw(v))
    }

    fn get_feature_int(&self, name: &str) -> Result<i64> {
        self.get_feature(name)?.into_int().map_err(|_| DeviceError::WrongType.on_feature(name))
    }

    fn get_feature_float(&self, name: &str) -> Result<f64> {
        self.get_feature(name)?.into_float().map_err(|_| DeviceError::WrongType.on_feature(name))
    }

    fn get_feature_enum(&self, name: &str) -> Result<String> {
        self.get_feature(name)?.into_enum().map_err(|_| DeviceError::WrongType.on_feature(name))
    }

    fn get_feature_string(&self, name: &str) -> Result<String> {
        self.get_feature(name)?.into_string().map_err(|_| DeviceError::WrongType.on_feature(name))
    }

    fn get_feature_bool(&self, name: &str) -> Result<bool> {
        self.get_feature(name)?.into_bool().map_err(|_| DeviceError::WrongType.on_feature(name))
    }

    fn get_feature_raw(&self, name: &str) -> Result<Vec<u8>> {
        self.get_feature(name)?.into_raw().map_err(|_| DeviceError::WrongType.on_feature(name))
    }
}
