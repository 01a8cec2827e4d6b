//! Message types carried by the transports and their CDR encoding.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::entity::{TypeHash, TypeInfo};
use crate::error::CodecError;

/// Type name and hash used to key topics on the wire.
pub trait WithTypeInfo {
    fn type_info() -> TypeInfo;
}

pub fn to_cdr<T: Serialize>(msg: &T) -> Result<Vec<u8>, CodecError> {
    Ok(cdr::serialize::<_, _, cdr::CdrLe>(msg, cdr::Infinite)?)
}

pub fn from_cdr<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    Ok(cdr::deserialize::<T>(bytes)?)
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
pub struct Time {
    pub sec: i32,
    pub nanosec: u32,
}

impl Time {
    pub fn now() -> Self {
        Self::since_epoch(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default(),
        )
    }

    /// Seconds past `i32::MAX` clamp instead of wrapping.
    pub fn since_epoch(elapsed: Duration) -> Self {
        Self {
            sec: i32::try_from(elapsed.as_secs()).unwrap_or(i32::MAX),
            nanosec: elapsed.subsec_nanos(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Header {
    pub stamp: Time,
    pub frame_id: String,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::EnumIter,
)]
#[strum(serialize_all = "UPPERCASE")]
#[repr(u8)]
pub enum PointFieldType {
    Int8 = 1,
    Uint8 = 2,
    Int16 = 3,
    Uint16 = 4,
    Int32 = 5,
    Uint32 = 6,
    Float32 = 7,
    Float64 = 8,
}

impl PointFieldType {
    pub fn from_u8(datatype: u8) -> Option<Self> {
        use strum::IntoEnumIterator;
        Self::iter().find(|t| *t as u8 == datatype)
    }

    pub fn size(&self) -> u32 {
        match self {
            Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct PointField {
    pub name: String,
    pub offset: u32,
    pub datatype: u8,
    pub count: u32,
}

impl PointField {
    pub fn new(name: &str, offset: u32, datatype: PointFieldType, count: u32) -> Self {
        Self {
            name: name.to_string(),
            offset,
            datatype: datatype as u8,
            count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct PointCloud2 {
    pub header: Header,
    pub height: u32,
    pub width: u32,
    pub fields: Vec<PointField>,
    pub is_bigendian: bool,
    pub point_step: u32,
    pub row_step: u32,
    pub data: Vec<u8>,
    pub is_dense: bool,
}

const POINT_CLOUD2_DEFINITION: &str = "std_msgs/Header header\n\
uint32 height\nuint32 width\nsensor_msgs/PointField[] fields\n\
bool is_bigendian\nuint32 point_step\nuint32 row_step\nuint8[] data\nbool is_dense";

impl WithTypeInfo for PointCloud2 {
    fn type_info() -> TypeInfo {
        TypeInfo::new(
            "sensor_msgs::msg::dds_::PointCloud2_",
            TypeHash::from_definition(POINT_CLOUD2_DEFINITION),
        )
    }
}

impl PointCloud2 {
    /// Unorganized cloud of float32 XYZ points.
    pub fn from_xyz(frame_id: &str, points: &[[f32; 3]]) -> Self {
        let point_step = 12;
        let mut data = Vec::with_capacity(points.len() * point_step as usize);
        for p in points {
            for v in p {
                data.extend_from_slice(&v.to_le_bytes());
            }
        }
        Self {
            header: Header {
                stamp: Time::now(),
                frame_id: frame_id.to_string(),
            },
            height: 1,
            width: points.len() as u32,
            fields: vec![
                PointField::new("x", 0, PointFieldType::Float32, 1),
                PointField::new("y", 4, PointFieldType::Float32, 1),
                PointField::new("z", 8, PointFieldType::Float32, 1),
            ],
            is_bigendian: false,
            point_step,
            row_step: point_step * points.len() as u32,
            data,
            is_dense: true,
        }
    }

    pub fn point_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn field(&self, name: &str) -> Option<&PointField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check that the buffer size agrees with the declared layout.
    pub fn validate(&self) -> Result<(), CodecError> {
        let min_row = self.width as u64 * self.point_step as u64;
        if (self.row_step as u64) < min_row {
            return Err(CodecError::InconsistentLayout(format!(
                "row_step {} smaller than width * point_step {}",
                self.row_step, min_row
            )));
        }
        let expected = self.row_step as u64 * self.height as u64;
        if self.data.len() as u64 != expected {
            return Err(CodecError::InconsistentLayout(format!(
                "data holds {} bytes, layout needs {}",
                self.data.len(),
                expected
            )));
        }
        for field in &self.fields {
            let datatype = PointFieldType::from_u8(field.datatype).ok_or_else(|| {
                CodecError::InconsistentLayout(format!(
                    "field '{}' has unknown datatype {}",
                    field.name, field.datatype
                ))
            })?;
            let end = field.offset as u64 + datatype.size() as u64 * field.count.max(1) as u64;
            if end > self.point_step as u64 {
                return Err(CodecError::InconsistentLayout(format!(
                    "field '{}' ends at byte {} past point_step {}",
                    field.name, end, self.point_step
                )));
            }
        }
        Ok(())
    }

    /// XYZ triples of a cloud whose x, y and z fields are float32.
    pub fn xyz(&self) -> Result<Vec<[f32; 3]>, CodecError> {
        self.validate()?;
        let mut offsets = [0usize; 3];
        for (slot, name) in offsets.iter_mut().zip(["x", "y", "z"]) {
            let field = self
                .field(name)
                .filter(|f| f.datatype == PointFieldType::Float32 as u8)
                .ok_or_else(|| {
                    CodecError::InconsistentLayout(format!("no float32 field '{name}'"))
                })?;
            *slot = field.offset as usize;
        }

        let read = |bytes: &[u8]| {
            let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
            if self.is_bigendian {
                f32::from_be_bytes(raw)
            } else {
                f32::from_le_bytes(raw)
            }
        };

        let mut points = Vec::with_capacity(self.point_count());
        for row in self.data.chunks_exact(self.row_step.max(1) as usize) {
            for point in row
                .chunks_exact(self.point_step.max(1) as usize)
                .take(self.width as usize)
            {
                points.push(offsets.map(|o| read(&point[o..o + 4])));
            }
        }
        Ok(points)
    }
}

/// A `PointCloud2` whose `data` went through a compression transport.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct CompressedPointCloud2 {
    pub header: Header,
    pub height: u32,
    pub width: u32,
    pub fields: Vec<PointField>,
    pub is_bigendian: bool,
    pub point_step: u32,
    pub row_step: u32,
    pub is_dense: bool,
    pub format: String,
    pub compressed_data: Vec<u8>,
}

const COMPRESSED_POINT_CLOUD2_DEFINITION: &str = "std_msgs/Header header\n\
uint32 height\nuint32 width\nsensor_msgs/PointField[] fields\n\
bool is_bigendian\nuint32 point_step\nuint32 row_step\nbool is_dense\n\
string format\nuint8[] compressed_data";

impl WithTypeInfo for CompressedPointCloud2 {
    fn type_info() -> TypeInfo {
        TypeInfo::new(
            "point_cloud_interfaces::msg::dds_::CompressedPointCloud2_",
            TypeHash::from_definition(COMPRESSED_POINT_CLOUD2_DEFINITION),
        )
    }
}

impl CompressedPointCloud2 {
    /// Copy the layout of `cloud`, leaving the payload to the caller.
    pub fn with_layout_of(cloud: &PointCloud2, format: &str, compressed_data: Vec<u8>) -> Self {
        Self {
            header: cloud.header.clone(),
            height: cloud.height,
            width: cloud.width,
            fields: cloud.fields.clone(),
            is_bigendian: cloud.is_bigendian,
            point_step: cloud.point_step,
            row_step: cloud.row_step,
            is_dense: cloud.is_dense,
            format: format.to_string(),
            compressed_data,
        }
    }

    pub fn into_cloud(self, data: Vec<u8>) -> PointCloud2 {
        PointCloud2 {
            header: self.header,
            height: self.height,
            width: self.width,
            fields: self.fields,
            is_bigendian: self.is_bigendian,
            point_step: self.point_step,
            row_step: self.row_step,
            data,
            is_dense: self.is_dense,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud() -> PointCloud2 {
        PointCloud2::from_xyz("lidar", &[[1.0, 2.0, 3.0], [-4.5, 0.0, 9.25]])
    }

    #[test]
    fn xyz_layout() {
        let cloud = cloud();
        assert_eq!(cloud.point_count(), 2);
        assert_eq!(cloud.data.len(), 24);
        assert!(cloud.validate().is_ok());
        assert_eq!(cloud.xyz().unwrap(), vec![[1.0, 2.0, 3.0], [-4.5, 0.0, 9.25]]);
    }

    #[test]
    fn xyz_requires_float32_fields() {
        let mut cloud = cloud();
        cloud.fields[1].datatype = PointFieldType::Float64 as u8;
        assert!(matches!(cloud.xyz(), Err(CodecError::InconsistentLayout(_))));

        let mut cloud = self::cloud();
        cloud.fields.retain(|f| f.name != "z");
        assert!(cloud.xyz().is_err());
    }

    #[test]
    fn time_clamps_past_2038() {
        let t = Time::since_epoch(Duration::new(1_700_000_000, 42));
        assert_eq!(t, Time { sec: 1_700_000_000, nanosec: 42 });

        let t = Time::since_epoch(Duration::new(i32::MAX as u64 + 10, 7));
        assert_eq!(t.sec, i32::MAX);
        assert_eq!(t.nanosec, 7);
    }

    #[test]
    fn validate_catches_short_data() {
        let mut cloud = cloud();
        cloud.data.pop();
        assert!(matches!(cloud.validate(), Err(CodecError::InconsistentLayout(_))));

        let mut cloud = self::cloud();
        cloud.row_step = 4;
        assert!(cloud.validate().is_err());

        let mut cloud = self::cloud();
        cloud.fields[2].offset = 10;
        assert!(cloud.validate().is_err());
    }

    #[test]
    fn cdr_preserves_cloud() {
        let cloud = cloud();
        let bytes = to_cdr(&cloud).unwrap();
        // CDR little-endian encapsulation header
        assert_eq!(&bytes[..2], &[0x00, 0x01]);
        assert_eq!(from_cdr::<PointCloud2>(&bytes).unwrap(), cloud);
        assert!(from_cdr::<PointCloud2>(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn field_types() {
        assert_eq!(PointFieldType::from_u8(7), Some(PointFieldType::Float32));
        assert_eq!(PointFieldType::from_u8(9), None);
        assert_eq!(PointFieldType::Float64.size(), 8);
        assert_eq!(PointFieldType::Uint16.to_string(), "UINT16");
    }

    #[test]
    fn type_info_differs_per_message() {
        assert_ne!(PointCloud2::type_info(), CompressedPointCloud2::type_info());
    }
}
