use std::time::{SystemTime, UNIX_EPOCH};

use zenoh::bytes::ZBytes;
use zenoh_ext::{ZDeserializer, ZSerializer};

const GID_STORAGE_SIZE: usize = 16;

pub type GidArray = [u8; GID_STORAGE_SIZE];

/// Per-sample metadata sent next to every payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub sequence_number: i64,
    pub source_timestamp: i64,
    pub source_gid: GidArray,
}

impl Attachment {
    pub fn new(sequence_number: i64, source_gid: GidArray) -> Self {
        let source_timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or_default();
        Self {
            sequence_number,
            source_timestamp,
            source_gid,
        }
    }
}

impl TryFrom<&ZBytes> for Attachment {
    type Error = zenoh::Error;
    fn try_from(value: &ZBytes) -> Result<Self, Self::Error> {
        let mut des = ZDeserializer::new(value);
        let sequence_number = des.deserialize::<i64>()?;
        let source_timestamp = des.deserialize::<i64>()?;
        let source_gid = des.deserialize::<GidArray>()?;
        Ok(Attachment {
            sequence_number,
            source_timestamp,
            source_gid,
        })
    }
}

impl From<Attachment> for ZBytes {
    fn from(value: Attachment) -> Self {
        let mut ser = ZSerializer::new();
        ser.serialize(value.sequence_number);
        ser.serialize(value.source_timestamp);
        ser.serialize(value.source_gid);
        ser.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_survives_zbytes() {
        let att = Attachment::new(42, [7u8; GID_STORAGE_SIZE]);
        let bytes = ZBytes::from(att.clone());
        let back = Attachment::try_from(&bytes).unwrap();
        assert_eq!(back, att);
    }
}
