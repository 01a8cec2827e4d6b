//! `raw`: the cloud itself, CDR-encoded on the base topic.

use crate::entity::TypeInfo;
use crate::error::CodecError;
use crate::msg::{PointCloud2, WithTypeInfo, from_cdr, to_cdr};
use crate::simple::Codec;

pub const TRANSPORT: &str = "raw";

#[derive(Debug, Default, Clone, Copy)]
pub struct RawCodec;

impl Codec for RawCodec {
    fn transport_name(&self) -> &str {
        TRANSPORT
    }

    fn wire_type(&self) -> TypeInfo {
        PointCloud2::type_info()
    }

    fn topic_for(&self, base_topic: &str) -> String {
        base_topic.to_string()
    }

    fn encode(&self, msg: &PointCloud2) -> Result<Vec<u8>, CodecError> {
        to_cdr(msg)
    }

    fn decode(&self, payload: &[u8]) -> Result<PointCloud2, CodecError> {
        from_cdr(payload)
    }
}
