//! `lz4`: LZ4 block compression of the point buffer, published as a
//! `CompressedPointCloud2` on `<base_topic>/lz4`.

use crate::entity::TypeInfo;
use crate::error::CodecError;
use crate::msg::{CompressedPointCloud2, PointCloud2, WithTypeInfo, from_cdr, to_cdr};
use crate::simple::Codec;

pub const TRANSPORT: &str = "lz4";
const FORMAT: &str = "lz4";
/// LZ4 cannot expand a block by more than this.
const MAX_RATIO: usize = 256;

#[derive(Debug, Default, Clone, Copy)]
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn transport_name(&self) -> &str {
        TRANSPORT
    }

    fn wire_type(&self) -> TypeInfo {
        CompressedPointCloud2::type_info()
    }

    fn encode(&self, msg: &PointCloud2) -> Result<Vec<u8>, CodecError> {
        msg.validate()?;
        let compressed = lz4_flex::block::compress_prepend_size(&msg.data);
        to_cdr(&CompressedPointCloud2::with_layout_of(msg, FORMAT, compressed))
    }

    fn decode(&self, payload: &[u8]) -> Result<PointCloud2, CodecError> {
        let compressed: CompressedPointCloud2 = from_cdr(payload)?;
        if compressed.format != FORMAT {
            return Err(CodecError::UnsupportedFormat {
                expected: FORMAT.to_string(),
                found: compressed.format,
            });
        }
        let expected = expected_size(&compressed)?;
        let (prefix, body) = compressed
            .compressed_data
            .split_first_chunk::<4>()
            .ok_or_else(|| CodecError::InconsistentLayout("missing lz4 size prefix".into()))?;
        let announced = u32::from_le_bytes(*prefix) as usize;
        if announced != expected {
            return Err(CodecError::InconsistentLayout(format!(
                "lz4 payload announces {announced} bytes, layout needs {expected}"
            )));
        }
        if expected > body.len().saturating_mul(MAX_RATIO) {
            return Err(CodecError::InconsistentLayout(format!(
                "{} compressed bytes cannot hold {expected} bytes",
                body.len()
            )));
        }
        let data = lz4_flex::block::decompress(body, expected)?;
        let cloud = compressed.into_cloud(data);
        cloud.validate()?;
        Ok(cloud)
    }
}

/// Size of the point buffer described by the layout.
fn expected_size(msg: &CompressedPointCloud2) -> Result<usize, CodecError> {
    (msg.row_step as usize)
        .checked_mul(msg.height as usize)
        .ok_or_else(|| CodecError::InconsistentLayout("row_step * height overflows".into()))
}
