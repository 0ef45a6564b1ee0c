use serde::{Deserialize, Serialize};
use serde_json::Value;
use zarrs::array::codec::{
    bytes_to_bytes::blosc::{BloscCompressionLevel, BloscCompressor, BloscShuffleMode},
    BloscCodec, BytesToBytesCodecTraits, ZstdCodec,
};

use crate::{error::MaterializationError, store::StoredCodec};

/// Per-chunk compression applied when a dataset is materialized.
///
/// Readers never need this value: the codec chain is recorded in the
/// array metadata of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "id", rename_all = "snake_case")]
pub enum Codec {
    None,
    Blosc {
        cname: BloscCompressor,
        clevel: u8,
        /// `None` picks bit-shuffle for single-byte elements and byte-shuffle
        /// otherwise.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        shuffle: Option<BloscShuffleMode>,
    },
    Zstd {
        level: i32,
        #[serde(default)]
        checksum: bool,
    },
}

impl Codec {
    /// Blosc with the LZ4 compressor and automatic shuffle.
    pub fn blosc_lz4(clevel: u8) -> Self {
        Codec::Blosc {
            cname: BloscCompressor::LZ4,
            clevel,
            shuffle: None,
        }
    }

    pub fn zstd(level: i32) -> Self {
        Codec::Zstd {
            level,
            checksum: false,
        }
    }

    pub fn is_compressed(&self) -> bool {
        !matches!(self, Codec::None)
    }

    /// Short human-readable form, e.g. `blosc-lz4-5`.
    pub fn label(&self) -> String {
        match self {
            Codec::None => "none".to_owned(),
            Codec::Blosc { cname, clevel, .. } => {
                let cname = serde_json::to_value(cname)
                    .ok()
                    .and_then(|value| value.as_str().map(str::to_owned))
                    .unwrap_or_else(|| format!("{cname:?}").to_lowercase());
                format!("blosc-{cname}-{clevel}")
            }
            Codec::Zstd { level, .. } => format!("zstd-{level}"),
        }
    }

    /// Was a codec chain read from array metadata written with this codec?
    ///
    /// The array-to-bytes `bytes` codec is ignored. Blosc is matched on
    /// compressor and level, zstd on level and checksum.
    pub fn matches_stored(&self, stored: &[StoredCodec]) -> bool {
        let compressors: Vec<&StoredCodec> =
            stored.iter().filter(|codec| codec.name != "bytes").collect();
        match (self, compressors.as_slice()) {
            (Codec::None, []) => true,
            (Codec::Blosc { cname, clevel, .. }, [codec]) => {
                codec.name == "blosc"
                    && codec.configuration.get("cname") == serde_json::to_value(cname).ok().as_ref()
                    && codec.configuration.get("clevel").and_then(Value::as_u64)
                        == Some(u64::from(*clevel))
            }
            (Codec::Zstd { level, checksum }, [codec]) => {
                codec.name == "zstd"
                    && codec.configuration.get("level").and_then(Value::as_i64)
                        == Some(i64::from(*level))
                    && codec
                        .configuration
                        .get("checksum")
                        .and_then(Value::as_bool)
                        .unwrap_or(false)
                        == *checksum
            }
            _ => false,
        }
    }

    /// The bytes-to-bytes codec chain for an array with `element_size` byte
    /// elements. Empty for [`Codec::None`].
    pub(crate) fn bytes_to_bytes_codecs(
        &self,
        element_size: usize,
    ) -> Result<Vec<Box<dyn BytesToBytesCodecTraits>>, MaterializationError> {
        match self {
            Codec::None => Ok(vec![]),
            Codec::Blosc {
                cname,
                clevel,
                shuffle,
            } => {
                let level = BloscCompressionLevel::try_from(*clevel).map_err(|_| {
                    MaterializationError::Codec {
                        msg: format!("blosc clevel {clevel} is out of range 0..=9"),
                    }
                })?;
                let shuffle = shuffle.unwrap_or(if element_size == 1 {
                    BloscShuffleMode::BitShuffle
                } else {
                    BloscShuffleMode::Shuffle
                });
                let codec = BloscCodec::new(*cname, level, None, shuffle, Some(element_size))
                    .map_err(|err| MaterializationError::Codec {
                        msg: err.to_string(),
                    })?;
                let codec: Box<dyn BytesToBytesCodecTraits> = Box::new(codec);
                Ok(vec![codec])
            }
            Codec::Zstd { level, checksum } => {
                let codec: Box<dyn BytesToBytesCodecTraits> =
                    Box::new(ZstdCodec::new(*level, *checksum));
                Ok(vec![codec])
            }
        }
    }
}
