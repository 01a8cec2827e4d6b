//! Error types for the transport layer.
//!
//! The node layer keeps returning [`zenoh::Result`]; everything above it
//! uses [`TransportError`], which converts back into `zenoh::Error` through
//! the blanket `From<E: Error>` impl on boxed errors.

use crate::topic_name::TopicNameError;

pub type TransportResult<T> = std::result::Result<T, TransportError>;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("cdr: {0}")]
    Cdr(#[from] cdr::Error),

    #[cfg(feature = "lz4")]
    #[error("lz4: {0}")]
    Lz4(#[from] lz4_flex::block::DecompressError),

    #[error("unsupported format '{found}', expected '{expected}'")]
    UnsupportedFormat { expected: String, found: String },

    #[error("inconsistent point cloud layout: {0}")]
    InconsistentLayout(String),
}

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("class '{lookup_name}' is not declared for base class '{base_class}'")]
    UnknownClass {
        lookup_name: String,
        base_class: String,
    },

    #[error("failed to create instance of '{lookup_name}': {reason}")]
    CreateClass { lookup_name: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("no plugins found for base topic '{base_topic}'")]
    NoPluginsLoaded { base_topic: String },

    #[error("unable to load plugin for transport '{transport}': {reason}")]
    TransportLoad { transport: String, reason: String },

    #[error("call to publish() on an invalid point_cloud_transport::Publisher")]
    InvalidPublisher,

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Topic(#[from] TopicNameError),

    #[error("middleware: {0}")]
    Middleware(zenoh::Error),
}

impl From<zenoh::Error> for TransportError {
    fn from(e: zenoh::Error) -> Self {
        TransportError::Middleware(e)
    }
}
