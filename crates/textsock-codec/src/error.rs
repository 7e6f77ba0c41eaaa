/// Errors that can occur while configuring text codecs.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The encoding label does not name a supported encoding.
    #[error("unknown text encoding {0:?} (supported: utf-8, latin1, ascii)")]
    UnknownEncoding(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;
