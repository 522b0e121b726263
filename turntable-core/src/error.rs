/// Error types for model loading and configuration
use thiserror::Error;

/// Failure while turning model bytes into a [`crate::LoadedAsset`].
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("glTF error: {0}")]
    Gltf(#[from] gltf::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("buffer {index} ({uri}) was not resolved")]
    MissingBuffer { index: usize, uri: String },

    #[error("buffer {index} is too short: need {needed} bytes, have {actual}")]
    BufferTooShort {
        index: usize,
        needed: usize,
        actual: usize,
    },

    #[error("invalid data URI: {0}")]
    InvalidDataUri(String),

    #[error("mesh {mesh:?} has a primitive without positions")]
    MissingPositions { mesh: String },

    #[error("mesh {mesh:?} references vertex {index} but only has {count} vertices")]
    IndexOutOfRange {
        mesh: String,
        index: u32,
        count: usize,
    },

    #[error("STL error: {0}")]
    Stl(String),

    #[error("unsupported model format: {0}")]
    UnsupportedFormat(String),
}

/// Failure while reading a [`crate::ViewerConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
