//! Error types for `ZipThumb`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `ZipThumb` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file or stream operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The outer archive could not be opened or an entry could not be read.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// An archive entry is larger than the configured read limit.
    #[error("entry '{name}' is {size} bytes (limit {limit})")]
    EntryTooLarge {
        /// Entry path inside the archive.
        name: String,
        /// Declared uncompressed size.
        size: u64,
        /// Configured limit.
        limit: u64,
    },

    /// An entry produced fewer bytes than its declared size.
    #[error("entry '{name}' is truncated: expected {expected} bytes, read {actual}")]
    TruncatedEntry {
        /// Entry path inside the archive.
        name: String,
        /// Declared size.
        expected: u64,
        /// Bytes actually read.
        actual: u64,
    },

    // ==================== Catalog Errors ====================
    /// A catalog CSV entry does not have the expected preamble/header shape.
    #[error("malformed catalog '{entry}': {reason}")]
    MalformedCatalog {
        /// Catalog entry path.
        entry: String,
        /// What was wrong with it.
        reason: String,
    },

    /// CSV tokenizer error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // ==================== Container Errors ====================
    /// The stream did not match any known container signature.
    #[error("unrecognized container: {name}")]
    UnrecognizedContainer {
        /// Name of the stream.
        name: String,
    },

    /// A nested container failed to unpack.
    #[error("failed to unpack '{child}' from '{parent}': {source}")]
    ContainerUnpack {
        /// The container (or archive entry) holding the failing node.
        parent: String,
        /// The failing node.
        child: String,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// Container nesting exceeded the configured depth or node budget.
    #[error("container too deep at '{path}' (depth {depth}, {visited} nodes visited)")]
    ContainerTooDeep {
        /// Chain of node names leading to the rejected node.
        path: String,
        /// Depth of the rejected node.
        depth: usize,
        /// Nodes visited so far in this call.
        visited: usize,
    },

    /// The bundle header is not a recognized signature/version combination.
    #[error("invalid bundle: {0}")]
    InvalidBundle(String),

    /// The web data header is malformed.
    #[error("invalid web data: {0}")]
    InvalidWebData(String),

    /// The serialized file header or metadata is malformed.
    #[error("invalid serialized file: {0}")]
    InvalidSerializedFile(String),

    /// Unsupported block compression in a bundle.
    #[error("unsupported compression type: {0}")]
    UnsupportedCompression(u32),

    /// LZ4 decompression failed.
    #[error("LZ4 decompression failed: {message}")]
    Lz4DecompressionFailed {
        /// The error message.
        message: String,
    },

    /// LZMA decompression failed.
    #[error("LZMA decompression failed: {message}")]
    LzmaDecompressionFailed {
        /// The error message.
        message: String,
    },

    /// Decompressed block size did not match the declared size.
    #[error("decompressed size mismatch: expected {expected}, got {actual}")]
    DecompressedSizeMismatch {
        /// Declared uncompressed size.
        expected: usize,
        /// Actual decompressed size.
        actual: usize,
    },

    /// Unity version string could not be parsed.
    #[error("invalid Unity version: {0}")]
    InvalidUnityVersion(String),

    /// The serialized file carries a stripped Unity version and no fallback is configured.
    #[error("the Unity version has been stripped from '{0}' and no fallback version is configured")]
    UnityVersionStripped(String),

    /// Unexpected end of data while parsing.
    #[error("unexpected end of data at offset {offset} (needed {needed} bytes)")]
    UnexpectedEof {
        /// Read position.
        offset: usize,
        /// Bytes requested.
        needed: usize,
    },

    // ==================== Object Errors ====================
    /// An object in an assets table failed to materialize.
    #[error("unable to load object {path_id} (class {class_id}) in '{table}': {source}")]
    ObjectMaterialization {
        /// Owning table name.
        table: String,
        /// Numeric class identifier.
        class_id: i32,
        /// Object path id.
        path_id: i64,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// A texture references a resource blob that was not unpacked.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    // ==================== Image Errors ====================
    /// The texture format has no decoder.
    #[error("unsupported texture format: {0}")]
    UnsupportedTextureFormat(i32),

    /// A texture or plain image could not be decoded.
    #[error("failed to decode '{item}': {message}")]
    DecodeFailed {
        /// Texture or entry name.
        item: String,
        /// The decoder message.
        message: String,
    },

    /// Failed to create an image buffer from decoded pixels.
    #[error("failed to create image buffer")]
    ImageBufferFailed,

    /// Failed to write a cache file.
    #[error("failed to write thumbnail cache {path}: {message}")]
    CacheWriteFailed {
        /// Target cache path.
        path: PathBuf,
        /// The error message.
        message: String,
    },

    // ==================== Config Errors ====================
    /// Configuration file could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

/// A specialized Result type for `ZipThumb` operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap this error with the parent/child names of the container node that failed.
    #[must_use]
    pub fn in_container(self, parent: impl Into<String>, child: impl Into<String>) -> Self {
        Error::ContainerUnpack {
            parent: parent.into(),
            child: child.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error (or any error it wraps) is a depth/budget violation.
    pub fn is_too_deep(&self) -> bool {
        match self {
            Error::ContainerTooDeep { .. } => true,
            Error::ContainerUnpack { source, .. } => source.is_too_deep(),
            _ => false,
        }
    }
}
