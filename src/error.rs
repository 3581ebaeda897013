//! Error types for covercat.
//!
//! One enum covers every failure the catalog, the decoders and the HTTP
//! service can report. Cancellation of a read is not an error: it surfaces as
//! `Ok(None)` from the coverage accessors.

use thiserror::Error;

/// The main error type for covercat operations.
#[derive(Error, Debug)]
pub enum CovercatError {
    /// SQL driver errors
    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image codec errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// A record, or a set of records, in the catalog contradicts itself
    #[error("Illegal record in table \"{table}\": {message}")]
    IllegalRecord { table: String, message: String },

    /// Decoded image size disagrees with the size declared in the catalog
    #[error("IO error: image \"{file}\" is {found:?} pixels but the catalog declares {expected:?}")]
    SizeMismatch {
        file: String,
        expected: (u32, u32),
        found: (u32, u32),
    },

    /// Decoder failures other than plain IO
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid parameter errors
    #[error("Invalid parameter: {param} - {message}")]
    InvalidParameter { param: String, message: String },

    /// Data not found errors
    #[error("Data not found: {message}")]
    DataNotFound { message: String },

    /// Interpolation errors
    #[error("Interpolation error: {message}")]
    Interpolation { message: String },

    /// No transform known between two coordinate systems
    #[error("Cannot reproject from {source_cs} to {target_cs}")]
    Reprojection { source_cs: String, target_cs: String },

    /// Image generation errors
    #[error("Image generation error: {message}")]
    ImageGeneration { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server errors
    #[error("Server error: {message}")]
    Server { message: String },
}

impl CovercatError {
    /// Build an [`CovercatError::IllegalRecord`] for the given table.
    pub fn illegal_record(table: &str, message: impl Into<String>) -> Self {
        CovercatError::IllegalRecord {
            table: table.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error belongs to the I/O family (missing file, decode
    /// failure, size mismatch).
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            CovercatError::Io(_)
                | CovercatError::Image(_)
                | CovercatError::Decode { .. }
                | CovercatError::SizeMismatch { .. }
        )
    }
}

/// Convenience type alias for Results with CovercatError
pub type Result<T> = std::result::Result<T, CovercatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_record_names_table() {
        let err = CovercatError::illegal_record("formats", "duplicate format \"PNG\"");
        let text = err.to_string();
        assert!(text.contains("formats"));
        assert!(text.contains("duplicate format"));
        assert!(!err.is_io());
    }

    #[test]
    fn test_size_mismatch_is_io() {
        let err = CovercatError::SizeMismatch {
            file: "a.png".to_string(),
            expected: (100, 100),
            found: (50, 100),
        };
        assert!(err.is_io());
        assert!(err.to_string().starts_with("IO error"));
    }
}
