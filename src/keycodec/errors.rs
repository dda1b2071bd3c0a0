//! Row-key codec errors
//!
//! Error codes:
//! - VS_CODEC_INVALID_CHROMOSOME
//! - VS_CODEC_EMPTY_ALLELES
//! - VS_CODEC_RESERVED_REFERENCE
//! - VS_CODEC_KEY_TOO_LONG
//! - VS_CODEC_MISSING_AUXILIARY
//! - VS_CODEC_MALFORMED_KEY
//! - VS_CODEC_MALFORMED_AUXILIARY

use thiserror::Error;

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Row-key encode/decode failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Invalid chromosome: {0:?}")]
    InvalidChromosome(String),

    #[error("Reference and alternate alleles are both empty")]
    EmptyAlleles,

    #[error("Reference allele starts with reserved character '#': {0}")]
    ReservedReference(String),

    #[error("Row key too long: {length} bytes (max: {max})")]
    KeyTooLong { length: usize, max: usize },

    #[error("Row key holds hashed alleles but no auxiliary values were supplied")]
    MissingAuxiliary,

    #[error("Malformed row key: {0}")]
    MalformedKey(String),

    #[error("Malformed auxiliary alleles: {0}")]
    MalformedAuxiliary(String),
}

impl CodecError {
    pub fn code(&self) -> &'static str {
        match self {
            CodecError::InvalidChromosome(_) => "VS_CODEC_INVALID_CHROMOSOME",
            CodecError::EmptyAlleles => "VS_CODEC_EMPTY_ALLELES",
            CodecError::ReservedReference(_) => "VS_CODEC_RESERVED_REFERENCE",
            CodecError::KeyTooLong { .. } => "VS_CODEC_KEY_TOO_LONG",
            CodecError::MissingAuxiliary => "VS_CODEC_MISSING_AUXILIARY",
            CodecError::MalformedKey(_) => "VS_CODEC_MALFORMED_KEY",
            CodecError::MalformedAuxiliary(_) => "VS_CODEC_MALFORMED_AUXILIARY",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CodecError::MissingAuxiliary.code(), "VS_CODEC_MISSING_AUXILIARY");
        assert_eq!(
            CodecError::KeyTooLong { length: 10, max: 5 }.code(),
            "VS_CODEC_KEY_TOO_LONG"
        );
    }

    #[test]
    fn test_display() {
        let err = CodecError::KeyTooLong { length: 40000, max: 32767 };
        assert_eq!(err.to_string(), "Row key too long: 40000 bytes (max: 32767)");
    }
}
