//! Error types for the codec.
//!
//! "Need more input" is deliberately absent: the primitive layer reports it as
//! `Ok(None)` and the engine buffers, so it never reaches the application.

use thiserror::Error;

use crate::tlv::Tag;

/// Decode failure for one PDU (or, for framing errors, for the whole stream).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// BER structural rules were violated. Byte alignment is lost, so the
    /// connection carrying the stream must be closed.
    #[error("malformed encoding at byte {offset}: {reason}")]
    MalformedEncoding { offset: u64, reason: String },

    /// A tag appeared where the grammar has no rule and the parent is strict.
    #[error("unexpected tag {tag} at byte {offset} in {context}")]
    UnexpectedTag {
        offset: u64,
        tag: Tag,
        context: String,
    },

    /// The encoding is well formed but the content breaks a protocol rule.
    #[error("{structure}.{field}: {reason}")]
    DomainConstraintViolation {
        structure: &'static str,
        field: &'static str,
        reason: String,
    },

    /// The transport ended in the middle of a PDU.
    #[error("input ended after {buffered} bytes of an incomplete PDU")]
    TruncatedInput { buffered: u64 },
}

impl DecodeError {
    pub(crate) fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        DecodeError::MalformedEncoding {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn constraint(
        structure: &'static str,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        DecodeError::DomainConstraintViolation {
            structure,
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(structure: &'static str, field: &'static str) -> Self {
        Self::constraint(structure, field, "required field was not present")
    }

    /// Shift a buffer-relative offset to a stream offset.
    pub(crate) fn rebase(self, base: u64) -> Self {
        match self {
            DecodeError::MalformedEncoding { offset, reason } => DecodeError::MalformedEncoding {
                offset: offset + base,
                reason,
            },
            DecodeError::UnexpectedTag {
                offset,
                tag,
                context,
            } => DecodeError::UnexpectedTag {
                offset: offset + base,
                tag,
                context,
            },
            other => other,
        }
    }

    /// Framing errors desynchronize the byte stream; everything else only
    /// costs the current message.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            DecodeError::MalformedEncoding { .. } | DecodeError::TruncatedInput { .. }
        )
    }

    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::MalformedEncoding { .. } => "malformed_encoding",
            DecodeError::UnexpectedTag { .. } => "unexpected_tag",
            DecodeError::DomainConstraintViolation { .. } => "domain_constraint",
            DecodeError::TruncatedInput { .. } => "truncated_input",
        }
    }
}

/// An object that cannot be expressed in DER.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("{structure}: {reason}")]
    InvalidValue {
        structure: &'static str,
        reason: String,
    },
}

/// The schema rejected a filter value; the whole filter pass is abandoned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot normalize value of attribute '{attribute}': {reason}")]
pub struct NormalizationError {
    pub attribute: String,
    pub reason: String,
}

impl NormalizationError {
    pub fn new(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }
}
