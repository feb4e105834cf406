//! SCIM Error Taxonomy
//!
//! This module defines the error values used throughout the engine, per
//! RFC 7644 Section 3.12. Every error carries a [`ScimErrorKind`] tag and a
//! human-readable detail message. Kinds map to HTTP status codes; callers
//! above the engine (an HTTP layer, a persistence adapter) may remap.
//!
//! Errors compose via [`ScimError::hint`], which appends context to the
//! detail message without losing the kind.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// SCIM Error schema URI.
pub const SCHEMA_ERROR: &str = "urn:ietf:params:scim:api:messages:2.0:Error";

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, ScimError>;

/// An error value carrying a SCIM kind tag and a detail message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct ScimError {
    kind: ScimErrorKind,
    detail: String,
}

/// SCIM error kinds per RFC 7644 Section 3.12, plus the engine-internal
/// kinds (`Sensitive`, `NotFound`, `Conflict`, `VersionMismatch`,
/// `Internal`) surfaced by the service layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScimErrorKind {
    /// Filter syntax is invalid or unsupported
    InvalidFilter,
    /// Too many results (or request payload too large)
    TooMany,
    /// Uniqueness constraint violated (e.g., duplicate userName)
    Uniqueness,
    /// Attempt to modify a read-only or immutable attribute
    Mutability,
    /// Request body has invalid structure or an unknown key
    InvalidSyntax,
    /// Path is ill-formed or references an unknown attribute
    InvalidPath,
    /// Path resolves to nothing
    NoTarget,
    /// Attribute value is invalid for its type
    InvalidValue,
    /// Request would disclose a sensitive value
    Sensitive,
    /// Resource not found
    NotFound,
    /// Resource state conflicts with the request
    Conflict,
    /// Version (ETag) precondition failed
    VersionMismatch,
    /// Invariant breach inside the engine
    Internal,
}

impl ScimErrorKind {
    /// The `scimType` wire form of this kind, if RFC 7644 defines one.
    ///
    /// Status-only kinds (`NotFound`, `Conflict`, `VersionMismatch`,
    /// `Internal`) have no `scimType` and return `None`.
    pub fn scim_type(&self) -> Option<&'static str> {
        match self {
            ScimErrorKind::InvalidFilter => Some("invalidFilter"),
            ScimErrorKind::TooMany => Some("tooMany"),
            ScimErrorKind::Uniqueness => Some("uniqueness"),
            ScimErrorKind::Mutability => Some("mutability"),
            ScimErrorKind::InvalidSyntax => Some("invalidSyntax"),
            ScimErrorKind::InvalidPath => Some("invalidPath"),
            ScimErrorKind::NoTarget => Some("noTarget"),
            ScimErrorKind::InvalidValue => Some("invalidValue"),
            ScimErrorKind::Sensitive => Some("sensitivity"),
            ScimErrorKind::NotFound
            | ScimErrorKind::Conflict
            | ScimErrorKind::VersionMismatch
            | ScimErrorKind::Internal => None,
        }
    }

    /// HTTP status code this kind maps to.
    pub fn status(&self) -> u16 {
        match self {
            ScimErrorKind::NotFound => 404,
            ScimErrorKind::Uniqueness | ScimErrorKind::Conflict => 409,
            ScimErrorKind::VersionMismatch => 412,
            ScimErrorKind::TooMany => 413,
            ScimErrorKind::Internal => 500,
            _ => 400,
        }
    }
}

impl fmt::Display for ScimErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scim_type() {
            Some(t) => write!(f, "{}", t),
            None => match self {
                ScimErrorKind::NotFound => write!(f, "notFound"),
                ScimErrorKind::Conflict => write!(f, "conflict"),
                ScimErrorKind::VersionMismatch => write!(f, "versionMismatch"),
                ScimErrorKind::Internal => write!(f, "internal"),
                _ => unreachable!(),
            },
        }
    }
}

impl ScimError {
    fn new(kind: ScimErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Filter syntax is invalid or unsupported (400)
    pub fn invalid_filter(detail: impl Into<String>) -> Self {
        Self::new(ScimErrorKind::InvalidFilter, detail)
    }

    /// Too many results or payload too large (413)
    pub fn too_many(detail: impl Into<String>) -> Self {
        Self::new(ScimErrorKind::TooMany, detail)
    }

    /// Uniqueness constraint violation (409)
    pub fn uniqueness(detail: impl Into<String>) -> Self {
        Self::new(ScimErrorKind::Uniqueness, detail)
    }

    /// Attempt to modify a read-only or immutable attribute (400)
    pub fn mutability(detail: impl Into<String>) -> Self {
        Self::new(ScimErrorKind::Mutability, detail)
    }

    /// Invalid request structure or unknown key (400)
    pub fn invalid_syntax(detail: impl Into<String>) -> Self {
        Self::new(ScimErrorKind::InvalidSyntax, detail)
    }

    /// Ill-formed path (400)
    pub fn invalid_path(detail: impl Into<String>) -> Self {
        Self::new(ScimErrorKind::InvalidPath, detail)
    }

    /// Path resolves to nothing (400)
    pub fn no_target(detail: impl Into<String>) -> Self {
        Self::new(ScimErrorKind::NoTarget, detail)
    }

    /// Invalid value for the attribute type (400)
    pub fn invalid_value(detail: impl Into<String>) -> Self {
        Self::new(ScimErrorKind::InvalidValue, detail)
    }

    /// Disclosure of a sensitive value (400)
    pub fn sensitive(detail: impl Into<String>) -> Self {
        Self::new(ScimErrorKind::Sensitive, detail)
    }

    /// Resource not found (404)
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(ScimErrorKind::NotFound, detail)
    }

    /// Resource state conflict (409)
    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::new(ScimErrorKind::Conflict, detail)
    }

    /// ETag precondition failed (412)
    pub fn version_mismatch(detail: impl Into<String>) -> Self {
        Self::new(ScimErrorKind::VersionMismatch, detail)
    }

    /// Invariant breach inside the engine (500)
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ScimErrorKind::Internal, detail)
    }

    /// The kind tag of this error.
    pub fn kind(&self) -> ScimErrorKind {
        self.kind
    }

    /// The human-readable detail message.
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// HTTP status code this error maps to.
    pub fn status(&self) -> u16 {
        self.kind.status()
    }

    /// Append context to the detail message without changing the kind.
    #[must_use]
    pub fn hint(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        if !context.is_empty() {
            self.detail.push_str(" (");
            self.detail.push_str(&context);
            self.detail.push(')');
        }
        self
    }

    /// The RFC 7644 error response body for this error.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            schemas: vec![SCHEMA_ERROR.to_string()],
            status: self.status().to_string(),
            scim_type: self.kind.scim_type().map(str::to_string),
            detail: self.detail.clone(),
        }
    }
}

/// SCIM error response body per RFC 7644.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// SCIM schema URIs (always contains the Error schema)
    pub schemas: Vec<String>,

    /// HTTP status code as a string (e.g., "400", "404")
    pub status: String,

    /// SCIM-specific error type (optional, per RFC 7644)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scim_type: Option<String>,

    /// Human-readable error detail
    pub detail: String,
}

// =============================================================================
// Tests
// =============================================================================
