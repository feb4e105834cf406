//! Protocol Messages
//!
//! The RFC 7644 message shapes that ride on top of the resource engine:
//! PATCH requests (Section 3.5.2), list responses (Section 3.4.2), and
//! search requests (Section 3.4.3).
//!
//! The wire key names (`Operations`, `op`, `path`, `value`,
//! `totalResults`, `Resources`, ...) are fixed by the RFC; everything
//! behind them is this engine's: a patch request **compiles** into
//! [`CompiledPatchOp`]s whose paths are [`Expression`]s, so validation and
//! execution are the same pass through the path compiler, and execution
//! runs through the CRUD surface with filter-selected targeting and the
//! subscriber invariants intact.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ScimError};
use crate::expr::{Expression, compile_filter, compile_path};
use crate::json::Projection;
use crate::property::Event;
use crate::provider::{Pagination, SortOrder, SortSpec};
use crate::resource::Resource;

/// SCIM PatchOp schema URI
pub const SCHEMA_PATCH_OP: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

/// SCIM ListResponse schema URI
pub const SCHEMA_LIST_RESPONSE: &str = "urn:ietf:params:scim:api:messages:2.0:ListResponse";

/// SCIM SearchRequest schema URI
pub const SCHEMA_SEARCH_REQUEST: &str = "urn:ietf:params:scim:api:messages:2.0:SearchRequest";

// =============================================================================
// PATCH
// =============================================================================

/// A SCIM PATCH request: the PatchOp schema URI plus the operations to
/// apply in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchRequest {
    pub schemas: Vec<String>,

    // The RFC capitalizes this key; some identity providers do not.
    #[serde(rename = "Operations", alias = "operations")]
    pub operations: Vec<PatchOp>,
}

/// The three mutation verbs of RFC 7644 Section 3.5.2.
///
/// The wire form is lowercase; the capitalized spellings seen from some
/// identity providers are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOpKind {
    #[serde(alias = "Add")]
    Add,
    #[serde(alias = "Replace")]
    Replace,
    #[serde(alias = "Remove")]
    Remove,
}

/// One PATCH operation as it appears on the wire: an uninterpreted verb,
/// path string, and value. [`PatchOp::compile`] turns it into the typed,
/// executable form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchOp {
    pub op: PatchOpKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// A PATCH operation with its path compiled, ready to run against a
/// resource.
#[derive(Debug, Clone)]
pub enum CompiledPatchOp {
    /// Add `value` at `target` (the whole resource when `None`)
    Add {
        target: Option<Expression>,
        value: Value,
    },
    /// Replace the value at `target`
    Replace {
        target: Option<Expression>,
        value: Value,
    },
    /// Remove the value at `target`; a path is mandatory here
    Remove { target: Expression },
}

impl PatchRequest {
    /// A request carrying `operations`, with the PatchOp schema URI set.
    pub fn new(operations: Vec<PatchOp>) -> Self {
        Self {
            schemas: vec![SCHEMA_PATCH_OP.to_string()],
            operations,
        }
    }

    /// Compile the whole request down to executable operations.
    ///
    /// This is the request's validation: the schema URI must be declared,
    /// every path must compile, and every operation must carry the pieces
    /// its verb needs. Errors name the offending operation.
    pub fn compile(&self) -> Result<Vec<CompiledPatchOp>> {
        self.schemas
            .iter()
            .find(|s| s.as_str() == SCHEMA_PATCH_OP)
            .ok_or_else(|| {
                ScimError::invalid_syntax("request does not declare the PatchOp schema")
            })?;
        self.operations
            .iter()
            .enumerate()
            .map(|(i, op)| {
                op.compile()
                    .map_err(|e| e.hint(format!("operation {}", i)))
            })
            .collect()
    }

    /// Compile and run every operation against the resource, in order.
    pub fn apply(&self, resource: &mut Resource) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        for (i, op) in self.compile()?.iter().enumerate() {
            let mut evs = op
                .apply(resource)
                .map_err(|e| e.hint(format!("operation {}", i)))?;
            events.append(&mut evs);
        }
        Ok(events)
    }
}

impl PatchOp {
    /// An add operation targeting `path`.
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOpKind::Add,
            path: Some(path.into()),
            value: Some(value),
        }
    }

    /// An add operation with no path: the value merges into the resource
    /// root.
    pub fn add_root(value: Value) -> Self {
        Self {
            op: PatchOpKind::Add,
            path: None,
            value: Some(value),
        }
    }

    /// A replace operation targeting `path`.
    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOpKind::Replace,
            path: Some(path.into()),
            value: Some(value),
        }
    }

    /// A remove operation targeting `path`.
    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOpKind::Remove,
            path: Some(path.into()),
            value: None,
        }
    }

    /// Compile the wire form into an executable operation.
    ///
    /// The path, when present and non-blank, goes through the path
    /// compiler; a remove without a path is `noTarget`, and an add or
    /// replace without a value is `invalidValue`, per RFC 7644.
    pub fn compile(&self) -> Result<CompiledPatchOp> {
        let target = self
            .path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(compile_path)
            .transpose()?;

        match self.op {
            PatchOpKind::Remove => Ok(CompiledPatchOp::Remove {
                target: target.ok_or_else(|| {
                    ScimError::no_target("remove operation requires a path")
                })?,
            }),
            kind => {
                let value = self.value.clone().ok_or_else(|| {
                    ScimError::invalid_value("operation requires a value")
                })?;
                Ok(match kind {
                    PatchOpKind::Add => CompiledPatchOp::Add { target, value },
                    _ => CompiledPatchOp::Replace { target, value },
                })
            }
        }
    }
}

impl CompiledPatchOp {
    /// Run the operation against a resource through the CRUD surface.
    pub fn apply(&self, resource: &mut Resource) -> Result<Vec<Event>> {
        match self {
            // A list value adds element-by-element per RFC 7644 3.5.2.1.
            CompiledPatchOp::Add {
                target,
                value: Value::Array(items),
            } => {
                let mut events = Vec::new();
                for item in items {
                    events.append(&mut resource.root_mut().add(target.as_ref(), item)?);
                }
                Ok(events)
            }
            CompiledPatchOp::Add { target, value } => {
                resource.root_mut().add(target.as_ref(), value)
            }
            CompiledPatchOp::Replace { target, value } => {
                resource.root_mut().replace(target.as_ref(), value)
            }
            CompiledPatchOp::Remove { target } => resource.root_mut().delete(Some(target)),
        }
    }
}

// =============================================================================
// List / Search
// =============================================================================

/// A SCIM query response.
///
/// `startIndex` and `itemsPerPage` describe the window the caller asked
/// for and appear only when the query was actually paginated; an
/// unpaginated listing carries the full match set and omits both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub schemas: Vec<String>,

    /// Total matching resources, across all pages
    pub total_results: usize,

    /// 1-based index of the first returned result, when windowed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_index: Option<usize>,

    /// Resources in this page, when windowed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_per_page: Option<usize>,

    /// Serialized resources
    #[serde(rename = "Resources", default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Value>,
}

impl ListResponse {
    fn base(total_results: usize, resources: Vec<Value>) -> Self {
        Self {
            schemas: vec![SCHEMA_LIST_RESPONSE.to_string()],
            total_results,
            start_index: None,
            items_per_page: None,
            resources,
        }
    }

    /// An unpaginated listing: every match is in `resources`.
    pub fn complete(resources: Vec<Value>) -> Self {
        let total = resources.len();
        Self::base(total, resources)
    }

    /// One window of a larger result set, described by the
    /// [`Pagination`] that produced it. `itemsPerPage` reports what this
    /// page actually holds, which on the last page is less than the
    /// window size.
    pub fn windowed(total_results: usize, window: Pagination, resources: Vec<Value>) -> Self {
        Self {
            start_index: Some(window.start_index),
            items_per_page: Some(resources.len()),
            ..Self::base(total_results, resources)
        }
    }
}

/// A SCIM search request (`/.search` POST body or query parameters).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub schemas: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_attributes: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_index: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl SearchRequest {
    /// The attribute projection the request asks for.
    pub fn projection(&self) -> Result<Option<Projection>> {
        if self.attributes.is_empty() && self.excluded_attributes.is_empty() {
            return Ok(None);
        }
        Projection::new(self.attributes.clone(), self.excluded_attributes.clone()).map(Some)
    }

    /// The compiled filter, when one is present.
    pub fn compiled_filter(&self) -> Result<Option<Expression>> {
        self.filter.as_deref().map(compile_filter).transpose()
    }

    /// The compiled sort specification, when one is present.
    pub fn sort_spec(&self) -> Result<Option<SortSpec>> {
        let Some(by) = self.sort_by.as_deref() else {
            return Ok(None);
        };
        Ok(Some(SortSpec {
            by: compile_path(by)?,
            order: self.sort_order.unwrap_or_default(),
        }))
    }

    /// The result window the request asks for, when it asks for one.
    pub fn pagination(&self) -> Option<Pagination> {
        match (self.start_index, self.count) {
            (None, None) => None,
            (start_index, count) => Some(Pagination {
                start_index: start_index.unwrap_or(1).max(1),
                count: count.unwrap_or(usize::MAX),
            }),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
