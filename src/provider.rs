//! Persistence Collaborator Interface
//!
//! The contract the service layer consumes to store and query resources.
//! The engine defines the shape; implementations (in-memory, SQL, ...)
//! live outside the engine. Capability flags let a provider decline
//! filtering, pagination, or sorting so the service layer can compensate.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::expr::Expression;
use crate::json::Projection;
use crate::resource::Resource;

/// What a provider implements natively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub supports_filter: bool,
    pub supports_pagination: bool,
    pub supports_sort: bool,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// A compiled sort specification.
#[derive(Debug, Clone)]
pub struct SortSpec {
    /// Path of the attribute to sort by
    pub by: Expression,
    pub order: SortOrder,
}

/// 1-based result window per RFC 7644 Section 3.4.2.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub start_index: usize,
    pub count: usize,
}

/// A resource store.
pub trait Provider {
    fn capabilities(&self) -> Capabilities;

    /// Store a new resource.
    ///
    /// # Errors
    ///
    /// `uniqueness` on conflicting unique attributes, `conflict` on a
    /// duplicate id.
    fn insert(&mut self, resource: Resource) -> Result<()>;

    /// Fetch a resource by id.
    ///
    /// # Errors
    ///
    /// `notFound` when no resource has the id.
    fn get(&self, id: &str, projection: Option<&Projection>) -> Result<Resource>;

    /// Count the resources matching `filter` (all of them when `None`).
    fn count(&self, filter: Option<&Expression>) -> Result<usize>;

    /// Query resources.
    fn query(
        &self,
        filter: Option<&Expression>,
        sort: Option<&SortSpec>,
        pagination: Option<&Pagination>,
        projection: Option<&Projection>,
    ) -> Result<Vec<Resource>>;

    /// Replace `reference` with `replacement`.
    ///
    /// # Errors
    ///
    /// `notFound` when the reference is gone, `versionMismatch` when its
    /// version no longer matches the stored one.
    fn replace(&mut self, reference: &Resource, replacement: Resource) -> Result<()>;

    /// Delete a stored resource.
    ///
    /// # Errors
    ///
    /// `notFound` when the resource is gone.
    fn delete(&mut self, resource: &Resource) -> Result<()>;
}

/// Compare two resources under a sort specification, for providers that
/// sort in memory. Unassigned values sort last regardless of direction.
pub fn compare_resources(a: &Resource, b: &Resource, sort: &SortSpec) -> Ordering {
    let va = a.root().get(Some(&sort.by)).unwrap_or(Value::Null);
    let vb = b.root().get(Some(&sort.by)).unwrap_or(Value::Null);

    let ordering = match (first_scalar(&va), first_scalar(&vb)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => return Ordering::Greater,
        (Some(_), None) => return Ordering::Less,
        (Some(x), Some(y)) => compare_values(x, y),
    };
    match sort.order {
        SortOrder::Ascending => ordering,
        SortOrder::Descending => ordering.reverse(),
    }
}

/// A multi-valued sort key uses its first value per RFC 7644.
fn first_scalar(value: &Value) -> Option<&Value> {
    match value {
        Value::Null => None,
        Value::Array(items) => items.first().and_then(|v| first_scalar(v)),
        other => Some(other),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => {
            x.to_lowercase().cmp(&y.to_lowercase())
        }
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

// =============================================================================
// Tests
// =============================================================================
