//! Schemas and Resource Types
//!
//! A [`Schema`] is a named set of attributes (RFC 7643 Section 7),
//! registered process-wide by id. A [`ResourceType`] combines a main
//! schema with zero or more schema extensions and derives the flat
//! attribute list a resource's root property is built from:
//!
//! ```text
//! common attributes (schemas, id, externalId, meta)
//!   ++ main schema attributes
//!   ++ one complex container per extension, named by the extension URN
//! ```
//!
//! Registration finalizes attribute metadata: `path` is the dotted path
//! from the resource root, `id` is `<schema urn>:<path>`, and `index` is
//! the declaration position (the DFS traversal order).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::attribute::{Attribute, AttributeType, Mutability, Returned};
use super::registry::require_schema;

/// A named, registered set of attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// URN identifying the schema (e.g.
    /// `urn:ietf:params:scim:schemas:core:2.0:User`)
    pub id: String,

    /// Human-readable name (e.g. "User")
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Top-level attributes in declaration order
    pub attributes: Vec<Arc<Attribute>>,
}

impl Schema {
    /// Fill in `id`, `path`, and `index` on every attribute from the
    /// schema URN and the declaration order.
    pub(crate) fn finalize(mut self) -> Schema {
        let urn = self.id.clone();
        self.attributes = self
            .attributes
            .iter()
            .enumerate()
            .map(|(i, a)| Arc::new(finalize_attribute(a, "", &urn, i as u32)))
            .collect();
        self
    }
}

/// One schema extension of a resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaExtension {
    /// URN of the extension schema
    pub schema: String,
    /// Whether resources of this type must carry the extension
    pub required: bool,
}

/// A resource type: endpoint metadata plus the schema composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceType {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Endpoint path relative to the service root (e.g. "/Users")
    pub endpoint: String,
    /// URN of the main schema
    pub schema: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schema_extensions: Vec<SchemaExtension>,
}

impl ResourceType {
    /// Synthesize the root attribute a resource of this type is built
    /// from: common attributes, main schema attributes, and one complex
    /// container per extension.
    ///
    /// # Errors
    ///
    /// `notFound` when the main schema or an extension schema has not
    /// been registered.
    pub fn derive_root_attribute(&self) -> Result<Arc<Attribute>> {
        let main = require_schema(&self.schema)?;

        let mut subs: Vec<Arc<Attribute>> = common_attributes();
        subs.extend(main.attributes.iter().cloned());

        for ext in &self.schema_extensions {
            let ext_schema = require_schema(&ext.schema)?;
            let children: Vec<Arc<Attribute>> = ext_schema
                .attributes
                .iter()
                .map(|a| Arc::new(rebase_attribute(a, &ext.schema)))
                .collect();

            let mut container = Attribute::builder(&ext.schema, AttributeType::Complex)
                .description(ext_schema.description.clone())
                .build();
            container.required = ext.required;
            container.id = ext.schema.clone();
            container.path = ext.schema.clone();
            container.sub_attributes = children;
            subs.push(Arc::new(container));
        }

        // The flat list defines the traversal order.
        let subs: Vec<Arc<Attribute>> = subs
            .into_iter()
            .enumerate()
            .map(|(i, a)| {
                let mut re = Attribute::clone(&a);
                re.index = i as u32;
                Arc::new(re)
            })
            .collect();

        let mut root = Attribute::builder("", AttributeType::Complex).build();
        root.id = self.schema.clone();
        root.sub_attributes = subs;
        Ok(Arc::new(root))
    }
}

/// Compute `path`, `id`, and `index` for an attribute subtree.
pub(crate) fn finalize_attribute(
    attr: &Attribute,
    parent_path: &str,
    urn: &str,
    index: u32,
) -> Attribute {
    let mut a = Attribute::clone(attr);
    a.index = index;
    a.path = if parent_path.is_empty() {
        a.name.clone()
    } else {
        format!("{}.{}", parent_path, a.name)
    };
    a.id = if urn.is_empty() {
        a.path.clone()
    } else {
        format!("{}:{}", urn, a.path)
    };
    let path = a.path.clone();
    a.sub_attributes = a
        .sub_attributes
        .iter()
        .enumerate()
        .map(|(i, s)| Arc::new(finalize_attribute(s, &path, urn, i as u32)))
        .collect();
    a
}

/// Re-root a finalized extension attribute under the extension URN, so
/// its full path reads `urn:...:User:employeeNumber`.
fn rebase_attribute(attr: &Attribute, prefix: &str) -> Attribute {
    let mut a = Attribute::clone(attr);
    a.path = format!("{}:{}", prefix, a.path);
    a.sub_attributes = a
        .sub_attributes
        .iter()
        .map(|s| Arc::new(rebase_attribute(s, prefix)))
        .collect();
    a
}

/// The common attributes every resource carries (RFC 7643 Section 3.1).
fn common_attributes() -> Vec<Arc<Attribute>> {
    use super::attribute::{
        ANNOTATION_ID, ANNOTATION_META, ANNOTATION_SCHEMAS, Uniqueness,
    };

    let schemas = Attribute::builder("schemas", AttributeType::String)
        .multi_valued()
        .required()
        .case_exact()
        .returned(Returned::Always)
        .annotate(ANNOTATION_SCHEMAS)
        .build();

    let id = Attribute::builder("id", AttributeType::String)
        .case_exact()
        .mutability(Mutability::ReadOnly)
        .returned(Returned::Always)
        .uniqueness(Uniqueness::Global)
        .annotate(ANNOTATION_ID)
        .build();

    let external_id = Attribute::builder("externalId", AttributeType::String)
        .case_exact()
        .build();

    let meta = Attribute::builder("meta", AttributeType::Complex)
        .mutability(Mutability::ReadOnly)
        .annotate(ANNOTATION_META)
        .sub(
            Attribute::builder("resourceType", AttributeType::String)
                .case_exact()
                .mutability(Mutability::ReadOnly)
                .build(),
        )
        .sub(
            Attribute::builder("created", AttributeType::DateTime)
                .mutability(Mutability::ReadOnly)
                .build(),
        )
        .sub(
            Attribute::builder("lastModified", AttributeType::DateTime)
                .mutability(Mutability::ReadOnly)
                .build(),
        )
        .sub(
            Attribute::builder("location", AttributeType::Reference)
                .case_exact()
                .mutability(Mutability::ReadOnly)
                .build(),
        )
        .sub(
            Attribute::builder("version", AttributeType::String)
                .case_exact()
                .mutability(Mutability::ReadOnly)
                .build(),
        )
        .build();

    [schemas, id, external_id, meta]
        .into_iter()
        .enumerate()
        .map(|(i, a)| Arc::new(finalize_attribute(&a, "", "", i as u32)))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
