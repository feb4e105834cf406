//! Schema Model
//!
//! The metadata layer of the engine: attribute descriptors with their
//! SCIM characteristics and annotations, schemas, resource types, the
//! process-wide schema registry, and the bundled RFC 7643 core schemas.
//!
//! - [`attribute`]: [`Attribute`] and the characteristic enums
//! - [`resource_type`]: [`Schema`], [`ResourceType`], attribute finalization
//! - [`registry`]: the process-wide schema registry
//! - [`core`]: the bundled User/Group/Enterprise schemas

pub mod attribute;
pub mod core;
pub mod registry;
pub mod resource_type;

pub use attribute::{
    ANNOTATION_AUTO_COMPACT, ANNOTATION_ELEMENT_PREFIX, ANNOTATION_EXCLUSIVE_PRIMARY,
    ANNOTATION_ID, ANNOTATION_IDENTITY, ANNOTATION_META, ANNOTATION_PRIMARY, ANNOTATION_SCHEMAS,
    ANNOTATION_STATE_SUMMARY, Attribute, AttributeBuilder, AttributeType, Mutability, Returned,
    Uniqueness,
};
pub use core::{
    SCHEMA_ENTERPRISE_USER, SCHEMA_GROUP, SCHEMA_USER, enterprise_user_schema,
    group_resource_type, group_schema, register_core_schemas, user_resource_type, user_schema,
};
pub use registry::{get_schema, register_schema};
pub use resource_type::{ResourceType, Schema, SchemaExtension};
