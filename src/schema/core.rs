//! Bundled Core Schemas
//!
//! The standard RFC 7643 schemas (User, Group, Enterprise User extension)
//! and their resource types, built with the attribute builder and
//! registered via [`register_core_schemas`]. Used by the test suite and
//! available to callers that do not load their own schema documents.

use std::sync::Arc;

use super::attribute::{
    ANNOTATION_AUTO_COMPACT, ANNOTATION_EXCLUSIVE_PRIMARY, ANNOTATION_IDENTITY,
    ANNOTATION_PRIMARY, Attribute, AttributeType, Mutability, Returned, Uniqueness,
};
use super::registry::register_schema;
use super::resource_type::{ResourceType, Schema, SchemaExtension};

/// SCIM Core User schema URI
pub const SCHEMA_USER: &str = "urn:ietf:params:scim:schemas:core:2.0:User";

/// SCIM Core Group schema URI
pub const SCHEMA_GROUP: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";

/// SCIM Enterprise User extension schema URI
pub const SCHEMA_ENTERPRISE_USER: &str =
    "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User";

/// Register the bundled schemas. Safe to call more than once.
pub fn register_core_schemas() {
    register_schema(user_schema());
    register_schema(group_schema());
    register_schema(enterprise_user_schema());
}

/// A multi-valued complex attribute in the canonical `value`/`display`/
/// `type`/`primary` shape shared by emails, phoneNumbers, and the like.
fn canonical_multi(name: &str, types: &[&str]) -> Attribute {
    Attribute::builder(name, AttributeType::Complex)
        .multi_valued()
        .annotate(ANNOTATION_AUTO_COMPACT)
        .annotate(ANNOTATION_EXCLUSIVE_PRIMARY)
        .sub(
            Attribute::builder("value", AttributeType::String)
                .annotate(ANNOTATION_IDENTITY)
                .build(),
        )
        .sub(Attribute::builder("display", AttributeType::String).build())
        .sub(
            Attribute::builder("type", AttributeType::String)
                .canonical_values(types.iter().copied())
                .build(),
        )
        .sub(
            Attribute::builder("primary", AttributeType::Boolean)
                .annotate(ANNOTATION_PRIMARY)
                .build(),
        )
        .build()
}

/// The RFC 7643 Section 4.1 User schema.
pub fn user_schema() -> Schema {
    Schema {
        id: SCHEMA_USER.to_string(),
        name: "User".to_string(),
        description: "User Account".to_string(),
        attributes: vec![
            Arc::new(
                Attribute::builder("userName", AttributeType::String)
                    .required()
                    .uniqueness(Uniqueness::Server)
                    .build(),
            ),
            Arc::new(
                Attribute::builder("name", AttributeType::Complex)
                    .sub(Attribute::builder("formatted", AttributeType::String).build())
                    .sub(Attribute::builder("familyName", AttributeType::String).build())
                    .sub(Attribute::builder("givenName", AttributeType::String).build())
                    .sub(Attribute::builder("middleName", AttributeType::String).build())
                    .sub(Attribute::builder("honorificPrefix", AttributeType::String).build())
                    .sub(Attribute::builder("honorificSuffix", AttributeType::String).build())
                    .build(),
            ),
            Arc::new(Attribute::builder("displayName", AttributeType::String).build()),
            Arc::new(Attribute::builder("nickName", AttributeType::String).build()),
            Arc::new(
                Attribute::builder("profileUrl", AttributeType::Reference)
                    .case_exact()
                    .reference_types(["external"])
                    .build(),
            ),
            Arc::new(Attribute::builder("title", AttributeType::String).build()),
            Arc::new(Attribute::builder("userType", AttributeType::String).build()),
            Arc::new(Attribute::builder("preferredLanguage", AttributeType::String).build()),
            Arc::new(Attribute::builder("locale", AttributeType::String).build()),
            Arc::new(Attribute::builder("timezone", AttributeType::String).build()),
            Arc::new(Attribute::builder("active", AttributeType::Boolean).build()),
            Arc::new(
                Attribute::builder("password", AttributeType::String)
                    .mutability(Mutability::WriteOnly)
                    .returned(Returned::Never)
                    .build(),
            ),
            Arc::new(canonical_multi("emails", &["work", "home", "other"])),
            Arc::new(canonical_multi(
                "phoneNumbers",
                &["work", "home", "mobile", "fax", "pager", "other"],
            )),
            Arc::new(canonical_multi("photos", &["photo", "thumbnail"])),
            Arc::new(
                Attribute::builder("addresses", AttributeType::Complex)
                    .multi_valued()
                    .annotate(ANNOTATION_AUTO_COMPACT)
                    .annotate(ANNOTATION_EXCLUSIVE_PRIMARY)
                    .sub(Attribute::builder("formatted", AttributeType::String).build())
                    .sub(Attribute::builder("streetAddress", AttributeType::String).build())
                    .sub(Attribute::builder("locality", AttributeType::String).build())
                    .sub(Attribute::builder("region", AttributeType::String).build())
                    .sub(Attribute::builder("postalCode", AttributeType::String).build())
                    .sub(Attribute::builder("country", AttributeType::String).build())
                    .sub(
                        Attribute::builder("type", AttributeType::String)
                            .canonical_values(["work", "home", "other"])
                            .build(),
                    )
                    .sub(
                        Attribute::builder("primary", AttributeType::Boolean)
                            .annotate(ANNOTATION_PRIMARY)
                            .build(),
                    )
                    .build(),
            ),
            Arc::new(
                Attribute::builder("groups", AttributeType::Complex)
                    .multi_valued()
                    .mutability(Mutability::ReadOnly)
                    .sub(
                        Attribute::builder("value", AttributeType::String)
                            .mutability(Mutability::ReadOnly)
                            .annotate(ANNOTATION_IDENTITY)
                            .build(),
                    )
                    .sub(
                        Attribute::builder("$ref", AttributeType::Reference)
                            .case_exact()
                            .mutability(Mutability::ReadOnly)
                            .reference_types(["Group"])
                            .build(),
                    )
                    .sub(
                        Attribute::builder("display", AttributeType::String)
                            .mutability(Mutability::ReadOnly)
                            .build(),
                    )
                    .sub(
                        Attribute::builder("type", AttributeType::String)
                            .canonical_values(["direct", "indirect"])
                            .mutability(Mutability::ReadOnly)
                            .build(),
                    )
                    .build(),
            ),
        ],
    }
}

/// The RFC 7643 Section 4.2 Group schema.
pub fn group_schema() -> Schema {
    Schema {
        id: SCHEMA_GROUP.to_string(),
        name: "Group".to_string(),
        description: "Group".to_string(),
        attributes: vec![
            Arc::new(
                Attribute::builder("displayName", AttributeType::String)
                    .required()
                    .build(),
            ),
            Arc::new(
                Attribute::builder("members", AttributeType::Complex)
                    .multi_valued()
                    .annotate(ANNOTATION_AUTO_COMPACT)
                    .sub(
                        Attribute::builder("value", AttributeType::String)
                            .mutability(Mutability::Immutable)
                            .annotate(ANNOTATION_IDENTITY)
                            .build(),
                    )
                    .sub(
                        Attribute::builder("$ref", AttributeType::Reference)
                            .case_exact()
                            .mutability(Mutability::Immutable)
                            .reference_types(["User", "Group"])
                            .build(),
                    )
                    .sub(Attribute::builder("display", AttributeType::String).build())
                    .sub(
                        Attribute::builder("type", AttributeType::String)
                            .canonical_values(["User", "Group"])
                            .mutability(Mutability::Immutable)
                            .build(),
                    )
                    .build(),
            ),
        ],
    }
}

/// The RFC 7643 Section 4.3 Enterprise User extension schema.
pub fn enterprise_user_schema() -> Schema {
    Schema {
        id: SCHEMA_ENTERPRISE_USER.to_string(),
        name: "EnterpriseUser".to_string(),
        description: "Enterprise User".to_string(),
        attributes: vec![
            Arc::new(Attribute::builder("employeeNumber", AttributeType::String).build()),
            Arc::new(Attribute::builder("costCenter", AttributeType::String).build()),
            Arc::new(Attribute::builder("organization", AttributeType::String).build()),
            Arc::new(Attribute::builder("division", AttributeType::String).build()),
            Arc::new(Attribute::builder("department", AttributeType::String).build()),
            Arc::new(
                Attribute::builder("manager", AttributeType::Complex)
                    .sub(
                        Attribute::builder("value", AttributeType::String)
                            .annotate(ANNOTATION_IDENTITY)
                            .build(),
                    )
                    .sub(
                        Attribute::builder("$ref", AttributeType::Reference)
                            .case_exact()
                            .reference_types(["User"])
                            .build(),
                    )
                    .sub(
                        Attribute::builder("displayName", AttributeType::String)
                            .mutability(Mutability::ReadOnly)
                            .build(),
                    )
                    .build(),
            ),
        ],
    }
}

/// The standard User resource type (main schema + enterprise extension).
pub fn user_resource_type() -> ResourceType {
    ResourceType {
        id: "User".to_string(),
        name: "User".to_string(),
        description: "User Account".to_string(),
        endpoint: "/Users".to_string(),
        schema: SCHEMA_USER.to_string(),
        schema_extensions: vec![SchemaExtension {
            schema: SCHEMA_ENTERPRISE_USER.to_string(),
            required: false,
        }],
    }
}

/// The standard Group resource type.
pub fn group_resource_type() -> ResourceType {
    ResourceType {
        id: "Group".to_string(),
        name: "Group".to_string(),
        description: "Group".to_string(),
        endpoint: "/Groups".to_string(),
        schema: SCHEMA_GROUP.to_string(),
        schema_extensions: Vec::new(),
    }
}

// =============================================================================
// Tests
// =============================================================================
