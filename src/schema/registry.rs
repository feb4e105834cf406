//! Schema Registry
//!
//! Process-wide mapping from schema URN to registered [`Schema`],
//! populated at startup and read-mostly afterward. Registration finalizes
//! attribute metadata (`id`, `path`, `index`) and registers the schema
//! URN with the path compiler.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::error::{Result, ScimError};
use crate::registry::register_urn;

use super::resource_type::Schema;

static SCHEMAS: Lazy<RwLock<HashMap<String, Arc<Schema>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Register a schema, finalizing its attribute metadata. Replaces any
/// schema previously registered under the same id. Returns the shared
/// registered form.
pub fn register_schema(schema: Schema) -> Arc<Schema> {
    let schema = Arc::new(schema.finalize());
    register_urn(&schema.id);
    debug!(id = %schema.id, name = %schema.name, "registering schema");
    SCHEMAS
        .write()
        .expect("schema registry lock poisoned")
        .insert(schema.id.to_ascii_lowercase(), Arc::clone(&schema));
    schema
}

/// Look up a registered schema by id (case-insensitive).
pub fn get_schema(id: &str) -> Option<Arc<Schema>> {
    SCHEMAS
        .read()
        .expect("schema registry lock poisoned")
        .get(&id.to_ascii_lowercase())
        .cloned()
}

/// Like [`get_schema`], but an unregistered id is an error.
pub(crate) fn require_schema(id: &str) -> Result<Arc<Schema>> {
    get_schema(id).ok_or_else(|| {
        ScimError::not_found(format!("schema '{}' is not registered", id))
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::attribute::{Attribute, AttributeType};

    #[test]
    fn test_register_and_lookup_case_insensitive() {
        let schema = Schema {
            id: "urn:test:registry:Widget".to_string(),
            name: "Widget".to_string(),
            description: String::new(),
            attributes: vec![Arc::new(
                Attribute::builder("label", AttributeType::String).build(),
            )],
        };
        register_schema(schema);

        let found = get_schema("URN:TEST:REGISTRY:WIDGET").unwrap();
        assert_eq!(found.name, "Widget");
        // Registration finalized the attribute metadata.
        assert_eq!(found.attributes[0].id, "urn:test:registry:Widget:label");

        assert!(get_schema("urn:test:registry:Nope").is_none());
        assert!(require_schema("urn:test:registry:Nope").is_err());
    }
}
