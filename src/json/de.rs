//! Schema-driven Deserialization
//!
//! Deserialization is driven by the schema, not by the JSON structure: at
//! every position the target property's attribute dictates the JSON shape
//! that is acceptable there.
//!
//! - complex attribute ↔ JSON object; keys are located case-insensitively
//!   among the sub-properties, unknown keys are `invalidSyntax`
//! - multi-valued attribute ↔ JSON array; each element is appended and
//!   recursed into (`allow_element_for_array` accepts a bare value as a
//!   single element)
//! - scalar attribute ↔ the corresponding JSON primitive
//! - an explicit JSON `null` anywhere deletes the focused property
//!
//! Assignments raise the same events as the CRUD surface, so subscribers
//! (primary exclusivity, auto-compaction) hold their invariants during
//! parsing too.

use serde_json::Value;

use crate::error::{Result, ScimError};
use crate::property::{Event, EventKind, Property};

/// Deserializer behavior switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeserializeOptions {
    /// Accept a scalar or object where an array is expected, treating it
    /// as a single element.
    pub allow_element_for_array: bool,
}

/// Deserialize JSON text into a property subtree.
///
/// Multi-valued containers are replaced (the JSON carries their full
/// state); scalars and complex children present in the input are
/// overwritten in place.
pub fn deserialize_str(
    property: &mut Property,
    json: &str,
    options: DeserializeOptions,
) -> Result<Vec<Event>> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| ScimError::invalid_syntax(format!("malformed JSON: {}", e)))?;
    deserialize_value(property, &value, options)
}

/// Deserialize a parsed JSON value into a property subtree.
pub fn deserialize_value(
    property: &mut Property,
    value: &Value,
    options: DeserializeOptions,
) -> Result<Vec<Event>> {
    if value.is_null() {
        return property.delete(None);
    }
    if property.is_multi_valued() {
        let items: &[Value] = match value {
            Value::Array(items) => items,
            single if options.allow_element_for_array => std::slice::from_ref(single),
            _ => {
                return Err(ScimError::invalid_syntax(format!(
                    "'{}' expects an array",
                    property.attr().path
                )));
            }
        };
        let mut events = property.unassign();
        for item in items {
            let i = property.append_element()?;
            let elem = property.element_mut(i).expect("just appended");
            if let Err(e) = deserialize_value(elem, item, options) {
                property.remove_elements(&[i]);
                return Err(e);
            }
            let elem = property.element(i).expect("just appended");
            let mut added = vec![Event {
                kind: EventKind::AddedElement,
                attr_id: property.attr().id.clone(),
                attr_path: property.attr().path.clone(),
                index: Some(i),
                value: elem.raw(),
                prior: None,
            }];
            Property::stamp_index(&mut added, i);
            events.append(&mut added);
        }
        property.dispatch(&mut events)?;
        return Ok(events);
    }
    if property.is_complex() {
        let Value::Object(map) = value else {
            return Err(ScimError::invalid_syntax(format!(
                "'{}' expects an object",
                display_target(property)
            )));
        };
        let mut events = Vec::new();
        for (key, item) in map {
            let Some(child) = property.sub_mut(key) else {
                return Err(ScimError::invalid_syntax(format!(
                    "unknown key '{}' under '{}'",
                    key,
                    display_target(property)
                )));
            };
            let mut evs = deserialize_value(child, item, options)?;
            events.append(&mut evs);
        }
        property.dispatch(&mut events)?;
        return Ok(events);
    }
    let mut events = property.set_scalar_value(value)?;
    property.dispatch(&mut events)?;
    Ok(events)
}

fn display_target(property: &Property) -> String {
    let attr = property.attr();
    if attr.path.is_empty() {
        "the resource".to_string()
    } else {
        attr.path.clone()
    }
}

// =============================================================================
// Tests
// =============================================================================
