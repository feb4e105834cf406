//! Return-ability-aware Serialization
//!
//! Serializes a property tree to JSON by walking it with the
//! [`Visitor`](crate::traverse::Visitor), deciding per attribute whether
//! it may appear in output:
//!
//! - `writeOnly` mutability and `returned=never` are never emitted
//! - `returned=always` is always emitted (when it has data)
//! - `returned=default` is emitted when assigned, subject to the active
//!   [`Projection`]
//! - `returned=request` is emitted only when the include list names it
//!
//! Projection paths are matched case-insensitively against the full
//! attribute path; naming an attribute keeps its ancestors (so the
//! containers can be emitted) and its descendants.

use serde_json::{Map, Value};

use crate::error::{Result, ScimError};
use crate::property::Property;
use crate::schema::{Mutability, Returned};
use crate::traverse::{Visitor, visit};

/// An attribute projection: `attributes` (include) or `excludedAttributes`
/// (exclude), mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    attributes: Vec<String>,
    excluded: Vec<String>,
}

impl Projection {
    /// Build a projection from the two request parameters.
    ///
    /// # Errors
    ///
    /// `invalidValue` when both lists are populated.
    pub fn new(attributes: Vec<String>, excluded: Vec<String>) -> Result<Self> {
        if !attributes.is_empty() && !excluded.is_empty() {
            return Err(ScimError::invalid_value(
                "attributes and excludedAttributes are mutually exclusive",
            ));
        }
        Ok(Self {
            attributes,
            excluded,
        })
    }

    /// An include projection (`?attributes=`).
    pub fn include<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: paths.into_iter().map(Into::into).collect(),
            excluded: Vec::new(),
        }
    }

    /// An exclude projection (`?excludedAttributes=`).
    pub fn exclude<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: Vec::new(),
            excluded: paths.into_iter().map(Into::into).collect(),
        }
    }

    fn is_include(&self) -> bool {
        !self.attributes.is_empty()
    }

    /// Whether the include list names `path`, an ancestor of it, or a
    /// descendant of it.
    fn include_matches(&self, path: &str) -> bool {
        self.attributes
            .iter()
            .any(|entry| related(entry, path) != Relation::None)
    }

    /// Whether the exclude list names `path` or an ancestor of it.
    fn exclude_matches(&self, path: &str) -> bool {
        self.excluded.iter().any(|entry| {
            matches!(related(entry, path), Relation::Exact | Relation::EntryIsAncestor)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    None,
    Exact,
    /// The projection entry is an ancestor of the attribute path
    EntryIsAncestor,
    /// The projection entry is a descendant of the attribute path
    EntryIsDescendant,
}

/// Case-insensitive path relation; a path boundary is `.` or `:`.
fn related(entry: &str, path: &str) -> Relation {
    let entry = entry.to_ascii_lowercase();
    let path = path.to_ascii_lowercase();
    if entry == path {
        return Relation::Exact;
    }
    let boundary = |c: char| c == '.' || c == ':';
    if path.starts_with(&entry) && path[entry.len()..].starts_with(boundary) {
        return Relation::EntryIsAncestor;
    }
    if entry.starts_with(&path) && entry[path.len()..].starts_with(boundary) {
        return Relation::EntryIsDescendant;
    }
    Relation::None
}

/// Whether a property may appear in serialized output.
fn returnable(property: &Property, projection: Option<&Projection>) -> bool {
    let attr = property.attr();
    if attr.path.is_empty() {
        // The resource root itself.
        return true;
    }
    if attr.mutability == Mutability::WriteOnly || attr.returned == Returned::Never {
        return false;
    }
    match attr.returned {
        Returned::Never => false,
        Returned::Always => true,
        Returned::Request => {
            projection.is_some_and(|p| p.is_include() && p.include_matches(&attr.path))
        }
        Returned::Default => match projection {
            None => !property.is_unassigned(),
            Some(p) if p.is_include() => p.include_matches(&attr.path),
            Some(p) => !p.exclude_matches(&attr.path) && !property.is_unassigned(),
        },
    }
}

enum Frame {
    Object(Map<String, Value>),
    Array(Vec<Value>),
}

struct JsonSerializer<'p> {
    projection: Option<&'p Projection>,
    stack: Vec<Frame>,
    result: Option<Value>,
}

impl JsonSerializer<'_> {
    fn attach(&mut self, name: &str, value: Value) {
        match self.stack.last_mut() {
            Some(Frame::Object(map)) => {
                map.insert(name.to_string(), value);
            }
            Some(Frame::Array(items)) => {
                items.push(value);
            }
            None => {
                self.result = Some(value);
            }
        }
    }
}

impl Visitor for JsonSerializer<'_> {
    fn should_visit(&mut self, property: &Property) -> bool {
        returnable(property, self.projection)
    }

    fn visit(&mut self, property: &Property) -> Result<()> {
        if !property.is_scalar() {
            return Ok(());
        }
        let value = property.raw();
        if value.is_null() {
            // Unassigned scalars write nothing. An assigned decimal that
            // projects to null can only be a non-finite number.
            if !property.is_unassigned() {
                return Err(ScimError::internal(format!(
                    "'{}' holds a non-finite number",
                    property.attr().path
                )));
            }
            return Ok(());
        }
        self.attach(&property.attr().name, value);
        Ok(())
    }

    fn begin_complex(&mut self, _property: &Property) {
        self.stack.push(Frame::Object(Map::new()));
    }

    fn end_complex(&mut self, property: &Property) {
        let Some(Frame::Object(map)) = self.stack.pop() else {
            return;
        };
        if !map.is_empty() || self.stack.is_empty() {
            // Empty containers are omitted; the root object always lands.
            self.attach(&property.attr().name, Value::Object(map));
        }
    }

    fn begin_multi(&mut self, _property: &Property) {
        self.stack.push(Frame::Array(Vec::new()));
    }

    fn end_multi(&mut self, property: &Property) {
        let Some(Frame::Array(items)) = self.stack.pop() else {
            return;
        };
        if !items.is_empty() {
            self.attach(&property.attr().name, Value::Array(items));
        }
    }
}

/// Serialize a property subtree under return-ability rules.
pub fn serialize_property(
    property: &Property,
    projection: Option<&Projection>,
) -> Result<Value> {
    let mut serializer = JsonSerializer {
        projection,
        stack: Vec::new(),
        result: None,
    };
    visit(property, &mut serializer)?;
    Ok(serializer.result.unwrap_or(Value::Null))
}

/// Encode a JSON value to text with HTML-sensitive characters escaped
/// (`<`, `>`, `&`, U+2028, U+2029), so the output can be embedded in HTML
/// contexts verbatim.
pub fn to_json_string(value: &Value) -> String {
    let text = serde_json::to_string(value).expect("serde_json::Value always serializes");
    // Outside of string literals these bytes cannot appear in JSON text,
    // so a whole-text replacement only touches string content.
    text.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::schema::{Attribute, AttributeType};

    fn account_attr() -> Arc<Attribute> {
        let schema = crate::schema::Schema {
            id: "urn:test:ser:Account".to_string(),
            name: "Account".to_string(),
            description: String::new(),
            attributes: vec![
                Arc::new(
                    Attribute::builder("id", AttributeType::String)
                        .returned(crate::schema::Returned::Always)
                        .build(),
                ),
                Arc::new(Attribute::builder("userName", AttributeType::String).build()),
                Arc::new(
                    Attribute::builder("password", AttributeType::String)
                        .mutability(Mutability::WriteOnly)
                        .returned(Returned::Never)
                        .build(),
                ),
                Arc::new(
                    Attribute::builder("secret", AttributeType::String)
                        .returned(Returned::Never)
                        .build(),
                ),
                Arc::new(
                    Attribute::builder("audit", AttributeType::String)
                        .returned(Returned::Request)
                        .build(),
                ),
                Arc::new(
                    Attribute::builder("name", AttributeType::Complex)
                        .sub(Attribute::builder("familyName", AttributeType::String).build())
                        .sub(Attribute::builder("givenName", AttributeType::String).build())
                        .build(),
                ),
                Arc::new(
                    Attribute::builder("emails", AttributeType::Complex)
                        .multi_valued()
                        .sub(Attribute::builder("value", AttributeType::String).build())
                        .sub(Attribute::builder("type", AttributeType::String).build())
                        .build(),
                ),
            ],
        }
        .finalize();

        let mut root = Attribute::builder("", AttributeType::Complex).build();
        root.sub_attributes = schema.attributes.clone();
        Arc::new(root)
    }

    fn account() -> Property {
        let mut p = Property::new(account_attr());
        p.add(
            None,
            &json!({
                "id": "2819c223",
                "userName": "john",
                "password": "hunter2",
                "secret": "classified",
                "audit": "trail",
                "name": {"familyName": "Doe"},
            }),
        )
        .unwrap();
        p.add(
            Some(&crate::expr::compile_path("emails").unwrap()),
            &json!({"value": "j@work.io", "type": "work"}),
        )
        .unwrap();
        p
    }

    #[test]
    fn test_default_serialization() {
        let out = serialize_property(&account(), None).unwrap();
        assert_eq!(out["id"], json!("2819c223"));
        assert_eq!(out["userName"], json!("john"));
        assert_eq!(out["name"], json!({"familyName": "Doe"}));
        assert_eq!(out["emails"], json!([{"value": "j@work.io", "type": "work"}]));
        // writeOnly and returned=never are filtered.
        assert!(out.get("password").is_none());
        assert!(out.get("secret").is_none());
        // returned=request needs an include list.
        assert!(out.get("audit").is_none());
    }

    #[test]
    fn test_unassigned_omitted() {
        let mut p = account();
        p.delete(Some(&crate::expr::compile_path("name").unwrap()))
            .unwrap();
        let out = serialize_property(&p, None).unwrap();
        assert!(out.get("name").is_none());
    }

    #[test]
    fn test_include_projection() {
        let projection = Projection::include(["userName"]);
        let out = serialize_property(&account(), Some(&projection)).unwrap();
        assert_eq!(out["userName"], json!("john"));
        assert!(out.get("name").is_none());
        assert!(out.get("emails").is_none());
        // Always-returned attributes stay.
        assert_eq!(out["id"], json!("2819c223"));
    }

    #[test]
    fn test_include_projection_keeps_ancestors_and_descendants() {
        let projection = Projection::include(["name.familyName"]);
        let out = serialize_property(&account(), Some(&projection)).unwrap();
        assert_eq!(out["name"], json!({"familyName": "Doe"}));

        // Naming the container keeps its children.
        let projection = Projection::include(["name"]);
        let out = serialize_property(&account(), Some(&projection)).unwrap();
        assert_eq!(out["name"], json!({"familyName": "Doe"}));
    }

    #[test]
    fn test_include_enables_request_returned() {
        let projection = Projection::include(["audit"]);
        let out = serialize_property(&account(), Some(&projection)).unwrap();
        assert_eq!(out["audit"], json!("trail"));
        // But never-returned stays out even when named.
        let projection = Projection::include(["secret"]);
        let out = serialize_property(&account(), Some(&projection)).unwrap();
        assert!(out.get("secret").is_none());
    }

    #[test]
    fn test_exclude_projection() {
        let projection = Projection::exclude(["emails", "name.givenName"]);
        let out = serialize_property(&account(), Some(&projection)).unwrap();
        assert!(out.get("emails").is_none());
        assert_eq!(out["name"], json!({"familyName": "Doe"}));
        assert_eq!(out["userName"], json!("john"));
    }

    #[test]
    fn test_projection_case_insensitive() {
        let projection = Projection::exclude(["EMAILS"]);
        let out = serialize_property(&account(), Some(&projection)).unwrap();
        assert!(out.get("emails").is_none());
    }

    #[test]
    fn test_both_lists_rejected() {
        let err =
            Projection::new(vec!["a".to_string()], vec!["b".to_string()]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ScimErrorKind::InvalidValue);
    }

    #[test]
    fn test_html_safe_output() {
        let out = to_json_string(&json!({"note": "<script>&amp;</script>"}));
        assert!(!out.contains('<'));
        assert!(!out.contains('>'));
        assert!(!out.contains('&'));
        assert!(out.contains("\\u003cscript\\u003e"));
        let back: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(back["note"], json!("<script>&amp;</script>"));
    }
}
