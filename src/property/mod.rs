//! The Property Tree
//!
//! A [`Property`] is a node of a SCIM resource: a typed value bound to the
//! [`Attribute`](crate::schema::Attribute) that describes it. The tree
//! shape is fixed by the schema (a complex property is created with one
//! child per sub-attribute, all recursively unassigned), so addressing
//! never depends on what data happens to be present.
//!
//! ## Variants
//!
//! One variant per scalar type (string, integer, decimal, boolean,
//! dateTime, reference, binary), each holding `Option<value>` where `None`
//! means **unassigned**; a complex variant holding an ordered child table;
//! and a multi-valued variant holding a sequence of element properties
//! carrying the derived element attribute.
//!
//! ## Unassigned and present
//!
//! - scalar: unassigned iff no value; present iff a non-empty value
//! - complex: unassigned iff every child is; always present
//! - multi-valued: unassigned iff empty; present iff at least one element
//!
//! Mutations go through the CRUD surface in [`crate::crud`]; the low-level
//! primitives here produce the [`Event`]s that bubble to ancestors.

pub mod event;
pub mod subscribers;

mod compare;

pub use compare::StringOp;
pub use event::{Event, EventKind, Subscriber};

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{Result, ScimError};
use crate::registry;
use crate::schema::{Attribute, AttributeType};

/// A node in the resource tree bound to an attribute.
pub struct Property {
    attr: Arc<Attribute>,
    data: PropertyData,
    subscribers: Vec<Box<dyn Subscriber>>,
}

#[derive(Debug)]
pub(crate) enum PropertyData {
    Str(Option<String>),
    Integer(Option<i64>),
    Decimal(Option<f64>),
    Boolean(Option<bool>),
    DateTime(Option<String>),
    Reference(Option<String>),
    Binary(Option<String>),
    /// Children keyed by lowercased name, ordered by attribute index
    Complex(IndexMap<String, Property>),
    Multi {
        elem_attr: Arc<Attribute>,
        elements: Vec<Property>,
    },
}

impl Property {
    /// Create an unassigned property conforming to `attr`.
    ///
    /// A complex attribute gets one recursively-unassigned child per
    /// sub-attribute (ascending `index`, declaration order on ties); a
    /// multi-valued attribute starts with zero elements. Subscribers are
    /// attached from the annotation registry.
    pub fn new(attr: Arc<Attribute>) -> Property {
        let data = if attr.is_multi_valued() {
            PropertyData::Multi {
                elem_attr: attr.to_single_valued(),
                elements: Vec::new(),
            }
        } else if attr.is_complex() {
            let mut order: Vec<&Arc<Attribute>> = attr.sub_attributes.iter().collect();
            order.sort_by_key(|a| a.index);
            let mut children = IndexMap::with_capacity(order.len());
            for sub in order {
                children.insert(
                    sub.name.to_ascii_lowercase(),
                    Property::new(Arc::clone(sub)),
                );
            }
            PropertyData::Complex(children)
        } else {
            match attr.typ {
                AttributeType::String => PropertyData::Str(None),
                AttributeType::Integer => PropertyData::Integer(None),
                AttributeType::Decimal => PropertyData::Decimal(None),
                AttributeType::Boolean => PropertyData::Boolean(None),
                AttributeType::DateTime => PropertyData::DateTime(None),
                AttributeType::Reference => PropertyData::Reference(None),
                AttributeType::Binary => PropertyData::Binary(None),
                AttributeType::Complex => unreachable!(),
            }
        };
        let subscribers = registry::subscribers_for(&attr);
        Property {
            attr,
            data,
            subscribers,
        }
    }

    /// The attribute describing this property.
    pub fn attr(&self) -> &Arc<Attribute> {
        &self.attr
    }

    pub fn is_complex(&self) -> bool {
        matches!(self.data, PropertyData::Complex(_))
    }

    pub fn is_multi_valued(&self) -> bool {
        matches!(self.data, PropertyData::Multi { .. })
    }

    pub fn is_scalar(&self) -> bool {
        !self.is_complex() && !self.is_multi_valued()
    }

    /// Whether this property holds no data.
    pub fn is_unassigned(&self) -> bool {
        match &self.data {
            PropertyData::Str(v) | PropertyData::DateTime(v) | PropertyData::Reference(v)
            | PropertyData::Binary(v) => v.is_none(),
            PropertyData::Integer(v) => v.is_none(),
            PropertyData::Decimal(v) => v.is_none(),
            PropertyData::Boolean(v) => v.is_none(),
            PropertyData::Complex(children) => children.values().all(Property::is_unassigned),
            PropertyData::Multi { elements, .. } => elements.is_empty(),
        }
    }

    /// Whether the `pr` operator is satisfied.
    ///
    /// String-shaped scalars require a non-empty value; a complex property
    /// is always present; a multi-valued property is present iff it has at
    /// least one element.
    pub fn is_present(&self) -> bool {
        match &self.data {
            PropertyData::Str(v)
            | PropertyData::DateTime(v)
            | PropertyData::Reference(v)
            | PropertyData::Binary(v) => v.as_ref().is_some_and(|s| !s.is_empty()),
            PropertyData::Integer(v) => v.is_some(),
            PropertyData::Decimal(v) => v.is_some(),
            PropertyData::Boolean(v) => v.is_some(),
            PropertyData::Complex(_) => true,
            PropertyData::Multi { elements, .. } => !elements.is_empty(),
        }
    }

    /// Language-neutral projection of the value.
    ///
    /// Scalars become the corresponding JSON primitive (`null` when
    /// unassigned); a complex property becomes a map of its assigned
    /// children keyed by attribute name; a multi-valued property becomes
    /// the list of raw values of its non-unassigned elements.
    pub fn raw(&self) -> Value {
        match &self.data {
            PropertyData::Str(v)
            | PropertyData::DateTime(v)
            | PropertyData::Reference(v)
            | PropertyData::Binary(v) => {
                v.as_ref().map_or(Value::Null, |s| Value::String(s.clone()))
            }
            PropertyData::Integer(v) => v.map_or(Value::Null, |n| Value::Number(n.into())),
            PropertyData::Decimal(v) => v
                .and_then(serde_json::Number::from_f64)
                .map_or(Value::Null, Value::Number),
            PropertyData::Boolean(v) => v.map_or(Value::Null, Value::Bool),
            PropertyData::Complex(children) => {
                let mut map = Map::new();
                for child in children.values() {
                    if !child.is_unassigned() {
                        map.insert(child.attr.name.clone(), child.raw());
                    }
                }
                Value::Object(map)
            }
            PropertyData::Multi { elements, .. } => Value::Array(
                elements
                    .iter()
                    .filter(|e| !e.is_unassigned())
                    .map(Property::raw)
                    .collect(),
            ),
        }
    }

    // =========================================================================
    // Child access
    // =========================================================================

    /// Case-insensitive lookup of a child of a complex property.
    pub fn sub(&self, name: &str) -> Option<&Property> {
        match &self.data {
            PropertyData::Complex(children) => children.get(&name.to_ascii_lowercase()),
            _ => None,
        }
    }

    pub fn sub_mut(&mut self, name: &str) -> Option<&mut Property> {
        match &mut self.data {
            PropertyData::Complex(children) => children.get_mut(&name.to_ascii_lowercase()),
            _ => None,
        }
    }

    /// Children of a complex property in traversal order, or an empty
    /// iterator otherwise.
    pub fn children(&self) -> impl Iterator<Item = &Property> {
        match &self.data {
            PropertyData::Complex(children) => {
                Box::new(children.values()) as Box<dyn Iterator<Item = &Property>>
            }
            _ => Box::new(std::iter::empty()),
        }
    }

    /// Elements of a multi-valued property, or an empty slice otherwise.
    pub fn elements(&self) -> &[Property] {
        match &self.data {
            PropertyData::Multi { elements, .. } => elements,
            _ => &[],
        }
    }

    pub fn element(&self, index: usize) -> Option<&Property> {
        self.elements().get(index)
    }

    pub(crate) fn element_mut(&mut self, index: usize) -> Option<&mut Property> {
        match &mut self.data {
            PropertyData::Multi { elements, .. } => elements.get_mut(index),
            _ => None,
        }
    }

    /// The derived element attribute of a multi-valued property.
    pub fn element_attr(&self) -> Option<&Arc<Attribute>> {
        match &self.data {
            PropertyData::Multi { elem_attr, .. } => Some(elem_attr),
            _ => None,
        }
    }

    // =========================================================================
    // Low-level mutation (events produced, dispatch left to the caller)
    // =========================================================================

    /// Assign a scalar value after coercing it to the attribute type.
    /// `null` unassigns.
    pub(crate) fn set_scalar_value(&mut self, value: &Value) -> Result<Vec<Event>> {
        if value.is_null() {
            return Ok(self.unassign());
        }
        let prior = (!self.is_unassigned()).then(|| self.raw());
        let mismatch = |want: &str, got: &Value| {
            ScimError::invalid_value(format!(
                "'{}' expects {}, got {}",
                self.attr.path,
                want,
                json_type_name(got)
            ))
        };
        match &mut self.data {
            PropertyData::Str(slot) => {
                let s = value.as_str().ok_or_else(|| mismatch("a string", value))?;
                *slot = Some(s.to_string());
            }
            PropertyData::Integer(slot) => {
                let n = value
                    .as_i64()
                    .ok_or_else(|| mismatch("an integer", value))?;
                *slot = Some(n);
            }
            PropertyData::Decimal(slot) => {
                let f = value.as_f64().ok_or_else(|| mismatch("a number", value))?;
                if !f.is_finite() {
                    return Err(ScimError::invalid_value(format!(
                        "'{}' rejects non-finite numbers",
                        self.attr.path
                    )));
                }
                *slot = Some(f);
            }
            PropertyData::Boolean(slot) => {
                let b = value.as_bool().ok_or_else(|| mismatch("a boolean", value))?;
                *slot = Some(b);
            }
            PropertyData::DateTime(slot) => {
                let s = value
                    .as_str()
                    .ok_or_else(|| mismatch("a dateTime string", value))?;
                compare::parse_datetime(s)
                    .map_err(|e| e.hint(format!("attribute '{}'", self.attr.path)))?;
                *slot = Some(s.to_string());
            }
            PropertyData::Reference(slot) => {
                let s = value
                    .as_str()
                    .ok_or_else(|| mismatch("a reference string", value))?;
                *slot = Some(s.to_string());
            }
            PropertyData::Binary(slot) => {
                let s = value
                    .as_str()
                    .ok_or_else(|| mismatch("a base64 string", value))?;
                BASE64.decode(s).map_err(|_| {
                    ScimError::invalid_value(format!(
                        "'{}' expects base64 content",
                        self.attr.path
                    ))
                })?;
                *slot = Some(s.to_string());
            }
            PropertyData::Complex(_) | PropertyData::Multi { .. } => {
                return Err(ScimError::internal(format!(
                    "scalar assignment on container '{}'",
                    self.attr.path
                )));
            }
        }
        Ok(vec![Event::new(EventKind::Assigned, self, prior)])
    }

    /// Unassign this property: scalars lose their value, complex cascades
    /// to all children, multi-valued clears its elements. Idempotent.
    pub(crate) fn unassign(&mut self) -> Vec<Event> {
        if self.is_unassigned() {
            return Vec::new();
        }
        let prior = self.raw();
        match &mut self.data {
            PropertyData::Str(v) | PropertyData::DateTime(v) | PropertyData::Reference(v)
            | PropertyData::Binary(v) => *v = None,
            PropertyData::Integer(v) => *v = None,
            PropertyData::Decimal(v) => *v = None,
            PropertyData::Boolean(v) => *v = None,
            PropertyData::Complex(children) => {
                let mut events = Vec::new();
                for child in children.values_mut() {
                    events.append(&mut child.unassign());
                }
                events.push(Event::new(EventKind::Unassigned, self, Some(prior)));
                return events;
            }
            PropertyData::Multi { elements, .. } => {
                let mut events = Vec::new();
                for (i, elem) in elements.drain(..).enumerate() {
                    events.push(Event {
                        kind: EventKind::RemovedElement,
                        attr_id: elem.attr.id.clone(),
                        attr_path: elem.attr.path.clone(),
                        index: Some(i),
                        value: Value::Null,
                        prior: Some(elem.raw()),
                    });
                }
                events.push(Event::new(EventKind::Unassigned, self, Some(prior)));
                return events;
            }
        }
        vec![Event::new(EventKind::Unassigned, self, Some(prior))]
    }

    /// Append a fresh unassigned element and return its index.
    pub(crate) fn append_element(&mut self) -> Result<usize> {
        match &mut self.data {
            PropertyData::Multi {
                elem_attr,
                elements,
            } => {
                elements.push(Property::new(Arc::clone(elem_attr)));
                Ok(elements.len() - 1)
            }
            _ => Err(ScimError::internal(format!(
                "append on non-multi-valued '{}'",
                self.attr.path
            ))),
        }
    }

    /// Remove the elements at the given (ascending) indices, producing one
    /// `RemovedElement` event per removal.
    pub(crate) fn remove_elements(&mut self, indices: &[usize]) -> Vec<Event> {
        let PropertyData::Multi { elements, .. } = &mut self.data else {
            return Vec::new();
        };
        let mut events = Vec::new();
        for &i in indices.iter().rev() {
            if i >= elements.len() {
                continue;
            }
            let elem = elements.remove(i);
            events.push(Event {
                kind: EventKind::RemovedElement,
                attr_id: elem.attr.id.clone(),
                attr_path: elem.attr.path.clone(),
                index: Some(i),
                value: Value::Null,
                prior: Some(elem.raw()),
            });
        }
        events
    }

    /// Remove elements that have become unassigned.
    pub(crate) fn compact(&mut self) -> Vec<Event> {
        let unassigned: Vec<usize> = self
            .elements()
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_unassigned())
            .map(|(i, _)| i)
            .collect();
        self.remove_elements(&unassigned)
    }

    // =========================================================================
    // Subscriber dispatch
    // =========================================================================

    /// Hand the event stream to this node's subscribers. Events they
    /// produce are appended so ancestors observe them too.
    pub(crate) fn dispatch(&mut self, events: &mut Vec<Event>) -> Result<()> {
        if self.subscribers.is_empty() || events.is_empty() {
            return Ok(());
        }
        // Subscribers get mutable access to the node they live on, so they
        // are taken out for the duration of the dispatch.
        let mut subs = std::mem::take(&mut self.subscribers);
        let mut outcome = Ok(());
        for sub in subs.iter_mut() {
            match sub.notify(self, events) {
                Ok(mut extra) => events.append(&mut extra),
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }
        self.subscribers = subs;
        outcome
    }

    /// Stamp the element index onto events bubbling out of element `i`.
    pub(crate) fn stamp_index(events: &mut [Event], i: usize) {
        for event in events {
            event.index = Some(i);
        }
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("attr", &self.attr.id)
            .field("data", &self.data)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::Mutability;

    fn string_attr(name: &str) -> Arc<Attribute> {
        Arc::new(Attribute::builder(name, AttributeType::String).build())
    }

    fn name_attr() -> Arc<Attribute> {
        Arc::new(
            Attribute::builder("name", AttributeType::Complex)
                .sub(Attribute::builder("familyName", AttributeType::String).build())
                .sub(Attribute::builder("givenName", AttributeType::String).build())
                .build(),
        )
    }

    #[test]
    fn test_new_scalar_is_unassigned() {
        let p = Property::new(string_attr("userName"));
        assert!(p.is_unassigned());
        assert!(!p.is_present());
        assert_eq!(p.raw(), Value::Null);
    }

    #[test]
    fn test_new_complex_has_schema_shape() {
        let p = Property::new(name_attr());
        assert!(p.is_complex());
        assert!(p.is_unassigned());
        // Complex is always present for `pr`.
        assert!(p.is_present());
        assert!(p.sub("familyname").is_some());
        assert!(p.sub("FAMILYNAME").is_some());
        assert!(p.sub("nope").is_none());
    }

    #[test]
    fn test_set_and_raw() {
        let mut p = Property::new(string_attr("userName"));
        let events = p.set_scalar_value(&json!("john")).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Assigned);
        assert!(events[0].prior.is_none());
        assert_eq!(p.raw(), json!("john"));

        let events = p.set_scalar_value(&json!("jane")).unwrap();
        assert_eq!(events[0].prior, Some(json!("john")));
    }

    #[test]
    fn test_set_null_unassigns() {
        let mut p = Property::new(string_attr("userName"));
        p.set_scalar_value(&json!("john")).unwrap();
        let events = p.set_scalar_value(&Value::Null).unwrap();
        assert_eq!(events[0].kind, EventKind::Unassigned);
        assert!(p.is_unassigned());
    }

    #[test]
    fn test_unassign_idempotent() {
        let mut p = Property::new(string_attr("userName"));
        p.set_scalar_value(&json!("john")).unwrap();
        assert_eq!(p.unassign().len(), 1);
        assert!(p.is_unassigned());
        assert!(p.unassign().is_empty());
        assert!(p.is_unassigned());
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let mut p = Property::new(string_attr("userName"));
        assert!(p.set_scalar_value(&json!(42)).is_err());

        let mut p = Property::new(Arc::new(
            Attribute::builder("count", AttributeType::Integer).build(),
        ));
        assert!(p.set_scalar_value(&json!("42")).is_err());
        assert!(p.set_scalar_value(&json!(1.5)).is_err());
        assert!(p.set_scalar_value(&json!(42)).is_ok());

        let mut p = Property::new(Arc::new(
            Attribute::builder("active", AttributeType::Boolean).build(),
        ));
        assert!(p.set_scalar_value(&json!("true")).is_err());
        assert!(p.set_scalar_value(&json!(true)).is_ok());
    }

    #[test]
    fn test_datetime_validated() {
        let mut p = Property::new(Arc::new(
            Attribute::builder("created", AttributeType::DateTime).build(),
        ));
        assert!(p.set_scalar_value(&json!("2020-01-01T00:00:00")).is_ok());
        assert!(p.set_scalar_value(&json!("2020-01-01T00:00:00Z")).is_ok());
        assert!(
            p.set_scalar_value(&json!("2020-01-01T00:00:00.123+02:00"))
                .is_ok()
        );
        assert!(p.set_scalar_value(&json!("not a date")).is_err());
    }

    #[test]
    fn test_binary_validated() {
        let mut p = Property::new(Arc::new(
            Attribute::builder("certificate", AttributeType::Binary).build(),
        ));
        assert!(p.set_scalar_value(&json!("aGVsbG8=")).is_ok());
        assert!(p.set_scalar_value(&json!("!!not base64!!")).is_err());
    }

    #[test]
    fn test_decimal_accepts_integers() {
        let mut p = Property::new(Arc::new(
            Attribute::builder("score", AttributeType::Decimal).build(),
        ));
        assert!(p.set_scalar_value(&json!(3)).is_ok());
        assert!(p.set_scalar_value(&json!(3.25)).is_ok());
        assert_eq!(p.raw(), json!(3.25));
    }

    #[test]
    fn test_complex_raw_skips_unassigned_children() {
        let mut p = Property::new(name_attr());
        p.sub_mut("familyName")
            .unwrap()
            .set_scalar_value(&json!("Doe"))
            .unwrap();
        assert_eq!(p.raw(), json!({"familyName": "Doe"}));
    }

    #[test]
    fn test_complex_unassign_cascades() {
        let mut p = Property::new(name_attr());
        p.sub_mut("familyName")
            .unwrap()
            .set_scalar_value(&json!("Doe"))
            .unwrap();
        p.sub_mut("givenName")
            .unwrap()
            .set_scalar_value(&json!("John"))
            .unwrap();

        let events = p.unassign();
        assert!(p.is_unassigned());
        assert_eq!(
            events.last().map(|e| e.kind),
            Some(EventKind::Unassigned)
        );
    }

    #[test]
    fn test_multi_append_and_compact() {
        let attr = Arc::new(
            Attribute::builder("emails", AttributeType::Complex)
                .multi_valued()
                .sub(Attribute::builder("value", AttributeType::String).build())
                .build(),
        );
        let mut p = Property::new(attr);
        assert!(p.is_unassigned());

        let i = p.append_element().unwrap();
        p.element_mut(i)
            .unwrap()
            .sub_mut("value")
            .unwrap()
            .set_scalar_value(&json!("a@x.io"))
            .unwrap();
        let j = p.append_element().unwrap();
        assert_eq!(p.elements().len(), 2);
        assert!(p.element(j).unwrap().is_unassigned());

        let events = p.compact();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::RemovedElement);
        assert_eq!(p.elements().len(), 1);
        assert_eq!(p.raw(), json!([{"value": "a@x.io"}]));
    }

    #[test]
    fn test_children_follow_attribute_index_order() {
        let attr = Arc::new(
            Attribute::builder("meta", AttributeType::Complex)
                .mutability(Mutability::ReadOnly)
                .sub({
                    let mut a = Attribute::builder("version", AttributeType::String).build();
                    a.index = 2;
                    a
                })
                .sub({
                    let mut a = Attribute::builder("created", AttributeType::DateTime).build();
                    a.index = 0;
                    a
                })
                .sub({
                    let mut a = Attribute::builder("location", AttributeType::Reference).build();
                    a.index = 1;
                    a
                })
                .build(),
        );
        let p = Property::new(attr);
        let names: Vec<&str> = p.children().map(|c| c.attr().name.as_str()).collect();
        assert_eq!(names, vec!["created", "location", "version"]);
    }
}
