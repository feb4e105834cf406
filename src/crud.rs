//! Path-Addressed CRUD
//!
//! Get/Add/Replace/Delete over the property tree, driven by compiled path
//! [`Expression`]s. A `None` path means "this property itself". An
//! operator node in the path chain selects the elements of a multi-valued
//! container that satisfy the filter.
//!
//! Mutations return the [`Event`] stream they produced. At every level of
//! the recursion the node's subscribers observe the events on the way out,
//! which is how the multi-valued invariants are maintained: a container
//! annotated `@AutoCompact` drops elements that became unassigned, and one
//! annotated `@ExclusivePrimary` demotes the previously-primary element
//! when a new one is promoted.
//!
//! ## Examples
//!
//! ```text
//! user.get(Some(&compile_path("emails[type eq \"work\"].value")?))
//! user.add(Some(&compile_path("emails")?), &json!({"value": "c@x.io"}))
//! user.replace(Some(&compile_path("name.familyName")?), &json!("Doe"))
//! user.delete(Some(&compile_path("emails[value eq \"c@x.io\"]")?))
//! ```

use serde_json::Value;

use crate::error::{Result, ScimError};
use crate::eval;
use crate::expr::Expression;
use crate::property::{Event, EventKind, Property};

/// How `Replace` treats keys missing from the value on a complex
/// self-replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplaceMode {
    /// Deep overwrite: children missing from the value are deleted.
    #[default]
    Overwrite,
    /// Children missing from the value are left alone.
    Merge,
}

impl Property {
    /// Resolve `path` and return the raw value, `null` when nothing is
    /// assigned. Results reached through multi-valued containers are
    /// flattened into a list.
    pub fn get(&self, path: Option<&Expression>) -> Result<Value> {
        let Some(step) = path else {
            return Ok(self.raw());
        };
        if step.is_operator() {
            if !self.is_multi_valued() {
                return Err(ScimError::invalid_path(format!(
                    "filter step on singular attribute '{}'",
                    self.attr().path
                )));
            }
            let mut out = Vec::new();
            for i in self.matching_indices(step)? {
                let elem = self.element(i).expect("matched index in range");
                match step.next() {
                    None => {
                        if !elem.is_unassigned() {
                            out.push(elem.raw());
                        }
                    }
                    Some(next) => flatten_into(&mut out, elem.get(Some(next))?),
                }
            }
            return Ok(Value::Array(out));
        }
        if self.is_complex() {
            return match self.sub(step.token()) {
                Some(child) => child.get(step.next()),
                None if step.is_urn() => self.get(step.next()),
                None => Err(ScimError::no_target(format!(
                    "no attribute named '{}' under '{}'",
                    step.token(),
                    display_path(self)
                ))),
            };
        }
        if self.is_multi_valued() {
            let mut out = Vec::new();
            for elem in self.elements() {
                flatten_into(&mut out, elem.get(Some(step))?);
            }
            return Ok(Value::Array(out));
        }
        Err(ScimError::no_target(format!(
            "'{}' cannot be stepped into",
            self.attr().path
        )))
    }

    /// Add `value` at `path`. On a multi-valued target with no remaining
    /// path, the value is a single element to append; on a complex target
    /// it is a map merged key-by-key; on a scalar it replaces the value
    /// (`null` deletes).
    pub fn add(&mut self, path: Option<&Expression>, value: &Value) -> Result<Vec<Event>> {
        self.apply(path, value, Op::Add, ReplaceMode::Overwrite)
    }

    /// Replace at `path`. Same targeting as [`Property::add`], but a
    /// complex self-replace deep-overwrites (missing keys are deleted) and
    /// a multi-valued self-replace clears the container and appends each
    /// element of the list value.
    pub fn replace(&mut self, path: Option<&Expression>, value: &Value) -> Result<Vec<Event>> {
        self.apply(path, value, Op::Replace, ReplaceMode::Overwrite)
    }

    /// [`Property::replace`] with an explicit missing-key policy.
    pub fn replace_with_mode(
        &mut self,
        path: Option<&Expression>,
        value: &Value,
        mode: ReplaceMode,
    ) -> Result<Vec<Event>> {
        self.apply(path, value, Op::Replace, mode)
    }

    /// Delete at `path`: scalars unassign, complex cascades to all
    /// children, a multi-valued container drops the selected elements (or
    /// all of them without a path).
    pub fn delete(&mut self, path: Option<&Expression>) -> Result<Vec<Event>> {
        let Some(step) = path else {
            let events = self.unassign();
            return self.bubble(events);
        };
        if step.is_operator() {
            if !self.is_multi_valued() {
                return Err(ScimError::invalid_path(format!(
                    "filter step on singular attribute '{}'",
                    self.attr().path
                )));
            }
            let matched = self.matching_indices(step)?;
            let events = match step.next() {
                // No continuation: the matched elements themselves go.
                None => self.remove_elements(&matched),
                Some(next) => {
                    let mut events = Vec::new();
                    for i in matched {
                        let elem = self.element_mut(i).expect("matched index in range");
                        let mut evs = elem.delete(Some(next))?;
                        Property::stamp_index(&mut evs, i);
                        events.append(&mut evs);
                    }
                    events
                }
            };
            return self.bubble(events);
        }
        if self.is_complex() {
            return match self.sub_mut(step.token()) {
                Some(child) => {
                    let events = child.delete(step.next())?;
                    self.bubble(events)
                }
                None if step.is_urn() => self.delete(step.next()),
                None => Err(ScimError::no_target(format!(
                    "no attribute named '{}' under '{}'",
                    step.token(),
                    display_path(self)
                ))),
            };
        }
        if self.is_multi_valued() {
            let mut events = Vec::new();
            for i in 0..self.elements().len() {
                let elem = self.element_mut(i).expect("index in range");
                let mut evs = elem.delete(Some(step))?;
                Property::stamp_index(&mut evs, i);
                events.append(&mut evs);
            }
            return self.bubble(events);
        }
        Err(ScimError::no_target(format!(
            "'{}' cannot be stepped into",
            self.attr().path
        )))
    }

    // =========================================================================
    // Shared Add/Replace recursion
    // =========================================================================

    fn apply(
        &mut self,
        path: Option<&Expression>,
        value: &Value,
        op: Op,
        mode: ReplaceMode,
    ) -> Result<Vec<Event>> {
        let Some(step) = path else {
            return self.apply_self(value, op, mode);
        };
        if step.is_operator() {
            if !self.is_multi_valued() {
                return Err(ScimError::invalid_path(format!(
                    "filter step on singular attribute '{}'",
                    self.attr().path
                )));
            }
            let matched = self.matching_indices(step)?;
            let mut events = Vec::new();
            for i in matched {
                let elem = self.element_mut(i).expect("matched index in range");
                let mut evs = match (step.next(), op) {
                    // Whole-element replace through a filter step.
                    (None, Op::Replace) => {
                        let prior = elem.raw();
                        let mut evs = elem.apply(None, value, op, mode)?;
                        evs.push(Event {
                            kind: EventKind::ReplacedElement,
                            attr_id: elem.attr().id.clone(),
                            attr_path: elem.attr().path.clone(),
                            index: Some(i),
                            value: elem.raw(),
                            prior: Some(prior),
                        });
                        evs
                    }
                    (next, _) => elem.apply(next, value, op, mode)?,
                };
                Property::stamp_index(&mut evs, i);
                events.append(&mut evs);
            }
            return self.bubble(events);
        }
        if self.is_complex() {
            return match self.sub_mut(step.token()) {
                Some(child) => {
                    let events = child.apply(step.next(), value, op, mode)?;
                    self.bubble(events)
                }
                None if step.is_urn() => self.apply(step.next(), value, op, mode),
                None => Err(ScimError::no_target(format!(
                    "no attribute named '{}' under '{}'",
                    step.token(),
                    display_path(self)
                ))),
            };
        }
        if self.is_multi_valued() {
            let mut events = Vec::new();
            for i in 0..self.elements().len() {
                let elem = self.element_mut(i).expect("index in range");
                let mut evs = elem.apply(Some(step), value, op, mode)?;
                Property::stamp_index(&mut evs, i);
                events.append(&mut evs);
            }
            return self.bubble(events);
        }
        Err(ScimError::no_target(format!(
            "'{}' cannot be stepped into",
            self.attr().path
        )))
    }

    fn apply_self(&mut self, value: &Value, op: Op, mode: ReplaceMode) -> Result<Vec<Event>> {
        if value.is_null() {
            return self.delete(None);
        }
        if self.is_complex() {
            let Value::Object(map) = value else {
                return Err(ScimError::invalid_value(format!(
                    "'{}' expects an object",
                    display_path(self)
                )));
            };
            for key in map.keys() {
                if self.sub(key).is_none() {
                    return Err(ScimError::no_target(format!(
                        "no attribute named '{}' under '{}'",
                        key,
                        display_path(self)
                    )));
                }
            }
            let mut events = Vec::new();
            if op == Op::Replace && mode == ReplaceMode::Overwrite {
                // Deep overwrite: children absent from the value are deleted.
                let names: Vec<String> = self
                    .children()
                    .map(|c| c.attr().name.clone())
                    .collect();
                for name in names {
                    let supplied = map
                        .iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(&name))
                        .map(|(_, v)| v.clone());
                    let child = self.sub_mut(&name).expect("child exists");
                    let mut evs = match supplied {
                        Some(v) => child.apply_self(&v, op, mode)?,
                        None => child.delete(None)?,
                    };
                    events.append(&mut evs);
                }
            } else {
                for (key, v) in map {
                    let child = self.sub_mut(key).expect("checked above");
                    let mut evs = child.apply_self(v, op, mode)?;
                    events.append(&mut evs);
                }
            }
            return self.bubble(events);
        }
        if self.is_multi_valued() {
            return match op {
                Op::Add => {
                    if value.is_array() {
                        return Err(ScimError::invalid_value(format!(
                            "'{}' expects a single element value; lists are replaced, not added",
                            display_path(self)
                        )));
                    }
                    let event = self.append_populated(value)?;
                    self.bubble(vec![event])
                }
                Op::Replace => {
                    let Value::Array(items) = value else {
                        return Err(ScimError::invalid_value(format!(
                            "'{}' expects a list value",
                            display_path(self)
                        )));
                    };
                    let mut events = self.unassign();
                    for item in items {
                        events.push(self.append_populated(item)?);
                    }
                    self.bubble(events)
                }
            };
        }
        let events = self.set_scalar_value(value)?;
        self.bubble(events)
    }

    /// Append a new element, populate it from `value`, and produce the
    /// `AddedElement` event. A population failure removes the element
    /// again.
    fn append_populated(&mut self, value: &Value) -> Result<Event> {
        let i = self.append_element()?;
        let elem = self.element_mut(i).expect("just appended");
        if let Err(e) = elem.apply_self(value, Op::Add, ReplaceMode::Overwrite) {
            self.remove_elements(&[i]);
            return Err(e);
        }
        let elem = self.element(i).expect("just appended");
        Ok(Event {
            kind: EventKind::AddedElement,
            attr_id: self.attr().id.clone(),
            attr_path: self.attr().path.clone(),
            index: Some(i),
            value: elem.raw(),
            prior: None,
        })
    }

    /// Indices of the elements satisfying the filter step.
    fn matching_indices(&self, filter: &Expression) -> Result<Vec<usize>> {
        let mut matched = Vec::new();
        for (i, elem) in self.elements().iter().enumerate() {
            if eval::evaluate(elem, filter)
                .map_err(|e| e.hint(format!("selecting elements of '{}'", self.attr().path)))?
            {
                matched.push(i);
            }
        }
        Ok(matched)
    }

    /// Let this node's subscribers observe the events, then pass the
    /// stream (with whatever they appended) to the caller.
    fn bubble(&mut self, mut events: Vec<Event>) -> Result<Vec<Event>> {
        self.dispatch(&mut events)?;
        Ok(events)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Replace,
}

fn flatten_into(out: &mut Vec<Value>, value: Value) {
    match value {
        Value::Null => {}
        Value::Array(items) => out.extend(items),
        other => out.push(other),
    }
}

/// Root attributes have an empty path; fall back to the name for messages.
fn display_path(property: &Property) -> String {
    let attr = property.attr();
    if attr.path.is_empty() {
        if attr.name.is_empty() {
            "the resource".to_string()
        } else {
            attr.name.clone()
        }
    } else {
        attr.path.clone()
    }
}

// =============================================================================
// Tests
// =============================================================================
