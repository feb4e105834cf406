//! Built-in Subscribers
//!
//! The annotation-driven behaviors the engine ships with:
//!
//! - `@ExclusivePrimary`: on a multi-valued complex container whose
//!   elements carry a `@Primary` boolean, at most one element may be
//!   `true`. Assigning a new `true` demotes the previous one.
//! - `@AutoCompact`: on a multi-valued container, elements that have
//!   become unassigned are removed after every mutation.
//! - `@StateSummary`: aggregate recount hook for complex containers.
//!
//! All three are pre-registered in the subscriber registry; callers may
//! override them or add their own via
//! [`register_subscriber`](crate::registry::register_subscriber).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::registry::SubscriberFactory;
use crate::schema::{
    ANNOTATION_AUTO_COMPACT, ANNOTATION_EXCLUSIVE_PRIMARY, ANNOTATION_STATE_SUMMARY, Attribute,
};

use super::{Event, EventKind, Property, Subscriber};

/// Demotes the previously-primary element when a new one is promoted.
///
/// A single pass converges: demoting a boolean from `true` to `false`
/// never triggers another demotion.
#[derive(Debug, Default)]
pub struct ExclusivePrimary;

impl Subscriber for ExclusivePrimary {
    fn notify(&mut self, owner: &mut Property, events: &[Event]) -> Result<Vec<Event>> {
        let Some(primary_attr) = owner.attr().primary_sub().map(Arc::clone) else {
            return Ok(Vec::new());
        };

        // The element that just became primary, if any. Later events win.
        let mut promoted: Option<(usize, usize)> = None;
        for (pos, event) in events.iter().enumerate() {
            match event.kind {
                EventKind::Assigned
                    if event.attr_id.eq_ignore_ascii_case(&primary_attr.id)
                        && event.value == Value::Bool(true) =>
                {
                    if let Some(index) = event.index {
                        promoted = Some((pos, index));
                    }
                }
                EventKind::AddedElement | EventKind::ReplacedElement => {
                    if event.value.get(&primary_attr.name).and_then(Value::as_bool)
                        == Some(true)
                        && let Some(index) = event.index
                    {
                        promoted = Some((pos, index));
                    }
                }
                _ => {}
            }
        }
        let Some((pos, mut keep)) = promoted else {
            return Ok(Vec::new());
        };

        // Removals appended to the stream after the promotion (another
        // subscriber compacting in the same dispatch) shift the indices;
        // map the promoted index into the current element order.
        for event in &events[pos + 1..] {
            if event.kind == EventKind::RemovedElement
                && let Some(removed) = event.index
                && removed < keep
            {
                keep -= 1;
            }
        }

        let mut extra = Vec::new();
        for i in 0..owner.elements().len() {
            if i == keep {
                continue;
            }
            let Some(flag) = owner
                .element_mut(i)
                .and_then(|e| e.sub_mut(&primary_attr.name))
            else {
                continue;
            };
            if flag.raw() == Value::Bool(true) {
                let mut demotions = flag.set_scalar_value(&Value::Bool(false))?;
                Property::stamp_index(&mut demotions, i);
                extra.append(&mut demotions);
            }
        }
        Ok(extra)
    }
}

/// Removes elements that have become unassigned.
#[derive(Debug, Default)]
pub struct AutoCompact;

impl Subscriber for AutoCompact {
    fn notify(&mut self, owner: &mut Property, _events: &[Event]) -> Result<Vec<Event>> {
        Ok(owner.compact())
    }
}

/// Aggregate recount hook for complex containers.
///
/// The engine surfaces the annotation and the dispatch point; the recount
/// itself is the service layer's to define by overriding this registration.
#[derive(Debug, Default)]
pub struct StateSummary;

impl Subscriber for StateSummary {
    fn notify(&mut self, _owner: &mut Property, _events: &[Event]) -> Result<Vec<Event>> {
        Ok(Vec::new())
    }
}

/// The pre-registered annotation-to-factory table.
pub(crate) fn built_in_factories() -> HashMap<String, SubscriberFactory> {
    let mut factories: HashMap<String, SubscriberFactory> = HashMap::new();
    factories.insert(ANNOTATION_EXCLUSIVE_PRIMARY.to_string(), |_: &Attribute| {
        Box::new(ExclusivePrimary)
    });
    factories.insert(ANNOTATION_AUTO_COMPACT.to_string(), |_: &Attribute| {
        Box::new(AutoCompact)
    });
    factories.insert(ANNOTATION_STATE_SUMMARY.to_string(), |_: &Attribute| {
        Box::new(StateSummary)
    });
    factories
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::{ANNOTATION_IDENTITY, ANNOTATION_PRIMARY, AttributeType};

    fn emails_attr() -> Arc<Attribute> {
        Arc::new(
            Attribute::builder("emails", AttributeType::Complex)
                .multi_valued()
                .annotate(ANNOTATION_AUTO_COMPACT)
                .annotate(ANNOTATION_EXCLUSIVE_PRIMARY)
                .sub(
                    Attribute::builder("value", AttributeType::String)
                        .annotate(ANNOTATION_IDENTITY)
                        .build(),
                )
                .sub(
                    Attribute::builder("primary", AttributeType::Boolean)
                        .annotate(ANNOTATION_PRIMARY)
                        .build(),
                )
                .build(),
        )
    }

    fn push_email(p: &mut Property, value: &str, primary: Option<bool>) -> usize {
        let i = p.append_element().unwrap();
        let elem = p.element_mut(i).unwrap();
        elem.sub_mut("value")
            .unwrap()
            .set_scalar_value(&json!(value))
            .unwrap();
        if let Some(b) = primary {
            elem.sub_mut("primary")
                .unwrap()
                .set_scalar_value(&json!(b))
                .unwrap();
        }
        i
    }

    #[test]
    fn test_exclusive_primary_demotes_on_added_element() {
        let mut emails = Property::new(emails_attr());
        push_email(&mut emails, "a", Some(true));
        let i = push_email(&mut emails, "c", Some(true));

        let mut events = vec![Event {
            kind: EventKind::AddedElement,
            attr_id: emails.attr().id.clone(),
            attr_path: emails.attr().path.clone(),
            index: Some(i),
            value: emails.element(i).unwrap().raw(),
            prior: None,
        }];
        emails.dispatch(&mut events).unwrap();

        assert_eq!(
            emails.element(0).unwrap().sub("primary").unwrap().raw(),
            json!(false)
        );
        assert_eq!(
            emails.element(i).unwrap().sub("primary").unwrap().raw(),
            json!(true)
        );
        // The demotion itself joined the event stream.
        assert!(
            events
                .iter()
                .any(|e| e.kind == EventKind::Assigned && e.value == json!(false))
        );
    }

    #[test]
    fn test_exclusive_primary_demotes_on_deep_assignment() {
        let mut emails = Property::new(emails_attr());
        push_email(&mut emails, "a", Some(true));
        let i = push_email(&mut emails, "b", None);

        // The element's primary was just assigned true through a path.
        let mut events = {
            let flag = emails
                .element_mut(i)
                .unwrap()
                .sub_mut("primary")
                .unwrap();
            let mut evs = flag.set_scalar_value(&json!(true)).unwrap();
            Property::stamp_index(&mut evs, i);
            evs
        };
        emails.dispatch(&mut events).unwrap();

        assert_eq!(
            emails.element(0).unwrap().sub("primary").unwrap().raw(),
            json!(false)
        );
        assert_eq!(
            emails.element(1).unwrap().sub("primary").unwrap().raw(),
            json!(true)
        );
    }

    #[test]
    fn test_auto_compact_removes_unassigned_elements() {
        let mut emails = Property::new(emails_attr());
        push_email(&mut emails, "a", None);
        let i = push_email(&mut emails, "b", None);
        let mut events = emails.element_mut(i).unwrap().unassign();
        Property::stamp_index(&mut events, i);
        assert_eq!(emails.elements().len(), 2);

        emails.dispatch(&mut events).unwrap();
        assert_eq!(emails.elements().len(), 1);
        assert_eq!(emails.raw(), json!([{"value": "a"}]));
    }

    #[test]
    fn test_registration_order_independence() {
        // Both orders of the two built-ins produce the same final state.
        let mut emails = Property::new(emails_attr());
        push_email(&mut emails, "a", Some(true));
        let i = push_email(&mut emails, "b", None);

        let mut events = {
            let elem = emails.element_mut(i).unwrap();
            let mut evs = elem
                .sub_mut("primary")
                .unwrap()
                .set_scalar_value(&json!(true))
                .unwrap();
            evs.append(&mut elem.sub_mut("value").unwrap().unassign());
            Property::stamp_index(&mut evs, i);
            evs
        };
        emails.dispatch(&mut events).unwrap();

        // Element b (primary only) stays; element a demoted.
        assert_eq!(emails.elements().len(), 2);
        assert_eq!(
            emails.element(0).unwrap().sub("primary").unwrap().raw(),
            json!(false)
        );
    }
}
