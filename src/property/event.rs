//! Mutation Events and Subscribers
//!
//! Every mutation on a property produces [`Event`] values that propagate
//! synchronously toward the resource root as the mutating call unwinds. At
//! each node along the way, the node's subscribers observe the events and
//! may mutate the subtree they own; this is how cross-property invariants
//! (at most one primary email, no unassigned elements left behind) are
//! enforced without the mutating caller knowing about them.
//!
//! Subscribers are attached at property construction, driven by the
//! annotations on the attribute (see
//! [`register_subscriber`](crate::registry::register_subscriber)).

use serde_json::Value;

use crate::error::Result;

use super::Property;

/// What happened to a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A scalar received a value (or a new value)
    Assigned,
    /// A property lost its value
    Unassigned,
    /// A multi-valued container gained an element
    AddedElement,
    /// A multi-valued container lost an element
    RemovedElement,
    /// An element of a multi-valued container was replaced wholesale
    ReplacedElement,
}

/// A mutation notification.
///
/// The source property is identified by its attribute id (`attr_id`);
/// `index` is the element position within the multi-valued container that
/// is currently dispatching the event, stamped as the event passes through
/// it.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    /// Attribute id of the property the event originated from
    pub attr_id: String,
    /// Full path of the originating attribute
    pub attr_path: String,
    /// Element index within the currently dispatching container
    pub index: Option<usize>,
    /// Raw value after the mutation
    pub value: Value,
    /// Raw value before the mutation, when one existed
    pub prior: Option<Value>,
}

impl Event {
    pub(crate) fn new(kind: EventKind, property: &Property, prior: Option<Value>) -> Self {
        Self {
            kind,
            attr_id: property.attr().id.clone(),
            attr_path: property.attr().path.clone(),
            index: None,
            value: property.raw(),
            prior,
        }
    }
}

/// A handler attached to a property, invoked with the events bubbling
/// through it.
///
/// `owner` is the property the subscriber is attached to; the subscriber
/// may mutate it (and thereby its descendants) through the usual CRUD
/// surface. Events returned from `notify` are appended to the stream the
/// ancestors will observe.
///
/// Subscribers on the same node must not rely on their relative order;
/// all of them are invoked. Dispatch is synchronous and single-threaded,
/// and a subscriber that mutates must converge: the built-in exclusive
/// primary handler is idempotent after a single pass because demoting a
/// boolean from `true` to `false` triggers no further demotions.
pub trait Subscriber: Send {
    fn notify(&mut self, owner: &mut Property, events: &[Event]) -> Result<Vec<Event>>;
}
