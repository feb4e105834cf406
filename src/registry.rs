//! Extension Registries
//!
//! Process-wide registries consulted by the path compiler and by property
//! construction:
//!
//! - the **URN registry**: namespace prefixes the path scanner recognizes
//!   at the head of a path (`urn:...:User:emails.value`). Lookup is
//!   case-insensitive via a byte trie; the registered casing is preserved
//!   and emitted in compiled expressions.
//! - the **subscriber registry**: annotation tag to subscriber factory.
//!   When a property is created whose attribute carries a registered
//!   annotation, the factory supplies the subscriber attached to it.
//!
//! Both registries are populated at process start (the subscriber registry
//! pre-seeds the built-in annotations) and are read-mostly afterward; a
//! reader-writer lock keeps late registration safe.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::property::Subscriber;
use crate::property::subscribers::built_in_factories;
use crate::schema::Attribute;

// =============================================================================
// URN registry
// =============================================================================

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<u8, TrieNode>,
    /// Registered original casing, set on the node of the URN's last byte.
    terminal: Option<String>,
}

#[derive(Debug, Default)]
struct UrnTrie {
    root: TrieNode,
}

impl UrnTrie {
    fn insert(&mut self, urn: &str) {
        let mut node = &mut self.root;
        for b in urn.bytes() {
            node = node.children.entry(b.to_ascii_lowercase()).or_default();
        }
        node.terminal = Some(urn.to_string());
    }

    /// Longest registered prefix of `input` that is followed by `:`.
    ///
    /// Returns the registered casing and the matched byte length.
    fn longest_match(&self, input: &str) -> Option<(String, usize)> {
        let bytes = input.as_bytes();
        let mut node = &self.root;
        let mut best: Option<(String, usize)> = None;
        for (i, b) in bytes.iter().enumerate() {
            match node.children.get(&b.to_ascii_lowercase()) {
                Some(child) => node = child,
                None => break,
            }
            if let Some(original) = &node.terminal
                && bytes.get(i + 1) == Some(&b':')
            {
                best = Some((original.clone(), i + 1));
            }
        }
        best
    }
}

static URNS: Lazy<RwLock<UrnTrie>> = Lazy::new(|| RwLock::new(UrnTrie::default()));

/// Register a URN namespace prefix for the path compiler.
///
/// Lookup is case-insensitive; the casing given here is what compiled
/// expressions carry.
pub fn register_urn(urn: &str) {
    let urn = urn.trim_end_matches(':');
    if urn.is_empty() {
        return;
    }
    debug!(urn, "registering URN namespace");
    URNS.write()
        .expect("URN registry lock poisoned")
        .insert(urn);
}

/// Longest registered URN prefix at the head of `input`, with the matched
/// length (exclusive of the separating `:`).
pub(crate) fn match_urn(input: &str) -> Option<(String, usize)> {
    URNS.read()
        .expect("URN registry lock poisoned")
        .longest_match(input)
}

// =============================================================================
// Subscriber registry
// =============================================================================

/// Constructor invoked when a property is created whose attribute carries
/// the registered annotation. Factories must be pure; they may not perform
/// I/O.
pub type SubscriberFactory = fn(&Attribute) -> Box<dyn Subscriber>;

static SUBSCRIBERS: Lazy<RwLock<HashMap<String, SubscriberFactory>>> =
    Lazy::new(|| RwLock::new(built_in_factories()));

/// Register a subscriber factory for an annotation tag.
///
/// Replaces any previous factory for the same tag. The built-in
/// annotations (`@ExclusivePrimary`, `@AutoCompact`, `@StateSummary`) are
/// pre-registered.
pub fn register_subscriber(annotation: impl Into<String>, factory: SubscriberFactory) {
    let annotation = annotation.into();
    debug!(%annotation, "registering subscriber factory");
    SUBSCRIBERS
        .write()
        .expect("subscriber registry lock poisoned")
        .insert(annotation, factory);
}

/// Subscribers for every registered annotation the attribute carries.
///
/// Invocation order follows the attribute's annotation order, so behavior
/// does not depend on registration order.
pub(crate) fn subscribers_for(attr: &Attribute) -> Vec<Box<dyn Subscriber>> {
    let registry = SUBSCRIBERS
        .read()
        .expect("subscriber registry lock poisoned");
    attr.annotations
        .iter()
        .filter_map(|tag| registry.get(tag).map(|factory| factory(attr)))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
