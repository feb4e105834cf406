//! Passive Traversal
//!
//! A [`Visitor`] walks the property tree depth-first without mutating it.
//! Complex children are visited in ascending attribute `index` (ties in
//! declaration order, the order the tree was built with); multi-valued
//! elements in their container order. When `should_visit` declines a
//! property, neither it nor its descendants are visited.

use crate::error::Result;
use crate::property::Property;

/// Depth-first traversal collaborator.
pub trait Visitor {
    /// Gate for a property and its entire subtree.
    fn should_visit(&mut self, property: &Property) -> bool {
        let _ = property;
        true
    }

    /// Called for every visited property, containers included, before
    /// descending into them.
    fn visit(&mut self, property: &Property) -> Result<()>;

    /// Called after `visit` on a complex property, before its children.
    fn begin_complex(&mut self, property: &Property) {
        let _ = property;
    }

    /// Called after the children of a complex property.
    fn end_complex(&mut self, property: &Property) {
        let _ = property;
    }

    /// Called after `visit` on a multi-valued property, before its
    /// elements.
    fn begin_multi(&mut self, property: &Property) {
        let _ = property;
    }

    /// Called after the elements of a multi-valued property.
    fn end_multi(&mut self, property: &Property) {
        let _ = property;
    }
}

/// Drive a visitor over a property subtree.
pub fn visit(property: &Property, visitor: &mut dyn Visitor) -> Result<()> {
    if !visitor.should_visit(property) {
        return Ok(());
    }
    visitor.visit(property)?;
    if property.is_multi_valued() {
        visitor.begin_multi(property);
        for elem in property.elements() {
            visit(elem, visitor)?;
        }
        visitor.end_multi(property);
    } else if property.is_complex() {
        visitor.begin_complex(property);
        for child in property.children() {
            visit(child, visitor)?;
        }
        visitor.end_complex(property);
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
