//! Active Traversal
//!
//! A [`Navigator`] is a cursor over the property tree with a focus stack:
//! focus moves down by name (singular complex), by index, or by criteria
//! (multi-valued), and back up with `retract`. The source property cannot
//! be retracted past.
//!
//! [`FluentNavigator`] wraps a navigator for chained focusing: the first
//! error is latched and turns every subsequent call into a no-op, so a
//! chain can be written without intermediate checks and inspected once at
//! the end.

use crate::error::{Result, ScimError};
use crate::property::Property;

#[derive(Debug, Clone)]
enum Step {
    /// Lowercased child name of a complex property
    Child(String),
    /// Element index of a multi-valued property
    Element(usize),
}

/// A focus-stack cursor over a property tree.
pub struct Navigator<'a> {
    root: &'a mut Property,
    steps: Vec<Step>,
}

impl<'a> Navigator<'a> {
    pub fn new(root: &'a mut Property) -> Self {
        Self {
            root,
            steps: Vec::new(),
        }
    }

    /// Number of properties on the focus stack, the source included.
    pub fn depth(&self) -> usize {
        self.steps.len() + 1
    }

    /// The currently focused property.
    pub fn current(&self) -> &Property {
        let mut cur: &Property = &*self.root;
        for step in &self.steps {
            cur = match step {
                Step::Child(name) => cur.sub(name).expect("focused child exists"),
                Step::Element(i) => cur.element(*i).expect("focused element exists"),
            };
        }
        cur
    }

    /// Mutable access to the currently focused property.
    pub fn current_mut(&mut self) -> &mut Property {
        let mut cur: &mut Property = &mut *self.root;
        for step in &self.steps {
            cur = match step {
                Step::Child(name) => cur.sub_mut(name).expect("focused child exists"),
                Step::Element(i) => cur.element_mut(*i).expect("focused element exists"),
            };
        }
        cur
    }

    /// Focus the named child of the current property. Valid only on a
    /// singular complex property; the name is matched case-insensitively.
    pub fn focus_name(&mut self, name: &str) -> Result<&Property> {
        let cur = self.current();
        if !cur.is_complex() {
            return Err(ScimError::invalid_path(format!(
                "cannot focus '{}': '{}' is not a singular complex property",
                name,
                cur.attr().path
            )));
        }
        if cur.sub(name).is_none() {
            return Err(ScimError::no_target(format!(
                "no attribute named '{}' under '{}'",
                name,
                cur.attr().path
            )));
        }
        self.steps.push(Step::Child(name.to_ascii_lowercase()));
        Ok(self.current())
    }

    /// Focus the element at `index`. Valid only on a multi-valued
    /// property; out of range is `noTarget`.
    pub fn focus_index(&mut self, index: usize) -> Result<&Property> {
        let cur = self.current();
        if !cur.is_multi_valued() {
            return Err(ScimError::invalid_path(format!(
                "cannot focus element {}: '{}' is not multi-valued",
                index,
                cur.attr().path
            )));
        }
        if index >= cur.elements().len() {
            return Err(ScimError::no_target(format!(
                "element {} out of range for '{}'",
                index,
                cur.attr().path
            )));
        }
        self.steps.push(Step::Element(index));
        Ok(self.current())
    }

    /// Focus the first element satisfying `criteria`. Valid only on a
    /// multi-valued property; no match is `noTarget`.
    pub fn focus_criteria(
        &mut self,
        criteria: impl Fn(&Property) -> bool,
    ) -> Result<&Property> {
        let cur = self.current();
        if !cur.is_multi_valued() {
            return Err(ScimError::invalid_path(format!(
                "cannot focus by criteria: '{}' is not multi-valued",
                cur.attr().path
            )));
        }
        let Some(index) = cur.elements().iter().position(criteria) else {
            return Err(ScimError::no_target(format!(
                "no element of '{}' satisfies the criteria",
                cur.attr().path
            )));
        };
        self.steps.push(Step::Element(index));
        Ok(self.current())
    }

    /// Move focus back up one level. A no-op at the source.
    pub fn retract(&mut self) -> &Property {
        self.steps.pop();
        self.current()
    }
}

/// A navigator wrapper that latches the first error.
///
/// Each focus call on an errored navigator is a no-op, so a whole chain
/// can run unconditionally and the outcome be checked once.
pub struct FluentNavigator<'a> {
    nav: Navigator<'a>,
    error: Option<ScimError>,
}

impl<'a> FluentNavigator<'a> {
    pub fn new(root: &'a mut Property) -> Self {
        Self {
            nav: Navigator::new(root),
            error: None,
        }
    }

    pub fn focus_name(mut self, name: &str) -> Self {
        if self.error.is_none()
            && let Err(e) = self.nav.focus_name(name)
        {
            self.error = Some(e);
        }
        self
    }

    pub fn focus_index(mut self, index: usize) -> Self {
        if self.error.is_none()
            && let Err(e) = self.nav.focus_index(index)
        {
            self.error = Some(e);
        }
        self
    }

    pub fn focus_criteria(mut self, criteria: impl Fn(&Property) -> bool) -> Self {
        if self.error.is_none()
            && let Err(e) = self.nav.focus_criteria(criteria)
        {
            self.error = Some(e);
        }
        self
    }

    pub fn retract(mut self) -> Self {
        if self.error.is_none() {
            self.nav.retract();
        }
        self
    }

    /// The property focused so far (the focus before the first error, if
    /// one occurred).
    pub fn current(&self) -> &Property {
        self.nav.current()
    }

    pub fn error(&self) -> Option<&ScimError> {
        self.error.as_ref()
    }

    /// Unwrap into the inner navigator, or the latched error.
    pub fn into_result(self) -> Result<Navigator<'a>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.nav),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::error::ScimErrorKind;
    use crate::schema::{Attribute, AttributeType};

    fn tree() -> Property {
        let attr = Arc::new(
            Attribute::builder("root", AttributeType::Complex)
                .sub(
                    Attribute::builder("name", AttributeType::Complex)
                        .sub(Attribute::builder("familyName", AttributeType::String).build())
                        .build(),
                )
                .sub(
                    Attribute::builder("emails", AttributeType::Complex)
                        .multi_valued()
                        .sub(Attribute::builder("value", AttributeType::String).build())
                        .sub(Attribute::builder("type", AttributeType::String).build())
                        .build(),
                )
                .build(),
        );
        let mut p = Property::new(attr);
        let emails = p.sub_mut("emails").unwrap();
        for (v, t) in [("a@x.io", "work"), ("b@x.io", "home")] {
            let i = emails.append_element().unwrap();
            let elem = emails.element_mut(i).unwrap();
            elem.sub_mut("value")
                .unwrap()
                .set_scalar_value(&json!(v))
                .unwrap();
            elem.sub_mut("type")
                .unwrap()
                .set_scalar_value(&json!(t))
                .unwrap();
        }
        p
    }

    #[test]
    fn test_focus_name_and_retract() {
        let mut p = tree();
        let mut nav = Navigator::new(&mut p);
        assert_eq!(nav.depth(), 1);

        nav.focus_name("name").unwrap();
        nav.focus_name("FAMILYNAME").unwrap();
        assert_eq!(nav.depth(), 3);
        assert_eq!(nav.current().attr().name, "familyName");

        nav.retract();
        assert_eq!(nav.current().attr().name, "name");

        // Retracting past the source is a no-op.
        nav.retract();
        nav.retract();
        assert_eq!(nav.depth(), 1);
        assert_eq!(nav.current().attr().name, "root");
    }

    #[test]
    fn test_focus_index() {
        let mut p = tree();
        let mut nav = Navigator::new(&mut p);
        nav.focus_name("emails").unwrap();
        nav.focus_index(1).unwrap();
        assert_eq!(
            nav.current().sub("value").unwrap().raw(),
            json!("b@x.io")
        );
    }

    #[test]
    fn test_focus_index_out_of_range() {
        let mut p = tree();
        let mut nav = Navigator::new(&mut p);
        nav.focus_name("emails").unwrap();
        let err = nav.focus_index(5).unwrap_err();
        assert_eq!(err.kind(), ScimErrorKind::NoTarget);
    }

    #[test]
    fn test_focus_criteria() {
        let mut p = tree();
        let mut nav = Navigator::new(&mut p);
        nav.focus_name("emails").unwrap();
        nav.focus_criteria(|e| {
            e.sub("type").is_some_and(|t| t.raw() == json!("home"))
        })
        .unwrap();
        assert_eq!(nav.current().sub("value").unwrap().raw(), json!("b@x.io"));
    }

    #[test]
    fn test_focus_name_on_multi_valued_rejected() {
        let mut p = tree();
        let mut nav = Navigator::new(&mut p);
        nav.focus_name("emails").unwrap();
        assert!(nav.focus_name("value").is_err());
    }

    #[test]
    fn test_fluent_latches_first_error() {
        let mut p = tree();
        let fluent = FluentNavigator::new(&mut p)
            .focus_name("name")
            .focus_name("nope")
            .focus_name("familyName");
        let err = fluent.error().unwrap();
        assert_eq!(err.kind(), ScimErrorKind::NoTarget);
        // Focus stayed where it was before the error.
        assert_eq!(fluent.current().attr().name, "name");
        assert!(fluent.into_result().is_err());
    }

    #[test]
    fn test_fluent_success_chain() {
        let mut p = tree();
        let nav = FluentNavigator::new(&mut p)
            .focus_name("emails")
            .focus_index(0)
            .focus_name("value")
            .into_result()
            .unwrap();
        assert_eq!(nav.current().raw(), json!("a@x.io"));
    }
}
