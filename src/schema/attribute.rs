//! SCIM Attribute Metadata
//!
//! An [`Attribute`] is the schema descriptor of a single SCIM field per
//! RFC 7643 Section 2: its type, its sub-attributes when complex, and the
//! characteristics (mutability, returned, uniqueness, case sensitivity)
//! that drive comparison, CRUD, and serialization behavior.
//!
//! Attributes are immutable once registered and shared via `Arc`; every
//! property in a resource tree holds a reference to the attribute that
//! describes it.
//!
//! Beyond the RFC 7643 characteristics, each attribute carries:
//!
//! - `id`: globally unique identifier (e.g. `urn:...:User:emails.value`),
//!   the join key for annotations and event routing
//! - `path`: full dotted path from the resource root
//! - `index`: ordering key among siblings, the DFS traversal order
//! - `annotations`: string tags (e.g. `@Primary`) driving optional behavior

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScimError};
use crate::expr::Operator;

// =============================================================================
// Annotations
// =============================================================================

/// Marks a boolean sub-attribute as the "primary" flag of a multi-valued
/// complex element.
pub const ANNOTATION_PRIMARY: &str = "@Primary";

/// Marks sub-attributes that identify a complex value for matching and
/// deduplication.
pub const ANNOTATION_IDENTITY: &str = "@Identity";

/// On a multi-valued complex container: at most one element may have its
/// `@Primary` boolean set to `true`; assigning a new `true` demotes the old.
pub const ANNOTATION_EXCLUSIVE_PRIMARY: &str = "@ExclusivePrimary";

/// On a multi-valued container: unassigned elements are removed after every
/// mutation.
pub const ANNOTATION_AUTO_COMPACT: &str = "@AutoCompact";

/// On a complex container: recompute an aggregate summary after mutations.
pub const ANNOTATION_STATE_SUMMARY: &str = "@StateSummary";

/// Marks the attribute holding the resource id.
pub const ANNOTATION_ID: &str = "@Id";

/// Marks the attribute listing the schema URNs of the resource.
pub const ANNOTATION_SCHEMAS: &str = "@Schemas";

/// Marks the resource metadata container.
pub const ANNOTATION_META: &str = "@Meta";

/// Prefix for annotations a multi-valued container declares for its derived
/// element attribute: `@ElementAnnotations:@Tag` on the container puts
/// `@Tag` on each element.
pub const ANNOTATION_ELEMENT_PREFIX: &str = "@ElementAnnotations:";

// =============================================================================
// Characteristic enums
// =============================================================================

/// SCIM attribute data types per RFC 7643 Section 2.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeType {
    #[default]
    String,
    Integer,
    Decimal,
    Boolean,
    DateTime,
    Reference,
    Binary,
    Complex,
}

impl AttributeType {
    /// Strict parse of the fixed wire form. Empty input yields the SCIM
    /// default (`string`); anything else unknown is an error.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "" => Ok(Self::default()),
            "string" => Ok(AttributeType::String),
            "integer" => Ok(AttributeType::Integer),
            "decimal" => Ok(AttributeType::Decimal),
            "boolean" => Ok(AttributeType::Boolean),
            "dateTime" => Ok(AttributeType::DateTime),
            "reference" => Ok(AttributeType::Reference),
            "binary" => Ok(AttributeType::Binary),
            "complex" => Ok(AttributeType::Complex),
            other => Err(ScimError::invalid_value(format!(
                "unknown attribute type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttributeType::String => "string",
            AttributeType::Integer => "integer",
            AttributeType::Decimal => "decimal",
            AttributeType::Boolean => "boolean",
            AttributeType::DateTime => "dateTime",
            AttributeType::Reference => "reference",
            AttributeType::Binary => "binary",
            AttributeType::Complex => "complex",
        };
        write!(f, "{}", s)
    }
}

/// Attribute mutability per RFC 7643 Section 2.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mutability {
    #[default]
    ReadWrite,
    ReadOnly,
    WriteOnly,
    Immutable,
}

impl Mutability {
    /// Strict parse of the fixed wire form; empty yields `readWrite`.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "" => Ok(Self::default()),
            "readWrite" => Ok(Mutability::ReadWrite),
            "readOnly" => Ok(Mutability::ReadOnly),
            "writeOnly" => Ok(Mutability::WriteOnly),
            "immutable" => Ok(Mutability::Immutable),
            other => Err(ScimError::invalid_value(format!(
                "unknown mutability '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Mutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mutability::ReadWrite => "readWrite",
            Mutability::ReadOnly => "readOnly",
            Mutability::WriteOnly => "writeOnly",
            Mutability::Immutable => "immutable",
        };
        write!(f, "{}", s)
    }
}

/// When an attribute appears in serialized output, per RFC 7643 Section 2.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Returned {
    #[default]
    Default,
    Always,
    Request,
    Never,
}

impl Returned {
    /// Strict parse of the fixed wire form; empty yields `default`.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "" => Ok(Self::default()),
            "default" => Ok(Returned::Default),
            "always" => Ok(Returned::Always),
            "request" => Ok(Returned::Request),
            "never" => Ok(Returned::Never),
            other => Err(ScimError::invalid_value(format!(
                "unknown returned-ability '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Returned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Returned::Default => "default",
            Returned::Always => "always",
            Returned::Request => "request",
            Returned::Never => "never",
        };
        write!(f, "{}", s)
    }
}

/// Uniqueness constraint per RFC 7643 Section 2.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Uniqueness {
    #[default]
    None,
    Server,
    Global,
}

impl Uniqueness {
    /// Strict parse of the fixed wire form; empty yields `none`.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "" => Ok(Self::default()),
            "none" => Ok(Uniqueness::None),
            "server" => Ok(Uniqueness::Server),
            "global" => Ok(Uniqueness::Global),
            other => Err(ScimError::invalid_value(format!(
                "unknown uniqueness '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Uniqueness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Uniqueness::None => "none",
            Uniqueness::Server => "server",
            Uniqueness::Global => "global",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// Attribute
// =============================================================================

/// Schema descriptor of a SCIM field.
///
/// Serializes to and from the RFC 7643 schema-document attribute shape
/// (camelCase keys, `subAttributes`). The engine-internal fields (`id`,
/// `path`, `index`, `annotations`) default when absent and are filled in by
/// [`Schema::register`](crate::schema::Schema) finalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    /// SCIM field name (addressed case-insensitively)
    pub name: String,

    /// Data type
    #[serde(rename = "type", default)]
    pub typ: AttributeType,

    /// Ordered child attributes; non-empty iff `typ == Complex`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_attributes: Vec<Arc<Attribute>>,

    /// Whether the attribute holds a list of values
    #[serde(default)]
    pub multi_valued: bool,

    /// Human-readable description from the schema document
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Whether a value is required
    #[serde(default)]
    pub required: bool,

    /// Canonical values hint (e.g. "work", "home")
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub canonical_values: Vec<String>,

    /// Whether string comparison is case-sensitive
    #[serde(default)]
    pub case_exact: bool,

    /// Mutability characteristic
    #[serde(default)]
    pub mutability: Mutability,

    /// Return-ability characteristic
    #[serde(default)]
    pub returned: Returned,

    /// Uniqueness characteristic
    #[serde(default)]
    pub uniqueness: Uniqueness,

    /// Resource types a reference may point at; only on `typ == Reference`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_types: Vec<String>,

    /// Globally unique identifier, the join key for metadata
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Full dotted path from the resource root
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,

    /// Ordering key among siblings (DFS traversal order)
    #[serde(default)]
    pub index: u32,

    /// Behavior tags (e.g. `@Primary`, `@AutoCompact`)
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    pub annotations: IndexSet<String>,
}

impl Attribute {
    /// Start building an attribute with the given name and type.
    pub fn builder(name: impl Into<String>, typ: AttributeType) -> AttributeBuilder {
        AttributeBuilder::new(name, typ)
    }

    /// Case-insensitive equality against the attribute name.
    pub fn matches_name(&self, s: &str) -> bool {
        self.name.eq_ignore_ascii_case(s)
    }

    /// Whether this attribute carries the given annotation tag.
    pub fn has_annotation(&self, tag: &str) -> bool {
        self.annotations.contains(tag)
    }

    /// Whether two attributes describe the same field.
    ///
    /// Identity is by case-insensitive `id` plus the `multiValued` flag, so
    /// a container and its derived element attribute never compare equal.
    pub fn same_as(&self, other: &Attribute) -> bool {
        self.id.eq_ignore_ascii_case(&other.id) && self.multi_valued == other.multi_valued
    }

    pub fn is_complex(&self) -> bool {
        self.typ == AttributeType::Complex
    }

    pub fn is_multi_valued(&self) -> bool {
        self.multi_valued
    }

    /// Case-insensitive lookup of a direct sub-attribute.
    pub fn find_sub(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.sub_attributes.iter().find(|a| a.matches_name(name))
    }

    /// Sub-attributes that identify a complex value for matching: those
    /// annotated `@Identity`, or all sub-attributes when none are.
    pub fn identity_subs(&self) -> Vec<&Arc<Attribute>> {
        let tagged: Vec<_> = self
            .sub_attributes
            .iter()
            .filter(|a| a.has_annotation(ANNOTATION_IDENTITY))
            .collect();
        if tagged.is_empty() {
            self.sub_attributes.iter().collect()
        } else {
            tagged
        }
    }

    /// The boolean sub-attribute annotated `@Primary`, if any.
    pub fn primary_sub(&self) -> Option<&Arc<Attribute>> {
        self.sub_attributes.iter().find(|a| {
            a.typ == AttributeType::Boolean
                && (a.has_annotation(ANNOTATION_PRIMARY)
                    || a.has_annotation(ANNOTATION_EXCLUSIVE_PRIMARY))
        })
    }

    /// True iff any sub-attribute is a boolean annotated `@Primary` or
    /// `@ExclusivePrimary`.
    pub fn has_exclusive_sub(&self) -> bool {
        self.primary_sub().is_some()
    }

    /// Check that `op` can be applied to a property of this attribute.
    pub fn op_compatibility(&self, op: Operator) -> Result<()> {
        let fail = |why: &str| {
            Err(ScimError::invalid_filter(format!(
                "cannot apply '{}' to {} attribute '{}'",
                op, why, self.name
            )))
        };
        match op {
            Operator::And | Operator::Or | Operator::Not | Operator::Pr => Ok(()),
            Operator::Eq => {
                if self.typ == AttributeType::Complex {
                    fail("complex")
                } else {
                    Ok(())
                }
            }
            Operator::Ne => {
                if self.typ == AttributeType::Complex {
                    fail("complex")
                } else if self.multi_valued {
                    fail("multi-valued")
                } else {
                    Ok(())
                }
            }
            Operator::Sw | Operator::Ew | Operator::Co => {
                if self.multi_valued {
                    fail("multi-valued")
                } else if !matches!(self.typ, AttributeType::String | AttributeType::Reference) {
                    fail(&self.typ.to_string())
                } else {
                    Ok(())
                }
            }
            Operator::Gt | Operator::Ge | Operator::Lt | Operator::Le => {
                if self.multi_valued {
                    fail("multi-valued")
                } else if !matches!(
                    self.typ,
                    AttributeType::Integer
                        | AttributeType::Decimal
                        | AttributeType::DateTime
                        | AttributeType::String
                ) {
                    fail(&self.typ.to_string())
                } else {
                    Ok(())
                }
            }
        }
    }

    /// The derived element attribute of a multi-valued attribute.
    ///
    /// For a multi-valued attribute this yields the same descriptor with
    /// `multiValued = false`, an `$elem`-suffixed id, and the annotations
    /// declared via `@ElementAnnotations:` promoted onto the element. For a
    /// singular attribute, returns a clone of self. Deterministic: equal
    /// inputs produce equal outputs.
    pub fn to_single_valued(self: &Arc<Self>) -> Arc<Attribute> {
        if !self.multi_valued {
            return Arc::clone(self);
        }
        let mut elem = Attribute::clone(self);
        elem.multi_valued = false;
        elem.id = format!("{}$elem", self.id);
        elem.annotations = self
            .annotations
            .iter()
            .filter_map(|tag| {
                tag.strip_prefix(ANNOTATION_ELEMENT_PREFIX)
                    .map(str::to_string)
            })
            .collect();
        Arc::new(elem)
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Fluent constructor for [`Attribute`] values, used by the bundled core
/// schemas and by tests.
#[derive(Debug, Clone)]
pub struct AttributeBuilder {
    attr: Attribute,
}

impl AttributeBuilder {
    fn new(name: impl Into<String>, typ: AttributeType) -> Self {
        Self {
            attr: Attribute {
                name: name.into(),
                typ,
                sub_attributes: Vec::new(),
                multi_valued: false,
                description: String::new(),
                required: false,
                canonical_values: Vec::new(),
                case_exact: false,
                mutability: Mutability::default(),
                returned: Returned::default(),
                uniqueness: Uniqueness::default(),
                reference_types: Vec::new(),
                id: String::new(),
                path: String::new(),
                index: 0,
                annotations: IndexSet::new(),
            },
        }
    }

    pub fn multi_valued(mut self) -> Self {
        self.attr.multi_valued = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.attr.required = true;
        self
    }

    pub fn case_exact(mut self) -> Self {
        self.attr.case_exact = true;
        self
    }

    pub fn description(mut self, d: impl Into<String>) -> Self {
        self.attr.description = d.into();
        self
    }

    pub fn mutability(mut self, m: Mutability) -> Self {
        self.attr.mutability = m;
        self
    }

    pub fn returned(mut self, r: Returned) -> Self {
        self.attr.returned = r;
        self
    }

    pub fn uniqueness(mut self, u: Uniqueness) -> Self {
        self.attr.uniqueness = u;
        self
    }

    pub fn canonical_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attr.canonical_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn reference_types<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attr.reference_types = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn annotate(mut self, tag: impl Into<String>) -> Self {
        self.attr.annotations.insert(tag.into());
        self
    }

    /// Append a sub-attribute (declaration order is the tie-break order for
    /// traversal).
    pub fn sub(mut self, sub: Attribute) -> Self {
        self.attr.sub_attributes.push(Arc::new(sub));
        self
    }

    pub fn build(self) -> Attribute {
        self.attr
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn string_attr(name: &str) -> Attribute {
        Attribute::builder(name, AttributeType::String).build()
    }

    fn emails_attr() -> Arc<Attribute> {
        Arc::new(
            Attribute::builder("emails", AttributeType::Complex)
                .multi_valued()
                .annotate(ANNOTATION_AUTO_COMPACT)
                .annotate(ANNOTATION_EXCLUSIVE_PRIMARY)
                .annotate(format!("{}{}", ANNOTATION_ELEMENT_PREFIX, "@Marker"))
                .sub(
                    Attribute::builder("value", AttributeType::String)
                        .annotate(ANNOTATION_IDENTITY)
                        .build(),
                )
                .sub(string_attr("type"))
                .sub(
                    Attribute::builder("primary", AttributeType::Boolean)
                        .annotate(ANNOTATION_PRIMARY)
                        .build(),
                )
                .build(),
        )
    }

    #[test]
    fn test_matches_name_case_insensitive() {
        let attr = string_attr("userName");
        assert!(attr.matches_name("username"));
        assert!(attr.matches_name("USERNAME"));
        assert!(!attr.matches_name("displayName"));
    }

    #[test]
    fn test_type_parse_strict() {
        assert_eq!(AttributeType::parse("dateTime").unwrap(), AttributeType::DateTime);
        assert_eq!(AttributeType::parse("").unwrap(), AttributeType::String);
        assert!(AttributeType::parse("datetime").is_err());
        assert!(AttributeType::parse("object").is_err());
    }

    #[test]
    fn test_characteristic_defaults() {
        assert_eq!(Mutability::parse("").unwrap(), Mutability::ReadWrite);
        assert_eq!(Returned::parse("").unwrap(), Returned::Default);
        assert_eq!(Uniqueness::parse("").unwrap(), Uniqueness::None);
        assert!(Mutability::parse("readonly").is_err());
    }

    #[rstest]
    #[case(Operator::And)]
    #[case(Operator::Or)]
    #[case(Operator::Not)]
    #[case(Operator::Pr)]
    fn test_logical_and_pr_always_ok(#[case] op: Operator) {
        assert!(emails_attr().op_compatibility(op).is_ok());
        assert!(string_attr("x").op_compatibility(op).is_ok());
    }

    #[test]
    fn test_eq_rejected_on_complex() {
        let attr = Attribute::builder("name", AttributeType::Complex)
            .sub(string_attr("familyName"))
            .build();
        assert!(attr.op_compatibility(Operator::Eq).is_err());
        assert!(string_attr("x").op_compatibility(Operator::Eq).is_ok());
    }

    #[test]
    fn test_ne_rejected_on_multi_valued() {
        let attr = Attribute::builder("groups", AttributeType::String)
            .multi_valued()
            .build();
        assert!(attr.op_compatibility(Operator::Ne).is_err());
        assert!(attr.op_compatibility(Operator::Eq).is_ok());
    }

    #[rstest]
    #[case(Operator::Sw)]
    #[case(Operator::Ew)]
    #[case(Operator::Co)]
    fn test_substring_ops_limited_to_string_like(#[case] op: Operator) {
        assert!(string_attr("x").op_compatibility(op).is_ok());
        assert!(
            Attribute::builder("ref", AttributeType::Reference)
                .build()
                .op_compatibility(op)
                .is_ok()
        );
        assert!(
            Attribute::builder("n", AttributeType::Integer)
                .build()
                .op_compatibility(op)
                .is_err()
        );
        assert!(
            Attribute::builder("b", AttributeType::Boolean)
                .build()
                .op_compatibility(op)
                .is_err()
        );
    }

    #[rstest]
    #[case(Operator::Gt)]
    #[case(Operator::Ge)]
    #[case(Operator::Lt)]
    #[case(Operator::Le)]
    fn test_ordering_ops_limited_to_orderable(#[case] op: Operator) {
        assert!(string_attr("x").op_compatibility(op).is_ok());
        assert!(
            Attribute::builder("n", AttributeType::Integer)
                .build()
                .op_compatibility(op)
                .is_ok()
        );
        assert!(
            Attribute::builder("t", AttributeType::DateTime)
                .build()
                .op_compatibility(op)
                .is_ok()
        );
        assert!(
            Attribute::builder("b", AttributeType::Boolean)
                .build()
                .op_compatibility(op)
                .is_err()
        );
    }

    #[test]
    fn test_to_single_valued_derives_element() {
        let mut attr = Attribute::clone(&emails_attr());
        attr.id = "urn:test:User:emails".to_string();
        let attr = Arc::new(attr);

        let elem = attr.to_single_valued();
        assert!(!elem.multi_valued);
        assert_eq!(elem.id, "urn:test:User:emails$elem");
        assert_eq!(elem.sub_attributes.len(), 3);
        // Only the @ElementAnnotations-declared tag moves onto the element.
        assert!(elem.has_annotation("@Marker"));
        assert!(!elem.has_annotation(ANNOTATION_AUTO_COMPACT));

        // Deterministic derivation.
        let again = attr.to_single_valued();
        assert_eq!(*elem, *again);
    }

    #[test]
    fn test_to_single_valued_identity_on_singular() {
        let attr = Arc::new(string_attr("userName"));
        let same = attr.to_single_valued();
        assert!(Arc::ptr_eq(&attr, &same));
    }

    #[test]
    fn test_has_exclusive_sub() {
        assert!(emails_attr().has_exclusive_sub());
        let plain = Attribute::builder("addresses", AttributeType::Complex)
            .multi_valued()
            .sub(string_attr("locality"))
            .build();
        assert!(!plain.has_exclusive_sub());
    }

    #[test]
    fn test_identity_subs_fall_back_to_all() {
        let attr = emails_attr();
        let ids = attr.identity_subs();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].name, "value");

        let plain = Attribute::builder("name", AttributeType::Complex)
            .sub(string_attr("familyName"))
            .sub(string_attr("givenName"))
            .build();
        assert_eq!(plain.identity_subs().len(), 2);
    }

    #[test]
    fn test_serde_round_trip_rfc7643_shape() {
        let json = serde_json::json!({
            "name": "emails",
            "type": "complex",
            "multiValued": true,
            "subAttributes": [
                {"name": "value", "type": "string"},
                {"name": "primary", "type": "boolean"}
            ]
        });
        let attr: Attribute = serde_json::from_value(json).unwrap();
        assert_eq!(attr.typ, AttributeType::Complex);
        assert!(attr.multi_valued);
        assert_eq!(attr.sub_attributes.len(), 2);
        assert_eq!(attr.mutability, Mutability::ReadWrite);

        let back = serde_json::to_value(&attr).unwrap();
        assert_eq!(back["multiValued"], serde_json::json!(true));
        assert_eq!(back["subAttributes"][1]["name"], serde_json::json!("primary"));
    }
}
