//! Filter Evaluation
//!
//! Interprets a compiled filter [`Expression`] against a property,
//! typically a complex property (a resource root or a multi-valued
//! element). Evaluation is pure: no side effects, no mutation.
//!
//! - a relational operator resolves its left-hand path from the property,
//!   rejects incompatible operators via the attribute compatibility
//!   matrix, and applies the comparator on raw values; a multi-valued
//!   non-complex target is satisfied when any element is
//! - logical operators short-circuit
//!
//! ## Examples
//!
//! ```text
//! evaluate(user, compile_filter("userName eq \"john\"")?)
//! evaluate(email_element, compile_filter("type eq \"work\"")?)
//! ```

use serde_json::Value;

use crate::error::{Result, ScimError};
use crate::expr::{Expression, Operator, unquote};
use crate::property::{Property, StringOp};

/// Evaluate a compiled filter against a property.
pub fn evaluate(property: &Property, filter: &Expression) -> Result<bool> {
    match filter.operator() {
        Some(Operator::Not) => {
            let inner = filter
                .left()
                .ok_or_else(|| ScimError::internal("'not' without operand"))?;
            Ok(!evaluate(property, inner)?)
        }
        Some(Operator::And) => {
            let (left, right) = binary_operands(filter)?;
            if !evaluate(property, left)? {
                return Ok(false);
            }
            evaluate(property, right)
        }
        Some(Operator::Or) => {
            let (left, right) = binary_operands(filter)?;
            if evaluate(property, left)? {
                return Ok(true);
            }
            evaluate(property, right)
        }
        Some(op) => {
            let path = filter
                .left()
                .ok_or_else(|| ScimError::internal(format!("'{}' without a path", op)))?;
            let value = match filter.right() {
                Some(literal) => Some(literal_value(literal)?),
                None => None,
            };

            let mut targets = Vec::new();
            resolve(property, Some(path), &mut targets)?;
            for target in targets {
                if satisfied(target, op, value.as_ref())? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        None => Err(ScimError::invalid_filter(format!(
            "'{}' is not a filter",
            filter.token()
        ))),
    }
}

fn binary_operands(filter: &Expression) -> Result<(&Expression, &Expression)> {
    match (filter.left(), filter.right()) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => Err(ScimError::internal(format!(
            "'{}' missing an operand",
            filter.token()
        ))),
    }
}

/// Collect the properties a step chain resolves to, fanning out over
/// multi-valued containers.
fn resolve<'a>(
    property: &'a Property,
    path: Option<&Expression>,
    out: &mut Vec<&'a Property>,
) -> Result<()> {
    let Some(step) = path else {
        out.push(property);
        return Ok(());
    };
    if step.is_operator() {
        return Err(ScimError::invalid_filter(
            "nested filters are not supported",
        ));
    }
    if property.is_complex() {
        match property.sub(step.token()) {
            Some(child) => resolve(child, step.next(), out),
            // An unmatched namespace step addresses the main schema.
            None if step.is_urn() => resolve(property, step.next(), out),
            None => Err(ScimError::invalid_filter(format!(
                "no attribute named '{}'",
                step.token()
            ))),
        }
    } else if property.is_multi_valued() {
        for elem in property.elements() {
            resolve(elem, Some(step), out)?;
        }
        Ok(())
    } else {
        Err(ScimError::invalid_filter(format!(
            "'{}' cannot be stepped into",
            property.attr().path
        )))
    }
}

fn satisfied(property: &Property, op: Operator, value: Option<&Value>) -> Result<bool> {
    property.attr().op_compatibility(op)?;
    let rhs = || {
        value.ok_or_else(|| ScimError::internal(format!("'{}' without a comparison value", op)))
    };
    match op {
        Operator::Pr => Ok(property.is_present()),
        Operator::Eq => property.eq_value(rhs()?),
        Operator::Ne => Ok(!property.eq_value(rhs()?)?),
        Operator::Sw => Ok(property.string_op(rhs()?, StringOp::StartsWith)),
        Operator::Ew => Ok(property.string_op(rhs()?, StringOp::EndsWith)),
        Operator::Co => Ok(property.string_op(rhs()?, StringOp::Contains)),
        Operator::Gt => Ok(matches!(
            property.cmp_value(rhs()?)?,
            Some(std::cmp::Ordering::Greater)
        )),
        Operator::Ge => Ok(matches!(
            property.cmp_value(rhs()?)?,
            Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        )),
        Operator::Lt => Ok(matches!(
            property.cmp_value(rhs()?)?,
            Some(std::cmp::Ordering::Less)
        )),
        Operator::Le => Ok(matches!(
            property.cmp_value(rhs()?)?,
            Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        )),
        Operator::And | Operator::Or | Operator::Not => {
            Err(ScimError::internal("logical operator in comparison position"))
        }
    }
}

/// Convert a literal token to the JSON value it denotes.
fn literal_value(literal: &Expression) -> Result<Value> {
    let token = literal.token();
    if token.starts_with('"') {
        return Ok(Value::String(unquote(token)?));
    }
    match token {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        "null" => Ok(Value::Null),
        _ => {
            if let Ok(n) = token.parse::<i64>() {
                return Ok(Value::Number(n.into()));
            }
            let f = token
                .parse::<f64>()
                .map_err(|_| ScimError::invalid_filter(format!("invalid literal '{}'", token)))?;
            serde_json::Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| ScimError::invalid_filter(format!("invalid literal '{}'", token)))
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
    use crate::expr::compile_filter;
    use crate::schema::{Attribute, AttributeType};

    fn user() -> Property {
        let attr = Arc::new(
            Attribute::builder("", AttributeType::Complex)
                .sub(Attribute::builder("userName", AttributeType::String).build())
                .sub(Attribute::builder("active", AttributeType::Boolean).build())
                .sub(Attribute::builder("age", AttributeType::Integer).build())
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
        p.sub_mut("userName")
            .unwrap()
            .set_scalar_value(&json!("john"))
            .unwrap();
        p.sub_mut("active")
            .unwrap()
            .set_scalar_value(&json!(true))
            .unwrap();
        p.sub_mut("age")
            .unwrap()
            .set_scalar_value(&json!(30))
            .unwrap();
        p.sub_mut("name")
            .unwrap()
            .sub_mut("familyName")
            .unwrap()
            .set_scalar_value(&json!("Doe"))
            .unwrap();
        for (value, typ) in [("j@work.io", "work"), ("j@home.io", "home")] {
            let emails = p.sub_mut("emails").unwrap();
            let i = emails.append_element().unwrap();
            let elem = emails.element_mut(i).unwrap();
            elem.sub_mut("value")
                .unwrap()
                .set_scalar_value(&json!(value))
                .unwrap();
            elem.sub_mut("type")
                .unwrap()
                .set_scalar_value(&json!(typ))
                .unwrap();
        }
        p
    }

    fn eval(filter: &str) -> bool {
        evaluate(&user(), &compile_filter(filter).unwrap()).unwrap()
    }

    #[test]
    fn test_simple_compare() {
        assert!(eval("userName eq \"john\""));
        assert!(eval("userName eq \"JOHN\""));
        assert!(!eval("userName eq \"jane\""));
        assert!(eval("active eq true"));
        assert!(eval("age gt 21"));
        assert!(!eval("age gt 30"));
        assert!(eval("age ge 30"));
    }

    #[test]
    fn test_nested_path() {
        assert!(eval("name.familyName co \"oe\""));
        assert!(eval("name.familyName sw \"D\""));
        assert!(!eval("name.familyName ew \"X\""));
    }

    #[test]
    fn test_presence() {
        assert!(eval("userName pr"));
        assert!(eval("emails pr"));
        // Complex is always present.
        assert!(eval("name pr"));
    }

    #[test]
    fn test_multi_valued_any_element() {
        assert!(eval("emails.type eq \"work\""));
        assert!(eval("emails.value ew \"home.io\""));
        assert!(!eval("emails.type eq \"other\""));
    }

    #[test]
    fn test_logical_short_circuit() {
        assert!(eval("userName eq \"john\" and active eq true"));
        assert!(!eval("userName eq \"jane\" and active eq true"));
        assert!(eval("userName eq \"jane\" or active eq true"));
        assert!(eval("not (userName eq \"jane\")"));
    }

    #[test]
    fn test_priority_shapes_result() {
        // and binds tighter: true or (false and false) == true
        assert!(eval("userName eq \"john\" or userName eq \"x\" and active eq false"));
    }

    #[test]
    fn test_unknown_attribute_is_an_error() {
        let f = compile_filter("nope eq \"x\"").unwrap();
        assert!(evaluate(&user(), &f).is_err());
    }

    #[test]
    fn test_incompatible_operator_rejected() {
        // sw on a boolean is rejected by the compatibility matrix.
        let f = compile_filter("active sw \"t\"").unwrap();
        assert!(evaluate(&user(), &f).is_err());
        // ne on a multi-valued attribute is rejected.
        let f = compile_filter("emails ne \"x\"").unwrap();
        assert!(evaluate(&user(), &f).is_err());
    }
}
