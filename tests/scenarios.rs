//! End-to-end scenarios over the bundled User schema: literal flows from
//! identity-provider traffic (primary demotion, filter-selected patching,
//! URN paths) plus the serialization round-trip.

use std::sync::Arc;

use serde_json::{Value, json};

use scim_engine::error::ScimErrorKind;
use scim_engine::expr::{ExprKind, compile_filter, compile_path};
use scim_engine::json::{DeserializeOptions, Projection};
use scim_engine::resource::Resource;
use scim_engine::schema::{SCHEMA_USER, register_core_schemas, user_resource_type};
use scim_engine::{evaluate, register_urn};

fn user_with_emails() -> Resource {
    register_core_schemas();
    Resource::from_json(
        Arc::new(user_resource_type()),
        r#"{
            "userName": "john",
            "emails": [
                {"value": "a", "primary": true},
                {"value": "b"}
            ]
        }"#,
        DeserializeOptions::default(),
    )
    .unwrap()
}

fn get(resource: &Resource, path: &str) -> Value {
    resource
        .root()
        .get(Some(&compile_path(path).unwrap()))
        .unwrap()
}

#[test]
fn s1_primary_demotion_on_add() {
    let mut user = user_with_emails();
    user.root_mut()
        .add(
            Some(&compile_path("emails").unwrap()),
            &json!({"value": "c", "primary": true}),
        )
        .unwrap();

    let emails = get(&user, "emails");
    let emails = emails.as_array().unwrap();
    assert_eq!(emails.len(), 3);
    let primaries: Vec<&str> = emails
        .iter()
        .filter(|e| e["primary"] == json!(true))
        .map(|e| e["value"].as_str().unwrap())
        .collect();
    assert_eq!(primaries, vec!["c"]);
}

#[test]
fn s2_filter_replace_with_primary_swap() {
    let mut user = user_with_emails();
    user.root_mut()
        .replace(
            Some(&compile_path("emails[primary ne true].primary").unwrap()),
            &json!(true),
        )
        .unwrap();

    let emails = get(&user, "emails");
    let primary_of = |value: &str| {
        emails
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e["value"] == json!(value))
            .map(|e| e["primary"] == json!(true))
            .unwrap()
    };
    assert!(!primary_of("a"));
    assert!(primary_of("b"));
}

#[test]
fn s3_path_with_urn() {
    register_urn(SCHEMA_USER);
    let path = compile_path(&format!("{}:emails.primary", SCHEMA_USER)).unwrap();

    let mut steps = Vec::new();
    let mut cur = Some(&path);
    while let Some(e) = cur {
        steps.push(e.token().to_string());
        cur = e.next();
    }
    assert_eq!(steps, vec![SCHEMA_USER, "emails", "primary"]);
}

#[test]
fn s4_filter_compile_priority() {
    let ast = compile_filter("a eq 1 or b eq 2 and c eq 3").unwrap();
    assert_eq!(ast.token(), "or");
    assert_eq!(ast.kind(), ExprKind::LogicalOp);

    let left = ast.left().unwrap();
    assert_eq!(left.token(), "eq");
    assert_eq!(left.left().unwrap().token(), "a");
    assert_eq!(left.right().unwrap().token(), "1");

    let right = ast.right().unwrap();
    assert_eq!(right.token(), "and");
    assert_eq!(right.left().unwrap().token(), "eq");
    assert_eq!(right.left().unwrap().left().unwrap().token(), "b");
    assert_eq!(right.right().unwrap().left().unwrap().token(), "c");
}

#[test]
fn s5_case_insensitive_string_eq() {
    // userName in the core schema is not caseExact.
    let user = user_with_emails();
    assert!(evaluate(user.root(), &compile_filter("userName eq \"JOHN\"").unwrap()).unwrap());

    // meta.version is caseExact; exercise through a caseExact attribute.
    register_core_schemas();
    let exact = Resource::from_json(
        Arc::new(user_resource_type()),
        r#"{"userName": "john", "externalId": "Foo"}"#,
        DeserializeOptions::default(),
    )
    .unwrap();
    assert!(
        !evaluate(
            exact.root(),
            &compile_filter("externalId eq \"foo\"").unwrap()
        )
        .unwrap()
    );
    assert!(
        evaluate(
            exact.root(),
            &compile_filter("externalId eq \"Foo\"").unwrap()
        )
        .unwrap()
    );
}

#[test]
fn s6_datetime_ordering() {
    register_core_schemas();
    let user = Resource::from_json(
        Arc::new(user_resource_type()),
        r#"{"userName": "john", "meta": {"lastModified": "2020-01-01T00:00:00"}}"#,
        DeserializeOptions::default(),
    )
    .unwrap();

    assert!(
        evaluate(
            user.root(),
            &compile_filter("meta.lastModified gt \"2019-10-10T10:10:10\"").unwrap()
        )
        .unwrap()
    );
    assert!(
        !evaluate(
            user.root(),
            &compile_filter("meta.lastModified gt \"2020-01-01T00:00:00\"").unwrap()
        )
        .unwrap()
    );
}

#[test]
fn round_trip_serialize_deserialize() {
    register_core_schemas();
    let original = Resource::from_json(
        Arc::new(user_resource_type()),
        r#"{
            "userName": "john",
            "displayName": "John Doe",
            "active": true,
            "password": "hunter2",
            "name": {"familyName": "Doe", "givenName": "John"},
            "emails": [
                {"value": "j@work.io", "type": "work", "primary": true},
                {"value": "j@home.io", "type": "home"}
            ],
            "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User": {
                "employeeNumber": "701984",
                "manager": {"value": "26118915"}
            }
        }"#,
        DeserializeOptions::default(),
    )
    .unwrap();

    let serialized = original.serialize(None).unwrap();
    // writeOnly/never attributes are filtered on output.
    assert!(serialized.get("password").is_none());

    let reparsed = Resource::from_json(
        Arc::new(user_resource_type()),
        &serde_json::to_string(&serialized).unwrap(),
        DeserializeOptions::default(),
    )
    .unwrap();

    // Round trip is lossless modulo the filtered password.
    let mut expected = original.serialize(None).unwrap();
    expected.as_object_mut().unwrap().remove("password");
    assert_eq!(reparsed.serialize(None).unwrap(), expected);
    assert_eq!(
        reparsed.root().get(Some(&compile_path("emails[primary eq true].value").unwrap())).unwrap(),
        json!(["j@work.io"])
    );
}

#[test]
fn exclusive_primary_invariant_under_operation_sequences() {
    let mut user = user_with_emails();
    let emails_path = compile_path("emails").unwrap();

    let operations: Vec<Box<dyn Fn(&mut Resource)>> = vec![
        Box::new(|u: &mut Resource| {
            u.root_mut()
                .add(
                    Some(&compile_path("emails").unwrap()),
                    &json!({"value": "x", "primary": true}),
                )
                .unwrap();
        }),
        Box::new(|u: &mut Resource| {
            u.root_mut()
                .replace(
                    Some(&compile_path("emails[value eq \"b\"].primary").unwrap()),
                    &json!(true),
                )
                .unwrap();
        }),
        Box::new(|u: &mut Resource| {
            u.root_mut()
                .delete(Some(&compile_path("emails[value eq \"x\"]").unwrap()))
                .unwrap();
        }),
        Box::new(|u: &mut Resource| {
            u.root_mut()
                .add(
                    Some(&compile_path("emails").unwrap()),
                    &json!({"value": "y", "primary": true}),
                )
                .unwrap();
        }),
    ];

    for op in &operations {
        op(&mut user);
        let primaries = user
            .root()
            .get(Some(&compile_path("emails[primary eq true]").unwrap()))
            .unwrap();
        assert!(
            primaries.as_array().unwrap().len() <= 1,
            "more than one primary after an operation: {}",
            user.root().get(Some(&emails_path)).unwrap()
        );
    }
}

#[test]
fn auto_compact_leaves_no_unassigned_elements() {
    let mut user = user_with_emails();
    // Deleting the only assigned sub-attributes of element "b" empties it;
    // the container must not keep the husk.
    user.root_mut()
        .delete(Some(&compile_path("emails[value eq \"b\"].value").unwrap()))
        .unwrap();

    let emails = user.root().sub("emails").unwrap();
    assert!(emails.elements().iter().all(|e| !e.is_unassigned()));
    assert_eq!(emails.elements().len(), 1);
}

#[test]
fn unassigned_delete_is_idempotent() {
    let mut user = user_with_emails();
    let path = compile_path("displayName").unwrap();
    user.root_mut().delete(Some(&path)).unwrap();
    user.root_mut().delete(Some(&path)).unwrap();
    assert_eq!(user.root().get(Some(&path)).unwrap(), Value::Null);
}

#[test]
fn projection_round_trips_through_search_shapes() {
    register_core_schemas();
    let user = Resource::from_json(
        Arc::new(user_resource_type()),
        r#"{"userName": "john", "displayName": "John", "title": "Dr"}"#,
        DeserializeOptions::default(),
    )
    .unwrap();

    let included = user
        .serialize(Some(&Projection::include(["userName"])))
        .unwrap();
    assert_eq!(included["userName"], json!("john"));
    assert!(included.get("displayName").is_none());

    let excluded = user
        .serialize(Some(&Projection::exclude(["title"])))
        .unwrap();
    assert_eq!(excluded["displayName"], json!("John"));
    assert!(excluded.get("title").is_none());
}

#[test]
fn unknown_top_level_key_rejected() {
    register_core_schemas();
    let err = Resource::from_json(
        Arc::new(user_resource_type()),
        r#"{"userName": "john", "favoriteColor": "red"}"#,
        DeserializeOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ScimErrorKind::InvalidSyntax);
    assert!(err.detail().contains("favoriteColor"));
}

#[test]
fn compiler_round_trip_print_then_recompile() {
    register_urn(SCHEMA_USER);
    for input in [
        "userName",
        "name.familyName",
        "emails[type eq \"work\"].value",
        &format!("{}:emails.primary", SCHEMA_USER),
    ] {
        let compiled = compile_path(input).unwrap();
        let printed = compiled.to_string();
        assert_eq!(compile_path(&printed).unwrap(), compiled, "path '{}'", input);
    }
    for input in [
        "userName eq \"john\"",
        "a eq 1 or b eq 2 and c eq 3",
        "not (active eq false) and emails pr",
    ] {
        let compiled = compile_filter(input).unwrap();
        let printed = compiled.to_string();
        assert_eq!(
            compile_filter(&printed).unwrap(),
            compiled,
            "filter '{}'",
            input
        );
    }
}
