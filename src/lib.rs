//! # scim-engine
//!
//! The schema, data, and query core of a SCIM 2.0 (RFC 7643/7644)
//! resource engine: resources are self-describing, schema-driven property
//! trees; the path/filter mini-language compiles to a shared expression
//! representation; CRUD is path-addressed with filter-selected targeting;
//! JSON (de)serialization is schema-driven with SCIM return-ability rules.
//!
//! The engine owns no I/O, transport, or storage. HTTP endpoints,
//! persistence providers, and authorization compose on top through the
//! narrow contracts in [`provider`] and the registries in [`registry`].
//!
//! ## Layers
//!
//! - [`schema`]: attribute metadata, schemas, resource types, the schema
//!   registry, and the bundled RFC 7643 core schemas
//! - [`property`]: the typed property tree, mutation events, subscribers
//! - [`expr`]: the path/filter scanners and compilers
//! - [`eval`]: the filter evaluator
//! - [`crud`]: path-addressed Get/Add/Replace/Delete (on
//!   [`Property`](property::Property))
//! - [`traverse`]: the visitor and navigator traversal surfaces
//! - [`json`]: schema-driven deserialization, return-ability-aware
//!   serialization, attribute projection
//! - [`resource`]: resources, metadata stamping, the clock and id hooks
//! - [`messages`]: RFC 7644 protocol messages (PATCH, list, search)
//! - [`provider`]: the persistence collaborator contract
//! - [`error`]: the SCIM error taxonomy
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use scim_engine::json::DeserializeOptions;
//! use scim_engine::expr::compile_path;
//! use scim_engine::schema::{register_core_schemas, user_resource_type};
//! use scim_engine::resource::Resource;
//! use serde_json::json;
//!
//! register_core_schemas();
//! let mut user = Resource::from_json(
//!     Arc::new(user_resource_type()),
//!     r#"{"userName": "john", "emails": [{"value": "j@work.io", "primary": true}]}"#,
//!     DeserializeOptions::default(),
//! ).unwrap();
//!
//! // Path-addressed mutation; the exclusive-primary invariant holds.
//! let path = compile_path("emails").unwrap();
//! user.root_mut()
//!     .add(Some(&path), &json!({"value": "j@home.io", "primary": true}))
//!     .unwrap();
//!
//! let primary = compile_path("emails[primary eq true].value").unwrap();
//! assert_eq!(user.root().get(Some(&primary)).unwrap(), json!(["j@home.io"]));
//! ```
//!
//! ## Concurrency
//!
//! The engine is single-threaded cooperative: one logical owner mutates a
//! property tree at a time, and nothing here suspends or blocks. The
//! process-wide registries are initialized at startup and guarded by
//! reader-writer locks for the rare late registration.

pub mod crud;
pub mod error;
pub mod eval;
pub mod expr;
pub mod json;
pub mod messages;
pub mod property;
pub mod provider;
pub mod registry;
pub mod resource;
pub mod schema;
pub mod traverse;

pub use crud::ReplaceMode;
pub use error::{ErrorResponse, Result, ScimError, ScimErrorKind};
pub use eval::evaluate;
pub use expr::{Expression, Operator, compile_filter, compile_path};
pub use json::{DeserializeOptions, Projection};
pub use property::{Event, EventKind, Property, Subscriber};
pub use registry::{register_subscriber, register_urn};
pub use resource::{Clock, IdGenerator, Resource, SystemClock, UuidGenerator};
pub use schema::{Attribute, AttributeType, ResourceType, Schema, register_schema};
pub use traverse::{FluentNavigator, Navigator, Visitor};
