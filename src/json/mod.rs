//! JSON Codec
//!
//! Schema-driven deserialization and return-ability-aware serialization.
//! Both halves operate on the property tree: the deserializer assigns
//! through the same event-raising primitives as CRUD, the serializer walks
//! with the visitor and projects per the SCIM return-ability rules.

mod de;
mod ser;

pub use de::{DeserializeOptions, deserialize_str, deserialize_value};
pub use ser::{Projection, serialize_property, to_json_string};
