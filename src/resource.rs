//! Resources
//!
//! A [`Resource`] owns the root complex property synthesized from its
//! [`ResourceType`]'s derived attribute list, and exposes the standard
//! SCIM metadata (`id`, `meta.version`, `meta.location`) for the service
//! layer.
//!
//! Time is injected through the [`Clock`] trait and ids through
//! [`IdGenerator`], so `meta` stamping and version computation are
//! deterministic under test.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::Result;
use crate::json::{DeserializeOptions, Projection, deserialize_str, serialize_property};
use crate::property::{Event, Property};
use crate::schema::ResourceType;
use crate::traverse::{Navigator, Visitor, visit};

/// Injectable time source.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant, for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Injectable resource id source.
pub trait IdGenerator {
    fn generate(&self) -> String;
}

/// Random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// A concrete instance of a resource type.
pub struct Resource {
    resource_type: Arc<ResourceType>,
    root: Property,
}

impl Resource {
    /// Create an empty resource of the given type.
    ///
    /// # Errors
    ///
    /// `notFound` when the type references unregistered schemas.
    pub fn new(resource_type: Arc<ResourceType>) -> Result<Self> {
        let root_attr = resource_type.derive_root_attribute()?;
        Ok(Self {
            resource_type,
            root: Property::new(root_attr),
        })
    }

    /// Create a resource from a JSON document.
    pub fn from_json(
        resource_type: Arc<ResourceType>,
        json: &str,
        options: DeserializeOptions,
    ) -> Result<Self> {
        let mut resource = Self::new(resource_type)?;
        deserialize_str(&mut resource.root, json, options)?;
        Ok(resource)
    }

    pub fn resource_type(&self) -> &Arc<ResourceType> {
        &self.resource_type
    }

    /// The root complex property.
    pub fn root(&self) -> &Property {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Property {
        &mut self.root
    }

    /// A navigator focused at the root.
    pub fn navigator(&mut self) -> Navigator<'_> {
        Navigator::new(&mut self.root)
    }

    /// Walk the resource with a visitor.
    pub fn visit(&self, visitor: &mut dyn Visitor) -> Result<()> {
        visit(&self.root, visitor)
    }

    /// Serialize under return-ability rules and the given projection.
    pub fn serialize(&self, projection: Option<&Projection>) -> Result<Value> {
        serialize_property(&self.root, projection)
    }

    pub fn id(&self) -> Option<String> {
        self.scalar_at("id")
    }

    pub fn meta_version(&self) -> Option<String> {
        self.root
            .sub("meta")
            .and_then(|meta| meta.sub("version"))
            .and_then(|v| v.raw().as_str().map(str::to_string))
    }

    pub fn meta_location(&self) -> Option<String> {
        self.root
            .sub("meta")
            .and_then(|meta| meta.sub("location"))
            .and_then(|v| v.raw().as_str().map(str::to_string))
    }

    fn scalar_at(&self, name: &str) -> Option<String> {
        self.root
            .sub(name)
            .and_then(|p| p.raw().as_str().map(str::to_string))
    }

    /// Assign a fresh id and the full `meta` block for a newly created
    /// resource, and align `schemas` with the assigned extensions.
    pub fn stamp_created(
        &mut self,
        clock: &dyn Clock,
        ids: &dyn IdGenerator,
    ) -> Result<Vec<Event>> {
        let id = ids.generate();
        let now = format_instant(clock.now());
        let location = format!("{}/{}", self.resource_type.endpoint, id);
        let version = weak_etag(&id, &now);

        let mut events = Vec::new();
        events.append(&mut self.root.replace(
            Some(&crate::expr::compile_path("id")?),
            &json!(id),
        )?);
        events.append(&mut self.root.replace(
            Some(&crate::expr::compile_path("meta")?),
            &json!({
                "resourceType": self.resource_type.name,
                "created": now,
                "lastModified": now,
                "location": location,
                "version": version,
            }),
        )?);
        events.append(&mut self.sync_schemas()?);
        Ok(events)
    }

    /// Refresh `meta.lastModified` and `meta.version` after a mutation.
    pub fn stamp_modified(&mut self, clock: &dyn Clock) -> Result<Vec<Event>> {
        let id = self.id().unwrap_or_default();
        let now = format_instant(clock.now());
        let version = weak_etag(&id, &now);

        let mut events = Vec::new();
        events.append(&mut self.root.replace(
            Some(&crate::expr::compile_path("meta.lastModified")?),
            &json!(now),
        )?);
        events.append(&mut self.root.replace(
            Some(&crate::expr::compile_path("meta.version")?),
            &json!(version),
        )?);
        events.append(&mut self.sync_schemas()?);
        Ok(events)
    }

    /// Set `schemas` to the main schema URN plus every extension that
    /// currently holds data.
    fn sync_schemas(&mut self) -> Result<Vec<Event>> {
        let mut urns = vec![self.resource_type.schema.clone()];
        for ext in &self.resource_type.schema_extensions {
            if self
                .root
                .sub(&ext.schema)
                .is_some_and(|c| !c.is_unassigned())
            {
                urns.push(ext.schema.clone());
            }
        }
        self.root
            .replace(Some(&crate::expr::compile_path("schemas")?), &json!(urns))
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("type", &self.resource_type.id)
            .field("id", &self.id())
            .finish()
    }
}

fn format_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Weak ETag over the id and modification instant.
fn weak_etag(id: &str, last_modified: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    hasher.update(last_modified.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(16);
    for byte in &digest[..8] {
        hex.push_str(&format!("{:02x}", byte));
    }
    format!("W/\"{}\"", hex)
}

// =============================================================================
// Tests
// =============================================================================
