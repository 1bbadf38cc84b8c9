//! Cache keys for region-scoped data
//!
//! A key identifies an entity, a collection owned by an entity, or an entity
//! looked up by natural id, optionally scoped to a tenant.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Longest accepted name, id or natural id component
pub const MAX_KEY_PART_LEN: usize = 256;

// == Key Kind ==
/// The shape of key a region stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyKind {
    Entity,
    Collection,
    NaturalId,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeyKind::Entity => "entity",
            KeyKind::Collection => "collection",
            KeyKind::NaturalId => "natural-id",
        })
    }
}

// == Cache Key ==
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CacheKey {
    Entity {
        entity_name: String,
        id: String,
        tenant_id: Option<String>,
    },
    Collection {
        role: String,
        owner_id: String,
        tenant_id: Option<String>,
    },
    NaturalId {
        entity_name: String,
        values: Vec<String>,
        tenant_id: Option<String>,
    },
}

impl CacheKey {
    /// Key for one entity instance.
    pub fn entity(entity_name: impl Into<String>, id: impl Into<String>) -> Result<Self> {
        let entity_name = validated("entity name", entity_name.into())?;
        let id = validated("id", id.into())?;
        Ok(CacheKey::Entity {
            entity_name,
            id,
            tenant_id: None,
        })
    }

    /// Key for a collection, where `role` names the owning property
    /// (e.g. `Order.lines`).
    pub fn collection(role: impl Into<String>, owner_id: impl Into<String>) -> Result<Self> {
        let role = validated("collection role", role.into())?;
        let owner_id = validated("owner id", owner_id.into())?;
        Ok(CacheKey::Collection {
            role,
            owner_id,
            tenant_id: None,
        })
    }

    /// Key for an entity resolved through its natural id components.
    pub fn natural_id<I, S>(entity_name: impl Into<String>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entity_name = validated("entity name", entity_name.into())?;
        let values = values
            .into_iter()
            .map(|value| validated("natural id value", value.into()))
            .collect::<Result<Vec<_>>>()?;
        if values.is_empty() {
            return Err(CacheError::InvalidKey(
                "natural id needs at least one value".to_string(),
            ));
        }
        Ok(CacheKey::NaturalId {
            entity_name,
            values,
            tenant_id: None,
        })
    }

    /// Scopes the key to a tenant.
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Result<Self> {
        let tenant = validated("tenant id", tenant.into())?;
        match &mut self {
            CacheKey::Entity { tenant_id, .. }
            | CacheKey::Collection { tenant_id, .. }
            | CacheKey::NaturalId { tenant_id, .. } => *tenant_id = Some(tenant),
        }
        Ok(self)
    }

    pub fn kind(&self) -> KeyKind {
        match self {
            CacheKey::Entity { .. } => KeyKind::Entity,
            CacheKey::Collection { .. } => KeyKind::Collection,
            CacheKey::NaturalId { .. } => KeyKind::NaturalId,
        }
    }

    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            CacheKey::Entity { tenant_id, .. }
            | CacheKey::Collection { tenant_id, .. }
            | CacheKey::NaturalId { tenant_id, .. } => tenant_id.as_deref(),
        }
    }
}

fn validated(what: &str, value: String) -> Result<String> {
    if value.is_empty() {
        return Err(CacheError::InvalidKey(format!("{what} cannot be empty")));
    }
    if value.len() > MAX_KEY_PART_LEN {
        return Err(CacheError::InvalidKey(format!(
            "{what} exceeds maximum length of {MAX_KEY_PART_LEN} characters"
        )));
    }
    Ok(value)
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Entity {
                entity_name, id, ..
            } => write!(f, "{entity_name}#{id}")?,
            CacheKey::Collection { role, owner_id, .. } => write!(f, "{role}#{owner_id}")?,
            CacheKey::NaturalId {
                entity_name,
                values,
                ..
            } => write!(f, "{entity_name}##{}", values.join(","))?,
        }
        if let Some(tenant) = self.tenant_id() {
            write!(f, "[tenant={tenant}]")?;
        }
        Ok(())
    }
}
