//! # Identity Newtypes
//!
//! Newtype wrappers for the identifiers in the workspace. These prevent
//! accidental identifier confusion: you cannot pass a `ScalarId` where an
//! `EntityId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deterministic entity ids derived from names.
const ENTITY_NAMESPACE: Uuid = Uuid::from_u128(0x6a1d_51c3_9f0e_4b7a_8d2c_3e5f_7a9b_1c0d);

/// Unique identifier for a data subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

/// Unique identifier for a scalar, leaf or derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScalarId(pub Uuid);

impl EntityId {
    /// Generate a new random entity identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalarId {
    /// Generate a new random scalar identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse an identifier from its hyphenated or simple UUID form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for ScalarId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

impl std::fmt::Display for ScalarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scalar:{}", self.0)
    }
}

/// A data subject whose contribution's influence must be bounded.
///
/// Equality and hashing use the id only. Anonymous entities get a random
/// id; named entities derive theirs from the name, so two `Entity::named("e")`
/// values compare equal even when created independently (e.g. one decoded
/// from a wire record).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl Entity {
    /// A fresh anonymous entity.
    pub fn new() -> Self {
        Self {
            id: EntityId::new(),
            name: None,
        }
    }

    /// An entity identified by name.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: EntityId(Uuid::new_v5(&ENTITY_NAMESPACE, name.as_bytes())),
            name: Some(name),
        }
    }

    /// The identifier used for equality and hashing.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The display name, if the entity was created with one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Entity {}

impl std::hash::Hash for Entity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Entity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "{}", self.id),
        }
    }
}
