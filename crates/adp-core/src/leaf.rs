//! # Leaf Records
//!
//! A leaf is a value constructed directly from raw data (or at the point
//! where data from several entities was irreversibly combined). Its bound
//! box and entity never change after construction.

use serde::{Deserialize, Serialize};

use crate::error::BoundsError;
use crate::expr::{Expr, Symbol};
use crate::identity::{Entity, ScalarId};

/// Where a leaf's data originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// Data loaded for exactly one entity.
    Phi,
    /// A combination point: data from several entities already fused.
    Gamma,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Phi => "phi",
            Origin::Gamma => "gamma",
        }
    }
}

/// The immutable bound-box record of a leaf scalar.
#[derive(Debug, Clone)]
pub struct Leaf {
    id: ScalarId,
    ssid: Symbol,
    origin: Origin,
    entity: Entity,
    name: Option<String>,
    min_val: f64,
    value: f64,
    max_val: f64,
}

impl Leaf {
    /// Build a leaf record, minting its symbol from the id (and, for gamma
    /// leaves, the entity id).
    pub fn new(
        id: ScalarId,
        origin: Origin,
        entity: Entity,
        name: Option<String>,
        min_val: f64,
        value: f64,
        max_val: f64,
    ) -> Result<Self, BoundsError> {
        check_bounds(min_val, value, max_val)?;
        let ssid = mint_ssid(origin, &id, &entity);
        Ok(Self {
            id,
            ssid,
            origin,
            entity,
            name,
            min_val,
            value,
            max_val,
        })
    }

    /// The id of the scalar that owns this leaf.
    pub fn id(&self) -> ScalarId {
        self.id
    }

    /// The symbol this leaf is registered under.
    pub fn ssid(&self) -> &Symbol {
        &self.ssid
    }

    /// Whether the leaf holds single-entity or combined data.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// The entity the leaf's data belongs to.
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// Optional human-readable label.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Lower end of the bound box.
    pub fn min_val(&self) -> f64 {
        self.min_val
    }

    /// The recorded value, inside `[min_val, max_val]`.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Upper end of the bound box.
    pub fn max_val(&self) -> f64 {
        self.max_val
    }

    /// The one-symbol expression standing for this leaf.
    pub fn expr(&self) -> Expr {
        Expr::Sym(self.ssid.clone())
    }
}

/// Validate a `(min_val, value, max_val)` triple.
pub fn check_bounds(min_val: f64, value: f64, max_val: f64) -> Result<(), BoundsError> {
    if !(min_val.is_finite() && value.is_finite() && max_val.is_finite()) {
        return Err(BoundsError::NonFinite {
            min_val,
            value,
            max_val,
        });
    }
    if !(min_val <= value && value <= max_val) {
        return Err(BoundsError::OutOfRange {
            min_val,
            value,
            max_val,
        });
    }
    Ok(())
}

fn mint_ssid(origin: Origin, id: &ScalarId, entity: &Entity) -> Symbol {
    let id = id.as_uuid().simple();
    match origin {
        Origin::Phi => Symbol::new(format!("phi_{id}")),
        Origin::Gamma => Symbol::new(format!(
            "gamma_{id}_{}",
            entity.id().as_uuid().simple()
        )),
    }
}
