//! # Wire Form
//!
//! [`ScalarWire`] is the flat serialized record: every optional field has a
//! `has_*` flag and a sentinel (`0.0` or `""`) when absent. It decodes to
//! [`ScalarRecord`], where absence is an `Option`, so an absent name comes
//! back as `None` and never as `""`.
//!
//! Only leaves carry stored bounds. A derived scalar encodes its id alone.
//! The entity travels by name; an anonymous entity decodes as a fresh one.
//! Records decode as phi leaves, so a gamma leaf is refused at encoding.

use serde::{Deserialize, Serialize};

use adp_core::{AdpError, Entity, ScalarId};

use crate::scalar::{PhiScalar, Scalar};

/// Presence-flagged wire record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarWire {
    pub id: ScalarId,
    pub has_name: bool,
    pub name: String,
    pub has_value: bool,
    pub value: f64,
    pub has_min_val: bool,
    pub min_val: f64,
    pub has_max_val: bool,
    pub max_val: f64,
    pub has_entity_name: bool,
    pub entity_name: String,
}

/// Decoded record with optional fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScalarRecord {
    pub id: ScalarId,
    pub name: Option<String>,
    pub value: Option<f64>,
    pub min_val: Option<f64>,
    pub max_val: Option<f64>,
    pub entity_name: Option<String>,
}

impl ScalarRecord {
    /// Capture what a scalar stores. Derived scalars keep only their id;
    /// gamma leaves are rejected.
    pub fn from_scalar(scalar: &Scalar) -> Result<Self, AdpError> {
        if matches!(scalar, Scalar::Gamma(_)) {
            tracing::warn!(id = %scalar.id(), "refusing to encode gamma leaf");
            return Err(AdpError::UnencodableScalar(scalar.type_name()));
        }
        Ok(match scalar.leaf() {
            Some(leaf) => Self {
                id: leaf.id(),
                name: leaf.name().map(str::to_owned),
                value: Some(leaf.value()),
                min_val: Some(leaf.min_val()),
                max_val: Some(leaf.max_val()),
                entity_name: leaf.entity().name().map(str::to_owned),
            },
            None => Self {
                id: scalar.id(),
                ..Self::default()
            },
        })
    }

    /// Rebuild and register a [`PhiScalar`]. Fails when a bound is missing,
    /// or while a leaf with the same id is still alive.
    pub fn into_phi(self) -> Result<Scalar, AdpError> {
        let value = self.value.ok_or(AdpError::IncompleteRecord("value"))?;
        let min_val = self.min_val.ok_or(AdpError::IncompleteRecord("min_val"))?;
        let max_val = self.max_val.ok_or(AdpError::IncompleteRecord("max_val"))?;
        let entity = self.entity_name.map(Entity::named);
        PhiScalar::from_parts(self.id, self.name, min_val, value, max_val, entity).map(Scalar::from)
    }
}

impl From<&ScalarRecord> for ScalarWire {
    fn from(r: &ScalarRecord) -> Self {
        Self {
            id: r.id,
            has_name: r.name.is_some(),
            name: r.name.clone().unwrap_or_default(),
            has_value: r.value.is_some(),
            value: r.value.unwrap_or(0.0),
            has_min_val: r.min_val.is_some(),
            min_val: r.min_val.unwrap_or(0.0),
            has_max_val: r.max_val.is_some(),
            max_val: r.max_val.unwrap_or(0.0),
            has_entity_name: r.entity_name.is_some(),
            entity_name: r.entity_name.clone().unwrap_or_default(),
        }
    }
}

impl From<ScalarWire> for ScalarRecord {
    fn from(w: ScalarWire) -> Self {
        Self {
            id: w.id,
            name: w.has_name.then_some(w.name),
            value: w.has_value.then_some(w.value),
            min_val: w.has_min_val.then_some(w.min_val),
            max_val: w.has_max_val.then_some(w.max_val),
            entity_name: w.has_entity_name.then_some(w.entity_name),
        }
    }
}

impl ScalarWire {
    pub fn from_scalar(scalar: &Scalar) -> Result<Self, AdpError> {
        Ok(Self::from(&ScalarRecord::from_scalar(scalar)?))
    }

    pub fn to_json(&self) -> Result<String, AdpError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, AdpError> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_encodes_flags_and_sentinels() {
        let x = Scalar::phi(0.0, 1.0, 2.0, Some(Entity::named("wire-e"))).unwrap();
        let wire = ScalarWire::from_scalar(&x).unwrap();
        assert!(!wire.has_name);
        assert_eq!(wire.name, "");
        assert!(wire.has_value && wire.has_min_val && wire.has_max_val);
        assert_eq!((wire.min_val, wire.value, wire.max_val), (0.0, 1.0, 2.0));
        assert!(wire.has_entity_name);
        assert_eq!(wire.entity_name, "wire-e");
    }

    #[test]
    fn absent_name_decodes_as_none() {
        let wire = ScalarWire {
            id: ScalarId::new(),
            has_name: false,
            name: String::new(),
            has_value: true,
            value: 1.0,
            has_min_val: true,
            min_val: 0.0,
            has_max_val: true,
            max_val: 2.0,
            has_entity_name: false,
            entity_name: String::new(),
        };
        let record = ScalarRecord::from(wire);
        assert_eq!(record.name, None);
        assert_eq!(record.entity_name, None);

        let present = ScalarWire {
            has_name: true,
            ..ScalarWire::from(&record)
        };
        assert_eq!(ScalarRecord::from(present).name.as_deref(), Some(""));
    }

    #[test]
    fn derived_scalar_carries_only_id() {
        let x = Scalar::phi(0.0, 1.0, 2.0, None).unwrap();
        let y = &x * 3.0;
        let record = ScalarRecord::from_scalar(&y).unwrap();
        assert_eq!(record.id, y.id());
        assert_eq!(record.value, None);
        assert!(matches!(record.into_phi(), Err(AdpError::IncompleteRecord("value"))));
    }

    #[test]
    fn json_roundtrip_rebuilds_leaf_after_drop() {
        let json = {
            let x = PhiScalar::with_name("age", 0.0, 1.0, 2.0, Some(Entity::named("wire-rt"))).unwrap();
            ScalarWire::from_scalar(&Scalar::from(x)).unwrap().to_json().unwrap()
        };
        let wire = ScalarWire::from_json(&json).unwrap();
        let rebuilt = ScalarRecord::from(wire).into_phi().unwrap();
        assert_eq!(rebuilt.name(), Some("age"));
        assert_eq!(rebuilt.entity(), Some(&Entity::named("wire-rt")));
        assert_eq!(rebuilt.bounds().unwrap().max_val, 2.0);
    }

    #[test]
    fn live_duplicate_is_rejected() {
        let x = Scalar::phi(0.0, 1.0, 2.0, None).unwrap();
        let record = ScalarRecord::from_scalar(&x).unwrap();
        assert!(matches!(record.into_phi(), Err(AdpError::Registry(_))));
    }

    #[test]
    fn gamma_leaf_is_not_encodable() {
        let g = Scalar::gamma_leaf(0.0, 1.0, 2.0, Some(Entity::named("wire-gamma"))).unwrap();
        assert!(matches!(
            ScalarRecord::from_scalar(&g),
            Err(AdpError::UnencodableScalar("GammaScalar"))
        ));
        assert!(ScalarWire::from_scalar(&g).is_err());

        // A phi leaf's promoted form is refused too; the phi leaf itself encodes.
        let x = Scalar::phi(0.0, 1.0, 2.0, None).unwrap();
        assert!(ScalarRecord::from_scalar(&x.gamma().unwrap()).is_err());
        assert!(ScalarRecord::from_scalar(&x).is_ok());
    }
}
