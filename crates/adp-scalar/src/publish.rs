//! # Publishing
//!
//! A release hands the accountant, per scalar, its true value and the
//! Lipschitz bound of that value with respect to each contributing entity.
//! The accountant decides the noise and debits each entity's budget; this
//! crate only computes sensitivities.

use serde::{Deserialize, Serialize};

use adp_core::{AdpError, Entity, ScalarId, SearchConfig};

use crate::scalar::Scalar;

/// Noise multiplier used when the caller does not pick one.
pub const DEFAULT_SIGMA: f64 = 1.5;

/// Sensitivity of a released value to one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySensitivity {
    pub entity: Entity,
    pub lipschitz: f64,
}

/// Everything the accountant needs to noise one scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub scalar_id: ScalarId,
    pub value: f64,
    pub min_val: f64,
    pub max_val: f64,
    pub sensitivities: Vec<EntitySensitivity>,
}

impl Release {
    /// Compute bounds and per-entity sensitivities of `scalar`.
    pub fn of(scalar: &Scalar, config: &SearchConfig) -> Result<Self, AdpError> {
        let bounds = scalar.bounds_with(config)?;
        let gamma = scalar.gamma_with(config)?;
        let sensitivities = gamma
            .input_entities()?
            .into_iter()
            .map(|entity| {
                let lipschitz = gamma.max_lipschitz_via_jacobian(Some(&entity), config)?.value;
                Ok(EntitySensitivity { entity, lipschitz })
            })
            .collect::<Result<Vec<_>, AdpError>>()?;
        Ok(Self {
            scalar_id: scalar.id(),
            value: bounds.value,
            min_val: bounds.min_val,
            max_val: bounds.max_val,
            sensitivities,
        })
    }

    /// The largest per-entity sensitivity, `0.0` when nobody contributed.
    pub fn max_sensitivity(&self) -> f64 {
        self.sensitivities
            .iter()
            .map(|s| s.lipschitz)
            .fold(0.0, f64::max)
    }
}

/// Privacy accountant seam: turns releases into noised values and records
/// the spend.
pub trait Accountant {
    fn publish(&mut self, releases: &[Release], sigma: f64) -> Result<Vec<f64>, AdpError>;
}

/// Publish several scalars in one accountant call.
pub fn publish(scalars: &[Scalar], acc: &mut dyn Accountant, sigma: f64) -> Result<Vec<f64>, AdpError> {
    publish_with(scalars, acc, sigma, &SearchConfig::default())
}

/// [`publish`] with an explicit search configuration.
pub fn publish_with(
    scalars: &[Scalar],
    acc: &mut dyn Accountant,
    sigma: f64,
    config: &SearchConfig,
) -> Result<Vec<f64>, AdpError> {
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(AdpError::Accountant(format!(
            "sigma must be a positive finite number, got {sigma}"
        )));
    }
    let releases = scalars
        .iter()
        .map(|s| Release::of(s, config))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::info!(count = releases.len(), sigma, "publishing");
    let noised = acc.publish(&releases, sigma)?;
    if noised.len() != releases.len() {
        return Err(AdpError::Accountant(format!(
            "accountant returned {} values for {} releases",
            noised.len(),
            releases.len()
        )));
    }
    Ok(noised)
}

impl Scalar {
    /// Publish this scalar alone and return its noised value.
    pub fn publish(&self, acc: &mut dyn Accountant, sigma: f64) -> Result<f64, AdpError> {
        let noised = publish(std::slice::from_ref(self), acc, sigma)?;
        noised
            .into_iter()
            .next()
            .ok_or_else(|| AdpError::Accountant("accountant returned no value".into()))
    }
}
