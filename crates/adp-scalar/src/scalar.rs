//! # Bound-Tracked Scalars
//!
//! Four variants, split along two axes:
//!
//! | | leaf | derived |
//! |---|---|---|
//! | one entity (phi side) | [`PhiScalar`] | [`IntermediatePhiScalar`] |
//! | fused entities (gamma side) | [`GammaScalar`] | [`IntermediateGammaScalar`] |
//!
//! Leaves hold a registered [`Leaf`] record. Derived values hold an
//! expression over leaf symbols plus strong references to every leaf the
//! expression mentions, so their symbols stay resolvable for as long as the
//! value exists.
//!
//! A phi-side value is promoted to the gamma side with [`Scalar::gamma`],
//! which materializes (once, then caches) a fresh [`GammaScalar`] leaf from
//! its current bounds, value and entity.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

use adp_core::{AdpError, Entity, Expr, Leaf, Origin, ScalarId, SearchConfig, Symbol, SymbolTable};
use adp_search::LipschitzBound;

/// Build and register a leaf in the process-wide symbol table.
fn register(leaf: Leaf) -> Result<Arc<Leaf>, AdpError> {
    let leaf = Arc::new(leaf);
    SymbolTable::global().register(&leaf)?;
    Ok(leaf)
}

// ---------------------------------------------------------------------------
// Leaves
// ---------------------------------------------------------------------------

/// A leaf over data belonging to exactly one entity.
#[derive(Debug)]
pub struct PhiScalar {
    leaf: Arc<Leaf>,
    gamma: OnceLock<Arc<GammaScalar>>,
}

impl PhiScalar {
    /// Create and register a leaf. A fresh anonymous entity is used when
    /// `entity` is `None`.
    pub fn new(min_val: f64, value: f64, max_val: f64, entity: Option<Entity>) -> Result<Self, AdpError> {
        Self::from_parts(ScalarId::new(), None, min_val, value, max_val, entity)
    }

    /// Like [`new`](Self::new), with a human-readable name.
    pub fn with_name(
        name: impl Into<String>,
        min_val: f64,
        value: f64,
        max_val: f64,
        entity: Option<Entity>,
    ) -> Result<Self, AdpError> {
        Self::from_parts(ScalarId::new(), Some(name.into()), min_val, value, max_val, entity)
    }

    /// Create a leaf with a caller-chosen id. Fails if a live leaf already
    /// holds the resulting symbol.
    pub fn from_parts(
        id: ScalarId,
        name: Option<String>,
        min_val: f64,
        value: f64,
        max_val: f64,
        entity: Option<Entity>,
    ) -> Result<Self, AdpError> {
        let leaf = Leaf::new(id, Origin::Phi, entity.unwrap_or_default(), name, min_val, value, max_val)?;
        Ok(Self {
            leaf: register(leaf)?,
            gamma: OnceLock::new(),
        })
    }

    pub fn leaf(&self) -> &Arc<Leaf> {
        &self.leaf
    }
}

/// A leaf at a point where data of several entities has been fused.
#[derive(Debug)]
pub struct GammaScalar {
    leaf: Arc<Leaf>,
}

impl GammaScalar {
    /// Create and register a leaf. Its symbol encodes both its own id and
    /// its entity's id.
    pub fn new(min_val: f64, value: f64, max_val: f64, entity: Option<Entity>) -> Result<Self, AdpError> {
        Self::from_parts(ScalarId::new(), None, min_val, value, max_val, entity)
    }

    pub fn from_parts(
        id: ScalarId,
        name: Option<String>,
        min_val: f64,
        value: f64,
        max_val: f64,
        entity: Option<Entity>,
    ) -> Result<Self, AdpError> {
        let leaf = Leaf::new(id, Origin::Gamma, entity.unwrap_or_default(), name, min_val, value, max_val)?;
        Ok(Self { leaf: register(leaf)? })
    }

    pub fn leaf(&self) -> &Arc<Leaf> {
        &self.leaf
    }
}

// ---------------------------------------------------------------------------
// Derived values
// ---------------------------------------------------------------------------

/// Keep the leaves whose symbol appears in `poly`, one per symbol.
fn keepalive<'a>(poly: &Expr, leaves: impl IntoIterator<Item = &'a Arc<Leaf>>) -> Vec<Arc<Leaf>> {
    let live = poly.free_symbols();
    let mut kept: BTreeMap<Symbol, Arc<Leaf>> = BTreeMap::new();
    for leaf in leaves {
        if live.contains(leaf.ssid()) {
            kept.entry(leaf.ssid().clone()).or_insert_with(|| leaf.clone());
        }
    }
    kept.into_values().collect()
}

/// A value derived from one entity's data only.
#[derive(Debug)]
pub struct IntermediatePhiScalar {
    id: ScalarId,
    poly: Expr,
    entity: Entity,
    inputs: Vec<Arc<Leaf>>,
    gamma: OnceLock<Arc<GammaScalar>>,
}

impl IntermediatePhiScalar {
    pub(crate) fn new<'a>(poly: Expr, entity: Entity, leaves: impl IntoIterator<Item = &'a Arc<Leaf>>) -> Self {
        Self {
            id: ScalarId::new(),
            inputs: keepalive(&poly, leaves),
            poly,
            entity,
            gamma: OnceLock::new(),
        }
    }
}

/// A value derived from the fused data of several entities.
#[derive(Debug)]
pub struct IntermediateGammaScalar {
    id: ScalarId,
    poly: Expr,
    inputs: Vec<Arc<Leaf>>,
}

impl IntermediateGammaScalar {
    pub(crate) fn new<'a>(poly: Expr, leaves: impl IntoIterator<Item = &'a Arc<Leaf>>) -> Self {
        Self {
            id: ScalarId::new(),
            inputs: keepalive(&poly, leaves),
            poly,
        }
    }
}

// ---------------------------------------------------------------------------
// Scalar
// ---------------------------------------------------------------------------

/// A bound-tracked value.
#[derive(Debug, Clone)]
pub enum Scalar {
    Phi(Arc<PhiScalar>),
    Gamma(Arc<GammaScalar>),
    IntermediatePhi(Arc<IntermediatePhiScalar>),
    IntermediateGamma(Arc<IntermediateGammaScalar>),
}

/// The `(min_val, value, max_val)` triple of a scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_val: f64,
    pub value: f64,
    pub max_val: f64,
}

impl From<PhiScalar> for Scalar {
    fn from(s: PhiScalar) -> Self {
        Scalar::Phi(Arc::new(s))
    }
}

impl From<GammaScalar> for Scalar {
    fn from(s: GammaScalar) -> Self {
        Scalar::Gamma(Arc::new(s))
    }
}

impl Scalar {
    /// Shorthand for a registered [`PhiScalar`].
    pub fn phi(min_val: f64, value: f64, max_val: f64, entity: Option<Entity>) -> Result<Self, AdpError> {
        PhiScalar::new(min_val, value, max_val, entity).map(Self::from)
    }

    /// Shorthand for a registered [`GammaScalar`].
    pub fn gamma_leaf(min_val: f64, value: f64, max_val: f64, entity: Option<Entity>) -> Result<Self, AdpError> {
        GammaScalar::new(min_val, value, max_val, entity).map(Self::from)
    }

    pub(crate) fn intermediate_phi<'a>(
        poly: Expr,
        entity: Entity,
        leaves: impl IntoIterator<Item = &'a Arc<Leaf>>,
    ) -> Self {
        Scalar::IntermediatePhi(Arc::new(IntermediatePhiScalar::new(poly, entity, leaves)))
    }

    pub(crate) fn intermediate_gamma<'a>(poly: Expr, leaves: impl IntoIterator<Item = &'a Arc<Leaf>>) -> Self {
        Scalar::IntermediateGamma(Arc::new(IntermediateGammaScalar::new(poly, leaves)))
    }

    /// Variant name, as used in `Display`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Scalar::Phi(_) => "PhiScalar",
            Scalar::Gamma(_) => "GammaScalar",
            Scalar::IntermediatePhi(_) => "IntermediatePhiScalar",
            Scalar::IntermediateGamma(_) => "IntermediateGammaScalar",
        }
    }

    /// The scalar's own id. Derived values get a fresh one.
    pub fn id(&self) -> ScalarId {
        match self {
            Scalar::Phi(s) => s.leaf.id(),
            Scalar::Gamma(s) => s.leaf.id(),
            Scalar::IntermediatePhi(s) => s.id,
            Scalar::IntermediateGamma(s) => s.id,
        }
    }

    /// The leaf record, for leaf variants.
    pub fn leaf(&self) -> Option<&Arc<Leaf>> {
        match self {
            Scalar::Phi(s) => Some(&s.leaf),
            Scalar::Gamma(s) => Some(&s.leaf),
            _ => None,
        }
    }

    /// Registered symbol of a leaf.
    pub fn ssid(&self) -> Option<&Symbol> {
        self.leaf().map(|l| l.ssid())
    }

    /// Name of a leaf, if it was given one.
    pub fn name(&self) -> Option<&str> {
        self.leaf().and_then(|l| l.name())
    }

    /// The symbolic form of this value over leaf symbols.
    pub fn poly(&self) -> Expr {
        match self {
            Scalar::Phi(s) => s.leaf.expr(),
            Scalar::Gamma(s) => s.leaf.expr(),
            Scalar::IntermediatePhi(s) => s.poly.clone(),
            Scalar::IntermediateGamma(s) => s.poly.clone(),
        }
    }

    /// The entity of a leaf or of a single-entity derived value.
    pub fn entity(&self) -> Option<&Entity> {
        match self {
            Scalar::Phi(s) => Some(s.leaf.entity()),
            Scalar::Gamma(s) => Some(s.leaf.entity()),
            Scalar::IntermediatePhi(s) => Some(&s.entity),
            Scalar::IntermediateGamma(_) => None,
        }
    }

    /// Whether this value still belongs to a single entity.
    pub fn is_phi_side(&self) -> bool {
        matches!(self, Scalar::Phi(_) | Scalar::IntermediatePhi(_))
    }

    pub(crate) fn phi_entity(&self) -> Option<&Entity> {
        match self {
            Scalar::Phi(s) => Some(s.leaf.entity()),
            Scalar::IntermediatePhi(s) => Some(&s.entity),
            _ => None,
        }
    }

    /// Every leaf this value holds alive.
    pub(crate) fn held_leaves(&self) -> &[Arc<Leaf>] {
        match self {
            Scalar::Phi(s) => std::slice::from_ref(&s.leaf),
            Scalar::Gamma(s) => std::slice::from_ref(&s.leaf),
            Scalar::IntermediatePhi(s) => &s.inputs,
            Scalar::IntermediateGamma(s) => &s.inputs,
        }
    }

    // -- bounds -------------------------------------------------------------

    /// Current value. Derived values evaluate their expression at the
    /// inputs' recorded values.
    pub fn value(&self) -> Result<f64, AdpError> {
        match self.leaf() {
            Some(l) => Ok(l.value()),
            None => Ok(adp_search::value(&self.poly(), SymbolTable::global())?),
        }
    }

    /// Lower bound with the default search configuration.
    pub fn min_val(&self) -> Result<f64, AdpError> {
        self.min_val_with(&SearchConfig::default())
    }

    /// Upper bound with the default search configuration.
    pub fn max_val(&self) -> Result<f64, AdpError> {
        self.max_val_with(&SearchConfig::default())
    }

    /// Lower bound, searching with `config` for derived values.
    pub fn min_val_with(&self, config: &SearchConfig) -> Result<f64, AdpError> {
        match self.leaf() {
            Some(l) => Ok(l.min_val()),
            None => Ok(adp_search::min_val(&self.poly(), SymbolTable::global(), config)?),
        }
    }

    /// Upper bound, searching with `config` for derived values.
    pub fn max_val_with(&self, config: &SearchConfig) -> Result<f64, AdpError> {
        match self.leaf() {
            Some(l) => Ok(l.max_val()),
            None => Ok(adp_search::max_val(&self.poly(), SymbolTable::global(), config)?),
        }
    }

    /// All three of `min_val`, `value`, `max_val`, checked for consistency.
    pub fn bounds(&self) -> Result<Bounds, AdpError> {
        self.bounds_with(&SearchConfig::default())
    }

    pub fn bounds_with(&self, config: &SearchConfig) -> Result<Bounds, AdpError> {
        let b = Bounds {
            min_val: self.min_val_with(config)?,
            value: self.value()?,
            max_val: self.max_val_with(config)?,
        };
        if !(b.min_val <= b.value && b.value <= b.max_val) {
            tracing::error!(id = %self.id(), min_val = b.min_val, value = b.value, max_val = b.max_val, "bound invariant violated");
            return Err(AdpError::BoundInvariant {
                min_val: b.min_val,
                value: b.value,
                max_val: b.max_val,
            });
        }
        Ok(b)
    }

    // -- inputs -------------------------------------------------------------

    /// The leaves this value's expression depends on, resolved through the
    /// symbol table.
    pub fn input_scalars(&self) -> Result<Vec<Arc<Leaf>>, AdpError> {
        let inputs = adp_search::SearchInputs::resolve(&self.poly(), SymbolTable::global())?;
        Ok(inputs.leaves().to_vec())
    }

    /// Distinct entities this value depends on.
    pub fn input_entities(&self) -> Result<Vec<Entity>, AdpError> {
        if let Some(e) = self.phi_entity() {
            return Ok(vec![e.clone()]);
        }
        let entities: BTreeSet<Entity> = self
            .input_scalars()?
            .iter()
            .map(|l| l.entity().clone())
            .collect();
        Ok(entities.into_iter().collect())
    }

    // -- promotion ----------------------------------------------------------

    /// The gamma-side form of this value. Phi-side values materialize a new
    /// [`GammaScalar`] leaf on first call and return the cached one after;
    /// gamma-side values return themselves.
    pub fn gamma(&self) -> Result<Scalar, AdpError> {
        self.gamma_with(&SearchConfig::default())
    }

    /// Like [`gamma`](Self::gamma), searching a derived phi value's bounds
    /// with `config`. Only the first promotion searches; later calls return
    /// the cached leaf whatever config they pass.
    pub fn gamma_with(&self, config: &SearchConfig) -> Result<Scalar, AdpError> {
        match self {
            Scalar::Phi(s) => promote(&s.gamma, || {
                let l = &s.leaf;
                GammaScalar::from_parts(
                    ScalarId::new(),
                    l.name().map(str::to_owned),
                    l.min_val(),
                    l.value(),
                    l.max_val(),
                    Some(l.entity().clone()),
                )
            }),
            Scalar::IntermediatePhi(s) => promote(&s.gamma, || {
                let b = self.bounds_with(config)?;
                GammaScalar::from_parts(
                    ScalarId::new(),
                    None,
                    b.min_val,
                    b.value,
                    b.max_val,
                    Some(s.entity.clone()),
                )
            }),
            Scalar::Gamma(_) | Scalar::IntermediateGamma(_) => Ok(self.clone()),
        }
    }

    // -- sensitivity --------------------------------------------------------

    /// Lipschitz bound over all entities, by jacobian search.
    ///
    /// The bound is taken over the promoted form from [`gamma`](Self::gamma).
    /// A derived phi value counts as one input spanning its searched range,
    /// so `2x + y` over phi leaves `x` and `y` reports 1, not the 2 its
    /// expression over `x` and `y` would give.
    pub fn max_lipschitz(&self) -> Result<f64, AdpError> {
        Ok(self.max_lipschitz_via_jacobian(None, &SearchConfig::default())?.value)
    }

    /// Lipschitz bound with respect to one entity's inputs, by jacobian search.
    ///
    /// Measured against promoted gamma leaves, as in
    /// [`max_lipschitz`](Self::max_lipschitz).
    pub fn max_lipschitz_wrt_entity(&self, entity: &Entity) -> Result<f64, AdpError> {
        Ok(self
            .max_lipschitz_via_jacobian(Some(entity), &SearchConfig::default())?
            .value)
    }

    /// Jacobian-norm Lipschitz bound of the promoted form. `config` drives
    /// both the promotion's bound search and the gradient search.
    pub fn max_lipschitz_via_jacobian(
        &self,
        entity: Option<&Entity>,
        config: &SearchConfig,
    ) -> Result<LipschitzBound, AdpError> {
        let gamma = self.gamma_with(config)?;
        Ok(adp_search::max_lipschitz_via_jacobian(
            &gamma.poly(),
            SymbolTable::global(),
            entity,
            config,
        )?)
    }

    /// Two-point difference-quotient bound of the promoted form.
    pub fn max_lipschitz_via_explicit_search(
        &self,
        entity: Option<&Entity>,
        config: &SearchConfig,
    ) -> Result<LipschitzBound, AdpError> {
        let gamma = self.gamma_with(config)?;
        Ok(adp_search::max_lipschitz_via_explicit_search(
            &gamma.poly(),
            SymbolTable::global(),
            entity,
            config,
        )?)
    }
}

fn promote(
    cell: &OnceLock<Arc<GammaScalar>>,
    make: impl FnOnce() -> Result<GammaScalar, AdpError>,
) -> Result<Scalar, AdpError> {
    if let Some(g) = cell.get() {
        return Ok(Scalar::Gamma(g.clone()));
    }
    let fresh = Arc::new(make()?);
    let g = cell.get_or_init(|| fresh);
    tracing::debug!(symbol = %g.leaf.ssid(), entity = %g.leaf.entity(), "promoted to gamma");
    Ok(Scalar::Gamma(g.clone()))
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.bounds() {
            Ok(b) => write!(
                f,
                "<{}: ({} < {} < {})>",
                self.type_name(),
                b.min_val,
                b.value,
                b.max_val
            ),
            Err(_) => write!(f, "<{}: {}>", self.type_name(), self.poly()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adp_core::SymbolResolver;

    #[test]
    fn phi_leaf_registers_itself() {
        let x = Scalar::phi(0.0, 5.0, 10.0, None).unwrap();
        let ssid = x.ssid().unwrap().clone();
        assert!(ssid.as_str().starts_with("phi_"));
        let leaf = SymbolTable::global().resolve(&ssid).unwrap();
        assert_eq!(leaf.id(), x.id());
        assert_eq!(x.bounds().unwrap(), Bounds { min_val: 0.0, value: 5.0, max_val: 10.0 });
        assert_eq!(x.type_name(), "PhiScalar");
    }

    #[test]
    fn gamma_leaf_symbol_encodes_entity() {
        let e = Entity::named("gamma-leaf-owner");
        let g = Scalar::gamma_leaf(-1.0, 0.0, 1.0, Some(e.clone())).unwrap();
        let ssid = g.ssid().unwrap().as_str().to_owned();
        assert!(ssid.starts_with("gamma_"));
        assert!(ssid.ends_with(&e.id().as_uuid().simple().to_string()));
        assert!(!g.is_phi_side());
    }

    #[test]
    fn invalid_triple_is_rejected() {
        assert!(matches!(
            Scalar::phi(1.0, 0.0, 2.0, None),
            Err(AdpError::Bounds(_))
        ));
        assert!(matches!(
            Scalar::phi(0.0, f64::NAN, 2.0, None),
            Err(AdpError::Bounds(_))
        ));
    }

    #[test]
    fn duplicate_live_id_is_rejected() {
        let id = ScalarId::new();
        let _first = PhiScalar::from_parts(id, None, 0.0, 0.0, 1.0, None).unwrap();
        let err = PhiScalar::from_parts(id, None, 0.0, 0.0, 1.0, None).unwrap_err();
        assert!(matches!(err, AdpError::Registry(_)));
    }

    #[test]
    fn promotion_is_cached_and_keeps_entity() {
        let e = Entity::named("promoted");
        let x = Scalar::phi(0.0, 2.0, 4.0, Some(e.clone())).unwrap();
        let g1 = x.gamma().unwrap();
        let g2 = x.gamma().unwrap();
        assert_eq!(g1.id(), g2.id());
        assert_ne!(g1.id(), x.id());
        assert_eq!(g1.entity(), Some(&e));
        assert_eq!(g1.bounds().unwrap(), x.bounds().unwrap());
        assert_eq!(g1.type_name(), "GammaScalar");
    }

    #[test]
    fn gamma_side_promotes_to_itself() {
        let g = Scalar::gamma_leaf(0.0, 1.0, 2.0, None).unwrap();
        assert_eq!(g.gamma().unwrap().id(), g.id());
    }

    #[test]
    fn leaf_lipschitz_is_one() {
        let x = Scalar::phi(0.0, 5.0, 10.0, None).unwrap();
        assert_eq!(x.max_lipschitz().unwrap(), 1.0);
    }

    fn capped_config() -> SearchConfig {
        SearchConfig {
            max_iterations: 1,
            grid_points_per_axis: 0,
            max_corner_dims: 0,
            random_starts: 0,
            tolerance: 1e-15,
            ..SearchConfig::default()
        }
    }

    #[test]
    fn promotion_searches_with_given_config() {
        let x = Scalar::phi(-100.0, 90.0, 100.0, None).unwrap();
        let sq = ((&x * &x).unwrap() - 2.0 * &x).unwrap();
        let err = sq.max_lipschitz_via_jacobian(None, &capped_config()).unwrap_err();
        assert!(matches!(err, AdpError::Search(adp_core::SearchError::NotConverged { .. })));
        let err = sq.gamma_with(&capped_config()).unwrap_err();
        assert!(matches!(err, AdpError::Search(_)));

        // The default config still promotes, and the result is cached.
        let g = sq.gamma().unwrap();
        assert_eq!(sq.gamma_with(&capped_config()).unwrap().id(), g.id());
        assert_eq!(sq.max_lipschitz().unwrap(), 1.0);
    }

    #[test]
    fn lipschitz_is_measured_on_promoted_leaf() {
        let e = Entity::named("lipschitz-promoted");
        let x = Scalar::phi(0.0, 1.0, 5.0, Some(e.clone())).unwrap();
        let y = Scalar::phi(0.0, 2.0, 10.0, Some(e.clone())).unwrap();
        let s = ((2.0 * &x) + &y).unwrap();
        assert_eq!(s.max_lipschitz_wrt_entity(&e).unwrap(), 1.0);
        let g = s.gamma().unwrap();
        assert_eq!(g.bounds().unwrap(), Bounds { min_val: 0.0, value: 4.0, max_val: 20.0 });
    }

    #[test]
    fn display_shows_bounds() {
        let x = Scalar::phi(0.0, 5.0, 10.0, None).unwrap();
        assert_eq!(x.to_string(), "<PhiScalar: (0 < 5 < 10)>");
    }
}
