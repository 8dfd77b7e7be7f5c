//! # Two-Entity Scenario
//!
//! Two data subjects each contribute one value; their sum is released.
//! Exercises construction, promotion, bound search, both Lipschitz searches
//! and publishing end to end.

use adp_core::{Entity, SearchConfig};
use adp_scalar::{Accountant, Release, Scalar, DEFAULT_SIGMA};
use adp_search::SearchMethod;

struct Fixture {
    ex: Entity,
    ey: Entity,
    x: Scalar,
    y: Scalar,
}

fn fixture() -> Fixture {
    let ex = Entity::named("scenario-x");
    let ey = Entity::named("scenario-y");
    let x = Scalar::phi(0.0, 5.0, 10.0, Some(ex.clone())).unwrap();
    let y = Scalar::phi(0.0, 3.0, 10.0, Some(ey.clone())).unwrap();
    Fixture { ex, ey, x, y }
}

// ---------------------------------------------------------------------------
// 1. Sum of two entities
// ---------------------------------------------------------------------------

#[test]
fn sum_is_gamma_with_searched_bounds() {
    let f = fixture();
    let s = (&f.x + &f.y).unwrap();

    assert!(matches!(s, Scalar::IntermediateGamma(_)));
    assert_eq!(s.value().unwrap(), 8.0);
    assert_eq!(s.max_val().unwrap(), 20.0);
    assert_eq!(s.min_val().unwrap(), 0.0);
    assert_eq!(s.to_string(), "<IntermediateGammaScalar: (0 < 8 < 20)>");

    let mut entities = s.input_entities().unwrap();
    entities.sort();
    let mut expected = vec![f.ex.clone(), f.ey.clone()];
    expected.sort();
    assert_eq!(entities, expected);
}

#[test]
fn sum_lipschitz_per_entity() {
    let f = fixture();
    let s = (&f.x + &f.y).unwrap();
    assert_eq!(s.max_lipschitz_wrt_entity(&f.ex).unwrap(), 1.0);
    assert_eq!(s.max_lipschitz_wrt_entity(&f.ey).unwrap(), 1.0);
    assert!((s.max_lipschitz().unwrap() - 2f64.sqrt()).abs() < 1e-12);
}

#[test]
fn explicit_search_agrees_with_jacobian() {
    let f = fixture();
    let s = (&f.x + &f.y).unwrap();
    let config = SearchConfig::default();
    let explicit = s.max_lipschitz_via_explicit_search(Some(&f.ex), &config).unwrap();
    assert_eq!(explicit.method, SearchMethod::Explicit);
    assert!((explicit.value - 1.0).abs() < 1e-6, "L = {}", explicit.value);
}

// ---------------------------------------------------------------------------
// 2. Same entity stays phi
// ---------------------------------------------------------------------------

#[test]
fn same_entity_chain_stays_phi() {
    let f = fixture();
    let x2 = Scalar::phi(1.0, 2.0, 3.0, Some(f.ex.clone())).unwrap();
    let p = ((&f.x * &x2).unwrap() + 1.0) * 0.5;
    assert!(p.is_phi_side());
    assert_eq!(p.entity(), Some(&f.ex));
    assert_eq!(p.value().unwrap(), 5.5);
    assert_eq!(p.max_val().unwrap(), 15.5);
    assert_eq!(p.min_val().unwrap(), 0.5);
}

#[test]
fn mixing_after_phi_chain_promotes_once() {
    let f = fixture();
    let doubled = &f.x * 2.0;
    let s = (&doubled - &f.y).unwrap();
    let t = (&doubled + &f.y).unwrap();
    // Both results reference the same cached promotion of `doubled`.
    let shared: Vec<_> = s
        .poly()
        .free_symbols()
        .intersection(&t.poly().free_symbols())
        .cloned()
        .collect();
    assert_eq!(shared.len(), 2);
    assert_eq!(s.value().unwrap(), 7.0);
    assert_eq!(t.value().unwrap(), 13.0);
}

// ---------------------------------------------------------------------------
// 3. Publishing
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Ledger {
    spent: Vec<(Entity, f64)>,
}

impl Accountant for Ledger {
    fn publish(&mut self, releases: &[Release], sigma: f64) -> Result<Vec<f64>, adp_core::AdpError> {
        for r in releases {
            for s in &r.sensitivities {
                self.spent.push((s.entity.clone(), s.lipschitz / sigma));
            }
        }
        Ok(releases.iter().map(|r| r.value).collect())
    }
}

#[test]
fn publish_debits_each_contributor() {
    let f = fixture();
    let s = (&f.x + &f.y).unwrap();
    let mut ledger = Ledger::default();
    let values = adp_scalar::publish(&[s, f.x.clone()], &mut ledger, DEFAULT_SIGMA).unwrap();
    assert_eq!(values, vec![8.0, 5.0]);
    assert_eq!(ledger.spent.len(), 3);
    assert_eq!(ledger.spent.iter().filter(|(e, _)| e == &f.ex).count(), 2);
    for (_, eps) in &ledger.spent {
        assert!((eps - 1.0 / DEFAULT_SIGMA).abs() < 1e-12);
    }
}
