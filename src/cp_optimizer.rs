/*!

  The CP-SAT submission path: one integer variable per cell with domain `[0, |catalog|-1]`,
  every constraint's `encode` applied, an objective posted by the domain's `CpObjective`
  implementation (using `ScaledOps` for the rational efficiency ratio), and maximisation
  requested. The solver itself is a black box behind `SolverBackend`; this module only builds
  the model and decodes the solver's answer back into catalog indices.

  Gated behind the `solver` feature: a build without the feature still compiles and this path
  simply reports `Error::SolverUnavailable` rather than failing to link.

*/

use crate::component::Catalog;
use crate::constraints::Constraint;
use crate::cp_model::{CpModel, IntVar};
use crate::errors::Error;
use crate::scaled_ops::ScaledOps;
use crate::trace;

/// A domain adapter's CP-SAT objective: given the model and one catalog-index `IntVar` per
/// cell (in flat `MultiSequence` order), posts whatever constraints are needed to compute the
/// scored efficiency and returns the fixed-point-scaled `IntVar` to maximise.
pub trait CpObjective {
  fn encode(&self, model: &mut CpModel, id_vars: &[IntVar], scaled: &ScaledOps) -> IntVar;
}

/// Builds and solves one CP-SAT-shaped model for a complete layout of shape `dims` under
/// `constraints`, maximising the objective `objective` encodes, via `backend`. Returns the
/// decoded catalog-index layout and its (descaled) score.
#[cfg(feature = "solver")]
pub fn solve(
  dims: &[usize],
  catalog: &Catalog,
  constraints: &[Constraint],
  objective: &dyn CpObjective,
  backend: &dyn crate::cp_model::SolverBackend,
  scaling_factor: u32,
) -> Result<(Vec<usize>, f64), Error> {
  let length: usize = dims.iter().product();
  let mut model = CpModel::new();

  let id_vars: Vec<IntVar> = (0..length)
    .map(|i| model.new_int_var(0, catalog.len() as i64 - 1, format!("cell_{}", i)))
    .collect();

  for constraint in constraints {
    constraint.encode(&mut model, &id_vars, dims, catalog)?;
  }

  let scaled = ScaledOps::new(scaling_factor);
  let objective_var = objective.encode(&mut model, &id_vars, &scaled);
  model.maximize(objective_var);

  trace!(
    "cp_model",
    eprintln!(
      "cp_model: {} int vars, {} bool vars, {} constraints posted",
      model.int_var_count(),
      model.bool_var_count(),
      model.constraints().len()
    )
  );

  let solution = backend.solve(&model)?;
  let ids: Vec<usize> = id_vars.iter().map(|&v| solution.int_value(v) as usize).collect();
  let score = scaled.decode(solution.int_value(objective_var));
  Ok((ids, score))
}

/// Without the `solver` feature compiled in, the CP-SAT path is simply unavailable.
#[cfg(not(feature = "solver"))]
pub fn solve(
  _dims: &[usize],
  _catalog: &Catalog,
  _constraints: &[Constraint],
  _objective: &dyn CpObjective,
  _backend: &(),
  _scaling_factor: u32,
) -> Result<(Vec<usize>, f64), Error> {
  Err(Error::SolverUnavailable)
}

#[cfg(all(test, feature = "solver"))]
mod tests {
  use super::*;
  use crate::component::Component;
  use crate::placement_rule::PlacementRule;
  use crate::solver_backend::GoodLpBackend;
  use std::collections::HashMap;

  struct SumIds;
  impl CpObjective for SumIds {
    fn encode(&self, model: &mut CpModel, id_vars: &[IntVar], _scaled: &ScaledOps) -> IntVar {
      // Trivial objective: maximize the single cell's own id, exercised as a smoke test that
      // the model-building/solve/decode plumbing round-trips correctly.
      id_vars[0]
    }
  }

  #[test]
  fn solves_and_decodes_a_trivial_single_cell_model() {
    let catalog = Catalog::new(vec![
      Component::new("a", HashMap::new(), PlacementRule::Always),
      Component::new("b", HashMap::new(), PlacementRule::Always),
    ]);
    let constraints: Vec<Constraint> = vec![];
    // `GoodLpBackend` actually maximizes the objective (unlike `ReferenceBackend`, which
    // returns the first feasible assignment and ignores the objective entirely).
    let (ids, _score) = solve(&[1], &catalog, &constraints, &SumIds, &GoodLpBackend, 2).unwrap();
    assert_eq!(ids, vec![1]); // picks the higher catalog index, "b"
  }
}
