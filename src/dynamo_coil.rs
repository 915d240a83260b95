/*!

  Domain adapter #2 (2-D): turbine dynamo coil grids. A coil's scored stat is `conductivity`;
  a negative value (casing, bearing) marks it as passive, counting for placement and adjacency
  but not the averaged score.

  `standard_dynamo_coils()` carries over the nine coil types from
  `original_source/overhauled/turbine_dynamo_coil/data_structures.py` verbatim, including their
  placement rules (the connector/magnesium/beryllium/aluminum/gold/copper/silver adjacency
  chain), as an example/default catalog.

*/

use std::collections::HashMap;

use crate::backtracking::{BacktrackingOptimiser, ImprovingLayouts, SearchConfig};
use crate::component::{Catalog, Component, BEARING, CASING, CONNECTOR};
use crate::constraints::Constraint;
use crate::cp_model::{CpModel, IntVar};
use crate::cp_optimizer::CpObjective;
use crate::placement_rule::{LogicMode, PlacementRule};
use crate::scaled_ops::ScaledOps;

pub const CONDUCTIVITY: &str = "conductivity";

/// The nine dynamo coil types from
/// `original_source/overhauled/turbine_dynamo_coil/data_structures.py`.
pub fn standard_dynamo_coils() -> Catalog {
  let coil = |name: &str, conductivity: f64, rule: PlacementRule| {
    let mut stats = HashMap::new();
    stats.insert(CONDUCTIVITY.to_string(), conductivity);
    Component::new(name, stats, rule)
  };

  Catalog::new(vec![
    coil(CASING, -1.0, PlacementRule::Always),
    coil(BEARING, -1.0, PlacementRule::Always),
    coil(
      CONNECTOR,
      -1.0,
      PlacementRule::or(vec![
        PlacementRule::simple("magnesium", 1),
        PlacementRule::simple("beryllium", 1),
        PlacementRule::simple("aluminum", 1),
        PlacementRule::simple("gold", 1),
        PlacementRule::simple("copper", 1),
        PlacementRule::simple("silver", 1),
      ]),
    ),
    coil(
      "magnesium",
      0.88,
      PlacementRule::or(vec![PlacementRule::simple(BEARING, 1), PlacementRule::simple(CONNECTOR, 1)]),
    ),
    coil("beryllium", 0.9, PlacementRule::simple("magnesium", 1)),
    coil("aluminum", 1.0, PlacementRule::simple("magnesium", 2)),
    coil("gold", 1.04, PlacementRule::simple("aluminum", 1)),
    coil("copper", 1.06, PlacementRule::simple("beryllium", 1)),
    coil(
      "silver",
      1.12,
      PlacementRule::Compound {
        children: vec![PlacementRule::simple("gold", 1), PlacementRule::simple("copper", 1)],
        mode: LogicMode::And,
      },
    ),
  ])
}

/// Total dynamo coil efficiency for a complete square grid of catalog indices: the mean
/// positive `conductivity` over positive-conductivity coils, `0` if there are none.
pub fn total_efficiency(sequence: &[usize], catalog: &Catalog) -> f64 {
  let mut sum = 0.0;
  let mut count = 0u32;
  for &id in sequence {
    let conductivity = catalog.get(id).expect("id is a valid catalog index").stat(CONDUCTIVITY).unwrap_or(0.0);
    if conductivity > 0.0 {
      sum += conductivity;
      count += 1;
    }
  }
  if count > 0 {
    sum / count as f64
  } else {
    0.0
  }
}

/// Resolves `sequence` (catalog indices) into the `Component` values they name.
pub fn decode_coils(sequence: &[usize], catalog: &Catalog) -> Vec<Component> {
  sequence.iter().map(|&id| catalog.get(id).expect("id is a valid catalog index").clone()).collect()
}

/// Composes the backtracking optimiser with `PlacementRuleEnforced` and `CenteredBearings`
/// (both always-on for the 2-D adapter) and the caller-supplied `MaxQuantity` caps, then
/// exposes a streaming "improving solutions" iterator over `side_length x side_length` coil
/// grids.
pub fn design_dynamo_coils(
  side_length: usize,
  shaft_width: usize,
  catalog: Catalog,
  type_limits_by_name: &HashMap<String, u32>,
) -> impl Iterator<Item = (Vec<Component>, f64)> {
  let resolved_limits = catalog.resolve_type_limits(type_limits_by_name);
  let mut constraints = vec![Constraint::CenteredBearings { shaft_width }, Constraint::PlacementRuleEnforced];
  for (id, limit) in resolved_limits.into_iter().enumerate() {
    if let Some(max) = limit {
      let target_name = catalog.get(id).expect("id is in range").name.clone();
      constraints.push(Constraint::MaxQuantity { target_name, max });
    }
  }

  let scoring_catalog = catalog.clone();
  let decode_catalog = catalog.clone();
  let dims = vec![side_length, side_length];
  let optimiser = BacktrackingOptimiser::new(dims, catalog, constraints, SearchConfig::default());
  let stream: ImprovingLayouts<_> =
    ImprovingLayouts::new(optimiser, move |ids| total_efficiency(ids, &scoring_catalog));

  stream.map(move |(ids, score)| (decode_coils(&ids, &decode_catalog), score))
}

/// One constant `IntVar` per catalog entry, holding `scaled.encode(stat)` (or `0` if the
/// entry has no such stat).
fn catalog_stat_consts(model: &mut CpModel, catalog: &Catalog, stat: &str, scaled: &ScaledOps) -> Vec<IntVar> {
  catalog
    .iter()
    .map(|c| {
      let value = scaled.encode(c.stat(stat).unwrap_or(0.0));
      model.new_int_var(value, value, format!("{}_const", stat))
    })
    .collect()
}

/// CP-SAT objective for a dynamo coil grid: the mean `conductivity` over positive-conductivity
/// cells, `0` if there are none — the same formula `total_efficiency` computes directly,
/// posted as `CpModel` constraints instead of evaluated on a concrete sequence.
pub struct DynamoCoilCpObjective {
  pub catalog: Catalog,
}

impl CpObjective for DynamoCoilCpObjective {
  fn encode(&self, model: &mut CpModel, id_vars: &[IntVar], scaled: &ScaledOps) -> IntVar {
    let conductivity_consts = catalog_stat_consts(model, &self.catalog, CONDUCTIVITY, scaled);
    let zero = model.new_int_var(0, 0, "zero");
    let one = model.new_int_var(1, 1, "one");

    let mut masked = Vec::with_capacity(id_vars.len());
    let mut positive = Vec::with_capacity(id_vars.len());
    for &id_var in id_vars {
      let conductivity = model.element_equals(id_var, conductivity_consts.clone(), "conductivity");
      let is_positive = model.reify_int_ge(conductivity, 1);
      masked.push(model.select(is_positive, conductivity, zero, "masked_conductivity"));
      positive.push(is_positive);
    }

    let sum = model.sum_ints(&masked, "conductivity_sum");
    let count = *model.prefix_sum_bools(&positive).last().expect("at least one cell");
    let count_is_zero = model.reify_int_eq(count, 0);
    let safe_count = model.select(count_is_zero, one, count, "safe_count");

    let (sum_lo, sum_hi) = model.int_var_bounds(sum);
    let raw_average = model.new_int_var(sum_lo.min(0), sum_hi.max(0), "raw_average");
    model.scaled_div(raw_average, sum, safe_count, 0);

    model.select(count_is_zero, zero, raw_average, "dynamo_coil_average")
  }
}

/// Submits a dynamo coil grid to the CP-SAT path (see `cp_optimizer::solve`) instead of the
/// backtracking optimiser, maximising `DynamoCoilCpObjective` via `backend`.
#[cfg(feature = "solver")]
pub fn design_dynamo_coils_cp(
  side_length: usize,
  shaft_width: usize,
  catalog: Catalog,
  type_limits_by_name: &HashMap<String, u32>,
  backend: &dyn crate::cp_model::SolverBackend,
  scaling_factor: u32,
) -> Result<(Vec<Component>, f64), crate::errors::Error> {
  let resolved_limits = catalog.resolve_type_limits(type_limits_by_name);
  let mut constraints = vec![Constraint::CenteredBearings { shaft_width }, Constraint::PlacementRuleEnforced];
  for (id, limit) in resolved_limits.into_iter().enumerate() {
    if let Some(max) = limit {
      let target_name = catalog.get(id).expect("id is in range").name.clone();
      constraints.push(Constraint::MaxQuantity { target_name, max });
    }
  }

  let objective = DynamoCoilCpObjective { catalog: catalog.clone() };
  let dims = vec![side_length, side_length];
  let (ids, score) = crate::cp_optimizer::solve(&dims, &catalog, &constraints, &objective, backend, scaling_factor)?;
  Ok((decode_coils(&ids, &catalog), score))
}


#[cfg(all(test, feature = "solver"))]
mod cp_objective_tests {
  use super::*;
  use crate::cp_model::SolverBackend;
  use crate::solver_backend::GoodLpBackend;

  // These run through `GoodLpBackend`, not `ReferenceBackend`: the objective's lowering mints
  // wide-domain auxiliary int vars (sums, averages spanning hundreds to tens of thousands of
  // values), and `ReferenceBackend::solve` enumerates every int var's full declared domain as a
  // Cartesian product with no propagation, which would never terminate at these widths.
  // `GoodLpBackend` solves the same model as an LP/MIP instead.

  #[test]
  fn dynamo_coil_cp_objective_matches_total_efficiency_on_a_fixed_cell_count() {
    let catalog = standard_dynamo_coils();
    let casing = catalog.id_of(CASING).unwrap();
    let magnesium = catalog.id_of("magnesium").unwrap();
    let gold = catalog.id_of("gold").unwrap();

    let mut model = CpModel::new();
    let scaled = ScaledOps::new(2);
    let id_vars: Vec<IntVar> = [casing, magnesium, gold]
      .iter()
      .map(|&id| model.new_int_var(id as i64, id as i64, "fixed_cell"))
      .collect();

    let objective = DynamoCoilCpObjective { catalog: catalog.clone() };
    let objective_var = objective.encode(&mut model, &id_vars, &scaled);
    model.maximize(objective_var);

    let solution = GoodLpBackend.solve(&model).unwrap();
    let got = scaled.decode(solution.int_value(objective_var));
    let expected = total_efficiency(&[casing, magnesium, gold], &catalog);
    assert!((got - expected).abs() < 1e-6);
  }

  #[test]
  fn dynamo_coil_cp_objective_is_zero_with_no_positive_conductivity_cells() {
    let catalog = standard_dynamo_coils();
    let casing = catalog.id_of(CASING).unwrap();
    let bearing = catalog.id_of(BEARING).unwrap();

    let mut model = CpModel::new();
    let scaled = ScaledOps::new(2);
    let id_vars: Vec<IntVar> = [casing, bearing]
      .iter()
      .map(|&id| model.new_int_var(id as i64, id as i64, "fixed_cell"))
      .collect();

    let objective = DynamoCoilCpObjective { catalog: catalog.clone() };
    let objective_var = objective.encode(&mut model, &id_vars, &scaled);
    model.maximize(objective_var);

    let solution = GoodLpBackend.solve(&model).unwrap();
    assert_eq!(solution.int_value(objective_var), 0);
  }
}
