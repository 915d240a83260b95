/*!

  `PlacementRule` is the algebraic, recursively composable adjacency predicate attached to
  every catalog entry. It has a direct evaluator, operating on a tuple of neighbour name
  strings, and a CP-SAT lowering that produces an equivalent boolean variable over neighbour ID
  variables. Rules are immutable and freely shared (`Rc`-free here since `PlacementRule` is
  `Clone + Eq`; cheap to duplicate, and sharing substructure across catalog entries costs
  nothing extra in memory terms that matters at this scale).

  Every caller uses the canonical `(+d, -d)` per-axis neighbour order from `multi_sequence.rs`;
  there is no separate up/right/down/left convention to reconcile.

*/

use crate::component::INCOMPLETE;
use crate::cp_model::{BoolVar, CpModel};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum LogicMode {
  And,
  Or,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum PlacementRule {
  /// Trivially satisfied. The default rule for components with no adjacency requirement
  /// (casing, bearing).
  Always,

  /// Requires, among the neighbour tuple, at least (or exactly) `min_quantity` neighbours
  /// named `target_name`; if `axial` is set, additionally requires at least one opposing pair
  /// of neighbours that both equal `target_name`.
  Simple {
    target_name: String,
    min_quantity: u32,
    exact: bool,
    axial: bool,
  },

  /// AND/OR of child rules.
  Compound {
    children: Vec<PlacementRule>,
    mode: LogicMode,
  },
}

impl PlacementRule {
  pub fn simple(target_name: impl Into<String>, min_quantity: u32) -> Self {
    PlacementRule::Simple { target_name: target_name.into(), min_quantity, exact: false, axial: false }
  }

  pub fn simple_exact(target_name: impl Into<String>, quantity: u32) -> Self {
    PlacementRule::Simple { target_name: target_name.into(), min_quantity: quantity, exact: true, axial: false }
  }

  pub fn simple_axial(target_name: impl Into<String>, min_quantity: u32) -> Self {
    PlacementRule::Simple { target_name: target_name.into(), min_quantity, exact: false, axial: true }
  }

  pub fn and(children: Vec<PlacementRule>) -> Self {
    PlacementRule::Compound { children, mode: LogicMode::And }
  }

  pub fn or(children: Vec<PlacementRule>) -> Self {
    PlacementRule::Compound { children, mode: LogicMode::Or }
  }

  /// Direct evaluation against an ordered tuple of neighbour name strings, length `2*D`.
  ///
  /// If any neighbour is `"incomplete"`, returns `true` unconditionally: partial layouts are
  /// never rejected by a rule, so a backtracker can keep extending one without a rule
  /// retroactively invalidating cells it already committed to.
  pub fn evaluate(&self, neighbours: &[&str]) -> bool {
    match self {
      PlacementRule::Always => true,

      PlacementRule::Simple { target_name, min_quantity, exact, axial } => {
        if neighbours.iter().any(|&n| n == INCOMPLETE) {
          return true;
        }

        let quantity = neighbours.iter().filter(|&&n| n == target_name).count() as u32;
        let quantity_ok = if *exact { quantity == *min_quantity } else { quantity >= *min_quantity };
        if !quantity_ok {
          return false;
        }

        if *axial {
          let has_axial_pair = neighbours
            .chunks_exact(2)
            .any(|pair| pair[0] == target_name && pair[1] == target_name);
          if !has_axial_pair {
            return false;
          }
        }

        true
      }

      PlacementRule::Compound { children, mode } => match mode {
        LogicMode::And => children.iter().all(|child| child.evaluate(neighbours)),
        LogicMode::Or => children.iter().any(|child| child.evaluate(neighbours)),
      },
    }
  }

  /// Lowers the rule into the CP-SAT model, returning a fresh boolean variable constrained to
  /// equal the rule's satisfaction over the neighbour ID variables `neighbour_ids` (each entry
  /// `None` meaning the literal wall sentinel, never equal to any valid catalog ID).
  ///
  /// `name_to_id` maps every catalog name to its integer ID, used to resolve `target_name`.
  pub fn to_model(
    &self,
    model: &mut CpModel,
    name_to_id: &std::collections::HashMap<String, usize>,
    neighbour_ids: &[crate::cp_model::IdExpr],
  ) -> BoolVar {
    match self {
      PlacementRule::Always => {
        let satisfied = model.new_bool_var("always_satisfied");
        model.fix_bool(satisfied, true);
        satisfied
      }

      PlacementRule::Simple { target_name, min_quantity, exact, axial } => {
        let target_id = name_to_id.get(target_name).copied();

        // One match boolean per neighbour: true iff that neighbour equals target_id. A wall
        // neighbour (`None`) never matches.
        let matches: Vec<BoolVar> = neighbour_ids
          .iter()
          .map(|n| model.reify_id_equals(*n, target_id))
          .collect();

        // Running prefix-sum quantity, as in the original `to_model`'s `quantity[i]` chain.
        let quantity = model.prefix_sum_bools(&matches);
        let last_quantity = *quantity.last().expect("neighbour tuple is non-empty");

        let quantity_ok = if *exact {
          model.reify_int_eq(last_quantity, *min_quantity as i64)
        } else {
          model.reify_int_ge(last_quantity, *min_quantity as i64)
        };

        if !*axial {
          return quantity_ok;
        }

        // Per-axis conjunction of opposing matches, then OR across axes.
        let axials: Vec<BoolVar> = matches
          .chunks_exact(2)
          .map(|pair| model.reify_and(&[pair[0], pair[1]]))
          .collect();
        let axial_any = model.reify_or(&axials);

        model.reify_and(&[quantity_ok, axial_any])
      }

      PlacementRule::Compound { children, mode } => {
        let child_vars: Vec<BoolVar> =
          children.iter().map(|child| child.to_model(model, name_to_id, neighbour_ids)).collect();
        match mode {
          LogicMode::And => model.reify_and(&child_vars),
          LogicMode::Or => model.reify_or(&child_vars),
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn simple_rule_quantity_one() {
    let rule = PlacementRule::simple("magnesium", 1);
    assert!(rule.evaluate(&["bearing", "wall", "magnesium", "wall"]));
    assert!(!rule.evaluate(&["bearing", "wall", "wall", "wall"]));
    assert!(rule.evaluate(&["incomplete", "wall", "wall", "wall"]));
  }

  #[test]
  fn simple_rule_axial_pair_required() {
    let rule = PlacementRule::simple_axial("gold", 2);
    assert!(rule.evaluate(&["gold", "gold", "wall", "wall"]));
    assert!(!rule.evaluate(&["gold", "wall", "gold", "wall"]));
  }

  #[test]
  fn exact_rejects_overshoot() {
    let rule = PlacementRule::simple_exact("copper", 1);
    assert!(rule.evaluate(&["copper", "wall", "wall", "wall"]));
    assert!(!rule.evaluate(&["copper", "copper", "wall", "wall"]));
  }

  #[test]
  fn compound_and_requires_all_children() {
    let rule = PlacementRule::and(vec![
      PlacementRule::simple("gold", 1),
      PlacementRule::simple("copper", 1),
    ]);
    assert!(rule.evaluate(&["gold", "copper", "wall", "wall"]));
    assert!(!rule.evaluate(&["gold", "wall", "wall", "wall"]));
  }

  #[test]
  fn compound_or_requires_any_child() {
    let rule = PlacementRule::or(vec![
      PlacementRule::simple("gold", 1),
      PlacementRule::simple("copper", 1),
    ]);
    assert!(rule.evaluate(&["gold", "wall", "wall", "wall"]));
    assert!(rule.evaluate(&["copper", "wall", "wall", "wall"]));
    assert!(!rule.evaluate(&["wall", "wall", "wall", "wall"]));
  }

  #[test]
  fn always_is_trivially_satisfied() {
    assert!(PlacementRule::Always.evaluate(&["anything", "wall", "wall", "wall"]));
  }

  /// For any rule and neighbour tuple, direct evaluation must agree with the lowered CP-SAT
  /// model once the neighbour id variables are fixed to match the tuple.
  fn assert_rule_model_equivalence(rule: &PlacementRule, names: &[&str], catalog_names: &[&str]) {
    use crate::cp_model::{CpModel, IdExpr, ReferenceBackend, SolverBackend};
    use std::collections::HashMap;

    let name_to_id: HashMap<String, usize> =
      catalog_names.iter().enumerate().map(|(i, n)| (n.to_string(), i)).collect();

    let mut model = CpModel::new();
    let neighbour_ids: Vec<IdExpr> = names
      .iter()
      .map(|&n| {
        if n == "wall" {
          IdExpr::Wall
        } else if n == "incomplete" {
          // Model equivalence is only claimed for complete neighbour tuples; "incomplete"
          // has no catalog id and is outside the CP-SAT model's domain by construction.
          IdExpr::Wall
        } else {
          let id = name_to_id[n] as i64;
          IdExpr::Var(model.new_int_var(id, id, n))
        }
      })
      .collect();

    let satisfied = rule.to_model(&mut model, &name_to_id, &neighbour_ids);
    model.maximize(model.new_int_var(0, 0, "dummy_objective"));

    let solution = ReferenceBackend.solve(&model).expect("fixed-id model is always feasible");
    assert_eq!(solution.bool_value(satisfied), rule.evaluate(names));
  }

  #[test]
  fn rule_model_equivalence_simple_quantity() {
    let rule = PlacementRule::simple("magnesium", 1);
    let catalog = ["bearing", "magnesium", "wall"];
    assert_rule_model_equivalence(&rule, &["bearing", "wall", "magnesium", "wall"], &catalog);
    assert_rule_model_equivalence(&rule, &["bearing", "wall", "wall", "wall"], &catalog);
  }

  #[test]
  fn rule_model_equivalence_axial() {
    let rule = PlacementRule::simple_axial("gold", 2);
    let catalog = ["gold"];
    assert_rule_model_equivalence(&rule, &["gold", "gold", "wall", "wall"], &catalog);
    assert_rule_model_equivalence(&rule, &["gold", "wall", "gold", "wall"], &catalog);
  }

  #[test]
  fn rule_model_equivalence_compound() {
    let rule = PlacementRule::and(vec![PlacementRule::simple("gold", 1), PlacementRule::simple("copper", 1)]);
    let catalog = ["gold", "copper"];
    assert_rule_model_equivalence(&rule, &["gold", "copper", "wall", "wall"], &catalog);
    assert_rule_model_equivalence(&rule, &["gold", "wall", "wall", "wall"], &catalog);
  }
}
