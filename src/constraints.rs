/*!

  Layout-level constraints: `MaxQuantity`, `Symmetry`, `PlacementRuleEnforced`,
  `CenteredBearings`. Each has the same dual interface as `PlacementRule` — `check` evaluates
  directly against a (possibly partial) `MultiSequence<Option<usize>>`, `encode` lowers the same
  predicate into the `CpModel` IR — so a new constraint can never accidentally support only one
  backend.

  Partial cells (`None`) never cause a violation in any of the four constraints here: extending
  a valid partial layout can only fail a constraint, never retroactively satisfy one that was
  already failing, which is what lets the backtracking optimiser prune by constraint-checking
  incomplete sequences.

*/

use crate::component::{Catalog, BEARING, INCOMPLETE, WALL};
use crate::cp_model::{CpModel, IdExpr, IntVar};
use crate::errors::Error;
use crate::multi_sequence::MultiSequence;

/// A `MultiSequence` cell during search: `Some(id)` for a filled cell, `None` for an
/// unassigned/empty one.
pub type Cell = Option<usize>;

#[derive(Clone, Debug)]
pub enum Constraint {
  /// No more than `max` cells may be named `target_name`.
  MaxQuantity { target_name: String, max: u32 },

  /// Mirror symmetry on every axis: cell `c` and its mirror `c'` on every axis must share a
  /// name (or either may be empty).
  Symmetry,

  /// Every filled cell's own placement rule must hold, evaluated against the canonical
  /// neighbour name tuple at that cell.
  PlacementRuleEnforced,

  /// 2-D only: the centred `shaft_width x shaft_width` block must be exactly the cells named
  /// `"bearing"`, and no `"bearing"` may appear outside it.
  CenteredBearings { shaft_width: usize },
}

/// The in-block/out-of-block split a 2-D square grid of side `side` induces for a centred
/// `shaft_width` square. Returns `(lo, hi)` inclusive bounds shared by both the row and column
/// axis, since the block is square and axis-aligned.
fn shaft_bounds(side: usize, shaft_width: usize) -> (i64, i64) {
  if side % 2 == 1 {
    let mid = (side as i64 - 1) / 2;
    let r = (shaft_width as i64 - 1) / 2;
    (mid - r, mid + r)
  } else {
    let mid = side as i64 / 2 - 1;
    let r_left = shaft_width as i64 / 2 - 1;
    let r_right = shaft_width as i64 / 2;
    (mid - r_left, mid + r_right)
  }
}

impl Constraint {
  /// Direct evaluation against a (possibly partial) layout. `catalog` resolves cell names.
  pub fn check(&self, layout: &MultiSequence<Cell>, catalog: &Catalog) -> Result<bool, Error> {
    match self {
      Constraint::MaxQuantity { target_name, max } => {
        let count = layout
          .iter()
          .filter_map(|&cell| cell)
          .filter(|&id| catalog.get(id).map(|c| c.name.as_str()) == Ok(target_name.as_str()))
          .count();
        Ok(count as u32 <= *max)
      }

      Constraint::Symmetry => {
        for index in 0..layout.len() {
          let Some(id) = *layout.get(index)? else { continue };
          let coords = layout.int_to_tuple(index);
          for axis in 0..layout.rank() {
            let mut mirrored = coords.clone();
            mirrored[axis] = layout.dims()[axis] - coords[axis] - 1;
            let Some(mirror_id) = *layout.get_tuple(&mirrored)? else { continue };
            if catalog.get(id)?.name != catalog.get(mirror_id)?.name {
              return Ok(false);
            }
          }
        }
        Ok(true)
      }

      Constraint::PlacementRuleEnforced => {
        for index in 0..layout.len() {
          let Some(id) = *layout.get(index)? else { continue };
          let neighbour_names = neighbour_names(layout, catalog, index)?;
          let refs: Vec<&str> = neighbour_names.iter().map(String::as_str).collect();
          if !catalog.get(id)?.placement_rule.evaluate(&refs) {
            return Ok(false);
          }
        }
        Ok(true)
      }

      Constraint::CenteredBearings { shaft_width } => {
        if layout.rank() != 2 {
          return Err(Error::UnsupportedDimension {
            operation: "CenteredBearings",
            required: 2,
            found: layout.rank(),
          });
        }
        let side = layout.dims()[0];
        let (lo, hi) = shaft_bounds(side, *shaft_width);
        for index in 0..layout.len() {
          let Some(id) = *layout.get(index)? else { continue };
          let coords = layout.int_to_tuple(index);
          let (row, col) = (coords[0] as i64, coords[1] as i64);
          let in_block = lo <= row && row <= hi && lo <= col && col <= hi;
          let is_bearing = catalog.get(id)?.name == BEARING;
          if in_block != is_bearing {
            return Ok(false);
          }
        }
        Ok(true)
      }
    }
  }

  /// Lowers the constraint onto the CP-SAT model's `id_vars` (one catalog-index `IntVar` per
  /// cell of `layout_dims`, in the same flat order as a `MultiSequence` buffer).
  pub fn encode(
    &self,
    model: &mut CpModel,
    id_vars: &[IntVar],
    layout_dims: &[usize],
    catalog: &Catalog,
  ) -> Result<(), Error> {
    match self {
      Constraint::MaxQuantity { target_name, max } => {
        let target_id = catalog.id_of(target_name)?;
        let matches: Vec<_> = id_vars
          .iter()
          .map(|&v| model.reify_id_equals(IdExpr::Var(v), Some(target_id)))
          .collect();
        let quantity = model.prefix_sum_bools(&matches);
        let last = *quantity.last().expect("layout has at least one cell");
        model.add_le_const(last, *max as i64);
        Ok(())
      }

      Constraint::Symmetry => {
        let dummy = MultiSequence::new(vec![0usize; id_vars.len()], layout_dims.to_vec())?;
        for index in 0..id_vars.len() {
          let coords = dummy.int_to_tuple(index);
          for axis in 0..layout_dims.len() {
            let mut mirrored = coords.clone();
            mirrored[axis] = layout_dims[axis] - coords[axis] - 1;
            let mirror_index = dummy.tuple_to_int(&mirrored);
            // Each axis posts the pair from both sides; the redundant duplicate is harmless.
            model.add_eq_vars(id_vars[index], id_vars[mirror_index]);
          }
        }
        Ok(())
      }

      Constraint::PlacementRuleEnforced => {
        let names: Vec<String> = catalog.iter().map(|c| c.name.clone()).collect();
        let name_to_id: std::collections::HashMap<String, usize> =
          names.iter().enumerate().map(|(i, n)| (n.clone(), i)).collect();
        let dummy = MultiSequence::new(vec![0usize; id_vars.len()], layout_dims.to_vec())?;

        for index in 0..id_vars.len() {
          let neighbour_ids = neighbour_id_exprs(&dummy, id_vars, index);
          let rule_bools: Vec<_> = catalog
            .iter()
            .map(|comp| comp.placement_rule.to_model(model, &name_to_id, &neighbour_ids))
            .collect();
          model.add_element_bool_eq_1(id_vars[index], rule_bools);
        }
        Ok(())
      }

      Constraint::CenteredBearings { shaft_width } => {
        if layout_dims.len() != 2 {
          return Err(Error::UnsupportedDimension {
            operation: "CenteredBearings",
            required: 2,
            found: layout_dims.len(),
          });
        }
        let bearing_id = catalog.id_of(BEARING)?;
        let side = layout_dims[0];
        let (lo, hi) = shaft_bounds(side, *shaft_width);
        let dummy = MultiSequence::new(vec![0usize; id_vars.len()], layout_dims.to_vec())?;

        for index in 0..id_vars.len() {
          let coords = dummy.int_to_tuple(index);
          let (row, col) = (coords[0] as i64, coords[1] as i64);
          let in_block = lo <= row && row <= hi && lo <= col && col <= hi;
          if in_block {
            model.add_eq_const(id_vars[index], bearing_id as i64);
          } else {
            model.add_neq_const(id_vars[index], bearing_id as i64);
          }
        }
        Ok(())
      }
    }
  }
}

/// The canonical `2*D` neighbour name tuple at `index`, with off-grid neighbours mapped to
/// `"wall"` and unassigned in-grid neighbours mapped to `"incomplete"`.
pub fn neighbour_names(
  layout: &MultiSequence<Cell>,
  catalog: &Catalog,
  index: usize,
) -> Result<Vec<String>, Error> {
  let mut names = Vec::with_capacity(2 * layout.rank());
  for neighbour in layout.neighbour_indices(index) {
    let name = match neighbour {
      None => WALL.to_string(),
      Some(neighbour_index) => match *layout.get(neighbour_index)? {
        None => INCOMPLETE.to_string(),
        Some(id) => catalog.get(id)?.name.clone(),
      },
    };
    names.push(name);
  }
  Ok(names)
}

/// The canonical `2*D` neighbour `IdExpr` tuple at `index` over the flat `id_vars` slice,
/// with off-grid neighbours as the literal wall sentinel.
fn neighbour_id_exprs(shape: &MultiSequence<usize>, id_vars: &[IntVar], index: usize) -> Vec<IdExpr> {
  shape
    .neighbour_indices(index)
    .into_iter()
    .map(|n| match n {
      None => IdExpr::Wall,
      Some(neighbour_index) => IdExpr::Var(id_vars[neighbour_index]),
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::component::Component;
  use crate::placement_rule::PlacementRule;
  use std::collections::HashMap;

  fn catalog() -> Catalog {
    Catalog::new(vec![
      Component::new("bearing", HashMap::new(), PlacementRule::Always),
      Component::new("casing", HashMap::new(), PlacementRule::Always),
      Component::new("magnesium", HashMap::new(), PlacementRule::simple("bearing", 1)),
    ])
  }

  fn layout(cells: Vec<Cell>, dims: Vec<usize>) -> MultiSequence<Cell> {
    MultiSequence::new(cells, dims).unwrap()
  }

  // 5x5 grid, shaft_width=1: the centre is (2,2).
  #[test]
  fn centered_bearings_odd_side_single_cell() {
    let catalog = catalog();
    let mut cells = vec![Some(1); 25]; // all casing
    cells[2 * 5 + 2] = Some(0); // bearing at (2,2)
    let layout = layout(cells, vec![5, 5]);
    let constraint = Constraint::CenteredBearings { shaft_width: 1 };
    assert!(constraint.check(&layout, &catalog).unwrap());
  }

  #[test]
  fn centered_bearings_rejects_off_center_bearing() {
    let catalog = catalog();
    let mut cells = vec![Some(1); 25];
    cells[0] = Some(0); // bearing at a corner, not centre
    let layout = layout(cells, vec![5, 5]);
    let constraint = Constraint::CenteredBearings { shaft_width: 1 };
    assert!(!constraint.check(&layout, &catalog).unwrap());
  }

  // 4x4 grid, shaft_width=2: the block spans rows/cols [1,2].
  #[test]
  fn centered_bearings_even_side_two_by_two_block() {
    let catalog = catalog();
    let mut cells = vec![Some(1); 16];
    for row in 1..=2 {
      for col in 1..=2 {
        cells[row * 4 + col] = Some(0);
      }
    }
    let layout = layout(cells, vec![4, 4]);
    let constraint = Constraint::CenteredBearings { shaft_width: 2 };
    assert!(constraint.check(&layout, &catalog).unwrap());
  }

  #[test]
  fn max_quantity_counts_only_matching_name() {
    let catalog = catalog();
    let layout = layout(vec![Some(0), Some(0), Some(1), None], vec![4]);
    let constraint = Constraint::MaxQuantity { target_name: "bearing".to_string(), max: 2 };
    assert!(constraint.check(&layout, &catalog).unwrap());
    let constraint = Constraint::MaxQuantity { target_name: "bearing".to_string(), max: 1 };
    assert!(!constraint.check(&layout, &catalog).unwrap());
  }

  #[test]
  fn symmetry_requires_mirrored_names_on_every_axis() {
    let catalog = catalog();
    let layout = layout(vec![Some(0), Some(1), Some(1), Some(0)], vec![4]);
    assert!(Constraint::Symmetry.check(&layout, &catalog).unwrap());
    let layout = layout(vec![Some(0), Some(1), Some(0), Some(0)], vec![4]);
    assert!(!Constraint::Symmetry.check(&layout, &catalog).unwrap());
  }

  #[test]
  fn symmetry_skips_empty_cells() {
    let catalog = catalog();
    let layout = layout(vec![Some(0), None, None, Some(1)], vec![4]);
    assert!(Constraint::Symmetry.check(&layout, &catalog).unwrap());
  }

  #[test]
  fn placement_rule_enforced_checks_each_filled_cell() {
    let catalog = catalog();
    // magnesium at index 1 needs a "bearing" neighbour; bearing is at index 0.
    let layout = layout(vec![Some(0), Some(2)], vec![2]);
    assert!(Constraint::PlacementRuleEnforced.check(&layout, &catalog).unwrap());

    let layout = layout(vec![Some(1), Some(2)], vec![2]);
    assert!(!Constraint::PlacementRuleEnforced.check(&layout, &catalog).unwrap());
  }

  #[test]
  fn partial_cells_never_violate_any_constraint() {
    let catalog = catalog();
    let layout = layout(vec![None, None, None, None], vec![4]);
    for constraint in [
      Constraint::MaxQuantity { target_name: "bearing".to_string(), max: 0 },
      Constraint::Symmetry,
      Constraint::PlacementRuleEnforced,
    ] {
      assert!(constraint.check(&layout, &catalog).unwrap());
    }
  }
}
