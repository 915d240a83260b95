/*!

  `CpModel` is this crate's own intermediate representation for a CP-SAT-shaped model: integer
  variables with explicit finite domains, boolean variables, and a fixed vocabulary of
  constraint kinds that mirrors the handful of OR-tools CP-SAT calls a model like this needs
  (`NewIntVar`, `NewBoolVar`, `Add`, `AddMultiplicationEquality`, `AddDivisionEquality`,
  `AddElement`, `AddBoolAnd`/`AddBoolOr`, `OnlyEnforceIf`, `Maximize`). `PlacementRule::to_model`
  and every `Constraint::encode` build one of these; a `SolverBackend` then actually solves it.

  Every reification (`reify_*`) mints a fresh boolean, records the IR node relating it to its
  inputs, and returns its handle — callers never see raw `model.Add(...).OnlyEnforceIf(...)`
  calls. Each constraint posts its structure once through this narrow API rather than leaving
  callers to hand-reify booleans inconsistently at each call site.

  Unique variable identifiers are a per-model monotonic counter rather than generated UUIDs —
  there is no need for global uniqueness outside one model's lifetime.

*/

use crate::errors::Error;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct IntVar(pub(crate) usize);

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct BoolVar(pub(crate) usize);

/// An expression identifying one neighbour's catalog-id variable, or the literal wall
/// sentinel (never equal to any valid catalog id).
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum IdExpr {
  Var(IntVar),
  Wall,
}

#[derive(Clone, Debug)]
struct IntVarInfo {
  label: String,
  lo: i64,
  hi: i64,
}

#[derive(Clone, Debug)]
struct BoolVarInfo {
  label: String,
}

/// One posted piece of model structure. `CpModel::constraints` is append-only; a
/// `SolverBackend` walks it once at solve time.
#[derive(Clone, Debug)]
pub enum Constraint {
  FixBool { var: BoolVar, value: bool },
  /// `result <=> (id == target)`. `id == Wall` or `target == None` (unknown name) forces
  /// `result` false.
  IdEquals { id: IdExpr, target: Option<i64>, result: BoolVar },
  /// `outputs[i] = outputs[i-1] + inputs[i]` (bools coerced to 0/1), `outputs[0]`'s predecessor is 0.
  PrefixSum { inputs: Vec<BoolVar>, outputs: Vec<IntVar> },
  /// `result <=> (var == value)`.
  IntEq { var: IntVar, value: i64, result: BoolVar },
  /// `result <=> (var >= value)`.
  IntGe { var: IntVar, value: i64, result: BoolVar },
  /// `result <=> AND(inputs)`.
  BoolAnd { inputs: Vec<BoolVar>, result: BoolVar },
  /// `result <=> OR(inputs)`.
  BoolOr { inputs: Vec<BoolVar>, result: BoolVar },
  /// Hard: `a == b`.
  EqVars { a: IntVar, b: IntVar },
  /// Hard: `var == value`.
  EqConst { var: IntVar, value: i64 },
  /// Hard: `var != value`.
  NeqConst { var: IntVar, value: i64 },
  /// Hard: `var <= value`.
  LeConst { var: IntVar, value: i64 },
  /// Hard: `array[selector] == 1` (`AddElement(selector, array) == 1`).
  ElementBoolEq1 { selector: IntVar, array: Vec<BoolVar> },
  /// Hard: `result = array[selector]` (`AddElement(selector, array, result)`).
  ElementEquals { selector: IntVar, array: Vec<IntVar>, result: IntVar },
  /// Hard: `result = sum(inputs)` (`Add`).
  IntSum { inputs: Vec<IntVar>, result: IntVar },
  /// Hard: `result = if cond { if_true } else { if_false }`.
  Select { cond: BoolVar, if_true: IntVar, if_false: IntVar, result: IntVar },
  /// Hard: `target = (a * b) / 10^scaling_factor` (`ScaledOps::scaled_mul`).
  ScaledMul { target: IntVar, a: IntVar, b: IntVar, scaling_factor: u32 },
  /// Hard: `target = (num * 10^scaling_factor) / denom` (`ScaledOps::scaled_div`).
  ScaledDiv { target: IntVar, num: IntVar, denom: IntVar, scaling_factor: u32 },
}

#[derive(Clone, Debug, Default)]
pub struct CpModel {
  int_vars: Vec<IntVarInfo>,
  bool_vars: Vec<BoolVarInfo>,
  constraints: Vec<Constraint>,
  objective: Option<IntVar>,
}

impl CpModel {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn new_int_var(&mut self, lo: i64, hi: i64, label: impl Into<String>) -> IntVar {
    self.int_vars.push(IntVarInfo { label: label.into(), lo, hi });
    IntVar(self.int_vars.len() - 1)
  }

  pub fn new_bool_var(&mut self, label: impl Into<String>) -> BoolVar {
    self.bool_vars.push(BoolVarInfo { label: label.into() });
    BoolVar(self.bool_vars.len() - 1)
  }

  pub fn fix_bool(&mut self, var: BoolVar, value: bool) {
    self.constraints.push(Constraint::FixBool { var, value });
  }

  pub fn add_eq_vars(&mut self, a: IntVar, b: IntVar) {
    self.constraints.push(Constraint::EqVars { a, b });
  }

  pub fn add_eq_const(&mut self, var: IntVar, value: i64) {
    self.constraints.push(Constraint::EqConst { var, value });
  }

  pub fn add_neq_const(&mut self, var: IntVar, value: i64) {
    self.constraints.push(Constraint::NeqConst { var, value });
  }

  pub fn add_le_const(&mut self, var: IntVar, value: i64) {
    self.constraints.push(Constraint::LeConst { var, value });
  }

  /// `AddElement(selector, array) == 1`: the array entry the selector picks out must be true.
  pub fn add_element_bool_eq_1(&mut self, selector: IntVar, array: Vec<BoolVar>) {
    self.constraints.push(Constraint::ElementBoolEq1 { selector, array });
  }

  /// `AddElement(selector, array, result)`: mints a fresh variable constrained to equal the
  /// array entry the selector picks out. `array` is indexed starting at `selector`'s lower
  /// bound, so a selector with domain `[0, n-1]` over an `n`-entry array (the only shape this
  /// crate ever builds) indexes it directly.
  pub fn element_equals(&mut self, selector: IntVar, array: Vec<IntVar>, label: impl Into<String>) -> IntVar {
    let (lo, hi) = array
      .iter()
      .map(|&v| self.int_var_bounds(v))
      .fold((i64::MAX, i64::MIN), |(lo, hi), (l, h)| (lo.min(l), hi.max(h)));
    let result = self.new_int_var(lo, hi, label);
    self.constraints.push(Constraint::ElementEquals { selector, array, result });
    result
  }

  /// `result = sum(inputs)`. Mints a fresh variable wide enough to hold the sum.
  pub fn sum_ints(&mut self, inputs: &[IntVar], label: impl Into<String>) -> IntVar {
    let (lo, hi) = inputs.iter().fold((0i64, 0i64), |(lo, hi), &v| {
      let (l, h) = self.int_var_bounds(v);
      (lo + l, hi + h)
    });
    let result = self.new_int_var(lo, hi, label);
    self.constraints.push(Constraint::IntSum { inputs: inputs.to_vec(), result });
    result
  }

  /// `result = if cond { if_true } else { if_false }`.
  pub fn select(&mut self, cond: BoolVar, if_true: IntVar, if_false: IntVar, label: impl Into<String>) -> IntVar {
    let (t_lo, t_hi) = self.int_var_bounds(if_true);
    let (f_lo, f_hi) = self.int_var_bounds(if_false);
    let result = self.new_int_var(t_lo.min(f_lo), t_hi.max(f_hi), label);
    self.constraints.push(Constraint::Select { cond, if_true, if_false, result });
    result
  }

  pub fn reify_id_equals(&mut self, id: IdExpr, target: Option<usize>) -> BoolVar {
    let result = self.new_bool_var("id_equals");
    self.constraints.push(Constraint::IdEquals { id, target: target.map(|t| t as i64), result });
    result
  }

  pub fn reify_int_eq(&mut self, var: IntVar, value: i64) -> BoolVar {
    let result = self.new_bool_var("int_eq");
    self.constraints.push(Constraint::IntEq { var, value, result });
    result
  }

  pub fn reify_int_ge(&mut self, var: IntVar, value: i64) -> BoolVar {
    let result = self.new_bool_var("int_ge");
    self.constraints.push(Constraint::IntGe { var, value, result });
    result
  }

  pub fn reify_and(&mut self, inputs: &[BoolVar]) -> BoolVar {
    let result = self.new_bool_var("bool_and");
    self.constraints.push(Constraint::BoolAnd { inputs: inputs.to_vec(), result });
    result
  }

  pub fn reify_or(&mut self, inputs: &[BoolVar]) -> BoolVar {
    let result = self.new_bool_var("bool_or");
    self.constraints.push(Constraint::BoolOr { inputs: inputs.to_vec(), result });
    result
  }

  /// A running prefix sum of booleans-as-0/1, one output int var per input, each bounded
  /// `[0, inputs.len()]`.
  pub fn prefix_sum_bools(&mut self, inputs: &[BoolVar]) -> Vec<IntVar> {
    let outputs: Vec<IntVar> =
      (0..inputs.len()).map(|_| self.new_int_var(0, inputs.len() as i64, "prefix_sum")).collect();
    self.constraints.push(Constraint::PrefixSum { inputs: inputs.to_vec(), outputs: outputs.clone() });
    outputs
  }

  pub fn scaled_mul(&mut self, target: IntVar, a: IntVar, b: IntVar, scaling_factor: u32) {
    self.constraints.push(Constraint::ScaledMul { target, a, b, scaling_factor });
  }

  pub fn scaled_div(&mut self, target: IntVar, num: IntVar, denom: IntVar, scaling_factor: u32) {
    self.constraints.push(Constraint::ScaledDiv { target, num, denom, scaling_factor });
  }

  pub fn maximize(&mut self, var: IntVar) {
    self.objective = Some(var);
  }

  pub fn objective(&self) -> Option<IntVar> {
    self.objective
  }

  pub fn int_var_bounds(&self, var: IntVar) -> (i64, i64) {
    let info = &self.int_vars[var.0];
    (info.lo, info.hi)
  }

  pub fn int_var_count(&self) -> usize {
    self.int_vars.len()
  }

  pub fn bool_var_count(&self) -> usize {
    self.bool_vars.len()
  }

  pub fn constraints(&self) -> &[Constraint] {
    &self.constraints
  }
}

/// A concrete assignment to every variable minted in a `CpModel`.
#[derive(Clone, Debug)]
pub struct Solution {
  pub int_values: Vec<i64>,
  pub bool_values: Vec<bool>,
}

impl Solution {
  pub fn int_value(&self, var: IntVar) -> i64 {
    self.int_values[var.0]
  }

  pub fn bool_value(&self, var: BoolVar) -> bool {
    self.bool_values[var.0]
  }
}

/// The external CP-SAT-equivalent solver collaborator; any equivalent CP solver can sit behind
/// this trait. Submitting a model that has no feasible assignment, or calling `solve` when no
/// backend is compiled in, surfaces `Error::SolverUnavailable` or `Error::Infeasible`.
pub trait SolverBackend {
  fn solve(&self, model: &CpModel) -> Result<Solution, Error>;
}

/// Brute-force backend used only by this crate's own test suite to check that direct rule
/// evaluation agrees with the lowered CP-SAT model: it enumerates every assignment to every
/// variable over its declared domain and picks the first that satisfies every constraint,
/// ignoring the objective. Only tractable for the handful of variables a single rule's
/// lowering mints, which is exactly its job here.
#[cfg(test)]
pub(crate) struct ReferenceBackend;

#[cfg(test)]
impl ReferenceBackend {
  fn satisfies(model: &CpModel, ints: &[i64], bools: &[bool]) -> bool {
    let int_val = |v: IntVar| ints[v.0];
    let bool_val = |v: BoolVar| bools[v.0];
    let id_val = |id: IdExpr| -> Option<i64> {
      match id {
        IdExpr::Wall => None,
        IdExpr::Var(v) => Some(int_val(v)),
      }
    };

    for c in model.constraints() {
      let ok = match c {
        Constraint::FixBool { var, value } => bool_val(*var) == *value,
        Constraint::IdEquals { id, target, result } => {
          let matches = match (id_val(*id), target) {
            (Some(v), Some(t)) => v == *t,
            _ => false,
          };
          bool_val(*result) == matches
        }
        Constraint::PrefixSum { inputs, outputs } => {
          let mut running = 0i64;
          outputs.iter().zip(inputs.iter()).all(|(out, inp)| {
            running += bool_val(*inp) as i64;
            int_val(*out) == running
          })
        }
        Constraint::IntEq { var, value, result } => bool_val(*result) == (int_val(*var) == *value),
        Constraint::IntGe { var, value, result } => bool_val(*result) == (int_val(*var) >= *value),
        Constraint::BoolAnd { inputs, result } => {
          bool_val(*result) == inputs.iter().all(|b| bool_val(*b))
        }
        Constraint::BoolOr { inputs, result } => bool_val(*result) == inputs.iter().any(|b| bool_val(*b)),
        Constraint::EqVars { a, b } => int_val(*a) == int_val(*b),
        Constraint::EqConst { var, value } => int_val(*var) == *value,
        Constraint::NeqConst { var, value } => int_val(*var) != *value,
        Constraint::LeConst { var, value } => int_val(*var) <= *value,
        Constraint::ElementBoolEq1 { selector, array } => {
          let idx = int_val(*selector);
          idx >= 0 && (idx as usize) < array.len() && bool_val(array[idx as usize])
        }
        Constraint::ElementEquals { selector, array, result } => {
          let idx = int_val(*selector);
          idx >= 0 && (idx as usize) < array.len() && int_val(*result) == int_val(array[idx as usize])
        }
        Constraint::IntSum { inputs, result } => {
          int_val(*result) == inputs.iter().map(|&v| int_val(v)).sum::<i64>()
        }
        Constraint::Select { cond, if_true, if_false, result } => {
          int_val(*result) == if bool_val(*cond) { int_val(*if_true) } else { int_val(*if_false) }
        }
        Constraint::ScaledMul { target, a, b, scaling_factor } => {
          let scale = 10i64.pow(*scaling_factor);
          int_val(*target) == (int_val(*a) * int_val(*b)) / scale
        }
        Constraint::ScaledDiv { target, num, denom, scaling_factor } => {
          let scale = 10i64.pow(*scaling_factor);
          int_val(*denom) != 0 && int_val(*target) == (int_val(*num) * scale) / int_val(*denom)
        }
      };
      if !ok {
        return false;
      }
    }
    true
  }
}

#[cfg(test)]
impl SolverBackend for ReferenceBackend {
  fn solve(&self, model: &CpModel) -> Result<Solution, Error> {
    let int_domains: Vec<(i64, i64)> = (0..model.int_var_count())
      .map(|i| (model.int_vars[i].lo, model.int_vars[i].hi))
      .collect();
    let n_bools = model.bool_var_count();

    let mut ints = vec![0i64; int_domains.len()];
    let mut bools = vec![false; n_bools];

    fn recurse(
      model: &CpModel,
      domains: &[(i64, i64)],
      index: usize,
      ints: &mut Vec<i64>,
      bools: &mut Vec<bool>,
      n_bools: usize,
    ) -> bool {
      if index == domains.len() {
        return try_all_bools(model, ints, bools, 0, n_bools);
      }
      let (lo, hi) = domains[index];
      for v in lo..=hi {
        ints[index] = v;
        if recurse(model, domains, index + 1, ints, bools, n_bools) {
          return true;
        }
      }
      false
    }

    fn try_all_bools(model: &CpModel, ints: &mut Vec<i64>, bools: &mut Vec<bool>, index: usize, n: usize) -> bool {
      if index == n {
        return ReferenceBackend::satisfies(model, ints, bools);
      }
      for v in [false, true] {
        bools[index] = v;
        if try_all_bools(model, ints, bools, index + 1, n) {
          return true;
        }
      }
      false
    }

    if recurse(model, &int_domains, 0, &mut ints, &mut bools, n_bools) {
      Ok(Solution { int_values: ints, bool_values: bools })
    } else {
      Err(Error::Infeasible)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn variable_ids_are_a_monotonic_counter() {
    let mut model = CpModel::new();
    let a = model.new_int_var(0, 5, "a");
    let b = model.new_int_var(0, 5, "b");
    assert_ne!(a, b);
    assert_eq!(model.int_var_count(), 2);
  }

  #[test]
  fn reification_appends_exactly_one_constraint_and_one_bool_var() {
    let mut model = CpModel::new();
    let v = model.new_int_var(0, 3, "v");
    let before = (model.bool_var_count(), model.constraints().len());
    model.reify_int_eq(v, 2);
    assert_eq!(model.bool_var_count(), before.0 + 1);
    assert_eq!(model.constraints().len(), before.1 + 1);
  }
}
