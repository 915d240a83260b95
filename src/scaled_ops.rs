/*!

  Fixed-point multiply/divide helpers that let the CP-SAT encoder approximate rational
  arithmetic with integer variables. A numeric value `v` is represented as the integer
  `floor(v * 10^scaling_factor)`; `scaled_mul`/`scaled_div` each mint one auxiliary wide-range
  variable, bounded `[-2^31, 2^31-1]` as in `core/scaled_ops.py`, and post the two `CpModel`
  constraints needed to express the scaled operation.

  Kept as a thin domain-facing wrapper over `CpModel::scaled_mul`/`scaled_div` rather than
  inlining those two constraint kinds directly at every call site, matching
  `core/scaled_ops.py`'s own shape: a small stateful helper carrying just the scaling factor.

*/

use crate::cp_model::{CpModel, IntVar};

const WIDE_LO: i64 = -(1i64 << 31);
const WIDE_HI: i64 = (1i64 << 31) - 1;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct ScaledOps {
  scaling_factor: u32,
}

impl ScaledOps {
  pub fn new(scaling_factor: u32) -> Self {
    ScaledOps { scaling_factor }
  }

  pub fn scaling_factor(&self) -> u32 {
    self.scaling_factor
  }

  /// The integer scale `10^scaling_factor` used to represent fixed-point values.
  pub fn scale(&self) -> i64 {
    10i64.pow(self.scaling_factor)
  }

  /// `value` scaled into this representation's fixed-point integer domain.
  pub fn encode(&self, value: f64) -> i64 {
    (value * self.scale() as f64).floor() as i64
  }

  /// `value` decoded back out of this representation's fixed-point integer domain.
  pub fn decode(&self, value: i64) -> f64 {
    value as f64 / self.scale() as f64
  }

  /// Posts `target = (a * b) / 10^scaling_factor`, via one wide auxiliary variable.
  pub fn scaled_mul(&self, model: &mut CpModel, target: IntVar, a: IntVar, b: IntVar) {
    model.scaled_mul(target, a, b, self.scaling_factor);
  }

  /// Posts `target = (num * 10^scaling_factor) / denom`, via one wide auxiliary variable.
  pub fn scaled_div(&self, model: &mut CpModel, target: IntVar, num: IntVar, denom: IntVar) {
    model.scaled_div(target, num, denom, self.scaling_factor);
  }

  /// A fresh wide-range auxiliary variable, `[-2^31, 2^31-1]`, for intermediate products.
  pub fn new_wide_var(&self, model: &mut CpModel, label: impl Into<String>) -> IntVar {
    model.new_int_var(WIDE_LO, WIDE_HI, label)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cp_model::{ReferenceBackend, Solution, SolverBackend};

  #[test]
  fn encode_decode_roundtrips_to_scale() {
    let ops = ScaledOps::new(2);
    assert_eq!(ops.scale(), 100);
    assert_eq!(ops.encode(1.23), 123);
    assert!((ops.decode(123) - 1.23).abs() < 1e-9);
  }

  #[test]
  fn scaled_mul_matches_direct_computation() {
    let ops = ScaledOps::new(1);
    let mut model = CpModel::new();
    let a = model.new_int_var(ops.encode(2.0), ops.encode(2.0), "a");
    let b = model.new_int_var(ops.encode(3.0), ops.encode(3.0), "b");
    let target = ops.new_wide_var(&mut model, "target");
    ops.scaled_mul(&mut model, target, a, b);
    model.maximize(target);

    let solution: Solution = ReferenceBackend.solve(&model).unwrap();
    // (20 * 30) / 10 = 60, i.e. 6.0 at scale 1.
    assert_eq!(solution.int_value(target), 60);
  }

  #[test]
  fn scaled_div_matches_direct_computation() {
    let ops = ScaledOps::new(1);
    let mut model = CpModel::new();
    let num = model.new_int_var(ops.encode(9.0), ops.encode(9.0), "num");
    let denom = model.new_int_var(ops.encode(2.0), ops.encode(2.0), "denom");
    let target = ops.new_wide_var(&mut model, "target");
    ops.scaled_div(&mut model, target, num, denom);
    model.maximize(target);

    let solution: Solution = ReferenceBackend.solve(&model).unwrap();
    // (90 * 10) / 20 = 45, i.e. 4.5 at scale 1.
    assert_eq!(solution.int_value(target), 45);
  }
}
