/*!

Minimal Exponential Moving Average using the same aging schedule as z3: `beta` starts at 1
(the average tracks its input exactly) and is halved on a geometrically lengthening schedule
until it settles at `alpha`. Used here as the backtracking optimiser's running average of
search depth.

 */

use crate::verify;
use std::fmt::{Display, Formatter};

pub type EMA = ExponentialMovingAverage;

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct ExponentialMovingAverage {
  alpha : f64,
  beta  : f64,
  value : f64,
  period: u32,
  wait  : u32,
}

impl Display for ExponentialMovingAverage {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    self.value.fmt(f)
  }
}

impl ExponentialMovingAverage {
  #[cfg(feature = "debug")]
  pub fn invariant(&self) -> bool {
    0f64 <= self.alpha && self.alpha <= self.beta && self.beta <= 1f64
  }

  pub fn new(alpha: f64) -> Self {
    #[cfg(feature = "debug")]
    verify!(0f64 <= alpha && alpha <= 1f64);

    ExponentialMovingAverage { alpha, beta: 1f64, value: 0f64, period: 0u32, wait: 0u32 }
  }

  pub fn set_alpha(&mut self, alpha: f64) {
    self.alpha = alpha;

    #[cfg(feature = "debug")]
    verify!(0f64 <= self.alpha && self.alpha <= 1f64);
  }

  pub fn update(&mut self, value: f64) {
    self.value += self.beta * (value - self.value);

    if self.beta <= self.alpha {
      return;
    }

    if self.wait > 0 {
      self.wait -= 1;
      return;
    }

    self.period = 2 * (self.period + 1) - 1;
    self.wait = self.period;
    self.beta *= 0.5;

    if self.beta < self.alpha {
      self.beta = self.alpha;
    }
  }

  pub fn set_value(&mut self, value: f64) {
    self.value = value;
  }

  pub fn mean(&self) -> f64 {
    self.value
  }

}

impl Default for ExponentialMovingAverage {
  fn default() -> Self {
    ExponentialMovingAverage::new(0f64)
  }
}

impl From<EMA> for f64 {
  fn from(ema: EMA) -> Self {
    ema.value
  }
}
