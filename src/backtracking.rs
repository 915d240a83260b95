/*!

  The lexicographic backtracking optimiser: a generator over partial integer sequences of
  fixed `length`, each cell in `[1, max_value]` with `0` meaning "unassigned" (a distinct
  sentinel from the `-1`/`None` used elsewhere in the crate; the optimiser maps assigned value
  `v` to catalog index `v - 1` only at the boundary where it builds a `MultiSequence<Cell>` to
  hand to a `Constraint::check`).

  The five-operation state machine (`advance`, `next_row`, `prev_row`, `next_sequence`,
  `next_valid_sequence`) is a direct, generalized port of
  `original_source/optimizer.py::OptimizableSequence` — generalized from a 1-D `list[int]` to
  an n-D layout by deferring validity entirely to the `Constraint` library (the Python source
  inlines its own ad hoc constraint closures; here the same five transitions drive whatever
  constraint set a domain adapter supplies). `SearchConfig` collects the handful of knobs this
  optimiser actually reads, rather than pre-declaring every parameter a future caller might
  conceivably want.

*/

use crate::component::Catalog;
use crate::constraints::{Cell, Constraint};
use crate::data_structures::{ExponentialMovingAverage, Statistic, Statistics};
use crate::errors::Error;
use crate::log::log_at_level;
use crate::multi_sequence::MultiSequence;
use crate::{log_assert, trace};

/// Knobs for one optimisation run. Only grows fields that are actually read somewhere, rather
/// than pre-declaring a parameter surface ahead of need.
#[derive(Copy, Clone, Debug)]
pub struct SearchConfig {
  /// An optional hard ceiling on how many partial states `next_valid_sequence` may visit
  /// before giving up. `None` means unbounded (search until the space is exhausted). Gives the
  /// backtracker a cancellation lever equivalent to an external timeout on the CP-SAT path.
  pub max_states_explored: Option<u64>,

  /// The fixed-point scaling factor forwarded to `ScaledOps` by the CP-SAT path; carried here
  /// too so one `SearchConfig` configures either optimiser a domain adapter chooses.
  pub scaling_factor: u32,
}

impl Default for SearchConfig {
  fn default() -> Self {
    SearchConfig { max_states_explored: None, scaling_factor: 4 }
  }
}

/// A flat integer sequence under backtracking search: `0` is unassigned, `v` in `[1,
/// max_value]` is catalog index `v - 1`. `dims` is the shape the flat sequence is interpreted
/// under when constraints are checked (a 1-D rotor of length `dims[0]`, or a square 2-D grid).
///
/// Owns its `Catalog` and `Constraint` list (both cheap to clone at the sizes this crate deals
/// in) rather than borrowing them, so that a domain adapter's `design_*` function can return a
/// self-contained streaming iterator without fighting the borrow checker over a reference that
/// would otherwise have to outlive the function call.
pub struct BacktrackingOptimiser {
  dims: Vec<usize>,
  max_value: usize,
  constraints: Vec<Constraint>,
  catalog: Catalog,
  sequence: Vec<u32>,
  config: SearchConfig,
  states_explored: u64,
  /// Running average of how many cells are assigned whenever `next_valid_sequence` lands on a
  /// valid state.
  depth_ema: ExponentialMovingAverage,
}

impl BacktrackingOptimiser {
  pub fn new(dims: Vec<usize>, catalog: Catalog, constraints: Vec<Constraint>, config: SearchConfig) -> Self {
    let length: usize = dims.iter().product();
    BacktrackingOptimiser {
      dims,
      max_value: catalog.len(),
      constraints,
      catalog,
      sequence: vec![0; length],
      config,
      states_explored: 0,
      depth_ema: ExponentialMovingAverage::new(0.05),
    }
  }

  pub fn length(&self) -> usize {
    self.sequence.len()
  }

  /// A snapshot of this run's search statistics: states explored so far and the moving average
  /// of assigned-cell depth across valid states visited.
  pub fn statistics(&self) -> Statistics {
    let mut stats = Statistics::new();
    stats.insert("states_explored", Statistic::from(self.states_explored as usize));
    stats.insert("depth_ema", Statistic::from(self.depth_ema.mean()));
    stats
  }

  fn to_cells(&self) -> Vec<Cell> {
    self.sequence.iter().map(|&v| if v == 0 { None } else { Some(v as usize - 1) }).collect()
  }

  fn to_layout(&self) -> Result<MultiSequence<Cell>, Error> {
    MultiSequence::new(self.to_cells(), self.dims.clone())
  }

  /// Validity = every constraint holds on the (possibly partial) sequence.
  pub fn is_valid(&self) -> Result<bool, Error> {
    let layout = self.to_layout()?;
    for constraint in &self.constraints {
      if !constraint.check(&layout, &self.catalog)? {
        return Ok(false);
      }
    }
    Ok(true)
  }

  /// Completeness = no zero entries.
  pub fn is_complete(&self) -> bool {
    self.sequence.iter().all(|&v| v != 0)
  }

  /// Decodes the current complete sequence into catalog indices, `0`-based.
  pub fn decode(&self) -> Option<Vec<usize>> {
    if !self.is_complete() {
      return None;
    }
    Some(self.sequence.iter().map(|&v| v as usize - 1).collect())
  }

  /// Finds the rightmost assigned cell; if its value is below `max_value`, increments it.
  fn advance(&mut self) -> bool {
    for i in (0..self.sequence.len()).rev() {
      if self.sequence[i] != 0 {
        if self.sequence[i] as usize == self.max_value {
          return false;
        }
        self.sequence[i] += 1;
        trace!("backtracking", eprintln!("advance: cell {} -> {}", i, self.sequence[i]));
        return true;
      }
    }
    false
  }

  /// Finds the leftmost unassigned cell and assigns it `1`.
  fn next_row(&mut self) -> bool {
    for i in 0..self.sequence.len() {
      if self.sequence[i] == 0 {
        self.sequence[i] = 1;
        trace!("backtracking", eprintln!("next_row: cell {} -> 1", i));
        return true;
      }
    }
    false
  }

  /// Unassigns the rightmost assigned cell, then tries `advance` on the resulting prefix,
  /// recursing on failure.
  fn prev_row(&mut self) -> bool {
    for i in (0..self.sequence.len()).rev() {
      if self.sequence[i] != 0 {
        self.sequence[i] = 0;
        trace!("backtracking", eprintln!("prev_row: cell {} -> 0", i));
        return if self.advance() { true } else { self.prev_row() };
      }
    }
    false
  }

  /// If the current state is valid, tries `next_row`, then `advance`, then `prev_row`. If
  /// invalid, tries `advance`, then `prev_row` (aggressive pruning: an invalid prefix is never
  /// extended by `next_row`).
  fn next_sequence(&mut self) -> Result<bool, Error> {
    if self.is_valid()? {
      Ok(self.next_row() || self.advance() || self.prev_row())
    } else {
      Ok(self.advance() || self.prev_row())
    }
  }

  /// Repeatedly advances until a valid (possibly partial) state is reached, or the search
  /// space is exhausted (or `max_states_explored` is hit, surfaced as `Error::Infeasible`).
  pub fn next_valid_sequence(&mut self) -> Result<bool, Error> {
    loop {
      if let Some(limit) = self.config.max_states_explored {
        if self.states_explored >= limit {
          return Err(Error::Infeasible);
        }
      }
      self.states_explored += 1;
      log_assert!(self.states_explored > 0);

      if !self.next_sequence()? {
        return Ok(false);
      }
      if self.is_valid()? {
        let depth = self.sequence.iter().filter(|&&v| v != 0).count();
        self.depth_ema.update(depth as f64);
        return Ok(true);
      }
    }
  }

  /// Runs the search to exhaustion, returning the best-scoring complete valid layout found,
  /// or `Error::Infeasible` if none exists.
  pub fn optimise(&mut self, scoring: impl Fn(&[usize]) -> f64) -> Result<(Vec<usize>, f64), Error> {
    let mut best: Option<(Vec<usize>, f64)> = None;
    while self.next_valid_sequence()? {
      if let Some(ids) = self.decode() {
        let score = scoring(&ids);
        if best.as_ref().map_or(true, |(_, best_score)| score > *best_score) {
          best = Some((ids, score));
        }
      }
    }
    best.ok_or(Error::Infeasible)
  }
}

/// A pull-based, non-restartable stream of strictly improving complete layouts. The caller
/// advances it (via `Iterator::next`) step by step and may stop pulling at any time;
/// cancellation is simply ceasing to pull. Terminates without yielding anything when the
/// search space contains no complete valid layout: an empty stream, not a propagated error,
/// since per-cell search has no other way to fail.
pub struct ImprovingLayouts<F: Fn(&[usize]) -> f64> {
  optimiser: BacktrackingOptimiser,
  scoring: F,
  best_score: Option<f64>,
  exhausted: bool,
}

impl<F: Fn(&[usize]) -> f64> ImprovingLayouts<F> {
  pub fn new(optimiser: BacktrackingOptimiser, scoring: F) -> Self {
    ImprovingLayouts { optimiser, scoring, best_score: None, exhausted: false }
  }
}

impl<F: Fn(&[usize]) -> f64> Iterator for ImprovingLayouts<F> {
  type Item = (Vec<usize>, f64);

  fn next(&mut self) -> Option<Self::Item> {
    if self.exhausted {
      return None;
    }
    loop {
      match self.optimiser.next_valid_sequence() {
        Err(_) => {
          self.exhausted = true;
          return None;
        }
        Ok(false) => {
          self.exhausted = true;
          return None;
        }
        Ok(true) => {
          if let Some(ids) = self.optimiser.decode() {
            let score = (self.scoring)(&ids);
            if self.best_score.map_or(true, |best| score > best) {
              self.best_score = Some(score);
              log_at_level(1, &format!("improving layout found, score {}", score));
              return Some((ids, score));
            }
          }
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::component::Component;
  use crate::placement_rule::PlacementRule;
  use std::collections::HashMap;

  fn unconstrained_catalog(names: &[&str]) -> Catalog {
    Catalog::new(names.iter().map(|&n| Component::new(n, HashMap::new(), PlacementRule::Always)).collect())
  }

  #[test]
  fn enumerates_every_complete_sequence_exactly_once_lexicographically() {
    let catalog = unconstrained_catalog(&["a", "b"]);
    let constraints: Vec<Constraint> = vec![];
    let mut optimiser = BacktrackingOptimiser::new(vec![2], catalog, constraints, SearchConfig::default());

    let mut seen = vec![];
    while optimiser.next_valid_sequence().unwrap() {
      if let Some(ids) = optimiser.decode() {
        seen.push(ids);
      }
    }
    // 2 positions, 2 catalog entries: exactly 4 complete sequences, in lex order.
    assert_eq!(seen, vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
  }

  #[test]
  fn max_quantity_pruning_excludes_violating_sequences() {
    let catalog = unconstrained_catalog(&["a", "b"]);
    let constraints = vec![Constraint::MaxQuantity { target_name: "a".to_string(), max: 1 }];
    let mut optimiser = BacktrackingOptimiser::new(vec![2], catalog, constraints, SearchConfig::default());

    let mut seen = vec![];
    while optimiser.next_valid_sequence().unwrap() {
      if let Some(ids) = optimiser.decode() {
        seen.push(ids);
      }
    }
    assert!(!seen.contains(&vec![0, 0]));
    assert_eq!(seen, vec![vec![0, 1], vec![1, 0], vec![1, 1]]);
  }

  #[test]
  fn optimise_picks_highest_scoring_complete_sequence() {
    let catalog = unconstrained_catalog(&["a", "b", "c"]);
    let constraints: Vec<Constraint> = vec![];
    let mut optimiser = BacktrackingOptimiser::new(vec![1], catalog, constraints, SearchConfig::default());

    let (ids, score) = optimiser.optimise(|ids| ids[0] as f64).unwrap();
    assert_eq!(ids, vec![2]);
    assert_eq!(score, 2.0);
  }

  #[test]
  fn infeasible_when_no_valid_complete_layout_exists() {
    let catalog = unconstrained_catalog(&["a"]);
    // Impossible: at most 0 of "a" allowed, but the only catalog entry is "a".
    let constraints = vec![Constraint::MaxQuantity { target_name: "a".to_string(), max: 0 }];
    let mut optimiser = BacktrackingOptimiser::new(vec![1], catalog, constraints, SearchConfig::default());
    assert!(matches!(optimiser.optimise(|_| 0.0), Err(Error::Infeasible)));
  }

  #[test]
  fn streaming_iterator_yields_only_strictly_improving_scores() {
    let catalog = unconstrained_catalog(&["a", "b", "c"]);
    let constraints: Vec<Constraint> = vec![];
    let optimiser = BacktrackingOptimiser::new(vec![1], catalog, constraints, SearchConfig::default());
    let stream = ImprovingLayouts::new(optimiser, |ids| ids[0] as f64);

    let scores: Vec<f64> = stream.map(|(_, score)| score).collect();
    assert_eq!(scores, vec![0.0, 1.0, 2.0]);
  }
}
