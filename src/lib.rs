
/*!

  A constrained combinatorial layout engine for NuclearCraft: Overhauled turbine
  subassemblies: one-dimensional rotor blade sequences and two-dimensional dynamo coil grids.

  The core is domain-agnostic: an n-dimensional [`MultiSequence`], an algebraic
  [`PlacementRule`] with a dual direct-evaluate/CP-SAT-lower interface, a small library of
  layout [`Constraint`]s sharing that same dual interface, and two search strategies —
  [`BacktrackingOptimiser`] (the primary path) and the CP-SAT submission path in
  `cp_optimizer` — over the same rule/constraint vocabulary. `rotor_blade` and `dynamo_coil` are
  thin domain adapters: a component catalog, a scoring function, and a few lines wiring the
  always-on constraints for their shape.

*/

mod errors;
mod log;
mod symbol_table;
mod multi_sequence;
mod component;
mod placement_rule;
mod constraints;
mod scaled_ops;
mod cp_model;
mod solver_backend;
mod backtracking;
mod cp_optimizer;
mod data_structures;
mod rotor_blade;
mod dynamo_coil;

pub use component::{Catalog, Component};
pub use constraints::Constraint;
pub use cp_model::{BoolVar, CpModel, IdExpr, IntVar, Solution, SolverBackend};
pub use cp_optimizer::CpObjective;
pub use errors::Error;
pub use multi_sequence::MultiSequence;
pub use placement_rule::{LogicMode, PlacementRule};
pub use scaled_ops::ScaledOps;
pub use solver_backend::GoodLpBackend;

pub use backtracking::{BacktrackingOptimiser, ImprovingLayouts, SearchConfig};

pub use data_structures::{ExponentialMovingAverage, Statistic, Statistics, EMA};

pub use dynamo_coil::{design_dynamo_coils, standard_dynamo_coils, DynamoCoilCpObjective};
pub use rotor_blade::{design_rotor_blades, standard_rotor_blades, RotorBladeCpObjective};

#[cfg(feature = "solver")]
pub use cp_optimizer::solve as solve_cp;
#[cfg(feature = "solver")]
pub use dynamo_coil::design_dynamo_coils_cp;
#[cfg(feature = "solver")]
pub use rotor_blade::design_rotor_blades_cp;
