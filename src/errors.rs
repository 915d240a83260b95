/*!

  The flat error hierarchy for the layout engine. Every fallible public operation returns
  `Result<T, Error>`; nothing is silently suppressed.

*/

use thiserror::Error as DeriveError;
use user_error::UFE;

#[derive(Debug, DeriveError)]
pub enum Error {
  /// `buffer.len() != dims.iter().product()`, or a neighbour tuple's length != 2*D.
  #[error("shape mismatch: expected length {expected}, found {found}")]
  ShapeMismatch { expected: usize, found: usize },

  /// A constraint that only supports certain ranks (e.g. `CenteredBearings` is 2-D only) was
  /// invoked on a `MultiSequence` of an unsupported rank.
  #[error("unsupported dimension: {operation} requires rank {required}, found rank {found}")]
  UnsupportedDimension {
    operation: &'static str,
    required : usize,
    found    : usize,
  },

  /// A constraint or rule referenced a component name absent from the catalog.
  #[error("unknown component name `{0}`")]
  UnknownName(String),

  /// A coordinate or catalog index fell outside its valid range.
  #[error("out of range: {0}")]
  OutOfRange(String),

  /// The CP-SAT submission path was requested but no solver backend is available.
  #[error("CP-SAT backend unavailable (build without the `solver` feature, or backend rejected the model)")]
  SolverUnavailable,

  /// Search terminated without finding a single complete, valid layout.
  #[error("search is infeasible: no complete valid layout exists under the given constraints")]
  Infeasible,

  #[error(transparent)]
  Unknown {
    #[from]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

// Spurious "trait bound `Error: Error` is not satisfied" error. The trait bound is derived
// using `thiserror::Error`.
impl UFE for Error { /* User Facing Error - nothing to implement. */ }
