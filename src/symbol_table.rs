/*!

  A small wrapper around `symbol_map`'s `HashIndexing` that interns component names to a
  compact `Symbol` (a `usize`). Used by the catalog to turn repeated `&str` name comparisons
  in placement-rule evaluation and CP-SAT lowering into integer comparisons.

  Each `Catalog` owns its own table rather than interning into a single global one: catalogs
  are immutable values passed explicitly to each designer, and a process may build more than
  one catalog (or rebuild one with a different component set), so there's no sensible shared
  global table to intern into.

*/

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use symbol_map::indexing::{HashIndexing, Indexing};

/// A "Symbol" is a `usize`, which implements the `SymbolId` trait from the `symbol_map` crate.
pub type Symbol = usize;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum SymbolData {
  Str(String),
}

impl Display for SymbolData {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      SymbolData::Str(s) => write!(f, "{}", s),
    }
  }
}

/// Interns component names into `Symbol`s local to one catalog. Keeps a small `name -> Symbol`
/// cache alongside the `HashIndexing` table so that repeat lookups of an already-interned name
/// don't need to round-trip through `symbol_map`'s insertion API.
pub struct NameTable {
  table: HashIndexing<SymbolData, Symbol>,
  cache: HashMap<String, Symbol>,
}

impl NameTable {
  pub fn new() -> Self {
    NameTable { table: HashIndexing::default(), cache: HashMap::new() }
  }

  /// Returns the `Symbol` for `name`, inserting it if this is the first time it's been seen.
  pub fn intern(&mut self, name: &str) -> Symbol {
    if let Some(&symbol) = self.cache.get(name) {
      return symbol;
    }
    let symbol = *self
      .table
      .get_or_insert(SymbolData::Str(name.to_string()))
      .unwrap()
      .SymbolId();
    self.cache.insert(name.to_string(), symbol);
    symbol
  }

  /// Looks up an already-interned name without inserting.
  pub fn lookup(&self, name: &str) -> Option<Symbol> {
    self.cache.get(name).copied()
  }
}

impl Default for NameTable {
  fn default() -> Self {
    Self::new()
  }
}
