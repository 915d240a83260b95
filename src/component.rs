/*!

  `Component` is a catalog entry: a name, a mapping of stat name to float value, and a
  `PlacementRule`. Equality is by name. A `Catalog` is an immutable, ordered list of
  components; a component's position in the catalog is its integer ID throughout the search.
  An empty/unassigned cell is represented as `None` rather than a sentinel integer, and wall
  and incomplete-neighbour markers are kept as distinct string sentinels at the neighbour-tuple
  boundary rather than folded into the same representation as an empty cell.

*/

use std::collections::HashMap;

use crate::errors::Error;
use crate::placement_rule::PlacementRule;
use crate::symbol_table::{NameTable, Symbol};

pub const WALL: &str = "wall";
pub const INCOMPLETE: &str = "incomplete";
pub const BEARING: &str = "bearing";
pub const CASING: &str = "casing";
pub const CONNECTOR: &str = "connector";

#[derive(Clone, Debug)]
pub struct Component {
  pub name: String,
  pub stats: HashMap<String, f64>,
  pub placement_rule: PlacementRule,
}

impl Component {
  pub fn new(name: impl Into<String>, stats: HashMap<String, f64>, placement_rule: PlacementRule) -> Self {
    Component { name: name.into(), stats, placement_rule }
  }

  pub fn stat(&self, key: &str) -> Option<f64> {
    self.stats.get(key).copied()
  }
}

impl PartialEq for Component {
  fn eq(&self, other: &Self) -> bool {
    self.name == other.name
  }
}
impl Eq for Component {}

/// An immutable, ordered list of `Component`s. A component's index in the catalog is its
/// integer ID for the duration of a search.
///
/// Every component name is interned into a catalog-local `NameTable` at construction time, so
/// repeated `id_of` lookups during placement-rule evaluation and CP-SAT lowering resolve
/// through a `Symbol` rather than re-comparing strings.
pub struct Catalog {
  components: Vec<Component>,
  names: NameTable,
  symbol_to_index: HashMap<Symbol, usize>,
}

impl Catalog {
  pub fn new(components: Vec<Component>) -> Self {
    let mut names = NameTable::new();
    let mut symbol_to_index = HashMap::with_capacity(components.len());
    for (index, component) in components.iter().enumerate() {
      let symbol = names.intern(&component.name);
      symbol_to_index.insert(symbol, index);
    }
    Catalog { components, names, symbol_to_index }
  }

  pub fn len(&self) -> usize {
    self.components.len()
  }

  pub fn is_empty(&self) -> bool {
    self.components.is_empty()
  }

  pub fn get(&self, id: usize) -> Result<&Component, Error> {
    self.components.get(id).ok_or_else(|| {
      Error::OutOfRange(format!("catalog index {} out of range for {} entries", id, self.components.len()))
    })
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Component> {
    self.components.iter()
  }

  pub fn names(&self) -> Vec<&str> {
    self.components.iter().map(|c| c.name.as_str()).collect()
  }

  /// Finds the integer ID of the component named `name`, resolving through the interned
  /// `Symbol` rather than re-scanning component names.
  pub fn id_of(&self, name: &str) -> Result<usize, Error> {
    self
      .names
      .lookup(name)
      .and_then(|symbol| self.symbol_to_index.get(&symbol).copied())
      .ok_or_else(|| Error::UnknownName(format!("{} (catalog has: {})", name, self)))
  }

  /// Resolves a sparse `name -> max quantity` caller map into a dense vector aligned with
  /// catalog order, `None` meaning "no cap for this type". Mirrors
  /// `turbine_rotor_blade.py::optimal_rotor_blade_sequence`'s `type_limits` construction: a
  /// name absent from the map gets no `MaxQuantity` constraint at all, not an implicit cap of
  /// zero.
  pub fn resolve_type_limits(&self, limits_by_name: &HashMap<String, u32>) -> Vec<Option<u32>> {
    self
      .components
      .iter()
      .map(|c| limits_by_name.get(&c.name).copied())
      .collect()
  }

  /// The name at cell value `id`, or the `"wall"`/`"incomplete"` sentinel for the two special
  /// out-of-catalog values used at the neighbour-tuple boundary.
  pub fn name_of_cell(&self, id: Option<usize>) -> &str {
    match id {
      None => INCOMPLETE,
      Some(id) => self.components[id].name.as_str(),
    }
  }
}

// `NameTable` wraps `symbol_map::indexing::HashIndexing`, which carries no `Clone`/`Debug` of
// its own; a catalog clone or debug print only ever needs the component list, so both impls
// are hand-written rather than derived, re-interning names fresh on clone.
impl Clone for Catalog {
  fn clone(&self) -> Self {
    Catalog::new(self.components.clone())
  }
}

impl std::fmt::Debug for Catalog {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Catalog").field("components", &self.components).finish()
  }
}

/// A comma-joined list of component names, used to make an `UnknownName` error actionable.
impl std::fmt::Display for Catalog {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    use itertools::Itertools;
    write!(f, "{}", self.components.iter().map(|c| c.name.as_str()).join(", "))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::placement_rule::PlacementRule as Rule;

  fn make(name: &str) -> Component {
    Component::new(name, HashMap::new(), Rule::Always)
  }

  #[test]
  fn equality_is_by_name_only() {
    let mut a = make("steel");
    a.stats.insert("efficiency".into(), 1.0);
    let b = make("steel");
    assert_eq!(a, b);
  }

  #[test]
  fn id_of_finds_position() {
    let catalog = Catalog::new(vec![make("steel"), make("extreme")]);
    assert_eq!(catalog.id_of("extreme").unwrap(), 1);
    assert!(catalog.id_of("adamantine").is_err());
  }

  #[test]
  fn resolve_type_limits_leaves_unmentioned_types_uncapped() {
    let catalog = Catalog::new(vec![make("steel"), make("stator")]);
    let mut limits = HashMap::new();
    limits.insert("stator".to_string(), 1u32);
    let resolved = catalog.resolve_type_limits(&limits);
    assert_eq!(resolved, vec![None, Some(1)]);
  }
}
