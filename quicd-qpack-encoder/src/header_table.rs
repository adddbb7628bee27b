//! Composite lookup over the static and dynamic tables.

use crate::dynamic_table::DynamicTable;
use crate::static_table;

/// Where a matching entry lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Static table index.
    Static(u64),
    /// Dynamic table absolute index.
    Dynamic(u64),
}

/// Result of a header table lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    /// Both name and value match.
    Exact(Location),
    /// Only the name matches.
    Name(Location),
    NoMatch,
}

/// Static table plus the encoder's dynamic table.
#[derive(Debug)]
pub struct HeaderTable {
    dynamic: DynamicTable,
}

impl HeaderTable {
    pub fn new(max_capacity: usize) -> Self {
        Self {
            dynamic: DynamicTable::new(max_capacity),
        }
    }

    pub fn dynamic(&self) -> &DynamicTable {
        &self.dynamic
    }

    pub fn dynamic_mut(&mut self) -> &mut DynamicTable {
        &mut self.dynamic
    }

    /// Finds the best entry for `name: value`.
    ///
    /// Preference order: dynamic exact, static exact, static name, dynamic
    /// name. The dynamic table is scanned newest to oldest. A static name
    /// beats a dynamic one since it can never block the stream.
    pub fn lookup(&self, name: &[u8], value: &[u8]) -> MatchType {
        let dynamic = self.dynamic.lookup(name, value);

        if let Some((index, true)) = dynamic {
            return MatchType::Exact(Location::Dynamic(index));
        }
        if let Some(index) = static_table::find_exact(name, value) {
            return MatchType::Exact(Location::Static(index));
        }
        if let Some(index) = static_table::find_name(name) {
            return MatchType::Name(Location::Static(index));
        }
        match dynamic {
            Some((index, _)) => MatchType::Name(Location::Dynamic(index)),
            None => MatchType::NoMatch,
        }
    }
}
