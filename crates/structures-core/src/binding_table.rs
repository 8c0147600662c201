//! C1 — the per-structure open-chained hash table from symbol identity to
//! binding record.
//!
//! Grounded on `structures.c`'s `lookup`/`lookup_or_add` and the
//! `MIN_BUCKETS`/`MAX_MULTIPLIER` constants: bucket count is always either
//! zero or a power of two >= 8, and the table doubles once
//! `bindings > buckets * 2`.

use std::cell::RefCell;
use std::rc::Rc;
use structures_common::Symbol;

const MIN_BUCKETS: usize = 8;
const MAX_MULTIPLIER: usize = 2;

/// A single binding: a symbol's value plus the flags the resolver and
/// `structure-set` consult.
pub struct BindingRecord {
    pub symbol: Symbol,
    pub binding: crate::value::Value,
    pub is_constant: bool,
    pub is_exported: bool,
}

impl BindingRecord {
    fn new(symbol: Symbol, is_exported: bool) -> Self {
        Self {
            symbol,
            binding: crate::value::Value::Void,
            is_constant: false,
            is_exported,
        }
    }
}

/// A shared, individually-heap-allocated handle to a binding record.
///
/// Individual allocation (rather than storing `BindingRecord` inline in the
/// bucket `Vec`) is what lets the lookup cache (C5) hold a non-owning
/// `Weak` reference to a record: rehashing moves which bucket's `Vec` holds
/// the `Rc`, never the record's own storage.
pub type BindingHandle = Rc<RefCell<BindingRecord>>;

fn struct_hash(sym: Symbol, buckets: usize) -> usize {
    // Multiplicative hash over the symbol's identity, matching the spirit
    // of `rep_STRUCT_HASH` (a fixed function of identity, reduced mod n).
    const GOLDEN: u64 = 0x9E37_79B9_7F4A_7C15;
    (u64::from(sym.0).wrapping_mul(GOLDEN) as usize) % buckets
}

/// The open-chained hash table itself.
#[derive(Default)]
pub struct BindingTable {
    buckets: Vec<Vec<BindingHandle>>,
    total_bindings: usize,
}

impl BindingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn total_buckets(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn total_bindings(&self) -> usize {
        self.total_bindings
    }

    /// Scans for an immediate binding of `sym`, or `None`.
    #[must_use]
    pub fn lookup(&self, sym: Symbol) -> Option<BindingHandle> {
        if self.buckets.is_empty() {
            return None;
        }
        let idx = struct_hash(sym, self.buckets.len());
        self.buckets[idx].iter().find(|n| n.borrow().symbol == sym).cloned()
    }

    /// Returns the existing binding for `sym`, or creates one with
    /// `binding = Void`, `is_constant = false`, `is_exported = default_exported`.
    ///
    /// Returns `(handle, true)` when a new record was created so callers
    /// (`Structure::lookup_or_add`) can run the interface-migration and
    /// cache-invalidation steps that only apply to fresh bindings.
    pub fn get_or_create(&mut self, sym: Symbol, default_exported: bool) -> (BindingHandle, bool) {
        if let Some(existing) = self.lookup(sym) {
            return (existing, false);
        }

        if self.buckets.is_empty() {
            self.buckets = vec![Vec::new(); MIN_BUCKETS];
        } else if self.total_bindings > self.buckets.len() * MAX_MULTIPLIER {
            self.grow();
        }

        let record = Rc::new(RefCell::new(BindingRecord::new(sym, default_exported)));
        let idx = struct_hash(sym, self.buckets.len());
        self.buckets[idx].push(Rc::clone(&record));
        self.total_bindings += 1;
        (record, true)
    }

    fn grow(&mut self) {
        let new_total = self.buckets.len() * 2;
        let mut new_buckets = vec![Vec::new(); new_total];
        for bucket in self.buckets.drain(..) {
            for record in bucket {
                let sym = record.borrow().symbol;
                let idx = struct_hash(sym, new_total);
                new_buckets[idx].push(record);
            }
        }
        self.buckets = new_buckets;
    }

    /// Iterates every record in unspecified order.
    pub fn walk(&self, mut f: impl FnMut(&BindingHandle)) {
        for bucket in &self.buckets {
            for record in bucket {
                f(record);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use structures_common::symbol::intern;

    #[test]
    fn lookup_on_empty_table_is_none() {
        let table = BindingTable::new();
        assert!(table.lookup(intern("nope")).is_none());
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mut table = BindingTable::new();
        let sym = intern("binding-table-idempotent");
        let (a, created_a) = table.get_or_create(sym, false);
        let (b, created_b) = table.get_or_create(sym, false);
        assert!(created_a);
        assert!(!created_b);
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(table.total_bindings(), 1);
    }

    #[test]
    fn distinct_symbols_get_distinct_records() {
        let mut table = BindingTable::new();
        let x = intern("binding-table-x");
        let y = intern("binding-table-y");
        let (rx, _) = table.get_or_create(x, false);
        let (ry, _) = table.get_or_create(y, false);
        assert!(!Rc::ptr_eq(&rx, &ry));
    }

    #[test]
    fn first_insert_allocates_min_buckets() {
        let mut table = BindingTable::new();
        assert_eq!(table.total_buckets(), 0);
        table.get_or_create(intern("binding-table-first"), false);
        assert_eq!(table.total_buckets(), 8);
    }

    #[test]
    fn table_doubles_past_load_factor_and_stays_power_of_two() {
        let mut table = BindingTable::new();
        for i in 0..64 {
            table.get_or_create(intern(&format!("binding-table-grow-{i}")), false);
        }
        assert!(table.total_bindings() <= table.total_buckets() * 2);
        assert!(table.total_buckets().is_power_of_two());
        assert!(table.total_buckets() >= 8);
    }

    #[test]
    fn grow_preserves_all_existing_lookups() {
        let mut table = BindingTable::new();
        let syms: Vec<_> = (0..40).map(|i| intern(&format!("binding-table-preserve-{i}"))).collect();
        for sym in &syms {
            table.get_or_create(*sym, false);
        }
        for sym in &syms {
            assert!(table.lookup(*sym).is_some());
        }
    }

    #[test]
    fn walk_visits_every_record_exactly_once() {
        let mut table = BindingTable::new();
        let syms: Vec<_> = (0..20).map(|i| intern(&format!("binding-table-walk-{i}"))).collect();
        for sym in &syms {
            table.get_or_create(*sym, false);
        }
        let mut seen = Vec::new();
        table.walk(|record| seen.push(record.borrow().symbol));
        seen.sort_by_key(|s| s.0);
        let mut expected: Vec<_> = syms.clone();
        expected.sort_by_key(|s| s.0);
        assert_eq!(seen, expected);
    }
}
