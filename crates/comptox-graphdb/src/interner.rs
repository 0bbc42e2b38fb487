//! String interning for labels, property names, relationship types, local keys
//! and value-index keys.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

/// Interned string ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Sym(u32);

impl Sym {
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Maps strings to compact IDs. IDs are dense and assigned in first-seen order,
/// so the interner round-trips through its ordered string list.
pub struct Interner {
    str_to_id: DashMap<String, Sym, ahash::RandomState>,
    id_to_str: DashMap<Sym, String, ahash::RandomState>,
    next_id: AtomicU32,
}

impl Interner {
    pub fn new() -> Self {
        Self {
            str_to_id: DashMap::with_hasher(ahash::RandomState::new()),
            id_to_str: DashMap::with_hasher(ahash::RandomState::new()),
            next_id: AtomicU32::new(0),
        }
    }

    pub fn intern(&self, s: &str) -> Sym {
        if let Some(id) = self.str_to_id.get(s) {
            return *id;
        }
        *self.str_to_id.entry(s.to_string()).or_insert_with(|| {
            let id = Sym(self.next_id.fetch_add(1, Ordering::SeqCst));
            self.id_to_str.insert(id, s.to_string());
            id
        })
    }

    /// Existing ID for a string, without inserting.
    pub fn get(&self, s: &str) -> Option<Sym> {
        self.str_to_id.get(s).map(|id| *id)
    }

    pub fn resolve(&self, id: Sym) -> Option<String> {
        self.id_to_str.get(&id).map(|s| s.clone())
    }

    pub fn len(&self) -> usize {
        self.next_id.load(Ordering::SeqCst) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All interned strings in ID order.
    pub fn strings(&self) -> Vec<String> {
        (0..self.next_id.load(Ordering::SeqCst))
            .filter_map(|i| self.id_to_str.get(&Sym(i)).map(|s| s.clone()))
            .collect()
    }

    pub fn from_strings(strings: Vec<String>) -> Self {
        let interner = Self::new();
        for s in strings {
            interner.intern(&s);
        }
        interner
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Interner {
    fn clone(&self) -> Self {
        Self::from_strings(self.strings())
    }
}

impl std::fmt::Debug for Interner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interner").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_stable_and_round_trips() {
        let interner = Interner::new();
        let a = interner.intern("Chemical");
        let b = interner.intern("Disease");
        assert_eq!(interner.intern("Chemical"), a);
        assert_ne!(a, b);

        let restored = Interner::from_strings(interner.strings());
        assert_eq!(restored.get("Chemical"), Some(a));
        assert_eq!(restored.resolve(b).as_deref(), Some("Disease"));
    }
}
