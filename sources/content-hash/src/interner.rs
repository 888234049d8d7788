use crate::hash::Hash;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Mutex;

/// A compact identifier for an interned [`Hash`]. Stable for the lifetime of one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HashId(u32);

struct Interner {
    hashes: Vec<Hash>,
    index: HashMap<Hash, HashId>,
}

impl Interner {
    fn new() -> Self {
        let mut interner = Interner {
            hashes: Vec::new(),
            index: HashMap::new(),
        };
        // The all-zero hash always occupies index 0.
        let id = interner.push(Hash::ZERO);
        debug_assert_eq!(id, HashId(0));
        interner
    }

    fn push(&mut self, hash: Hash) -> HashId {
        let id = HashId(self.hashes.len() as u32);
        self.hashes.push(hash);
        self.index.insert(hash, id);
        id
    }

    fn intern(&mut self, hash: Hash) -> HashId {
        if let Some(id) = self.index.get(&hash) {
            return *id;
        }
        self.push(hash)
    }

    fn get(&self, id: HashId) -> Hash {
        self.hashes[id.0 as usize]
    }
}

lazy_static! {
    static ref INTERNER: Mutex<Interner> = Mutex::new(Interner::new());
}

/// Interns `hash`, returning a stable, compact identifier for it.
///
/// The interner is process-wide and append-only within a build: calling this with an
/// already-seen hash returns the same id every time.
pub fn intern(hash: Hash) -> HashId {
    INTERNER
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .intern(hash)
}

/// Resolves a previously interned id back to its [`Hash`].
pub fn resolve(id: HashId) -> Hash {
    INTERNER
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(id)
}

/// The id reserved for [`Hash::ZERO`].
pub fn zero_id() -> HashId {
    HashId(0)
}

/// Clears the interner. Independent builds in the same process (and tests) call this so that
/// ids are not shared across unrelated runs.
pub fn reset() {
    let mut interner = INTERNER
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *interner = Interner::new();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_hash_is_id_zero() {
        reset();
        assert_eq!(zero_id(), HashId(0));
        assert_eq!(resolve(zero_id()), Hash::ZERO);
    }

    #[test]
    fn repeated_intern_returns_same_id() {
        reset();
        let h: Hash = "a".repeat(64).parse().unwrap();
        let id1 = intern(h);
        let id2 = intern(h);
        assert_eq!(id1, id2);
        assert_eq!(resolve(id1), h);
    }

    #[test]
    fn distinct_hashes_get_distinct_ids() {
        reset();
        let h1: Hash = "a".repeat(64).parse().unwrap();
        let h2: Hash = "b".repeat(64).parse().unwrap();
        assert_ne!(intern(h1), intern(h2));
    }
}
