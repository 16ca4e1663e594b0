//! Unique-name generation for emitted locals and routines.

use slotmap::{Key, SecondaryMap};

#[derive(Debug, Default)]
pub struct NameGen {
    locals: u32,
    routines: u32,
}

impl NameGen {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn local(&mut self) -> String {
        let n = self.locals;
        self.locals += 1;

        format!("v{n}")
    }

    pub fn routine(&mut self) -> String {
        let n = self.routines;
        self.routines += 1;

        format!("seg_fn_{n}")
    }
}

/// Assigns small sequential numbers to arena keys in first-use order, for
/// stable names in emitted code.
#[derive(Debug)]
pub struct Numbering<K: Key> {
    map: SecondaryMap<K, usize>,
    next: usize,
}

impl<K: Key> Default for Numbering<K> {
    fn default() -> Self {
        Self {
            map: Default::default(),
            next: 0,
        }
    }
}

impl<K: Key> Numbering<K> {
    pub fn number(&mut self, key: K) -> usize {
        if let Some(&n) = self.map.get(key) {
            return n;
        }

        let n = self.next;
        self.next += 1;
        self.map.insert(key, n);

        n
    }
}
