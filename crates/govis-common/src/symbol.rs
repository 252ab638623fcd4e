use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::sync::RwLock;

/// An interned identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Thread-safe string interner shared by the frontend, checker and evaluator.
#[derive(Debug, Default)]
pub struct SymbolInterner {
    map: RwLock<FxHashMap<SmolStr, Symbol>>,
    strings: RwLock<Vec<SmolStr>>,
}

impl SymbolInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, s: &str) -> Symbol {
        {
            let map = self.map.read().unwrap_or_else(|e| e.into_inner());
            if let Some(&sym) = map.get(s) {
                return sym;
            }
        }

        let mut map = self.map.write().unwrap_or_else(|e| e.into_inner());
        let mut strings = self.strings.write().unwrap_or_else(|e| e.into_inner());

        // Another writer may have won the race.
        if let Some(&sym) = map.get(s) {
            return sym;
        }

        let sym = Symbol(strings.len() as u32);
        let smol = SmolStr::new(s);
        strings.push(smol.clone());
        map.insert(smol, sym);
        sym
    }

    pub fn resolve(&self, sym: Symbol) -> SmolStr {
        let strings = self.strings.read().unwrap_or_else(|e| e.into_inner());
        strings[sym.0 as usize].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_stable() {
        let interner = SymbolInterner::new();
        let a = interner.intern("password");
        let b = interner.intern("Name");
        assert_ne!(a, b);
        assert_eq!(interner.intern("password"), a);
        assert_eq!(interner.resolve(b), "Name");
    }
}
