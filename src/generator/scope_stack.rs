use indexmap::IndexMap;

use crate::generator::SymbolRef;

/// Variable name to symbol bindings, one frame per relational node being
/// visited. Lookups go from the innermost frame outwards and ignore case.
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<IndexMap<String, SymbolRef>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_scope(&mut self) {
        self.frames.push(IndexMap::new());
    }

    pub fn exit_scope(&mut self) {
        self.frames.pop();
    }

    pub fn add(&mut self, name: &str, symbol: SymbolRef) {
        if self.frames.is_empty() {
            self.enter_scope();
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_ascii_lowercase(), symbol);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolRef> {
        let key = name.to_ascii_lowercase();
        self.frames.iter().rev().find_map(|frame| frame.get(&key).cloned())
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::{generator::Symbol, metadata::TypeUsage};

    #[test]
    fn inner_frames_shadow_outer_ones() {
        let outer = Symbol::extent("p", TypeUsage::Row(Default::default()));
        let inner = Symbol::extent("p", TypeUsage::Row(Default::default()));
        let mut scopes = ScopeStack::new();
        scopes.enter_scope();
        scopes.add("p", outer.clone());
        scopes.enter_scope();
        scopes.add("P", inner.clone());
        assert!(Rc::ptr_eq(&scopes.lookup("p").unwrap(), &inner));
        scopes.exit_scope();
        assert!(Rc::ptr_eq(&scopes.lookup("p").unwrap(), &outer));
        scopes.exit_scope();
        assert!(scopes.lookup("p").is_none());
        assert_eq!(scopes.depth(), 0);
    }
}
