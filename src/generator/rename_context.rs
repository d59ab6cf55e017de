use std::collections::HashMap;

use tracing::trace;

/// Names handed out so far for one kind of alias, with the last numeric
/// suffix tried per base name. Keys ignore ASCII case.
#[derive(Debug, Default)]
pub struct AliasRegistry {
    last_suffix: HashMap<String, u32>,
}

impl AliasRegistry {
    fn key(name: &str) -> String {
        name.to_ascii_lowercase()
    }

    /// Mark `name` as used.
    pub fn register(&mut self, name: &str) {
        self.last_suffix.entry(Self::key(name)).or_insert(0);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.last_suffix.contains_key(&Self::key(name))
    }

    /// Next unused `base{n}`, registering it before returning.
    pub fn fresh_name(&mut self, base: &str) -> String {
        let mut suffix = self.last_suffix.get(&Self::key(base)).copied().unwrap_or(0);
        let candidate = loop {
            suffix += 1;
            let candidate = format!("{base}{suffix}");
            if !self.contains(&candidate) {
                break candidate;
            }
        };
        self.last_suffix.insert(Self::key(base), suffix);
        self.last_suffix.insert(Self::key(&candidate), 0);
        candidate
    }

    pub fn len(&self) -> usize {
        self.last_suffix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_suffix.is_empty()
    }
}

/// The per-compilation alias state. The visit pass registers every extent
/// and column name it emits; the render pass draws fresh names from it.
#[derive(Debug, Default)]
pub struct RenameContext {
    pub extents: AliasRegistry,
    pub columns: AliasRegistry,
}

impl RenameContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_extent_name(&mut self, base: &str) -> String {
        let name = self.extents.fresh_name(base);
        trace!(target: "querygen::rename", from = base, to = %name, "extent alias renamed");
        name
    }

    pub fn fresh_column_name(&mut self, base: &str) -> String {
        let name = self.columns.fresh_name(base);
        trace!(target: "querygen::rename", from = base, to = %name, "column alias renamed");
        name
    }
}
