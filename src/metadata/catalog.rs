use std::{fs, path::Path, sync::Arc};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::{
    generator::{CompileError, CompileResult},
    metadata::{EntitySet, Facets, Member, PrimitiveKind, RowType, TypeUsage},
};

/// Entity sets known to the caller, keyed by name (case-insensitive).
///
/// The catalog is only a convenience for building trees: the compiler reads
/// everything it needs from the `EntitySet` a `Scan` carries.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    sets: IndexMap<String, Arc<EntitySet>>,
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    entity_sets: Vec<EntitySetDocument>,
}

#[derive(Debug, Deserialize)]
struct EntitySetDocument {
    name: String,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    defining_query: Option<String>,
    #[serde(default)]
    keys: Vec<String>,
    members: Vec<MemberDocument>,
}

#[derive(Debug, Deserialize)]
struct MemberDocument {
    name: String,
    #[serde(rename = "type")]
    kind: PrimitiveKind,
    #[serde(flatten)]
    facets: Facets,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a set, replacing any set with the same name.
    pub fn add(&mut self, set: EntitySet) -> Arc<EntitySet> {
        let set = Arc::new(set);
        self.sets.insert(set.name.to_ascii_lowercase(), set.clone());
        set
    }

    pub fn get(&self, name: &str) -> Option<Arc<EntitySet>> {
        self.sets.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntitySet>> {
        self.sets.values()
    }

    /// Parse a catalog document:
    ///
    /// ```json
    /// { "entity_sets": [
    ///     { "name": "Processes", "table": "Win32_Process", "keys": ["Handle"],
    ///       "members": [ { "name": "Handle", "type": "String", "max_length": 64 } ] }
    /// ] }
    /// ```
    pub fn from_json_str(text: &str) -> CompileResult<Self> {
        let doc: CatalogDocument = serde_json::from_str(text)
            .map_err(|e| CompileError::Catalog(format!("invalid catalog document: {e}")))?;

        let mut catalog = Catalog::new();
        for set in doc.entity_sets {
            if set.name.trim().is_empty() {
                return Err(CompileError::Catalog("entity set with an empty name".into()));
            }
            let members = set
                .members
                .into_iter()
                .map(|m| Member::new(&m.name, TypeUsage::with_facets(m.kind, m.facets)))
                .collect();
            let element = RowType::new(members);
            if let Some(missing) = set.keys.iter().find(|k| element.member(k).is_none()) {
                return Err(CompileError::Catalog(format!(
                    "key '{missing}' is not a member of '{}'",
                    set.name
                )));
            }

            let mut entity = EntitySet::new(&set.name, element);
            entity.table = set.table;
            entity.defining_query = set.defining_query;
            entity.keys = set.keys;
            catalog.add(entity);
        }
        Ok(catalog)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> CompileResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| CompileError::Catalog(format!("could not read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    const DOC: &str = r#"{
        "entity_sets": [
            { "name": "Processes", "table": "Win32_Process", "keys": ["Handle"],
              "members": [
                { "name": "Handle", "type": "String", "max_length": 64, "unicode": false },
                { "name": "ProcessId", "type": "Int64" },
                { "name": "WorkingSetSize", "type": "Decimal", "precision": 20, "scale": 0 }
              ] },
            { "name": "Services", "defining_query": "SELECT * FROM Win32_Service",
              "members": [ { "name": "Name", "type": "String" } ] }
        ]
    }"#;

    #[test]
    fn parses_sets_members_and_facets() {
        let catalog = Catalog::from_json_str(DOC).unwrap();
        assert_eq!(catalog.len(), 2);

        let processes = catalog.get("processes").unwrap();
        assert_eq!(processes.store_name(), "Win32_Process");
        assert_eq!(processes.keys, vec!["Handle".to_string()]);

        let handle = processes.element.member("handle").unwrap();
        let facets = handle.ty.facets().unwrap();
        assert_eq!(facets.max_length, Some(64));
        assert!(!facets.is_unicode());

        let services = catalog.get("Services").unwrap();
        assert_eq!(services.defining_query.as_deref(), Some("SELECT * FROM Win32_Service"));
    }

    #[test]
    fn rejects_unknown_key_members() {
        let doc = r#"{ "entity_sets": [ { "name": "T", "keys": ["Id"],
            "members": [ { "name": "Name", "type": "String" } ] } ] }"#;
        match Catalog::from_json_str(doc) {
            Err(CompileError::Catalog(msg)) => assert!(msg.contains("'Id'")),
            other => panic!("expected catalog error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(Catalog::from_json_str("[1, 2"), Err(CompileError::Catalog(_))));
    }

    #[test]
    fn loads_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("catalog.json");
        let mut file = File::create(&file_path).unwrap();
        file.write_all(DOC.as_bytes()).unwrap();

        let catalog = Catalog::from_json_file(&file_path).unwrap();
        assert!(catalog.get("Processes").is_some());
    }

    #[test]
    fn missing_file_is_a_catalog_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = Catalog::from_json_file(temp_dir.path().join("nope.json"));
        assert!(matches!(result, Err(CompileError::Catalog(_))));
    }
}
