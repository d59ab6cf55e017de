use crate::metadata::{Member, RowType, TypeUsage};

/// A table-like source of rows the compiler can scan or mutate.
///
/// `name` is the model-level name; `table` overrides the store name the
/// compiler emits. When `defining_query` is set the set is backed by a query
/// text rather than a table: scans render `(<defining query>)` and mutations
/// against it are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntitySet {
    pub name: String,
    pub table: Option<String>,
    pub defining_query: Option<String>,
    pub element: RowType,
    pub keys: Vec<String>,
}

impl EntitySet {
    pub fn new(name: &str, element: RowType) -> Self {
        Self {
            name: name.to_string(),
            table: None,
            defining_query: None,
            element,
            keys: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    pub fn with_keys(mut self, keys: &[&str]) -> Self {
        self.keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_defining_query(mut self, query: &str) -> Self {
        self.defining_query = Some(query.to_string());
        self
    }

    /// Name emitted for the set in query text.
    pub fn store_name(&self) -> &str {
        match &self.table {
            Some(table) if !table.is_empty() => table,
            _ => &self.name,
        }
    }

    pub fn element_type(&self) -> TypeUsage {
        TypeUsage::Row(self.element.clone())
    }

    /// Key members in declaration order. Keys naming unknown members are skipped.
    pub fn key_members(&self) -> Vec<&Member> {
        self.keys.iter().filter_map(|k| self.element.member(k)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::PrimitiveKind;

    fn disk_drives() -> EntitySet {
        EntitySet::new(
            "DiskDrives",
            RowType::new(vec![
                Member::new("SerialNumber", TypeUsage::primitive(PrimitiveKind::String)),
                Member::new("Size", TypeUsage::primitive(PrimitiveKind::Decimal)),
            ]),
        )
        .with_keys(&["SerialNumber"])
    }

    #[test]
    fn store_name_prefers_table() {
        let set = disk_drives();
        assert_eq!(set.store_name(), "DiskDrives");
        let set = set.with_table("Win32_DiskDrive");
        assert_eq!(set.store_name(), "Win32_DiskDrive");
    }

    #[test]
    fn key_members_resolve_case_insensitively() {
        let set = disk_drives().with_keys(&["serialnumber", "Nope"]);
        let keys = set.key_members();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].name, "SerialNumber");
    }
}
