#[cfg(test)]
pub mod fixtures {
    use std::sync::Arc;

    use serde_json::json;

    use crate::{
        generator::{CompileResult, CompiledQuery, GeneratorConfig, QueryCompiler},
        metadata::{Catalog, EntitySet, PrimitiveKind, TypeUsage},
        tree::{Expr, FunctionMeta},
    };

    pub fn catalog() -> Catalog {
        let doc = json!({
            "entity_sets": [
                { "name": "Win32_Process", "keys": ["Handle"],
                  "members": [
                    { "name": "Handle",          "type": "Int64" },
                    { "name": "Name",            "type": "String", "max_length": 260 },
                    { "name": "ProcessId",       "type": "Int64" },
                    { "name": "ParentProcessId", "type": "Int64" },
                    { "name": "Priority",        "type": "Int32" },
                    { "name": "CreationDate",    "type": "DateTime" }
                  ] },
                { "name": "Win32_Thread", "keys": ["Handle"],
                  "members": [
                    { "name": "Handle",   "type": "String", "max_length": 64 },
                    { "name": "Priority", "type": "Int32" }
                  ] },
                { "name": "Win32_DiskDrive", "keys": ["SerialNumber"],
                  "members": [
                    { "name": "SerialNumber", "type": "String", "max_length": 64 },
                    { "name": "Model",        "type": "String" },
                    { "name": "Size",         "type": "Int64" },
                    { "name": "Index",        "type": "Int32" }
                  ] },
                { "name": "Win32_Volume", "keys": ["DriveLetter", "SystemName"],
                  "members": [
                    { "name": "DriveLetter", "type": "String", "max_length": 3 },
                    { "name": "SystemName",  "type": "String" },
                    { "name": "Label",       "type": "String" },
                    { "name": "FreeSpace",   "type": "Int64" }
                  ] },
                { "name": "RunningServices",
                  "defining_query": "SELECT * FROM Win32_Service WHERE State = 'Running'",
                  "members": [
                    { "name": "Name",  "type": "String" },
                    { "name": "State", "type": "String" }
                  ] }
            ]
        });
        Catalog::from_json_str(&doc.to_string()).unwrap()
    }

    fn set(name: &str) -> Arc<EntitySet> {
        catalog().get(name).unwrap()
    }

    pub fn processes() -> Arc<EntitySet> {
        set("Win32_Process")
    }

    pub fn threads() -> Arc<EntitySet> {
        set("Win32_Thread")
    }

    pub fn disk_drives() -> Arc<EntitySet> {
        set("Win32_DiskDrive")
    }

    pub fn volumes() -> Arc<EntitySet> {
        set("Win32_Volume")
    }

    pub fn running_services() -> Arc<EntitySet> {
        set("RunningServices")
    }

    pub fn string_type() -> TypeUsage {
        TypeUsage::primitive(PrimitiveKind::String)
    }

    pub fn int32_type() -> TypeUsage {
        TypeUsage::primitive(PrimitiveKind::Int32)
    }

    pub fn int64_type() -> TypeUsage {
        TypeUsage::primitive(PrimitiveKind::Int64)
    }

    pub fn count_fn() -> Arc<FunctionMeta> {
        Arc::new(FunctionMeta::built_in("COUNT", int32_type()))
    }

    pub fn sum_fn() -> Arc<FunctionMeta> {
        Arc::new(FunctionMeta::built_in("SUM", int64_type()))
    }

    pub fn upper_fn() -> Arc<FunctionMeta> {
        Arc::new(FunctionMeta::built_in("UPPER", string_type()))
    }

    pub fn compile(query: &Expr) -> CompileResult<CompiledQuery> {
        QueryCompiler::new(&GeneratorConfig::default()).compile(query)
    }

    pub fn compile_text(query: &Expr) -> String {
        compile(query).unwrap().text
    }
}
