use serde::{Deserialize, Serialize};

use crate::generator::{CompileError, CompileResult};

/// Knobs for the emitted dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Break clauses onto their own lines and indent nested statements with tabs.
    pub pretty: bool,
    /// Prefix of parameter references; synthesized parameters are `{prefix}p{n}`.
    pub parameter_prefix: String,
    /// Expression yielding the key of the last inserted row.
    pub last_insert_id: String,
    /// Predicate that holds when the previous statement touched a row.
    pub row_changed_marker: String,
    /// Implicit row identifier column.
    pub rowid_column: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            pretty: false,
            parameter_prefix: "@".to_string(),
            last_insert_id: "last_insert_rowid()".to_string(),
            row_changed_marker: "changes() > 0".to_string(),
            rowid_column: "rowid".to_string(),
        }
    }
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true, ..Self::default() }
    }

    pub fn from_json_str(text: &str) -> CompileResult<Self> {
        serde_json::from_str(text).map_err(|e| CompileError::invalid_argument(format!("invalid generator config: {e}")))
    }

    /// `name` with the parameter prefix, unless it already carries it.
    pub fn parameter_name(&self, name: &str) -> String {
        if name.starts_with(&self.parameter_prefix) {
            return name.to_string();
        }
        format!("{}{}", self.parameter_prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = GeneratorConfig::from_json_str(r#"{ "pretty": true, "last_insert_id": "@@IDENTITY" }"#).unwrap();
        assert!(cfg.pretty);
        assert_eq!(cfg.last_insert_id, "@@IDENTITY");
        assert_eq!(cfg.rowid_column, "rowid");
        assert_eq!(cfg.parameter_name("p0"), "@p0");
        assert_eq!(cfg.parameter_name("@Name"), "@Name");
    }

    #[test]
    fn malformed_json_is_invalid_argument() {
        assert!(matches!(GeneratorConfig::from_json_str("{"), Err(CompileError::InvalidArgument(_))));
    }
}
