use std::sync::Arc;

use crate::{metadata::TypeUsage, tree::Expr};

/// How a function parameter passes its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterMode {
    In,
    Out,
    InOut,
    ReturnValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionParameter {
    pub name: String,
    pub ty: TypeUsage,
    pub mode: ParameterMode,
}

impl FunctionParameter {
    pub fn new(name: &str, ty: TypeUsage, mode: ParameterMode) -> Self {
        Self { name: name.to_string(), ty, mode }
    }
}

/// Metadata of a store or built-in function.
///
/// `store_name` overrides `name` in the emitted text. Niladic functions are
/// written without an argument list (`CURRENT_TIMESTAMP`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionMeta {
    pub name: String,
    pub schema: Option<String>,
    pub store_name: Option<String>,
    pub built_in: bool,
    pub niladic: bool,
    pub return_type: TypeUsage,
    pub parameters: Vec<FunctionParameter>,
}

impl FunctionMeta {
    pub fn built_in(name: &str, return_type: TypeUsage) -> Self {
        Self {
            name: name.to_string(),
            schema: None,
            store_name: None,
            built_in: true,
            niladic: false,
            return_type,
            parameters: Vec::new(),
        }
    }

    pub fn store(name: &str, return_type: TypeUsage) -> Self {
        Self { built_in: false, ..Self::built_in(name, return_type) }
    }

    pub fn niladic(mut self) -> Self {
        self.niladic = true;
        self
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.to_string());
        self
    }

    pub fn with_store_name(mut self, store_name: &str) -> Self {
        self.store_name = Some(store_name.to_string());
        self
    }

    pub fn with_parameter(mut self, parameter: FunctionParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Name written into query text.
    pub fn emitted_name(&self) -> &str {
        match &self.store_name {
            Some(name) if !name.is_empty() => name,
            _ => &self.name,
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&FunctionParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionCall {
    pub function: Arc<FunctionMeta>,
    pub args: Vec<Expr>,
}

/// An aggregate computed by a `GroupBy` node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateCall {
    pub function: Arc<FunctionMeta>,
    pub distinct: bool,
    pub argument: Expr,
}

impl AggregateCall {
    pub fn new(function: Arc<FunctionMeta>, argument: Expr) -> Self {
        Self { function, distinct: false, argument }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::PrimitiveKind;

    #[test]
    fn store_name_wins_over_model_name() {
        let f = FunctionMeta::store("Length", TypeUsage::primitive(PrimitiveKind::Int32))
            .with_store_name("LEN");
        assert_eq!(f.emitted_name(), "LEN");
        assert!(!f.built_in);

        let g = FunctionMeta::built_in("COUNT", TypeUsage::primitive(PrimitiveKind::Int32));
        assert_eq!(g.emitted_name(), "COUNT");
    }
}
