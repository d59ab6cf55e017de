use std::sync::Arc;

use indexmap::IndexMap;

use crate::{
    metadata::TypeUsage,
    tree::{Expr, ExpressionBinding, FunctionMeta},
};

/// `column = value` inside an INSERT or UPDATE.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SetClause {
    pub property: String,
    pub value: Expr,
}

impl SetClause {
    pub fn new(property: &str, value: Expr) -> Self {
        Self { property: property.to_string(), value }
    }
}

/// Target is a binding over a `Scan`; `returning` lists members to read back.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InsertTree {
    pub target: ExpressionBinding,
    pub set_clauses: Vec<SetClause>,
    pub returning: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpdateTree {
    pub target: ExpressionBinding,
    pub predicate: Expr,
    pub set_clauses: Vec<SetClause>,
    pub returning: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeleteTree {
    pub target: ExpressionBinding,
    pub predicate: Expr,
    pub returning: Vec<String>,
}

/// Everything the compiler accepts as input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTree {
    Query {
        query: Expr,
        parameters: IndexMap<String, TypeUsage>,
    },
    Function {
        function: Arc<FunctionMeta>,
        command_text: Option<String>,
        parameters: IndexMap<String, TypeUsage>,
    },
    Insert(InsertTree),
    Update(UpdateTree),
    Delete(DeleteTree),
}

impl CommandTree {
    pub fn query(query: Expr) -> Self {
        CommandTree::Query { query, parameters: IndexMap::new() }
    }

    pub fn function(function: Arc<FunctionMeta>, command_text: Option<&str>) -> Self {
        CommandTree::Function {
            function,
            command_text: command_text.map(str::to_string),
            parameters: IndexMap::new(),
        }
    }

    /// Declare a parameter on a query or function tree. Mutation trees carry no
    /// declared parameters and are returned unchanged.
    pub fn with_parameter(mut self, name: &str, ty: TypeUsage) -> Self {
        match &mut self {
            CommandTree::Query { parameters, .. } | CommandTree::Function { parameters, .. } => {
                parameters.insert(name.to_string(), ty);
            }
            _ => {}
        }
        self
    }

    pub fn parameters(&self) -> Option<&IndexMap<String, TypeUsage>> {
        match self {
            CommandTree::Query { parameters, .. } | CommandTree::Function { parameters, .. } => Some(parameters),
            _ => None,
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self, CommandTree::Insert(_) | CommandTree::Update(_) | CommandTree::Delete(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            CommandTree::Query { .. } => "query",
            CommandTree::Function { .. } => "function",
            CommandTree::Insert(_) => "insert",
            CommandTree::Update(_) => "update",
            CommandTree::Delete(_) => "delete",
        }
    }
}
