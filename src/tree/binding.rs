use crate::{metadata::TypeUsage, tree::Expr};

/// An input expression bound to a variable name visible to the node's
/// own sub-expressions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpressionBinding {
    pub expr: Box<Expr>,
    pub var_name: String,
    pub var_type: TypeUsage,
}

impl ExpressionBinding {
    /// Bind `expr` to `var_name`; the variable takes the element type of the input.
    pub fn new(expr: Expr, var_name: &str) -> Self {
        let var_type = expr.result_type().element_type().clone();
        Self { expr: Box::new(expr), var_name: var_name.to_string(), var_type }
    }

    pub fn var(&self) -> Expr {
        Expr::var(&self.var_name, self.var_type.clone())
    }

    /// Shorthand for `Property(var, name)`.
    pub fn prop(&self, name: &str) -> Expr {
        Expr::property(self.var(), name)
    }
}

/// Input of a `GroupBy`: the element variable plus the name of the group
/// variable aggregates range over.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupBinding {
    pub expr: Box<Expr>,
    pub var_name: String,
    pub var_type: TypeUsage,
    pub group_var_name: String,
}

impl GroupBinding {
    pub fn new(expr: Expr, var_name: &str, group_var_name: &str) -> Self {
        let var_type = expr.result_type().element_type().clone();
        Self {
            expr: Box::new(expr),
            var_name: var_name.to_string(),
            var_type,
            group_var_name: group_var_name.to_string(),
        }
    }

    pub fn var(&self) -> Expr {
        Expr::var(&self.var_name, self.var_type.clone())
    }

    pub fn group_var(&self) -> Expr {
        Expr::var(&self.group_var_name, self.var_type.clone())
    }

    pub fn prop(&self, name: &str) -> Expr {
        Expr::property(self.var(), name)
    }

    pub fn group_prop(&self, name: &str) -> Expr {
        Expr::property(self.group_var(), name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub expr: Expr,
    pub ascending: bool,
    pub collation: Option<String>,
}

impl SortKey {
    pub fn asc(expr: Expr) -> Self {
        Self { expr, ascending: true, collation: None }
    }

    pub fn desc(expr: Expr) -> Self {
        Self { expr, ascending: false, collation: None }
    }

    pub fn collate(mut self, collation: &str) -> Self {
        self.collation = Some(collation.to_string());
        self
    }
}
