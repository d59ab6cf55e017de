use std::sync::Arc;

use tracing::trace;

use super::{QueryCompiler, DISTINCT_ALIAS, ELEMENT_ALIAS, LIMIT_ALIAS};
use crate::{
    generator::{
        CompileError, CompileResult, FragmentBuilder, OperatorKind, OutputColumn, SkipClause, SqlFragment, Statement,
        StatementRef, TopClause,
    },
    metadata::{EntitySet, TypeUsage},
    tree::{ConstantValue, Expr, ExpressionBinding, QuantifierKind, SortKey},
};

impl QueryCompiler<'_> {
    /// Text standing for an entity set in a FROM clause.
    pub(crate) fn target_sql(set: &EntitySet) -> String {
        match &set.defining_query {
            Some(query) => format!("({query})"),
            None => set.store_name().to_string(),
        }
    }

    pub(super) fn visit_scan(&mut self, set: &Arc<EntitySet>) -> SqlFragment {
        let target = Self::target_sql(set);
        if self.is_parent_a_join() {
            return SqlFragment::text(target);
        }
        let statement = Statement::new_ref();
        statement.borrow_mut().from.append(target);
        SqlFragment::Statement(statement)
    }

    /// `negate` wraps the predicate in `NOT (..)`, which is how `All` is expressed.
    pub(super) fn visit_filter(
        &mut self,
        input: &ExpressionBinding,
        predicate: &Expr,
        negate: bool,
    ) -> CompileResult<StatementRef> {
        let (statement, symbol) = self.visit_input_expression(&input.expr, &input.var_name, &input.var_type)?;
        let (statement, symbol) =
            self.ensure_accepts(statement, symbol, OperatorKind::Filter, &input.var_name, &input.var_type)?;

        self.statements.push(statement.clone());
        self.scopes.enter_scope();
        self.add_from_symbol(&statement, &input.var_name, symbol, true);

        let predicate_sql = self.visit(predicate);
        self.scopes.exit_scope();
        self.statements.pop();
        let predicate_sql = predicate_sql?;

        {
            let mut st = statement.borrow_mut();
            if negate {
                st.where_clause.append("NOT (").append(predicate_sql).append(")");
            } else {
                st.where_clause.append(predicate_sql);
            }
        }
        Ok(statement)
    }

    pub(super) fn visit_project(&mut self, input: &ExpressionBinding, projection: &Expr) -> CompileResult<StatementRef> {
        let (statement, symbol) = self.visit_input_expression(&input.expr, &input.var_name, &input.var_type)?;
        let (statement, symbol) =
            self.ensure_accepts(statement, symbol, OperatorKind::Project, &input.var_name, &input.var_type)?;

        self.statements.push(statement.clone());
        self.scopes.enter_scope();
        self.add_from_symbol(&statement, &input.var_name, symbol, true);

        let projected = match projection {
            Expr::NewRecord { fields } => self.add_record_projection(&statement, fields),
            other => self.visit(other).map(|sql| {
                let mut st = statement.borrow_mut();
                st.select.append(sql);
                if let Expr::Property { name, .. } = other {
                    st.push_output(OutputColumn::Named(name.clone()));
                }
            }),
        };
        self.scopes.exit_scope();
        self.statements.pop();
        projected?;
        Ok(statement)
    }

    fn add_record_projection(&mut self, statement: &StatementRef, fields: &[(String, Expr)]) -> CompileResult<()> {
        let mut separator = "";
        for (name, field) in fields {
            if field.result_type().is_row() {
                return Err(CompileError::unsupported(format!("record-typed projection member '{name}'")));
            }
            let sql = self.visit(field)?;
            let mut st = statement.borrow_mut();
            st.select.append(separator).append_line().append(sql).append(" AS ").append(name.as_str());
            st.push_output(OutputColumn::Named(name.clone()));
            separator = ", ";
        }
        Ok(())
    }

    pub(super) fn visit_sort(&mut self, input: &ExpressionBinding, keys: &[SortKey]) -> CompileResult<StatementRef> {
        let (statement, symbol) = self.visit_input_expression(&input.expr, &input.var_name, &input.var_type)?;
        let (statement, symbol) =
            self.ensure_accepts(statement, symbol, OperatorKind::Sort, &input.var_name, &input.var_type)?;

        self.statements.push(statement.clone());
        self.scopes.enter_scope();
        self.add_from_symbol(&statement, &input.var_name, symbol, true);
        let sorted = self.add_sort_keys(&statement, keys);
        self.scopes.exit_scope();
        self.statements.pop();
        sorted?;
        Ok(statement)
    }

    pub(super) fn visit_skip(
        &mut self,
        input: &ExpressionBinding,
        keys: &[SortKey],
        count: &Expr,
    ) -> CompileResult<StatementRef> {
        let (statement, symbol) = self.visit_input_expression(&input.expr, &input.var_name, &input.var_type)?;
        let (statement, symbol) =
            self.ensure_accepts(statement, symbol, OperatorKind::Skip, &input.var_name, &input.var_type)?;

        self.statements.push(statement.clone());
        self.scopes.enter_scope();
        self.add_from_symbol(&statement, &input.var_name, symbol, true);
        let sorted = self.add_sort_keys(&statement, keys);
        self.scopes.exit_scope();
        self.statements.pop();
        sorted?;

        let count = self.count_expression(count)?;
        statement.borrow_mut().set_skip(SkipClause::new(count))?;
        Ok(statement)
    }

    fn add_sort_keys(&mut self, statement: &StatementRef, keys: &[SortKey]) -> CompileResult<()> {
        let mut separator = "";
        for key in keys {
            let sql = self.visit(&key.expr)?;
            let mut st = statement.borrow_mut();
            st.order_by.append(separator).append(sql);
            if let Some(collation) = key.collation.as_deref().filter(|c| !c.is_empty()) {
                st.order_by.append(" COLLATE ").append(collation);
            }
            st.order_by.append(if key.ascending { " ASC" } else { " DESC" });
            separator = ", ";
        }
        Ok(())
    }

    /// Row counts of LIMIT and OFFSET: an integer constant or a parameter.
    fn count_expression(&mut self, count: &Expr) -> CompileResult<FragmentBuilder> {
        let mut builder = FragmentBuilder::new();
        match count {
            Expr::Constant(value) => {
                let text = match value {
                    ConstantValue::Byte(v) => v.to_string(),
                    ConstantValue::Int16(v) => v.to_string(),
                    ConstantValue::Int32(v) => v.to_string(),
                    ConstantValue::Int64(v) => v.to_string(),
                    other => {
                        return Err(CompileError::invalid_argument(format!(
                            "row count must be an integer, got {:?}",
                            other.kind()
                        )));
                    }
                };
                builder.append(text);
            }
            Expr::ParameterRef { .. } => {
                builder.append(self.visit(count)?);
            }
            _ => return Err(CompileError::invalid_argument("row count must be a constant or a parameter")),
        }
        Ok(builder)
    }

    /// Select from `statement` under `alias` when `op` cannot append to it.
    fn wrap_unless_accepts(
        &mut self,
        statement: StatementRef,
        op: OperatorKind,
        alias: &str,
        element_type: &TypeUsage,
    ) -> CompileResult<StatementRef> {
        if statement.borrow().accepts(op) {
            return Ok(statement);
        }
        trace!(operator = ?op, var = alias, "wrapping statement");
        let (wrapped, symbol) = self.create_new_select_statement(&statement, alias, element_type, true)?;
        self.add_from_symbol(&wrapped, alias, symbol, false);
        Ok(wrapped)
    }

    pub(super) fn visit_limit(&mut self, input: &Expr, count: &Expr, with_ties: bool) -> CompileResult<StatementRef> {
        if with_ties {
            return Err(CompileError::unsupported("LIMIT WITH TIES"));
        }
        let statement = self.visit_expression_ensure_statement(input, false)?;
        let element_type = input.result_type().element_type().clone();
        let statement = self.wrap_unless_accepts(statement, OperatorKind::Limit, LIMIT_ALIAS, &element_type)?;

        let count = self.count_expression(count)?;
        statement.borrow_mut().set_top(TopClause::new(count))?;
        Ok(statement)
    }

    pub(super) fn visit_distinct(&mut self, input: &Expr) -> CompileResult<StatementRef> {
        let statement = self.visit_expression_ensure_statement(input, true)?;
        let element_type = input.result_type().element_type().clone();
        let statement = self.wrap_unless_accepts(statement, OperatorKind::Distinct, DISTINCT_ALIAS, &element_type)?;
        statement.borrow_mut().is_distinct = true;
        Ok(statement)
    }

    /// Sides carrying ORDER BY, LIMIT or OFFSET are wrapped because those
    /// clauses may not appear directly under a set operator.
    pub(super) fn visit_set_op(&mut self, keyword: &str, left: &Expr, right: &Expr) -> CompileResult<SqlFragment> {
        let left = self.visit_expression_ensure_statement(left, true)?;
        let right = self.visit_expression_ensure_statement(right, true)?;

        let mut builder = FragmentBuilder::new();
        Self::append_set_op_side(&mut builder, left);
        builder.append_line().append(keyword).append_line();
        Self::append_set_op_side(&mut builder, right);
        Ok(builder.into())
    }

    fn append_set_op_side(builder: &mut FragmentBuilder, side: StatementRef) {
        let wrap = side.borrow().has_order_by_limit_or_offset();
        if wrap {
            builder.append("SELECT * FROM (").append(side).append(")");
        } else {
            builder.append(side);
        }
    }

    pub(super) fn visit_element(&mut self, input: &Expr) -> CompileResult<SqlFragment> {
        let statement = self.visit_expression_ensure_statement(input, true)?;
        let mut builder = FragmentBuilder::new();
        builder.append("(").append(statement).append(")");
        Ok(builder.into())
    }

    /// `NOT EXISTS (..)`, or `EXISTS (..)` when negated.
    pub(super) fn visit_is_empty(&mut self, input: &Expr, negate: bool) -> CompileResult<SqlFragment> {
        let statement = self.visit_expression_ensure_statement(input, true)?;
        let mut builder = FragmentBuilder::new();
        if !negate {
            builder.append("NOT ");
        }
        builder.append("EXISTS (").append(statement).append(")");
        Ok(builder.into())
    }

    pub(super) fn visit_quantifier(
        &mut self,
        kind: QuantifierKind,
        input: &ExpressionBinding,
        predicate: &Expr,
    ) -> CompileResult<SqlFragment> {
        let negate = kind == QuantifierKind::All;
        let filtered = self.visit_filter(input, predicate, negate)?;
        if filtered.borrow().select.is_empty() {
            self.add_default_columns(&filtered)?;
        }

        let mut builder = FragmentBuilder::new();
        if negate {
            builder.append("NOT ");
        }
        builder.append("EXISTS (").append(filtered).append(")");
        Ok(builder.into())
    }

    pub(super) fn visit_new_collection(&mut self, element_type: &TypeUsage, items: &[Expr]) -> CompileResult<SqlFragment> {
        if let [Expr::Element(inner)] = items {
            return Ok(self.visit_collection_element(inner)?.into());
        }

        let mut builder = FragmentBuilder::new();
        if items.is_empty() {
            builder.append("SELECT NULL AS X FROM (SELECT 1) AS Y WHERE 1=0");
            return Ok(builder.into());
        }

        let is_scalar = element_type.is_primitive();
        let mut separator = "";
        for item in items {
            builder.append(separator).append("SELECT ").append(self.visit(item)?);
            if is_scalar {
                builder.append(" AS X");
            }
            separator = " UNION ALL ";
        }
        Ok(builder.into())
    }

    /// `{ Element(x) }`: the first row of `x`.
    fn visit_collection_element(&mut self, input: &Expr) -> CompileResult<StatementRef> {
        let statement = self.visit_expression_ensure_statement(input, true)?;
        let element_type = input.result_type().element_type().clone();
        let statement = self.wrap_unless_accepts(statement, OperatorKind::Element, ELEMENT_ALIAS, &element_type)?;

        let mut one = FragmentBuilder::new();
        one.append("1");
        statement.borrow_mut().set_top(TopClause::new(one))?;
        Ok(statement)
    }
}
