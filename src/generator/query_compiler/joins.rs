use std::rc::Rc;

use super::QueryCompiler;
use crate::{
    generator::{CompileResult, JoinSymbol, SqlFragment, Statement, StatementRef, Symbol},
    tree::{Expr, ExpressionBinding},
};

impl QueryCompiler<'_> {
    /// Joins write into the statement of an enclosing join when there is one,
    /// so a chain of joins ends up as a single FROM list.
    pub(super) fn visit_join(
        &mut self,
        inputs: &[&ExpressionBinding],
        keyword: &str,
        condition: Option<&Expr>,
    ) -> CompileResult<StatementRef> {
        let flatten_into_parent = self.is_parent_a_join();
        let statement = if flatten_into_parent {
            self.current_statement()?
        } else {
            let statement = Statement::new_ref();
            statement.borrow_mut().all_join_extents = Some(Vec::new());
            self.statements.push(statement.clone());
            statement
        };

        self.scopes.enter_scope();
        let joined = self.visit_join_inputs(&statement, inputs, keyword, condition);
        self.scopes.exit_scope();
        if !flatten_into_parent {
            self.statements.pop();
        }
        joined?;
        Ok(statement)
    }

    fn visit_join_inputs(
        &mut self,
        statement: &StatementRef,
        inputs: &[&ExpressionBinding],
        keyword: &str,
        condition: Option<&Expr>,
    ) -> CompileResult<()> {
        for (index, input) in inputs.iter().enumerate() {
            if index > 0 {
                statement.borrow_mut().from.append_line().append(keyword).append(" ");
            }
            let needs_join_context = input.expr.is_scan() || (index == 0 && (input.expr.is_join() || input.expr.is_apply()));
            let first_new_extent = statement.borrow().from_extents.len();

            self.join_context.push(needs_join_context);
            let fragment = self.visit(&input.expr);
            self.join_context.pop();
            self.process_join_input_result(fragment?, statement, input, first_new_extent)?;
        }

        if let Some(condition) = condition {
            self.join_context.push(false);
            let condition_sql = self.visit(condition);
            self.join_context.pop();
            statement.borrow_mut().from.append(" ON ").append(condition_sql?);
        }
        Ok(())
    }

    /// Bind the join input's variable: either to the extents a flattened
    /// child join added to `statement`, or to a new extent for a subselect.
    fn process_join_input_result(
        &mut self,
        fragment: SqlFragment,
        statement: &StatementRef,
        input: &ExpressionBinding,
        first_new_extent: usize,
    ) -> CompileResult<()> {
        if matches!(&fragment, SqlFragment::Statement(s) if Rc::ptr_eq(s, statement)) {
            let symbol = {
                let mut st = statement.borrow_mut();
                let extents: Vec<_> = st.from_extents.drain(first_new_extent..).collect();
                let symbol = Symbol::join(&input.var_name, input.var_type.clone(), JoinSymbol::new(extents));
                st.from_extents.push(symbol.clone());
                symbol
            };
            self.scopes.add(&input.var_name, symbol);
            return Ok(());
        }

        let mut from_symbol = None;
        match fragment {
            SqlFragment::Statement(sub) => {
                if sub.borrow().select.is_empty() {
                    let columns = self.add_default_columns(&sub)?;
                    if input.expr.is_join() || input.expr.is_apply() {
                        let extents = sub.borrow().from_extents.clone();
                        let nested = JoinSymbol::nested(extents, columns, Vec::new());
                        from_symbol = Some(Symbol::join(&input.var_name, input.var_type.clone(), nested));
                    } else {
                        let first = sub.borrow().from_extents.first().cloned();
                        if let Some(old) = first.as_ref().and_then(|s| s.as_join()) {
                            let nested = JoinSymbol::nested(old.extents.clone(), columns, old.flattened.clone());
                            from_symbol = Some(Symbol::join(&input.var_name, input.var_type.clone(), nested));
                        }
                    }
                }
                statement.borrow_mut().from.append("(").append(sub).append(")");
            }
            other if input.expr.is_scan() => {
                statement.borrow_mut().from.append(other);
            }
            other => Self::wrap_non_query_extent(statement, other, input.expr.is_function()),
        }

        let symbol = from_symbol.unwrap_or_else(|| Symbol::extent(&input.var_name, input.var_type.clone()));
        self.add_from_symbol(statement, &input.var_name, symbol.clone(), true);
        statement.borrow_mut().all_join_extents.get_or_insert_with(Vec::new).push(symbol);
        Ok(())
    }
}
