use super::QueryCompiler;
use crate::{
    generator::{CompileResult, FragmentBuilder, OperatorKind, OutputColumn, SqlFragment, StatementRef, SymbolRef},
    tree::{AggregateCall, Expr, FunctionMeta, GroupBinding},
};

impl QueryCompiler<'_> {
    /// Aggregates whose argument is more than a plain column get an inner
    /// statement computing `key_<i>` and `agg_<i>`; the outer statement then
    /// groups by and aggregates over those aliases.
    pub(super) fn visit_group_by(
        &mut self,
        input: &GroupBinding,
        keys: &[(String, Expr)],
        aggregates: &[(String, AggregateCall)],
    ) -> CompileResult<StatementRef> {
        let (inner, symbol) = self.visit_input_expression(&input.expr, &input.var_name, &input.var_type)?;
        let (inner, symbol) =
            self.ensure_accepts(inner, symbol, OperatorKind::GroupBy, &input.var_name, &input.var_type)?;

        self.statements.push(inner.clone());
        self.scopes.enter_scope();
        self.add_from_symbol(&inner, &input.var_name, symbol.clone(), true);
        self.scopes.add(&input.group_var_name, symbol);

        let grouped = self.build_group_by(&inner, input, keys, aggregates);
        self.scopes.exit_scope();
        self.statements.pop();
        grouped
    }

    fn build_group_by(
        &mut self,
        inner: &StatementRef,
        input: &GroupBinding,
        keys: &[(String, Expr)],
        aggregates: &[(String, AggregateCall)],
    ) -> CompileResult<StatementRef> {
        let needs_inner_query = aggregates.iter().any(|(_, agg)| !Self::is_plain_column(&agg.argument));
        let (outer, outer_from): (StatementRef, Option<SymbolRef>) = if needs_inner_query {
            let (outer, from) = self.create_new_select_statement(inner, &input.var_name, &input.var_type, false)?;
            self.add_from_symbol(&outer, &input.var_name, from.clone(), false);
            (outer, Some(from))
        } else {
            (inner.clone(), None)
        };

        let mut separator = "";
        for (i, (name, key)) in keys.iter().enumerate() {
            let key_sql = self.visit(key)?;
            match &outer_from {
                Some(from) => {
                    let alias = format!("key_{i}");
                    inner.borrow_mut().select.append(separator).append_line().append(key_sql).append(" AS ").append(alias.as_str());

                    let mut st = outer.borrow_mut();
                    st.select
                        .append(separator)
                        .append_line()
                        .append(from.clone())
                        .append(".")
                        .append(alias.as_str())
                        .append(" AS ")
                        .append(name.as_str());
                    st.group_by.append(separator).append(from.clone()).append(".").append(alias);
                    st.push_output(OutputColumn::Named(name.clone()));
                }
                None => {
                    let mut st = outer.borrow_mut();
                    st.select.append(separator).append_line().append(key_sql.clone()).append(" AS ").append(name.as_str());
                    st.group_by.append(separator).append(key_sql);
                    st.push_output(OutputColumn::Named(name.clone()));
                }
            }
            separator = ", ";
        }

        for (i, (name, aggregate)) in aggregates.iter().enumerate() {
            let argument_sql = self.visit(&aggregate.argument)?;
            let argument: SqlFragment = match &outer_from {
                Some(from) => {
                    let alias = format!("agg_{i}");
                    inner
                        .borrow_mut()
                        .select
                        .append(separator)
                        .append_line()
                        .append(argument_sql)
                        .append(" AS ")
                        .append(alias.as_str());
                    let mut qualified = FragmentBuilder::new();
                    qualified.append(from.clone()).append(".").append(alias);
                    qualified.into()
                }
                None => argument_sql,
            };

            let mut st = outer.borrow_mut();
            st.select
                .append(separator)
                .append_line()
                .append(Self::aggregate_sql(aggregate, argument))
                .append(" AS ")
                .append(name.as_str());
            st.push_output(OutputColumn::Named(name.clone()));
            separator = ", ";
        }

        Ok(outer)
    }

    /// `Property(VariableRef)`, the only argument shape aggregated in place.
    fn is_plain_column(argument: &Expr) -> bool {
        matches!(argument, Expr::Property { instance, .. } if matches!(instance.as_ref(), Expr::VariableRef { .. }))
    }

    fn aggregate_sql(aggregate: &AggregateCall, argument: SqlFragment) -> FragmentBuilder {
        let mut builder = FragmentBuilder::new();
        builder.append(Self::function_name(&aggregate.function)).append("(");
        if aggregate.distinct {
            builder.append("DISTINCT ");
        }
        builder.append(argument).append(")");
        builder
    }

    /// Built-ins are written bare; store functions get their schema prefix.
    pub(crate) fn function_name(function: &FunctionMeta) -> String {
        match &function.schema {
            Some(schema) if !function.built_in && !schema.is_empty() => format!("{schema}.{}", function.emitted_name()),
            _ => function.emitted_name().to_string(),
        }
    }
}
