mod grouping;
mod joins;
mod relational;
mod scalar;

use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::{
    generator::{
        CompileError, CompileResult, Fragment, FragmentBuilder, GeneratorConfig, JoinSymbol, OperatorKind,
        OutputColumn, Part, RenameContext, ScopeStack, SqlFragment, SqlWriter, Statement, StatementRef, Symbol,
        SymbolRef,
    },
    metadata::TypeUsage,
    tree::Expr,
};

/// Variable bound to inputs that reach a statement without a binding of their own.
const DEFAULT_INPUT_ALIAS: &str = "c";
const LIMIT_ALIAS: &str = "top";
const DISTINCT_ALIAS: &str = "dst";
const ELEMENT_ALIAS: &str = "element";
const SCALAR_COLUMN: &str = "X";

/// Query text plus the ordered names of the columns it returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub text: String,
    pub columns: Vec<String>,
}

/// Compiles one query expression. An instance owns all alias state of a
/// single compilation and is consumed by [`QueryCompiler::compile`].
pub struct QueryCompiler<'c> {
    config: &'c GeneratorConfig,
    statements: Vec<StatementRef>,
    join_context: Vec<bool>,
    scopes: ScopeStack,
    names: RenameContext,
    pending_var_ref: bool,
}

impl<'c> QueryCompiler<'c> {
    pub fn new(config: &'c GeneratorConfig) -> Self {
        Self {
            config,
            statements: Vec::new(),
            join_context: Vec::new(),
            scopes: ScopeStack::new(),
            names: RenameContext::new(),
            pending_var_ref: false,
        }
    }

    /// Visit the whole tree, then write it out, renaming aliases on the way.
    pub fn compile(mut self, query: &Expr) -> CompileResult<CompiledQuery> {
        let fragment = if query.result_type().is_collection() {
            let statement = self.visit_expression_ensure_statement(query, true)?;
            statement.borrow_mut().is_top_most = true;
            SqlFragment::Statement(statement)
        } else {
            let mut builder = FragmentBuilder::new();
            builder.append("SELECT ").append(self.visit(query)?);
            SqlFragment::Builder(builder)
        };

        if self.pending_var_ref {
            return Err(CompileError::unsupported("reference to a whole row variable"));
        }

        let mut writer = SqlWriter::new(self.config.pretty);
        Part::from(fragment.clone()).write_sql(&mut writer, &mut self.names)?;

        let columns = match &fragment {
            SqlFragment::Statement(statement) => statement.borrow().output_names(),
            _ => Vec::new(),
        };
        let text = writer.into_string();
        debug!(columns = columns.len(), len = text.len(), "query compiled");
        Ok(CompiledQuery { text, columns })
    }

    pub(crate) fn visit(&mut self, e: &Expr) -> CompileResult<SqlFragment> {
        match e {
            Expr::Scan(set) => Ok(self.visit_scan(set)),
            Expr::Filter { input, predicate } => Ok(self.visit_filter(input, predicate, false)?.into()),
            Expr::Project { input, projection } => Ok(self.visit_project(input, projection)?.into()),
            Expr::Join { kind, left, right, condition } => {
                Ok(self.visit_join(&[left, right], kind.keyword(), Some(condition.as_ref()))?.into())
            }
            Expr::CrossJoin { inputs } => {
                let inputs: Vec<_> = inputs.iter().collect();
                Ok(self.visit_join(&inputs, "CROSS JOIN", None)?.into())
            }
            Expr::Apply { .. } => Err(CompileError::unsupported("APPLY")),
            Expr::GroupBy { input, keys, aggregates } => Ok(self.visit_group_by(input, keys, aggregates)?.into()),
            Expr::Sort { input, keys } => Ok(self.visit_sort(input, keys)?.into()),
            Expr::Skip { input, keys, count } => Ok(self.visit_skip(input, keys, count)?.into()),
            Expr::Limit { input, count, with_ties } => Ok(self.visit_limit(input, count, *with_ties)?.into()),
            Expr::Distinct(input) => Ok(self.visit_distinct(input)?.into()),
            Expr::SetOp { kind, left, right } => self.visit_set_op(kind.keyword(), left, right),
            Expr::Element(input) => self.visit_element(input),
            Expr::IsEmpty(input) => self.visit_is_empty(input, false),
            Expr::Quantifier { kind, input, predicate } => self.visit_quantifier(*kind, input, predicate),
            Expr::NewCollection { element_type, items } => self.visit_new_collection(element_type, items),
            Expr::Constant(value) => self.visit_constant(value),
            Expr::Null(_) => Ok(SqlFragment::text("NULL")),
            Expr::Property { instance, name } => self.visit_property(instance, name),
            Expr::VariableRef { name, .. } => self.visit_variable(name),
            Expr::ParameterRef { name, .. } => Ok(SqlFragment::text(self.config.parameter_name(name))),
            Expr::Function(call) => self.visit_function(call),
            Expr::Case { branches, otherwise } => self.visit_case(branches, otherwise.as_deref()),
            Expr::Cast { arg, .. } => self.visit(arg),
            Expr::Arithmetic { op, left, right } => self.visit_binary(left, &format!(" {op} "), right),
            Expr::Negate(arg) => self.visit_negate(arg),
            Expr::Comparison { op, left, right } => self.visit_binary(left, &format!(" {op} "), right),
            Expr::And(left, right) => self.visit_binary(left, " AND ", right),
            Expr::Or(left, right) => self.visit_or(e, left, right),
            Expr::Not(arg) => self.visit_not(arg),
            Expr::IsNull(arg) => self.visit_is_null(arg, false),
            Expr::Like { arg, pattern, escape } => self.visit_like(arg, pattern, escape.as_deref()),
            Expr::NewRecord { .. } => Err(CompileError::unsupported("row constructor outside a projection")),
            Expr::Navigate { relationship, .. } => {
                Err(CompileError::unsupported(format!("relationship navigation '{relationship}'")))
            }
            Expr::TypeTest { kind, .. } => Err(CompileError::unsupported(format!("type test {kind:?}"))),
            Expr::Reference { kind, .. } => Err(CompileError::unsupported(format!("reference operator {kind:?}"))),
            Expr::Lambda { .. } => Err(CompileError::unsupported("lambda function")),
        }
    }

    fn current_statement(&self) -> CompileResult<StatementRef> {
        self.statements
            .last()
            .cloned()
            .ok_or_else(|| CompileError::invalid_state("no statement is being built"))
    }

    fn is_parent_a_join(&self) -> bool {
        self.join_context.last().copied().unwrap_or(false)
    }

    fn expect_statement(fragment: SqlFragment) -> CompileResult<StatementRef> {
        match fragment {
            SqlFragment::Statement(statement) => Ok(statement),
            other => Err(CompileError::invalid_state(format!("expected a statement, got {other:?}"))),
        }
    }

    /// FROM part for an input that did not produce a statement.
    fn wrap_non_query_extent(statement: &StatementRef, fragment: SqlFragment, is_function: bool) {
        let mut st = statement.borrow_mut();
        if is_function {
            st.from.append(fragment);
        } else {
            st.from.append("(").append(fragment).append(")");
        }
    }

    /// Visit a relational input and find the symbol its rows are reachable
    /// through. Several FROM extents (a flattened join) collapse into a join symbol.
    fn visit_input_expression(
        &mut self,
        input: &Expr,
        var_name: &str,
        var_type: &TypeUsage,
    ) -> CompileResult<(StatementRef, SymbolRef)> {
        let statement = match self.visit(input)? {
            SqlFragment::Statement(statement) => statement,
            other => {
                let statement = Statement::new_ref();
                Self::wrap_non_query_extent(&statement, other, input.is_function());
                statement
            }
        };

        let symbol = {
            let mut st = statement.borrow_mut();
            match st.from_extents.len() {
                0 => Symbol::extent(var_name, var_type.clone()),
                1 => st.from_extents[0].clone(),
                _ => {
                    let flattened = st.all_join_extents.clone().unwrap_or_default();
                    let join = JoinSymbol::new(st.from_extents.clone()).with_flattened(flattened);
                    let symbol = Symbol::join(var_name, var_type.clone(), join);
                    st.from_extents.clear();
                    st.from_extents.push(symbol.clone());
                    symbol
                }
            }
        };
        Ok((statement, symbol))
    }

    /// Start a statement selecting from `old`. With `finalize`, a pending
    /// star expansion of `old` is done first so its columns become nameable.
    fn create_new_select_statement(
        &mut self,
        old: &StatementRef,
        var_name: &str,
        var_type: &TypeUsage,
        finalize: bool,
    ) -> CompileResult<(StatementRef, SymbolRef)> {
        let mut from_symbol = None;
        if finalize && old.borrow().select.is_empty() {
            let columns = self.add_default_columns(old)?;
            let first = old.borrow().from_extents.first().cloned();
            if let Some(join) = first.as_ref().and_then(|s| s.as_join()) {
                let nested = JoinSymbol::nested(join.extents.clone(), columns, join.flattened.clone());
                from_symbol = Some(Symbol::join(var_name, var_type.clone(), nested));
            }
        }
        let from_symbol = from_symbol.unwrap_or_else(|| Symbol::extent(var_name, var_type.clone()));

        let statement = Statement::new_ref();
        statement.borrow_mut().from.append("(").append(old.clone()).append(")");
        Ok((statement, from_symbol))
    }

    /// Wrap `statement` unless `op` may still append to it.
    fn ensure_accepts(
        &mut self,
        statement: StatementRef,
        symbol: SymbolRef,
        op: OperatorKind,
        var_name: &str,
        var_type: &TypeUsage,
    ) -> CompileResult<(StatementRef, SymbolRef)> {
        if statement.borrow().accepts(op) {
            return Ok((statement, symbol));
        }
        trace!(operator = ?op, var = var_name, "wrapping statement");
        self.create_new_select_statement(&statement, var_name, var_type, true)
    }

    fn add_from_symbol(&mut self, statement: &StatementRef, var_name: &str, symbol: SymbolRef, add_to_scope: bool) {
        {
            let mut st = statement.borrow_mut();
            let already_first = st.from_extents.first().is_some_and(|f| Rc::ptr_eq(f, &symbol));
            if !already_first {
                st.from_extents.push(symbol.clone());
                st.from.append(" AS ").append(symbol.clone());
                self.names.extents.register(symbol.name());
            }
        }
        if add_to_scope {
            self.scopes.add(var_name, symbol);
        }
    }

    /// Expand an empty select list into every column of every FROM extent.
    fn add_default_columns(&mut self, statement: &StatementRef) -> CompileResult<Vec<SymbolRef>> {
        let extents = statement.borrow().from_extents.clone();
        let mut columns = Vec::new();
        let mut seen = IndexMap::new();
        let mut separator = "";
        for extent in &extents {
            self.add_columns(statement, extent, &mut columns, &mut seen, &mut separator);
        }
        if columns.is_empty() {
            return Err(CompileError::invalid_state("no columns to select from the statement's extents"));
        }
        Ok(columns)
    }

    fn add_columns(
        &mut self,
        statement: &StatementRef,
        symbol: &SymbolRef,
        columns: &mut Vec<SymbolRef>,
        seen: &mut IndexMap<String, SymbolRef>,
        separator: &mut &'static str,
    ) {
        if let Some(join) = symbol.as_join() {
            if !join.is_nested {
                for extent in &join.extents {
                    if extent.ty().is_some_and(TypeUsage::is_primitive) {
                        continue;
                    }
                    self.add_columns(statement, extent, columns, seen, separator);
                }
                return;
            }
            for column in &join.columns {
                {
                    let mut st = statement.borrow_mut();
                    st.select.append(*separator).append(symbol.clone()).append(".").append(column.clone());
                    st.push_output(OutputColumn::Symbol(column.clone()));
                }
                Self::note_column(seen, column.name(), column);
                columns.push(column.clone());
                *separator = ", ";
            }
            return;
        }

        // scalar extents expose their single value as X
        let members: Vec<String> = match symbol.ty() {
            Some(ty) if !ty.is_primitive() => ty.properties().iter().map(|m| m.name.clone()).collect(),
            _ => vec![SCALAR_COLUMN.to_string()],
        };
        for member in members {
            self.names.columns.register(&member);
            let column = symbol.column_or_insert(&member);
            {
                let mut st = statement.borrow_mut();
                st.select
                    .append(*separator)
                    .append(symbol.clone())
                    .append(".")
                    .append(member.as_str())
                    .append(" AS ")
                    .append(column.clone());
                st.push_output(OutputColumn::Symbol(column.clone()));
            }
            Self::note_column(seen, &member, &column);
            columns.push(column);
            *separator = ", ";
        }
    }

    // Two different symbols under one name: both get renamed when written.
    fn note_column(seen: &mut IndexMap<String, SymbolRef>, name: &str, column: &SymbolRef) {
        let key = name.to_ascii_lowercase();
        match seen.get(&key) {
            Some(existing) if !Rc::ptr_eq(existing, column) => {
                existing.mark_needs_renaming();
                column.mark_needs_renaming();
            }
            Some(_) => {}
            None => {
                seen.insert(key, column.clone());
            }
        }
    }

    /// Visit `e` and make sure a statement comes back, wrapping it over the
    /// default input alias when needed.
    fn visit_expression_ensure_statement(&mut self, e: &Expr, add_default_columns: bool) -> CompileResult<StatementRef> {
        let statement = match e {
            Expr::Project { .. } | Expr::Filter { .. } | Expr::GroupBy { .. } | Expr::Sort { .. } => {
                let fragment = self.visit(e)?;
                Self::expect_statement(fragment)?
            }
            _ => {
                let var_type = e.result_type().element_type().clone();
                self.scopes.enter_scope();
                let (statement, symbol) = self.visit_input_expression(e, DEFAULT_INPUT_ALIAS, &var_type)?;
                self.add_from_symbol(&statement, DEFAULT_INPUT_ALIAS, symbol, true);
                self.scopes.exit_scope();
                statement
            }
        };

        if add_default_columns && statement.borrow().select.is_empty() {
            self.add_default_columns(&statement)?;
        }
        Ok(statement)
    }
}
