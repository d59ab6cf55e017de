use super::QueryCompiler;
use crate::{
    generator::{
        literal::render_literal, CompileError, CompileResult, FragmentBuilder, KeyToListMap, SqlFragment, SymbolPair,
    },
    tree::{ComparisonOp, ConstantValue, Expr, FunctionCall},
};

type InTerms<'e> = KeyToListMap<&'e Expr, &'e Expr>;

impl QueryCompiler<'_> {
    pub(super) fn visit_constant(&mut self, value: &ConstantValue) -> CompileResult<SqlFragment> {
        Ok(SqlFragment::text(render_literal(value)?))
    }

    pub(super) fn visit_variable(&mut self, name: &str) -> CompileResult<SqlFragment> {
        if self.pending_var_ref {
            return Err(CompileError::unsupported("reference to a whole row variable"));
        }
        self.pending_var_ref = true;

        let symbol = self
            .scopes
            .lookup(name)
            .ok_or_else(|| CompileError::invalid_argument(format!("unbound variable '{name}'")))?;
        self.current_statement()?;
        // Every statement between the reference and the owner sees the name as taken.
        for statement in self.statements.iter().rev() {
            let mut st = statement.borrow_mut();
            if st.contains_from_extent(&symbol) {
                break;
            }
            st.add_outer_extent(symbol.clone());
        }
        Ok(SqlFragment::Symbol(symbol))
    }

    pub(super) fn visit_property(&mut self, instance: &Expr, name: &str) -> CompileResult<SqlFragment> {
        let instance_sql = self.visit(instance)?;
        if matches!(instance, Expr::VariableRef { .. }) {
            self.pending_var_ref = false;
        }

        let missing = || CompileError::invalid_state(format!("join has no input named '{name}'"));
        let mut builder = FragmentBuilder::new();
        match instance_sql {
            SqlFragment::Symbol(symbol) if symbol.is_join() => {
                let Some(join) = symbol.as_join() else {
                    return Err(missing());
                };
                let extent = join.extent(name).ok_or_else(missing)?;
                if join.is_nested {
                    return Ok(SqlFragment::Pair(SymbolPair::new(symbol.clone(), extent)));
                }
                return Ok(SqlFragment::Symbol(extent));
            }
            SqlFragment::Pair(pair) => {
                if let Some(join) = pair.column.as_join() {
                    let column = join.extent(name).ok_or_else(missing)?;
                    return Ok(SqlFragment::Pair(SymbolPair::new(pair.source.clone(), column)));
                }
                builder.append(pair.source.clone()).append(".");
                match pair.column.column_symbol(name) {
                    Some(column) => builder.append(column),
                    None => builder.append(name),
                };
            }
            other => {
                builder.append(other).append(".").append(name);
            }
        }
        Ok(builder.into())
    }

    pub(super) fn visit_function(&mut self, call: &FunctionCall) -> CompileResult<SqlFragment> {
        let function = &call.function;
        let mut builder = FragmentBuilder::new();
        builder.append(Self::function_name(function));
        if function.niladic {
            if !call.args.is_empty() {
                return Err(CompileError::invalid_state(format!(
                    "niladic function '{}' called with arguments",
                    function.name
                )));
            }
            return Ok(builder.into());
        }

        builder.append("(");
        let mut separator = "";
        for arg in &call.args {
            builder.append(separator).append(self.visit(arg)?);
            separator = ", ";
        }
        builder.append(")");
        Ok(builder.into())
    }

    pub(super) fn visit_case(&mut self, branches: &[(Expr, Expr)], otherwise: Option<&Expr>) -> CompileResult<SqlFragment> {
        let mut builder = FragmentBuilder::new();
        builder.append("CASE");
        for (when, then) in branches {
            builder.append(" WHEN (").append(self.visit(when)?).append(") THEN ").append(self.visit(then)?);
        }
        if let Some(otherwise) = otherwise.filter(|e| !e.is_null_literal()) {
            builder.append(" ELSE ").append(self.visit(otherwise)?);
        }
        builder.append(" END");
        Ok(builder.into())
    }

    pub(super) fn visit_negate(&mut self, arg: &Expr) -> CompileResult<SqlFragment> {
        let mut builder = FragmentBuilder::new();
        builder.append("-(").append(self.visit(arg)?).append(")");
        Ok(builder.into())
    }

    pub(super) fn visit_like(&mut self, arg: &Expr, pattern: &Expr, escape: Option<&Expr>) -> CompileResult<SqlFragment> {
        let mut builder = FragmentBuilder::new();
        builder.append(self.visit(arg)?).append(" LIKE ").append(self.visit(pattern)?);
        if let Some(escape) = escape.filter(|e| !e.is_null_literal()) {
            builder.append(" ESCAPE ").append(self.visit(escape)?);
        }
        Ok(builder.into())
    }

    pub(super) fn visit_is_null(&mut self, arg: &Expr, negate: bool) -> CompileResult<SqlFragment> {
        let mut builder = FragmentBuilder::new();
        builder.append(self.visit(arg)?);
        builder.append(if negate { " IS NOT NULL" } else { " IS NULL" });
        Ok(builder.into())
    }

    pub(super) fn visit_not(&mut self, arg: &Expr) -> CompileResult<SqlFragment> {
        match arg {
            Expr::Not(inner) => self.visit(inner),
            Expr::IsEmpty(inner) => self.visit_is_empty(inner, true),
            Expr::IsNull(inner) => self.visit_is_null(inner, true),
            Expr::Comparison { op: ComparisonOp::Eq, left, right } => self.visit_binary(left, " <> ", right),
            other => {
                let mut builder = FragmentBuilder::new();
                builder.append("NOT (").append(self.visit(other)?).append(")");
                Ok(builder.into())
            }
        }
    }

    pub(super) fn visit_binary(&mut self, left: &Expr, op: &str, right: &Expr) -> CompileResult<SqlFragment> {
        let mut builder = FragmentBuilder::new();
        builder.append(self.parenthesize_if_needed(left)?);
        builder.append(op);
        builder.append(self.parenthesize_if_needed(right)?);
        Ok(builder.into())
    }

    fn parenthesize_if_needed(&mut self, e: &Expr) -> CompileResult<FragmentBuilder> {
        let sql = self.visit(e)?;
        let mut builder = FragmentBuilder::new();
        if Self::needs_parentheses(e) {
            builder.append("(").append(sql).append(")");
        } else {
            builder.append(sql);
        }
        Ok(builder)
    }

    fn needs_parentheses(e: &Expr) -> bool {
        match e {
            Expr::Constant(_) | Expr::ParameterRef { .. } | Expr::Property { .. } => false,
            Expr::Or(..) => !Self::in_rewrite_parenthesizes(e),
            _ => true,
        }
    }

    /// `a = 1 OR a = 2 OR a IS NULL` becomes `(a IN (1,2) OR a IS NULL)`.
    /// Anything that is not a pure disjunction of such terms, or where no key
    /// collects two terms, stays a plain OR.
    pub(super) fn visit_or(&mut self, e: &Expr, left: &Expr, right: &Expr) -> CompileResult<SqlFragment> {
        match Self::in_rewrite_terms(e) {
            Some(terms) => self.translate_into_in(&terms),
            None => self.visit_binary(left, " OR ", right),
        }
    }

    fn in_rewrite_terms(e: &Expr) -> Option<InTerms<'_>> {
        let same: fn(&&Expr, &&Expr) -> bool = |a, b| Self::same_in_key(a, b);
        let mut terms = KeyToListMap::new(same);
        if !Self::collect_in_terms(e, &mut terms) {
            return None;
        }
        terms.entries().iter().any(|(_, values)| values.len() > 1).then_some(terms)
    }

    fn in_rewrite_parenthesizes(e: &Expr) -> bool {
        Self::in_rewrite_terms(e).is_some_and(|terms| Self::disjunct_count(&terms) > 1)
    }

    fn collect_in_terms<'e>(e: &'e Expr, terms: &mut InTerms<'e>) -> bool {
        match e {
            Expr::Comparison { op: ComparisonOp::Eq, left, right } => {
                if Self::is_in_key(left) {
                    terms.add(left.as_ref(), right.as_ref());
                    true
                } else if Self::is_in_key(right) {
                    terms.add(right.as_ref(), left.as_ref());
                    true
                } else {
                    false
                }
            }
            Expr::IsNull(arg) if Self::is_in_key(arg) => {
                terms.add(arg.as_ref(), e);
                true
            }
            Expr::Or(left, right) => Self::collect_in_terms(left, terms) && Self::collect_in_terms(right, terms),
            _ => false,
        }
    }

    fn is_in_key(e: &Expr) -> bool {
        match e {
            Expr::VariableRef { .. } | Expr::ParameterRef { .. } => true,
            Expr::Property { instance, .. } => Self::is_in_key(instance),
            _ => false,
        }
    }

    fn same_in_key(a: &Expr, b: &Expr) -> bool {
        match (a, b) {
            (Expr::Property { instance: ia, name: na }, Expr::Property { instance: ib, name: nb }) => {
                na.eq_ignore_ascii_case(nb) && Self::same_in_key(ia, ib)
            }
            (Expr::VariableRef { name: na, .. }, Expr::VariableRef { name: nb, .. }) => na.eq_ignore_ascii_case(nb),
            (Expr::ParameterRef { name: na, .. }, Expr::ParameterRef { name: nb, .. }) => na == nb,
            _ => false,
        }
    }

    fn disjunct_count(terms: &InTerms<'_>) -> usize {
        terms
            .entries()
            .iter()
            .map(|(_, values)| {
                let has_null = values.iter().any(|v| matches!(v, Expr::IsNull(_)));
                let has_values = values.iter().any(|v| !matches!(v, Expr::IsNull(_)));
                usize::from(has_values) + usize::from(has_null)
            })
            .sum()
    }

    fn translate_into_in(&mut self, terms: &InTerms<'_>) -> CompileResult<SqlFragment> {
        let wrap = Self::disjunct_count(terms) > 1;
        let mut builder = FragmentBuilder::new();
        if wrap {
            builder.append("(");
        }

        let mut first_key = true;
        for (key, values) in terms.entries() {
            if !first_key {
                builder.append(" OR ");
            }
            first_key = false;

            let real: Vec<&Expr> = values.iter().copied().filter(|v| !matches!(v, Expr::IsNull(_))).collect();
            match real.as_slice() {
                [] => {}
                [value] => {
                    builder.append(self.parenthesize_if_needed(key)?).append(" = ");
                    builder.append(self.parenthesize_if_needed(value)?);
                }
                many => {
                    builder.append(self.parenthesize_if_needed(key)?).append(" IN (");
                    let mut separator = "";
                    for value in many {
                        builder.append(separator).append(self.parenthesize_if_needed(value)?);
                        separator = ",";
                    }
                    builder.append(")");
                }
            }

            if let Some(Expr::IsNull(arg)) = values.iter().copied().find(|v| matches!(v, Expr::IsNull(_))) {
                if !real.is_empty() {
                    builder.append(" OR ");
                }
                builder.append(self.visit_is_null(arg, false)?);
            }
        }

        if wrap {
            builder.append(")");
        }
        Ok(builder.into())
    }
}
