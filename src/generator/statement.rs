use std::{cell::RefCell, rc::Rc};

use crate::generator::{
    CompileError, CompileResult, Fragment, FragmentBuilder, RenameContext, SqlWriter, SymbolRef,
};

pub type StatementRef = Rc<RefCell<Statement>>;

/// Relational operators that may append into an existing statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Filter,
    Project,
    Sort,
    GroupBy,
    Skip,
    Distinct,
    Limit,
    Element,
}

/// `LIMIT <count>`
#[derive(Debug, Clone)]
pub struct TopClause {
    pub count: FragmentBuilder,
}

/// `OFFSET <count>`
#[derive(Debug, Clone)]
pub struct SkipClause {
    pub count: FragmentBuilder,
}

impl TopClause {
    pub fn new(count: FragmentBuilder) -> Self {
        Self { count }
    }
}

impl SkipClause {
    pub fn new(count: FragmentBuilder) -> Self {
        Self { count }
    }
}

impl Fragment for TopClause {
    fn write_sql(&self, writer: &mut SqlWriter, ctx: &mut RenameContext) -> CompileResult<()> {
        writer.write(" LIMIT ");
        self.count.write_sql(writer, ctx)
    }
}

impl Fragment for SkipClause {
    fn write_sql(&self, writer: &mut SqlWriter, ctx: &mut RenameContext) -> CompileResult<()> {
        writer.write(" OFFSET ");
        self.count.write_sql(writer, ctx)
    }
}

/// Name of one entry of the select list.
#[derive(Debug, Clone)]
pub enum OutputColumn {
    Named(String),
    Symbol(SymbolRef),
}

impl OutputColumn {
    pub fn rendered_name(&self) -> String {
        match self {
            OutputColumn::Named(name) => name.clone(),
            OutputColumn::Symbol(symbol) => symbol.current_name().to_string(),
        }
    }
}

/// One SELECT block under construction.
///
/// Clauses only ever grow. Whether the next operator may still append to a
/// statement is decided by [`Statement::accepts`].
#[derive(Debug, Default)]
pub struct Statement {
    pub is_distinct: bool,
    pub select: FragmentBuilder,
    pub from: FragmentBuilder,
    pub where_clause: FragmentBuilder,
    pub group_by: FragmentBuilder,
    pub order_by: FragmentBuilder,
    top: Option<TopClause>,
    skip: Option<SkipClause>,
    /// Extents of the FROM clause. A join chain collapses into one join symbol.
    pub from_extents: Vec<SymbolRef>,
    /// Every leaf extent of a flattened join, in FROM order.
    pub all_join_extents: Option<Vec<SymbolRef>>,
    outer_extents: Vec<SymbolRef>,
    pub is_top_most: bool,
    output: Vec<OutputColumn>,
}

impl Statement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_ref() -> StatementRef {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn top(&self) -> Option<&TopClause> {
        self.top.as_ref()
    }

    pub fn set_top(&mut self, top: TopClause) -> CompileResult<()> {
        if self.top.is_some() {
            return Err(CompileError::invalid_state("statement already has a LIMIT clause"));
        }
        self.top = Some(top);
        Ok(())
    }

    pub fn skip(&self) -> Option<&SkipClause> {
        self.skip.as_ref()
    }

    pub fn set_skip(&mut self, skip: SkipClause) -> CompileResult<()> {
        if self.skip.is_some() {
            return Err(CompileError::invalid_state("statement already has an OFFSET clause"));
        }
        self.skip = Some(skip);
        Ok(())
    }

    pub fn has_order_by_limit_or_offset(&self) -> bool {
        !self.order_by.is_empty() || self.top.is_some() || self.skip.is_some()
    }

    /// Whether `op` can add its clause to this statement instead of wrapping it.
    pub fn accepts(&self, op: OperatorKind) -> bool {
        match op {
            OperatorKind::Filter => {
                self.select.is_empty() && self.where_clause.is_empty() && self.group_by.is_empty() && self.top.is_none()
            }
            OperatorKind::Project => self.select.is_empty() && self.group_by.is_empty(),
            OperatorKind::Sort => {
                self.select.is_empty() && self.group_by.is_empty() && self.order_by.is_empty() && self.top.is_none()
            }
            OperatorKind::GroupBy => self.select.is_empty() && self.group_by.is_empty() && self.order_by.is_empty(),
            OperatorKind::Skip => {
                self.select.is_empty() && self.group_by.is_empty() && self.order_by.is_empty() && !self.is_distinct
            }
            OperatorKind::Distinct => self.top.is_none() && self.order_by.is_empty(),
            OperatorKind::Limit | OperatorKind::Element => self.top.is_none(),
        }
    }

    pub fn outer_extents(&self) -> &[SymbolRef] {
        &self.outer_extents
    }

    pub fn add_outer_extent(&mut self, symbol: SymbolRef) {
        if !self.outer_extents.iter().any(|s| Rc::ptr_eq(s, &symbol)) {
            self.outer_extents.push(symbol);
        }
    }

    pub fn contains_from_extent(&self, symbol: &SymbolRef) -> bool {
        self.from_extents.iter().any(|s| Rc::ptr_eq(s, symbol))
    }

    pub fn push_output(&mut self, column: OutputColumn) {
        self.output.push(column);
    }

    /// Aliases of the select list as rendered. Only final after the statement was written.
    pub fn output_names(&self) -> Vec<String> {
        self.output.iter().map(OutputColumn::rendered_name).collect()
    }

    /// Rename own extents that clash with extents referenced from enclosing
    /// statements or with each other.
    fn resolve_extent_aliases(&self, ctx: &mut RenameContext) -> CompileResult<()> {
        let mut taken: Vec<String> = Vec::new();
        for outer in &self.outer_extents {
            match outer.as_join() {
                Some(join) if !join.flattened.is_empty() => {
                    taken.extend(join.flattened.iter().map(|s| s.current_name().to_string()));
                }
                _ => taken.push(outer.current_name().to_string()),
            }
        }

        let extents = self.all_join_extents.as_ref().unwrap_or(&self.from_extents);
        for extent in extents {
            if taken.iter().any(|t| t.eq_ignore_ascii_case(extent.name())) {
                let fresh = ctx.fresh_extent_name(extent.name());
                if !extent.rename(fresh) {
                    return Err(CompileError::invalid_state(format!(
                        "extent '{}' is already bound under another alias",
                        extent.name()
                    )));
                }
            }
            taken.push(extent.current_name().to_string());
        }
        Ok(())
    }

    fn write_clauses(&self, writer: &mut SqlWriter, ctx: &mut RenameContext) -> CompileResult<()> {
        writer.write("SELECT ");
        if self.is_distinct {
            writer.write("DISTINCT ");
        }
        if self.select.is_empty() {
            return Err(CompileError::invalid_state("statement written with an empty select list"));
        }
        self.select.write_sql(writer, ctx)?;

        if !self.from.is_empty() {
            writer.new_line();
            writer.write("FROM ");
            self.from.write_sql(writer, ctx)?;
        }

        if !self.where_clause.is_empty() {
            writer.new_line();
            writer.write("WHERE ");
            self.where_clause.write_sql(writer, ctx)?;
        }

        if !self.group_by.is_empty() {
            writer.new_line();
            writer.write("GROUP BY ");
            self.group_by.write_sql(writer, ctx)?;
        }

        if !self.order_by.is_empty() && (self.is_top_most || self.top.is_some() || self.skip.is_some()) {
            writer.new_line();
            writer.write("ORDER BY ");
            self.order_by.write_sql(writer, ctx)?;
        }

        if let Some(top) = &self.top {
            top.write_sql(writer, ctx)?;
        }

        if let Some(skip) = &self.skip {
            skip.write_sql(writer, ctx)?;
        }
        Ok(())
    }
}

impl Fragment for Statement {
    fn write_sql(&self, writer: &mut SqlWriter, ctx: &mut RenameContext) -> CompileResult<()> {
        self.resolve_extent_aliases(ctx)?;
        writer.indent();
        let written = self.write_clauses(writer, ctx);
        writer.dedent();
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        generator::{Symbol, SymbolRef},
        metadata::TypeUsage,
    };

    fn extent(name: &str) -> SymbolRef {
        Symbol::extent(name, TypeUsage::Row(Default::default()))
    }

    fn render(statement: &Statement, ctx: &mut RenameContext) -> CompileResult<String> {
        let mut w = SqlWriter::new(false);
        statement.write_sql(&mut w, ctx)?;
        Ok(w.into_string())
    }

    fn simple(alias: &SymbolRef) -> Statement {
        let mut s = Statement::new();
        s.select.append(alias.clone()).append(".Name");
        s.from.append("Win32_Process AS ").append(alias.clone());
        s.from_extents.push(alias.clone());
        s
    }

    #[test]
    fn clauses_render_in_fixed_order() {
        let p = extent("p");
        let mut s = simple(&p);
        s.is_distinct = true;
        s.where_clause.append(p.clone()).append(".Handle = 4");
        s.order_by.append(p.clone()).append(".Name ASC");
        s.set_top(TopClause::new({
            let mut b = FragmentBuilder::new();
            b.append("5");
            b
        }))
        .unwrap();
        let text = render(&s, &mut RenameContext::new()).unwrap();
        assert_eq!(
            text,
            "SELECT DISTINCT p.Name FROM Win32_Process AS p WHERE p.Handle = 4 ORDER BY p.Name ASC LIMIT 5"
        );
    }

    #[test]
    fn order_by_is_dropped_below_the_top_without_limit() {
        let p = extent("p");
        let mut s = simple(&p);
        s.order_by.append("p.Name ASC");
        assert_eq!(render(&s, &mut RenameContext::new()).unwrap(), "SELECT p.Name FROM Win32_Process AS p");
        s.is_top_most = true;
        assert!(render(&s, &mut RenameContext::new()).unwrap().ends_with("ORDER BY p.Name ASC"));
    }

    #[test]
    fn empty_select_is_invalid_state() {
        let s = Statement::new();
        assert!(matches!(render(&s, &mut RenameContext::new()), Err(CompileError::InvalidState(_))));
    }

    #[test]
    fn extents_clashing_with_outer_references_are_renamed() {
        let outer = extent("p");
        let inner = extent("p");
        let mut ctx = RenameContext::new();
        ctx.extents.register("p");
        let mut s = simple(&inner);
        s.add_outer_extent(outer.clone());
        s.add_outer_extent(outer);
        assert_eq!(s.outer_extents().len(), 1);
        let text = render(&s, &mut ctx).unwrap();
        assert_eq!(text, "SELECT p1.Name FROM Win32_Process AS p1");
    }

    #[test]
    fn clashing_extent_with_a_fixed_alias_is_an_error() {
        let outer = extent("p");
        let inner = extent("p");
        assert!(inner.rename("p7".into()));
        let mut s = simple(&inner);
        s.add_outer_extent(outer);
        let err = render(&s, &mut RenameContext::new()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidState(_)), "{err:?}");
    }

    #[test]
    fn compatibility_table() {
        let mut s = Statement::new();
        assert!(s.accepts(OperatorKind::Filter));
        assert!(s.accepts(OperatorKind::Skip));
        s.where_clause.append("x");
        assert!(!s.accepts(OperatorKind::Filter));
        assert!(s.accepts(OperatorKind::Project));
        s.order_by.append("x");
        assert!(!s.accepts(OperatorKind::Sort));
        assert!(!s.accepts(OperatorKind::GroupBy));
        assert!(!s.accepts(OperatorKind::Distinct));
        assert!(s.accepts(OperatorKind::Limit));

        let mut d = Statement::new();
        d.is_distinct = true;
        assert!(!d.accepts(OperatorKind::Skip));
        d.set_top(TopClause::new(FragmentBuilder::new())).unwrap();
        assert!(!d.accepts(OperatorKind::Limit));
        assert!(!d.accepts(OperatorKind::Element));
        assert!(!d.accepts(OperatorKind::Filter));
        assert!(d.set_top(TopClause::new(FragmentBuilder::new())).is_err());
    }
}
