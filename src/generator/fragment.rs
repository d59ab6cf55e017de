use crate::generator::{CompileResult, RenameContext, SqlWriter, StatementRef, SymbolPair, SymbolRef};

/// Anything that can write itself as query text once all aliases are known.
pub trait Fragment {
    fn write_sql(&self, writer: &mut SqlWriter, ctx: &mut RenameContext) -> CompileResult<()>;
}

/// One element of a `FragmentBuilder`.
#[derive(Debug, Clone)]
pub enum Part {
    Text(String),
    Char(char),
    /// A clause break: a newline in pretty output, a space otherwise.
    Line,
    Symbol(SymbolRef),
    Builder(FragmentBuilder),
    Statement(StatementRef),
}

impl Fragment for Part {
    fn write_sql(&self, writer: &mut SqlWriter, ctx: &mut RenameContext) -> CompileResult<()> {
        match self {
            Part::Text(text) => writer.write(text),
            Part::Char(c) => writer.write_char(*c),
            Part::Line => writer.new_line(),
            Part::Symbol(symbol) => symbol.write_sql(writer, ctx)?,
            Part::Builder(builder) => builder.write_sql(writer, ctx)?,
            Part::Statement(statement) => statement.borrow().write_sql(writer, ctx)?,
        }
        Ok(())
    }
}

impl From<&str> for Part {
    fn from(text: &str) -> Self {
        Part::Text(text.to_string())
    }
}

impl From<String> for Part {
    fn from(text: String) -> Self {
        Part::Text(text)
    }
}

impl From<char> for Part {
    fn from(c: char) -> Self {
        Part::Char(c)
    }
}

impl From<SymbolRef> for Part {
    fn from(symbol: SymbolRef) -> Self {
        Part::Symbol(symbol)
    }
}

impl From<FragmentBuilder> for Part {
    fn from(builder: FragmentBuilder) -> Self {
        Part::Builder(builder)
    }
}

impl From<StatementRef> for Part {
    fn from(statement: StatementRef) -> Self {
        Part::Statement(statement)
    }
}

impl From<SqlFragment> for Part {
    fn from(fragment: SqlFragment) -> Self {
        match fragment {
            SqlFragment::Builder(builder) => Part::Builder(builder),
            SqlFragment::Statement(statement) => Part::Statement(statement),
            SqlFragment::Symbol(symbol) => Part::Symbol(symbol),
            SqlFragment::Pair(pair) => Part::Symbol(pair.source),
        }
    }
}

/// Append-only, order-preserving list of parts.
#[derive(Debug, Clone, Default)]
pub struct FragmentBuilder {
    parts: Vec<Part>,
}

impl FragmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, part: impl Into<Part>) -> &mut Self {
        self.parts.push(part.into());
        self
    }

    pub fn append_line(&mut self) -> &mut Self {
        self.parts.push(Part::Line);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }
}

impl Fragment for FragmentBuilder {
    fn write_sql(&self, writer: &mut SqlWriter, ctx: &mut RenameContext) -> CompileResult<()> {
        for part in &self.parts {
            part.write_sql(writer, ctx)?;
        }
        Ok(())
    }
}

/// What visiting one expression node yields.
#[derive(Debug, Clone)]
pub enum SqlFragment {
    Builder(FragmentBuilder),
    Statement(StatementRef),
    Symbol(SymbolRef),
    /// Property access into a nested join; only meaningful to an enclosing
    /// property access, otherwise it writes its source extent.
    Pair(SymbolPair),
}

impl From<FragmentBuilder> for SqlFragment {
    fn from(builder: FragmentBuilder) -> Self {
        SqlFragment::Builder(builder)
    }
}

impl From<StatementRef> for SqlFragment {
    fn from(statement: StatementRef) -> Self {
        SqlFragment::Statement(statement)
    }
}

impl From<SymbolRef> for SqlFragment {
    fn from(symbol: SymbolRef) -> Self {
        SqlFragment::Symbol(symbol)
    }
}

impl SqlFragment {
    pub fn text(text: impl Into<String>) -> Self {
        let mut builder = FragmentBuilder::new();
        builder.append(text.into());
        SqlFragment::Builder(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::Symbol;

    fn render(builder: &FragmentBuilder) -> String {
        let mut w = SqlWriter::new(false);
        builder.write_sql(&mut w, &mut RenameContext::new()).unwrap();
        w.into_string()
    }

    #[test]
    fn parts_render_in_order() {
        let x = Symbol::column("x");
        let mut inner = FragmentBuilder::new();
        inner.append("a").append('.').append(x);
        let mut b = FragmentBuilder::new();
        b.append("(").append(inner).append(" + 1)");
        assert_eq!(render(&b), "(a.x + 1)");
        assert_eq!(b.parts().len(), 3);
    }

    #[test]
    fn emptiness_counts_parts() {
        let mut b = FragmentBuilder::new();
        assert!(b.is_empty());
        b.append_line();
        assert!(!b.is_empty());
    }
}
