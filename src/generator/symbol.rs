use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use indexmap::IndexMap;
use once_cell::unsync::OnceCell;

use crate::{
    generator::{CompileError, CompileResult, Fragment, RenameContext, SqlWriter},
    metadata::{Member, TypeUsage},
};

pub type SymbolRef = Rc<Symbol>;

/// The compiler's name for an extent or a column.
///
/// `name` never changes. The rendered name starts out equal to it and can be
/// replaced at most once, either by the statement that owns the extent or,
/// for columns flagged `needs_renaming`, the first time the column is written.
#[derive(Debug)]
pub struct Symbol {
    name: String,
    ty: Option<TypeUsage>,
    new_name: OnceCell<String>,
    needs_renaming: Cell<bool>,
    columns: RefCell<IndexMap<String, SymbolRef>>,
    join: Option<JoinSymbol>,
}

/// Extra state of a symbol that stands for a join.
///
/// `extents` are the direct inputs; `flattened` lists every leaf extent of a
/// flattened join chain and never contains another join symbol. A nested join
/// hides an inner statement whose select list is `columns`.
#[derive(Debug)]
pub struct JoinSymbol {
    pub extents: Vec<SymbolRef>,
    name_to_extent: IndexMap<String, SymbolRef>,
    pub columns: Vec<SymbolRef>,
    pub flattened: Vec<SymbolRef>,
    pub is_nested: bool,
}

impl JoinSymbol {
    pub fn new(extents: Vec<SymbolRef>) -> Self {
        let name_to_extent = extents
            .iter()
            .map(|e| (e.name().to_ascii_lowercase(), e.clone()))
            .collect();
        Self { extents, name_to_extent, columns: Vec::new(), flattened: Vec::new(), is_nested: false }
    }

    /// Join over an inner statement already finalized with `columns`.
    pub fn nested(extents: Vec<SymbolRef>, columns: Vec<SymbolRef>, flattened: Vec<SymbolRef>) -> Self {
        Self { columns, flattened, is_nested: true, ..Self::new(extents) }
    }

    pub fn with_flattened(mut self, flattened: Vec<SymbolRef>) -> Self {
        self.flattened = flattened;
        self
    }

    /// Input extent bound to the join variable `name`.
    pub fn extent(&self, name: &str) -> Option<SymbolRef> {
        self.name_to_extent.get(&name.to_ascii_lowercase()).cloned()
    }
}

impl Symbol {
    fn build(name: &str, ty: Option<TypeUsage>, join: Option<JoinSymbol>) -> SymbolRef {
        Rc::new(Self {
            name: name.to_string(),
            ty,
            new_name: OnceCell::new(),
            needs_renaming: Cell::new(false),
            columns: RefCell::new(IndexMap::new()),
            join,
        })
    }

    pub fn extent(name: &str, ty: TypeUsage) -> SymbolRef {
        Self::build(name, Some(ty), None)
    }

    pub fn column(name: &str) -> SymbolRef {
        Self::build(name, None, None)
    }

    pub fn join(name: &str, ty: TypeUsage, join: JoinSymbol) -> SymbolRef {
        Self::build(name, Some(ty), Some(join))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_name(&self) -> &str {
        self.new_name.get().map(String::as_str).unwrap_or(&self.name)
    }

    pub fn ty(&self) -> Option<&TypeUsage> {
        self.ty.as_ref()
    }

    pub fn is_renamed(&self) -> bool {
        self.new_name.get().is_some()
    }

    /// Assign the rendered name. Returns false if the symbol was already renamed.
    #[must_use]
    pub fn rename(&self, new_name: String) -> bool {
        self.new_name.set(new_name).is_ok()
    }

    pub fn needs_renaming(&self) -> bool {
        self.needs_renaming.get()
    }

    pub fn mark_needs_renaming(&self) {
        self.needs_renaming.set(true);
    }

    pub fn as_join(&self) -> Option<&JoinSymbol> {
        self.join.as_ref()
    }

    pub fn is_join(&self) -> bool {
        self.join.is_some()
    }

    /// Row members of the symbol's type.
    pub fn properties(&self) -> &[Member] {
        self.ty.as_ref().map(TypeUsage::properties).unwrap_or(&[])
    }

    pub fn column_symbol(&self, name: &str) -> Option<SymbolRef> {
        self.columns.borrow().get(&name.to_ascii_lowercase()).cloned()
    }

    /// Column symbol for member `name`, created on first use.
    pub fn column_or_insert(&self, name: &str) -> SymbolRef {
        self.columns
            .borrow_mut()
            .entry(name.to_ascii_lowercase())
            .or_insert_with(|| Symbol::column(name))
            .clone()
    }
}

impl Fragment for Symbol {
    fn write_sql(&self, writer: &mut SqlWriter, ctx: &mut RenameContext) -> CompileResult<()> {
        if self.needs_renaming.get() && !self.is_renamed() {
            let fresh = ctx.fresh_column_name(&self.name);
            if !self.rename(fresh) {
                return Err(CompileError::invalid_state(format!("column '{}' renamed twice", self.name)));
            }
            self.needs_renaming.set(false);
        }
        writer.write(self.current_name());
        Ok(())
    }
}

/// A column reached through a nested join: `source` is the join extent that
/// is written, `column` the symbol it exposes.
#[derive(Debug, Clone)]
pub struct SymbolPair {
    pub source: SymbolRef,
    pub column: SymbolRef,
}

impl SymbolPair {
    pub fn new(source: SymbolRef, column: SymbolRef) -> Self {
        Self { source, column }
    }
}
