//! Projection shapes.

use crate::expr::Expr;

/// One projected column with an optional alias
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub(crate) expr: Expr,
    pub(crate) alias: Option<String>,
}

impl SelectItem {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: &str) -> Self {
        Self {
            expr,
            alias: Some(alias.to_string()),
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// The result-row label: the alias, or the expression's own label
    pub fn label(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => self.expr.label(),
        }
    }
}

impl From<Expr> for SelectItem {
    fn from(expr: Expr) -> Self {
        SelectItem::new(expr)
    }
}

impl From<&Expr> for SelectItem {
    fn from(expr: &Expr) -> Self {
        SelectItem::new(expr.clone())
    }
}

/// How projected rows become caller objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindStrategy {
    /// Fields matched by label
    Field,
    /// Default-constructed object, properties set by label
    Accessor,
    /// Positional constructor arguments
    Constructor,
}

/// What a query returns per row
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Every attribute of the root source, plus fetch-joined attributes
    Entity,
    /// Explicit items
    Columns {
        items: Vec<SelectItem>,
        strategy: Option<BindStrategy>,
    },
    /// A single `count` column holding the number of matching rows
    Count,
    /// A single `count` column holding the number of rows the inner
    /// projection would produce; used for grouped and distinct queries
    CountRows(Box<Projection>),
}

impl Projection {
    pub fn items(&self) -> &[SelectItem] {
        match self {
            Projection::Columns { items, .. } => items,
            _ => &[],
        }
    }

    pub fn strategy(&self) -> Option<BindStrategy> {
        match self {
            Projection::Columns { strategy, .. } => *strategy,
            _ => None,
        }
    }
}
