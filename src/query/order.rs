//! Ordering specifications.

use crate::expr::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Asc,
    Desc,
}

/// Where null keys sort
///
/// `Default` leaves it to the store; both bundled stores put nulls last for
/// ascending and first for descending keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NullPlacement {
    #[default]
    Default,
    First,
    Last,
}

/// One sort key: expression, direction and null placement
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    pub(crate) expr: Expr,
    pub(crate) direction: Direction,
    pub(crate) nulls: NullPlacement,
}

impl OrderSpec {
    pub fn new(expr: Expr, direction: Direction) -> Self {
        Self {
            expr,
            direction,
            nulls: NullPlacement::Default,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = NullPlacement::First;
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = NullPlacement::Last;
        self
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn nulls(&self) -> NullPlacement {
        self.nulls
    }

    /// Whether nulls end up after non-null keys for this spec
    pub fn nulls_sort_last(&self) -> bool {
        match self.nulls {
            NullPlacement::First => false,
            NullPlacement::Last => true,
            NullPlacement::Default => self.direction == Direction::Asc,
        }
    }
}
