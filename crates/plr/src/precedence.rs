//! Automatic resolution of conflicting parser actions.

use crate::{
    grammar::{Assoc, ContextFreeGrammar, Grammar, Precedence, SymbolID},
    table::ActionCode,
};
use std::cmp::Ordering;

/// Decides between two competing actions of one parse table cell.
///
/// A cell is resolved to the unique action preferred over every other candidate;
/// without such an action it stays a conflict.
pub trait ConflictResolver {
    /// Whether `a` is preferred over `b` when `symbol` is the lookahead.
    fn prefers(&self, symbol: SymbolID, a: ActionCode, b: ActionCode) -> bool;
}

impl<F> ConflictResolver for F
where
    F: Fn(ActionCode, ActionCode) -> bool,
{
    fn prefers(&self, _: SymbolID, a: ActionCode, b: ActionCode) -> bool {
        (self)(a, b)
    }
}

/// Prefer the lower action code: reductions beat shifts, and earlier productions beat
/// later ones.
pub fn prefer_lower_code(a: ActionCode, b: ActionCode) -> bool {
    a < b
}

/// Prefer any shift over any reduction.
pub fn prefer_shift(production_count: usize) -> impl Fn(ActionCode, ActionCode) -> bool {
    let shift_base = production_count as ActionCode;
    move |a, b| a >= shift_base && b < shift_base
}

/// Yacc-style resolution from the precedences declared in a [`Grammar`].
///
/// Shift/reduce pairs compare the precedence of the lookahead terminal with that of
/// the production. On equal priority, left associativity reduces, right associativity
/// shifts, and nonassociative operators leave the conflict unresolved.
#[derive(Debug)]
pub struct YaccPrecedence {
    shift_base: ActionCode,
    terminals: Vec<Option<Precedence>>,
    productions: Vec<Option<Precedence>>,
}

impl YaccPrecedence {
    pub fn new(g: &Grammar) -> Self {
        Self {
            shift_base: g.production_count() as ActionCode,
            terminals: g.symbols.iter().map(|s| s.precedence).collect(),
            productions: g.productions.iter().map(|p| p.precedence(g)).collect(),
        }
    }

    fn shift_wins(&self, symbol: SymbolID, reduce: ActionCode) -> Option<bool> {
        let shift_prec = self.terminals.get(symbol.index()).copied().flatten()?;
        let reduce_prec = self.productions.get(reduce as usize).copied().flatten()?;
        match Ord::cmp(&shift_prec.priority, &reduce_prec.priority) {
            Ordering::Greater => Some(true),
            Ordering::Less => Some(false),
            Ordering::Equal => match shift_prec.assoc {
                Assoc::Left => Some(false),
                Assoc::Right => Some(true),
                Assoc::Nonassoc => None,
            },
        }
    }
}

impl ConflictResolver for YaccPrecedence {
    fn prefers(&self, symbol: SymbolID, a: ActionCode, b: ActionCode) -> bool {
        match (a >= self.shift_base, b >= self.shift_base) {
            (true, false) => self.shift_wins(symbol, b) == Some(true),
            (false, true) => self.shift_wins(symbol, a) == Some(false),
            _ => false,
        }
    }
}
