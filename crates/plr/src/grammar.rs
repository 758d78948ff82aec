//! Context-free grammars.
//!
//! The table builders only talk to a grammar through [`ContextFreeGrammar`], a read-only
//! oracle. [`Grammar`] is the in-memory implementation used by the command line tool and
//! the tests.

pub mod examples;

use crate::{
    first_sets::FirstSets,
    types::Map,
    util::{display_fn, write_separated},
};
use std::fmt;

// ==== Identifiers ====

/// A grammar symbol. Terminals and nonterminals share one index space.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SymbolID(u16);

impl SymbolID {
    /// The goal symbol reserved by [`Grammar`].
    pub const GOAL: Self = Self(0);

    /// The end-of-input terminal reserved by [`Grammar`].
    pub const EOF: Self = Self(1);

    const OFFSET: u16 = 2;

    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for SymbolID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S#{:03}", self.0)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ProductionID(u16);

impl ProductionID {
    /// The goal production `$goal -> start $end` appended by [`Grammar`].
    pub const GOAL: Self = Self(0);

    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ProductionID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P#{:03}", self.0)
    }
}

/// Iterate over all production identifiers of `g`.
pub fn productions(g: &dyn ContextFreeGrammar) -> impl Iterator<Item = ProductionID> {
    (0..g.production_count()).map(|i| ProductionID::from_raw(to_raw(i)))
}

/// Iterate over all symbol identifiers of `g`.
pub fn symbols(g: &dyn ContextFreeGrammar) -> impl Iterator<Item = SymbolID> {
    (0..g.symbol_count()).map(|i| SymbolID::from_raw(to_raw(i)))
}

fn to_raw(index: usize) -> u16 {
    u16::try_from(index).expect("too many grammar entities")
}

// ==== Terminal sets ====

/// A set of terminal symbols, indexed by raw [`SymbolID`].
#[derive(Debug, Default, Clone)]
pub struct TerminalSet {
    inner: bit_set::BitSet,
}

impl TerminalSet {
    pub fn contains(&self, id: SymbolID) -> bool {
        self.inner.contains(id.index())
    }
    pub fn insert(&mut self, id: SymbolID) -> bool {
        self.inner.insert(id.index())
    }
    pub fn union_with(&mut self, other: &Self) {
        self.inner.union_with(&other.inner)
    }
    /// Union `other` into `self`, returning whether `self` grew.
    pub fn union_changed(&mut self, other: &Self) -> bool {
        if other.inner.is_subset(&self.inner) {
            return false;
        }
        self.inner.union_with(&other.inner);
        true
    }
    pub fn intersect_with(&mut self, other: &Self) {
        self.inner.intersect_with(&other.inner)
    }
    pub fn intersects(&self, other: &Self) -> bool {
        !self.inner.is_disjoint(&other.inner)
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    pub fn len(&self) -> usize {
        self.inner.len()
    }
    pub fn iter(&self) -> impl Iterator<Item = SymbolID> + '_ {
        self.inner.iter().map(|raw| SymbolID::from_raw(to_raw(raw)))
    }

    pub fn display<'a>(&'a self, g: &'a dyn ContextFreeGrammar) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            f.write_str("{")?;
            write_separated(f, self.iter().map(|t| g.symbol_name(t)))?;
            f.write_str("}")
        })
    }
}

impl PartialEq for TerminalSet {
    fn eq(&self, other: &Self) -> bool {
        self.inner.is_subset(&other.inner) && other.inner.is_subset(&self.inner)
    }
}

impl Eq for TerminalSet {}

impl FromIterator<SymbolID> for TerminalSet {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = SymbolID>,
    {
        Self {
            inner: iter.into_iter().map(SymbolID::index).collect(),
        }
    }
}

// ==== The grammar oracle ====

/// Read-only view of a validated context-free grammar.
///
/// Exactly one production must have the goal symbol on its left-hand side; its
/// right-hand side must end with the end-of-input terminal, and neither symbol may
/// occur anywhere else. This is checked when the tables are generated.
pub trait ContextFreeGrammar {
    fn symbol_count(&self) -> usize;

    fn is_terminal(&self, symbol: SymbolID) -> bool;

    fn production_count(&self) -> usize;

    fn lhs(&self, production: ProductionID) -> SymbolID;

    fn rhs_len(&self, production: ProductionID) -> usize;

    fn rhs_symbol(&self, production: ProductionID, index: usize) -> SymbolID;

    fn goal_symbol(&self) -> SymbolID;

    /// `FIRST` of the right-hand side suffix of `production` starting at `from`.
    fn first_set(&self, production: ProductionID, from: usize) -> TerminalSet;

    fn follow_set(&self, symbol: SymbolID) -> TerminalSet;

    /// Whether the right-hand side suffix of `production` starting at `from` derives ε.
    fn derives_epsilon(&self, production: ProductionID, from: usize) -> bool;

    fn symbol_name(&self, symbol: SymbolID) -> &str;
}

/// `"LHS -> R1 R2 . R3"`; the dot is omitted when `dot` is `None`.
pub fn display_production(
    g: &dyn ContextFreeGrammar,
    production: ProductionID,
    dot: Option<usize>,
) -> impl fmt::Display + '_ {
    display_fn(move |f| {
        write!(f, "{} ->", g.symbol_name(g.lhs(production)))?;
        let len = g.rhs_len(production);
        for i in 0..len {
            if dot == Some(i) {
                f.write_str(" .")?;
            }
            write!(f, " {}", g.symbol_name(g.rhs_symbol(production, i)))?;
        }
        if dot == Some(len) {
            f.write_str(" .")?;
        } else if len == 0 && dot.is_none() {
            f.write_str(" ε")?;
        }
        Ok(())
    })
}

// ==== Precedence ====

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Precedence {
    pub priority: u16,
    pub assoc: Assoc,
}

impl Precedence {
    pub const fn new(priority: u16, assoc: Assoc) -> Self {
        Self { priority, assoc }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Assoc {
    Left,
    Right,
    Nonassoc,
}

impl fmt::Display for Assoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
            Self::Nonassoc => write!(f, "nonassoc"),
        }
    }
}

// ==== In-memory grammar ====

#[derive(Debug)]
pub struct SymbolData {
    pub name: String,
    pub terminal: bool,
    pub precedence: Option<Precedence>,
}

/// The type that represents a production rule in grammar.
#[derive(Debug)]
pub struct Production {
    pub left: SymbolID,
    pub right: Vec<SymbolID>,
    pub precedence: Option<Precedence>,
}

impl Production {
    /// The explicit precedence of this production, or that of its last terminal.
    pub fn precedence(&self, g: &Grammar) -> Option<Precedence> {
        self.precedence.or_else(|| {
            self.right
                .iter()
                .rev()
                .find(|s| g.symbol(**s).terminal)
                .and_then(|s| g.symbol(*s).precedence)
        })
    }
}

/// The grammar definition used to derive the parser tables.
#[derive(Debug)]
#[non_exhaustive]
pub struct Grammar {
    pub symbols: Vec<SymbolData>,
    pub productions: Vec<Production>,
    pub start_symbol: SymbolID,
    first_sets: FirstSets,
}

impl Grammar {
    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, GrammarDefError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarDefError>,
    {
        let mut def = GrammarDef {
            symbols: vec![],
            names: Map::default(),
            productions: vec![],
            start: None,
        };
        def.push_symbol("$goal", false, None)?;
        def.push_symbol("$end", true, None)?;
        debug_assert_eq!(def.symbols.len(), usize::from(SymbolID::OFFSET));

        f(&mut def)?;

        def.end()
    }

    pub fn symbol(&self, id: SymbolID) -> &SymbolData {
        &self.symbols[id.index()]
    }

    pub fn production(&self, id: ProductionID) -> &Production {
        &self.productions[id.index()]
    }

    /// Look up a symbol by its name.
    pub fn find_symbol(&self, name: &str) -> Option<SymbolID> {
        self.symbols
            .iter()
            .position(|s| s.name == name)
            .map(|i| SymbolID::from_raw(to_raw(i)))
    }

    pub fn is_nullable(&self, symbol: SymbolID) -> bool {
        self.first_sets.is_nullable(symbol)
    }
}

impl ContextFreeGrammar for Grammar {
    fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    fn is_terminal(&self, symbol: SymbolID) -> bool {
        self.symbol(symbol).terminal
    }

    fn production_count(&self) -> usize {
        self.productions.len()
    }

    fn lhs(&self, production: ProductionID) -> SymbolID {
        self.production(production).left
    }

    fn rhs_len(&self, production: ProductionID) -> usize {
        self.production(production).right.len()
    }

    fn rhs_symbol(&self, production: ProductionID, index: usize) -> SymbolID {
        self.production(production).right[index]
    }

    fn goal_symbol(&self) -> SymbolID {
        SymbolID::GOAL
    }

    fn first_set(&self, production: ProductionID, from: usize) -> TerminalSet {
        self.first_sets
            .first_of(&self.production(production).right[from..])
    }

    fn follow_set(&self, symbol: SymbolID) -> TerminalSet {
        self.first_sets.follow(symbol).clone()
    }

    fn derives_epsilon(&self, production: ProductionID, from: usize) -> bool {
        self.first_sets
            .is_nullable_seq(&self.production(production).right[from..])
    }

    fn symbol_name(&self, symbol: SymbolID) -> &str {
        &self.symbol(symbol).name
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#### terminals: ")?;
        for (i, s) in self.symbols.iter().filter(|s| s.terminal).enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&s.name)?;
            if let Some(prec) = s.precedence {
                write!(f, " (priority={}, assoc={})", prec.priority, prec.assoc)?;
            }
        }
        write!(f, "\n#### nonterminals: ")?;
        write_separated(
            f,
            self.symbols
                .iter()
                .filter(|s| !s.terminal)
                .map(|s| s.name.as_str()),
        )?;
        writeln!(f, "\n#### productions:")?;
        for (i, p) in self.productions.iter().enumerate() {
            let id = ProductionID::from_raw(to_raw(i));
            write!(f, "- {}", display_production(self, id, None))?;
            if let Some(prec) = p.precedence {
                write!(f, " (priority={}, assoc={})", prec.priority, prec.assoc)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// The builder handed to [`Grammar::define`].
#[derive(Debug)]
pub struct GrammarDef {
    symbols: Vec<SymbolData>,
    names: Map<String, SymbolID>,
    productions: Vec<Production>,
    start: Option<SymbolID>,
}

impl GrammarDef {
    /// The reserved goal symbol.
    pub fn goal(&self) -> SymbolID {
        SymbolID::GOAL
    }

    /// The reserved end-of-input terminal.
    pub fn eof(&self) -> SymbolID {
        SymbolID::EOF
    }

    /// Declare a terminal symbol used in this grammar.
    pub fn terminal(&mut self, name: &str) -> Result<SymbolID, GrammarDefError> {
        self.push_symbol(name, true, None)
    }

    pub fn terminal_with_precedence(
        &mut self,
        name: &str,
        precedence: Precedence,
    ) -> Result<SymbolID, GrammarDefError> {
        self.push_symbol(name, true, Some(precedence))
    }

    /// Declare a nonterminal symbol used in this grammar.
    pub fn nonterminal(&mut self, name: &str) -> Result<SymbolID, GrammarDefError> {
        self.push_symbol(name, false, None)
    }

    /// Specify a production rule into this grammar.
    pub fn production<I>(
        &mut self,
        left: SymbolID,
        right: I,
    ) -> Result<ProductionID, GrammarDefError>
    where
        I: IntoIterator<Item = SymbolID>,
    {
        self.push_production(left, right.into_iter().collect(), None)
    }

    pub fn production_with_precedence<I>(
        &mut self,
        left: SymbolID,
        right: I,
        precedence: Precedence,
    ) -> Result<ProductionID, GrammarDefError>
    where
        I: IntoIterator<Item = SymbolID>,
    {
        self.push_production(left, right.into_iter().collect(), Some(precedence))
    }

    /// Specify the start symbol for this grammar.
    ///
    /// If omitted, the first declared nonterminal is used.
    pub fn start_symbol(&mut self, symbol: SymbolID) -> Result<(), GrammarDefError> {
        let data = self.lookup(symbol)?;
        if data.terminal || symbol == SymbolID::GOAL {
            return Err(GrammarDefError::InvalidStartSymbol {
                name: data.name.clone(),
            });
        }
        self.start.replace(symbol);
        Ok(())
    }

    fn push_symbol(
        &mut self,
        name: &str,
        terminal: bool,
        precedence: Option<Precedence>,
    ) -> Result<SymbolID, GrammarDefError> {
        if self.names.contains_key(name) {
            return Err(GrammarDefError::DuplicateSymbol { name: name.into() });
        }
        let raw = u16::try_from(self.symbols.len()).map_err(|_| GrammarDefError::TooManySymbols)?;
        let id = SymbolID::from_raw(raw);
        self.symbols.push(SymbolData {
            name: name.into(),
            terminal,
            precedence,
        });
        self.names.insert(name.into(), id);
        Ok(id)
    }

    fn push_production(
        &mut self,
        left: SymbolID,
        right: Vec<SymbolID>,
        precedence: Option<Precedence>,
    ) -> Result<ProductionID, GrammarDefError> {
        let data = self.lookup(left)?;
        if data.terminal {
            return Err(GrammarDefError::TerminalOnLeft {
                name: data.name.clone(),
            });
        }
        for &symbol in &right {
            self.lookup(symbol)?;
        }
        if self
            .productions
            .iter()
            .any(|p| p.left == left && p.right == right)
        {
            return Err(GrammarDefError::DuplicateProduction {
                name: self.symbols[left.index()].name.clone(),
            });
        }

        // Production 0 is reserved for the goal production, appended in `end`.
        let raw = u16::try_from(self.productions.len() + 1)
            .map_err(|_| GrammarDefError::TooManyProductions)?;
        self.productions.push(Production {
            left,
            right,
            precedence,
        });
        Ok(ProductionID::from_raw(raw))
    }

    fn lookup(&self, symbol: SymbolID) -> Result<&SymbolData, GrammarDefError> {
        self.symbols
            .get(symbol.index())
            .ok_or(GrammarDefError::UnknownSymbol { symbol })
    }

    fn end(mut self) -> Result<Grammar, GrammarDefError> {
        let start = match self.start.take() {
            Some(start) => start,
            None => self
                .symbols
                .iter()
                .enumerate()
                .skip(usize::from(SymbolID::OFFSET))
                .find(|(_, s)| !s.terminal)
                .map(|(i, _)| SymbolID::from_raw(to_raw(i)))
                .ok_or(GrammarDefError::MissingStartSymbol)?,
        };

        self.productions.insert(
            ProductionID::GOAL.index(),
            Production {
                left: SymbolID::GOAL,
                right: vec![start, SymbolID::EOF],
                precedence: None,
            },
        );

        let first_sets = FirstSets::new(&self.symbols, &self.productions);

        Ok(Grammar {
            symbols: self.symbols,
            productions: self.productions,
            start_symbol: start,
            first_sets,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarDefError {
    #[error("the symbol `{name}' has already been declared")]
    DuplicateSymbol { name: String },

    #[error("unknown symbol {symbol:?}")]
    UnknownSymbol { symbol: SymbolID },

    #[error("the terminal `{name}' cannot appear on the left-hand side of a production")]
    TerminalOnLeft { name: String },

    #[error("duplicate production rule for `{name}'")]
    DuplicateProduction { name: String },

    #[error("`{name}' cannot be used as the start symbol")]
    InvalidStartSymbol { name: String },

    #[error("empty nonterminal symbols")]
    MissingStartSymbol,

    #[error("too many symbols")]
    TooManySymbols,

    #[error("too many productions")]
    TooManyProductions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_production_is_appended_first() {
        let g = Grammar::define(|g| {
            let id = g.terminal("id")?;
            let e = g.nonterminal("E")?;
            let p = g.production(e, [id])?;
            assert_eq!(p, ProductionID::from_raw(1));
            Ok(())
        })
        .unwrap();

        assert_eq!(g.production_count(), 2);
        assert_eq!(g.lhs(ProductionID::GOAL), SymbolID::GOAL);
        assert_eq!(g.rhs_len(ProductionID::GOAL), 2);
        assert_eq!(g.rhs_symbol(ProductionID::GOAL, 1), SymbolID::EOF);
        assert_eq!(g.start_symbol, g.find_symbol("E").unwrap());
        assert!(g.is_terminal(SymbolID::EOF));
        assert!(!g.is_terminal(SymbolID::GOAL));
    }

    #[test]
    fn duplicate_declarations_are_rejected() {
        let err = Grammar::define(|g| {
            g.terminal("a")?;
            g.nonterminal("a")?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarDefError::DuplicateSymbol { .. }));

        let err = Grammar::define(|g| {
            let a = g.terminal("a")?;
            let s = g.nonterminal("S")?;
            g.production(s, [a])?;
            g.production(s, [a])?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarDefError::DuplicateProduction { .. }));

        let err = Grammar::define(|g| {
            let a = g.terminal("a")?;
            g.production(a, [a])?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarDefError::TerminalOnLeft { .. }));

        let err = Grammar::define(|g| {
            g.terminal("a")?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarDefError::MissingStartSymbol));
    }

    #[test]
    fn production_precedence_defaults_to_last_terminal() {
        let plus = Precedence::new(0, Assoc::Left);
        let g = Grammar::define(|g| {
            let p = g.terminal_with_precedence("+", plus)?;
            let num = g.terminal("num")?;
            let e = g.nonterminal("E")?;
            g.production(e, [e, p, e])?;
            g.production(e, [num])?;
            Ok(())
        })
        .unwrap();
        assert_eq!(g.production(ProductionID::from_raw(1)).precedence(&g), Some(plus));
        assert_eq!(g.production(ProductionID::from_raw(2)).precedence(&g), None);
    }

    #[test]
    fn display_production_with_dot() {
        let g = Grammar::define(|g| {
            let plus = g.terminal("+")?;
            let e = g.nonterminal("E")?;
            let t = g.nonterminal("T")?;
            g.production(e, [e, plus, t])?;
            g.production(t, [])?;
            Ok(())
        })
        .unwrap();
        let p = ProductionID::from_raw(1);
        assert_eq!(display_production(&g, p, Some(1)).to_string(), "E -> E . + T");
        assert_eq!(display_production(&g, p, Some(3)).to_string(), "E -> E + T .");
        assert_eq!(display_production(&g, p, None).to_string(), "E -> E + T");
        let eps = ProductionID::from_raw(2);
        assert_eq!(display_production(&g, eps, None).to_string(), "T -> ε");
        assert_eq!(display_production(&g, eps, Some(0)).to_string(), "T -> .");
    }
}
