//! Flyweight store of dotted productions (LR(0) items).

use crate::grammar::{self, ContextFreeGrammar, ProductionID, SymbolID, TerminalSet};
use std::fmt;

/// Identity of a dotted production within a [`DottedStore`].
///
/// Two dotted productions are the same iff their IDs are equal.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct DottedID(u32);

impl DottedID {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for DottedID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D#{:03}", self.0)
    }
}

#[derive(Debug)]
struct DottedData {
    production: ProductionID,
    dot: usize,
    symbol_at_dot: Option<SymbolID>,
    first_after_dot: TerminalSet,
    epsilon_after_dot: bool,
    epsilon_at_and_after_dot: bool,
}

/// All dotted productions of a grammar, created eagerly.
///
/// The items of production `p` occupy the contiguous range
/// `offsets[p] ..= offsets[p] + rhs_len(p)`, so shifting the dot is an increment.
pub struct DottedStore<'g> {
    grammar: &'g dyn ContextFreeGrammar,
    offsets: Vec<u32>,
    items: Vec<DottedData>,
}

impl fmt::Debug for DottedStore<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DottedStore")
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}

impl<'g> DottedStore<'g> {
    pub fn new(g: &'g dyn ContextFreeGrammar) -> Self {
        let mut offsets = Vec::with_capacity(g.production_count());
        let mut items = vec![];
        for p in grammar::productions(g) {
            offsets.push(u32::try_from(items.len()).expect("too many dotted productions"));
            let len = g.rhs_len(p);
            for dot in 0..=len {
                let after = (dot + 1).min(len);
                items.push(DottedData {
                    production: p,
                    dot,
                    symbol_at_dot: (dot < len).then(|| g.rhs_symbol(p, dot)),
                    first_after_dot: g.first_set(p, after),
                    epsilon_after_dot: g.derives_epsilon(p, after),
                    epsilon_at_and_after_dot: g.derives_epsilon(p, dot),
                });
            }
        }
        Self {
            grammar: g,
            offsets,
            items,
        }
    }

    pub fn grammar(&self) -> &'g dyn ContextFreeGrammar {
        self.grammar
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Fetch the dotted production `production` with the dot before `dot`.
    ///
    /// # Panics
    /// Panics if `dot` is greater than the length of the right-hand side.
    pub fn get(&self, production: ProductionID, dot: usize) -> DottedID {
        let len = self.grammar.rhs_len(production);
        assert!(
            dot <= len,
            "dot position {} is out of range for {:?} (length {})",
            dot,
            production,
            len
        );
        let raw = self.offsets[production.index()] as usize + dot;
        DottedID(raw as u32)
    }

    fn data(&self, id: DottedID) -> &DottedData {
        &self.items[id.index()]
    }

    pub fn production(&self, id: DottedID) -> ProductionID {
        self.data(id).production
    }

    pub fn dot(&self, id: DottedID) -> usize {
        self.data(id).dot
    }

    pub fn is_dot_at_end(&self, id: DottedID) -> bool {
        self.data(id).symbol_at_dot.is_none()
    }

    /// The symbol right after the dot, or `None` if the dot is at the end.
    pub fn next_symbol(&self, id: DottedID) -> Option<SymbolID> {
        self.data(id).symbol_at_dot
    }

    /// # Panics
    /// Panics if the dot is at the end.
    pub fn symbol_at_dot(&self, id: DottedID) -> SymbolID {
        match self.data(id).symbol_at_dot {
            Some(symbol) => symbol,
            None => panic!("no symbol after the dot of {:?}", id),
        }
    }

    /// Whether the dot is before a nonterminal.
    pub fn is_dot_at_nonterminal(&self, id: DottedID) -> bool {
        self.next_symbol(id)
            .map_or(false, |s| !self.grammar.is_terminal(s))
    }

    /// # Panics
    /// Panics if the dot is at the end.
    pub fn shift_dot(&self, id: DottedID) -> DottedID {
        assert!(
            !self.is_dot_at_end(id),
            "cannot shift the dot of {:?} past the end",
            id
        );
        DottedID(id.0 + 1)
    }

    /// `FIRST` of the symbols strictly after the one at the dot.
    pub fn first_set_after_dot(&self, id: DottedID) -> &TerminalSet {
        &self.data(id).first_after_dot
    }

    pub fn derives_epsilon_after_dot(&self, id: DottedID) -> bool {
        self.data(id).epsilon_after_dot
    }

    pub fn derives_epsilon_at_and_after_dot(&self, id: DottedID) -> bool {
        self.data(id).epsilon_at_and_after_dot
    }

    pub fn follow_set_of_lhs(&self, id: DottedID) -> TerminalSet {
        let g = self.grammar;
        g.follow_set(g.lhs(self.production(id)))
    }

    pub fn display(&self, id: DottedID) -> impl fmt::Display + '_ {
        let data = self.data(id);
        grammar::display_production(self.grammar, data.production, Some(data.dot))
    }
}
