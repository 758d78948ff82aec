//! Action and unwinding tables with conflict detection.

use crate::{
    cognate::{Cognate, CognateID},
    dotted::DottedStore,
    grammar::{self, ContextFreeGrammar, ProductionID, SymbolID},
    lr0::LR0Automaton,
    monitor::{Cancelled, Monitor, Phase},
    precedence::ConflictResolver,
    types::Map,
    util::display_fn,
};
use std::fmt;

/// An encoded parser action.
///
/// With `P` productions: `0 <= p < P` reduces production `p` (the goal production
/// encodes accept), `P` is the error action, `P + c` shifts to cognate `c`, and a
/// negative value `-1 - i` refers to conflict set `i`.
pub type ActionCode = i32;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Shift(CognateID),
    Reduce(ProductionID),
    Accept,
    Error,
    Conflict(usize),
}

impl Action {
    pub fn decode(code: ActionCode, production_count: usize, goal: ProductionID) -> Self {
        if code < 0 {
            return Action::Conflict((-1 - code) as usize);
        }
        let code = code as usize;
        match code.cmp(&production_count) {
            std::cmp::Ordering::Less if code == goal.index() => Action::Accept,
            std::cmp::Ordering::Less => Action::Reduce(ProductionID::from_raw(code as u16)),
            std::cmp::Ordering::Equal => Action::Error,
            std::cmp::Ordering::Greater => {
                Action::Shift(CognateID::from_index(code - production_count))
            }
        }
    }

    pub fn encode(self, production_count: usize, goal: ProductionID) -> ActionCode {
        let base = production_count as ActionCode;
        match self {
            Action::Shift(c) => base + c.index() as ActionCode,
            Action::Reduce(p) => p.index() as ActionCode,
            Action::Accept => goal.index() as ActionCode,
            Action::Error => base,
            Action::Conflict(i) => -1 - i as ActionCode,
        }
    }
}

/// Observational statistics of one construction.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    pub state_count: usize,
    /// Live cognates at the start of each pass of the cognate fixpoint.
    pub cognate_counts: Vec<usize>,
    pub passes: usize,
    pub merge_check_passes: usize,
    pub conflicts_resolved: usize,
}

/// The LR(0) automaton and its cognates.
#[derive(Debug)]
pub struct Automaton<'g> {
    pub store: DottedStore<'g>,
    pub lr0: LR0Automaton,
    pub cognates: Vec<Cognate>,
    pub goal: ProductionID,
}

impl<'g> Automaton<'g> {
    pub fn grammar(&self) -> &'g dyn ContextFreeGrammar {
        self.store.grammar()
    }

    pub fn cognate(&self, id: CognateID) -> &Cognate {
        &self.cognates[id.index()]
    }

    pub fn display_cognate(&self, id: CognateID) -> impl fmt::Display + '_ {
        self.cognate(id).display(&self.store, &self.lr0)
    }

    pub fn display<'a>(&'a self) -> impl fmt::Display + 'a {
        let this: &'a Automaton<'a> = self;
        display_fn(move |f| {
            let g = this.grammar();
            for (i, cognate) in this.cognates.iter().enumerate() {
                writeln!(f, "#### {:?}", CognateID::from_index(i))?;
                write!(f, "{}", cognate.display(&this.store, &this.lr0))?;
                let state = this.lr0.state(cognate.state);
                for ((symbol, _), next) in state.transitions.iter().zip(&cognate.successors) {
                    writeln!(f, "- {} => {:?}", g.symbol_name(*symbol), next)?;
                }
            }
            Ok(())
        })
    }
}

/// The generated tables, indexed by cognate.
#[derive(Debug)]
pub struct ParseTables<'g> {
    /// `[cognate][symbol]`; nonterminal columns hold the goto as a shift.
    pub action_table: Vec<Vec<ActionCode>>,
    /// Reduce the unwinding production, or shift the unwinding symbol (`P + symbol`).
    pub unwinding_table: Vec<ActionCode>,
    /// Like `unwinding_table`, with shifts resolved to the successor cognate.
    pub unwinding_parse_table: Vec<ActionCode>,
    pub conflict_sets: Vec<Vec<ActionCode>>,
    pub conflict_count: u32,
    pub diagnostics: Diagnostics,
    pub automaton: Automaton<'g>,
}

impl<'g> ParseTables<'g> {
    pub fn production_count(&self) -> usize {
        self.automaton.grammar().production_count()
    }

    /// The code of the error action, also the base of shift codes.
    pub fn error_code(&self) -> ActionCode {
        self.production_count() as ActionCode
    }

    pub fn decode(&self, code: ActionCode) -> Action {
        Action::decode(code, self.production_count(), self.automaton.goal)
    }

    pub fn action(&self, cognate: CognateID, symbol: SymbolID) -> Action {
        self.decode(self.action_table[cognate.index()][symbol.index()])
    }

    pub fn display_action<'a>(&'a self, code: ActionCode) -> impl fmt::Display + 'a {
        let this: &'a ParseTables<'a> = self;
        display_fn(move |f| {
            let g = this.automaton.grammar();
            match this.decode(code) {
                Action::Shift(c) => write!(f, "shift({:?})", c),
                Action::Reduce(p) => {
                    write!(f, "reduce({})", grammar::display_production(g, p, None))
                }
                Action::Accept => f.write_str("accept"),
                Action::Error => f.write_str("error"),
                Action::Conflict(i) => write!(f, "conflict(#{})", i),
            }
        })
    }

    pub fn display_conflict_set<'a>(&'a self, index: usize) -> impl fmt::Display + 'a {
        let this: &'a ParseTables<'a> = self;
        display_fn(move |f| {
            let g = this.automaton.grammar();
            let shift_base = this.error_code();
            f.write_str("{")?;
            for (i, code) in this.conflict_sets[index].iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                if *code >= shift_base {
                    f.write_str("shift")?;
                } else if *code as usize == this.automaton.goal.index() {
                    f.write_str("accept")?;
                } else {
                    let p = ProductionID::from_raw(*code as u16);
                    write!(f, "reduce({})", grammar::display_production(g, p, None))?;
                }
            }
            f.write_str("}")
        })
    }

    pub fn display<'a>(&'a self) -> impl fmt::Display + 'a {
        let this: &'a ParseTables<'a> = self;
        display_fn(move |f| {
            let g = this.automaton.grammar();
            let error = this.error_code();
            for (i, row) in this.action_table.iter().enumerate() {
                let id = CognateID::from_index(i);
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "#### {:?}", id)?;
                write!(f, "{}", this.automaton.display_cognate(id))?;
                writeln!(f, "## actions")?;
                for (symbol, code) in grammar::symbols(g).zip(row) {
                    if *code == error {
                        continue;
                    }
                    writeln!(
                        f,
                        "- {} => {}",
                        g.symbol_name(symbol),
                        this.display_action(*code)
                    )?;
                }
                writeln!(
                    f,
                    "## unwinding: {}",
                    this.display_action(this.unwinding_parse_table[i])
                )?;
            }
            if !this.conflict_sets.is_empty() {
                writeln!(f, "\n#### conflict sets")?;
                for i in 0..this.conflict_sets.len() {
                    writeln!(f, "- #{}: {}", i, this.display_conflict_set(i))?;
                }
            }
            Ok(())
        })
    }
}

pub(crate) struct Tables {
    pub action_table: Vec<Vec<ActionCode>>,
    pub unwinding_table: Vec<ActionCode>,
    pub unwinding_parse_table: Vec<ActionCode>,
    pub conflict_sets: Vec<Vec<ActionCode>>,
    pub conflict_count: u32,
    pub conflicts_resolved: usize,
}

/// Build the action and unwinding tables of `cognates`.
///
/// The transition on `eof` is emitted as accept.
#[tracing::instrument(skip_all)]
pub(crate) fn generate(
    store: &DottedStore<'_>,
    lr0: &LR0Automaton,
    cognates: &[Cognate],
    goal: ProductionID,
    eof: SymbolID,
    resolver: Option<&dyn ConflictResolver>,
    monitor: &mut dyn Monitor,
) -> Result<Tables, Cancelled> {
    let g = store.grammar();
    let production_count = g.production_count();
    let shift_base = production_count as ActionCode;
    let accept = goal.index() as ActionCode;
    let shift = |next: CognateID| shift_base + next.index() as ActionCode;

    let mut action_table = Vec::with_capacity(cognates.len());
    let mut conflict_sets: Map<Vec<ActionCode>, usize> = Map::default();
    let mut conflict_count = 0;
    let mut conflicts_resolved = 0;

    let mut cells = Map::<SymbolID, Vec<ActionCode>>::default();
    for (i, cognate) in cognates.iter().enumerate() {
        let state = lr0.state(cognate.state);

        cells.clear();
        for (symbol, next) in state.transitions.keys().zip(&cognate.successors) {
            let code = if *symbol == eof { accept } else { shift(*next) };
            cells.entry(*symbol).or_default().push(code);
        }
        for (production, lookaheads) in &cognate.reductions {
            let code = production.index() as ActionCode;
            for t in lookaheads.iter() {
                let cell = cells.entry(t).or_default();
                if !cell.contains(&code) {
                    cell.push(code);
                }
            }
        }

        let mut row = vec![shift_base; g.symbol_count()];
        for (symbol, candidates) in cells.iter_mut() {
            if let [code] = candidates[..] {
                row[symbol.index()] = code;
                continue;
            }

            candidates.sort_unstable();
            if let Some(winner) = resolve(resolver, *symbol, candidates) {
                conflicts_resolved += 1;
                row[symbol.index()] = winner;
                continue;
            }

            // Any shift is recorded with the shared code `P`.
            let mut key: Vec<ActionCode> = candidates
                .iter()
                .map(|code| (*code).min(shift_base))
                .collect();
            key.dedup();
            let len = conflict_sets.len();
            let index = *conflict_sets.entry(key).or_insert(len);
            conflict_count += 1;
            tracing::debug!(
                "conflict in {:?} on {}",
                CognateID::from_index(i),
                g.symbol_name(*symbol)
            );
            row[symbol.index()] = -1 - index as ActionCode;
        }
        action_table.push(row);
        monitor.work_done(Phase::Tables)?;
    }

    let mut unwinding_table = Vec::with_capacity(cognates.len());
    let mut unwinding_parse_table = Vec::with_capacity(cognates.len());
    for cognate in cognates {
        let item = lr0.state(cognate.state).unwinding;
        match store.next_symbol(item) {
            None => {
                let code = store.production(item).index() as ActionCode;
                unwinding_table.push(code);
                unwinding_parse_table.push(code);
            }
            Some(symbol) => {
                unwinding_table.push(shift_base + symbol.index() as ActionCode);
                unwinding_parse_table.push(if symbol == eof {
                    accept
                } else {
                    let next = cognate
                        .successor(lr0, symbol)
                        .expect("the unwinding symbol has a transition");
                    shift(next)
                });
            }
        }
    }

    tracing::debug!(
        "{} conflicts ({} distinct), {} resolved",
        conflict_count,
        conflict_sets.len(),
        conflicts_resolved
    );

    Ok(Tables {
        action_table,
        unwinding_table,
        unwinding_parse_table,
        conflict_sets: conflict_sets.into_keys().collect(),
        conflict_count,
        conflicts_resolved,
    })
}

/// The unique candidate preferred over all the others, if any.
fn resolve(
    resolver: Option<&dyn ConflictResolver>,
    symbol: SymbolID,
    candidates: &[ActionCode],
) -> Option<ActionCode> {
    let resolver = resolver?;
    let mut winners = candidates.iter().copied().filter(|&a| {
        candidates
            .iter()
            .all(|&b| a == b || resolver.prefers(symbol, a, b))
    });
    let winner = winners.next()?;
    match winners.next() {
        Some(_) => None,
        None => Some(winner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_codes() {
        let goal = ProductionID::GOAL;
        let cases = [
            (Action::Accept, 0),
            (Action::Reduce(ProductionID::from_raw(3)), 3),
            (Action::Error, 5),
            (Action::Shift(CognateID::from_index(2)), 7),
            (Action::Conflict(0), -1),
            (Action::Conflict(4), -5),
        ];
        for (action, code) in cases {
            assert_eq!(action.encode(5, goal), code);
            assert_eq!(Action::decode(code, 5, goal), action);
        }
    }

    #[test]
    fn unique_winner_only() {
        let lower = |a: ActionCode, b: ActionCode| a < b;
        let resolver: &dyn ConflictResolver = &lower;
        assert_eq!(resolve(Some(resolver), SymbolID::EOF, &[2, 3, 9]), Some(2));
        assert_eq!(resolve(None, SymbolID::EOF, &[2, 3]), None);

        let never = |_: ActionCode, _: ActionCode| false;
        let resolver: &dyn ConflictResolver = &never;
        assert_eq!(resolve(Some(resolver), SymbolID::EOF, &[2, 3]), None);

        let always = |_: ActionCode, _: ActionCode| true;
        let resolver: &dyn ConflictResolver = &always;
        assert_eq!(resolve(Some(resolver), SymbolID::EOF, &[2, 3]), None);
    }
}
