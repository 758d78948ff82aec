//! LR(0) automaton.

use crate::{
    dotted::{DottedID, DottedStore},
    grammar::{ProductionID, SymbolID},
    monitor::{Cancelled, Monitor, Phase},
    prediction::Predictions,
    types::{Map, Set},
    util::display_fn,
};
use std::{collections::VecDeque, fmt};

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateID(u32);

impl StateID {
    pub const INITIAL: Self = Self(0);

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).expect("too many states"))
    }
}

impl fmt::Debug for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S#{:03}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct LR0State {
    /// Dotted productions shifted in from predecessors, in discovery order.
    pub basis: Vec<DottedID>,
    pub transitions: Map<SymbolID, StateID>,
    /// The symbol shifted to enter this state; the goal symbol for the initial state.
    pub access_symbol: SymbolID,
    /// The first closure item whose dot is not before a nonterminal.
    pub unwinding: DottedID,
}

impl LR0State {
    pub fn display<'a>(&'a self, store: &'a DottedStore<'a>) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            let g = store.grammar();
            writeln!(f, "## basis:")?;
            for item in &self.basis {
                writeln!(f, "- {}", store.display(*item))?;
            }
            if !self.transitions.is_empty() {
                writeln!(f, "## transitions:")?;
                for (symbol, next) in &self.transitions {
                    writeln!(f, "- {} => {:?}", g.symbol_name(*symbol), next)?;
                }
            }
            writeln!(f, "## unwinding: {}", store.display(self.unwinding))
        })
    }
}

#[derive(Debug)]
pub struct LR0Automaton {
    pub states: Vec<LR0State>,
}

impl LR0Automaton {
    pub fn state(&self, id: StateID) -> &LR0State {
        &self.states[id.index()]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Build the LR(0) automaton whose initial basis is the goal production.
    ///
    /// With `order_preserving`, two candidate bases only match if they list the same
    /// dotted productions in the same order.
    ///
    /// # Panics
    /// Panics if some reachable nonterminal derives no terminal string, since such a
    /// state has no unwinding item. [`crate::Config::generate`] rejects these grammars
    /// before building.
    #[tracing::instrument(skip_all)]
    pub fn build(
        store: &DottedStore<'_>,
        predictions: &Predictions,
        goal: ProductionID,
        order_preserving: bool,
        monitor: &mut dyn Monitor,
    ) -> Result<Self, Cancelled> {
        let g = store.grammar();
        let key = |basis: &[DottedID]| -> Vec<DottedID> {
            let mut key = basis.to_vec();
            if !order_preserving {
                key.sort_unstable();
            }
            key
        };

        let mut states: Vec<LR0State> = vec![];
        let mut isocores: Map<Vec<DottedID>, StateID> = Map::default();
        let mut pending: VecDeque<(StateID, Vec<DottedID>, SymbolID)> = VecDeque::new();

        let initial = vec![store.get(goal, 0)];
        isocores.insert(key(&initial), StateID::INITIAL);
        pending.push_back((StateID::INITIAL, initial, g.goal_symbol()));

        let mut seen = Set::default();
        let mut successors = Map::<SymbolID, Vec<DottedID>>::default();
        while let Some((current, basis, access_symbol)) = pending.pop_front() {
            debug_assert_eq!(current.index(), states.len());

            seen.clear();
            successors.clear();
            let mut unwinding = None;
            scan_closure(store, predictions, &basis, |item| {
                if !seen.insert(item) {
                    return;
                }
                if unwinding.is_none() && !store.is_dot_at_nonterminal(item) {
                    unwinding = Some(item);
                }
                if let Some(symbol) = store.next_symbol(item) {
                    successors
                        .entry(symbol)
                        .or_default()
                        .push(store.shift_dot(item));
                }
            });
            let unwinding = match unwinding {
                Some(unwinding) => unwinding,
                None => unreachable!("state {:?} has no unwinding item", current),
            };

            let mut transitions = Map::default();
            for (symbol, next_basis) in successors.drain(..) {
                let k = key(&next_basis);
                let next = match isocores.get(&k) {
                    Some(id) => *id,
                    None => {
                        let id = StateID::from_index(states.len() + 1 + pending.len());
                        isocores.insert(k, id);
                        pending.push_back((id, next_basis, symbol));
                        id
                    }
                };
                transitions.insert(symbol, next);
            }

            tracing::trace!("{:?}: {} transitions", current, transitions.len());
            states.push(LR0State {
                basis,
                transitions,
                access_symbol,
                unwinding,
            });
            monitor.work_done(Phase::LR0)?;
        }

        tracing::debug!("LR(0) states: {}", states.len());
        Ok(Self { states })
    }

    pub fn display<'a>(&'a self, store: &'a DottedStore<'a>) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            for (i, state) in self.states.iter().enumerate() {
                writeln!(f, "#### {:?}", StateID::from_index(i))?;
                write!(f, "{}", state.display(store))?;
            }
            Ok(())
        })
    }
}

/// Visit the closure of `basis`: each basis element, immediately followed by the
/// predictions of the nonterminal at its dot.
///
/// Items predicted from several basis elements are visited once per element.
pub fn scan_closure<F>(
    store: &DottedStore<'_>,
    predictions: &Predictions,
    basis: &[DottedID],
    mut f: F,
) where
    F: FnMut(DottedID),
{
    let g = store.grammar();
    for &item in basis {
        f(item);
        if let Some(symbol) = store.next_symbol(item) {
            if !g.is_terminal(symbol) {
                for prediction in predictions.get(symbol) {
                    f(prediction.dotted);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        grammar::{examples, ContextFreeGrammar, Grammar},
        monitor::{NoopMonitor, WorkLimit},
    };

    fn lr0(g: &Grammar, order_preserving: bool) -> (DottedStore<'_>, LR0Automaton) {
        let store = DottedStore::new(g);
        let predictions = Predictions::build(&store, None, &mut NoopMonitor).unwrap();
        let automaton = LR0Automaton::build(
            &store,
            &predictions,
            ProductionID::GOAL,
            order_preserving,
            &mut NoopMonitor,
        )
        .unwrap();
        (store, automaton)
    }

    #[test]
    fn expression_has_seven_states() {
        let g = Grammar::define(examples::expression).unwrap();
        let (store, automaton) = lr0(&g, false);
        eprintln!("{}", automaton.display(&store));
        assert_eq!(automaton.len(), 7);

        let initial = automaton.state(StateID::INITIAL);
        assert_eq!(initial.access_symbol, g.goal_symbol());
        assert!(automaton.states[1..]
            .iter()
            .all(|s| s.access_symbol != g.goal_symbol()));

        // The initial state unwinds by shifting `id` through T -> . id
        let id = g.find_symbol("id").unwrap();
        assert_eq!(store.symbol_at_dot(initial.unwinding), id);

        // [$goal -> E . $end, E -> E . + T]
        let s1 = automaton.state(initial.transitions[&g.find_symbol("E").unwrap()]);
        assert_eq!(s1.basis.len(), 2);
        assert_eq!(store.symbol_at_dot(s1.unwinding), SymbolID::EOF);
        let accepted = automaton.state(s1.transitions[&SymbolID::EOF]);
        assert!(accepted.transitions.is_empty());
        assert!(store.is_dot_at_end(accepted.unwinding));
    }

    #[test]
    #[should_panic(expected = "no unwinding item")]
    fn unproductive_grammar_has_no_unwinding_item() {
        // S -> S a
        let g = Grammar::define(|g| {
            let a = g.terminal("a")?;
            let s = g.nonterminal("S")?;
            g.production(s, [s, a])?;
            Ok(())
        })
        .unwrap();
        lr0(&g, false);
    }

    #[test]
    fn every_transition_matches_access_symbol() {
        for example in examples::ALL {
            let g = Grammar::define(example.define).unwrap();
            let (_store, automaton) = lr0(&g, false);
            for state in &automaton.states {
                for (symbol, next) in &state.transitions {
                    assert_eq!(automaton.state(*next).access_symbol, *symbol);
                    assert_ne!(*next, StateID::INITIAL);
                }
            }
        }
    }

    #[test]
    fn order_preserving_splits_permuted_bases() {
        let g = Grammar::define(examples::lr1_not_lalr).unwrap();
        let (_, unordered) = lr0(&g, false);
        let (_, ordered) = lr0(&g, true);
        assert_eq!(unordered.len(), 14);
        assert_eq!(ordered.len(), 15);
    }

    #[test]
    fn cancelled_by_monitor() {
        let g = Grammar::define(examples::expression).unwrap();
        let store = DottedStore::new(&g);
        let predictions = Predictions::build(&store, None, &mut NoopMonitor).unwrap();
        let result = LR0Automaton::build(
            &store,
            &predictions,
            ProductionID::GOAL,
            false,
            &mut WorkLimit::new(3),
        );
        assert_eq!(result.unwrap_err(), Cancelled);
    }
}
