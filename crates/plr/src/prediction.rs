//! Closure of nonterminals into prediction sets.

use crate::{
    dotted::{DottedID, DottedStore},
    grammar::{self, ProductionID, SymbolID, TerminalSet},
    monitor::{Cancelled, Monitor, Phase},
    types::{Map, Queue},
};

/// A dotted production predicted when a nonterminal is expected.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// The predicted production, with the dot at the start.
    pub dotted: DottedID,
    /// Lookaheads generated inside the closure itself.
    pub lookaheads: TerminalSet,
    /// Whether the lookaheads of the expected nonterminal flow into this prediction.
    pub propagate: bool,
}

/// Prediction sets of all nonterminals, indexed by symbol.
#[derive(Debug)]
pub struct Predictions {
    sets: Vec<Box<[Prediction]>>,
}

impl Predictions {
    /// The closure of `symbol`. Empty for terminals.
    pub fn get(&self, symbol: SymbolID) -> &[Prediction] {
        &self.sets[symbol.index()]
    }

    #[tracing::instrument(skip_all)]
    pub fn build(
        store: &DottedStore<'_>,
        costs: Option<&[i64]>,
        monitor: &mut dyn Monitor,
    ) -> Result<Self, Cancelled> {
        let g = store.grammar();

        let mut by_lhs: Vec<Vec<ProductionID>> = vec![vec![]; g.symbol_count()];
        for p in grammar::productions(g) {
            by_lhs[g.lhs(p).index()].push(p);
        }

        let mut sets = Vec::with_capacity(g.symbol_count());
        for symbol in grammar::symbols(g) {
            if g.is_terminal(symbol) {
                sets.push(Box::default());
                continue;
            }
            let mut predictions = close(store, &by_lhs, symbol);
            if let Some(costs) = costs {
                predictions = sort_by_cost(store, costs, symbol, predictions);
            }
            tracing::trace!(
                "predictions of {}: {} items",
                g.symbol_name(symbol),
                predictions.len()
            );
            sets.push(predictions.into_boxed_slice());
            monitor.work_done(Phase::Predictions)?;
        }

        Ok(Self { sets })
    }
}

fn close(
    store: &DottedStore<'_>,
    by_lhs: &[Vec<ProductionID>],
    symbol: SymbolID,
) -> Vec<Prediction> {
    let g = store.grammar();

    let mut predictions: Vec<Prediction> = vec![];
    let mut index: Map<DottedID, usize> = Map::default();
    let mut dirty: Queue<usize> = Queue::default();

    for &p in &by_lhs[symbol.index()] {
        let dotted = store.get(p, 0);
        index.insert(dotted, predictions.len());
        dirty.push(predictions.len());
        predictions.push(Prediction {
            dotted,
            lookaheads: TerminalSet::default(),
            propagate: true,
        });
    }

    while let Some(i) = dirty.pop() {
        let dotted = predictions[i].dotted;
        let expected = match store.next_symbol(dotted) {
            Some(s) if !g.is_terminal(s) => s,
            _ => continue,
        };
        let first = store.first_set_after_dot(dotted);
        let transparent = store.derives_epsilon_after_dot(dotted);
        let inherited = predictions[i].lookaheads.clone();
        let propagate = predictions[i].propagate;

        for &p in &by_lhs[expected.index()] {
            let target = store.get(p, 0);
            let j = *index.entry(target).or_insert_with(|| {
                predictions.push(Prediction {
                    dotted: target,
                    lookaheads: TerminalSet::default(),
                    propagate: false,
                });
                dirty.push(predictions.len() - 1);
                predictions.len() - 1
            });

            let entry = &mut predictions[j];
            let mut changed = entry.lookaheads.union_changed(first);
            if transparent {
                changed |= entry.lookaheads.union_changed(&inherited);
                if propagate && !entry.propagate {
                    entry.propagate = true;
                    changed = true;
                }
            }
            if changed {
                dirty.push(j);
            }
        }
    }

    predictions.shrink_to_fit();
    predictions
}

/// Reorder `predictions` so that cheaper productions of each reachable nonterminal
/// come first.
///
/// Starting from `symbol`, repeatedly take the cheapest prediction whose left-hand side
/// has become eligible; its leading nonterminal (if any) becomes eligible in turn.
fn sort_by_cost(
    store: &DottedStore<'_>,
    costs: &[i64],
    symbol: SymbolID,
    mut remaining: Vec<Prediction>,
) -> Vec<Prediction> {
    let g = store.grammar();
    let mut eligible = bit_vec::BitVec::from_elem(g.symbol_count(), false);
    eligible.set(symbol.index(), true);

    let mut sorted = Vec::with_capacity(remaining.len());
    loop {
        let next = remaining
            .iter()
            .enumerate()
            .filter(|(_, pred)| {
                let p = store.production(pred.dotted);
                eligible[g.lhs(p).index()]
            })
            .min_by_key(|(_, pred)| {
                let p = store.production(pred.dotted);
                (costs[p.index()], p)
            })
            .map(|(i, _)| i);
        let Some(i) = next else {
            break;
        };

        let pred = remaining.remove(i);
        if let Some(s) = store.next_symbol(pred.dotted) {
            if !g.is_terminal(s) {
                eligible.set(s.index(), true);
            }
        }
        sorted.push(pred);
    }

    // Predictions only ever come from leading nonterminals, so nothing is left over.
    debug_assert!(remaining.is_empty());
    sorted.append(&mut remaining);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        grammar::{examples, ContextFreeGrammar, Grammar},
        monitor::NoopMonitor,
    };

    fn find<'a>(preds: &'a [Prediction], store: &DottedStore<'_>, p: u16) -> &'a Prediction {
        let dotted = store.get(ProductionID::from_raw(p), 0);
        preds
            .iter()
            .find(|pred| pred.dotted == dotted)
            .unwrap_or_else(|| panic!("missing prediction for production {}", p))
    }

    #[test]
    fn closure_of_factored_arithmetic() {
        let g = Grammar::define(examples::factored_arithmetic).unwrap();
        let store = DottedStore::new(&g);
        let preds = Predictions::build(&store, None, &mut NoopMonitor).unwrap();
        let sym = |name: &str| g.find_symbol(name).unwrap();
        let set = |names: &[&str]| -> TerminalSet { names.iter().map(|n| sym(n)).collect() };

        // Closure of E: every production of E, T and F.
        let e = preds.get(sym("E"));
        assert_eq!(e.len(), 6);

        // E -> . E + T : seeded, generates `+` through left recursion.
        let p = find(e, &store, 1);
        assert!(p.propagate);
        assert_eq!(p.lookaheads, set(&["+"]));

        // T -> . T * F : reached from E -> . T, whose tail is empty.
        let p = find(e, &store, 3);
        assert!(p.propagate);
        assert_eq!(p.lookaheads, set(&["+", "*"]));

        // F -> . id
        let p = find(e, &store, 6);
        assert!(p.propagate);
        assert_eq!(p.lookaheads, set(&["+", "*"]));

        // Closure of F contains only F productions.
        let f = preds.get(sym("F"));
        assert_eq!(f.len(), 2);
        assert!(f.iter().all(|p| p.lookaheads.is_empty() && p.propagate));

        assert!(preds.get(sym("id")).is_empty());
    }

    #[test]
    fn propagate_flag_stops_at_non_nullable_tail() {
        // S -> A b ; A -> c
        let g = Grammar::define(|g| {
            let b = g.terminal("b")?;
            let c = g.terminal("c")?;
            let s = g.nonterminal("S")?;
            let a = g.nonterminal("A")?;
            g.production(s, [a, b])?;
            g.production(a, [c])?;
            Ok(())
        })
        .unwrap();
        let store = DottedStore::new(&g);
        let preds = Predictions::build(&store, None, &mut NoopMonitor).unwrap();

        let s = preds.get(g.find_symbol("S").unwrap());
        let p = find(s, &store, 2);
        assert!(!p.propagate);
        assert_eq!(p.lookaheads, TerminalSet::from_iter([g.find_symbol("b").unwrap()]));
    }

    #[test]
    fn nullable_tail_inherits_lookaheads() {
        let g = Grammar::define(examples::nullable).unwrap();
        let store = DottedStore::new(&g);
        let preds = Predictions::build(&store, None, &mut NoopMonitor).unwrap();

        // Stmts -> . Stmts Stmt ; Stmts -> .  (both generate FIRST(Stmt))
        let stmts = preds.get(g.find_symbol("Stmts").unwrap());
        assert_eq!(stmts.len(), 2);
        let first_stmt: TerminalSet = ["id", "{"]
            .iter()
            .map(|n| g.find_symbol(n).unwrap())
            .collect();
        for p in stmts {
            assert!(p.propagate);
            assert_eq!(p.lookaheads, first_stmt);
        }
    }

    #[test]
    fn sorted_by_cost() {
        let g = Grammar::define(examples::factored_arithmetic).unwrap();
        let costs = examples::factored_arithmetic_costs();
        let store = DottedStore::new(&g);
        let preds = Predictions::build(&store, Some(&costs), &mut NoopMonitor).unwrap();

        let order: Vec<u16> = preds
            .get(g.find_symbol("E").unwrap())
            .iter()
            .map(|p| store.production(p.dotted).into_raw())
            .collect();
        // E -> T (3), T -> F (2), F -> id (1), F -> ( E ) (4), T -> T * F (5), E -> E + T (6)
        assert_eq!(order, [2, 4, 6, 5, 3, 1]);

        let goal = preds.get(g.goal_symbol());
        assert_eq!(store.production(goal[0].dotted), ProductionID::GOAL);
    }
}
