//! Entry checks on the grammar oracle and the production costs.

use crate::grammar::{self, ContextFreeGrammar, ProductionID, SymbolID};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    #[error("no production derives the goal symbol `{goal}'")]
    MissingGoalProduction { goal: String },

    #[error("the goal symbol `{goal}' has {count} productions")]
    MultipleGoalProductions { goal: String, count: usize },

    #[error("the goal production has an empty right-hand side")]
    EmptyGoalProduction,

    #[error("the goal production must end with a terminal, found `{symbol}'")]
    UnterminatedGoalProduction { symbol: String },

    #[error("`{symbol}' is reserved for the goal production but appears in `{production}'")]
    ReservedSymbol { symbol: String, production: String },

    #[error("the nonterminal `{symbol}' derives no terminal string")]
    NonProductive { symbol: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CostError {
    #[error("expected {expected} production costs, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("`{symbol}' in `{production}' has no production cheaper than {cost}")]
    NotDominated {
        production: String,
        symbol: String,
        cost: i64,
    },
}

/// The unique production of the goal symbol and its end-of-input terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GoalProduction {
    pub production: ProductionID,
    pub eof: SymbolID,
}

pub fn validate_grammar(g: &dyn ContextFreeGrammar) -> Result<GoalProduction, GrammarError> {
    let goal = g.goal_symbol();
    let goal_name = || g.symbol_name(goal).to_owned();

    let goals: Vec<ProductionID> = grammar::productions(g)
        .filter(|p| g.lhs(*p) == goal)
        .collect();
    let production = match goals[..] {
        [] => return Err(GrammarError::MissingGoalProduction { goal: goal_name() }),
        [p] => p,
        _ => {
            return Err(GrammarError::MultipleGoalProductions {
                goal: goal_name(),
                count: goals.len(),
            })
        }
    };

    let len = g.rhs_len(production);
    if len == 0 {
        return Err(GrammarError::EmptyGoalProduction);
    }
    let eof = g.rhs_symbol(production, len - 1);
    if !g.is_terminal(eof) {
        return Err(GrammarError::UnterminatedGoalProduction {
            symbol: g.symbol_name(eof).to_owned(),
        });
    }

    for p in grammar::productions(g) {
        for i in 0..g.rhs_len(p) {
            let symbol = g.rhs_symbol(p, i);
            let is_goal_eof = p == production && i == len - 1;
            if symbol == goal || (symbol == eof && !is_goal_eof) {
                return Err(GrammarError::ReservedSymbol {
                    symbol: g.symbol_name(symbol).to_owned(),
                    production: grammar::display_production(g, p, None).to_string(),
                });
            }
        }
    }

    check_productive(g)?;

    Ok(GoalProduction { production, eof })
}

/// Every nonterminal reachable from the goal symbol must derive some terminal string.
fn check_productive(g: &dyn ContextFreeGrammar) -> Result<(), GrammarError> {
    let mut productive = bit_vec::BitVec::from_elem(g.symbol_count(), false);
    let mut changed = true;
    while changed {
        changed = false;
        for p in grammar::productions(g) {
            let lhs = g.lhs(p);
            if productive[lhs.index()] {
                continue;
            }
            let ok = (0..g.rhs_len(p)).all(|i| {
                let s = g.rhs_symbol(p, i);
                g.is_terminal(s) || productive[s.index()]
            });
            if ok {
                productive.set(lhs.index(), true);
                changed = true;
            }
        }
    }

    let mut reachable = bit_vec::BitVec::from_elem(g.symbol_count(), false);
    let mut stack = vec![g.goal_symbol()];
    reachable.set(g.goal_symbol().index(), true);
    while let Some(symbol) = stack.pop() {
        if !productive[symbol.index()] {
            return Err(GrammarError::NonProductive {
                symbol: g.symbol_name(symbol).to_owned(),
            });
        }
        for p in grammar::productions(g).filter(|p| g.lhs(*p) == symbol) {
            for i in 0..g.rhs_len(p) {
                let s = g.rhs_symbol(p, i);
                if !g.is_terminal(s) && !reachable[s.index()] {
                    reachable.set(s.index(), true);
                    stack.push(s);
                }
            }
        }
    }

    Ok(())
}

/// Every nonterminal on a right-hand side must have a production strictly cheaper
/// than the production it appears in.
pub fn validate_costs(g: &dyn ContextFreeGrammar, costs: &[i64]) -> Result<(), CostError> {
    if costs.len() != g.production_count() {
        return Err(CostError::LengthMismatch {
            expected: g.production_count(),
            actual: costs.len(),
        });
    }

    let mut cheapest: Vec<Option<i64>> = vec![None; g.symbol_count()];
    for p in grammar::productions(g) {
        let slot = &mut cheapest[g.lhs(p).index()];
        let cost = costs[p.index()];
        *slot = Some(slot.map_or(cost, |c| c.min(cost)));
    }

    for p in grammar::productions(g) {
        let cost = costs[p.index()];
        for i in 0..g.rhs_len(p) {
            let symbol = g.rhs_symbol(p, i);
            if g.is_terminal(symbol) {
                continue;
            }
            if !matches!(cheapest[symbol.index()], Some(c) if c < cost) {
                return Err(CostError::NotDominated {
                    production: grammar::display_production(g, p, None).to_string(),
                    symbol: g.symbol_name(symbol).to_owned(),
                    cost,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{examples, Grammar, TerminalSet};

    /// A hand-written oracle for grammars `Grammar` refuses to build.
    struct Raw {
        names: Vec<&'static str>,
        terminals: Vec<bool>,
        productions: Vec<(u16, Vec<u16>)>,
    }

    impl ContextFreeGrammar for Raw {
        fn symbol_count(&self) -> usize {
            self.names.len()
        }
        fn is_terminal(&self, symbol: SymbolID) -> bool {
            self.terminals[symbol.index()]
        }
        fn production_count(&self) -> usize {
            self.productions.len()
        }
        fn lhs(&self, production: ProductionID) -> SymbolID {
            SymbolID::from_raw(self.productions[production.index()].0)
        }
        fn rhs_len(&self, production: ProductionID) -> usize {
            self.productions[production.index()].1.len()
        }
        fn rhs_symbol(&self, production: ProductionID, index: usize) -> SymbolID {
            SymbolID::from_raw(self.productions[production.index()].1[index])
        }
        fn goal_symbol(&self) -> SymbolID {
            SymbolID::from_raw(0)
        }
        fn first_set(&self, _: ProductionID, _: usize) -> TerminalSet {
            TerminalSet::default()
        }
        fn follow_set(&self, _: SymbolID) -> TerminalSet {
            TerminalSet::default()
        }
        fn derives_epsilon(&self, _: ProductionID, _: usize) -> bool {
            false
        }
        fn symbol_name(&self, symbol: SymbolID) -> &str {
            self.names[symbol.index()]
        }
    }

    // Symbols: 0 = $goal, 1 = $end, 2 = a, 3 = S
    fn raw(productions: Vec<(u16, Vec<u16>)>) -> Raw {
        Raw {
            names: vec!["$goal", "$end", "a", "S"],
            terminals: vec![false, true, true, false],
            productions,
        }
    }

    #[test]
    fn accepts_well_formed_goal() {
        let g = raw(vec![(0, vec![3, 1]), (3, vec![2])]);
        let goal = validate_grammar(&g).unwrap();
        assert_eq!(goal.production, ProductionID::from_raw(0));
        assert_eq!(goal.eof, SymbolID::from_raw(1));
    }

    #[test]
    fn rejects_malformed_goal() {
        let g = raw(vec![(3, vec![2])]);
        assert!(matches!(
            validate_grammar(&g),
            Err(GrammarError::MissingGoalProduction { .. })
        ));

        let g = raw(vec![(0, vec![3, 1]), (0, vec![2, 1]), (3, vec![2])]);
        assert!(matches!(
            validate_grammar(&g),
            Err(GrammarError::MultipleGoalProductions { count: 2, .. })
        ));

        let g = raw(vec![(0, vec![]), (3, vec![2])]);
        assert_eq!(validate_grammar(&g), Err(GrammarError::EmptyGoalProduction));

        let g = raw(vec![(0, vec![2, 3]), (3, vec![2])]);
        assert!(matches!(
            validate_grammar(&g),
            Err(GrammarError::UnterminatedGoalProduction { .. })
        ));

        let g = raw(vec![(0, vec![3, 1]), (3, vec![2, 1])]);
        assert!(matches!(
            validate_grammar(&g),
            Err(GrammarError::ReservedSymbol { .. })
        ));

        let g = raw(vec![(0, vec![3, 1]), (3, vec![0])]);
        assert!(matches!(
            validate_grammar(&g),
            Err(GrammarError::ReservedSymbol { .. })
        ));

        let g = raw(vec![(0, vec![3, 1]), (3, vec![3, 2])]);
        assert!(matches!(
            validate_grammar(&g),
            Err(GrammarError::NonProductive { .. })
        ));
    }

    #[test]
    fn cost_domination() {
        let g = Grammar::define(examples::factored_arithmetic).unwrap();
        assert_eq!(
            validate_costs(&g, &examples::factored_arithmetic_costs()),
            Ok(())
        );

        assert_eq!(
            validate_costs(&g, &[1, 2, 3]),
            Err(CostError::LengthMismatch {
                expected: 7,
                actual: 3
            })
        );

        // E -> T no longer cheaper than F -> ( E )
        let mut costs = examples::factored_arithmetic_costs();
        costs[2] = 4;
        assert!(matches!(
            validate_costs(&g, &costs),
            Err(CostError::NotDominated { cost: 4, .. })
        ));
    }
}
