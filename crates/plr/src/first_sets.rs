//! Calculation of nullable, first and follow sets.

use crate::grammar::{Production, SymbolData, SymbolID, TerminalSet};

#[derive(Debug)]
pub struct FirstSets {
    nulls: bit_vec::BitVec,
    firsts: Vec<TerminalSet>,
    follows: Vec<TerminalSet>,
}

impl FirstSets {
    pub fn new(symbols: &[SymbolData], productions: &[Production]) -> Self {
        let nulls = nulls_set(symbols, productions);
        let firsts = first_sets(symbols, productions, &nulls);
        let follows = follow_sets(symbols, productions, &nulls, &firsts);
        Self {
            nulls,
            firsts,
            follows,
        }
    }

    pub fn is_nullable(&self, symbol: SymbolID) -> bool {
        self.nulls.get(symbol.index()).unwrap_or(false)
    }

    pub fn is_nullable_seq(&self, seq: &[SymbolID]) -> bool {
        seq.iter().all(|s| self.is_nullable(*s))
    }

    /// `First(seq)`
    pub fn first_of(&self, seq: &[SymbolID]) -> TerminalSet {
        let mut res = TerminalSet::default();
        for symbol in seq {
            res.union_with(&self.firsts[symbol.index()]);
            if !self.is_nullable(*symbol) {
                break;
            }
        }
        res
    }

    pub fn follow(&self, symbol: SymbolID) -> &TerminalSet {
        &self.follows[symbol.index()]
    }
}

/// Calculate the set of nullable symbols in this grammar.
fn nulls_set(symbols: &[SymbolData], productions: &[Production]) -> bit_vec::BitVec {
    let mut nulls = bit_vec::BitVec::from_elem(symbols.len(), false);

    // Repeat until no more nonterminals become nullable.
    let mut changed = true;
    while changed {
        changed = false;
        for p in productions {
            if nulls[p.left.index()] {
                continue;
            }
            if p.right.iter().all(|s| nulls[s.index()]) {
                nulls.set(p.left.index(), true);
                changed = true;
            }
        }
    }

    nulls
}

/// Constraint `sup ⊇ sub` between two symbol-indexed sets.
#[derive(Debug)]
struct Constraint {
    sup: SymbolID,
    sub: SymbolID,
}

fn solve(sets: &mut [TerminalSet], constraints: &[Constraint]) {
    let mut changed = true;
    while changed {
        changed = false;
        for Constraint { sup, sub } in constraints {
            if sup == sub {
                continue;
            }
            let subset = sets[sub.index()].clone();
            changed |= sets[sup.index()].union_changed(&subset);
        }
    }
}

fn first_sets(
    symbols: &[SymbolData],
    productions: &[Production],
    nulls: &bit_vec::BitVec,
) -> Vec<TerminalSet> {
    // First(T) = {T} for terminals, and starts out empty for nonterminals.
    let mut sets: Vec<TerminalSet> = symbols
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let mut set = TerminalSet::default();
            if s.terminal {
                set.insert(SymbolID::from_raw(i as u16));
            }
            set
        })
        .collect();

    // For `X -> Y1 Y2 ... Yn`, First(X) ⊇ First(Yi) for every Yi up to and
    // including the first non-nullable one.
    let mut constraints = vec![];
    for p in productions {
        for symbol in &p.right {
            constraints.push(Constraint {
                sup: p.left,
                sub: *symbol,
            });
            if !nulls[symbol.index()] {
                break;
            }
        }
    }

    solve(&mut sets, &constraints);
    sets
}

fn follow_sets(
    symbols: &[SymbolData],
    productions: &[Production],
    nulls: &bit_vec::BitVec,
    firsts: &[TerminalSet],
) -> Vec<TerminalSet> {
    let mut sets = vec![TerminalSet::default(); symbols.len()];

    // For `A -> α B β`, Follow(B) ⊇ First(β), and Follow(B) ⊇ Follow(A) if β is nullable.
    let mut constraints = vec![];
    for p in productions {
        for (i, symbol) in p.right.iter().enumerate() {
            if symbols[symbol.index()].terminal {
                continue;
            }
            let mut nullable_rest = true;
            for next in &p.right[i + 1..] {
                sets[symbol.index()].union_with(&firsts[next.index()]);
                if !nulls[next.index()] {
                    nullable_rest = false;
                    break;
                }
            }
            if nullable_rest {
                constraints.push(Constraint {
                    sup: *symbol,
                    sub: p.left,
                });
            }
        }
    }

    solve(&mut sets, &constraints);
    sets
}

#[cfg(test)]
mod tests {
    use crate::grammar::{ContextFreeGrammar, Grammar, ProductionID, SymbolID, TerminalSet};

    #[test]
    fn nullable_first_and_follow() {
        // S -> A B c ; A -> a | ε ; B -> b | ε
        let g = Grammar::define(|g| {
            let a = g.terminal("a")?;
            let b = g.terminal("b")?;
            let c = g.terminal("c")?;
            let s = g.nonterminal("S")?;
            let na = g.nonterminal("A")?;
            let nb = g.nonterminal("B")?;
            g.production(s, [na, nb, c])?;
            g.production(na, [a])?;
            g.production(na, [])?;
            g.production(nb, [b])?;
            g.production(nb, [])?;
            Ok(())
        })
        .unwrap();
        let sym = |name: &str| g.find_symbol(name).unwrap();
        let set = |names: &[&str]| -> TerminalSet { names.iter().map(|n| sym(n)).collect() };

        assert!(g.is_nullable(sym("A")));
        assert!(g.is_nullable(sym("B")));
        assert!(!g.is_nullable(sym("S")));

        let p = ProductionID::from_raw(1);
        assert_eq!(g.first_set(p, 0), set(&["a", "b", "c"]));
        assert_eq!(g.first_set(p, 1), set(&["b", "c"]));
        assert_eq!(g.first_set(p, 3), set(&[]));
        assert!(!g.derives_epsilon(p, 0));
        assert!(!g.derives_epsilon(p, 2));
        assert!(g.derives_epsilon(p, 3));

        assert_eq!(g.follow_set(sym("A")), set(&["b", "c"]));
        assert_eq!(g.follow_set(sym("B")), set(&["c"]));
        assert!(g.follow_set(sym("S")).contains(SymbolID::EOF));
    }
}
