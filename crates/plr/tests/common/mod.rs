#![allow(dead_code)]

use plr::{
    cognate::CognateID,
    grammar::{examples, ContextFreeGrammar, Grammar, SymbolID},
    Action, MachineKind, ParseTables,
};

pub const KINDS: [MachineKind; 3] = [MachineKind::LR1, MachineKind::PLR1, MachineKind::LALR1];

pub fn grammar(name: &str) -> Grammar {
    let example = examples::lookup(name).unwrap_or_else(|| panic!("no example `{}'", name));
    Grammar::define(example.define).unwrap()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Rejected,
    Conflict,
}

/// Run the table-driven parser on whitespace separated terminal names.
pub fn recognize(tables: &ParseTables<'_>, g: &Grammar, input: &str) -> Outcome {
    let mut tokens: Vec<SymbolID> = input
        .split_whitespace()
        .map(|name| {
            g.find_symbol(name)
                .unwrap_or_else(|| panic!("unknown terminal `{}'", name))
        })
        .collect();
    tokens.push(SymbolID::EOF);

    let mut stack = vec![CognateID::INITIAL];
    let mut pos = 0;
    loop {
        let top = *stack.last().unwrap();
        match tables.action(top, tokens[pos]) {
            Action::Shift(next) => {
                stack.push(next);
                pos += 1;
            }
            Action::Reduce(p) => {
                stack.truncate(stack.len() - g.rhs_len(p));
                let top = *stack.last().unwrap();
                match tables.action(top, g.lhs(p)) {
                    Action::Shift(next) => stack.push(next),
                    action => panic!("no goto on {:?} from {:?}: {:?}", g.lhs(p), top, action),
                }
            }
            Action::Accept => return Outcome::Accepted,
            Action::Error => return Outcome::Rejected,
            Action::Conflict(..) => return Outcome::Conflict,
        }
    }
}

/// A shortest symbol path from the initial cognate to every cognate, as the stack of
/// cognates it visits.
pub fn stacks(tables: &ParseTables<'_>) -> Vec<Vec<CognateID>> {
    let automaton = &tables.automaton;
    let mut paths: Vec<Option<Vec<CognateID>>> = vec![None; automaton.cognates.len()];
    paths[0] = Some(vec![CognateID::INITIAL]);
    let mut queue = std::collections::VecDeque::from([CognateID::INITIAL]);
    while let Some(id) = queue.pop_front() {
        let path = paths[id.index()].clone().unwrap();
        let cognate = automaton.cognate(id);
        let transitions = &automaton.lr0.state(cognate.state).transitions;
        for (symbol, next) in transitions.keys().zip(&cognate.successors) {
            if *symbol == SymbolID::EOF || paths[next.index()].is_some() {
                continue;
            }
            let mut path = path.clone();
            path.push(*next);
            paths[next.index()] = Some(path);
            queue.push_back(*next);
        }
    }
    paths.into_iter().flatten().collect()
}

/// Follow the unwinding actions from `stack` until accept, returning the number of shifts.
pub fn unwind(tables: &ParseTables<'_>, g: &Grammar, mut stack: Vec<CognateID>) -> usize {
    let step_limit = 100 * (tables.action_table.len() + 1);
    let mut shifts = 0;
    for _ in 0..step_limit {
        let top = *stack.last().unwrap();
        match tables.decode(tables.unwinding_parse_table[top.index()]) {
            Action::Accept => return shifts,
            Action::Shift(next) => {
                stack.push(next);
                shifts += 1;
            }
            Action::Reduce(p) => {
                stack.truncate(stack.len() - g.rhs_len(p));
                let top = *stack.last().unwrap();
                match tables.action(top, g.lhs(p)) {
                    Action::Shift(next) => stack.push(next),
                    action => panic!("no goto on {:?} from {:?}: {:?}", g.lhs(p), top, action),
                }
            }
            action => panic!("unexpected unwinding action in {:?}: {:?}", top, action),
        }
    }
    panic!("the unwinding did not terminate within {} steps", step_limit);
}
