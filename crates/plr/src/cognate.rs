//! Lifting the LR(0) automaton to LR(1), PLR(1) or LALR(1) cognates.
//!
//! Cognates are created speculatively while successors are computed. Merging lookaheads
//! into an existing cognate invalidates its successors, which are dumped and rebuilt;
//! cognates that are no longer referenced are swept at the start of every pass.

use crate::{
    config::MachineKind,
    dotted::{DottedID, DottedStore},
    grammar::{ProductionID, SymbolID, TerminalSet},
    lr0::{LR0Automaton, LR0State, StateID},
    monitor::{Cancelled, Monitor, Phase},
    prediction::Predictions,
    types::{Map, Queue},
    util::display_fn,
};
use std::fmt;

/// Number of cognates processed between two progress reports.
const COGNATES_PER_REPORT: usize = 20;

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CognateID(u32);

impl CognateID {
    pub const INITIAL: Self = Self(0);

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).expect("too many cognates"))
    }
}

impl fmt::Debug for CognateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C#{:03}", self.0)
    }
}

/// An LR(0) state together with one lookahead set per basis element.
#[derive(Debug, Clone)]
pub struct Cognate {
    pub state: StateID,
    /// Aligned with the basis of `state`.
    pub lookaheads: Vec<TerminalSet>,
    /// Aligned with the transitions of `state`.
    pub successors: Vec<CognateID>,
    /// Completed productions of the closure and the lookaheads they reduce on.
    pub reductions: Vec<(ProductionID, TerminalSet)>,
}

#[derive(Debug, Default, Clone)]
pub struct CognateStats {
    /// Live cognates after the sweep of each pass.
    pub cognate_counts: Vec<usize>,
    pub passes: usize,
    pub merge_check_passes: usize,
}

#[derive(Debug)]
pub struct Cognates {
    pub cognates: Vec<Cognate>,
    pub stats: CognateStats,
}

impl Cognates {
    #[tracing::instrument(skip_all, fields(kind = ?kind))]
    pub fn build(
        store: &DottedStore<'_>,
        predictions: &Predictions,
        automaton: &LR0Automaton,
        kind: MachineKind,
        monitor: &mut dyn Monitor,
    ) -> Result<Self, Cancelled> {
        let plans: Vec<Plan> = automaton
            .states
            .iter()
            .map(|state| Plan::new(store, predictions, automaton, state))
            .collect();

        let (merge_checks, merge_check_passes) = match kind {
            MachineKind::PLR1 => merge_check_sets(automaton, &plans),
            MachineKind::LR1 | MachineKind::LALR1 => (vec![], 0),
        };

        let mut builder = Builder {
            kind,
            automaton,
            plans: &plans,
            merge_checks: &merge_checks,
            nodes: vec![],
            by_state: vec![vec![]; automaton.len()],
        };
        let initial = automaton.state(StateID::INITIAL);
        builder.create(
            StateID::INITIAL,
            vec![TerminalSet::default(); initial.basis.len()],
        );

        let mut stats = CognateStats {
            merge_check_passes,
            ..Default::default()
        };
        let mut computed = 0;
        loop {
            stats.passes += 1;
            builder.collect_garbage();
            let live = builder.nodes.iter().filter(|n| n.alive).count();
            stats.cognate_counts.push(live);
            tracing::debug!("pass {}: {} cognates", stats.passes, live);

            let mut work: Queue<usize> = (0..builder.nodes.len())
                .filter(|&x| builder.nodes[x].alive && builder.nodes[x].successors.is_none())
                .collect();
            if work.is_empty() {
                break;
            }

            while let Some(x) = work.pop() {
                let node = &builder.nodes[x];
                if !node.alive || node.refcount == 0 || node.successors.is_some() {
                    continue;
                }
                builder.compute_successors(x, &mut work);
                computed += 1;
                if computed % COGNATES_PER_REPORT == 0 {
                    monitor.work_done(Phase::Cognates)?;
                }
            }
        }

        Ok(Self {
            cognates: builder.finish(),
            stats,
        })
    }

    pub fn get(&self, id: CognateID) -> &Cognate {
        &self.cognates[id.index()]
    }

    pub fn len(&self) -> usize {
        self.cognates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cognates.is_empty()
    }
}

impl Cognate {
    /// The cognate reached from this one on `symbol`.
    pub fn successor(&self, automaton: &LR0Automaton, symbol: SymbolID) -> Option<CognateID> {
        let i = automaton
            .state(self.state)
            .transitions
            .get_index_of(&symbol)?;
        Some(self.successors[i])
    }

    /// Basis productions with their lookaheads, one per line.
    pub fn display<'a>(
        &'a self,
        store: &'a DottedStore<'a>,
        automaton: &'a LR0Automaton,
    ) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            let g = store.grammar();
            let state = automaton.state(self.state);
            writeln!(f, "## core: {:?}", self.state)?;
            for (item, lookaheads) in state.basis.iter().zip(&self.lookaheads) {
                writeln!(f, "- [{}] {}", store.display(*item), lookaheads.display(g))?;
            }
            Ok(())
        })
    }
}

/// Where the lookaheads of one item come from, relative to the basis of its state.
#[derive(Debug, Default, Clone)]
struct Flow {
    spontaneous: TerminalSet,
    /// Basis indices whose lookaheads are inherited.
    sources: Vec<usize>,
}

impl Flow {
    fn absorb(&mut self, other: &Flow) {
        self.spontaneous.union_with(&other.spontaneous);
        for k in &other.sources {
            if !self.sources.contains(k) {
                self.sources.push(*k);
            }
        }
    }

    fn apply(&self, lookaheads: &[TerminalSet]) -> TerminalSet {
        let mut result = self.spontaneous.clone();
        for &k in &self.sources {
            result.union_with(&lookaheads[k]);
        }
        result
    }
}

/// Precomputed lookahead propagation for one LR(0) state.
#[derive(Debug)]
struct Plan {
    /// For each transition, one flow per basis element of the target state.
    transitions: Vec<Vec<Flow>>,
    reductions: Vec<(ProductionID, Flow)>,
    shifted_terminals: TerminalSet,
}

impl Plan {
    fn new(
        store: &DottedStore<'_>,
        predictions: &Predictions,
        automaton: &LR0Automaton,
        state: &LR0State,
    ) -> Self {
        let g = store.grammar();
        let mut shifted = Map::<DottedID, Flow>::default();
        let mut reduced = Map::<DottedID, Flow>::default();
        let mut record = |item: DottedID, flow: &Flow| {
            if store.is_dot_at_end(item) {
                reduced.entry(item).or_default().absorb(flow);
            } else {
                shifted
                    .entry(store.shift_dot(item))
                    .or_default()
                    .absorb(flow);
            }
        };

        for (k, &item) in state.basis.iter().enumerate() {
            record(
                item,
                &Flow {
                    spontaneous: TerminalSet::default(),
                    sources: vec![k],
                },
            );

            let expected = match store.next_symbol(item) {
                Some(symbol) if !g.is_terminal(symbol) => symbol,
                _ => continue,
            };
            for prediction in predictions.get(expected) {
                let mut flow = Flow {
                    spontaneous: prediction.lookaheads.clone(),
                    sources: vec![],
                };
                if prediction.propagate {
                    flow.spontaneous
                        .union_with(store.first_set_after_dot(item));
                    if store.derives_epsilon_after_dot(item) {
                        flow.sources.push(k);
                    }
                }
                record(prediction.dotted, &flow);
            }
        }

        let transitions = state
            .transitions
            .values()
            .map(|next| {
                automaton
                    .state(*next)
                    .basis
                    .iter()
                    .map(|item| shifted[item].clone())
                    .collect()
            })
            .collect();

        let reductions = reduced
            .into_iter()
            .map(|(item, flow)| (store.production(item), flow))
            .collect();

        let shifted_terminals = state
            .transitions
            .keys()
            .copied()
            .filter(|s| g.is_terminal(*s))
            .collect();

        Self {
            transitions,
            reductions,
            shifted_terminals,
        }
    }
}

/// For each state, the terminals that could take part in a shift/reduce conflict in
/// that state or in any state reachable from it.
fn merge_check_sets(automaton: &LR0Automaton, plans: &[Plan]) -> (Vec<TerminalSet>, usize) {
    let mut sets: Vec<TerminalSet> = plans
        .iter()
        .map(|plan| {
            if plan.reductions.is_empty() {
                TerminalSet::default()
            } else {
                plan.shifted_terminals.clone()
            }
        })
        .collect();

    let mut passes = 0;
    let mut changed = true;
    while changed {
        changed = false;
        passes += 1;
        for (i, state) in automaton.states.iter().enumerate() {
            for next in state.transitions.values() {
                if next.index() == i {
                    continue;
                }
                let sub = sets[next.index()].clone();
                changed |= sets[i].union_changed(&sub);
            }
        }
    }
    tracing::debug!("merge check sets converged after {} passes", passes);

    (sets, passes)
}

/// Pager's weak compatibility between two lookahead assignments of the same core.
fn weakly_compatible(left: &[TerminalSet], right: &[TerminalSet]) -> bool {
    for i in 0..left.len() {
        for j in i + 1..left.len() {
            if left[i].intersects(&left[j]) || right[i].intersects(&right[j]) {
                continue;
            }
            if left[i].intersects(&right[j]) || right[i].intersects(&left[j]) {
                return false;
            }
        }
    }
    true
}

fn agree_on(left: &[TerminalSet], right: &[TerminalSet], check: &TerminalSet) -> bool {
    left.iter().zip(right).all(|(l, r)| {
        let mut l = l.clone();
        l.intersect_with(check);
        let mut r = r.clone();
        r.intersect_with(check);
        l == r
    })
}

#[derive(Debug)]
struct Node {
    state: StateID,
    lookaheads: Vec<TerminalSet>,
    successors: Option<Vec<usize>>,
    refcount: u32,
    alive: bool,
    /// Bumped whenever `lookaheads` grows.
    version: u32,
}

struct Builder<'a> {
    kind: MachineKind,
    automaton: &'a LR0Automaton,
    plans: &'a [Plan],
    merge_checks: &'a [TerminalSet],
    nodes: Vec<Node>,
    by_state: Vec<Vec<usize>>,
}

impl Builder<'_> {
    fn create(&mut self, state: StateID, lookaheads: Vec<TerminalSet>) -> usize {
        let x = self.nodes.len();
        self.nodes.push(Node {
            state,
            lookaheads,
            successors: None,
            refcount: 0,
            alive: true,
            version: 0,
        });
        self.by_state[state.index()].push(x);
        x
    }

    /// Recount references from the initial cognate and sweep everything unreachable.
    fn collect_garbage(&mut self) {
        for node in &mut self.nodes {
            node.refcount = 0;
        }

        let mut visited = bit_vec::BitVec::from_elem(self.nodes.len(), false);
        let mut stack = vec![0];
        self.nodes[0].refcount = 1;
        visited.set(0, true);
        while let Some(x) = stack.pop() {
            let successors = match &self.nodes[x].successors {
                Some(successors) => successors.clone(),
                None => continue,
            };
            for y in successors {
                self.nodes[y].refcount += 1;
                if !visited[y] {
                    visited.set(y, true);
                    stack.push(y);
                }
            }
        }

        let mut swept = 0;
        for node in &mut self.nodes {
            if node.alive && node.refcount == 0 {
                node.alive = false;
                node.successors = None;
                swept += 1;
            }
        }
        if swept > 0 {
            tracing::trace!("swept {} unreachable cognates", swept);
            let nodes = &self.nodes;
            for list in &mut self.by_state {
                list.retain(|&x| nodes[x].alive);
            }
        }
    }

    fn compute_successors(&mut self, x: usize, work: &mut Queue<usize>) {
        let state = self.nodes[x].state;
        let version = self.nodes[x].version;
        let lookaheads = self.nodes[x].lookaheads.clone();
        let automaton = self.automaton;
        let plans = self.plans;

        let transitions = &automaton.state(state).transitions;
        let mut successors = Vec::with_capacity(transitions.len());
        for (flows, next) in plans[state.index()]
            .transitions
            .iter()
            .zip(transitions.values())
        {
            let propagated: Vec<TerminalSet> =
                flows.iter().map(|f| f.apply(&lookaheads)).collect();
            let y = self.merge_into(*next, propagated, work);
            self.nodes[y].refcount += 1;
            successors.push(y);
        }
        self.nodes[x].successors = Some(successors);

        // A self-loop may have merged new lookaheads into `x` itself.
        if self.nodes[x].version != version {
            self.dump(x, work);
        }
    }

    fn merge_into(
        &mut self,
        state: StateID,
        lookaheads: Vec<TerminalSet>,
        work: &mut Queue<usize>,
    ) -> usize {
        let candidates = &self.by_state[state.index()];

        let same = candidates
            .iter()
            .copied()
            .find(|&y| self.nodes[y].lookaheads == lookaheads);
        let target = same.or_else(|| {
            candidates
                .iter()
                .copied()
                .find(|&y| self.may_merge(state, &self.nodes[y].lookaheads, &lookaheads))
        });

        let Some(y) = target else {
            let y = self.create(state, lookaheads);
            work.push(y);
            return y;
        };

        let node = &mut self.nodes[y];
        let mut changed = false;
        for (current, added) in node.lookaheads.iter_mut().zip(&lookaheads) {
            changed |= current.union_changed(added);
        }
        if changed {
            node.version += 1;
            tracing::trace!("merged lookaheads into cognate #{} of {:?}", y, state);
            self.dump(y, work);
        }
        if self.nodes[y].successors.is_none() {
            work.push(y);
        }
        y
    }

    fn may_merge(&self, state: StateID, left: &[TerminalSet], right: &[TerminalSet]) -> bool {
        match self.kind {
            MachineKind::LALR1 => true,
            MachineKind::LR1 => false,
            MachineKind::PLR1 => {
                weakly_compatible(left, right)
                    && agree_on(left, right, &self.merge_checks[state.index()])
            }
        }
    }

    /// Drop the successors of `x`, cascading to cognates left without references.
    fn dump(&mut self, x: usize, work: &mut Queue<usize>) {
        let mut stack = vec![x];
        while let Some(x) = stack.pop() {
            let successors = match self.nodes[x].successors.take() {
                Some(successors) => successors,
                None => continue,
            };
            if self.nodes[x].refcount > 0 {
                work.push(x);
            }
            for y in successors {
                let node = &mut self.nodes[y];
                node.refcount = node.refcount.saturating_sub(1);
                if node.refcount == 0 {
                    stack.push(y);
                }
            }
        }
    }

    /// Number the surviving cognates state by state.
    fn finish(self) -> Vec<Cognate> {
        let mut ids = vec![None; self.nodes.len()];
        let mut order = vec![];
        for list in &self.by_state {
            for &x in list {
                ids[x] = Some(CognateID::from_index(order.len()));
                order.push(x);
            }
        }
        debug_assert_eq!(order.first(), Some(&0));

        order
            .into_iter()
            .map(|x| {
                let node = &self.nodes[x];
                let successors = node
                    .successors
                    .iter()
                    .flatten()
                    .map(|&y| ids[y].expect("successor of a live cognate is alive"))
                    .collect();
                let reductions = self.plans[node.state.index()]
                    .reductions
                    .iter()
                    .map(|(p, flow)| (*p, flow.apply(&node.lookaheads)))
                    .collect();
                Cognate {
                    state: node.state,
                    lookaheads: node.lookaheads.clone(),
                    successors,
                    reductions,
                }
            })
            .collect()
    }
}
