//! Construction settings and the table generation pipeline.

use crate::{
    cognate::Cognates,
    dotted::DottedStore,
    grammar::ContextFreeGrammar,
    lr0::LR0Automaton,
    monitor::{Monitor, NoopMonitor},
    precedence::ConflictResolver,
    prediction::Predictions,
    table::{self, Automaton, Diagnostics, ParseTables},
    validate, BuildError,
};
use std::{fmt, str::FromStr};

/// The merge policy applied to cognates of the same LR(0) state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum MachineKind {
    /// Knuth's canonical LR(1): cognates merge only when their lookaheads are equal.
    LR1,
    /// Pager's practical LR(1): cognates merge when weakly compatible.
    #[default]
    PLR1,
    /// LALR(1): one cognate per LR(0) state.
    LALR1,
}

impl fmt::Display for MachineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LR1 => f.write_str("LR(1)"),
            Self::PLR1 => f.write_str("PLR(1)"),
            Self::LALR1 => f.write_str("LALR(1)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown machine type `{input}' (expected lr1, plr1 or lalr1)")]
pub struct ParseMachineKindError {
    input: String,
}

impl FromStr for MachineKind {
    type Err = ParseMachineKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &*s.to_ascii_lowercase() {
            "lr1" | "canonical" => Ok(Self::LR1),
            "plr1" | "pgm" => Ok(Self::PLR1),
            "lalr1" | "lalr" => Ok(Self::LALR1),
            _ => Err(ParseMachineKindError { input: s.into() }),
        }
    }
}

/// Settings for generating parse tables.
#[derive(Clone, Default)]
pub struct Config<'c> {
    kind: MachineKind,
    order_preserving: bool,
    costs: Option<Vec<i64>>,
    resolver: Option<&'c dyn ConflictResolver>,
}

impl fmt::Debug for Config<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("kind", &self.kind)
            .field("order_preserving", &self.order_preserving)
            .field("costs", &self.costs)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

impl<'c> Config<'c> {
    pub const fn new() -> Self {
        Self {
            kind: MachineKind::PLR1,
            order_preserving: false,
            costs: None,
            resolver: None,
        }
    }

    /// Merge cognates as Knuth's canonical LR(1) method does.
    pub fn use_canonical(&mut self) -> &mut Self {
        self.kind = MachineKind::LR1;
        self
    }

    /// Merge cognates with Pager's Practical General Method.
    ///
    /// This is the default, as it keeps the automaton close to the LALR(1) size without
    /// introducing reduce/reduce conflicts.
    pub fn use_pgm(&mut self) -> &mut Self {
        self.kind = MachineKind::PLR1;
        self
    }

    /// Merge all cognates of an LR(0) state, as LALR(1) does.
    pub fn use_lalr(&mut self) -> &mut Self {
        self.kind = MachineKind::LALR1;
        self
    }

    pub fn machine(&mut self, kind: MachineKind) -> &mut Self {
        self.kind = kind;
        self
    }

    pub fn kind(&self) -> MachineKind {
        self.kind
    }

    /// Only identify LR(0) states whose bases list the same items in the same order.
    pub fn preserve_order(&mut self, enabled: bool) -> &mut Self {
        self.order_preserving = enabled;
        self
    }

    /// Production costs, indexed by production. Predictions are sorted by these costs,
    /// which makes the unwinding actions follow the cheapest completions.
    ///
    /// Unwinding from every state is only guaranteed to reach acceptance when the
    /// grammar is not cyclic, i.e. no nonterminal derives itself in one or more steps
    /// without consuming input (`A -> A B` with `B -> ε`, for example).
    pub fn costs(&mut self, costs: Vec<i64>) -> &mut Self {
        self.costs = Some(costs);
        self
    }

    pub fn resolver(&mut self, resolver: &'c dyn ConflictResolver) -> &mut Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn generate<'g>(
        &self,
        g: &'g dyn ContextFreeGrammar,
    ) -> Result<ParseTables<'g>, BuildError> {
        self.generate_with_monitor(g, &mut NoopMonitor)
    }

    #[tracing::instrument(skip_all, fields(kind = %self.kind))]
    pub fn generate_with_monitor<'g>(
        &self,
        g: &'g dyn ContextFreeGrammar,
        monitor: &mut dyn Monitor,
    ) -> Result<ParseTables<'g>, BuildError> {
        let goal = validate::validate_grammar(g)?;
        if let Some(costs) = &self.costs {
            validate::validate_costs(g, costs)?;
        }

        let store = DottedStore::new(g);
        let predictions = Predictions::build(&store, self.costs.as_deref(), monitor)?;
        let lr0 = LR0Automaton::build(
            &store,
            &predictions,
            goal.production,
            self.order_preserving,
            monitor,
        )?;
        let cognates = Cognates::build(&store, &predictions, &lr0, self.kind, monitor)?;
        let tables = table::generate(
            &store,
            &lr0,
            &cognates.cognates,
            goal.production,
            goal.eof,
            self.resolver,
            monitor,
        )?;

        tracing::debug!(
            "{} states, {} cognates, {} conflicts",
            lr0.len(),
            cognates.len(),
            tables.conflict_count
        );

        Ok(ParseTables {
            action_table: tables.action_table,
            unwinding_table: tables.unwinding_table,
            unwinding_parse_table: tables.unwinding_parse_table,
            conflict_sets: tables.conflict_sets,
            conflict_count: tables.conflict_count,
            diagnostics: Diagnostics {
                state_count: lr0.len(),
                cognate_counts: cognates.stats.cognate_counts,
                passes: cognates.stats.passes,
                merge_check_passes: cognates.stats.merge_check_passes,
                conflicts_resolved: tables.conflicts_resolved,
            },
            automaton: Automaton {
                store,
                lr0,
                cognates: cognates.cognates,
                goal: goal.production,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_machine_kind() {
        assert_eq!("lr1".parse(), Ok(MachineKind::LR1));
        assert_eq!("Canonical".parse(), Ok(MachineKind::LR1));
        assert_eq!("PLR1".parse(), Ok(MachineKind::PLR1));
        assert_eq!("pgm".parse(), Ok(MachineKind::PLR1));
        assert_eq!("lalr1".parse(), Ok(MachineKind::LALR1));
        assert_eq!("LALR".parse(), Ok(MachineKind::LALR1));
        assert!("slr".parse::<MachineKind>().is_err());
    }

    #[test]
    fn builder_settings() {
        let mut config = Config::new();
        assert_eq!(config.kind(), MachineKind::PLR1);
        config.use_canonical();
        assert_eq!(config.kind(), MachineKind::LR1);
        config.use_lalr().preserve_order(true);
        assert_eq!(config.kind(), MachineKind::LALR1);
        assert!(config.order_preserving);
        config.machine(MachineKind::PLR1);
        assert_eq!(config.kind(), MachineKind::PLR1);
    }
}
