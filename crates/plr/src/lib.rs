//! Generation of LR(1), PLR(1) and LALR(1) parse tables, with unwinding tables for
//! automatic error repair.
//!
//! ```
//! use plr::{grammar::{examples, Grammar}, Config};
//!
//! let g = Grammar::define(examples::expression).unwrap();
//! let tables = Config::new().use_lalr().generate(&g).unwrap();
//! assert_eq!(tables.conflict_count, 0);
//! ```

pub mod cognate;
pub mod config;
pub mod dotted;
pub mod first_sets;
pub mod grammar;
pub mod lr0;
pub mod monitor;
pub mod precedence;
pub mod prediction;
pub mod table;
pub mod types;
pub mod util;
pub mod validate;

pub use crate::{
    config::{Config, MachineKind, ParseMachineKindError},
    monitor::{CancelFlag, Cancelled, Monitor, NoopMonitor, Phase, WorkLimit},
    precedence::{prefer_lower_code, prefer_shift, ConflictResolver, YaccPrecedence},
    table::{Action, ActionCode, Automaton, Diagnostics, ParseTables},
    validate::{CostError, GrammarError},
};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid grammar")]
    Grammar(
        #[from]
        #[source]
        GrammarError,
    ),

    #[error("invalid production costs")]
    Cost(
        #[from]
        #[source]
        CostError,
    ),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl BuildError {
    /// Whether the construction was interrupted rather than rejected.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(..))
    }
}
