use anyhow::Context as _;
use clap::Parser;
use plr::{
    grammar::{examples, ContextFreeGrammar, Grammar},
    prefer_lower_code, prefer_shift, Config, ConflictResolver, MachineKind, YaccPrecedence,
};
use std::{fs, path::PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Copy, Clone, clap::ValueEnum)]
enum Resolve {
    /// Leave every conflict unresolved.
    None,
    /// Prefer shifts over reductions.
    Shift,
    /// Prefer the lower action code.
    Lower,
    /// Use the declared operator precedences.
    Yacc,
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The name of a built-in grammar.
    grammar: String,

    /// The automaton to build: lr1, plr1 or lalr1.
    #[arg(long, default_value = "plr1")]
    algorithm: MachineKind,

    /// Distinguish LR(0) states whose bases differ only in order.
    #[arg(long)]
    preserve_order: bool,

    /// How to resolve conflicting actions.
    #[arg(long, value_enum, default_value = "none")]
    resolve: Resolve,

    /// Sort predictions by the production costs of the grammar.
    #[arg(long)]
    with_costs: bool,

    /// Print the automaton and the parse tables.
    #[arg(long)]
    dump: bool,

    /// Write the dump to this file instead of the standard output.
    #[arg(long, short)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::trace!("CLI args = {:?}", args);

    let example = examples::lookup(&args.grammar).with_context(|| {
        let names: Vec<_> = examples::ALL.iter().map(|e| e.name).collect();
        anyhow::anyhow!(
            "unknown grammar `{}' (available: {})",
            args.grammar,
            names.join(", ")
        )
    })?;
    let grammar = Grammar::define(example.define)
        .with_context(|| format!("failed to define the grammar `{}'", example.name))?;

    let shift = prefer_shift(grammar.production_count());
    let yacc = YaccPrecedence::new(&grammar);
    let resolver: Option<&dyn ConflictResolver> = match args.resolve {
        Resolve::None => None,
        Resolve::Shift => Some(&shift),
        Resolve::Lower => Some(&prefer_lower_code),
        Resolve::Yacc => Some(&yacc),
    };

    let mut config = Config::new();
    config
        .machine(args.algorithm)
        .preserve_order(args.preserve_order);
    if let Some(resolver) = resolver {
        config.resolver(resolver);
    }
    if args.with_costs {
        let costs = example
            .costs
            .with_context(|| format!("the grammar `{}' has no production costs", example.name))?;
        config.costs(costs());
    }

    let tables = config
        .generate(&grammar)
        .context("failed to generate the parse tables")?;

    let diagnostics = &tables.diagnostics;
    println!("{} ({})", example.name, args.algorithm);
    println!("  LR(0) states:       {}", diagnostics.state_count);
    println!("  cognates:           {}", tables.action_table.len());
    println!("  cognates per pass:  {:?}", diagnostics.cognate_counts);
    println!("  conflicts:          {}", tables.conflict_count);
    println!("  conflict sets:      {}", tables.conflict_sets.len());
    println!("  resolved conflicts: {}", diagnostics.conflicts_resolved);

    if args.dump {
        let dump = format!("{}\n{}", grammar, tables.display());
        match &args.output {
            Some(path) => fs::write(path, dump)
                .with_context(|| format!("failed to write the dump to {}", path.display()))?,
            None => print!("{}", dump),
        }
    }

    if tables.conflict_count > 0 {
        anyhow::bail!(
            "{} unresolved conflict{} remain",
            tables.conflict_count,
            if tables.conflict_count == 1 { "" } else { "s" }
        );
    }

    Ok(())
}
