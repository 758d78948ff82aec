//! Built-in grammars used by the command line tool, the tests and the benchmarks.

use super::{Assoc, GrammarDef, GrammarDefError, Precedence};

type DefineFn = fn(&mut GrammarDef) -> Result<(), GrammarDefError>;

/// A named example grammar, optionally with a production cost table.
#[derive(Debug, Clone, Copy)]
pub struct Example {
    pub name: &'static str,
    pub define: DefineFn,
    pub costs: Option<fn() -> Vec<i64>>,
}

pub const ALL: &[Example] = &[
    Example {
        name: "expression",
        define: expression,
        costs: Some(expression_costs),
    },
    Example {
        name: "dangling-else",
        define: dangling_else,
        costs: None,
    },
    Example {
        name: "arithmetic",
        define: arithmetic,
        costs: None,
    },
    Example {
        name: "factored-arithmetic",
        define: factored_arithmetic,
        costs: Some(factored_arithmetic_costs),
    },
    Example {
        name: "lr1-not-lalr",
        define: lr1_not_lalr,
        costs: None,
    },
    Example {
        name: "nullable",
        define: nullable,
        costs: None,
    },
];

pub fn lookup(name: &str) -> Option<&'static Example> {
    ALL.iter().find(|e| e.name == name)
}

/// ```text
/// E -> E + T | T
/// T -> id
/// ```
pub fn expression(g: &mut GrammarDef) -> Result<(), GrammarDefError> {
    let plus = g.terminal("+")?;
    let id = g.terminal("id")?;

    let e = g.nonterminal("E")?;
    let t = g.nonterminal("T")?;

    g.production(e, [e, plus, t])?;
    g.production(e, [t])?;
    g.production(t, [id])?;

    Ok(())
}

pub fn expression_costs() -> Vec<i64> {
    // $goal -> E $end, E -> E + T, E -> T, T -> id
    vec![4, 3, 2, 1]
}

/// ```text
/// S -> if E then S | if E then S else S | other
/// E -> cond
/// ```
pub fn dangling_else(g: &mut GrammarDef) -> Result<(), GrammarDefError> {
    let if_ = g.terminal("if")?;
    let then = g.terminal("then")?;
    let else_ = g.terminal("else")?;
    let other = g.terminal("other")?;
    let cond = g.terminal("cond")?;

    let s = g.nonterminal("S")?;
    let e = g.nonterminal("E")?;

    g.production(s, [if_, e, then, s])?;
    g.production(s, [if_, e, then, s, else_, s])?;
    g.production(s, [other])?;
    g.production(e, [cond])?;

    Ok(())
}

/// An ambiguous arithmetic grammar disambiguated by operator precedences.
pub fn arithmetic(g: &mut GrammarDef) -> Result<(), GrammarDefError> {
    let plus = g.terminal_with_precedence("+", Precedence::new(0, Assoc::Left))?;
    let minus = g.terminal_with_precedence("-", Precedence::new(0, Assoc::Left))?;
    let star = g.terminal_with_precedence("*", Precedence::new(1, Assoc::Left))?;
    let slash = g.terminal_with_precedence("/", Precedence::new(1, Assoc::Left))?;
    let caret = g.terminal_with_precedence("^", Precedence::new(2, Assoc::Right))?;
    let eq = g.terminal_with_precedence("==", Precedence::new(3, Assoc::Nonassoc))?;
    let lparen = g.terminal("(")?;
    let rparen = g.terminal(")")?;
    let num = g.terminal("num")?;

    let s = g.nonterminal("S")?;
    let e = g.nonterminal("E")?;

    g.production(s, [e])?;
    g.production(s, [e, eq, e])?;
    g.production(e, [e, plus, e])?;
    g.production(e, [e, minus, e])?;
    g.production(e, [e, star, e])?;
    g.production(e, [e, slash, e])?;
    g.production(e, [e, caret, e])?;
    g.production_with_precedence(e, [minus, e], Precedence::new(4, Assoc::Right))?;
    g.production(e, [lparen, e, rparen])?;
    g.production(e, [num])?;

    Ok(())
}

/// ```text
/// E -> E + T | T
/// T -> T * F | F
/// F -> ( E ) | id
/// ```
pub fn factored_arithmetic(g: &mut GrammarDef) -> Result<(), GrammarDefError> {
    let plus = g.terminal("+")?;
    let star = g.terminal("*")?;
    let lparen = g.terminal("(")?;
    let rparen = g.terminal(")")?;
    let id = g.terminal("id")?;

    let e = g.nonterminal("E")?;
    let t = g.nonterminal("T")?;
    let f = g.nonterminal("F")?;

    g.production(e, [e, plus, t])?;
    g.production(e, [t])?;
    g.production(t, [t, star, f])?;
    g.production(t, [f])?;
    g.production(f, [lparen, e, rparen])?;
    g.production(f, [id])?;

    Ok(())
}

pub fn factored_arithmetic_costs() -> Vec<i64> {
    // $goal, E -> E + T, E -> T, T -> T * F, T -> F, F -> ( E ), F -> id
    vec![7, 6, 3, 5, 2, 4, 1]
}

/// LR(1) but not LALR(1): merging the two states reached on `c` yields
/// reduce/reduce conflicts on `d` and `e`.
///
/// ```text
/// S -> a A d | b B d | a B e | b A e
/// A -> c
/// B -> c
/// ```
pub fn lr1_not_lalr(g: &mut GrammarDef) -> Result<(), GrammarDefError> {
    let a = g.terminal("a")?;
    let b = g.terminal("b")?;
    let c = g.terminal("c")?;
    let d = g.terminal("d")?;
    let e = g.terminal("e")?;

    let s = g.nonterminal("S")?;
    let na = g.nonterminal("A")?;
    let nb = g.nonterminal("B")?;

    g.production(s, [a, na, d])?;
    g.production(s, [b, nb, d])?;
    g.production(s, [a, nb, e])?;
    g.production(s, [b, na, e])?;
    g.production(na, [c])?;
    g.production(nb, [c])?;

    Ok(())
}

/// Blocks of statements with empty productions.
///
/// ```text
/// Block -> { Stmts }
/// Stmts -> Stmts Stmt | ε
/// Stmt  -> id Init ; | Block
/// Init  -> = id | ε
/// ```
pub fn nullable(g: &mut GrammarDef) -> Result<(), GrammarDefError> {
    let lbrace = g.terminal("{")?;
    let rbrace = g.terminal("}")?;
    let semi = g.terminal(";")?;
    let eq = g.terminal("=")?;
    let id = g.terminal("id")?;

    let block = g.nonterminal("Block")?;
    let stmts = g.nonterminal("Stmts")?;
    let stmt = g.nonterminal("Stmt")?;
    let init = g.nonterminal("Init")?;

    g.production(block, [lbrace, stmts, rbrace])?;
    g.production(stmts, [stmts, stmt])?;
    g.production(stmts, [])?;
    g.production(stmt, [id, init, semi])?;
    g.production(stmt, [block])?;
    g.production(init, [eq, id])?;
    g.production(init, [])?;

    Ok(())
}
