//! Interpolation transport.
//!
//! Sequence interpolation is not part of the incremental session: an
//! [`Interpolator`] runs a dedicated interpolating solver (MathSAT,
//! SMTInterpol, ...) on a one-shot SMT-LIB 2 script made of the recorded
//! declarations/definitions and the named assertion groups, asks for
//! `(get-interpolants ...)`, and parses the answer back into factory terms.
//!
//! The answer parser handles `let`-bindings and resolves variable symbols
//! of the form `<qualified-id>@<offset>` against the system's declarations,
//! so parsed interpolants are structurally identical to factory-built terms
//! over the same variables.

crate::prelude!();

use std::process::{Command, Stdio};

use term::{Cst, Op, Term, Terms};
use trans::{Decls, FunDec, FunDef};

/// Runs an interpolating solver on one-shot scripts.
#[derive(Debug, Clone)]
pub struct Interpolator {
    /// Solver command, whitespace-separated binary and options.
    cmd: String,
}

impl Interpolator {
    /// Constructor.
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    /// Computes the sequence interpolants of the assertion groups.
    ///
    /// For `n` groups `A_0, ..., A_{n-1}` this returns `n - 1` terms
    /// `J_0, ..., J_{n-2}` such that each `J_i` follows from
    /// `A_0 ∧ ... ∧ A_i` and is inconsistent with `A_{i+1} ∧ ... ∧ A_{n-1}`.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::Inconsistency`] when the solver answers `sat`: callers
    ///   only interpolate queries already known to be unsatisfiable.
    #[allow(clippy::too_many_arguments)]
    pub fn interpolants(
        &self,
        logic: &str,
        decls: &[(String, term::Typ)],
        fun_decs: &[FunDec],
        fun_defs: &[FunDef],
        groups: &[(String, Term)],
        resolver: &Decls,
        terms: &Terms,
    ) -> Res<Vec<Term>> {
        let script = self.script(logic, decls, fun_decs, fun_defs, groups);
        let stdout = self
            .run(&script)
            .chain_err(|| "while running the interpolating solver")?;
        self.parse_answer(&stdout, groups.len(), resolver, terms)
    }

    /// Builds the one-shot script.
    fn script(
        &self,
        logic: &str,
        decls: &[(String, term::Typ)],
        fun_decs: &[FunDec],
        fun_defs: &[FunDef],
        groups: &[(String, Term)],
    ) -> String {
        let mut s = String::with_capacity(1024);
        s.push_str("(set-option :print-success false)\n");
        s.push_str("(set-option :produce-interpolants true)\n");
        s.push_str(&format!("(set-logic {})\n", logic));
        for (name, typ) in decls {
            s.push_str(&format!("(declare-fun {} () {})\n", name, typ.smt_str()));
        }
        for dec in fun_decs {
            s.push_str(&format!("(declare-fun {} (", dec.name));
            for (idx, arg) in dec.args.iter().enumerate() {
                if idx > 0 {
                    s.push(' ');
                }
                s.push_str(arg.smt_str());
            }
            s.push_str(&format!(") {})\n", dec.typ.smt_str()));
        }
        for def in fun_defs {
            s.push_str(&format!("(define-fun {} (", def.name));
            for (idx, arg) in def.args.iter().enumerate() {
                if idx > 0 {
                    s.push(' ');
                }
                s.push_str(&format!(
                    "({} {})",
                    arg.at(0).smt_id(),
                    term::HasTyp::typ(arg).smt_str()
                ));
            }
            s.push_str(&format!(") {} {})\n", def.typ.smt_str(), def.body.get()));
        }
        for (name, term) in groups {
            s.push_str(&format!("(assert (! {} :named {}))\n", term.get(), name));
        }
        s.push_str("(check-sat)\n(get-interpolants");
        for (name, _) in groups {
            s.push(' ');
            s.push_str(name);
        }
        s.push_str(")\n(exit)\n");
        s
    }

    /// Runs the solver on a script, returns its standard output.
    fn run(&self, script: &str) -> Res<String> {
        let mut split = self.cmd.split_whitespace();
        let bin = split
            .next()
            .ok_or_else(|| format!("illegal interpolating solver command `{}`", self.cmd))?;
        let mut child = Command::new(bin)
            .args(split)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .chain_err(|| format!("while spawning `{}`", bin))?;
        match child.stdin.as_mut() {
            Some(stdin) => stdin.write_all(script.as_bytes())?,
            None => bail!("could not access the interpolating solver's stdin"),
        }
        let output = child.wait_with_output()?;
        if !output.status.success() && output.stdout.is_empty() {
            bail!(
                "interpolating solver exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim(),
            )
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Parses a `check-sat` + `get-interpolants` answer.
    fn parse_answer(
        &self,
        stdout: &str,
        group_count: usize,
        resolver: &Decls,
        terms: &Terms,
    ) -> Res<Vec<Term>> {
        let mut lines = stdout.lines();
        let verdict = loop {
            match lines.next() {
                Some(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        break line;
                    }
                }
                None => bail!("empty answer from the interpolating solver"),
            }
        };
        match verdict {
            "unsat" => (),
            "sat" => bail!(ErrorKind::Inconsistency(
                "interpolation query is satisfiable".into()
            )),
            blah => bail!("unexpected check-sat answer `{}`", blah),
        }

        let rest: String = lines.collect::<Vec<_>>().join(" ");
        let sexprs = parse_sexprs(&rest)?;
        let list = match sexprs.first() {
            Some(SExpr::List(list)) => list,
            Some(SExpr::Atom(atom)) => bail!("unexpected interpolation answer `{}`", atom),
            None => bail!("missing interpolation answer"),
        };
        if let Some(SExpr::Atom(head)) = list.first() {
            if head == "error" {
                bail!("interpolating solver error: {:?}", list.get(1))
            }
        }
        if list.len() + 1 != group_count {
            bail!(
                "expected {} interpolant(s), got {}",
                group_count - 1,
                list.len(),
            )
        }

        let env = Map::new();
        list.iter()
            .map(|sexpr| term_of_sexpr(sexpr, &env, resolver, terms))
            .collect()
    }
}

/// An s-expression.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SExpr {
    /// A symbol or literal.
    Atom(String),
    /// A parenthesized sequence.
    List(Vec<SExpr>),
}

/// Parses the top-level s-expressions of a string.
fn parse_sexprs(input: &str) -> Res<Vec<SExpr>> {
    let mut stack: Vec<Vec<SExpr>> = vec![];
    let mut top: Vec<SExpr> = vec![];
    let mut chars = input.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        match c {
            '(' => {
                stack.push(std::mem::take(&mut top));
            }
            ')' => {
                let done = SExpr::List(std::mem::take(&mut top));
                match stack.pop() {
                    Some(outer) => {
                        top = outer;
                        top.push(done)
                    }
                    None => bail!("unbalanced `)` in s-expression"),
                }
            }
            '|' => {
                // Quoted symbol, pipes stripped.
                let start = idx + 1;
                let mut end = None;
                for (jdx, c) in chars.by_ref() {
                    if c == '|' {
                        end = Some(jdx);
                        break;
                    }
                }
                match end {
                    Some(end) => top.push(SExpr::Atom(input[start..end].to_string())),
                    None => bail!("unterminated `|`-quoted symbol"),
                }
            }
            c if c.is_whitespace() => (),
            _ => {
                let start = idx;
                let mut end = input.len();
                while let Some((jdx, c)) = chars.peek() {
                    if c.is_whitespace() || *c == '(' || *c == ')' {
                        end = *jdx;
                        break;
                    }
                    chars.next();
                }
                if end == input.len() {
                    // Token runs to the end of the input.
                    top.push(SExpr::Atom(input[start..].to_string()))
                } else {
                    top.push(SExpr::Atom(input[start..end].to_string()))
                }
            }
        }
    }
    if !stack.is_empty() {
        bail!("unbalanced `(` in s-expression")
    }
    Ok(top)
}

/// Converts an s-expression into a term.
///
/// `env` holds the active `let`-bindings.
fn term_of_sexpr(
    sexpr: &SExpr,
    env: &Map<String, Term>,
    resolver: &Decls,
    terms: &Terms,
) -> Res<Term> {
    match sexpr {
        SExpr::Atom(atom) => {
            if let Some(bound) = env.get(atom) {
                return Ok(bound.clone());
            }
            if let Some(cst) = Cst::of_smt_str(atom) {
                return Ok(terms.cst(cst));
            }
            let (qual, offset) = atom
                .rsplit_once('@')
                .ok_or_else(|| format!("unexpected symbol `{}` in interpolant", atom))?;
            let offset: Int = offset
                .parse()
                .chain_err(|| format!("illegal offset in symbol `{}`", atom))?;
            let svar = resolver
                .resolve(qual)
                .ok_or_else(|| format!("unknown variable `{}` in interpolant", qual))?;
            Ok(terms.var(svar.at(offset)))
        }
        SExpr::List(list) => {
            let (head, args) = match list.split_first() {
                Some(split) => split,
                None => bail!("empty application in interpolant"),
            };
            let head = match head {
                SExpr::Atom(head) => head,
                SExpr::List(_) => bail!("higher-order application in interpolant"),
            };

            if head == "let" {
                if args.len() != 2 {
                    bail!("ill-formed `let` in interpolant")
                }
                let bindings = match &args[0] {
                    SExpr::List(bindings) => bindings,
                    SExpr::Atom(_) => bail!("ill-formed `let` bindings in interpolant"),
                };
                let mut nu_env = env.clone();
                for binding in bindings {
                    match binding {
                        SExpr::List(pair) if pair.len() == 2 => {
                            let id = match &pair[0] {
                                SExpr::Atom(id) => id.clone(),
                                SExpr::List(_) => bail!("ill-formed `let` binding"),
                            };
                            // Parallel `let`: right-hand sides see the outer
                            // environment.
                            let rhs = term_of_sexpr(&pair[1], env, resolver, terms)?;
                            nu_env.insert(id, rhs);
                        }
                        _ => bail!("ill-formed `let` binding in interpolant"),
                    }
                }
                return term_of_sexpr(&args[1], &nu_env, resolver, terms);
            }

            let op = Op::of_smt_str(head)
                .ok_or_else(|| format!("unexpected operator `{}` in interpolant", head))?;
            let args = args
                .iter()
                .map(|arg| term_of_sexpr(arg, env, resolver, terms))
                .collect::<Res<Vec<_>>>()?;
            terms
                .app(op, args)
                .chain_err(|| "while building interpolant term")
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::term::{SVar, Typ};

    fn decls() -> (Decls, Terms) {
        let terms = Terms::new();
        let mut decls = Decls::new();
        decls.register(SVar::new(vec!["sys".into()], "cnt", Typ::Int));
        decls.register(SVar::new(vec!["sys".into()], "flag", Typ::Bool));
        (decls, terms)
    }

    #[test]
    fn sexpr_parsing() {
        let sexprs = parse_sexprs("(and (<= sys.cnt@0 3) sys.flag@0)").unwrap();
        assert_eq!(sexprs.len(), 1);
        match &sexprs[0] {
            SExpr::List(list) => assert_eq!(list.len(), 3),
            SExpr::Atom(_) => panic!("expected a list"),
        }
    }

    #[test]
    fn sexpr_quoted_symbols() {
        let sexprs = parse_sexprs("(or |sys.flag@0| true)").unwrap();
        match &sexprs[0] {
            SExpr::List(list) => {
                assert_eq!(list[1], SExpr::Atom("sys.flag@0".into()));
            }
            SExpr::Atom(_) => panic!("expected a list"),
        }
    }

    #[test]
    fn interpolant_terms() {
        let (decls, terms) = decls();
        let env = Map::new();
        let sexprs = parse_sexprs("(and (<= sys.cnt@2 3) (not sys.flag@2))").unwrap();
        let term = term_of_sexpr(&sexprs[0], &env, &decls, &terms).unwrap();

        let cnt = decls.resolve("sys.cnt").unwrap();
        let flag = decls.resolve("sys.flag").unwrap();
        let expected = terms.and(vec![
            terms
                .app(Op::Le, vec![terms.svar_at(cnt, 2), terms.int(3)])
                .unwrap(),
            terms.not(terms.svar_at(flag, 2)),
        ]);
        assert_eq!(term, expected);
    }

    #[test]
    fn interpolant_let_bindings() {
        let (decls, terms) = decls();
        let env = Map::new();
        let sexprs = parse_sexprs("(let ((.x (>= sys.cnt@1 0))) (and .x (not sys.flag@1)))")
            .unwrap();
        let term = term_of_sexpr(&sexprs[0], &env, &decls, &terms).unwrap();

        let cnt = decls.resolve("sys.cnt").unwrap();
        let flag = decls.resolve("sys.flag").unwrap();
        let expected = terms.and(vec![
            terms
                .app(Op::Ge, vec![terms.svar_at(cnt, 1), terms.int(0)])
                .unwrap(),
            terms.not(terms.svar_at(flag, 1)),
        ]);
        assert_eq!(term, expected);
    }

    #[test]
    fn negative_offsets_resolve() {
        let (decls, terms) = decls();
        let env = Map::new();
        let sexprs = parse_sexprs("(= sys.cnt@-1 0)").unwrap();
        let term = term_of_sexpr(&sexprs[0], &env, &decls, &terms).unwrap();
        let cnt = decls.resolve("sys.cnt").unwrap();
        assert_eq!(
            term,
            terms.eq(terms.var(cnt.at(-1)), terms.int(0))
        );
    }
}
