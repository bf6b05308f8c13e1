//! Incremental SMT solver facade.
//!
//! Wraps an [`rsmt2::Solver`] with the operations the engines need:
//! declarations and definitions, plain/gated/named assertions, scoped
//! `push`/`pop`, `check-sat-assuming` with `(if_sat, if_unsat)` handlers,
//! a variant additionally producing valuations for caller-supplied terms,
//! `get-model`, and sequence interpolation.
//!
//! Term valuations are extracted by reading the full model back and
//! evaluating the requested terms against it ([`term::Terms::eval`]), so the
//! facade only relies on the solver's `get-model`.
//!
//! Interpolation does not go through the incremental session: the facade
//! records every declaration, definition and named assertion, and
//! [`Solver::get_interpolants`] replays them into a dedicated
//! interpolating-solver process (see [`itp`]).

crate::prelude!();

use rsmt2::{
    parse::{IdentParser, ModelParser},
    print::Expr2Smt,
    SmtConf, Solver as SmtSolver,
};

use actlit::{Actlit, Gated};
use term::{Assignment, Cst, HasTyp, SVar, SmtTerm, Term, Terms, Typ};
use trans::{FunDec, FunDef, Sys};

pub mod itp;

/// SMT-LIB parser for the facade: identifiers are kept whole, values are
/// parsed as constants.
#[derive(Debug, Clone, Copy)]
pub struct Smt;

impl<'a> IdentParser<String, Typ, &'a str> for Smt {
    fn parse_ident(self, input: &'a str) -> SmtRes<String> {
        Ok(input.trim().to_string())
    }
    fn parse_type(self, input: &'a str) -> SmtRes<Typ> {
        match Typ::of_smt_str(input.trim()) {
            Some(typ) => Ok(typ),
            None => bail!("unexpected type string `{}`", input),
        }
    }
}
impl<'a> ModelParser<String, Typ, Cst, &'a str> for Smt {
    fn parse_value(
        self,
        input: &'a str,
        _: &String,
        _: &[(String, Typ)],
        _: &Typ,
    ) -> SmtRes<Cst> {
        match Cst::of_smt_str(input) {
            Some(cst) => Ok(cst),
            None => bail!("unexpected value string `{}`", input),
        }
    }
}

/// Solver configuration.
#[derive(Debug, Clone)]
pub struct Conf {
    /// Solver command, whitespace-separated binary and options.
    pub cmd: String,
    /// File to tee the SMT-LIB 2 trace to.
    pub tee: Option<PathBuf>,
    /// Command of the interpolating solver, if any.
    pub interpolator: Option<String>,
}
impl Conf {
    /// Configuration running a solver command.
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            tee: None,
            interpolator: None,
        }
    }
    /// Tees the SMT-LIB trace to a file.
    pub fn with_tee(mut self, path: impl Into<PathBuf>) -> Self {
        self.tee = Some(path.into());
        self
    }
    /// Sets the interpolating solver command.
    pub fn with_interpolator(mut self, cmd: impl Into<String>) -> Self {
        self.interpolator = Some(cmd.into());
        self
    }
}

/// A named assertion `(! <term> :named <name>)`.
struct Named<'a> {
    /// Assertion name.
    name: &'a str,
    /// Asserted term.
    term: &'a Term,
}
impl<'a> Expr2Smt<()> for Named<'a> {
    fn expr_to_smt2<W: Write>(&self, w: &mut W, _: ()) -> SmtRes<()> {
        write!(w, "(! {} :named {})", self.term.get(), self.name)?;
        Ok(())
    }
}

/// The solver facade.
pub struct Solver {
    /// Underlying incremental solver.
    inner: SmtSolver<Smt>,
    /// Term factory, used to evaluate terms against models.
    terms: Terms,
    /// Constants declared so far, replayed for interpolation queries.
    decls: Vec<(String, Typ)>,
    /// Function declarations, replayed for interpolation queries.
    fun_decs: Vec<FunDec>,
    /// Function definitions, replayed for interpolation queries.
    fun_defs: Vec<FunDef>,
    /// Named assertions, one scope per active `push`.
    named: Vec<Vec<(String, Term)>>,
    /// Interpolating solver, if configured.
    itp: Option<itp::Interpolator>,
    /// SMT-LIB logic, captured from the system at declaration time.
    logic: Option<String>,
    /// True once the system's functions have been declared/defined.
    defs_done: bool,
}

impl Solver {
    /// Spawns a solver.
    pub fn new(conf: Conf, terms: Terms) -> Res<Self> {
        let mut split = conf.cmd.split(|c: char| c.is_whitespace());
        let bin = split
            .next()
            .ok_or_else(|| format!("illegal solver command `{}`", conf.cmd))?
            .trim();
        let mut smt_conf = SmtConf::z3(bin);
        for opt in split {
            let opt = opt.trim();
            if !opt.is_empty() {
                smt_conf.option(opt);
            }
        }
        smt_conf.check_success();

        let mut inner = smt_conf
            .spawn(Smt)
            .chain_err(|| "while spawning the SMT solver")?;
        if let Some(path) = conf.tee {
            inner.path_tee(path)?
        }
        inner.set_option(":produce-models", "true")?;

        Ok(Self {
            inner,
            terms,
            decls: vec![],
            fun_decs: vec![],
            fun_defs: vec![],
            named: vec![vec![]],
            itp: conf.interpolator.map(itp::Interpolator::new),
            logic: None,
            defs_done: false,
        })
    }

    /// Leaves a comment in the SMT-LIB trace.
    pub fn comment(&mut self, blah: &str) -> Res<()> {
        self.inner.comment(blah)?;
        Ok(())
    }

    /// Opens a scope.
    pub fn push(&mut self) -> Res<()> {
        self.inner.push(1)?;
        self.named.push(vec![]);
        Ok(())
    }
    /// Closes the innermost scope, discarding its named assertions.
    pub fn pop(&mut self) -> Res<()> {
        self.inner.pop(1)?;
        if self.named.len() > 1 {
            self.named.pop();
        }
        Ok(())
    }

    /// Declares a constant.
    pub fn declare_const(&mut self, name: &str, typ: Typ) -> Res<()> {
        self.inner
            .declare_const(name, typ)
            .chain_err(|| format!("while declaring constant `{}`", name))?;
        self.decls.push((name.to_string(), typ));
        Ok(())
    }

    /// Declares an activation literal.
    ///
    /// Actlits are not recorded for interpolation replay: they never occur
    /// in named assertions.
    pub fn declare_actlit(&mut self, actlit: &Actlit) -> Res<()> {
        self.inner
            .declare_const(actlit.name(), Typ::Bool)
            .chain_err(|| format!("while declaring activation literal `{}`", actlit))?;
        Ok(())
    }

    /// Declares a state variable instance at some offset.
    pub fn declare_svar_at(&mut self, svar: &SVar, offset: Unroll) -> Res<()> {
        let name = svar.at(offset).smt_id();
        self.inner
            .declare_const(&name, svar.typ())
            .chain_err(|| format!("while declaring variable `{}`", name))?;
        self.decls.push((name, svar.typ()));
        Ok(())
    }

    /// Declares an uninterpreted function.
    pub fn declare_fun(&mut self, dec: &FunDec) -> Res<()> {
        self.inner
            .declare_fun(&dec.name, &dec.args, dec.typ)
            .chain_err(|| format!("while declaring function `{}`", dec.name))?;
        Ok(())
    }

    /// Defines a function.
    pub fn define_fun(&mut self, def: &FunDef) -> Res<()> {
        let args: Vec<_> = def
            .args
            .iter()
            .map(|svar| (svar.at(0), svar.typ()))
            .collect();
        self.inner
            .define_fun(&def.name, &args, def.typ, &SmtTerm(&def.body))
            .chain_err(|| format!("while defining function `{}`", def.name))?;
        Ok(())
    }

    /// Declares/defines every symbol a system needs for offsets in
    /// `[lo, hi]`.
    ///
    /// Function declarations and definitions are installed on the first
    /// call only; variable instances are declared for each offset of the
    /// range on every call.
    pub fn define_and_declare_of_bounds(&mut self, sys: &Sys, lo: Unroll, hi: Unroll) -> Res<()> {
        if !self.defs_done {
            self.logic = Some(sys.logic().to_string());
            for dec in sys.fun_decs() {
                self.declare_fun(dec)?
            }
            for def in sys.fun_defs() {
                self.define_fun(def)?;
                self.fun_defs.push(def.clone());
            }
            self.fun_decs.extend(sys.fun_decs().iter().cloned());
            self.defs_done = true;
        }
        for offset in lo..=hi {
            for svar in sys.decls().all() {
                self.declare_svar_at(svar, offset)?
            }
        }
        Ok(())
    }

    /// Asserts a term, unguarded.
    ///
    /// Reserved for invariants and scoped (`push`/`pop`) assertions;
    /// property-related assertions go through [`Self::assert_gated`].
    pub fn assert(&mut self, term: &Term) -> Res<()> {
        self.inner.assert(&SmtTerm(term))?;
        Ok(())
    }

    /// Asserts `actlit ⇒ term`.
    pub fn assert_gated(&mut self, actlit: &Actlit, term: &Term) -> Res<()> {
        self.inner.assert(&Gated { actlit, term })?;
        Ok(())
    }

    /// Asserts a named term and records it for interpolation.
    pub fn assert_named(&mut self, name: &str, term: &Term) -> Res<()> {
        self.inner.assert(&Named { name, term })?;
        match self.named.last_mut() {
            Some(scope) => scope.push((name.to_string(), term.clone())),
            None => bail!("corrupt named-assertion scope stack"),
        }
        Ok(())
    }

    /// Check-sat with assumptions.
    pub fn check_sat_assuming(&mut self, actlits: &[Actlit]) -> Res<bool> {
        let res = self
            .inner
            .check_sat_assuming(actlits.iter().map(Actlit::name))?;
        Ok(res)
    }

    /// Check-sat with assumptions and result handlers.
    ///
    /// The relevant handler runs right after the check, before any other
    /// query disturbs the solver state.
    pub fn check_sat_assuming_then<T>(
        &mut self,
        actlits: &[Actlit],
        if_sat: impl FnOnce(&mut Self) -> Res<T>,
        if_unsat: impl FnOnce(&mut Self) -> Res<T>,
    ) -> Res<T> {
        if self.check_sat_assuming(actlits)? {
            if_sat(self)
        } else {
            if_unsat(self)
        }
    }

    /// Check-sat with assumptions; on sat, hands the valuations of
    /// `terms_to_eval` to the sat handler.
    pub fn check_sat_assuming_and_get_term_values<T>(
        &mut self,
        actlits: &[Actlit],
        terms_to_eval: &[Term],
        if_sat: impl FnOnce(&mut Self, &[(Term, Cst)]) -> Res<T>,
        if_unsat: impl FnOnce(&mut Self) -> Res<T>,
    ) -> Res<T> {
        if self.check_sat_assuming(actlits)? {
            let model = self.assignment()?;
            let factory = self.terms.clone();
            let mut values = Vec::with_capacity(terms_to_eval.len());
            for term in terms_to_eval {
                let cst = factory
                    .eval(term, &model)
                    .chain_err(|| "while evaluating a term against the model")?;
                values.push((term.clone(), cst));
            }
            if_sat(self, &values)
        } else {
            if_unsat(self)
        }
    }

    /// Retrieves the current model as an [`Assignment`].
    ///
    /// The solver must have answered `sat` to the previous check.
    pub fn assignment(&mut self) -> Res<Assignment> {
        let model = self
            .inner
            .get_model()
            .chain_err(|| "while retrieving model")?;
        let mut assignment = Assignment::new();
        for (sym, args, _typ, cst) in model {
            if args.is_empty() {
                assignment.insert(sym, cst);
            }
        }
        Ok(assignment)
    }

    /// Sequence interpolants for the named assertions `names`.
    ///
    /// Replays the recorded declarations, definitions and the named
    /// assertions into the interpolating solver; `resolver` maps the
    /// variables of the answer back to their declarations. For `n` names
    /// this produces `n - 1` interpolants.
    ///
    /// # Errors
    ///
    /// - when no interpolating solver is configured;
    /// - when a name does not correspond to a live named assertion;
    /// - [`ErrorKind::Inconsistency`] when the interpolating solver finds
    ///   the conjunction of the groups satisfiable.
    pub fn get_interpolants(
        &mut self,
        names: &[String],
        resolver: &trans::Decls,
    ) -> Res<Vec<Term>> {
        let itp = match &self.itp {
            Some(itp) => itp.clone(),
            None => bail!("no interpolating solver configured"),
        };
        let mut groups = Vec::with_capacity(names.len());
        for name in names {
            let term = self
                .named
                .iter()
                .flat_map(|scope| scope.iter())
                .find(|(n, _)| n == name)
                .map(|(_, term)| term.clone())
                .ok_or_else(|| format!("no named assertion `{}`", name))?;
            groups.push((name.clone(), term));
        }
        let logic = self.logic.as_deref().unwrap_or("ALL");
        itp.interpolants(
            logic,
            &self.decls,
            &self.fun_decs,
            &self.fun_defs,
            &groups,
            resolver,
            &self.terms,
        )
    }

    /// Kills the underlying solver process.
    pub fn kill(&mut self) -> Res<()> {
        self.inner.kill()?;
        Ok(())
    }
}
