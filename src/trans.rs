//! Transition system structures and helpers.
//!
//! A transition system is composed of
//!
//! - an *initial* predicate over the state variables at offset `0`,
//! - a *transition* predicate relating offsets `0` (current) and `1` (next),
//! - a list of named candidate properties over offset `0`.
//!
//! Unrolling is done by *bumping*: the transition predicate between steps
//! `k-1` and `k` is the step-`0` predicate bumped by `k-1`.
//!
//! The system also tracks the status of each property. Statuses move
//! monotonically through `Unknown ⊑ KTrue(k) ⊑ KTrue(k+1) ⊑ Invariant`;
//! `Falsified` is an absorbing sibling of the upper branch. Conflicting
//! terminal statuses are an internal inconsistency.

crate::prelude!();

use check::cexs::Cex;
use term::{Assignment, HasTyp, SVar, Term, Terms, Typ};

/// Variable declarations for transition systems.
///
/// Maps fully qualified identifiers to their declaration.
#[derive(Debug, Clone, Default)]
pub struct Decls {
    /// Map from qualified identifiers to state variables.
    map: Map<String, SVar>,
}
impl Decls {
    /// Constructor.
    pub fn new() -> Self {
        Self { map: Map::new() }
    }

    /// Registers a variable.
    ///
    /// Returns the previous declaration if the qualified identifier was
    /// already registered.
    pub fn register(&mut self, svar: SVar) -> Option<SVar> {
        self.map.insert(svar.qual_id(), svar)
    }

    /// Resolves a qualified identifier.
    pub fn resolve(&self, qual_id: &str) -> Option<&SVar> {
        self.map.get(qual_id)
    }

    /// True if the variable is declared here.
    pub fn contains(&self, svar: &SVar) -> bool {
        self.map.contains_key(&svar.qual_id())
    }

    /// An iterator over all declared variables.
    pub fn all(&self) -> impl Iterator<Item = &SVar> {
        self.map.values()
    }

    /// Number of declarations.
    pub fn len(&self) -> usize {
        self.map.len()
    }
    /// True if there are no declarations.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// An uninterpreted function declaration.
#[derive(Debug, Clone)]
pub struct FunDec {
    /// Function symbol.
    pub name: String,
    /// Argument sorts.
    pub args: Vec<Typ>,
    /// Output sort.
    pub typ: Typ,
}

/// A function definition.
///
/// The body is a term over the argument variables instantiated at offset
/// `0`, so that argument occurrences print exactly like the symbols of the
/// signature.
#[derive(Debug, Clone)]
pub struct FunDef {
    /// Function symbol.
    pub name: String,
    /// Argument variables.
    pub args: Vec<SVar>,
    /// Output sort.
    pub typ: Typ,
    /// Definition body.
    pub body: Term,
}

/// Status of a property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropStatus {
    /// Nothing is known.
    Unknown,
    /// The property holds up to `k` steps from the initial states.
    KTrue(Unroll),
    /// The property holds in all reachable states.
    Invariant,
    /// The property is falsified by a concrete trace.
    Falsified(Cex),
}
impl PropStatus {
    /// True if the status is terminal (`Invariant` or `Falsified`).
    pub fn is_decided(&self) -> bool {
        matches!(self, Self::Invariant | Self::Falsified(_))
    }

    /// Monotone update.
    ///
    /// Returns true if the status actually changed. Downgrades are ignored;
    /// conflicting terminal statuses are an inconsistency error.
    pub fn update(&mut self, new: PropStatus) -> Res<bool> {
        use PropStatus::*;
        let changed = match (&*self, &new) {
            (Unknown, Unknown) => false,
            (Unknown, _) => true,

            (KTrue(old), KTrue(nu)) => nu > old,
            (KTrue(_), Invariant) | (KTrue(_), Falsified(_)) => true,
            (KTrue(_), Unknown) => false,

            (Invariant, Falsified(_)) | (Falsified(_), Invariant) => {
                bail!(ErrorKind::Inconsistency(
                    "property reported both invariant and falsified".into()
                ))
            }
            (Invariant, _) | (Falsified(_), _) => false,
        };
        if changed {
            *self = new
        }
        Ok(changed)
    }
}
impl fmt::Display for PropStatus {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Unknown => write!(fmt, "unknown"),
            Self::KTrue(k) => write!(fmt, "true up to {} step(s)", k),
            Self::Invariant => write!(fmt, "invariant"),
            Self::Falsified(cex) => write!(fmt, "falsified by a trace of length {}", cex.len()),
        }
    }
}

/// A named candidate property.
#[derive(Debug, Clone)]
pub struct Prop {
    /// Name of the property.
    name: String,
    /// Predicate over the state variables at offset `0`.
    term: Term,
    /// Current status.
    status: PropStatus,
}
impl Prop {
    /// Name accessor.
    pub fn name(&self) -> &String {
        &self.name
    }
    /// Predicate accessor.
    pub fn term(&self) -> &Term {
        &self.term
    }
    /// Status accessor.
    pub fn status(&self) -> &PropStatus {
        &self.status
    }
}

/// A transition system with an initial predicate and a transition relation.
#[derive(Debug, Clone)]
pub struct Sys {
    /// Name of the system.
    name: String,
    /// SMT-LIB logic the system lives in.
    logic: String,
    /// Variable declarations.
    decls: Decls,
    /// Uninterpreted function declarations.
    fun_decs: Vec<FunDec>,
    /// Function definitions.
    fun_defs: Vec<FunDef>,
    /// Initial predicate, over offset `0`.
    init: Term,
    /// Transition predicate, over offsets `0` and `1`.
    trans: Term,
    /// Candidate properties.
    props: Map<String, Prop>,
}
impl Sys {
    /// Constructor.
    ///
    /// # Errors
    ///
    /// - when a predicate mentions an undeclared variable;
    /// - when the initial predicate or a property mentions an offset other
    ///   than `0`, or the transition predicate an offset other than `0`/`1`;
    /// - when a predicate is not boolean;
    /// - when two properties have the same name.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        logic: impl Into<String>,
        decls: Decls,
        fun_decs: Vec<FunDec>,
        fun_defs: Vec<FunDef>,
        init: Term,
        trans: Term,
        props: Vec<(String, Term)>,
        terms: &Terms,
    ) -> Res<Self> {
        let name = name.into();
        check_pred(terms, &decls, &init, 0, 0).chain_err(|| "in initial predicate")?;
        check_pred(terms, &decls, &trans, 0, 1).chain_err(|| "in transition predicate")?;

        let mut prop_map = Map::new();
        for (prop_name, term) in props {
            check_pred(terms, &decls, &term, 0, 0)
                .chain_err(|| format!("in property `{}`", prop_name))?;
            let prev = prop_map.insert(
                prop_name.clone(),
                Prop {
                    name: prop_name.clone(),
                    term,
                    status: PropStatus::Unknown,
                },
            );
            if prev.is_some() {
                bail!("two properties named `{}`", prop_name)
            }
        }

        Ok(Self {
            name,
            logic: logic.into(),
            decls,
            fun_decs,
            fun_defs,
            init,
            trans,
            props: prop_map,
        })
    }

    /// Name accessor.
    pub fn name(&self) -> &str {
        &self.name
    }
    /// SMT-LIB logic of the system.
    pub fn logic(&self) -> &str {
        &self.logic
    }
    /// Variable declaration accessor.
    pub fn decls(&self) -> &Decls {
        &self.decls
    }
    /// Uninterpreted function declarations.
    pub fn fun_decs(&self) -> &[FunDec] {
        &self.fun_decs
    }
    /// Function definitions.
    pub fn fun_defs(&self) -> &[FunDef] {
        &self.fun_defs
    }
    /// Initial predicate, over offset `0`.
    pub fn init(&self) -> &Term {
        &self.init
    }
    /// Transition predicate, over offsets `0` and `1`.
    pub fn trans(&self) -> &Term {
        &self.trans
    }

    /// Transition predicate between steps `k-1` and `k`.
    ///
    /// # Panics
    ///
    /// - when `k` is `0`.
    pub fn trans_of_bound(&self, terms: &Terms, k: Unroll) -> Term {
        assert!(k > 0, "no transition leads to step 0");
        terms.bump(&self.trans, k - 1)
    }

    /// Property accessor.
    pub fn props(&self) -> &Map<String, Prop> {
        &self.props
    }

    /// Status of a property.
    pub fn prop_status(&self, name: &str) -> Option<&PropStatus> {
        self.props.get(name).map(Prop::status)
    }

    /// The `(name, term)` pairs of all properties not yet decided.
    pub fn props_unresolved(&self) -> Vec<(String, Term)> {
        self.props
            .values()
            .filter(|prop| !prop.status.is_decided())
            .map(|prop| (prop.name.clone(), prop.term.clone()))
            .collect()
    }

    /// Applies a status update to a property.
    ///
    /// Returns true if the status actually changed.
    ///
    /// # Errors
    ///
    /// - when the property is unknown;
    /// - on conflicting terminal statuses.
    pub fn apply_status(&mut self, name: &str, status: PropStatus) -> Res<bool> {
        match self.props.get_mut(name) {
            Some(prop) => prop.status.update(status),
            None => bail!("status update for unknown property `{}`", name),
        }
    }

    /// Materializes the concrete trace of a model over steps `0..=k`.
    ///
    /// Only declared state variables are kept: solver-level helpers
    /// (activation literals, abstraction booleans, clones) are skipped.
    pub fn path_from_model(&self, model: &Assignment, k: Unroll) -> Cex {
        let mut cex = Cex::new();
        for (sym, cst) in model.iter() {
            let (qual, offset) = match sym.rsplit_once('@') {
                Some(split) => split,
                None => continue,
            };
            let offset = match offset.parse::<Unroll>() {
                Ok(offset) if offset <= k => offset,
                _ => continue,
            };
            if let Some(svar) = self.decls.resolve(qual) {
                cex.insert(offset, svar.clone(), cst.clone())
            }
        }
        cex
    }

    /// Pretty, multi-line string representation of the system.
    pub fn to_ml_string(&self) -> String {
        let mut s = format!("sys {} {{\n", self.name);
        for svar in self.decls.all() {
            s.push_str(&format!("    {}: {},\n", svar, svar.typ()));
        }
        s.push_str("}\ninit:\n    ");
        s.push_str(&self.init.get().to_string());
        s.push_str("\ntrans:\n    ");
        s.push_str(&self.trans.get().to_string());
        s.push_str("\nprops:");
        for prop in self.props.values() {
            s.push_str(&format!("\n    \"{}\": {}", prop.name, prop.term.get()))
        }
        s
    }
}

/// Checks that a predicate is boolean, mentions only declared variables,
/// and stays within an offset range.
fn check_pred(terms: &Terms, decls: &Decls, pred: &Term, lo: Unroll, hi: Unroll) -> Res<()> {
    if pred.typ() != Typ::Bool {
        bail!("expected a boolean predicate, got type `{}`", pred.typ())
    }
    let (lo, hi): (Int, Int) = (lo.into(), hi.into());
    for var in terms.vars(pred) {
        if !decls.contains(var.svar()) {
            bail!("predicate mentions undeclared variable `{}`", var.svar())
        }
        if var.offset() < &lo || var.offset() > &hi {
            bail!(
                "predicate mentions `{}` at offset {}, legal offsets are [{}, {}]",
                var.svar(),
                var.offset(),
                lo,
                hi,
            )
        }
    }
    Ok(())
}
