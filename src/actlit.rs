//! Activation literals.
//!
//! An activation literal (*actlit*) is a nullary boolean symbol guarding an
//! assertion: instead of asserting `φ`, the engines assert `actlit ⇒ φ` and
//! pass `actlit` as an assumption to `check-sat-assuming`. Dropping the
//! assumption disables the assertion without retracting anything, so the
//! solver never needs `pop` for backtracking.
//!
//! Two flavors exist:
//!
//! - *canonical* actlits, one per term, named after the term's hash-consing
//!   tag so they are reproducible and declared at most once;
//! - *fresh* actlits, numbered by a per-registry counter, for one-shot
//!   queries whose guards are simply never assumed again.

crate::prelude!();

use rsmt2::print::{Expr2Smt, Sym2Smt};

use term::Term;

/// A nullary boolean symbol used to guard assertions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Actlit {
    /// Symbol name.
    id: String,
}
impl Actlit {
    /// Symbol name accessor.
    pub fn name(&self) -> &String {
        &self.id
    }
}
impl Sym2Smt<()> for Actlit {
    fn sym_to_smt2<W: Write>(&self, w: &mut W, _: ()) -> SmtRes<()> {
        write!(w, "{}", self.id)?;
        Ok(())
    }
}
impl Expr2Smt<()> for Actlit {
    fn expr_to_smt2<W: Write>(&self, w: &mut W, _: ()) -> SmtRes<()> {
        write!(w, "{}", self.id)?;
        Ok(())
    }
}
impl fmt::Display for Actlit {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.id)
    }
}

/// Activation literal registry.
///
/// Owns the fresh-literal counter and remembers which canonical literals
/// have been handed out, so callers know whether a declaration is needed.
/// One registry per engine; literals live for the engine's solver lifetime.
#[derive(Debug, Clone, Default)]
pub struct Actlits {
    /// Next fresh-literal index.
    count: usize,
    /// Tags of the terms whose canonical literal was already created.
    canonical: Set<u64>,
}
impl Actlits {
    /// Constructor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical actlit of a term.
    ///
    /// The name is derived from the term's tag, so the same term always
    /// yields the same literal. The flag is true iff the literal was never
    /// handed out before, *i.e.* the caller must declare it.
    pub fn canonical(&mut self, term: &Term) -> (Actlit, bool) {
        let is_new = self.canonical.insert(term.uid());
        (
            Actlit {
                id: format!("actlit_{}", term.uid()),
            },
            is_new,
        )
    }

    /// A fresh actlit, unique for this registry.
    ///
    /// The caller must declare it.
    pub fn fresh(&mut self) -> Actlit {
        let id = format!("fresh_actlit_{}", self.count);
        self.count += 1;
        Actlit { id }
    }

    /// Number of fresh literals created so far.
    pub fn fresh_count(&self) -> usize {
        self.count
    }
}

/// An implication `actlit ⇒ term`, the only shape of guarded assertion.
pub struct Gated<'a> {
    /// Guarding literal.
    pub actlit: &'a Actlit,
    /// Guarded term.
    pub term: &'a Term,
}
impl<'a> Expr2Smt<()> for Gated<'a> {
    fn expr_to_smt2<W: Write>(&self, w: &mut W, _: ()) -> SmtRes<()> {
        write!(w, "(=> {} {})", self.actlit, self.term.get())?;
        Ok(())
    }
}
