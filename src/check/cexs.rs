//! Counterexample extraction.

crate::prelude!();

use term::{Cst, HasTyp, SVar, Term};

/// A conjunction of literals over abstraction booleans.
pub type Cube = Vec<Term>;

/// A concrete counterexample trace.
///
/// Values for each state variable, organized by steps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cex {
    /// Trace of values, organized by steps.
    pub trace: Map<Unroll, Map<SVar, Cst>>,
}
impl Cex {
    /// Constructor.
    pub fn new() -> Self {
        Self { trace: Map::new() }
    }

    /// Inserts a value for a variable at some step.
    pub fn insert(&mut self, step: Unroll, svar: SVar, cst: Cst) {
        self.trace.entry(step).or_default().insert(svar, cst);
    }

    /// Number of steps in the trace.
    pub fn len(&self) -> Unroll {
        self.trace
            .keys()
            .next_back()
            .map(|step| step + 1)
            .unwrap_or(0)
    }
    /// True if the trace is empty.
    pub fn is_empty(&self) -> bool {
        self.trace.is_empty()
    }

    /// Pretty, multi-line string representation.
    pub fn to_ml_string(&self) -> String {
        let mut s = String::new();
        for (step, values) in &self.trace {
            s.push_str(&format!("step {}:\n", step));
            for (svar, cst) in values {
                s.push_str(&format!("    {}: {} = {}\n", svar, svar.typ(), cst))
            }
        }
        s
    }
}
impl fmt::Display for Cex {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.to_ml_string())
    }
}
