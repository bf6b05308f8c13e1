//! Path compression.
//!
//! The k-induction step check considers paths of length `k` that need not
//! start in an initial state. Lasso-shaped paths revisiting a state are
//! spurious for step checks: any violation they exhibit is also exhibited
//! by a shorter path. When a step model contains two identical states, the
//! oracle produces a constraint forcing those two steps apart; asserting it
//! tightens the search without touching the assumption set.
//!
//! A state is a valuation of the non-input, non-constant state variables.
//! Constraints are produced lazily, driven by the states the model actually
//! repeats, and each pair of steps is constrained at most once per oracle.

crate::prelude!();

use term::{Assignment, SVar, Term, Terms};
use trans::Decls;

/// Path-compression oracle.
#[derive(Debug, Clone)]
pub struct Compressor {
    /// Variables defining a state.
    svars: Vec<SVar>,
    /// Step pairs already constrained.
    seen: Set<(Unroll, Unroll)>,
}
impl Compressor {
    /// Constructor over the state-defining variables of a system.
    pub fn new(decls: &Decls) -> Self {
        let svars = decls
            .all()
            .filter(|svar| !svar.is_input() && !svar.is_const())
            .cloned()
            .collect();
        Self {
            svars,
            seen: Set::new(),
        }
    }

    /// Constraints ruling out the state repetitions of a model.
    ///
    /// Inspects steps `0..=k` of `model` and returns one distinctness
    /// constraint per newly-discovered pair of identical states. An empty
    /// result means no compression applies: either the path is loop-free or
    /// every repetition is already constrained.
    pub fn constraints(&mut self, terms: &Terms, model: &Assignment, k: Unroll) -> Vec<Term> {
        let mut res = vec![];
        for lft in 0..=k {
            for rgt in (lft + 1)..=k {
                if self.seen.contains(&(lft, rgt)) {
                    continue;
                }
                if self.same_state(model, lft, rgt) {
                    self.seen.insert((lft, rgt));
                    res.push(self.distinct(terms, lft, rgt))
                }
            }
        }
        res
    }

    /// True if the model assigns the same values to both steps.
    fn same_state(&self, model: &Assignment, lft: Unroll, rgt: Unroll) -> bool {
        !self.svars.is_empty()
            && self.svars.iter().all(|svar| {
                let lft = model.of_var(&svar.at(lft));
                lft.is_some() && lft == model.of_var(&svar.at(rgt))
            })
    }

    /// The constraint forcing two steps to differ.
    fn distinct(&self, terms: &Terms, lft: Unroll, rgt: Unroll) -> Term {
        let eqs = self
            .svars
            .iter()
            .map(|svar| terms.eq(terms.svar_at(svar, lft), terms.svar_at(svar, rgt)))
            .collect();
        terms.not(terms.and(eqs))
    }
}
