//! Property-checking engines and their shared plumbing.
//!
//! Two engines live here:
//!
//! - [`kind`], the k-induction step engine, which handles all properties of
//!   a system as a batch;
//! - [`ic3ia`], IC3 with implicit predicate abstraction, which handles one
//!   property at a time.
//!
//! Both consume events ([`crate::event`]) and publish property statuses;
//! neither owns a process exit code.

crate::prelude!();

use actlit::{Actlit, Actlits};
use solver::Solver;
use term::Term;

pub mod cexs;
pub mod compress;
pub mod ic3ia;
pub mod kind;

#[cfg(test)]
mod test;

pub use cexs::Cex;

/// Index of the first `true` entry of a slice, `None` if all are false.
pub fn first_true(flags: &[bool]) -> Option<usize> {
    flags.iter().position(|flag| *flag)
}

/// A property as tracked by an engine.
#[derive(Debug, Clone)]
pub struct PropHandle {
    /// Property name.
    pub name: String,
    /// Predicate over offset `0`.
    pub term: Term,
    /// Canonical activation literal guarding the property's assertions.
    pub actlit: Actlit,
}
impl PropHandle {
    /// Creates handles for a batch of properties.
    ///
    /// Canonical actlits are declared on the solver when first handed out.
    pub fn of_props(
        props: Vec<(String, Term)>,
        actlits: &mut Actlits,
        solver: &mut Solver,
    ) -> Res<Vec<PropHandle>> {
        let mut handles = Vec::with_capacity(props.len());
        for (name, term) in props {
            let (actlit, is_new) = actlits.canonical(&term);
            if is_new {
                solver.declare_actlit(&actlit)?
            }
            handles.push(PropHandle { name, term, actlit })
        }
        Ok(handles)
    }
}
