//! Common imports throughout this project.

pub use std::{
    collections::{BTreeMap as Map, BTreeSet as Set},
    fmt,
    io::Write,
    ops::{Deref, DerefMut},
    path::PathBuf,
    sync::{Arc, RwLock},
};

pub use error_chain::bail;
pub use hashconsing::coll::{HConMap, HConSet};
pub use num::{bigint::Sign, BigInt as Int, BigRational as Rat, One, Signed, Zero};
pub use rsmt2::SmtRes;

pub use crate::{actlit, check, event, solver, term, trans};

/// Step index.
///
/// In the context of an unrolled transition system, this is the index of a
/// *time frame*. State variable `v` at step `7` is the SMT constant `v@7`.
pub type Unroll = usize;

error_chain::error_chain! {
    types {
        Error, ErrorKind, ResExt, Res;
    }

    links {
        Smt2(rsmt2::errors::Error, rsmt2::errors::ErrorKind)
        /// An error from the `rsmt2` crate.
        ;
    }

    foreign_links {
        Io(std::io::Error)
        /// I/O error.
        ;
    }

    errors {
        /// The solver produced an answer that contradicts an earlier one, or
        /// an internal structural requirement was violated. Fatal for the
        /// current property.
        Inconsistency(msg: String) {
            description("internal inconsistency")
            display("internal inconsistency: {}", msg)
        }
    }
}
