//! Tests over the engines' shared plumbing.

use super::*;
use crate::check::{compress::Compressor, ic3ia::AbvarMap};
use crate::event::{update_trans_sys, Link, Msg};
use crate::term::{Assignment, Cst, HasTyp, Op, SVar, Terms, Typ};
use crate::trans::{Decls, PropStatus, Sys};

/// A stopwatch-style counter system with a single property.
fn counter_sys(terms: &Terms) -> Sys {
    let cnt = SVar::new(vec!["top".into()], "cnt", Typ::Int);
    let stop = SVar::new_input(vec!["top".into()], "stop", Typ::Bool);
    let mut decls = Decls::new();
    decls.register(cnt.clone());
    decls.register(stop.clone());

    let init = terms.eq(terms.svar_at(&cnt, 0), terms.int(0));
    let trans = terms.eq(
        terms.svar_at(&cnt, 1),
        terms
            .app(
                Op::Ite,
                vec![
                    terms.svar_at(&stop, 0),
                    terms.svar_at(&cnt, 0),
                    terms
                        .app(Op::Add, vec![terms.svar_at(&cnt, 0), terms.int(1)])
                        .unwrap(),
                ],
            )
            .unwrap(),
    );
    let prop = terms
        .app(Op::Ge, vec![terms.svar_at(&cnt, 0), terms.int(0)])
        .unwrap();

    Sys::new(
        "top",
        "QF_LIA",
        decls,
        vec![],
        vec![],
        init,
        trans,
        vec![("cnt is positive".to_string(), prop)],
        terms,
    )
    .unwrap()
}

#[test]
fn first_true_boundaries() {
    assert_eq!(first_true(&[]), None);
    assert_eq!(first_true(&[false, false, false]), None);
    assert_eq!(first_true(&[true]), Some(0));
    assert_eq!(first_true(&[false, true, true]), Some(1));
}

#[test]
fn status_lattice_is_monotone() {
    let mut status = PropStatus::Unknown;
    assert!(status.update(PropStatus::KTrue(2)).unwrap());
    assert!(!status.update(PropStatus::KTrue(1)).unwrap());
    assert!(status.update(PropStatus::KTrue(3)).unwrap());
    assert!(status.update(PropStatus::Invariant).unwrap());
    assert!(!status.update(PropStatus::KTrue(17)).unwrap());
    assert_eq!(status, PropStatus::Invariant);
}

#[test]
fn status_conflicts_are_inconsistencies() {
    let mut status = PropStatus::Invariant;
    assert!(status.update(PropStatus::Falsified(Cex::new())).is_err());

    let mut status = PropStatus::Falsified(Cex::new());
    assert!(status.update(PropStatus::Invariant).is_err());
}

#[test]
fn canonical_actlits_are_reproducible() {
    let terms = Terms::new();
    let flag = terms.svar_at(&SVar::new(vec!["top".into()], "flag", Typ::Bool), 0);
    let mut actlits = Actlits::new();

    let (lft, is_new) = actlits.canonical(&flag);
    assert!(is_new);
    assert_eq!(lft.name(), &format!("actlit_{}", flag.uid()));

    let (rgt, is_new) = actlits.canonical(&flag);
    assert!(!is_new);
    assert_eq!(lft, rgt);
}

#[test]
fn fresh_actlits_are_numbered() {
    let mut actlits = Actlits::new();
    assert_eq!(actlits.fresh().name(), "fresh_actlit_0");
    assert_eq!(actlits.fresh().name(), "fresh_actlit_1");
    assert_eq!(actlits.fresh_count(), 2);
}

#[test]
fn event_updates_partition_statuses() {
    let terms = Terms::new();
    let mut sys = counter_sys(&terms);
    let inv = terms
        .app(
            Op::Ge,
            vec![
                terms.svar_at(&SVar::new(vec!["top".into()], "cnt", Typ::Int), 0),
                terms.int(0),
            ],
        )
        .unwrap();

    let diff = update_trans_sys(
        &mut sys,
        vec![
            Msg::Invariants(vec![inv.clone()]),
            Msg::Status {
                prop: "cnt is positive".into(),
                status: PropStatus::KTrue(2),
            },
        ],
    )
    .unwrap();
    assert_eq!(diff.invariants, vec![inv]);
    assert!(diff.valids.is_empty());
    assert!(diff.falsifieds.is_empty());
    assert_eq!(
        sys.prop_status("cnt is positive"),
        Some(&PropStatus::KTrue(2))
    );

    let diff = update_trans_sys(
        &mut sys,
        vec![Msg::Status {
            prop: "cnt is positive".into(),
            status: PropStatus::Invariant,
        }],
    )
    .unwrap();
    assert_eq!(diff.valids, vec!["cnt is positive".to_string()]);

    // Replaying the same transition is a no-op.
    let diff = update_trans_sys(
        &mut sys,
        vec![Msg::Status {
            prop: "cnt is positive".into(),
            status: PropStatus::Invariant,
        }],
    )
    .unwrap();
    assert!(diff.valids.is_empty());
}

#[test]
fn links_are_non_blocking() {
    let (lft, rgt) = Link::pair();
    assert!(lft.recv().is_empty());

    lft.send(Msg::Invariants(vec![])).unwrap();
    let received = rgt.recv();
    assert_eq!(received.len(), 1);
    assert!(rgt.recv().is_empty());
}

#[test]
fn abvar_map_bijection_and_idempotence() {
    let terms = Terms::new();
    let sys = counter_sys(&terms);
    let preds = vec![sys.init().clone(), sys.props()["cnt is positive"].term().clone()];

    let mut abv = AbvarMap::new();
    let fresh = abv.update(&terms, &preds).unwrap();
    assert_eq!(fresh.len(), 2);
    assert_eq!(abv.len(), 2);
    for svar in &fresh {
        assert_eq!(svar.typ(), Typ::Bool);
        assert_eq!(svar.scope().last().map(String::as_str), Some("abv"));
    }

    // Same predicates: nothing new.
    let again = abv.update(&terms, &preds).unwrap();
    assert!(again.is_empty());
    assert_eq!(abv.len(), 2);

    // Abstraction and concretization are inverse on tracked predicates.
    let abs_init = abv.abstract_term(&terms, sys.init());
    assert_ne!(&abs_init, sys.init());
    assert_eq!(&abv.concretize(&terms, &abs_init), sys.init());

    let compound = terms.and(vec![sys.init().clone(), sys.init().clone()]);
    let abs_compound = abv.abstract_term(&terms, &compound);
    assert_eq!(abv.concretize(&terms, &abs_compound), compound);

    assert_eq!(abv.couplings(&terms).len(), 2);
}

#[test]
fn compression_constrains_repeated_states() {
    let terms = Terms::new();
    let sys = counter_sys(&terms);
    let mut compressor = Compressor::new(sys.decls());

    let mut model = Assignment::new();
    model.insert("top.cnt@0", Cst::int(5usize));
    model.insert("top.cnt@1", Cst::int(5usize));
    model.insert("top.cnt@2", Cst::int(6usize));

    let constraints = compressor.constraints(&terms, &model, 2);
    assert_eq!(constraints.len(), 1);
    assert_eq!(
        constraints[0].get().to_string(),
        "(not (= top.cnt@0 top.cnt@1))"
    );

    // The same pair is never constrained twice.
    let constraints = compressor.constraints(&terms, &model, 2);
    assert!(constraints.is_empty());

    // Distinct states produce nothing.
    let mut model = Assignment::new();
    model.insert("top.cnt@0", Cst::int(1usize));
    model.insert("top.cnt@1", Cst::int(2usize));
    let constraints = compressor.constraints(&terms, &model, 1);
    assert!(constraints.is_empty());
}

#[test]
fn traces_from_models_keep_system_variables_only() {
    let terms = Terms::new();
    let sys = counter_sys(&terms);

    let mut model = Assignment::new();
    model.insert("top.cnt@0", Cst::int(0usize));
    model.insert("top.cnt@1", Cst::int(1usize));
    model.insert("top.stop@0", Cst::B(false));
    model.insert("fresh_actlit_3", Cst::B(true));
    model.insert("top.abv.abv_0@0", Cst::B(true));
    model.insert("top.cnt@5", Cst::int(9usize));

    let cex = sys.path_from_model(&model, 1);
    assert_eq!(cex.len(), 2);
    let step_0 = &cex.trace[&0];
    assert_eq!(step_0.len(), 2);
    let step_1 = &cex.trace[&1];
    assert_eq!(step_1.len(), 1);
}

#[test]
fn cex_length_tracks_last_step() {
    let mut cex = Cex::new();
    assert!(cex.is_empty());
    assert_eq!(cex.len(), 0);
    cex.insert(
        2,
        SVar::new(vec!["top".into()], "cnt", Typ::Int),
        Cst::int(0usize),
    );
    assert_eq!(cex.len(), 3);
}
