//! Tests over terms.

use super::*;

fn svar(id: &str, typ: Typ) -> SVar {
    SVar::new(vec!["sys".into()], id, typ)
}

fn factory() -> Terms {
    Terms::new()
}

#[test]
fn hashcons_identity() {
    let terms = factory();
    let cnt = svar("cnt", Typ::Int);

    let lft = terms.app(Op::Ge, vec![terms.svar_at(&cnt, 0), terms.int(0)]).unwrap();
    let rgt = terms.app(Op::Ge, vec![terms.svar_at(&cnt, 0), terms.int(0)]).unwrap();
    assert_eq!(lft, rgt);
    assert_eq!(lft.uid(), rgt.uid());

    let other = terms.app(Op::Ge, vec![terms.svar_at(&cnt, 1), terms.int(0)]).unwrap();
    assert_ne!(lft, other);
    assert_ne!(lft.uid(), other.uid());
}

#[test]
fn hashcons_shared_across_clones() {
    let terms = factory();
    let shared = terms.clone();
    let flag = svar("flag", Typ::Bool);
    let lft = terms.svar_at(&flag, 3);
    let rgt = shared.svar_at(&flag, 3);
    assert_eq!(lft.uid(), rgt.uid());
}

#[test]
fn bump_shifts_offsets() {
    let terms = factory();
    let cnt = svar("cnt", Typ::Int);
    let pred = terms
        .app(Op::Le, vec![terms.svar_at(&cnt, 0), terms.int(7)])
        .unwrap();

    let bumped = terms.bump(&pred, 3);
    let vars = terms.vars(&bumped);
    assert_eq!(vars.len(), 1);
    let var = vars.into_iter().next().unwrap();
    assert_eq!(var.offset(), &Int::from(3));
}

#[test]
fn bump_round_trip() {
    let terms = factory();
    let cnt = svar("cnt", Typ::Int);
    let stop = svar("stop", Typ::Bool);
    let pred = terms.and(vec![
        terms.svar_at(&stop, 0),
        terms
            .app(Op::Gt, vec![terms.svar_at(&cnt, 1), terms.svar_at(&cnt, 0)])
            .unwrap(),
    ]);

    let there = terms.bump(&pred, 5);
    let back = terms.bump(&there, -Int::from(5));
    assert_eq!(back, pred);
    assert_eq!(back.uid(), pred.uid());
}

#[test]
fn bump_zero_is_identity() {
    let terms = factory();
    let cnt = svar("cnt", Typ::Int);
    let pred = terms.eq(terms.svar_at(&cnt, 2), terms.int(0));
    assert_eq!(terms.bump(&pred, 0), pred);
}

#[test]
fn and_or_simplification() {
    let terms = factory();
    let flag = terms.svar_at(&svar("flag", Typ::Bool), 0);

    assert_eq!(terms.and(vec![]), terms.tru());
    assert_eq!(terms.or(vec![]), terms.fls());
    assert_eq!(terms.and(vec![flag.clone()]), flag);
    assert_eq!(terms.and(vec![terms.tru(), flag.clone()]), flag);
    assert_eq!(terms.and(vec![terms.fls(), flag.clone()]), terms.fls());
    assert_eq!(terms.or(vec![terms.tru(), flag.clone()]), terms.tru());
}

#[test]
fn double_negation_collapses() {
    let terms = factory();
    let flag = terms.svar_at(&svar("flag", Typ::Bool), 0);
    assert_eq!(terms.not(terms.not(flag.clone())), flag);
    assert_eq!(terms.not(terms.tru()), terms.fls());
}

#[test]
fn atoms_of_boolean_structure() {
    let terms = factory();
    let cnt = svar("cnt", Typ::Int);
    let stop = svar("stop", Typ::Bool);
    let rel = terms
        .app(Op::Ge, vec![terms.svar_at(&cnt, 0), terms.int(0)])
        .unwrap();
    let flag = terms.svar_at(&stop, 0);
    let pred = terms.and(vec![
        terms.not(flag.clone()),
        terms.implies(flag.clone(), rel.clone()),
        rel.clone(),
    ]);

    let atoms = terms.atoms(&pred);
    assert_eq!(atoms.len(), 2);
    assert!(atoms.contains(&flag));
    assert!(atoms.contains(&rel));
}

#[test]
fn atoms_skip_constants() {
    let terms = factory();
    assert!(terms.atoms(&terms.tru()).is_empty());
}

#[test]
fn typing_rejects_mixed_arith() {
    let terms = factory();
    let cnt = terms.svar_at(&svar("cnt", Typ::Int), 0);
    let flag = terms.svar_at(&svar("flag", Typ::Bool), 0);
    assert!(terms.app(Op::Add, vec![cnt.clone(), flag.clone()]).is_err());
    assert!(terms.app(Op::And, vec![flag, cnt]).is_err());
}

#[test]
fn typing_ite() {
    let terms = factory();
    let cnd = terms.svar_at(&svar("flag", Typ::Bool), 0);
    let thn = terms.svar_at(&svar("cnt", Typ::Int), 0);
    let els = terms.int(0);
    let ite = terms.app(Op::Ite, vec![cnd, thn, els]).unwrap();
    assert_eq!(ite.typ(), Typ::Int);
}

#[test]
fn smt_printing() {
    let terms = factory();
    let cnt = svar("cnt", Typ::Int);
    let pred = terms.not(
        terms
            .app(Op::Ge, vec![terms.svar_at(&cnt, 2), terms.int(-7)])
            .unwrap(),
    );
    assert_eq!(pred.get().to_string(), "(not (>= sys.cnt@2 (- 7)))");
}

#[test]
fn cst_parsing() {
    assert_eq!(Cst::of_smt_str("true"), Some(Cst::B(true)));
    assert_eq!(Cst::of_smt_str("false"), Some(Cst::B(false)));
    assert_eq!(Cst::of_smt_str("42"), Some(Cst::int(42usize)));
    assert_eq!(Cst::of_smt_str("(- 7)"), Some(Cst::I((-7).into())));
    assert_eq!(
        Cst::of_smt_str("(/ 1 2)"),
        Some(Cst::R(Rat::new(1.into(), 2.into())))
    );
    assert_eq!(
        Cst::of_smt_str("(- (/ 1 2))"),
        Some(Cst::R(Rat::new((-1).into(), 2.into())))
    );
    assert_eq!(
        Cst::of_smt_str("1.5"),
        Some(Cst::R(Rat::new(3.into(), 2.into())))
    );
    assert_eq!(Cst::of_smt_str("seven"), None);
}

#[test]
fn subst_replaces_whole_subterms() {
    let terms = factory();
    let cnt = svar("cnt", Typ::Int);
    let abv = svar("abv_0", Typ::Bool);
    let atom = terms.eq(terms.svar_at(&cnt, 0), terms.int(3));
    let abv_term = terms.svar_at(&abv, 0);

    let mut map = HConMap::new();
    map.insert(atom.clone(), abv_term.clone());

    let pred = terms.not(atom.clone());
    let abstracted = terms.subst(&pred, &map);
    assert_eq!(abstracted, terms.not(abv_term.clone()));

    let mut inverse = HConMap::new();
    inverse.insert(abv_term, atom.clone());
    assert_eq!(terms.subst(&abstracted, &inverse), pred);
}

#[test]
fn eval_arith_and_bool() {
    let terms = factory();
    let cnt = svar("cnt", Typ::Int);
    let stop = svar("stop", Typ::Bool);

    let mut model = Assignment::new();
    model.insert("sys.cnt@0", Cst::int(3usize));
    model.insert("sys.stop@0", Cst::B(false));

    let pred = terms.implies(
        terms.svar_at(&stop, 0),
        terms.eq(terms.svar_at(&cnt, 0), terms.int(0)),
    );
    assert_eq!(terms.eval(&pred, &model).unwrap(), Cst::B(true));

    let sum = terms
        .app(
            Op::Add,
            vec![terms.svar_at(&cnt, 0), terms.svar_at(&cnt, 0), terms.int(1)],
        )
        .unwrap();
    assert_eq!(terms.eval(&sum, &model).unwrap(), Cst::int(7usize));

    let ite = terms
        .app(
            Op::Ite,
            vec![terms.svar_at(&stop, 0), terms.int(0), terms.svar_at(&cnt, 0)],
        )
        .unwrap();
    assert_eq!(terms.eval(&ite, &model).unwrap(), Cst::int(3usize));
}

#[test]
fn eval_fails_on_missing_valuation() {
    let terms = factory();
    let cnt = svar("cnt", Typ::Int);
    let model = Assignment::new();
    let pred = terms.eq(terms.svar_at(&cnt, 0), terms.int(0));
    assert!(terms.eval(&pred, &model).is_err());
}

#[test]
fn eval_idiv_mod() {
    let terms = factory();
    let div = terms.app(Op::IDiv, vec![terms.int(7), terms.int(2)]).unwrap();
    let modulo = terms.app(Op::Mod, vec![terms.int(7), terms.int(2)]).unwrap();
    let model = Assignment::new();
    assert_eq!(terms.eval(&div, &model).unwrap(), Cst::int(3usize));
    assert_eq!(terms.eval(&modulo, &model).unwrap(), Cst::int(1usize));
}

#[test]
fn var_smt_ids() {
    let cnt = svar("cnt", Typ::Int);
    assert_eq!(cnt.qual_id(), "sys.cnt");
    assert_eq!(cnt.at(4).smt_id(), "sys.cnt@4");
    assert_eq!(cnt.at(-1).smt_id(), "sys.cnt@-1");

    let clone = cnt.in_subscope("cln");
    assert_eq!(clone.qual_id(), "sys.cln.cnt");
}
