//! IC3 with implicit predicate abstraction.
//!
//! Runs on a single property. The engine maintains a sequence of *frames*,
//! over-approximations of the states reachable in at most `i` steps,
//! expressed over *abstraction booleans* (abvars): each tracked predicate
//! atom `a` gets a fresh boolean state variable `α(a)`, coupled to the atom
//! by the equality `a = α(a)`. Queries are posed over abvars with the
//! couplings assumed, so the abstraction is implicit and always faithful.
//!
//! The concrete transition relation rides along inside the same solver
//! through *cloned* state variables (scope suffix `cln`): relative
//! induction checks conjoin the clone transition and the predicate-level
//! couplings between the two worlds.
//!
//! Frames are stored difference-encoded in ascending order: `frames[i]`
//! holds the clauses introduced at level `i`, and the logical content of
//! `F_i` is the conjunction of the clauses stored at every level `>= i`.
//! `F_0` thus accumulates everything; the abstracted initial predicate is
//! stored at level `1`, making `F_0 ≡ α(I)` at start-up. Monotonicity
//! `F_i ⇒ F_{i+1}` holds by construction, and an empty store below the top
//! frame means `F_i = F_{i+1}`: the fixpoint.
//!
//! Abstract counterexamples are simulated concretely; spurious ones are
//! refined away by sequence interpolation, whose interpolants contribute
//! new predicate atoms to the abstraction.

crate::prelude!();

use tracing::{debug, info, warn};

use actlit::{Actlit, Actlits};
use check::{cexs::Cube, first_true, Cex};
use event::Link;
use solver::{Conf, Solver};
use term::{SVar, Term, Terms, Typ};
use trans::{PropStatus, Sys};

/// Verdict of an IC3IA run on a property.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The property is invariant.
    Proved,
    /// The property is falsified by a concrete trace.
    Falsified(Cex),
    /// The property was resolved by another engine while this one ran.
    ResolvedUpstream,
}

/// The abstraction map `α`, a bijection between predicate atoms and
/// abstraction booleans.
///
/// Grows monotonically: atoms are never re-added, abvars never retired.
/// The abvar counter lives here.
pub struct AbvarMap {
    /// Atom to abvar term.
    map: HConMap<Term, Term>,
    /// Abvar term to atom.
    inverse: HConMap<Term, Term>,
    /// Abvar state variables, in allocation order.
    svars: Vec<SVar>,
    /// Next abvar index.
    counter: usize,
}
impl Default for AbvarMap {
    fn default() -> Self {
        Self::new()
    }
}
impl AbvarMap {
    /// Empty map.
    pub fn new() -> Self {
        Self {
            map: HConMap::new(),
            inverse: HConMap::new(),
            svars: vec![],
            counter: 0,
        }
    }

    /// Extends the map with the atoms of some predicates.
    ///
    /// Atoms already mapped are skipped; each genuinely new atom gets a
    /// fresh boolean state variable in the `abv` sub-scope of its own
    /// scope, instantiated at the atoms' offset. Returns the new abvars,
    /// which the caller must declare. Applying the same predicates twice
    /// adds nothing.
    pub fn update(&mut self, terms: &Terms, preds: &[Term]) -> Res<Vec<SVar>> {
        let mut fresh = vec![];
        for pred in preds {
            for atom in terms.atoms(pred) {
                if self.map.get(&atom).is_some() {
                    continue;
                }
                let vars = terms.vars(&atom);
                let (scope, offset) = match vars.iter().next() {
                    Some(var) => (var.svar().scope().to_vec(), var.offset().clone()),
                    // An atom with no variables is constant, nothing to
                    // abstract.
                    None => continue,
                };
                for var in &vars {
                    if var.offset() != &offset {
                        bail!(
                            "cannot abstract multi-offset atom `{}`",
                            atom.get()
                        )
                    }
                }
                let mut abv_scope = scope;
                abv_scope.push("abv".to_string());
                let svar = SVar::new(abv_scope, format!("abv_{}", self.counter), Typ::Bool);
                self.counter += 1;

                let abv_term = terms.svar_at(&svar, offset);
                self.map.insert(atom.clone(), abv_term.clone());
                self.inverse.insert(abv_term, atom);
                self.svars.push(svar.clone());
                fresh.push(svar);
            }
        }
        Ok(fresh)
    }

    /// Abstraction of a term: every mapped atom replaced by its abvar.
    pub fn abstract_term(&self, terms: &Terms, term: &Term) -> Term {
        terms.subst(term, &self.map)
    }

    /// Concretization of a term: every abvar replaced by its atom.
    ///
    /// Inverse of [`Self::abstract_term`] on the mapped atoms.
    pub fn concretize(&self, terms: &Terms, term: &Term) -> Term {
        terms.subst(term, &self.inverse)
    }

    /// The coupling equalities `a = α(a)`, one per mapped atom.
    pub fn couplings(&self, terms: &Terms) -> Vec<Term> {
        self.svars
            .iter()
            .map(|svar| {
                let abv = terms.svar_at(svar, 0);
                let atom = self
                    .inverse
                    .get(&abv)
                    .expect("abvar map inverse is total by construction");
                terms.eq(atom.clone(), abv)
            })
            .collect()
    }

    /// The abvar state variables, in allocation order.
    pub fn svars(&self) -> &[SVar] {
        &self.svars
    }

    /// Number of mapped atoms.
    pub fn len(&self) -> usize {
        self.svars.len()
    }
    /// True if no atom is mapped.
    pub fn is_empty(&self) -> bool {
        self.svars.is_empty()
    }
}

/// Result of a block phase.
enum Block {
    /// The top frame excludes every bad state.
    Blocked,
    /// A concrete counterexample was found.
    Cex(Cex),
}

/// Refinement outcome.
enum Refine {
    /// The abstraction grew, blocking must be retried.
    Refined,
    /// The abstract path is concretizable.
    Concrete(Cex),
}

/// The IC3IA engine for one property.
pub struct Ic3ia {
    /// The engine's copy of the system.
    sys: Sys,
    /// Underlying solver.
    solver: Solver,
    /// Term factory.
    terms: Terms,
    /// Activation literal registry.
    actlits: Actlits,
    /// Event bus endpoint.
    link: Link,
    /// Name of the property under check.
    prop_name: String,
    /// The property's predicate, over offset `0`.
    prop: Term,
    /// Tracked predicates `Π`.
    preds: Vec<Term>,
    /// The abstraction map.
    abv: AbvarMap,
    /// Concrete-to-clone variable map.
    clones: Map<SVar, SVar>,
    /// Difference-encoded frames, ground level first.
    frames: Vec<Vec<Term>>,
    /// Abstracted initial predicate.
    abs_init: Term,
    /// Abstracted property.
    abs_prop: Term,
    /// Clone rendition of the transition relation.
    trans_clone: Term,
    /// Predicate-level coupling to the clone world, offset `0`.
    pred_coupling: Term,
    /// Highest declared offset.
    declared_hi: Unroll,
    /// Number of refinements performed, used to name interpolation groups.
    refinements: usize,
}

impl Ic3ia {
    /// Creates an IC3IA engine for one property of a system.
    pub fn new(sys: Sys, prop_name: &str, conf: Conf, link: Link, terms: Terms) -> Res<Self> {
        let prop = match sys.props().get(prop_name) {
            Some(prop) => prop.term().clone(),
            None => bail!("unknown property `{}`", prop_name),
        };

        let mut solver = Solver::new(conf, terms.clone())?;
        solver.comment(&format!(
            "ic3ia engine for property `{}` of `{}`",
            prop_name,
            sys.name()
        ))?;
        solver.define_and_declare_of_bounds(&sys, 0, 1)?;

        // Seed predicates and their abstraction.
        let preds = vec![sys.init().clone(), prop.clone()];
        let mut abv = AbvarMap::new();
        let fresh = abv.update(&terms, &preds)?;
        for svar in &fresh {
            for offset in 0..=1 {
                solver.declare_svar_at(svar, offset)?
            }
        }

        // Clone world: a parallel copy of every state variable.
        let mut clones = Map::new();
        for svar in sys.decls().all() {
            let clone = svar.in_subscope("cln");
            for offset in 0..=1 {
                solver.declare_svar_at(&clone, offset)?
            }
            clones.insert(svar.clone(), clone);
        }

        let trans_clone = clone_term(&terms, &clones, sys.trans());
        let pred_coupling = pred_coupling(&terms, &clones, &preds);
        let abs_init = abv.abstract_term(&terms, sys.init());
        let abs_prop = abv.abstract_term(&terms, &prop);

        Ok(Self {
            sys,
            solver,
            terms,
            actlits: Actlits::new(),
            link,
            prop_name: prop_name.to_string(),
            prop,
            preds,
            abv,
            clones,
            frames: vec![],
            abs_init,
            abs_prop,
            trans_clone,
            pred_coupling,
            declared_hi: 1,
            refinements: 0,
        })
    }

    /// Runs the engine to completion on its property.
    pub fn run(&mut self) -> Res<Verdict> {
        // `I ∧ H ⊨ P`, else the property fails in some initial state.
        let mut conjuncts = self.abv.couplings(&self.terms);
        conjuncts.push(self.sys.init().clone());
        conjuncts.push(self.abs_init.clone());
        conjuncts.push(self.terms.not(self.abs_prop.clone()));
        let assumptions = self.assume_all(&conjuncts)?;
        let initial_failure = self.solver.check_sat_assuming_then(
            &assumptions,
            |solver| Ok(Some(solver.assignment()?)),
            |_| Ok(None),
        )?;
        if let Some(model) = initial_failure {
            let cex = self.sys.path_from_model(&model, 0);
            info!(prop = %self.prop_name, "property falsified in an initial state");
            self.link
                .prop_status(&mut self.sys, &self.prop_name, PropStatus::Falsified(cex.clone()))?;
            return Ok(Verdict::Falsified(cex));
        }

        self.frames = vec![vec![], vec![self.abs_init.clone()]];

        loop {
            let events = self.link.recv();
            let diff = event::update_trans_sys(&mut self.sys, events)?;
            for inv in &diff.invariants {
                // Reachability invariants strengthen every query soundly.
                self.solver.assert(inv)?;
                let bumped = self.terms.bump(inv, 1);
                self.solver.assert(&bumped)?
            }
            match self.sys.prop_status(&self.prop_name) {
                Some(status) if status.is_decided() => {
                    info!(prop = %self.prop_name, %status, "resolved upstream, stopping");
                    return Ok(Verdict::ResolvedUpstream);
                }
                _ => (),
            }

            match self.block()? {
                Block::Cex(cex) => {
                    info!(prop = %self.prop_name, len = cex.len(), "falsified");
                    self.link.prop_status(
                        &mut self.sys,
                        &self.prop_name,
                        PropStatus::Falsified(cex.clone()),
                    )?;
                    return Ok(Verdict::Falsified(cex));
                }
                Block::Blocked => (),
            }

            if self.propagate()? {
                info!(prop = %self.prop_name, k = self.frames.len() - 1, "fixpoint, invariant");
                self.link
                    .prop_status(&mut self.sys, &self.prop_name, PropStatus::Invariant)?;
                return Ok(Verdict::Proved);
            }

            self.extend_frames()?
        }
    }

    /// Declares offset `k + 1` for every symbol and opens a new top frame.
    fn extend_frames(&mut self) -> Res<()> {
        let next = self.declared_hi + 1;
        self.solver.define_and_declare_of_bounds(&self.sys, next, next)?;
        for svar in self.clones.values().cloned().collect::<Vec<_>>() {
            self.solver.declare_svar_at(&svar, next)?
        }
        for svar in self.abv.svars().to_vec() {
            self.solver.declare_svar_at(&svar, next)?
        }
        self.declared_hi = next;
        self.frames.push(vec![]);
        debug!(prop = %self.prop_name, k = self.frames.len() - 1, "new frame");
        Ok(())
    }

    /// Gates each term with a fresh actlit and returns the assumption set.
    fn assume_all(&mut self, conjuncts: &[Term]) -> Res<Vec<Actlit>> {
        let mut assumptions = Vec::with_capacity(conjuncts.len());
        for term in conjuncts {
            let actlit = self.actlits.fresh();
            self.solver.declare_actlit(&actlit)?;
            self.solver.assert_gated(&actlit, term)?;
            assumptions.push(actlit)
        }
        Ok(assumptions)
    }

    /// The abvar instances at offset `0`, the valuation targets of every
    /// abstract query.
    fn abv_terms(&self) -> Vec<Term> {
        self.abv
            .svars()
            .iter()
            .map(|svar| self.terms.svar_at(svar, 0))
            .collect()
    }

    /// Turns abvar valuations into a cube.
    fn cube_of_values(&self, values: &[(Term, term::Cst)]) -> Cube {
        values
            .iter()
            .map(|(abv, cst)| {
                if cst.is_true() {
                    abv.clone()
                } else {
                    self.terms.not(abv.clone())
                }
            })
            .collect()
    }

    /// Block phase: empty the top frame of abstract bad states.
    fn block(&mut self) -> Res<Block> {
        loop {
            let top = self.frames.len() - 1;

            // `F_top ∧ H ∧ ¬α(P)`.
            let mut conjuncts = self.frames[top].clone();
            conjuncts.extend(self.abv.couplings(&self.terms));
            conjuncts.push(self.terms.not(self.abs_prop.clone()));
            let assumptions = self.assume_all(&conjuncts)?;
            let abv_terms = self.abv_terms();

            let bad = self.solver.check_sat_assuming_and_get_term_values(
                &assumptions,
                &abv_terms,
                |_, values| Ok(Some(values.to_vec())),
                |_| Ok(None),
            )?;

            let cube = match bad {
                None => return Ok(Block::Blocked),
                Some(values) => self.cube_of_values(&values),
            };

            match self.rec_block(cube, top)? {
                None => continue,
                Some(path) => match self.refine(&path)? {
                    Refine::Refined => continue,
                    Refine::Concrete(cex) => return Ok(Block::Cex(cex)),
                },
            }
        }
    }

    /// Blocks a bad cube at a level, recursively pushing counterexamples to
    /// induction down the frame sequence.
    ///
    /// Realized as an explicit obligation stack; deeper obligations sit on
    /// top and are re-examined bottom-up once their predecessors are
    /// blocked. Returns an abstract counterexample path (earliest step
    /// first) when an obligation reaches the initial frame.
    fn rec_block(&mut self, cube: Cube, level: Unroll) -> Res<Option<Vec<Cube>>> {
        let mut obligations: Vec<(Unroll, Cube)> = vec![(level, cube)];
        while let Some((lvl, cube)) = obligations.last().cloned() {
            if lvl == 0 {
                // The cube reaches the initial frame: abstract
                // counterexample, deepest cube first.
                let path = obligations
                    .iter()
                    .rev()
                    .map(|(_, cube)| cube.clone())
                    .collect();
                return Ok(Some(path));
            }

            let candidate = {
                let cube = self.terms.and(cube.clone());
                self.terms.not(cube)
            };
            match self.abs_rel_ind(lvl - 1, &candidate)? {
                Some(cti) => obligations.push((lvl - 1, cti)),
                None => {
                    let clause = self.generalize(lvl - 1, cube)?;
                    debug!(lvl, clause = %clause.get(), "blocking clause");
                    self.frames[lvl].push(clause);
                    obligations.pop();
                }
            }
        }
        Ok(None)
    }

    /// Checks whether a candidate clause is inductive relative to the
    /// logical content of a frame level.
    ///
    /// Queries `F ∧ φ ∧ H ∧ H' ∧ T(γ) ∧ E_Π ∧ E_Π' ∧ ¬φ'` with every
    /// conjunct gated by a fresh actlit. Unsat means inductive (`None`);
    /// sat yields the pre-state abvar cube, a counterexample to induction.
    fn abs_rel_ind(&mut self, rel_level: Unroll, candidate: &Term) -> Res<Option<Cube>> {
        let mut conjuncts: Vec<Term> = self.frames[rel_level..]
            .iter()
            .flat_map(|clauses| clauses.iter().cloned())
            .collect();
        conjuncts.push(candidate.clone());

        let couplings = self.abv.couplings(&self.terms);
        for coupling in &couplings {
            conjuncts.push(coupling.clone());
            conjuncts.push(self.terms.bump(coupling, 1));
        }
        conjuncts.push(self.trans_clone.clone());
        conjuncts.push(self.pred_coupling.clone());
        conjuncts.push(self.terms.bump(&self.pred_coupling, 1));
        conjuncts.push(self.terms.not(self.terms.bump(candidate, 1)));

        let assumptions = self.assume_all(&conjuncts)?;
        let abv_terms = self.abv_terms();
        let cti = self.solver.check_sat_assuming_and_get_term_values(
            &assumptions,
            &abv_terms,
            |_, values| Ok(Some(values.to_vec())),
            |_| Ok(None),
        )?;
        Ok(cti.map(|values| self.cube_of_values(&values)))
    }

    /// Shrinks a blocked cube literal by literal.
    ///
    /// A literal is dropped when the reduced clause is still inductive
    /// relative to the same frame level, and kept when dropping it breaks
    /// induction. Returns the generalized blocking clause.
    fn generalize(&mut self, rel_level: Unroll, cube: Cube) -> Res<Term> {
        let mut lits = cube;
        let mut idx = 0;
        while idx < lits.len() && lits.len() > 1 {
            let mut reduced = lits.clone();
            reduced.remove(idx);
            let candidate = self.terms.not(self.terms.and(reduced.clone()));
            match self.abs_rel_ind(rel_level, &candidate)? {
                None => lits = reduced,
                Some(_) => idx += 1,
            }
        }
        Ok(self.terms.not(self.terms.and(lits)))
    }

    /// Refinement: simulate the abstract path concretely; if spurious, grow
    /// the abstraction from sequence interpolants.
    fn refine(&mut self, path: &[Cube]) -> Res<Refine> {
        let steps = path.len() - 1;
        debug!(prop = %self.prop_name, len = path.len(), "refining abstract counterexample");

        // Simulation: `⋀ path_i@i ∧ ⋀ T[i, i+1] ∧ ⋀ H@i`.
        let mut conjuncts = Vec::with_capacity(3 * path.len());
        for (step, cube) in path.iter().enumerate() {
            let cube = self.terms.and(cube.clone());
            conjuncts.push(self.terms.bump(&cube, step))
        }
        for step in 0..steps {
            conjuncts.push(self.terms.bump(self.sys.trans(), step))
        }
        let couplings = self.abv.couplings(&self.terms);
        for step in 0..=steps {
            for coupling in &couplings {
                conjuncts.push(self.terms.bump(coupling, step))
            }
        }
        let assumptions = self.assume_all(&conjuncts)?;
        let concrete = self.solver.check_sat_assuming_then(
            &assumptions,
            |solver| Ok(Some(solver.assignment()?)),
            |_| Ok(None),
        )?;
        if let Some(model) = concrete {
            let cex = self.sys.path_from_model(&model, steps);
            return Ok(Refine::Concrete(cex));
        }

        // Spurious: interpolate the concretized path.
        let refinement = self.refinements;
        self.refinements += 1;
        let mut names = Vec::with_capacity(path.len());
        self.solver.push()?;
        for (step, cube) in path.iter().enumerate() {
            let cube = self.terms.and(cube.clone());
            let concrete = self.abv.concretize(&self.terms, &cube);
            let group = if step == 0 {
                concrete
            } else {
                self.terms.and(vec![
                    self.terms.bump(self.sys.trans(), step - 1),
                    self.terms.bump(&concrete, step),
                ])
            };
            let name = format!("itp_{}_{}", refinement, step);
            self.solver.assert_named(&name, &group)?;
            names.push(name)
        }
        let interpolants = self.solver.get_interpolants(&names, self.sys.decls());
        self.solver.pop()?;
        let interpolants = interpolants.chain_err(|| "while refining the abstraction")?;

        let mut fresh_preds = vec![];
        for (step, interpolant) in interpolants.into_iter().enumerate() {
            let grounded = self.terms.bump(&interpolant, -Int::from(step));
            match grounded.get() {
                term::RTerm::Cst(term::Cst::B(true)) => continue,
                term::RTerm::Cst(term::Cst::B(false)) => {
                    // A false interpolant means the tail of the sequence is
                    // already contradictory; nothing to learn from it.
                    warn!(prop = %self.prop_name, step, "false interpolant, dropping");
                    continue;
                }
                _ => fresh_preds.push(grounded),
            }
        }

        let fresh_abvs = self.abv.update(&self.terms, &fresh_preds)?;
        if fresh_abvs.is_empty() {
            bail!(ErrorKind::Inconsistency(
                "refinement produced no new predicate".into()
            ))
        }
        for svar in &fresh_abvs {
            for offset in 0..=self.declared_hi {
                self.solver.declare_svar_at(svar, offset)?
            }
        }
        for pred in &fresh_preds {
            for atom in self.terms.atoms(pred) {
                self.preds.push(atom)
            }
        }
        self.pred_coupling = pred_coupling(&self.terms, &self.clones, &self.preds);
        info!(
            prop = %self.prop_name,
            abvars = self.abv.len(),
            preds = self.preds.len(),
            "abstraction refined"
        );
        Ok(Refine::Refined)
    }

    /// Propagation phase: move clauses forward as far as they stay
    /// relatively inductive. True on fixpoint.
    fn propagate(&mut self) -> Res<bool> {
        let top = self.frames.len() - 1;
        for level in 1..top {
            let clauses = std::mem::take(&mut self.frames[level]);
            let (keep, forward) = self.partition(level, clauses)?;
            self.frames[level] = keep;
            self.frames[level + 1].extend(forward);
            if self.frames[level].is_empty() {
                // `F_level = F_level+1`: consecution closes the loop.
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Partitions candidate clauses of a level into those that must stay
    /// and those that propagate one level up.
    ///
    /// Queries the relative-induction shape over the whole candidate
    /// conjunction and reads the primed valuation of each clause from the
    /// model: false means the clause breaks, true means it survives this
    /// round. Iterates on the survivors, whose conjunction only gets
    /// weaker, until unsat proves they all propagate.
    fn partition(&mut self, level: Unroll, clauses: Vec<Term>) -> Res<(Vec<Term>, Vec<Term>)> {
        let mut keep = vec![];
        let mut candidates = clauses;
        loop {
            if candidates.is_empty() {
                return Ok((keep, vec![]));
            }

            let mut conjuncts: Vec<Term> = self.frames[level..]
                .iter()
                .flat_map(|clauses| clauses.iter().cloned())
                .collect();
            // The level's own store is being partitioned, so its content
            // rides in explicitly: clauses already kept plus the candidates.
            conjuncts.extend(keep.iter().cloned());
            conjuncts.extend(candidates.iter().cloned());
            let couplings = self.abv.couplings(&self.terms);
            for coupling in &couplings {
                conjuncts.push(coupling.clone());
                conjuncts.push(self.terms.bump(coupling, 1));
            }
            conjuncts.push(self.trans_clone.clone());
            conjuncts.push(self.pred_coupling.clone());
            conjuncts.push(self.terms.bump(&self.pred_coupling, 1));
            conjuncts.push({
                let primed = self.terms.bump(&self.terms.and(candidates.clone()), 1);
                self.terms.not(primed)
            });

            let primed_candidates: Vec<Term> = candidates
                .iter()
                .map(|clause| self.terms.bump(clause, 1))
                .collect();
            let assumptions = self.assume_all(&conjuncts)?;
            let broken = self.solver.check_sat_assuming_and_get_term_values(
                &assumptions,
                &primed_candidates,
                |_, values| {
                    Ok(Some(
                        values.iter().map(|(_, cst)| cst.is_false()).collect::<Vec<_>>(),
                    ))
                },
                |_| Ok(None),
            )?;

            match broken {
                // Unsat: every remaining candidate propagates.
                None => return Ok((keep, candidates)),
                Some(broken_flags) => {
                    if first_true(&broken_flags).is_none() {
                        // Sat round that breaks no clause: no progress to
                        // make, keep the candidates where they are.
                        keep.extend(candidates);
                        return Ok((keep, vec![]));
                    }
                    let mut survivors = Vec::with_capacity(candidates.len());
                    for (clause, broken) in candidates.into_iter().zip(broken_flags) {
                        if broken {
                            keep.push(clause)
                        } else {
                            survivors.push(clause)
                        }
                    }
                    candidates = survivors
                }
            }
        }
    }
}

/// Rewrites a term into the clone world.
fn clone_term(terms: &Terms, clones: &Map<SVar, SVar>, term: &Term) -> Term {
    terms.map_vars(term, &mut |var| {
        clones
            .get(var.svar())
            .map(|clone| clone.at(var.offset().clone()))
    })
}

/// The predicate-level coupling `⋀ p ↔ γ(p)` between the abstract and the
/// clone world, at offset `0`.
fn pred_coupling(terms: &Terms, clones: &Map<SVar, SVar>, preds: &[Term]) -> Term {
    let eqs = preds
        .iter()
        .map(|pred| terms.eq(pred.clone(), clone_term(terms, clones, pred)))
        .collect();
    terms.and(eqs)
}
