//! The k-induction step engine.
//!
//! Handles all unresolved properties of a system as a batch. At step `k`
//! the engine asks whether some candidate can be false at `k` while every
//! candidate held at `0..k-1` along `k` transitions; candidates surviving
//! the *split-closure* of the query are inductive at `k` relative to the
//! batch.
//!
//! The engine never proves falsification on its own: a step counterexample
//! need not start in a reachable state. Surviving candidates become
//! *optimistic* and are only published `Invariant` once the companion BMC
//! (heard through the event bus) has certified their base cases. If the bus
//! reports a falsification meanwhile, optimism was misplaced: optimistics
//! return to the unknowns and the engine backtracks one step.
//!
//! Every property assertion on the solver is gated by the property's
//! canonical activation literal, and every closure query allocates a fresh
//! one; backtracking is therefore assertion-free, stale guards are simply
//! never assumed again.

crate::prelude!();

use std::time::Duration;

use tracing::{debug, info};

use actlit::{Actlit, Actlits};
use check::{compress::Compressor, PropHandle};
use event::Link;
use solver::{Conf, Solver};
use term::{Term, Terms};
use trans::{PropStatus, Sys};

/// Pause between event polls during the confirmation phase.
const CONFIRM_NAP: Duration = Duration::from_millis(10);

/// Outcome of a confirmation phase.
enum Confirm {
    /// Every optimistic property was confirmed or resolved upstream.
    Done,
    /// A falsification arrived, optimism is tainted.
    Tainted,
}

/// The k-induction step engine.
pub struct Kind {
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
    /// Path-compression oracle.
    compress: Compressor,
    /// Current step.
    k: Unroll,
    /// Invariants received so far, over offset `0`.
    invariants: Vec<Term>,
    /// Properties not known to be inductive at the current step.
    unknowns: Vec<PropHandle>,
    /// Properties inductive at some step, each with its promotion step,
    /// awaiting base-case confirmation.
    optimistics: Vec<(PropHandle, Unroll)>,
    /// Highest offset the system is unrolled to (`T[i-1, i]` asserted and
    /// variables declared for every `i` up to this bound).
    unrolled: Unroll,
    /// Highest offset invariants are asserted at.
    inv_bound: Unroll,
    /// Highest offset the gated property implications are asserted at, if
    /// any.
    prop_bound: Option<Unroll>,
}

impl Kind {
    /// Creates a step engine for all unresolved properties of a system.
    pub fn new(sys: Sys, conf: Conf, link: Link, terms: Terms) -> Res<Self> {
        let mut solver = Solver::new(conf, terms.clone())?;
        solver.comment(&format!("k-induction step engine for `{}`", sys.name()))?;
        solver.define_and_declare_of_bounds(&sys, 0, 1)?;
        solver.assert(&sys.trans_of_bound(&terms, 1))?;

        let mut actlits = Actlits::new();
        let unknowns = PropHandle::of_props(sys.props_unresolved(), &mut actlits, &mut solver)?;
        let compress = Compressor::new(sys.decls());

        Ok(Self {
            sys,
            solver,
            terms,
            actlits,
            link,
            compress,
            k: 1,
            invariants: vec![],
            unknowns,
            optimistics: vec![],
            unrolled: 1,
            inv_bound: 1,
            prop_bound: None,
        })
    }

    /// Runs the engine to completion.
    ///
    /// Returns when every property it started with is resolved, confirmed
    /// invariant, or falsified upstream.
    pub fn run(&mut self) -> Res<()> {
        loop {
            let events = self.link.recv();
            let diff = event::update_trans_sys(&mut self.sys, events)?;
            self.assert_invariants(diff.invariants)?;
            self.drop_resolved();

            if !diff.falsifieds.is_empty() && !self.optimistics.is_empty() {
                // Optimistics were proven under hypotheses that just fell.
                info!(
                    k = self.k,
                    tainted = self.optimistics.len(),
                    "falsification received, backtracking"
                );
                self.demote_optimistics();
                if self.k > 1 {
                    self.k -= 1
                }
                continue;
            }

            if self.unknowns.is_empty() {
                if self.optimistics.is_empty() {
                    info!("no property left to check, done");
                    return Ok(());
                }
                match self.confirm()? {
                    Confirm::Done => {
                        if self.unknowns.is_empty() {
                            return Ok(());
                        }
                        continue;
                    }
                    Confirm::Tainted => continue,
                }
            }

            self.unroll_to_k()?;
            self.assert_props_to_k()?;

            let (unfalsifiable, falsifiable) = self.split_closure()?;
            debug!(
                k = self.k,
                inductive = unfalsifiable.len(),
                cti = falsifiable.len(),
                "split-closure done"
            );
            let k = self.k;
            self.optimistics
                .extend(unfalsifiable.into_iter().map(|prop| (prop, k)));
            self.unknowns = falsifiable;
            self.k += 1;
        }
    }

    /// Drops every property whose status became terminal upstream.
    fn drop_resolved(&mut self) {
        let sys = &self.sys;
        let decided = |name: &str| {
            sys.prop_status(name)
                .map(PropStatus::is_decided)
                .unwrap_or(true)
        };
        self.unknowns.retain(|prop| !decided(&prop.name));
        self.optimistics.retain(|(prop, _)| !decided(&prop.name));
    }

    /// Moves every optimistic property back into the unknowns.
    fn demote_optimistics(&mut self) {
        let demoted = self.optimistics.drain(..).map(|(prop, _)| prop);
        self.unknowns.extend(demoted)
    }

    /// Asserts fresh invariants at all covered offsets, then raises the
    /// invariant bound to the current step.
    fn assert_invariants(&mut self, fresh: Vec<Term>) -> Res<()> {
        for inv in &fresh {
            for offset in 0..=self.inv_bound {
                let bumped = self.terms.bump(inv, offset);
                self.solver.assert(&bumped)?
            }
        }
        self.invariants.extend(fresh);

        while self.inv_bound < self.k {
            self.inv_bound += 1;
            for inv in &self.invariants {
                let bumped = self.terms.bump(inv, self.inv_bound);
                self.solver.assert(&bumped)?
            }
        }
        Ok(())
    }

    /// Declares missing offsets and asserts the missing transition links so
    /// the system is unrolled to the current step.
    fn unroll_to_k(&mut self) -> Res<()> {
        while self.unrolled < self.k {
            let next = self.unrolled + 1;
            self.solver
                .define_and_declare_of_bounds(&self.sys, next, next)?;
            self.solver
                .assert(&self.sys.trans_of_bound(&self.terms, next))?;
            self.unrolled = next
        }
        Ok(())
    }

    /// Asserts the gated implications `actlit(φ) ⇒ φ@i` for every candidate
    /// and every offset not covered yet, up to `k - 1`.
    fn assert_props_to_k(&mut self) -> Res<()> {
        let lo = match self.prop_bound {
            Some(bound) if bound + 1 > self.k - 1 => return Ok(()),
            Some(bound) => bound + 1,
            None => 0,
        };
        for offset in lo..=(self.k - 1) {
            for prop in self.unknowns.iter().chain(self.optimistics.iter().map(|(p, _)| p)) {
                let bumped = self.terms.bump(&prop.term, offset);
                self.solver.assert_gated(&prop.actlit, &bumped)?
            }
        }
        self.prop_bound = Some(self.k - 1);
        Ok(())
    }

    /// The assumption set of a closure query: canonical actlits of every
    /// candidate, plus the query's fresh literal.
    fn assumptions(&self, fresh: &Actlit) -> Vec<Actlit> {
        let mut assumptions: Vec<Actlit> = self
            .unknowns
            .iter()
            .map(|prop| prop.actlit.clone())
            .chain(self.optimistics.iter().map(|(prop, _)| prop.actlit.clone()))
            .collect();
        assumptions.push(fresh.clone());
        assumptions
    }

    /// Splits the unknowns into properties unfalsifiable at step `k` and
    /// properties with a counterexample to induction.
    ///
    /// Iterates: negate the conjunction of the remaining unknowns at `k`
    /// (under the optimistic hypotheses), guard it with a fresh actlit and
    /// check. A sat answer either triggers path compression (same guard,
    /// tightened search) or moves the candidates the model falsifies out of
    /// the closure; unsat means every remaining candidate is inductive.
    fn split_closure(&mut self) -> Res<(Vec<PropHandle>, Vec<PropHandle>)> {
        let k = self.k;
        let mut falsifiable: Vec<PropHandle> = vec![];

        'closure: loop {
            if self.unknowns.is_empty() {
                return Ok((vec![], falsifiable));
            }

            let negated = {
                let candidates = self
                    .unknowns
                    .iter()
                    .map(|prop| self.terms.bump(&prop.term, k))
                    .collect();
                self.terms.not(self.terms.and(candidates))
            };
            let optimism = {
                let hypotheses = self
                    .optimistics
                    .iter()
                    .map(|(prop, _)| self.terms.bump(&prop.term, k))
                    .collect();
                self.terms.and(hypotheses)
            };

            let fresh = self.actlits.fresh();
            self.solver.declare_actlit(&fresh)?;
            self.solver
                .assert_gated(&fresh, &self.terms.and(vec![negated, optimism]))?;
            let assumptions = self.assumptions(&fresh);

            'query: loop {
                if !self.solver.check_sat_assuming(&assumptions)? {
                    // Closure is unfalsifiable at `k`.
                    let unfalsifiable = std::mem::take(&mut self.unknowns);
                    return Ok((unfalsifiable, falsifiable));
                }

                let model = self.solver.assignment()?;

                let constraints = self.compress.constraints(&self.terms, &model, k);
                if !constraints.is_empty() {
                    self.solver.comment("compressing lasso-shaped step path")?;
                    self.solver.assert(&self.terms.and(constraints))?;
                    // The guard is unchanged, only the search got tighter.
                    continue 'query;
                }

                let mut kept = Vec::with_capacity(self.unknowns.len());
                let mut moved = false;
                for prop in std::mem::take(&mut self.unknowns) {
                    let at_k = self.terms.bump(&prop.term, k);
                    let value = self
                        .terms
                        .eval(&at_k, &model)
                        .chain_err(|| format!("while evaluating `{}` at {}", prop.name, k))?;
                    if value.is_false() {
                        debug!(prop = %prop.name, k, "counterexample to induction");
                        falsifiable.push(prop);
                        moved = true
                    } else {
                        kept.push(prop)
                    }
                }
                self.unknowns = kept;

                if !moved {
                    // The model falsifies the closure but no candidate:
                    // structurally impossible.
                    bail!(ErrorKind::Inconsistency(
                        "step model falsifies no candidate".into()
                    ))
                }
                continue 'closure;
            }
        }
    }

    /// Confirmation phase: wait for the companion BMC to certify the base
    /// cases of every optimistic property.
    ///
    /// A property promoted at step `p` is `Invariant` once its status
    /// reaches `KTrue(p - 1)`. A falsification arriving here taints the
    /// remaining optimism and backtracks instead.
    fn confirm(&mut self) -> Res<Confirm> {
        info!(
            k = self.k,
            pending = self.optimistics.len(),
            "all candidates inductive, awaiting base-case confirmation"
        );
        loop {
            let events = self.link.recv();
            let diff = event::update_trans_sys(&mut self.sys, events)?;
            self.assert_invariants(diff.invariants)?;

            if !diff.falsifieds.is_empty() {
                self.drop_resolved();
                if !self.optimistics.is_empty() {
                    self.demote_optimistics();
                }
                if self.k > 1 {
                    self.k -= 1
                }
                return Ok(Confirm::Tainted);
            }
            self.drop_resolved();

            let mut pending = Vec::with_capacity(self.optimistics.len());
            for (prop, promoted_at) in self.optimistics.drain(..) {
                let confirmed = match self.sys.prop_status(&prop.name) {
                    Some(PropStatus::KTrue(base)) => base + 1 >= promoted_at,
                    _ => false,
                };
                if confirmed {
                    info!(prop = %prop.name, promoted_at, "confirmed invariant");
                    self.link
                        .prop_status(&mut self.sys, &prop.name, PropStatus::Invariant)?;
                } else {
                    pending.push((prop, promoted_at))
                }
            }
            self.optimistics = pending;

            if self.optimistics.is_empty() {
                return Ok(Confirm::Done);
            }
            std::thread::sleep(CONFIRM_NAP)
        }
    }
}
