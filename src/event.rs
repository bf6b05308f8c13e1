//! Event interface between engines.
//!
//! Engines run concurrently with companion techniques (BMC, invariant
//! generation) and exchange two kinds of messages: system-level invariants
//! learned along the way, and property status transitions. Each engine owns
//! a [`Link`], polls it non-blockingly at the top of its loop, and publishes
//! its own conclusions through it.
//!
//! [`update_trans_sys`] applies a batch of received events to an engine's
//! copy of the transition system and distills what the engine cares about:
//! fresh invariants, newly proven properties, newly falsified properties.

crate::prelude!();

use crossbeam_channel::{unbounded, Receiver, Sender};

use term::Term;
use trans::{PropStatus, Sys};

/// A message on the event bus.
#[derive(Debug, Clone)]
pub enum Msg {
    /// System-level invariants over offset `0`.
    Invariants(Vec<Term>),
    /// A property status transition.
    Status {
        /// Property name.
        prop: String,
        /// New status.
        status: PropStatus,
    },
}

/// One endpoint of the event bus.
///
/// Receiving never blocks: [`Link::recv`] drains whatever is available and
/// returns immediately.
pub struct Link {
    /// Outgoing messages.
    tx: Sender<Msg>,
    /// Incoming messages.
    rx: Receiver<Msg>,
}
impl Link {
    /// A pair of connected endpoints.
    ///
    /// What one endpoint sends, the other receives. Typically one end goes
    /// to an engine and the other to the driver, which routes messages
    /// between engines.
    pub fn pair() -> (Link, Link) {
        let (tx_1, rx_1) = unbounded();
        let (tx_2, rx_2) = unbounded();
        (
            Link { tx: tx_1, rx: rx_2 },
            Link { tx: tx_2, rx: rx_1 },
        )
    }

    /// Drains all pending messages, never blocks.
    pub fn recv(&self) -> Vec<Msg> {
        let mut msgs = vec![];
        while let Ok(msg) = self.rx.try_recv() {
            msgs.push(msg)
        }
        msgs
    }

    /// Sends a message.
    pub fn send(&self, msg: Msg) -> Res<()> {
        self.tx
            .send(msg)
            .map_err(|_| Error::from("event channel disconnected"))
    }

    /// Publishes a status transition for a property.
    ///
    /// Applies the transition to the local system first; nothing is sent if
    /// the transition is a no-op (status downgrades are dropped by the
    /// monotonicity rules).
    pub fn prop_status(&self, sys: &mut Sys, prop: &str, status: PropStatus) -> Res<()> {
        let changed = sys.apply_status(prop, status.clone())?;
        if changed {
            self.send(Msg::Status {
                prop: prop.to_string(),
                status,
            })?
        }
        Ok(())
    }
}

/// What a batch of events boils down to for an engine.
#[derive(Debug, Clone, Default)]
pub struct Diff {
    /// Invariants received, over offset `0`.
    pub invariants: Vec<Term>,
    /// Properties that just became `Invariant`.
    pub valids: Vec<String>,
    /// Properties that just became `Falsified`.
    pub falsifieds: Vec<String>,
}
impl Diff {
    /// True if nothing happened.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty() && self.valids.is_empty() && self.falsifieds.is_empty()
    }
}

/// Applies a batch of events to a system.
///
/// Status updates go through the monotone transition rules of
/// [`PropStatus::update`]; only *effective* transitions are reported in the
/// resulting [`Diff`].
pub fn update_trans_sys(sys: &mut Sys, events: Vec<Msg>) -> Res<Diff> {
    let mut diff = Diff::default();
    for msg in events {
        match msg {
            Msg::Invariants(terms) => diff.invariants.extend(terms),
            Msg::Status { prop, status } => {
                let changed = sys.apply_status(&prop, status.clone())?;
                if changed {
                    match status {
                        PropStatus::Invariant => diff.valids.push(prop),
                        PropStatus::Falsified(_) => diff.falsifieds.push(prop),
                        PropStatus::Unknown | PropStatus::KTrue(_) => (),
                    }
                }
            }
        }
    }
    Ok(diff)
}
