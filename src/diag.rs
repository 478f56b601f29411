// src/diag.rs
//
// Warnings are input-consistency findings the computation survives. They go
// to a caller-supplied sink instead of straight to stderr, so a fit loop
// evaluating thousands of probe sites can stay quiet while a debugging run
// prints everything.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Non-fatal findings reported during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// |Re FC| and |Im FC| of one atom disagree beyond tolerance: the
    /// structure is not a circular helix and the staggered moment is taken
    /// from the real part.
    MomentMismatch {
        atom: usize,
        real_norm: f64,
        imag_norm: f64,
    },
    /// Re FC and Im FC of one atom are not orthogonal beyond tolerance.
    NonOrthogonalHelix { atom: usize, dot: f64 },
    /// A non-negligible per-atom phase offset is in use.
    UntestedPhase { atom: usize, phase: f64 },
    /// The cosine and sine contact selectors disagree on a kept distance;
    /// the slot is skipped.
    ContactRankMismatch {
        slot: usize,
        cos_rank: f64,
        sin_rank: f64,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MomentMismatch {
                atom,
                real_norm,
                imag_norm,
            } => write!(
                f,
                "atom {atom}: staggered moment differs between real ({real_norm:.6}) and imaginary ({imag_norm:.6}) parts"
            ),
            Warning::NonOrthogonalHelix { atom, dot } => write!(
                f,
                "atom {atom}: real and imaginary Fourier parts are not orthogonal (dot = {dot:.3e})"
            ),
            Warning::UntestedPhase { atom, phase } => write!(
                f,
                "atom {atom}: non-zero phase offset {phase} in use, check results carefully"
            ),
            Warning::ContactRankMismatch {
                slot,
                cos_rank,
                sin_rank,
            } => write!(
                f,
                "contact slot {slot}: selector ranks disagree (cos {cos_rank:e}, sin {sin_rank:e}), slot skipped"
            ),
        }
    }
}

/// Receives warnings as they are found. Implementations must be `Sync`: the
/// contact cross-check runs while the dipolar section is still writing.
pub trait WarningSink: Sync {
    fn warn(&self, warning: Warning);
}

/// Discards every warning.
#[derive(Debug, Default)]
pub struct NullSink;

impl WarningSink for NullSink {
    fn warn(&self, _warning: Warning) {}
}

/// Prints each warning to stderr as a tagged line.
#[derive(Debug, Default)]
pub struct StderrSink;

impl WarningSink for StderrSink {
    fn warn(&self, warning: Warning) {
        eprintln!("[locfield] warning: {warning}");
    }
}

/// Buffers warnings for later inspection.
#[derive(Debug, Default)]
pub struct CollectSink {
    warnings: Mutex<Vec<Warning>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything collected so far.
    pub fn take(&self) -> Vec<Warning> {
        std::mem::take(&mut *self.warnings.lock().expect("CollectSink mutex poisoned"))
    }
}

impl WarningSink for CollectSink {
    fn warn(&self, warning: Warning) {
        self.warnings
            .lock()
            .expect("CollectSink mutex poisoned")
            .push(warning);
    }
}

/// Forwards to an inner sink while counting, so the run report can state how
/// many warnings were raised.
pub(crate) struct CountingSink<'a> {
    inner: &'a dyn WarningSink,
    count: AtomicUsize,
}

impl<'a> CountingSink<'a> {
    pub(crate) fn new(inner: &'a dyn WarningSink) -> Self {
        Self {
            inner,
            count: AtomicUsize::new(0),
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

impl WarningSink for CountingSink<'_> {
    fn warn(&self, warning: Warning) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.inner.warn(warning);
    }
}
