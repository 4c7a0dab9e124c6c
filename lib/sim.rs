//! Simulation context: randomness, decoherence, gate counting, and the
//! operation interception hook.
//!
//! Every gate and measurement call takes a `&mut Sim<R>`. The context owns
//! the RNG (so runs are reproducible with a seeded generator), the
//! decoherence strength λ, a counter of logical gates applied, and an
//! optional [`Tap`] that sees each operation before the engine runs it and
//! may claim it.
//!
//! The decoherence model is collective dephasing: after each gate, one
//! Gaussian phase angle is drawn per qubit with variance 2λ, and every slot
//! picks up the sum of ±angle/2 over its qubits' values as a single phase
//! rotation. Probabilities are untouched; only coherences decay.

use nalgebra as na;
use num_complex::Complex64 as C64;
use rand::Rng;
use crate::register::Register;

/// One gate or measurement operation, as seen by a [`Tap`].
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Cnot { control: usize, target: usize },
    Toffoli { control1: usize, control2: usize, target: usize },
    SigmaX { target: usize },
    SigmaY { target: usize },
    SigmaZ { target: usize },
    SwapLeads { block: usize },
    Unitary1 { target: usize, matrix: na::Matrix2<C64> },
    RotZ { target: usize, gamma: f64 },
    PhaseScale { target: usize, gamma: f64 },
    PhaseKick { target: usize, gamma: f64 },
    CondPhase { control: usize, target: usize },
    CondPhaseInv { control: usize, target: usize },
    CondPhaseKick { control: usize, target: usize, gamma: f64 },
    Measure,
    CollapseBit { target: usize },
    CollapseBitPreserve { target: usize },
}

/// Interception hook for gate and measurement operations.
///
/// The engine calls [`Tap::intercept`] with each operation before running
/// it. Returning `true` claims the operation: the engine skips its own body
/// and hands back a neutral result (`Ok(())` for gates, a zero placeholder
/// for measurements). Recorders that only want to observe return `false`.
pub trait Tap {
    fn intercept(&mut self, op: &Op) -> bool;
}

/// Simulation context threaded through every gate and measurement.
pub struct Sim<R> {
    rng: R,
    lambda: f64,
    gates: u64,
    tap: Option<Box<dyn Tap>>,
}

impl Sim<rand::rngs::ThreadRng> {
    /// Create a context over the thread-local RNG, with decoherence
    /// disabled and no tap.
    pub fn new() -> Self { Self::with_rng(rand::thread_rng()) }
}

impl Default for Sim<rand::rngs::ThreadRng> {
    fn default() -> Self { Self::new() }
}

impl<R> Sim<R>
where R: Rng
{
    /// Create a context over a caller-supplied RNG, with decoherence
    /// disabled and no tap.
    pub fn with_rng(rng: R) -> Self {
        Self { rng, lambda: 0.0, gates: 0, tap: None }
    }

    /// Access the RNG.
    pub fn rng(&mut self) -> &mut R { &mut self.rng }

    /// Set the decoherence strength λ; zero disables the model. Negative
    /// values are clamped to zero.
    pub fn set_decoherence(&mut self, lambda: f64) {
        self.lambda = lambda.max(0.0);
    }

    /// The current decoherence strength λ.
    pub fn decoherence(&self) -> f64 { self.lambda }

    /// Number of logical gates applied under this context.
    pub fn gate_count(&self) -> u64 { self.gates }

    /// Reset the gate counter to zero.
    pub fn reset_gate_count(&mut self) { self.gates = 0; }

    /// Install an interception hook, replacing any previous one.
    pub fn set_tap(&mut self, tap: Box<dyn Tap>) { self.tap = Some(tap); }

    /// Remove and return the interception hook.
    pub fn take_tap(&mut self) -> Option<Box<dyn Tap>> { self.tap.take() }

    pub(crate) fn intercept(&mut self, op: &Op) -> bool {
        self.tap.as_mut().map_or(false, |t| t.intercept(op))
    }

    // Standard normal deviate, polar Box–Muller with rejection on the unit
    // disk.
    fn gauss(&mut self) -> f64 {
        loop {
            let u: f64 = 2.0 * self.rng.gen::<f64>() - 1.0;
            let v: f64 = 2.0 * self.rng.gen::<f64>() - 1.0;
            let s = u * u + v * v;
            if s > 0.0 && s < 1.0 {
                return u * (-2.0 * s.ln() / s).sqrt();
            }
        }
    }

    // Decoherence epilogue, run once per logical gate. Always ticks the
    // gate counter; applies phase noise only when λ > 0.
    pub(crate) fn decohere(&mut self, reg: &mut Register) {
        self.gates += 1;
        if self.lambda == 0.0 { return; }
        let scale = (2.0 * self.lambda).sqrt();
        let angles: Vec<f64> = (0..reg.width())
            .map(|_| self.gauss() * scale)
            .collect();
        for s in reg.slots.iter_mut() {
            let theta: f64 = angles.iter().enumerate()
                .map(|(j, a)| if s.state >> j & 1 == 1 { *a } else { -*a })
                .sum::<f64>() / 2.0;
            s.amp *= C64::cis(theta);
        }
    }
}
