//! Measurement and collapse of sparse registers.
//!
//! Whole-register sampling walks the slot array once, subtracting each
//! slot's probability from a uniform draw until it is used up. Single-qubit
//! collapse picks a branch by its probability, discards the slots of the
//! other branch, and renormalizes the survivors; the measured qubit is
//! excised from the basis-state labels unless the caller asks to keep it.

use num_complex::Complex64 as C64;
use rand::Rng;
use crate::{
    error::Result,
    register::{ Register, prob },
    sim::{ Op, Sim },
};

/// Result of measuring a single qubit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Zero,
    One,
}

impl Outcome {
    /// Return `true` for [`Self::One`].
    pub fn is_one(self) -> bool { self == Self::One }

    /// The measured bit value, 0 or 1.
    pub fn bit(self) -> u64 {
        match self {
            Self::Zero => 0,
            Self::One => 1,
        }
    }
}

impl From<Outcome> for u64 {
    fn from(outcome: Outcome) -> Self { outcome.bit() }
}

impl Register {
    /// Sample a basis state from the register's probability distribution
    /// without disturbing it.
    ///
    /// Returns `None` when the total probability is exhausted before the
    /// draw is covered, which can only happen on an empty or badly
    /// denormalized register.
    pub fn sample<R>(&self, sim: &mut Sim<R>) -> Option<u64>
    where R: Rng
    {
        if sim.intercept(&Op::Measure) { return Some(0); }
        let mut rem: f64 = sim.rng().gen::<f64>();
        self.slots.iter()
            .find(|s| {
                rem -= prob(s.amp);
                rem <= 0.0
            })
            .map(|s| s.state)
    }

    /// Measure qubit `pos` and collapse onto the observed branch, removing
    /// the qubit from the register (width shrinks by one).
    pub fn collapse_bit<R>(&mut self, pos: usize, sim: &mut Sim<R>)
        -> Result<Outcome>
    where R: Rng
    {
        self.check_bit(pos)?;
        if sim.intercept(&Op::CollapseBit { target: pos }) {
            return Ok(Outcome::Zero);
        }
        let outcome = self.draw_bit(pos, sim);
        self.project_out(pos, outcome, true);
        Ok(outcome)
    }

    /// Measure qubit `pos` and collapse onto the observed branch, keeping
    /// the (now classical) qubit in place.
    pub fn collapse_bit_preserving<R>(&mut self, pos: usize, sim: &mut Sim<R>)
        -> Result<Outcome>
    where R: Rng
    {
        self.check_bit(pos)?;
        if sim.intercept(&Op::CollapseBitPreserve { target: pos }) {
            return Ok(Outcome::Zero);
        }
        let outcome = self.draw_bit(pos, sim);
        self.project_out(pos, outcome, false);
        Ok(outcome)
    }

    /// Project onto a chosen branch of qubit `pos` without sampling,
    /// returning the (renormalized, one-qubit-narrower) branch register and
    /// leaving `self` untouched.
    ///
    /// A branch of zero probability yields an empty register.
    pub fn project_bit(&self, pos: usize, outcome: Outcome) -> Result<Self> {
        self.check_bit(pos)?;
        let mut branch = self.clone();
        // the branch shares the parent's index table; each holder rebuilds
        // it for its own slots before trusting it
        branch.index = self.index.clone();
        branch.project_out(pos, outcome, true);
        Ok(branch)
    }

    // Draw an outcome for qubit `pos` from its marginal distribution.
    fn draw_bit<R>(&self, pos: usize, sim: &mut Sim<R>) -> Outcome
    where R: Rng
    {
        let pb: u64 = 1 << pos;
        let p0: f64 = self.slots.iter()
            .filter(|s| s.state & pb == 0)
            .map(|s| prob(s.amp))
            .sum();
        if sim.rng().gen::<f64>() > p0 { Outcome::One } else { Outcome::Zero }
    }

    // Keep only the slots on the `outcome` branch of qubit `pos`,
    // renormalize by the branch probability, and optionally excise the bit
    // from the basis-state labels.
    fn project_out(&mut self, pos: usize, outcome: Outcome, remove_bit: bool) {
        let pb: u64 = 1 << pos;
        let keep_set = outcome.is_one();
        self.slots.retain(|s| (s.state & pb != 0) == keep_set);
        let d: f64 = self.slots.iter().map(|s| prob(s.amp)).sum();
        if d > 0.0 {
            let norm = C64::from(1.0 / d.sqrt());
            for s in self.slots.iter_mut() { s.amp *= norm; }
        }
        if remove_bit {
            let low = pb - 1;
            for s in self.slots.iter_mut() {
                s.state = ((s.state >> pos >> 1) << pos) | (s.state & low);
            }
            self.width -= 1;
        }
        self.mark_index_dirty();
    }
}
