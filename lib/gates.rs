//! Gate application on sparse registers.
//!
//! All gates mutate the register in place and run inside a
//! [`Sim`][crate::sim::Sim] context, which supplies randomness for the
//! decoherence epilogue, counts gates, and hosts the optional interception
//! hook. Bit-permutation gates (flips, swaps) touch only the basis-state
//! labels; the general single-qubit unitary [`Register::apply1`] is the one
//! place where basis states are born and die.
//!
//! Conventions follow the usual circuit-model matrices with qubit `j` at
//! bit `j`:
//!
//! ∣q_{w-1} … q_1 q_0⟩
//!
//! so e.g. `cnot(1, 0)` flips qubit 0 when qubit 1 is set.

use std::f64::consts::{ FRAC_1_SQRT_2, PI };
use nalgebra as na;
use num_complex::Complex64 as C64;
use once_cell::sync::Lazy;
use rand::Rng;
use crate::{
    error::{ Error, Result },
    register::{ Register, Slot },
    sim::{ Op, Sim },
};

/// Hadamard matrix, (1/√2) [[1, 1], [1, -1]].
pub static HADAMARD: Lazy<na::Matrix2<C64>> = Lazy::new(|| {
    let h = C64::from(FRAC_1_SQRT_2);
    na::Matrix2::new(
        h,  h,
        h, -h,
    )
});

/// Walsh matrix, (i/√2) [[1, 1], [1, -1]]; a Hadamard with a global i.
pub static WALSH: Lazy<na::Matrix2<C64>> = Lazy::new(|| {
    let h = C64::i() * FRAC_1_SQRT_2;
    na::Matrix2::new(
        h,  h,
        h, -h,
    )
});

impl Register {
    /// Controlled NOT: flip `target` on every basis state where `control`
    /// is set.
    pub fn cnot<R>(&mut self, control: usize, target: usize, sim: &mut Sim<R>)
        -> Result<()>
    where R: Rng
    {
        self.check_bit(control)?;
        self.check_bit(target)?;
        if sim.intercept(&Op::Cnot { control, target }) { return Ok(()); }
        let cb: u64 = 1 << control;
        let tb: u64 = 1 << target;
        for s in self.slots.iter_mut() {
            if s.state & cb != 0 { s.state ^= tb; }
        }
        self.mark_index_dirty();
        sim.decohere(self);
        Ok(())
    }

    /// Toffoli: flip `target` on every basis state where both controls are
    /// set.
    pub fn toffoli<R>(
        &mut self,
        control1: usize,
        control2: usize,
        target: usize,
        sim: &mut Sim<R>,
    ) -> Result<()>
    where R: Rng
    {
        self.check_bit(control1)?;
        self.check_bit(control2)?;
        self.check_bit(target)?;
        if sim.intercept(&Op::Toffoli { control1, control2, target }) {
            return Ok(());
        }
        let cb: u64 = (1 << control1) | (1 << control2);
        let tb: u64 = 1 << target;
        for s in self.slots.iter_mut() {
            if s.state & cb == cb { s.state ^= tb; }
        }
        self.mark_index_dirty();
        sim.decohere(self);
        Ok(())
    }

    /// Pauli X: flip `target` on every basis state.
    pub fn sigma_x<R>(&mut self, target: usize, sim: &mut Sim<R>) -> Result<()>
    where R: Rng
    {
        self.check_bit(target)?;
        if sim.intercept(&Op::SigmaX { target }) { return Ok(()); }
        let tb: u64 = 1 << target;
        for s in self.slots.iter_mut() { s.state ^= tb; }
        self.mark_index_dirty();
        sim.decohere(self);
        Ok(())
    }

    /// Pauli Y: flip `target` and multiply by ±i according to the flipped
    /// value.
    pub fn sigma_y<R>(&mut self, target: usize, sim: &mut Sim<R>) -> Result<()>
    where R: Rng
    {
        self.check_bit(target)?;
        if sim.intercept(&Op::SigmaY { target }) { return Ok(()); }
        let tb: u64 = 1 << target;
        for s in self.slots.iter_mut() {
            s.state ^= tb;
            s.amp *= if s.state & tb != 0 { C64::i() } else { -C64::i() };
        }
        self.mark_index_dirty();
        sim.decohere(self);
        Ok(())
    }

    /// Pauli Z: negate the amplitude of every basis state where `target` is
    /// set.
    pub fn sigma_z<R>(&mut self, target: usize, sim: &mut Sim<R>) -> Result<()>
    where R: Rng
    {
        self.check_bit(target)?;
        if sim.intercept(&Op::SigmaZ { target }) { return Ok(()); }
        let tb: u64 = 1 << target;
        for s in self.slots.iter_mut() {
            if s.state & tb != 0 { s.amp = -s.amp; }
        }
        sim.decohere(self);
        Ok(())
    }

    /// Swap the two lowest `block`-qubit groups by relabeling basis states.
    ///
    /// Pure bookkeeping: no amplitude changes and no decoherence epilogue.
    pub fn swap_leads<R>(&mut self, block: usize, sim: &mut Sim<R>)
        -> Result<()>
    where R: Rng
    {
        if 2 * block > self.width {
            return Err(Error::OutOfRange { bit: 2 * block - 1, width: self.width });
        }
        if sim.intercept(&Op::SwapLeads { block }) { return Ok(()); }
        if block == 0 { return Ok(()); }
        let mask: u64 = (1 << block) - 1;
        for s in self.slots.iter_mut() {
            let lo = s.state & mask;
            let hi = (s.state >> block) & mask;
            s.state = (s.state & !(mask | (mask << block))) | hi | (lo << block);
        }
        self.mark_index_dirty();
        Ok(())
    }

    /// General single-qubit unitary on `target`.
    ///
    /// Each slot is paired with its partner across the target bit and the
    /// 2×2 product is applied to the pair. Partnerless slots spawn their
    /// partner only when the relevant off-diagonal entry of `m` is nonzero,
    /// so diagonal matrices never grow the register; slots whose amplitude
    /// lands on exact zero are compacted away afterward.
    pub fn apply1<R>(
        &mut self,
        target: usize,
        m: &na::Matrix2<C64>,
        sim: &mut Sim<R>,
    ) -> Result<()>
    where R: Rng
    {
        self.check_bit(target)?;
        if sim.intercept(&Op::Unitary1 { target, matrix: *m }) {
            return Ok(());
        }
        let zero = C64::from(0.0);
        let tb: u64 = 1 << target;
        self.rebuild_index()?;
        let n = self.slots.len();

        // first pass: count the partner slots that will be born
        let mut grow = 0_usize;
        for s in self.slots.iter() {
            let off = if s.state & tb != 0 { m[(0, 1)] } else { m[(1, 0)] };
            if off != zero && self.lookup(s.state ^ tb).is_none() { grow += 1; }
        }
        self.slots.reserve(grow);

        let mut done = vec![false; n];
        for i in 0..n {
            if done[i] { continue; }
            let s = self.slots[i];
            let set = s.state & tb != 0;
            let partner = self.lookup(s.state ^ tb);
            let t = s.amp;
            let tnot = partner.map(|j| self.slots[j].amp).unwrap_or(zero);
            self.slots[i].amp =
                if set { m[(1, 0)] * tnot + m[(1, 1)] * t }
                else { m[(0, 0)] * t + m[(0, 1)] * tnot };
            match partner {
                Some(j) => {
                    self.slots[j].amp =
                        if set { m[(0, 0)] * tnot + m[(0, 1)] * t }
                        else { m[(1, 0)] * t + m[(1, 1)] * tnot };
                    done[j] = true;
                }
                None => {
                    let off = if set { m[(0, 1)] } else { m[(1, 0)] };
                    if off != zero {
                        self.slots.push(Slot { state: s.state ^ tb, amp: off * t });
                    }
                }
            }
            done[i] = true;
        }
        debug_assert_eq!(self.slots.len(), n + grow);

        self.slots.retain(|s| s.amp != zero);
        self.mark_index_dirty();
        sim.decohere(self);
        Ok(())
    }

    /// Hadamard on `target`.
    pub fn hadamard<R>(&mut self, target: usize, sim: &mut Sim<R>) -> Result<()>
    where R: Rng
    {
        self.apply1(target, &HADAMARD, sim)
    }

    /// Walsh–Hadamard on `target` (Hadamard with a global phase of i).
    pub fn walsh<R>(&mut self, target: usize, sim: &mut Sim<R>) -> Result<()>
    where R: Rng
    {
        self.apply1(target, &WALSH, sim)
    }

    /// Rotation about X by `gamma`.
    pub fn r_x<R>(&mut self, target: usize, gamma: f64, sim: &mut Sim<R>)
        -> Result<()>
    where R: Rng
    {
        let c = C64::from((gamma / 2.0).cos());
        let s = -C64::i() * (gamma / 2.0).sin();
        self.apply1(target, &na::Matrix2::new(c, s, s, c), sim)
    }

    /// Rotation about Y by `gamma`.
    pub fn r_y<R>(&mut self, target: usize, gamma: f64, sim: &mut Sim<R>)
        -> Result<()>
    where R: Rng
    {
        let c = C64::from((gamma / 2.0).cos());
        let s = C64::from((gamma / 2.0).sin());
        self.apply1(target, &na::Matrix2::new(c, -s, s, c), sim)
    }

    /// Rotation about Z by `gamma`: phase e^{±iγ/2} by the value of
    /// `target`.
    pub fn r_z<R>(&mut self, target: usize, gamma: f64, sim: &mut Sim<R>)
        -> Result<()>
    where R: Rng
    {
        self.check_bit(target)?;
        if sim.intercept(&Op::RotZ { target, gamma }) { return Ok(()); }
        let tb: u64 = 1 << target;
        let z = C64::cis(gamma / 2.0);
        for s in self.slots.iter_mut() {
            s.amp *= if s.state & tb != 0 { z } else { z.conj() };
        }
        sim.decohere(self);
        Ok(())
    }

    /// Global phase e^{iγ} on every amplitude.
    ///
    /// `target` does not affect the result; it is carried so interceptors
    /// see which qubit the caller associated with the phase.
    pub fn phase_scale<R>(&mut self, target: usize, gamma: f64, sim: &mut Sim<R>)
        -> Result<()>
    where R: Rng
    {
        self.check_bit(target)?;
        if sim.intercept(&Op::PhaseScale { target, gamma }) { return Ok(()); }
        let z = C64::cis(gamma);
        for s in self.slots.iter_mut() { s.amp *= z; }
        sim.decohere(self);
        Ok(())
    }

    /// Phase e^{iγ} on every basis state where `target` is set.
    pub fn phase_kick<R>(&mut self, target: usize, gamma: f64, sim: &mut Sim<R>)
        -> Result<()>
    where R: Rng
    {
        self.check_bit(target)?;
        if sim.intercept(&Op::PhaseKick { target, gamma }) { return Ok(()); }
        let tb: u64 = 1 << target;
        let z = C64::cis(gamma);
        for s in self.slots.iter_mut() {
            if s.state & tb != 0 { s.amp *= z; }
        }
        sim.decohere(self);
        Ok(())
    }

    fn cond_phase_by<R>(
        &mut self,
        control: usize,
        target: usize,
        gamma: f64,
        sim: &mut Sim<R>,
    ) -> Result<()>
    where R: Rng
    {
        let mask: u64 = (1 << control) | (1 << target);
        let z = C64::cis(gamma);
        for s in self.slots.iter_mut() {
            if s.state & mask == mask { s.amp *= z; }
        }
        sim.decohere(self);
        Ok(())
    }

    /// Conditional phase e^{iπ/2^{control−target}} when both qubits are
    /// set, as used in the quantum Fourier transform. Requires
    /// `control ≥ target`.
    pub fn cond_phase<R>(&mut self, control: usize, target: usize, sim: &mut Sim<R>)
        -> Result<()>
    where R: Rng
    {
        self.check_bit(control)?;
        self.check_bit(target)?;
        if control < target {
            return Err(Error::ControlOrder { control, target });
        }
        if sim.intercept(&Op::CondPhase { control, target }) { return Ok(()); }
        let gamma = PI / (1_u64 << (control - target)) as f64;
        self.cond_phase_by(control, target, gamma, sim)
    }

    /// Inverse of [`Register::cond_phase`].
    pub fn cond_phase_inv<R>(
        &mut self,
        control: usize,
        target: usize,
        sim: &mut Sim<R>,
    ) -> Result<()>
    where R: Rng
    {
        self.check_bit(control)?;
        self.check_bit(target)?;
        if control < target {
            return Err(Error::ControlOrder { control, target });
        }
        if sim.intercept(&Op::CondPhaseInv { control, target }) {
            return Ok(());
        }
        let gamma = -PI / (1_u64 << (control - target)) as f64;
        self.cond_phase_by(control, target, gamma, sim)
    }

    /// Conditional phase e^{iγ} when both qubits are set.
    pub fn cond_phase_kick<R>(
        &mut self,
        control: usize,
        target: usize,
        gamma: f64,
        sim: &mut Sim<R>,
    ) -> Result<()>
    where R: Rng
    {
        self.check_bit(control)?;
        self.check_bit(target)?;
        if sim.intercept(&Op::CondPhaseKick { control, target, gamma }) {
            return Ok(());
        }
        self.cond_phase_by(control, target, gamma, sim)
    }
}
