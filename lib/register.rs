//! Quantum registers held as sparse vectors of complex basis-state
//! amplitudes.
//!
//! A register of `width` qubits lives in a 2<sup>width</sup>-dimensional
//! Hilbert space, but only the basis states carrying nonzero amplitude are
//! stored: each occupies one *slot* of a flat array, and a
//! [`SparseIndex`][crate::index::SparseIndex] hash table accelerates basis
//! state → slot lookups. The full dense vector is never materialized unless
//! explicitly requested through [`Register::to_dense`].
//!
//! Slots are unordered. Operations that change *which* basis states are
//! present (gates, collapse, vector addition) mark the index dirty; it is
//! rebuilt transparently before the next lookup. Registers produced by
//! [`Register::collapse_bit`][crate::measure] chains or by
//! [`Register::project_bit`][crate::measure] may share one index table;
//! each holder rebuilds it for its own slots before trusting it, tracked by
//! the table's rebuild generation.
//!
//! # Example
//! ```
//! use num_complex::Complex64 as C64;
//! use sparse_sim::register::Register;
//!
//! let reg = Register::new(5, 3).unwrap(); // ∣101⟩
//! assert_eq!(reg.len(), 1);
//! assert_eq!(reg.amp(5).unwrap(), C64::from(1.0));
//! assert_eq!(reg.amp(4).unwrap(), C64::from(0.0));
//! ```

use std::{ cell::{ Cell, RefCell }, fmt, rc::Rc };
use itertools::Itertools;
use num_complex::Complex64 as C64;
use crate::{
    error::{ Error, Result },
    index::{ MAX_INDEX_BITS, SparseIndex },
};

/// Widest register that [`Register::to_dense`] and
/// [`Register::from_dense`] will touch.
pub const MAX_DENSE_WIDTH: usize = 30;

/// One basis state and its amplitude.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Slot {
    /// Basis state; bit `j` holds the value of qubit `j`.
    pub state: u64,
    /// Complex amplitude α of ∣state⟩.
    pub amp: C64,
}

/// The probability associated with an amplitude, ∣α∣².
pub fn prob(amp: C64) -> f64 { amp.norm_sqr() }

/// A register of qubits in a sparse superposition of basis states.
#[derive(Debug, PartialEq)]
pub struct Register {
    pub(crate) width: usize,
    pub(crate) slots: Vec<Slot>,
    // `None` is the dense/sequential mode: slot `i` *is* basis state `i`.
    pub(crate) index: Option<Rc<RefCell<SparseIndex>>>,
    // index generation our last rebuild produced; see `ensure_index`
    pub(crate) stamp: Cell<u64>,
}

impl Register {
    fn check_width(width: usize) -> Result<()> {
        if width == 0 || width > 64 {
            return Err(Error::WidthRange { width });
        }
        Ok(())
    }

    // table sizing policy: 4x headroom over a fully dense register
    fn index_bits(width: usize) -> u32 {
        (width as u32 + 2).min(MAX_INDEX_BITS)
    }

    fn fresh_index(width: usize) -> Option<Rc<RefCell<SparseIndex>>> {
        Some(Rc::new(RefCell::new(SparseIndex::new(Self::index_bits(width)))))
    }

    /// Create a register of `width` qubits in the classical basis state
    /// `initval`, with unit amplitude.
    pub fn new(initval: u64, width: usize) -> Result<Self> {
        Self::check_width(width)?;
        if width < 64 && initval >> width != 0 {
            let bit = 63 - initval.leading_zeros() as usize;
            return Err(Error::OutOfRange { bit, width });
        }
        Ok(Self {
            width,
            slots: vec![Slot { state: initval, amp: C64::from(1.0) }],
            index: Self::fresh_index(width),
            stamp: Cell::new(0),
        })
    }

    /// Create a register from a dense state vector of length `2^width`,
    /// keeping one slot per nonzero component.
    pub fn from_dense(vector: &[C64], width: usize) -> Result<Self> {
        Self::check_width(width)?;
        if width > MAX_DENSE_WIDTH {
            return Err(Error::TooLarge { width });
        }
        let dim = 1_usize << width;
        if vector.len() != dim {
            return Err(Error::WidthMismatch { left: vector.len(), right: dim });
        }
        let zero = C64::from(0.0);
        let slots: Vec<Slot> = vector.iter().enumerate()
            .filter(|(_, a)| **a != zero)
            .map(|(j, a)| Slot { state: j as u64, amp: *a })
            .collect();
        Ok(Self { width, slots, index: Self::fresh_index(width), stamp: Cell::new(0) })
    }

    /// Expand to the dense state vector of length `2^width`.
    pub fn to_dense(&self) -> Result<Vec<C64>> {
        if self.width > MAX_DENSE_WIDTH {
            return Err(Error::TooLarge { width: self.width });
        }
        let mut v: Vec<C64> = vec![C64::from(0.0); 1_usize << self.width];
        for s in self.slots.iter() { v[s.state as usize] = s.amp; }
        Ok(v)
    }

    /// Return the number of qubits.
    pub fn width(&self) -> usize { self.width }

    /// Return the number of occupied slots.
    pub fn len(&self) -> usize { self.slots.len() }

    /// Return `true` if no basis state carries amplitude.
    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    /// Return the slots in storage order.
    pub fn slots(&self) -> &[Slot] { &self.slots }

    pub(crate) fn check_bit(&self, bit: usize) -> Result<()> {
        if bit < self.width {
            Ok(())
        } else {
            Err(Error::OutOfRange { bit, width: self.width })
        }
    }

    /// Rebuild the sparse index from the current slots unconditionally.
    pub fn rebuild_index(&self) -> Result<()> {
        if let Some(ix) = &self.index {
            let mut ix = ix.borrow_mut();
            ix.rebuild(&self.slots)?;
            self.stamp.set(ix.generation());
        }
        Ok(())
    }

    // Rebuild the index if it is dirty or was last rebuilt for a different
    // register sharing the same table.
    pub(crate) fn ensure_index(&self) -> Result<()> {
        if let Some(ix) = &self.index {
            let stale = {
                let ix = ix.borrow();
                ix.is_dirty() || ix.generation() != self.stamp.get()
            };
            if stale { self.rebuild_index()?; }
        }
        Ok(())
    }

    pub(crate) fn mark_index_dirty(&self) {
        if let Some(ix) = &self.index { ix.borrow_mut().mark_dirty(); }
    }

    // Index lookup; assumes `ensure_index` has run. In dense/sequential
    // mode the basis state is its own slot number.
    pub(crate) fn lookup(&self, state: u64) -> Option<usize> {
        match &self.index {
            None => (state < self.slots.len() as u64).then_some(state as usize),
            Some(ix) => ix.borrow().lookup(state, &self.slots),
        }
    }

    /// Find the slot holding `state`, if any.
    pub fn slot_of(&self, state: u64) -> Result<Option<usize>> {
        self.ensure_index()?;
        Ok(self.lookup(state))
    }

    /// The amplitude at `state`; zero if the basis state is not present.
    pub fn amp(&self, state: u64) -> Result<C64> {
        Ok(self.slot_of(state)?
            .map(|k| self.slots[k].amp)
            .unwrap_or_else(|| C64::from(0.0)))
    }

    /// Total probability Σ ∣α∣² over all slots.
    pub fn probability(&self) -> f64 {
        self.slots.iter().map(|s| prob(s.amp)).sum()
    }

    /// Rescale all amplitudes so the total probability is 1.
    ///
    /// Does nothing to an empty or all-zero register.
    pub fn normalize(&mut self) {
        let d = self.probability();
        if d > 0.0 {
            let r = C64::from(1.0 / d.sqrt());
            for s in self.slots.iter_mut() { s.amp *= r; }
        }
    }

    /// Multiply every amplitude by `z`.
    pub fn scale(&mut self, z: C64) {
        for s in self.slots.iter_mut() { s.amp *= z; }
    }

    /// Widen the register by `bits` zero-valued scratch qubits at the least
    /// significant end; existing basis states are shifted up.
    pub fn add_scratch(&mut self, bits: usize) -> Result<()> {
        if self.width + bits > 64 {
            return Err(Error::WidthRange { width: self.width + bits });
        }
        self.width += bits;
        for s in self.slots.iter_mut() { s.state <<= bits; }
        self.mark_index_dirty();
        Ok(())
    }

    /// Tensor product ∣self⟩ ⊗ ∣rhs⟩; `rhs` occupies the low bits.
    pub fn kron(&self, rhs: &Self) -> Result<Self> {
        let width = self.width + rhs.width;
        if width > 64 { return Err(Error::WidthRange { width }); }
        let slots: Vec<Slot> = self.slots.iter()
            .cartesian_product(rhs.slots.iter())
            .map(|(a, b)| Slot {
                state: (a.state << rhs.width) | b.state,
                amp: a.amp * b.amp,
            })
            .collect();
        Ok(Self { width, slots, index: Self::fresh_index(width), stamp: Cell::new(0) })
    }

    /// Conjugated inner product ⟨self∣rhs⟩.
    pub fn dot(&self, rhs: &Self) -> Result<C64> {
        if self.width != rhs.width {
            return Err(Error::WidthMismatch { left: self.width, right: rhs.width });
        }
        self.ensure_index()?;
        let mut f = C64::from(0.0);
        for s in rhs.slots.iter() {
            if let Some(k) = self.lookup(s.state) {
                f += self.slots[k].amp.conj() * s.amp;
            }
        }
        Ok(f)
    }

    /// Inner product without conjugation, Σ selfₛ · rhsₛ over shared basis
    /// states.
    pub fn dot_unconj(&self, rhs: &Self) -> Result<C64> {
        if self.width != rhs.width {
            return Err(Error::WidthMismatch { left: self.width, right: rhs.width });
        }
        self.ensure_index()?;
        let mut f = C64::from(0.0);
        for s in rhs.slots.iter() {
            if let Some(k) = self.lookup(s.state) {
                f += self.slots[k].amp * s.amp;
            }
        }
        Ok(f)
    }

    /// Componentwise sum ∣self⟩ + ∣rhs⟩ as a new register.
    pub fn add(&self, rhs: &Self) -> Result<Self> {
        if self.width != rhs.width {
            return Err(Error::WidthMismatch { left: self.width, right: rhs.width });
        }
        self.ensure_index()?;
        let mut slots = self.slots.clone();
        for s in rhs.slots.iter() {
            match self.lookup(s.state) {
                Some(k) => slots[k].amp += s.amp,
                None => slots.push(*s),
            }
        }
        Ok(Self {
            width: self.width,
            slots,
            index: Self::fresh_index(self.width),
            stamp: Cell::new(0),
        })
    }

    /// Componentwise sum into `self`.
    pub fn add_inplace(&mut self, rhs: &Self) -> Result<()> {
        if self.width != rhs.width {
            return Err(Error::WidthMismatch { left: self.width, right: rhs.width });
        }
        self.ensure_index()?;
        for s in rhs.slots.iter() {
            match self.lookup(s.state) {
                Some(k) => self.slots[k].amp += s.amp,
                None => self.slots.push(*s),
            }
        }
        self.mark_index_dirty();
        Ok(())
    }

    /// Apply an implicit matrix to `self`: the output register keeps
    /// `self`'s basis states, with the amplitude at `s` given by the
    /// unconjugated product of row `s` with `self`.
    ///
    /// The output carries no index (dense/sequential mode); it is meant for
    /// the dense, sequentially ordered registers that external solvers and
    /// time integrators iterate on.
    pub fn apply_rows<H>(&self, h: &H, t: f64) -> Result<Self>
    where H: RowFn + ?Sized
    {
        self.ensure_index()?;
        let mut slots: Vec<Slot> = Vec::with_capacity(self.slots.len());
        for s in self.slots.iter() {
            let row = h.row(s.state, t);
            let mut f = C64::from(0.0);
            for r in row.slots.iter() {
                if let Some(k) = self.lookup(r.state) {
                    f += r.amp * self.slots[k].amp;
                }
            }
            slots.push(Slot { state: s.state, amp: f });
        }
        Ok(Self { width: self.width, slots, index: None, stamp: Cell::new(0) })
    }
}

/// A matrix presented implicitly, one sparse row at a time.
///
/// External eigensolvers and time integrators hand the engine a row
/// generator instead of a materialized operator; the engine only ever asks
/// for single rows through this trait.
pub trait RowFn {
    /// Return row `state` of the matrix as a register, given an external
    /// parameter `t`.
    fn row(&self, state: u64, t: f64) -> Register;
}

impl<F> RowFn for F
where F: Fn(u64, f64) -> Register
{
    fn row(&self, state: u64, t: f64) -> Register { self(state, t) }
}

impl Clone for Register {
    /// Deep copy. The clone never shares index state with the original: it
    /// gets a fresh table of the same size, rebuilt on first use.
    fn clone(&self) -> Self {
        let index = self.index.as_ref()
            .map(|ix| Rc::new(RefCell::new(SparseIndex::new(ix.borrow().bits()))));
        Self {
            width: self.width,
            slots: self.slots.clone(),
            index,
            stamp: Cell::new(0),
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.slots.len();
        for (k, s) in self.slots.iter().enumerate() {
            write!(f, "{:+.6} {:+.6}i∣{}⟩", s.amp.re, s.amp.im, s.state)?;
            if k < n - 1 { writeln!(f)?; }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const EPS: f64 = 1e-12;

    fn sorted_states(reg: &Register) -> Vec<(u64, C64)> {
        reg.slots().iter()
            .map(|s| (s.state, s.amp))
            .sorted_by_key(|(st, _)| *st)
            .collect()
    }

    #[test]
    fn new_single_slot() {
        let reg = Register::new(6, 3).unwrap();
        assert_eq!(reg.width(), 3);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.amp(6).unwrap(), C64::from(1.0));
        assert!((reg.probability() - 1.0).abs() < EPS);
    }

    #[test]
    fn new_rejects_bad_args() {
        assert_eq!(Register::new(0, 0), Err(Error::WidthRange { width: 0 }));
        assert_eq!(Register::new(0, 65), Err(Error::WidthRange { width: 65 }));
        assert_eq!(
            Register::new(4, 2),
            Err(Error::OutOfRange { bit: 2, width: 2 }),
        );
    }

    #[test]
    fn dense_round_trip() {
        let h = C64::from(std::f64::consts::FRAC_1_SQRT_2);
        let v = vec![h, C64::from(0.0), C64::from(0.0), -h];
        let reg = Register::from_dense(&v, 2).unwrap();
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.to_dense().unwrap(), v);
    }

    #[test]
    fn dense_conversion_rejects_wide_registers() {
        let reg = Register::new(0, 31).unwrap();
        assert_eq!(reg.to_dense(), Err(Error::TooLarge { width: 31 }));
        assert_eq!(
            Register::from_dense(&[], 31),
            Err(Error::TooLarge { width: 31 }),
        );
    }

    #[test]
    fn from_dense_checks_length() {
        let v = vec![C64::from(1.0); 3];
        assert_eq!(
            Register::from_dense(&v, 2),
            Err(Error::WidthMismatch { left: 3, right: 4 }),
        );
    }

    #[test]
    fn clone_does_not_share_index() {
        let reg = Register::new(3, 4).unwrap();
        reg.rebuild_index().unwrap();
        let copy = reg.clone();
        assert_eq!(sorted_states(&reg), sorted_states(&copy));
        let (a, b) = (reg.index.as_ref().unwrap(), copy.index.as_ref().unwrap());
        assert!(!Rc::ptr_eq(a, b));
        assert!(b.borrow().is_dirty());
    }

    #[test]
    fn slot_of_finds_every_state() {
        let v: Vec<C64> = (0..8).map(|j| C64::from(f64::from(j) + 1.0)).collect();
        let reg = Register::from_dense(&v, 3).unwrap();
        for s in reg.slots().iter() {
            let k = reg.slot_of(s.state).unwrap().unwrap();
            assert_eq!(reg.slots()[k].state, s.state);
        }
        assert_eq!(reg.slot_of(8).unwrap_or(None), None);
    }

    #[test]
    fn kron_products_states_and_amps() {
        let a = Register::new(1, 2).unwrap(); // ∣01⟩
        let b = Register::new(1, 1).unwrap(); // ∣1⟩
        let ab = a.kron(&b).unwrap();
        assert_eq!(ab.width(), 3);
        assert_eq!(sorted_states(&ab), vec![(0b011, C64::from(1.0))]);
    }

    #[test]
    fn dot_products() {
        let a = Register::new(0, 2).unwrap();
        let b = Register::new(3, 2).unwrap();
        assert_eq!(a.dot(&b).unwrap(), C64::from(0.0));
        assert_eq!(a.dot(&a).unwrap(), C64::from(1.0));

        let mut c = Register::new(1, 1).unwrap();
        c.scale(C64::i());
        // conjugated: ⟨c∣c⟩ = 1; unconjugated: Σ c² = -1
        assert_eq!(c.dot(&c).unwrap(), C64::from(1.0));
        assert_eq!(c.dot_unconj(&c).unwrap(), C64::from(-1.0));
    }

    #[test]
    fn dot_checks_width() {
        let a = Register::new(0, 2).unwrap();
        let b = Register::new(0, 3).unwrap();
        assert_eq!(a.dot(&b), Err(Error::WidthMismatch { left: 2, right: 3 }));
    }

    #[test]
    fn add_merges_and_appends() {
        let mut a = Register::new(0, 2).unwrap();
        a.scale(C64::from(0.5));
        let mut b = Register::new(0, 2).unwrap();
        b.scale(C64::from(0.25));
        let mut c = Register::new(2, 2).unwrap();

        let sum = a.add(&b).unwrap();
        assert_eq!(sorted_states(&sum), vec![(0, C64::from(0.75))]);

        let sum2 = sum.add(&c).unwrap();
        assert_eq!(
            sorted_states(&sum2),
            vec![(0, C64::from(0.75)), (2, C64::from(1.0))],
        );

        c.add_inplace(&sum).unwrap();
        assert_eq!(
            sorted_states(&c),
            vec![(0, C64::from(0.75)), (2, C64::from(1.0))],
        );
    }

    #[test]
    fn add_scratch_shifts_states() {
        let mut reg = Register::new(5, 3).unwrap();
        reg.add_scratch(2).unwrap();
        assert_eq!(reg.width(), 5);
        assert_eq!(sorted_states(&reg), vec![(0b10100, C64::from(1.0))]);
    }

    #[test]
    fn normalize_restores_unit_probability() {
        let mut reg = Register::new(0, 1).unwrap();
        reg.scale(C64::from(3.0));
        reg.normalize();
        assert!((reg.probability() - 1.0).abs() < EPS);
    }

    #[test]
    fn apply_rows_identity() {
        let v: Vec<C64> = (0..4).map(|j| C64::from(f64::from(j) + 1.0)).collect();
        let mut reg = Register::from_dense(&v, 2).unwrap();
        reg.normalize();
        let ident = |state: u64, _t: f64| Register::new(state, 2).unwrap();
        let out = reg.apply_rows(&ident, 0.0).unwrap();
        assert!(out.index.is_none());
        assert_eq!(sorted_states(&out), sorted_states(&reg));
    }

    #[test]
    fn apply_rows_scaled() {
        let v: Vec<C64> = vec![C64::from(0.6), C64::from(0.8)];
        let reg = Register::from_dense(&v, 1).unwrap();
        let twice = |state: u64, _t: f64| {
            let mut row = Register::new(state, 1).unwrap();
            row.scale(C64::from(2.0));
            row
        };
        let out = reg.apply_rows(&twice, 0.0).unwrap();
        assert_eq!(
            sorted_states(&out),
            vec![(0, C64::from(1.2)), (1, C64::from(1.6))],
        );
    }
}
