//! Sparse state-vector simulation of quantum registers.
//!
//! Registers store only the basis states carrying nonzero amplitude, so
//! memory tracks the entanglement structure of the state rather than
//! 2<sup>width</sup>. A hash index over the basis states keeps amplitude
//! lookups constant-time, gates create and destroy basis states as
//! amplitudes split and cancel, and measurements collapse and renormalize
//! in place. Gates run under a [`sim::Sim`] context that owns the RNG, an
//! optional dephasing-noise model, and a hook for intercepting operations.
//!
//! ```
//! use sparse_sim::{ register::Register, sim::Sim };
//!
//! let mut sim = Sim::new();
//! let mut reg = Register::new(0, 2).unwrap();
//!
//! // Bell pair: (∣00⟩ + ∣11⟩)/√2
//! reg.hadamard(0, &mut sim).unwrap();
//! reg.cnot(0, 1, &mut sim).unwrap();
//! assert_eq!(reg.len(), 2);
//!
//! // measuring one qubit pins the other
//! let outcome = reg.collapse_bit(0, &mut sim).unwrap();
//! assert_eq!(reg.width(), 1);
//! assert_eq!(reg.slots()[0].state, outcome.bit());
//! ```

pub mod error;
pub mod index;
pub mod register;
pub mod gates;
pub mod measure;
pub mod sim;
