// src/params.rs

use serde::Serialize;

use crate::helix::FcLayout;
use crate::mat3::Mat3;

/// Tolerance for the input-consistency checks (staggered-moment agreement,
/// helix orthogonality, phase offsets, contact rank agreement).
pub const EPS: f64 = 1e-4;

/// Distances below this (Angstrom) mean the probe sits on a lattice image.
pub const MIN_DISTANCE: f64 = 1e-8;

/// Exponent of the probe-atom distance used to rank and weight contact
/// contributions.
pub const CONT_SCALING_POWER: f64 = 3.0;

/// mu0 mu_B / 4 pi in T A^3: converts the dipolar lattice sum (moments in
/// Bohr magnetons, distances in Angstrom) to Tesla.
pub const MU0_MUB_OVER_4PI: f64 = 0.9274009;

/// mu0 mu_B in T A^3.
pub const MU0_MUB: f64 = 11.654064;

/// (2/3) mu0 mu_B in T A^3: contact coupling prefactor.
pub const TWO_THIRDS_MU0_MUB: f64 = 7.769376;

/// One magnetic structure, viewed over caller-owned storage.
///
/// `cell` rows hold the lattice vectors a, b, c in Angstrom. `positions`
/// holds three fractional coordinates per atom, `fourier` six Cartesian
/// numbers per atom (ordering per `SumParams::layout`) and `phases` one
/// offset per atom in units of 2 pi. `k` is the propagation vector in
/// reciprocal-lattice units. `size` gives the supercell extents in unit
/// cells along a, b, c.
#[derive(Debug, Clone, Copy)]
pub struct Structure<'a> {
    pub cell: Mat3,
    pub size: [usize; 3],
    pub positions: &'a [f64],
    pub fourier: &'a [f64],
    pub phases: &'a [f64],
    pub k: [f64; 3],
}

/// Run parameters for one field evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct SumParams {
    pub radius: f64,       // Lorentz sphere radius (Angstrom)
    pub cont_radius: f64,  // contact eligibility cutoff (Angstrom)
    pub cont_count: usize, // nearest neighbours kept for the contact term
    pub nangles: usize,    // angular samples over one turn
    pub layout: FcLayout,  // ordering of the six Fourier numbers per atom
}

impl Default for SumParams {
    /// Dipolar and Lorentz sums at a single angle, no contact coupling.
    fn default() -> Self {
        Self {
            radius: 10.0,
            cont_radius: 0.0,
            cont_count: 0,
            nangles: 1,
            layout: FcLayout::Interleaved,
        }
    }
}
