// src/error.rs

use thiserror::Error;

/// Fatal failures of a field evaluation. Input findings the computation can
/// survive are reported as warnings instead (see `diag`).
#[derive(Error, Debug)]
pub enum FieldError {
    #[error("positions length {0} is not a multiple of 3")]
    RaggedPositions(usize),

    #[error("{what}: expected length {expected}, got {got}")]
    InputLength {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("supercell extents must all be at least 1, got {0:?}")]
    EmptySupercell([usize; 3]),

    #[error("lattice matrix is singular (det = {det:e} A^3)")]
    SingularCell { det: f64 },

    #[error("Lorentz radius must be positive and finite, got {0}")]
    BadRadius(f64),

    #[error("contact radius must be non-negative and finite, got {0}")]
    BadContactRadius(f64),

    #[error("atom {atom}: Fourier component vanishes, rotation plane is undefined")]
    ZeroMoment { atom: usize },

    #[error("probe coincides with an image of atom {atom} in cell {cell:?} (distance {distance:e} A)")]
    DegenerateDistance {
        atom: usize,
        cell: [usize; 3],
        distance: f64,
    },

    #[error("failed to allocate {what} ({len} slots)")]
    Allocation { what: &'static str, len: usize },
}
