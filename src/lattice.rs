// src/lattice.rs

use crate::error::FieldError;
use crate::mat3::{self, Mat3};

/// Finite periodic replication of a unit cell, with the derived matrices
/// the summation loop needs.
///
/// The supercell matrix embeds supercell-fractional coordinates in
/// Cartesian space. The unit-cell inverse re-expresses Cartesian
/// displacements in unit-cell fractional units, which is what the
/// propagation vector dots against.
#[derive(Debug, Clone, Copy)]
pub struct Supercell {
    pub size: [usize; 3],
    pub cell: Mat3,
    sc_matrix: Mat3,
    inv_cell: Mat3,
}

impl Supercell {
    /// Build a supercell, rejecting empty extents and singular cells.
    pub fn new(size: [usize; 3], cell: Mat3) -> Result<Self, FieldError> {
        if size.iter().any(|&n| n == 0) {
            return Err(FieldError::EmptySupercell(size));
        }
        let det = mat3::det(cell);
        if !det.is_finite() || det.abs() < 1e-12 {
            return Err(FieldError::SingularCell { det });
        }
        let inv_cell = mat3::inv(cell);
        let sc_matrix = mat3::mul(
            mat3::diag(size[0] as f64, size[1] as f64, size[2] as f64),
            cell,
        );
        Ok(Self {
            size,
            cell,
            sc_matrix,
            inv_cell,
        })
    }

    /// Number of unit cells in the supercell.
    pub fn n_cells(&self) -> usize {
        self.size[0] * self.size[1] * self.size[2]
    }

    /// Decode a flat cell index into (i, j, k), k fastest.
    #[inline]
    pub fn cell_index(&self, flat: usize) -> [usize; 3] {
        let [_, ny, nz] = self.size;
        [flat / (ny * nz), (flat / nz) % ny, flat % nz]
    }

    /// Re-centre a unit-cell fractional position to the middle cell of the
    /// supercell and rescale to supercell-fractional units. The half-extent
    /// shift rounds down, matching the loop's integer cell indices.
    #[inline]
    pub fn centered(&self, frac: [f64; 3]) -> [f64; 3] {
        [
            (frac[0] + (self.size[0] / 2) as f64) / self.size[0] as f64,
            (frac[1] + (self.size[1] / 2) as f64) / self.size[1] as f64,
            (frac[2] + (self.size[2] / 2) as f64) / self.size[2] as f64,
        ]
    }

    /// Cartesian position of a supercell-fractional coordinate.
    #[inline]
    pub fn to_cart(&self, frac_sc: [f64; 3]) -> [f64; 3] {
        mat3::vmul(frac_sc, self.sc_matrix)
    }

    /// Cartesian position of the periodic image of `frac` in cell (i, j, k).
    #[inline]
    pub fn image_cart(&self, frac: [f64; 3], cell: [usize; 3]) -> [f64; 3] {
        self.to_cart([
            (frac[0] + cell[0] as f64) / self.size[0] as f64,
            (frac[1] + cell[1] as f64) / self.size[1] as f64,
            (frac[2] + cell[2] as f64) / self.size[2] as f64,
        ])
    }

    /// Cartesian displacement re-expressed in unit-cell fractional units.
    #[inline]
    pub fn to_cell_frac(&self, cart: [f64; 3]) -> [f64; 3] {
        mat3::vmul(cart, self.inv_cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec3;

    fn cubic(a: f64) -> Mat3 {
        [[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]]
    }

    #[test]
    fn cell_index_decodes_k_fastest() {
        let sc = Supercell::new([2, 3, 4], cubic(1.0)).unwrap();
        let mut flat = 0;
        for i in 0..2 {
            for j in 0..3 {
                for k in 0..4 {
                    assert_eq!(sc.cell_index(flat), [i, j, k]);
                    flat += 1;
                }
            }
        }
        assert_eq!(flat, sc.n_cells());
    }

    #[test]
    fn centered_uses_floored_half_extents() {
        let sc = Supercell::new([5, 4, 1], cubic(1.0)).unwrap();
        let c = sc.centered([0.5, 0.0, 0.25]);
        assert!((c[0] - 2.5 / 5.0).abs() < 1e-15); // 5 / 2 floors to 2
        assert!((c[1] - 2.0 / 4.0).abs() < 1e-15);
        assert!((c[2] - 0.25).abs() < 1e-15);
    }

    #[test]
    fn image_positions_step_by_one_lattice_vector() {
        let cell: Mat3 = [[3.0, 0.0, 0.0], [0.5, 4.0, 0.0], [0.0, 0.0, 5.0]];
        let sc = Supercell::new([3, 3, 3], cell).unwrap();
        let frac = [0.1, 0.2, 0.3];
        let origin = sc.image_cart(frac, [0, 0, 0]);
        let next = sc.image_cart(frac, [0, 1, 0]);
        let step = vec3::sub(next, origin);
        for d in 0..3 {
            assert!((step[d] - cell[1][d]).abs() < 1e-12, "step[{d}] = {}", step[d]);
        }
    }

    #[test]
    fn cell_frac_inverts_unit_cell_embedding() {
        let cell: Mat3 = [[4.1, 0.0, 0.2], [-1.3, 3.7, 0.0], [0.5, 0.9, 5.2]];
        let sc = Supercell::new([2, 2, 2], cell).unwrap();
        let frac = [0.3, -0.6, 1.7];
        let cart = crate::mat3::vmul(frac, cell);
        let back = sc.to_cell_frac(cart);
        for d in 0..3 {
            assert!((back[d] - frac[d]).abs() < 1e-12);
        }
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        assert!(matches!(
            Supercell::new([0, 2, 2], cubic(1.0)),
            Err(FieldError::EmptySupercell(_))
        ));
        let flat: Mat3 = [[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        assert!(matches!(
            Supercell::new([2, 2, 2], flat),
            Err(FieldError::SingularCell { .. })
        ));
    }
}
