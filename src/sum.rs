// src/sum.rs
//
// Phase 1: the real-space lattice sum. Every periodic image of every atom
// inside the Lorentz sphere contributes once to a pair of angle-independent
// accumulators per atom (cosine and sine projections of the dipolar tensor
// and of the bare moment direction), and images inside the contact cutoff
// feed the two contact selectors. Synthesis later reconstructs the field at
// any angle as a linear combination of the pair, so the supercell scan runs
// exactly once however many angles are sampled.
//
// Cells are cut into fixed chunks; each chunk accumulates into a private
// partial and the partials merge in chunk order, one band of chunks in
// flight at a time so the number of live partials stays bounded however
// large the supercell is. The reduction is lock-free and the result does
// not depend on the thread count.

use rayon::prelude::*;

use crate::error::FieldError;
use crate::helix::HelixMoment;
use crate::lattice::Supercell;
use crate::params::{CONT_SCALING_POWER, MIN_DISTANCE};
use crate::topk::TopK;
use crate::vec3;

/// Cells per parallel work unit.
const CHUNK: usize = 64;

/// Chunk partials alive at once during the reduction.
const BAND: usize = 256;

/// Per-atom trigonometric sums plus the contact selectors.
#[derive(Debug)]
pub struct LatticeSums {
    pub cdip: Vec<[f64; 3]>,
    pub sdip: Vec<[f64; 3]>,
    pub clor: Vec<[f64; 3]>,
    pub slor: Vec<[f64; 3]>,
    pub ccont: TopK,
    pub scont: TopK,
    /// Periodic images that fell inside the Lorentz sphere.
    pub images: usize,
    /// Insertions offered to the contact selectors.
    pub cont_candidates: usize,
}

impl LatticeSums {
    fn new(natoms: usize, cont_count: usize) -> Result<Self, FieldError> {
        Ok(Self {
            cdip: zeroed(natoms, "cosine dipolar accumulators")?,
            sdip: zeroed(natoms, "sine dipolar accumulators")?,
            clor: zeroed(natoms, "cosine Lorentz accumulators")?,
            slor: zeroed(natoms, "sine Lorentz accumulators")?,
            ccont: TopK::new(cont_count).map_err(|_| FieldError::Allocation {
                what: "cosine contact selector",
                len: cont_count,
            })?,
            scont: TopK::new(cont_count).map_err(|_| FieldError::Allocation {
                what: "sine contact selector",
                len: cont_count,
            })?,
            images: 0,
            cont_candidates: 0,
        })
    }

    fn merge(&mut self, other: &LatticeSums) {
        for a in 0..self.cdip.len() {
            self.cdip[a] = vec3::add(self.cdip[a], other.cdip[a]);
            self.sdip[a] = vec3::add(self.sdip[a], other.sdip[a]);
            self.clor[a] = vec3::add(self.clor[a], other.clor[a]);
            self.slor[a] = vec3::add(self.slor[a], other.slor[a]);
        }
        self.ccont.merge(&other.ccont);
        self.scont.merge(&other.scont);
        self.images += other.images;
        self.cont_candidates += other.cont_candidates;
    }
}

fn zeroed(n: usize, what: &'static str) -> Result<Vec<[f64; 3]>, FieldError> {
    let mut v = Vec::new();
    v.try_reserve_exact(n)
        .map_err(|_| FieldError::Allocation { what, len: n })?;
    v.resize(n, [0.0; 3]);
    Ok(v)
}

/// Inputs the image loop reads; fixed once preprocessing is done.
pub(crate) struct SumInputs<'a> {
    pub supercell: &'a Supercell,
    pub positions: &'a [[f64; 3]], // fractional, one per atom
    pub moments: &'a [HelixMoment],
    pub k: [f64; 3],
    pub probe_cart: [f64; 3],
    pub ref_cart: &'a [[f64; 3]], // reference image of each atom, Cartesian
    pub radius: f64,
    pub cont_radius: f64,
    pub cont_count: usize,
}

/// Run the supercell-times-atoms loop and reduce all partial accumulators.
pub(crate) fn sum_lattice(inputs: &SumInputs) -> Result<LatticeSums, FieldError> {
    let natoms = inputs.positions.len();
    let n_cells = inputs.supercell.n_cells();
    let n_chunks = n_cells.div_ceil(CHUNK);

    let mut sums = LatticeSums::new(natoms, inputs.cont_count)?;
    // One band of chunk partials at a time; within a band the merge walks
    // chunks in index order, so the full reduction visits every chunk in
    // the same order no matter how the band work was scheduled.
    for band_lo in (0..n_chunks).step_by(BAND) {
        let band_hi = (band_lo + BAND).min(n_chunks);
        let partials: Vec<LatticeSums> = (band_lo..band_hi)
            .into_par_iter()
            .map(|chunk| -> Result<LatticeSums, FieldError> {
                let lo = chunk * CHUNK;
                let hi = (lo + CHUNK).min(n_cells);
                let mut part = LatticeSums::new(natoms, inputs.cont_count)?;
                for flat in lo..hi {
                    accumulate_cell(inputs, flat, &mut part)?;
                }
                Ok(part)
            })
            .collect::<Result<Vec<_>, FieldError>>()?;

        for part in &partials {
            sums.merge(part);
        }
    }
    Ok(sums)
}

/// Contributions of every atom image in one unit cell of the supercell.
fn accumulate_cell(
    inputs: &SumInputs,
    flat: usize,
    out: &mut LatticeSums,
) -> Result<(), FieldError> {
    let cell = inputs.supercell.cell_index(flat);

    for (a, (&pos, m)) in inputs.positions.iter().zip(inputs.moments).enumerate() {
        let atom_cart = inputs.supercell.image_cart(pos, cell);
        let r = vec3::sub(atom_cart, inputs.probe_cart);
        let n = vec3::norm(r);
        if n >= inputs.radius {
            continue;
        }
        if n < MIN_DISTANCE {
            return Err(FieldError::DegenerateDistance {
                atom: a,
                cell,
                distance: n,
            });
        }

        let u = vec3::scale(1.0 / n, r);
        let inv_r3 = 1.0 / n.powi(3);

        // Phase of this image: displacement from the probe, less the atom's
        // reference image, re-expressed in unit-cell fractional units and
        // dotted with K. The offset phi adds in units of 2 pi.
        let disp = vec3::sub(r, inputs.ref_cart[a]);
        let frac = inputs.supercell.to_cell_frac(disp);
        let arg = 2.0 * std::f64::consts::PI * (vec3::dot(inputs.k, frac) + m.phase);
        let (s, c) = arg.sin_cos();

        // Dipolar tensor of a unit moment, T(v) = (3 (v.u) u - v) / n^3,
        // applied to both frame vectors.
        let ta = vec3::scale(
            inv_r3,
            vec3::sub(vec3::scale(3.0 * vec3::dot(m.a, u), u), m.a),
        );
        let tb = vec3::scale(
            inv_r3,
            vec3::sub(vec3::scale(3.0 * vec3::dot(m.b, u), u), m.b),
        );

        out.cdip[a] = vec3::add(out.cdip[a], vec3::add(vec3::scale(c, ta), vec3::scale(s, tb)));
        out.sdip[a] = vec3::add(out.sdip[a], vec3::sub(vec3::scale(s, ta), vec3::scale(c, tb)));

        // Lorentz sums carry the bare moment direction, no distance weight.
        out.clor[a] = vec3::add(
            out.clor[a],
            vec3::add(vec3::scale(c, m.a), vec3::scale(s, m.b)),
        );
        out.slor[a] = vec3::add(
            out.slor[a],
            vec3::sub(vec3::scale(s, m.a), vec3::scale(c, m.b)),
        );

        out.images += 1;

        if n < inputs.cont_radius {
            let rank = n.powf(CONT_SCALING_POWER);
            out.ccont.insert(
                rank,
                vec3::add(
                    vec3::scale(m.magnitude * c, m.a),
                    vec3::scale(m.magnitude * s, m.b),
                ),
            );
            out.scont.insert(
                rank,
                vec3::sub(
                    vec3::scale(m.magnitude * s, m.a),
                    vec3::scale(m.magnitude * c, m.b),
                ),
            );
            out.cont_candidates += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::NullSink;
    use crate::helix::FcLayout;

    fn close(a: [f64; 3], b: [f64; 3]) -> bool {
        a.iter().zip(&b).all(|(x, y)| (x - y).abs() < 1e-12)
    }

    // One atom, one cell, probe 1 A away along x, K = 0. Every accumulator
    // follows by hand: c = 1, s = 0, u = (-1, 0, 0), T(v) = 3 (v.u) u - v.
    #[test]
    fn single_image_accumulators_match_hand_values() {
        let cell = [[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]];
        let supercell = Supercell::new([1, 1, 1], cell).unwrap();
        let fc = [0.0, 0.0, 0.0, 1.0, 1.0, 0.0]; // A = z, B = y
        let moments = [HelixMoment::from_fourier(0, &fc, 0.0, FcLayout::Interleaved, &NullSink)
            .unwrap()];
        let positions = [[0.0, 0.0, 0.0]];
        let probe_cart = supercell.to_cart(supercell.centered([0.25, 0.0, 0.0]));
        let ref_cart = [supercell.to_cart(supercell.centered([0.0, 0.0, 0.0]))];

        let inputs = SumInputs {
            supercell: &supercell,
            positions: &positions,
            moments: &moments,
            k: [0.0, 0.0, 0.0],
            probe_cart,
            ref_cart: &ref_cart,
            radius: 3.0,
            cont_radius: 2.0,
            cont_count: 2,
        };
        let sums = sum_lattice(&inputs).unwrap();

        assert_eq!(sums.images, 1);
        assert_eq!(sums.cont_candidates, 1);
        // distance 1 A: T(A) = -A, T(B) = -B
        assert!(close(sums.cdip[0], [0.0, 0.0, -1.0]), "cdip = {:?}", sums.cdip[0]);
        assert!(close(sums.sdip[0], [0.0, 1.0, 0.0]), "sdip = {:?}", sums.sdip[0]);
        assert!(close(sums.clor[0], [0.0, 0.0, 1.0]), "clor = {:?}", sums.clor[0]);
        assert!(close(sums.slor[0], [0.0, -1.0, 0.0]), "slor = {:?}", sums.slor[0]);
        // contact selector holds rank 1^3 with payload mag * A and -mag * B
        assert_eq!(sums.ccont.len(), 1);
        assert!((sums.ccont.ranks()[0] - 1.0).abs() < 1e-12);
        assert!(close(sums.ccont.values()[0], [0.0, 0.0, 1.0]));
        assert!(close(sums.scont.values()[0], [0.0, -1.0, 0.0]));
    }

    #[test]
    fn probe_on_an_image_is_degenerate() {
        let cell = [[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]];
        let supercell = Supercell::new([1, 1, 1], cell).unwrap();
        let fc = [0.0, 0.0, 0.0, 1.0, 1.0, 0.0];
        let moments = [HelixMoment::from_fourier(0, &fc, 0.0, FcLayout::Interleaved, &NullSink)
            .unwrap()];
        let positions = [[0.25, 0.25, 0.25]];
        let probe_cart = supercell.to_cart(supercell.centered([0.25, 0.25, 0.25]));
        let ref_cart = [probe_cart];

        let inputs = SumInputs {
            supercell: &supercell,
            positions: &positions,
            moments: &moments,
            k: [0.0, 0.0, 0.0],
            probe_cart,
            ref_cart: &ref_cart,
            radius: 3.0,
            cont_radius: 0.0,
            cont_count: 0,
        };
        let err = sum_lattice(&inputs).unwrap_err();
        assert!(matches!(err, FieldError::DegenerateDistance { atom: 0, .. }));
    }
}
