// src/fields.rs
//
// Entry point and phase 2. Phase 1 (sum.rs) leaves per-atom cosine and sine
// accumulators plus the two contact selectors; the field at an angle theta
// is then one linear combination per atom,
//
//   B(theta) = const * sum_a mag_a (cos(theta) C[a] - sin(theta) S[a])
//
// evaluated over the requested angle grid. The dipolar/Lorentz section and
// the contact section write disjoint output slices and only read the
// finalized sums, so the two run under rayon::join.

use std::f64::consts::PI;

use rayon::join;

use crate::diag::{CountingSink, Warning, WarningSink};
use crate::error::FieldError;
use crate::helix::HelixMoment;
use crate::lattice::Supercell;
use crate::params::{Structure, SumParams, EPS, MU0_MUB, MU0_MUB_OVER_4PI, TWO_THIRDS_MU0_MUB};
use crate::sum::{self, LatticeSums, SumInputs};
use crate::vec3;

/// What a run did, in the numbers that matter for sanity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SumReport {
    /// Periodic images that fell inside the Lorentz sphere.
    pub images: usize,
    /// Candidate insertions offered to the contact selectors.
    pub cont_candidates: usize,
    /// Contact slots that survived the rank cross-check.
    pub cont_kept: usize,
    /// Warnings forwarded to the sink.
    pub warnings: usize,
}

/// Compute the contact, dipolar and Lorentz fields at the probe site for
/// `nangles` evenly spaced angles of the helix.
///
/// `probe` is a fractional position in the unit cell. Each output slice
/// must hold `3 * nangles` values and is fully overwritten, angle n landing
/// at `[3n .. 3n + 3]` in Tesla. Warnings go to `sink`; fatal conditions
/// return an error and leave the outputs unspecified.
pub fn compute_local_fields(
    s: &Structure,
    probe: [f64; 3],
    params: &SumParams,
    sink: &dyn WarningSink,
    out_cont: &mut [f64],
    out_dip: &mut [f64],
    out_lor: &mut [f64],
) -> Result<SumReport, FieldError> {
    let natoms = validate(s, params, out_cont, out_dip, out_lor)?;

    let counting = CountingSink::new(sink);
    let supercell = Supercell::new(s.size, s.cell)?;

    let mut moments = Vec::new();
    moments
        .try_reserve_exact(natoms)
        .map_err(|_| FieldError::Allocation {
            what: "helix moments",
            len: natoms,
        })?;
    for a in 0..natoms {
        moments.push(HelixMoment::from_fourier(
            a,
            &s.fourier[6 * a..6 * a + 6],
            s.phases[a],
            params.layout,
            &counting,
        )?);
    }

    let mut positions = Vec::new();
    positions
        .try_reserve_exact(natoms)
        .map_err(|_| FieldError::Allocation {
            what: "atom positions",
            len: natoms,
        })?;
    for p in s.positions.chunks_exact(3) {
        positions.push([p[0], p[1], p[2]]);
    }

    // Probe and per-atom reference images, re-centred into the middle cell
    // and embedded in Cartesian space.
    let probe_cart = supercell.to_cart(supercell.centered(probe));
    let mut ref_cart = Vec::new();
    ref_cart
        .try_reserve_exact(natoms)
        .map_err(|_| FieldError::Allocation {
            what: "reference positions",
            len: natoms,
        })?;
    for &pos in &positions {
        ref_cart.push(supercell.to_cart(supercell.centered(pos)));
    }

    let inputs = SumInputs {
        supercell: &supercell,
        positions: &positions,
        moments: &moments,
        k: s.k,
        probe_cart,
        ref_cart: &ref_cart,
        radius: params.radius,
        cont_radius: params.cont_radius,
        cont_count: params.cont_count,
    };
    let sums = sum::sum_lattice(&inputs)?;

    let cont_kept = synthesize(&sums, &moments, params, &counting, out_cont, out_dip, out_lor);

    Ok(SumReport {
        images: sums.images,
        cont_candidates: sums.cont_candidates,
        cont_kept,
        warnings: counting.count(),
    })
}

/// Shape and range checks; returns the atom count.
fn validate(
    s: &Structure,
    params: &SumParams,
    out_cont: &[f64],
    out_dip: &[f64],
    out_lor: &[f64],
) -> Result<usize, FieldError> {
    if s.positions.len() % 3 != 0 {
        return Err(FieldError::RaggedPositions(s.positions.len()));
    }
    let natoms = s.positions.len() / 3;
    if s.fourier.len() != 6 * natoms {
        return Err(FieldError::InputLength {
            what: "fourier components",
            expected: 6 * natoms,
            got: s.fourier.len(),
        });
    }
    if s.phases.len() != natoms {
        return Err(FieldError::InputLength {
            what: "phases",
            expected: natoms,
            got: s.phases.len(),
        });
    }

    let nout = 3 * params.nangles;
    if out_cont.len() != nout {
        return Err(FieldError::InputLength {
            what: "contact output",
            expected: nout,
            got: out_cont.len(),
        });
    }
    if out_dip.len() != nout {
        return Err(FieldError::InputLength {
            what: "dipolar output",
            expected: nout,
            got: out_dip.len(),
        });
    }
    if out_lor.len() != nout {
        return Err(FieldError::InputLength {
            what: "Lorentz output",
            expected: nout,
            got: out_lor.len(),
        });
    }

    if !params.radius.is_finite() || params.radius <= 0.0 {
        return Err(FieldError::BadRadius(params.radius));
    }
    if !params.cont_radius.is_finite() || params.cont_radius < 0.0 {
        return Err(FieldError::BadContactRadius(params.cont_radius));
    }
    Ok(natoms)
}

/// The angle reconstruction shared by the dipolar and Lorentz terms:
/// sum_a mag_a (cos(theta) C[a] - sin(theta) S[a]).
fn angle_sum(
    moments: &[HelixMoment],
    cos_acc: &[[f64; 3]],
    sin_acc: &[[f64; 3]],
    cosang: f64,
    sinang: f64,
) -> [f64; 3] {
    let mut total = vec3::zero();
    for (m, (c, s)) in moments.iter().zip(cos_acc.iter().zip(sin_acc)) {
        total = vec3::add(
            total,
            vec3::scale(
                m.magnitude,
                vec3::sub(vec3::scale(cosang, *c), vec3::scale(sinang, *s)),
            ),
        );
    }
    total
}

/// Phase 2: reconstruct all three fields over the angle grid. Returns the
/// number of contact slots kept.
fn synthesize(
    sums: &LatticeSums,
    moments: &[HelixMoment],
    params: &SumParams,
    sink: &dyn WarningSink,
    out_cont: &mut [f64],
    out_dip: &mut [f64],
    out_lor: &mut [f64],
) -> usize {
    let nangles = params.nangles;
    // (mu0 mu_B / 3) times the uniform-sphere factor 3 / (4 pi r^3)
    let lor_scale = (MU0_MUB / 3.0) * (3.0 / (4.0 * PI * params.radius.powi(3)));

    let (_, kept) = join(
        || {
            for angn in 0..nangles {
                let angle = 2.0 * PI * (angn as f64 / nangles as f64);
                let (sinang, cosang) = angle.sin_cos();

                let bdip = vec3::scale(
                    MU0_MUB_OVER_4PI,
                    angle_sum(moments, &sums.cdip, &sums.sdip, cosang, sinang),
                );
                let blor = vec3::scale(
                    lor_scale,
                    angle_sum(moments, &sums.clor, &sums.slor, cosang, sinang),
                );
                for d in 0..3 {
                    out_dip[3 * angn + d] = bdip[d];
                    out_lor[3 * angn + d] = blor[d];
                }
            }
        },
        || contact_fields(sums, sink, out_cont, nangles),
    );
    kept
}

/// Reduce the selector pair into distance-weighted sums and write the
/// contact field at every angle.
fn contact_fields(
    sums: &LatticeSums,
    sink: &dyn WarningSink,
    out_cont: &mut [f64],
    nangles: usize,
) -> usize {
    let cranks = sums.ccont.ranks();
    let sranks = sums.scont.ranks();

    let mut cb = vec3::zero();
    let mut sb = vec3::zero();
    let mut weight = 0.0;
    let mut kept = 0usize;
    for slot in 0..sums.ccont.capacity() {
        if cranks[slot] < 0.0 && sranks[slot] < 0.0 {
            continue;
        }
        // Both selectors saw the same candidate stream, so filled slots
        // must agree on the distance; a mismatch voids the slot.
        if cranks[slot] >= 0.0 && (cranks[slot] - sranks[slot]).abs() < EPS {
            cb = vec3::add(cb, vec3::scale(1.0 / cranks[slot], sums.ccont.values()[slot]));
            sb = vec3::add(sb, vec3::scale(1.0 / sranks[slot], sums.scont.values()[slot]));
            weight += 1.0 / cranks[slot];
            kept += 1;
        } else {
            sink.warn(Warning::ContactRankMismatch {
                slot,
                cos_rank: cranks[slot],
                sin_rank: sranks[slot],
            });
        }
    }

    for angn in 0..nangles {
        let bcont = if kept > 0 {
            let angle = 2.0 * PI * (angn as f64 / nangles as f64);
            let (sinang, cosang) = angle.sin_cos();
            vec3::scale(
                (1.0 / weight) * TWO_THIRDS_MU0_MUB,
                vec3::sub(vec3::scale(cosang, cb), vec3::scale(sinang, sb)),
            )
        } else {
            vec3::zero()
        };
        for d in 0..3 {
            out_cont[3 * angn + d] = bcont[d];
        }
    }
    kept
}
