// src/helix.rs
//
// A Fourier component describes a classical rotating moment. With the unit
// vectors A = Re FC / |Re FC| and B = Im FC / |Im FC|, the moment at global
// angle theta is
//
//   m = magnitude * (cos(psi) A + sin(psi) B),   psi = 2 pi (K . r + phi) + theta
//
// which traces a helix in the A-B plane as theta advances.

use serde::Serialize;

use crate::diag::{Warning, WarningSink};
use crate::error::FieldError;
use crate::params::EPS;
use crate::vec3;

/// Ordering of the six Fourier numbers per atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FcLayout {
    /// Re x, Im x, Re y, Im y, Re z, Im z.
    Interleaved,
    /// Re x, Re y, Re z, Im x, Im y, Im z.
    Split,
}

impl TryFrom<&str> for FcLayout {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "interleaved" => Ok(Self::Interleaved),
            "split" => Ok(Self::Split),
            _ => Err(format!(
                "unknown Fourier component layout '{s}', expected 'interleaved' or 'split'"
            )),
        }
    }
}

impl FcLayout {
    /// Split one atom's six numbers into real and imaginary 3-vectors.
    #[inline]
    pub fn re_im(self, fc: &[f64]) -> ([f64; 3], [f64; 3]) {
        debug_assert_eq!(fc.len(), 6);
        match self {
            FcLayout::Interleaved => ([fc[0], fc[2], fc[4]], [fc[1], fc[3], fc[5]]),
            FcLayout::Split => ([fc[0], fc[1], fc[2]], [fc[3], fc[4], fc[5]]),
        }
    }
}

/// Rotation frame and size of one atom's moment.
#[derive(Debug, Clone, Copy)]
pub struct HelixMoment {
    pub magnitude: f64, // staggered moment (Bohr magnetons)
    pub a: [f64; 3],    // unit vector along Re FC
    pub b: [f64; 3],    // unit vector along Im FC
    pub phase: f64,     // static offset, units of 2 pi
}

impl HelixMoment {
    /// Decompose one atom's Fourier component into its rotation frame.
    ///
    /// The staggered moment is the norm of the real part. Warnings are
    /// raised when the real and imaginary magnitudes disagree, when the two
    /// parts are not orthogonal, or when a non-zero phase offset is in use.
    /// A vanishing part is fatal: the rotation plane would be undefined.
    pub fn from_fourier(
        atom: usize,
        fc: &[f64],
        phase: f64,
        layout: FcLayout,
        sink: &dyn WarningSink,
    ) -> Result<Self, FieldError> {
        let (re, im) = layout.re_im(fc);

        let magnitude = vec3::norm(re);
        let im_norm = vec3::norm(im);
        if magnitude < EPS || im_norm < EPS {
            return Err(FieldError::ZeroMoment { atom });
        }

        if (magnitude - im_norm).abs() > EPS {
            sink.warn(Warning::MomentMismatch {
                atom,
                real_norm: magnitude,
                imag_norm: im_norm,
            });
        }

        let a = vec3::scale(1.0 / magnitude, re);
        let b = vec3::scale(1.0 / im_norm, im);

        let ab = vec3::dot(a, b);
        if ab.abs() > EPS {
            sink.warn(Warning::NonOrthogonalHelix { atom, dot: ab });
        }

        if phase.abs() > EPS {
            sink.warn(Warning::UntestedPhase { atom, phase });
        }

        Ok(Self {
            magnitude,
            a,
            b,
            phase,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::{CollectSink, NullSink};

    #[test]
    fn layouts_decompose_to_the_same_frame() {
        // Re = (0, 0, 2), Im = (0, 2, 0)
        let interleaved = [0.0, 0.0, 0.0, 2.0, 2.0, 0.0];
        let split = [0.0, 0.0, 2.0, 0.0, 2.0, 0.0];

        let mi =
            HelixMoment::from_fourier(0, &interleaved, 0.0, FcLayout::Interleaved, &NullSink)
                .unwrap();
        let ms = HelixMoment::from_fourier(0, &split, 0.0, FcLayout::Split, &NullSink).unwrap();

        assert_eq!(mi.a, [0.0, 0.0, 1.0]);
        assert_eq!(mi.b, [0.0, 1.0, 0.0]);
        assert_eq!(mi.magnitude, 2.0);
        assert_eq!(ms.a, mi.a);
        assert_eq!(ms.b, mi.b);
        assert_eq!(ms.magnitude, mi.magnitude);
    }

    #[test]
    fn vanishing_component_is_fatal() {
        let fc = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]; // Im part is zero
        let err = HelixMoment::from_fourier(3, &fc, 0.0, FcLayout::Interleaved, &NullSink)
            .unwrap_err();
        assert!(matches!(err, FieldError::ZeroMoment { atom: 3 }));
    }

    #[test]
    fn inconsistent_inputs_raise_warnings() {
        let sink = CollectSink::new();
        // |Re| = 1, |Im| = 1.5, Re . Im != 0, phase offset in use
        let fc = [1.0, 0.9, 0.0, 1.2, 0.0, 0.0];
        let m = HelixMoment::from_fourier(1, &fc, 0.25, FcLayout::Interleaved, &sink).unwrap();
        assert!((m.magnitude - 1.0).abs() < 1e-12);

        let warnings = sink.take();
        assert_eq!(warnings.len(), 3, "warnings: {warnings:?}");
        assert!(warnings
            .iter()
            .any(|w| matches!(w, Warning::MomentMismatch { atom: 1, .. })));
        assert!(warnings
            .iter()
            .any(|w| matches!(w, Warning::NonOrthogonalHelix { atom: 1, .. })));
        assert!(warnings
            .iter()
            .any(|w| matches!(w, Warning::UntestedPhase { atom: 1, .. })));
    }

    #[test]
    fn layout_names_parse() {
        assert_eq!(FcLayout::try_from("interleaved").unwrap(), FcLayout::Interleaved);
        assert_eq!(FcLayout::try_from("split").unwrap(), FcLayout::Split);
        assert!(FcLayout::try_from("planar").is_err());
    }
}
