// src/lib.rs

pub mod diag;
pub mod error;
pub mod fields;
pub mod helix;
pub mod lattice;
pub mod mat3;
pub mod params;
pub(crate) mod sum;
pub mod topk;
pub mod vec3;
