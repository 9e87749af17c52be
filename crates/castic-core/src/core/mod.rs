//! # Core Module
//!
//! The stateless foundation of CASTIC: molecular models, geometric primitives and the
//! linear-algebra kernels that turn a Cartesian structure into internal coordinates.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Elements, atoms, molecules and the bond graph
//! - **Geometry** ([`utils`]) - Distances, angles, torsions, quaternion superposition, units
//! - **Primitive Coordinates** ([`primitives`]) - The typed primitive set and its construction
//! - **Matrix Kernels** ([`linalg`]) - B-matrix, G-matrix, pseudo-inverses and projectors
//! - **Errors** ([`error`]) - Construction and geometric degeneracy failures
//!
//! ## Scientific Foundation
//!
//! - **Wilson B-matrix formalism** for curvilinear internal coordinates
//! - **Delocalized internal coordinates** (Baker, Kessi, Delley 1996)
//! - **Translation-rotation internal coordinates** (Wang, Song 2016)
//! - **Covalent radii** from Cordero et al., Dalton Trans. 2008

pub mod error;
pub mod linalg;
pub mod models;
pub mod primitives;
pub mod utils;
