//! # CASTIC Core Library
//!
//! Translation-rotation internal coordinates (TRIC) for molecular geometry optimization:
//! bond-graph perception, primitive internal coordinates with exact Cartesian derivatives,
//! Wilson B-matrix / G-matrix machinery and the delocalized coordinate transform used to
//! drive quasi-Newton optimizers.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Molecule`, `BondGraph`), the
//!   primitive coordinate definitions and their analytic derivatives, and the dense matrix
//!   assembly routines built on `nalgebra`.
//!
//! - **[`engine`]: The Logic Core.** The stateful `Tric` driver. It owns the bond graph, the
//!   primitive set and the delocalized basis, enforces the build/rebuild state machine and
//!   implements the iterative internal-to-Cartesian back-transformation.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures that tie `engine` and `core`
//!   together, such as building and summarizing a coordinate system for a molecule.
//!
//! ## Units
//!
//! Bond perception works on Ångström positions, everything downstream of it works in Bohr.
//! Conversion happens once at the boundary via [`core::utils::units`].

pub mod core;
pub mod engine;
pub mod workflows;
