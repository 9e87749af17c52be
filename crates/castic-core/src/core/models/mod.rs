//! # Core Models Module
//!
//! Data structures describing the molecule that internal coordinates are built for.
//!
//! ## Overview
//!
//! Atoms are addressed by stable `usize` indices that match their position in the
//! [`atom::Molecule`] atom array. Every derived structure (bond graph, primitive set,
//! B-matrix columns) uses the same indices.
//!
//! ## Key Components
//!
//! - [`element`] - Chemical elements, covalent radii and period classification
//! - [`atom`] - Atoms and molecules with Ångström positions
//! - [`topology`] - Covalent bond graph perceived from distances

pub mod atom;
pub mod element;
pub mod topology;
