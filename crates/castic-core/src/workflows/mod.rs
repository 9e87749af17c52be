//! # Workflows Module
//!
//! End-to-end procedures built on the [`crate::engine::tric::Tric`] driver.
//!
//! ## Overview
//!
//! Workflows take a [`crate::core::models::atom::Molecule`] and an
//! [`crate::engine::config::IcConfig`], build the full coordinate system and return a plain
//! report struct that front ends can print or serialize without touching the engine.
//!
//! ## Architecture
//!
//! - **Analysis Workflow** ([`analyze`]) - Primitive counts, fragment structure, delocalized
//!   dimension and guess-Hessian summary of a single geometry
//! - **Round-Trip Workflow** ([`roundtrip`]) - Displaces along every delocalized coordinate,
//!   back-transforms and measures how exactly the step can be undone

pub mod analyze;
pub mod roundtrip;
