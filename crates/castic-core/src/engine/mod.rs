//! # Engine Module
//!
//! The stateful translation-rotation internal coordinate (TRIC) driver.
//!
//! ## Overview
//!
//! A [`tric::Tric`] instance owns the bond graph, the redundant primitive set and the
//! delocalized basis of one molecular system. Optimizers hand it Cartesian geometries and
//! gradients in Bohr and receive delocalized coordinates, their Jacobians, a guess Hessian and
//! the back-transformation of internal steps into Cartesian space.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Thresholds and iteration limits with a validating builder
//! - **State Tracking** ([`state`]) - Build/rebuild lifecycle of an instance
//! - **Delocalization** ([`delocalize`]) - Non-redundant basis from the G-matrix eigenvectors
//! - **Transform Driver** ([`tric`]) - Forward transforms, Jacobians and the guess Hessian
//! - **Back-Transformation** ([`backtransform`]) - Newton iteration from internal to Cartesian steps
//! - **Error Handling** ([`error`]) - Engine-level error type wrapping the core failures
//! - **Progress Reporting** ([`progress`]) - Callback hooks for long-running workflows

pub mod backtransform;
pub mod config;
pub mod delocalize;
pub mod error;
pub mod progress;
pub mod state;
pub mod tric;
