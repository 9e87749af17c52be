//! Geometric helpers shared by the primitive coordinates.
//!
//! Everything here is a pure function of point coordinates. Degenerate configurations are
//! reported through `Option` and turned into typed errors by the callers, which know the
//! atom indices involved.

pub mod geometry;
pub mod quaternion;
pub mod units;
