use super::backtransform::{BackTransformOutcome, NewtonSettings, newton_back_transform};
use super::config::IcConfig;
use super::delocalize::{DelocalizedBasis, delocalize};
use super::error::IcError;
use super::state::TricState;
use crate::core::linalg;
use crate::core::models::atom::Molecule;
use crate::core::models::element::Element;
use crate::core::models::topology::BondGraph;
use crate::core::primitives::builder::PrimitiveInternalCoordinates;
use crate::core::utils::units::bohr_to_angstrom;
use nalgebra::{DMatrix, DVector, Point3};
use tracing::{info, instrument, warn};

/// Translation-rotation internal coordinate system of one molecular system.
///
/// Owns the bond graph, the primitive set and the delocalized basis. Geometries are passed
/// in on every call (Bohr) and never retained except for the basis reference geometry.
#[derive(Debug, Clone)]
pub struct Tric {
    config: IcConfig,
    state: TricState,
    elements: Vec<Element>,
    graph: Option<BondGraph>,
    primitives: Option<PrimitiveInternalCoordinates>,
    basis: Option<DelocalizedBasis>,
}

impl Tric {
    pub fn new(config: IcConfig) -> Result<Self, IcError> {
        config.validate()?;
        Ok(Self {
            config,
            state: TricState::Uninitialized,
            elements: Vec::new(),
            graph: None,
            primitives: None,
            basis: None,
        })
    }

    /// Creates an instance and builds it for `molecule` in one step.
    pub fn from_molecule(molecule: &Molecule, config: IcConfig) -> Result<Self, IcError> {
        let mut tric = Self::new(config)?;
        tric.build(molecule)?;
        Ok(tric)
    }

    /// Builds graph, primitives and delocalized basis for `molecule` (Ångström positions).
    ///
    /// On failure the instance stays in the last state reached, which never accepts
    /// transform calls.
    #[instrument(skip_all, name = "tric_build")]
    pub fn build(&mut self, molecule: &Molecule) -> Result<(), IcError> {
        self.elements = molecule.elements();
        self.construct(&molecule.positions(), &molecule.positions_bohr())
    }

    /// Rebuilds everything for the same atoms at a new geometry in Bohr.
    #[instrument(skip_all, name = "tric_rebuild")]
    pub fn rebuild(&mut self, xyz: &[Point3<f64>]) -> Result<(), IcError> {
        if self.state == TricState::Uninitialized {
            return Err(IcError::InvalidState {
                operation: "rebuild",
                state: self.state,
            });
        }
        self.check_dimension("geometry", self.elements.len(), xyz.len())?;
        let angstrom: Vec<_> = xyz
            .iter()
            .map(|p| Point3::from(p.coords.map(bohr_to_angstrom)))
            .collect();
        self.construct(&angstrom, xyz)
    }

    fn construct(
        &mut self,
        angstrom: &[Point3<f64>],
        bohr: &[Point3<f64>],
    ) -> Result<(), IcError> {
        self.graph = None;
        self.primitives = None;
        self.basis = None;
        self.state = TricState::Uninitialized;

        let graph =
            BondGraph::build_with_scale(&self.elements, angstrom, self.config.bond_scale_factor)?;
        self.state = TricState::GraphBuilt;

        let primitives = PrimitiveInternalCoordinates::build(
            &graph,
            &self.elements,
            bohr,
            &self.config.primitive_options(true),
        )?;
        self.graph = Some(graph);
        self.state = TricState::PrimitivesBuilt;

        let basis = delocalize(&primitives, bohr, self.config.pseudo_inverse_tolerance)?;
        self.primitives = Some(primitives);
        self.state = TricState::Delocalized;

        info!(
            atoms = self.elements.len(),
            primitives = self.primitives.as_ref().map_or(0, |p| p.len()),
            delocalized = basis.dimension(),
            "Translation-rotation internal coordinates ready"
        );
        self.basis = Some(basis);
        self.state = TricState::Ready;
        Ok(())
    }

    pub fn state(&self) -> TricState {
        self.state
    }

    pub fn config(&self) -> &IcConfig {
        &self.config
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn graph(&self) -> Option<&BondGraph> {
        self.graph.as_ref()
    }

    pub fn primitives(&self) -> Option<&PrimitiveInternalCoordinates> {
        self.primitives.as_ref()
    }

    pub fn basis(&self) -> Option<&DelocalizedBasis> {
        self.basis.as_ref()
    }

    /// Number of delocalized coordinates, zero before the basis exists.
    pub fn dimension(&self) -> usize {
        self.basis.as_ref().map_or(0, DelocalizedBasis::dimension)
    }

    fn check_dimension(&self, what: &'static str, expected: usize, found: usize) -> Result<(), IcError> {
        if expected != found {
            return Err(IcError::DimensionMismatch {
                what,
                expected,
                found,
            });
        }
        Ok(())
    }

    fn ready(
        &self,
        operation: &'static str,
        xyz: &[Point3<f64>],
    ) -> Result<(&PrimitiveInternalCoordinates, &DelocalizedBasis), IcError> {
        let invalid = IcError::InvalidState {
            operation,
            state: self.state,
        };
        if !self.state.accepts_transforms() {
            return Err(invalid);
        }
        let (Some(primitives), Some(basis)) = (self.primitives.as_ref(), self.basis.as_ref()) else {
            return Err(invalid);
        };
        if self.state == TricState::Stale {
            warn!(operation, "Using a delocalized basis flagged as stale");
        }
        self.check_dimension("geometry", self.elements.len(), xyz.len())?;
        Ok((primitives, basis))
    }

    /// Delocalized coordinate values `U^T q(x)`.
    pub fn calc(&self, xyz: &[Point3<f64>]) -> Result<DVector<f64>, IcError> {
        let (primitives, basis) = self.ready("calc", xyz)?;
        Ok(basis.del_mat().transpose() * primitives.calc(xyz)?)
    }

    /// Delocalized difference `U^T (q(lhs) - q(rhs))` with wrapped torsions.
    pub fn calc_diff(
        &self,
        lhs: &[Point3<f64>],
        rhs: &[Point3<f64>],
    ) -> Result<DVector<f64>, IcError> {
        let (primitives, basis) = self.ready("calc_diff", lhs)?;
        self.check_dimension("geometry", self.elements.len(), rhs.len())?;
        Ok(basis.del_mat().transpose() * primitives.calc_diff(lhs, rhs)?)
    }

    /// Delocalized B-matrix, `k x 3N`.
    pub fn bmat(&self, xyz: &[Point3<f64>]) -> Result<DMatrix<f64>, IcError> {
        let (primitives, basis) = self.ready("bmat", xyz)?;
        Ok(basis.del_mat().transpose() * primitives.bmat(xyz)?)
    }

    pub fn transpose_of_bmat(&self, xyz: &[Point3<f64>]) -> Result<DMatrix<f64>, IcError> {
        Ok(self.bmat(xyz)?.transpose())
    }

    pub fn gmat(&self, xyz: &[Point3<f64>]) -> Result<DMatrix<f64>, IcError> {
        let b = self.bmat(xyz)?;
        Ok(&b * b.transpose())
    }

    pub fn pseudo_inverse_of_gmat(&self, xyz: &[Point3<f64>]) -> Result<DMatrix<f64>, IcError> {
        Ok(linalg::pseudo_inverse_gram(
            &self.bmat(xyz)?,
            self.config.pseudo_inverse_tolerance,
        ))
    }

    /// `G G^+` in the delocalized basis.
    pub fn projector_matrix(&self, xyz: &[Point3<f64>]) -> Result<DMatrix<f64>, IcError> {
        let b = self.bmat(xyz)?;
        let g_inv = linalg::pseudo_inverse_gram(&b, self.config.pseudo_inverse_tolerance);
        Ok(&b * b.transpose() * g_inv)
    }

    /// Converts a Cartesian gradient into delocalized coordinates, `G^+ B P g_x`, where `P`
    /// removes overall translation and rotation.
    pub fn internal_gradient(
        &self,
        xyz: &[Point3<f64>],
        cartesian_gradient: &DVector<f64>,
    ) -> Result<DVector<f64>, IcError> {
        self.ready("internal_gradient", xyz)?;
        self.check_dimension("cartesian gradient", 3 * xyz.len(), cartesian_gradient.len())?;
        let projected = linalg::external_motion_projector(xyz) * cartesian_gradient;
        let b = self.bmat(xyz)?;
        let g_inv = linalg::pseudo_inverse_gram(&b, self.config.pseudo_inverse_tolerance);
        Ok(g_inv * (b * projected))
    }

    /// Converts a delocalized gradient back to Cartesian space, `B^T g_q`.
    pub fn cartesian_gradient(
        &self,
        xyz: &[Point3<f64>],
        internal_gradient: &DVector<f64>,
    ) -> Result<DVector<f64>, IcError> {
        self.ready("cartesian_gradient", xyz)?;
        self.check_dimension("internal gradient", self.dimension(), internal_gradient.len())?;
        Ok(self.transpose_of_bmat(xyz)? * internal_gradient)
    }

    /// Empirical guess Hessian `U^T diag(k) U` in the delocalized basis.
    pub fn guess_hessian(&self, xyz: &[Point3<f64>]) -> Result<DMatrix<f64>, IcError> {
        let (primitives, basis) = self.ready("guess_hessian", xyz)?;
        let diagonal = DMatrix::from_diagonal(&primitives.guess_hessian(xyz)?);
        let u = basis.del_mat();
        Ok(u.transpose() * diagonal * u)
    }

    /// Finds Cartesian coordinates whose delocalized coordinates differ from those of `xyz`
    /// by `dq`.
    pub fn back_transform(
        &self,
        xyz: &[Point3<f64>],
        dq: &DVector<f64>,
    ) -> Result<BackTransformOutcome, IcError> {
        let (primitives, basis) = self.ready("back_transform", xyz)?;
        self.check_dimension("internal step", basis.dimension(), dq.len())?;
        let settings = NewtonSettings {
            max_iterations: self.config.newton_max_iterations,
            convergence_tolerance: self.config.newton_convergence_tolerance,
            pseudo_inverse_tolerance: self.config.pseudo_inverse_tolerance,
        };
        Ok(newton_back_transform(primitives, basis, xyz, dq, &settings)?)
    }

    /// Largest atomic displacement of `xyz` from the basis reference geometry. Above
    /// `stale_displacement_threshold` the instance is flagged [`TricState::Stale`]; it is
    /// never rebuilt automatically.
    pub fn check_displacement(&mut self, xyz: &[Point3<f64>]) -> Result<f64, IcError> {
        let (_, basis) = self.ready("check_displacement", xyz)?;
        let displacement = basis.max_displacement(xyz);
        if displacement > self.config.stale_displacement_threshold && self.state == TricState::Ready {
            warn!(
                displacement,
                threshold = self.config.stale_displacement_threshold,
                "Geometry moved far from the delocalized basis reference; consider a rebuild"
            );
            self.state = TricState::Stale;
        }
        Ok(displacement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utils::units::angstrom_to_bohr;

    fn molecule(symbols: &[&str], positions: &[[f64; 3]]) -> Molecule {
        let positions: Vec<_> = positions
            .iter()
            .map(|p| Point3::new(p[0], p[1], p[2]))
            .collect();
        Molecule::from_symbols(symbols, &positions).unwrap()
    }

    fn water() -> Molecule {
        molecule(
            &["O", "H", "H"],
            &[[0.0, 0.0, 0.1173], [0.0, 0.7572, -0.4692], [0.0, -0.7572, -0.4692]],
        )
    }

    fn hydrogen_peroxide() -> Molecule {
        molecule(
            &["H", "O", "O", "H"],
            &[
                [0.8328, 0.8953, 0.4001],
                [0.7040, 0.0, 0.0],
                [-0.7040, 0.0, 0.0],
                [-0.8328, -0.2987, 0.9234],
            ],
        )
    }

    fn max_abs(m: &DMatrix<f64>) -> f64 {
        m.iter().fold(0.0f64, |acc, x| acc.max(x.abs()))
    }

    fn max_atom_distance(a: &[Point3<f64>], b: &[Point3<f64>]) -> f64 {
        a.iter().zip(b).map(|(p, q)| (p - q).norm()).fold(0.0, f64::max)
    }

    #[test]
    fn build_walks_state_machine_to_ready() {
        let mut tric = Tric::new(IcConfig::default()).unwrap();
        assert_eq!(tric.state(), TricState::Uninitialized);
        tric.build(&water()).unwrap();
        assert_eq!(tric.state(), TricState::Ready);
        assert_eq!(tric.dimension(), 9);
        assert_eq!(tric.graph().unwrap().edges().len(), 2);
    }

    #[test]
    fn transforms_are_rejected_before_build() {
        let tric = Tric::new(IcConfig::default()).unwrap();
        let xyz = water().positions_bohr();
        let err = tric.calc(&xyz).unwrap_err();
        assert_eq!(
            err,
            IcError::InvalidState {
                operation: "calc",
                state: TricState::Uninitialized
            }
        );
        assert!(tric.back_transform(&xyz, &DVector::zeros(9)).is_err());
    }

    #[test]
    fn rebuild_requires_a_previous_build() {
        let mut tric = Tric::new(IcConfig::default()).unwrap();
        let err = tric.rebuild(&water().positions_bohr()).unwrap_err();
        assert!(matches!(err, IcError::InvalidState { operation: "rebuild", .. }));
    }

    #[test]
    fn failed_rebuild_leaves_instance_unusable() {
        let mol = water();
        let mut tric = Tric::from_molecule(&mol, IcConfig::default()).unwrap();
        let mut broken = mol.positions_bohr();
        broken[1] = broken[0];
        assert!(tric.rebuild(&broken).is_err());
        assert_ne!(tric.state(), TricState::Ready);
        assert!(!tric.state().accepts_transforms());
        assert!(matches!(
            tric.calc(&mol.positions_bohr()).unwrap_err(),
            IcError::InvalidState { .. }
        ));
    }

    #[test]
    fn rebuild_restores_ready_state() {
        let mol = water();
        let mut tric = Tric::from_molecule(&mol, IcConfig::default()).unwrap();
        let mut moved = mol.positions_bohr();
        moved[1].y += 0.05;
        tric.rebuild(&moved).unwrap();
        assert_eq!(tric.state(), TricState::Ready);
        assert_eq!(tric.basis().unwrap().reference(), moved.as_slice());
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let config = IcConfig {
            newton_max_iterations: 0,
            ..IcConfig::default()
        };
        assert!(matches!(Tric::new(config).unwrap_err(), IcError::Config { .. }));
    }

    #[test]
    fn wrong_geometry_length_is_a_dimension_mismatch() {
        let mol = water();
        let tric = Tric::from_molecule(&mol, IcConfig::default()).unwrap();
        let xyz = mol.positions_bohr();
        assert_eq!(
            tric.calc(&xyz[..2]).unwrap_err(),
            IcError::DimensionMismatch {
                what: "geometry",
                expected: 3,
                found: 2
            }
        );
        assert!(matches!(
            tric.back_transform(&xyz, &DVector::zeros(4)).unwrap_err(),
            IcError::DimensionMismatch { what: "internal step", .. }
        ));
    }

    #[test]
    fn zero_step_returns_input_geometry() {
        let mol = hydrogen_peroxide();
        let tric = Tric::from_molecule(&mol, IcConfig::default()).unwrap();
        let xyz = mol.positions_bohr();
        let outcome = tric.back_transform(&xyz, &DVector::zeros(tric.dimension())).unwrap();
        let BackTransformOutcome::Converged { cartesian, .. } = outcome else {
            panic!("zero step must converge");
        };
        assert!(max_atom_distance(&cartesian, &xyz) < angstrom_to_bohr(1e-6));
    }

    #[test]
    fn small_step_and_its_inverse_round_trip() {
        let mol = hydrogen_peroxide();
        let tric = Tric::from_molecule(&mol, IcConfig::default()).unwrap();
        let x0 = mol.positions_bohr();
        let k = tric.dimension();

        let mut dq = DVector::zeros(k);
        dq[0] = 0.01;
        dq[k - 1] = -0.005;
        let x1 = tric.back_transform(&x0, &dq).unwrap().into_result().unwrap();

        let achieved = tric.calc_diff(&x1, &x0).unwrap();
        assert!((achieved - &dq).norm() < 1e-8);

        let back = tric.calc_diff(&x0, &x1).unwrap();
        let x2 = tric.back_transform(&x1, &back).unwrap().into_result().unwrap();
        assert!(max_atom_distance(&x2, &x0) < angstrom_to_bohr(1e-6));
    }

    #[test]
    fn convergence_failure_is_reported_not_approximated() {
        let mol = hydrogen_peroxide();
        let config = IcConfig::builder().newton_max_iterations(1).build().unwrap();
        let tric = Tric::from_molecule(&mol, config).unwrap();
        let x0 = mol.positions_bohr();
        let dq = DVector::from_element(tric.dimension(), 0.1);
        let outcome = tric.back_transform(&x0, &dq).unwrap();
        assert!(matches!(outcome, BackTransformOutcome::Failed { iterations: 1, .. }));
        assert!(outcome.into_result().unwrap_err().is_recoverable());
    }

    #[test]
    fn delocalized_gmat_is_symmetric_and_projector_idempotent() {
        let mol = hydrogen_peroxide();
        let tric = Tric::from_molecule(&mol, IcConfig::default()).unwrap();
        let xyz = mol.positions_bohr();
        let g = tric.gmat(&xyz).unwrap();
        assert!(max_abs(&(&g - g.transpose())) < 1e-12);
        let p = tric.projector_matrix(&xyz).unwrap();
        assert!(max_abs(&(&p * &p - &p)) < 1e-8);
        let g_inv = tric.pseudo_inverse_of_gmat(&xyz).unwrap();
        assert!(max_abs(&(&g * &g_inv * &g - &g)) < 1e-8);
    }

    #[test]
    fn linear_molecule_on_a_cartesian_axis_keeps_a_full_rank_basis() {
        let mol = molecule(
            &["H", "C", "C", "H"],
            &[[-1.66, 0.0, 0.0], [-0.6, 0.0, 0.0], [0.6, 0.0, 0.0], [1.66, 0.0, 0.0]],
        );
        let tric = Tric::from_molecule(&mol, IcConfig::default()).unwrap();
        let xyz = mol.positions_bohr();
        assert_eq!(tric.dimension(), 12);

        let primitives = tric.primitives().unwrap();
        let g = primitives.gmat(&xyz).unwrap();
        let g_inv = primitives.pseudo_inverse_of_gmat(&xyz, 1e-6).unwrap();
        assert!(max_abs(&(&g * &g_inv * &g - &g)) < 1e-8);

        // Delocalized G must be diagonal with the stored eigenvalues, all of them non-zero.
        let eigenvalues = tric.basis().unwrap().eigenvalues().clone();
        let g_del = tric.gmat(&xyz).unwrap();
        assert!(max_abs(&(&g_del - DMatrix::from_diagonal(&eigenvalues))) < 1e-8);
        assert!(eigenvalues.min() > 1e-6 * eigenvalues.max());

        let g_del_inv = tric.pseudo_inverse_of_gmat(&xyz).unwrap();
        assert!(max_abs(&(&g_del * g_del_inv - DMatrix::identity(12, 12))) < 1e-8);
    }

    #[test]
    fn bmat_matches_finite_differences_of_calc() {
        let mol = water();
        let tric = Tric::from_molecule(&mol, IcConfig::default()).unwrap();
        let mut xyz = mol.positions_bohr();
        xyz[1].x += 0.03;
        xyz[2].z -= 0.02;
        let b = tric.bmat(&xyz).unwrap();
        let h = 1e-6;
        for atom in 0..xyz.len() {
            for k in 0..3 {
                let mut plus = xyz.clone();
                let mut minus = xyz.clone();
                plus[atom][k] += h;
                minus[atom][k] -= h;
                let numeric = (tric.calc(&plus).unwrap() - tric.calc(&minus).unwrap()) / (2.0 * h);
                let analytic = b.column(3 * atom + k);
                assert!((numeric - analytic).norm() < 1e-6, "atom {atom} dir {k}");
            }
        }
    }

    #[test]
    fn gradient_round_trip_preserves_internal_forces() {
        let mol = hydrogen_peroxide();
        let tric = Tric::from_molecule(&mol, IcConfig::default()).unwrap();
        let xyz = mol.positions_bohr();
        let b = tric.bmat(&xyz).unwrap();

        // A Cartesian gradient generated by a purely internal force field.
        let mut g_q = DVector::zeros(tric.dimension());
        g_q[0] = 0.2;
        g_q[2] = -0.1;
        let g_x = b.transpose() * &g_q;
        let projected = linalg::external_motion_projector(&xyz) * &g_x;
        let recovered = tric.cartesian_gradient(&xyz, &tric.internal_gradient(&xyz, &g_x).unwrap()).unwrap();
        assert!((recovered - projected).norm() < 1e-8);
    }

    #[test]
    fn guess_hessian_is_symmetric_positive_definite() {
        let mol = hydrogen_peroxide();
        let tric = Tric::from_molecule(&mol, IcConfig::default()).unwrap();
        let h = tric.guess_hessian(&mol.positions_bohr()).unwrap();
        assert_eq!(h.shape(), (tric.dimension(), tric.dimension()));
        assert!(max_abs(&(&h - h.transpose())) < 1e-14);
        let min = nalgebra::SymmetricEigen::new(h).eigenvalues.min();
        assert!(min > 0.0);
    }

    #[test]
    fn large_displacement_flags_stale_but_keeps_working() {
        let mol = water();
        let mut tric = Tric::from_molecule(&mol, IcConfig::default()).unwrap();
        let xyz = mol.positions_bohr();
        assert_eq!(tric.check_displacement(&xyz).unwrap(), 0.0);
        assert_eq!(tric.state(), TricState::Ready);

        let shifted: Vec<_> = xyz.iter().map(|p| p + nalgebra::Vector3::new(2.0, 0.0, 0.0)).collect();
        let d = tric.check_displacement(&shifted).unwrap();
        assert!((d - 2.0).abs() < 1e-12);
        assert_eq!(tric.state(), TricState::Stale);
        assert!(tric.calc(&shifted).is_ok());

        tric.rebuild(&shifted).unwrap();
        assert_eq!(tric.state(), TricState::Ready);
    }

    #[test]
    fn isolated_atoms_are_handled_without_error() {
        let mol = molecule(&["Na", "Cl"], &[[0.0, 0.0, 0.0], [9.0, 0.0, 0.0]]);
        let tric = Tric::from_molecule(&mol, IcConfig::default()).unwrap();
        assert_eq!(tric.state(), TricState::Ready);
        assert_eq!(tric.dimension(), 6);
    }

    #[test]
    fn tric_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Tric>();
    }
}
