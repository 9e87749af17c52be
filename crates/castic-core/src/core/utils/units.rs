/// Length of one Bohr in Ångström (CODATA 2010).
pub const BOHR_TO_ANGSTROM: f64 = 0.52917721092;

#[inline]
pub fn angstrom_to_bohr(value: f64) -> f64 {
    value / BOHR_TO_ANGSTROM
}

#[inline]
pub fn bohr_to_angstrom(value: f64) -> f64 {
    value * BOHR_TO_ANGSTROM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_are_inverse() {
        let x = 1.234;
        assert!((bohr_to_angstrom(angstrom_to_bohr(x)) - x).abs() < 1e-14);
        assert!((angstrom_to_bohr(BOHR_TO_ANGSTROM) - 1.0).abs() < 1e-15);
    }
}
