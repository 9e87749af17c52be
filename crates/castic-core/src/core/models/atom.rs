use super::element::Element;
use crate::core::error::ConstructionError;
use crate::core::utils::units::angstrom_to_bohr;
use nalgebra::Point3;

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub element: Element,
    /// Position in Ångström.
    pub position: Point3<f64>,
}

impl Atom {
    pub fn new(element: Element, position: Point3<f64>) -> Self {
        Self { element, position }
    }
}

/// An ordered set of atoms. Atom indices are positions in this list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Molecule {
    atoms: Vec<Atom>,
}

impl Molecule {
    pub fn new(atoms: Vec<Atom>) -> Result<Self, ConstructionError> {
        if atoms.is_empty() {
            return Err(ConstructionError::EmptyAtomSet);
        }
        Ok(Self { atoms })
    }

    /// Builds a molecule from element symbols and Ångström positions.
    pub fn from_symbols<S: AsRef<str>>(
        symbols: &[S],
        positions: &[Point3<f64>],
    ) -> Result<Self, ConstructionError> {
        if symbols.len() != positions.len() {
            return Err(ConstructionError::LengthMismatch {
                elements: symbols.len(),
                positions: positions.len(),
            });
        }
        let atoms = symbols
            .iter()
            .zip(positions)
            .enumerate()
            .map(|(index, (symbol, position))| {
                let symbol = symbol.as_ref();
                symbol
                    .parse::<Element>()
                    .map(|element| Atom::new(element, *position))
                    .map_err(|_| ConstructionError::UnknownElement {
                        index,
                        symbol: symbol.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(atoms)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn elements(&self) -> Vec<Element> {
        self.atoms.iter().map(|a| a.element).collect()
    }

    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    /// Positions converted to Bohr, the working unit of the coordinate engine.
    pub fn positions_bohr(&self) -> Vec<Point3<f64>> {
        self.atoms
            .iter()
            .map(|a| Point3::from(a.position.coords.map(angstrom_to_bohr)))
            .collect()
    }
}
