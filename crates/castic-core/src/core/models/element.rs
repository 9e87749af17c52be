use phf::{Map, phf_map};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

static SYMBOL_TO_NUMBER: Map<&'static str, u8> = phf_map! {
    "H" => 1, "He" => 2, "Li" => 3, "Be" => 4, "B" => 5, "C" => 6, "N" => 7, "O" => 8,
    "F" => 9, "Ne" => 10, "Na" => 11, "Mg" => 12, "Al" => 13, "Si" => 14, "P" => 15, "S" => 16,
    "Cl" => 17, "Ar" => 18, "K" => 19, "Ca" => 20, "Sc" => 21, "Ti" => 22, "V" => 23,
    "Cr" => 24, "Mn" => 25, "Fe" => 26, "Co" => 27, "Ni" => 28, "Cu" => 29, "Zn" => 30,
    "Ga" => 31, "Ge" => 32, "As" => 33, "Se" => 34, "Br" => 35, "Kr" => 36, "Rb" => 37,
    "Sr" => 38, "Y" => 39, "Zr" => 40, "Nb" => 41, "Mo" => 42, "Tc" => 43, "Ru" => 44,
    "Rh" => 45, "Pd" => 46, "Ag" => 47, "Cd" => 48, "In" => 49, "Sn" => 50, "Sb" => 51,
    "Te" => 52, "I" => 53, "Xe" => 54, "Cs" => 55, "Ba" => 56, "La" => 57, "Ce" => 58,
    "Pr" => 59, "Nd" => 60, "Pm" => 61, "Sm" => 62, "Eu" => 63, "Gd" => 64, "Tb" => 65,
    "Dy" => 66, "Ho" => 67, "Er" => 68, "Tm" => 69, "Yb" => 70, "Lu" => 71, "Hf" => 72,
    "Ta" => 73, "W" => 74, "Re" => 75, "Os" => 76, "Ir" => 77, "Pt" => 78, "Au" => 79,
    "Hg" => 80, "Tl" => 81, "Pb" => 82, "Bi" => 83, "Po" => 84, "At" => 85, "Rn" => 86,
    "Fr" => 87, "Ra" => 88, "Ac" => 89, "Th" => 90, "Pa" => 91, "U" => 92, "Np" => 93,
    "Pu" => 94, "Am" => 95, "Cm" => 96, "Bk" => 97, "Cf" => 98, "Es" => 99, "Fm" => 100,
    "Md" => 101, "No" => 102, "Lr" => 103, "Rf" => 104, "Db" => 105, "Sg" => 106, "Bh" => 107,
    "Hs" => 108, "Mt" => 109, "Ds" => 110, "Rg" => 111, "Cn" => 112, "Nh" => 113, "Fl" => 114,
    "Mc" => 115, "Lv" => 116, "Ts" => 117, "Og" => 118,
};

/// Symbol and covalent radius (Å) indexed by `atomic_number - 1`.
///
/// Radii follow "Covalent radii revisited", Cordero et al., Dalton Trans. 2008, 2832-2838.
const ELEMENT_TABLE: [(&str, f64); 118] = [
    ("H", 0.31), ("He", 0.28), ("Li", 1.28), ("Be", 0.96), ("B", 0.84), ("C", 0.76),
    ("N", 0.71), ("O", 0.66), ("F", 0.57), ("Ne", 0.58), ("Na", 1.66), ("Mg", 1.41),
    ("Al", 1.21), ("Si", 1.11), ("P", 1.07), ("S", 1.05), ("Cl", 1.02), ("Ar", 1.06),
    ("K", 2.03), ("Ca", 1.76), ("Sc", 1.70), ("Ti", 1.60), ("V", 1.53), ("Cr", 1.39),
    ("Mn", 1.50), ("Fe", 1.42), ("Co", 1.38), ("Ni", 1.24), ("Cu", 1.32), ("Zn", 1.22),
    ("Ga", 1.22), ("Ge", 1.20), ("As", 1.19), ("Se", 1.20), ("Br", 1.20), ("Kr", 1.16),
    ("Rb", 2.20), ("Sr", 1.95), ("Y", 1.90), ("Zr", 1.75), ("Nb", 1.64), ("Mo", 1.54),
    ("Tc", 1.47), ("Ru", 1.46), ("Rh", 1.42), ("Pd", 1.39), ("Ag", 1.45), ("Cd", 1.44),
    ("In", 1.42), ("Sn", 1.39), ("Sb", 1.39), ("Te", 1.38), ("I", 1.39), ("Xe", 1.40),
    ("Cs", 2.44), ("Ba", 2.15), ("La", 2.07), ("Ce", 2.04), ("Pr", 2.03), ("Nd", 2.01),
    ("Pm", 1.99), ("Sm", 1.98), ("Eu", 1.98), ("Gd", 1.96), ("Tb", 1.94), ("Dy", 1.92),
    ("Ho", 1.92), ("Er", 1.89), ("Tm", 1.90), ("Yb", 1.87), ("Lu", 1.87), ("Hf", 1.75),
    ("Ta", 1.70), ("W", 1.62), ("Re", 1.51), ("Os", 1.44), ("Ir", 1.41), ("Pt", 1.36),
    ("Au", 1.36), ("Hg", 1.32), ("Tl", 1.45), ("Pb", 1.46), ("Bi", 1.48), ("Po", 1.40),
    ("At", 1.50), ("Rn", 1.50), ("Fr", 2.60), ("Ra", 2.21), ("Ac", 2.15), ("Th", 2.06),
    ("Pa", 2.00), ("U", 1.96), ("Np", 1.90), ("Pu", 1.87), ("Am", 1.80), ("Cm", 1.69),
    ("Bk", 1.68), ("Cf", 1.68), ("Es", 1.65), ("Fm", 1.67), ("Md", 1.73), ("No", 1.76),
    ("Lr", 1.61), ("Rf", 1.57), ("Db", 1.49), ("Sg", 1.43), ("Bh", 1.41), ("Hs", 1.34),
    ("Mt", 1.29), ("Ds", 1.28), ("Rg", 1.21), ("Cn", 1.22), ("Nh", 1.36), ("Fl", 1.43),
    ("Mc", 1.62), ("Lv", 1.75), ("Ts", 1.65), ("Og", 1.57),
];

/// Row of the periodic table as far as the bond stretch force constant rules care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Period {
    One,
    Two,
    Three,
    Heavier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(u8);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown element symbol '{0}'")]
pub struct ParseElementError(pub String);

impl Element {
    pub const HYDROGEN: Element = Element(1);
    pub const CARBON: Element = Element(6);
    pub const NITROGEN: Element = Element(7);
    pub const OXYGEN: Element = Element(8);

    pub fn from_atomic_number(number: u8) -> Option<Self> {
        if (1..=ELEMENT_TABLE.len()).contains(&(number as usize)) {
            Some(Self(number))
        } else {
            None
        }
    }

    #[inline]
    pub fn atomic_number(&self) -> u8 {
        self.0
    }

    #[inline]
    pub fn symbol(&self) -> &'static str {
        ELEMENT_TABLE[self.0 as usize - 1].0
    }

    /// Covalent radius in Ångström.
    #[inline]
    pub fn covalent_radius(&self) -> f64 {
        ELEMENT_TABLE[self.0 as usize - 1].1
    }

    pub fn period(&self) -> Period {
        match self.0 {
            1..=2 => Period::One,
            3..=10 => Period::Two,
            11..=18 => Period::Three,
            _ => Period::Heavier,
        }
    }

    #[inline]
    pub fn is_hydrogen(&self) -> bool {
        self.0 == 1
    }
}

impl FromStr for Element {
    type Err = ParseElementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let normalized: String = match chars.next() {
            Some(first) => first
                .to_uppercase()
                .chain(chars.flat_map(|c| c.to_lowercase()))
                .collect(),
            None => return Err(ParseElementError(s.to_string())),
        };
        SYMBOL_TO_NUMBER
            .get(normalized.as_str())
            .map(|&number| Element(number))
            .ok_or_else(|| ParseElementError(s.to_string()))
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
