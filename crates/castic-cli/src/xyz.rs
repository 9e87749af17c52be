use castic::core::error::ConstructionError;
use castic::core::models::atom::Molecule;
use nalgebra::Point3;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: XyzParseErrorKind },
    #[error("Expected {expected} atoms but the file ends after {found}")]
    Truncated { expected: usize, found: usize },
    #[error(transparent)]
    Molecule(#[from] ConstructionError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum XyzParseErrorKind {
    #[error("Invalid atom count '{0}'")]
    InvalidCount(String),
    #[error("Expected 'symbol x y z', found {0} field(s)")]
    MissingFields(usize),
    #[error("Invalid coordinate '{0}'")]
    InvalidCoordinate(String),
}

/// First frame of an XYZ file. Positions are in Ångström.
#[derive(Debug, Clone)]
pub struct XyzFrame {
    pub comment: String,
    pub molecule: Molecule,
}

impl XyzFrame {
    pub fn read_from_path(path: &Path) -> Result<Self, XyzError> {
        let file = File::open(path)?;
        Self::read_from(&mut BufReader::new(file))
    }

    /// Reads the atom count line, the comment line and one `symbol x y z` line per atom.
    /// Extra columns and any following frames are ignored.
    pub fn read_from(reader: &mut impl BufRead) -> Result<Self, XyzError> {
        let mut lines = reader.lines().enumerate();

        let (count_line_num, count_line) = loop {
            match lines.next() {
                Some((num, line)) => {
                    let line = line?;
                    if !line.trim().is_empty() {
                        break (num + 1, line);
                    }
                }
                None => return Err(XyzError::Truncated { expected: 1, found: 0 }),
            }
        };
        let natoms: usize = count_line.trim().parse().map_err(|_| XyzError::Parse {
            line: count_line_num,
            kind: XyzParseErrorKind::InvalidCount(count_line.trim().to_string()),
        })?;

        let comment = match lines.next() {
            Some((_, line)) => line?.trim().to_string(),
            None => String::new(),
        };

        let mut symbols = Vec::with_capacity(natoms);
        let mut positions = Vec::with_capacity(natoms);
        for (num, line) in lines.take(natoms) {
            let line = line?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return Err(XyzError::Parse {
                    line: num + 1,
                    kind: XyzParseErrorKind::MissingFields(fields.len()),
                });
            }
            let mut coords = [0.0; 3];
            for (slot, field) in coords.iter_mut().zip(&fields[1..4]) {
                *slot = field.parse().map_err(|_| XyzError::Parse {
                    line: num + 1,
                    kind: XyzParseErrorKind::InvalidCoordinate(field.to_string()),
                })?;
            }
            symbols.push(fields[0].to_string());
            positions.push(Point3::from(coords));
        }
        if symbols.len() < natoms {
            return Err(XyzError::Truncated {
                expected: natoms,
                found: symbols.len(),
            });
        }

        let molecule = Molecule::from_symbols(&symbols, &positions)?;
        Ok(Self { comment, molecule })
    }
}
