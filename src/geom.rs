use std::{fmt::Display, fs, path::Path, str::FromStr};

use nalgebra::Vector3;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeomError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed xyz line {line}: `{text}`")]
    Format { line: usize, text: String },

    #[error("xyz header declares {want} atoms, found {got}")]
    Count { want: usize, got: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Atom {
    pub label: String,
    /// Cartesian coordinates in Ångstrom
    pub coord: Vector3<f64>,
}

impl Atom {
    pub fn new(label: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            label: label.into(),
            coord: Vector3::new(x, y, z),
        }
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:2} {:15.10} {:15.10} {:15.10}",
            self.label, self.coord[0], self.coord[1], self.coord[2]
        )
    }
}

/// A molecular geometry as read from an XYZ file
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geom {
    pub comment: String,
    pub atoms: Vec<Atom>,
}

impl Geom {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GeomError> {
        fs::read_to_string(path)?.parse()
    }

    /// the atom lines of the XYZ file, without the count and comment lines.
    /// this is what gets pasted into `* xyz` input blocks
    pub fn xyz_body(&self) -> String {
        self.atoms
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// load every geometry in a multi-structure XYZ file
    pub fn load_all(path: impl AsRef<Path>) -> Result<Vec<Self>, GeomError> {
        parse_all(&fs::read_to_string(path)?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), GeomError> {
        Ok(fs::write(path, self.to_string())?)
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

impl Display for Geom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.atoms.len())?;
        writeln!(f, "{}", self.comment)?;
        for atom in &self.atoms {
            writeln!(f, "{atom}")?;
        }
        Ok(())
    }
}

impl FromStr for Geom {
    type Err = GeomError;

    /// parse a standard XYZ file: an atom count, a comment line, and then one
    /// `label x y z` line per atom. trailing blank lines are ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lines = s.lines().enumerate();
        let bad = |line: usize, text: &str| GeomError::Format {
            line: line + 1,
            text: text.to_owned(),
        };
        let (i, first) = lines.next().ok_or_else(|| bad(0, ""))?;
        let want: usize = first.trim().parse().map_err(|_| bad(i, first))?;
        let comment = lines
            .next()
            .map(|(_, c)| c.trim().to_owned())
            .unwrap_or_default();
        let mut atoms = Vec::with_capacity(want);
        for (i, line) in lines {
            let fields: Vec<_> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            let [label, x, y, z] = &fields[..] else {
                return Err(bad(i, line));
            };
            let coord: Result<Vec<f64>, _> =
                [x, y, z].iter().map(|f| f.parse()).collect();
            let coord = coord.map_err(|_| bad(i, line))?;
            atoms.push(Atom::new(*label, coord[0], coord[1], coord[2]));
        }
        if atoms.len() != want {
            return Err(GeomError::Count {
                want,
                got: atoms.len(),
            });
        }
        Ok(Self { comment, atoms })
    }
}

/// split concatenated XYZ blocks, like the ensembles GOAT writes, into
/// geometries. each block is sized by its own atom count line, and blank lines
/// between blocks are skipped
pub fn parse_all(s: &str) -> Result<Vec<Geom>, GeomError> {
    let lines: Vec<&str> = s.lines().collect();
    let mut ret = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let first = lines[i].trim();
        if first.is_empty() {
            i += 1;
            continue;
        }
        let want: usize = first.parse().map_err(|_| GeomError::Format {
            line: i + 1,
            text: first.to_owned(),
        })?;
        let end = (i + want + 2).min(lines.len());
        let block = lines[i..end].join("\n");
        let geom = block.parse::<Geom>().map_err(|e| match e {
            GeomError::Format { line, text } => GeomError::Format {
                line: line + i,
                text,
            },
            e => e,
        })?;
        ret.push(geom);
        i = end;
    }
    Ok(ret)
}
