/*! Precursor adducts: the atoms gained or lost when a neutral lipid is ionized */
use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

use crate::elements::{ElementTable, ParseError};
use crate::formula::ChemicalFormula;
use crate::isotopic_model::mass_to_mz;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown adduct {0:?}")]
pub struct UnknownAdduct(pub String);

/// An ionization adduct, the formula delta applied to the neutral molecule and the
/// resulting ion charge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Adduct {
    pub name: String,
    pub delta: ChemicalFormula,
    pub charge: i32,
}

const BUILTIN_ADDUCTS: &[(&str, &str, i32)] = &[
    ("H", "H", 1),
    ("NH4", "NH4", 1),
    ("Na", "Na", 1),
    ("K", "K", 1),
    ("Li", "Li", 1),
    ("-H", "H-1", -1),
    ("HCOO", "CHO2", -1),
    ("CH3COO", "C2H3O2", -1),
    ("Cl", "Cl", -1),
];

impl Adduct {
    pub fn new(name: &str, delta: ChemicalFormula, charge: i32) -> Self {
        Self {
            name: name.to_string(),
            delta,
            charge,
        }
    }

    /// All adducts understood without further configuration
    pub fn builtin() -> Vec<Adduct> {
        BUILTIN_ADDUCTS
            .iter()
            .filter_map(|(name, delta, charge)| {
                delta
                    .parse()
                    .ok()
                    .map(|delta| Adduct::new(name, delta, *charge))
            })
            .collect()
    }

    pub fn is_positive(&self) -> bool {
        self.charge > 0
    }

    pub fn ion_formula(&self, neutral: &ChemicalFormula) -> ChemicalFormula {
        neutral + &self.delta
    }

    /// The m/z of the ion formed from `neutral`, corrected for the electrons it gains or loses
    pub fn ion_mz(&self, table: &ElementTable, neutral: &ChemicalFormula) -> Result<f64, ParseError> {
        let ion = self.ion_formula(neutral);
        ion.validate()?;
        Ok(mass_to_mz(ion.mass(table)?, self.charge))
    }

    /// The conventional ion notation, e.g. `[M+NH4]+` or `[M-H]-`
    pub fn ion_label(&self) -> String {
        let sign = if self.charge > 0 { '+' } else { '-' };
        let z = self.charge.unsigned_abs();
        let z = if z == 1 { String::new() } else { z.to_string() };
        let body = match self.name.strip_prefix('-') {
            Some(lost) => format!("M-{lost}"),
            None => format!("M+{}", self.name),
        };
        format!("[{body}]{z}{sign}")
    }
}

impl Display for Adduct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for Adduct {
    type Err = UnknownAdduct;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let name = match name {
            "+H" => "H",
            "M+H" | "[M+H]+" => "H",
            "M-H" | "[M-H]-" => "-H",
            "M+NH4" | "[M+NH4]+" => "NH4",
            "M+Na" | "[M+Na]+" => "Na",
            _ => name,
        };
        Adduct::builtin()
            .into_iter()
            .find(|a| a.name == name)
            .ok_or_else(|| UnknownAdduct(s.to_string()))
    }
}
