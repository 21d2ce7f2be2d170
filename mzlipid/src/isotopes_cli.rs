use std::fs;
use std::io;
use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use mzlipid::adduct::Adduct;
use mzlipid::elements::{ElementTable, ParseError, DEFAULT_ELEMENT_TABLE};
use mzlipid::formula::ChemicalFormula;
use mzlipid::isotopic_model::{
    isotopic_shift, mass_to_mz, IsotopeDistributionGenerator, IsotopicModel,
};

#[derive(Debug, Error)]
enum IsotopesError {
    #[error("Failed to read the element table: {0}")]
    IOError(#[from] io::Error),
    #[error(transparent)]
    ChemistryError(#[from] ParseError),
}

/// Print the m/z and theoretical isotopic distribution of an ion
#[derive(Parser, Debug)]
#[command(author, version)]
struct IsotopesArgs {
    /// The neutral elemental composition, e.g. C42H82NO8P
    #[arg()]
    formula: ChemicalFormula,

    /// The adduct forming the ion, e.g. Na, NH4 or M-H
    #[arg(default_value = "H")]
    adduct: Adduct,

    /// The number of isotopologues to report
    #[arg(short = 'n', long = "max-isotope", default_value_t = 4)]
    max_isotope: usize,

    /// An element table to use in place of the built-in one
    #[arg(long = "element-table")]
    element_table: Option<PathBuf>,
}

impl IsotopesArgs {
    fn load_table(&self) -> Result<ElementTable, IsotopesError> {
        let table = match self.element_table.as_ref() {
            Some(path) => fs::read_to_string(path)?.parse()?,
            None => DEFAULT_ELEMENT_TABLE.parse()?,
        };
        Ok(table)
    }

    fn run(&self) -> Result<(), IsotopesError> {
        let table = self.load_table()?;
        let mut model = IsotopicModel::new(&table);
        let ion = self.adduct.ion_formula(&self.formula);
        let mz = mass_to_mz(model.mass(&ion)?, self.adduct.charge);
        println!("{} {}\t{mz:.5}", self.formula, self.adduct.ion_label());

        let dist = model.isotope_distribution(&ion, self.max_isotope, 0)?;
        let shift = isotopic_shift(self.adduct.charge);
        for (i, p) in dist.iter().enumerate() {
            println!(
                "{}\t{:.4}\t{:.5}\t{:.4}",
                i,
                mz + i as f64 * shift,
                p,
                dist.ratio(i)
            );
        }
        Ok(())
    }
}

fn main() -> Result<(), IsotopesError> {
    let args = IsotopesArgs::parse();
    args.run()
}
