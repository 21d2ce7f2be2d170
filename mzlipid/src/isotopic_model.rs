/*! Isotopic distributions for exact elemental compositions */
use std::cmp::Ordering;
use std::collections::btree_map::{self, BTreeMap, Entry as BEntry};
use std::ops::Index;

use chemical_elements::PROTON as _PROTON;
use tracing::trace;

use crate::elements::{ElementTable, ParseError};
use crate::formula::ChemicalFormula;

/// The mass of H+, a hydrogen atom minus an electron
pub const PROTON: f64 = _PROTON;

/// The rest mass of an electron
pub const ELECTRON_MASS: f64 = 0.000548579909;

/// The mass difference between isotopes `C[13]` and `C[12]`. Not precisely universal, but the
/// majority of expected applications are carbon-based
pub const NEUTRON_SHIFT: f64 = 1.0033548378;

const ISOTOPIC_SHIFT: [f64; 4] = [
    NEUTRON_SHIFT / 1.0,
    NEUTRON_SHIFT / 2.0,
    NEUTRON_SHIFT / 3.0,
    NEUTRON_SHIFT / 4.0,
];

/// Get the m/z difference between isotopic peaks at a given charge state, of either polarity
#[inline(always)]
pub fn isotopic_shift(charge: i32) -> f64 {
    let z = charge.unsigned_abs() as usize;
    if z > 0 && z <= ISOTOPIC_SHIFT.len() {
        ISOTOPIC_SHIFT[z - 1]
    } else {
        NEUTRON_SHIFT / z as f64
    }
}

/// Convert the mass of an ion formula (its atoms, not yet corrected for missing or extra
/// electrons) into the m/z observed at `charge`.
#[inline]
pub fn mass_to_mz(ion_mass: f64, charge: i32) -> f64 {
    let z = charge as f64;
    (ion_mass - z * ELECTRON_MASS) / z.abs()
}

/// The relative abundance of each isotopologue, indexed by nominal isotope number where
/// index 0 is the monoisotopic peak.
///
/// The values are raw probabilities and are not renormalized after truncation, so they sum
/// to at most 1.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IsotopeDistribution {
    pub probabilities: Vec<f64>,
}

impl IsotopeDistribution {
    pub fn new(probabilities: Vec<f64>) -> Self {
        Self { probabilities }
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.probabilities.get(index).copied()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.probabilities.iter()
    }

    pub fn total(&self) -> f64 {
        self.probabilities.iter().sum()
    }

    /// The abundance of isotope `index` relative to the monoisotopic peak, or 0 if either is
    /// absent
    pub fn ratio(&self, index: usize) -> f64 {
        match (self.get(0), self.get(index)) {
            (Some(mono), Some(x)) if mono > 0.0 => x / mono,
            _ => 0.0,
        }
    }

    /// A copy that sums to 1
    pub fn normalized(&self) -> Self {
        let total = self.total();
        if total <= 0.0 {
            return self.clone();
        }
        Self::new(self.probabilities.iter().map(|p| p / total).collect())
    }

    /// The index of the most abundant isotopologue
    pub fn base_peak_index(&self) -> usize {
        self.probabilities
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
            .map(|(i, _)| i)
            .unwrap_or_default()
    }

    /// Truncate to at most `count` isotopologues
    pub fn truncate(mut self, count: usize) -> Self {
        self.probabilities.truncate(count);
        self
    }
}

impl Index<usize> for IsotopeDistribution {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.probabilities[index]
    }
}

fn convolve(a: &[f64], b: &[f64], max_len: usize) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let n = (a.len() + b.len() - 1).min(max_len);
    let mut out = vec![0.0; n];
    for (i, x) in a.iter().enumerate().take(n) {
        for (j, y) in b.iter().enumerate().take(n - i) {
            out[i + j] += x * y;
        }
    }
    out
}

/// Raise a per-atom probability vector to `count` atoms by repeated squaring
fn power(base: &[f64], mut count: u32, max_len: usize) -> Vec<f64> {
    let mut result = vec![1.0];
    let mut factor = base.to_vec();
    factor.truncate(max_len);
    while count > 0 {
        if count & 1 == 1 {
            result = convolve(&result, &factor, max_len);
        }
        count >>= 1;
        if count > 0 {
            factor = convolve(&factor, &factor, max_len);
        }
    }
    result
}

/// Compute the monoisotopic mass of `formula`
pub fn compute_mass(table: &ElementTable, formula: &ChemicalFormula) -> Result<f64, ParseError> {
    formula.mass(table)
}

/// Compute the isotopic distribution of `formula` out to isotope `max_isotope`.
///
/// `charge_adjust` is a signed number of hydrogen atoms added to the formula before the
/// distribution is computed, such as the proton gained by an `[M+H]+` ion.
pub fn compute_isotope_distribution(
    table: &ElementTable,
    formula: &ChemicalFormula,
    max_isotope: usize,
    charge_adjust: i32,
) -> Result<IsotopeDistribution, ParseError> {
    let mut formula = formula.clone();
    if charge_adjust != 0 {
        formula.increment("H", charge_adjust);
    }
    formula.validate()?;
    let max_len = max_isotope + 1;
    let mut acc = vec![1.0];
    for (symbol, count) in formula.iter() {
        let element = table.require(symbol)?;
        let per_atom = element.probability_vector(max_isotope);
        let contribution = power(&per_atom, *count as u32, max_len);
        acc = convolve(&acc, &contribution, max_len);
    }
    acc.resize(max_len, 0.0);
    Ok(IsotopeDistribution::new(acc))
}

/// The capability to produce isotopic distributions for exact compositions
pub trait IsotopeDistributionGenerator {
    fn isotope_distribution(
        &mut self,
        formula: &ChemicalFormula,
        max_isotope: usize,
        charge_adjust: i32,
    ) -> Result<IsotopeDistribution, ParseError>;

    /// The monoisotopic mass of `formula`
    fn mass(&self, formula: &ChemicalFormula) -> Result<f64, ParseError>;
}

/// Computes isotopic distributions against a borrowed [`ElementTable`]
#[derive(Debug, Clone, Copy)]
pub struct IsotopicModel<'lifespan> {
    pub table: &'lifespan ElementTable,
}

impl<'lifespan> IsotopicModel<'lifespan> {
    pub fn new(table: &'lifespan ElementTable) -> Self {
        Self { table }
    }
}

impl PartialEq for IsotopicModel<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table
    }
}

impl IsotopeDistributionGenerator for IsotopicModel<'_> {
    fn isotope_distribution(
        &mut self,
        formula: &ChemicalFormula,
        max_isotope: usize,
        charge_adjust: i32,
    ) -> Result<IsotopeDistribution, ParseError> {
        compute_isotope_distribution(self.table, formula, max_isotope, charge_adjust)
    }

    fn mass(&self, formula: &ChemicalFormula) -> Result<f64, ParseError> {
        compute_mass(self.table, formula)
    }
}

#[doc(hidden)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsotopeDistributionSpec {
    pub formula: ChemicalFormula,
    pub max_isotope: usize,
    pub charge_adjust: i32,
}

impl PartialOrd for IsotopeDistributionSpec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IsotopeDistributionSpec {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.max_isotope.cmp(&other.max_isotope) {
            Ordering::Equal => match self.charge_adjust.cmp(&other.charge_adjust) {
                Ordering::Equal => self.formula.cmp(&other.formula),
                x => x,
            },
            x => x,
        }
    }
}

/// A wrapper around [`IsotopicModel`] which memoizes distributions by formula, truncation
/// and charge adjustment.
#[derive(Debug, Clone)]
pub struct CachingIsotopicModel<'lifespan> {
    inner: IsotopicModel<'lifespan>,
    cache: BTreeMap<IsotopeDistributionSpec, IsotopeDistribution>,
}

impl<'lifespan> CachingIsotopicModel<'lifespan> {
    pub fn new(table: &'lifespan ElementTable) -> Self {
        Self {
            inner: IsotopicModel::new(table),
            cache: BTreeMap::new(),
        }
    }

    pub fn table(&self) -> &'lifespan ElementTable {
        self.inner.table
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, IsotopeDistributionSpec, IsotopeDistribution> {
        self.cache.iter()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Pre-compute distributions for a batch of formulas
    pub fn populate_cache<'a, I: IntoIterator<Item = &'a ChemicalFormula>>(
        &mut self,
        formulas: I,
        max_isotope: usize,
        charge_adjust: i32,
    ) -> Result<(), ParseError> {
        trace!("Starting isotopic cache population");
        for formula in formulas {
            self.isotope_distribution(formula, max_isotope, charge_adjust)?;
        }
        trace!(
            "Finished isotopic cache population, {} entries created",
            self.len()
        );
        Ok(())
    }
}

impl<'a> From<IsotopicModel<'a>> for CachingIsotopicModel<'a> {
    fn from(inst: IsotopicModel<'a>) -> CachingIsotopicModel<'a> {
        CachingIsotopicModel::new(inst.table)
    }
}

impl IsotopeDistributionGenerator for CachingIsotopicModel<'_> {
    fn isotope_distribution(
        &mut self,
        formula: &ChemicalFormula,
        max_isotope: usize,
        charge_adjust: i32,
    ) -> Result<IsotopeDistribution, ParseError> {
        let key = IsotopeDistributionSpec {
            formula: formula.clone(),
            max_isotope,
            charge_adjust,
        };
        match self.cache.entry(key) {
            BEntry::Occupied(ent) => Ok(ent.get().clone()),
            BEntry::Vacant(ent) => {
                let res = self
                    .inner
                    .isotope_distribution(formula, max_isotope, charge_adjust)?;
                Ok(ent.insert(res).clone())
            }
        }
    }

    fn mass(&self, formula: &ChemicalFormula) -> Result<f64, ParseError> {
        self.inner.mass(formula)
    }
}
