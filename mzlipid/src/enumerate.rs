/*! Bounded enumeration of elemental compositions matching a target mass */
use std::cmp::Ordering;

use crate::elements::{ElementTable, ParseError};
use crate::formula::ChemicalFormula;

const MASS_SLACK: f64 = 1e-9;

/// The inclusive range of atom counts to consider for one element
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementBounds {
    pub symbol: String,
    pub min: u32,
    pub max: u32,
}

impl ElementBounds {
    pub fn new(symbol: &str, min: u32, max: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            min,
            max,
        }
    }
}

/// The default search space, suited to lipid-sized molecules
pub fn default_bounds() -> Vec<ElementBounds> {
    vec![
        ElementBounds::new("C", 0, 100),
        ElementBounds::new("H", 0, 200),
        ElementBounds::new("N", 0, 5),
        ElementBounds::new("O", 0, 20),
        ElementBounds::new("P", 0, 2),
        ElementBounds::new("S", 0, 2),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormulaCandidate {
    pub formula: ChemicalFormula,
    pub mass: f64,
    /// `mass - target`
    pub error: f64,
}

#[derive(Debug, Clone)]
struct SearchElement {
    symbol: String,
    mass: f64,
    min: u32,
    max: u32,
}

/// A depth-first search over per-element count ranges, pruned by the lightest and heaviest
/// mass the remaining elements can still contribute.
#[derive(Debug, Clone)]
pub struct FormulaEnumerator {
    elements: Vec<SearchElement>,
    suffix_min: Vec<f64>,
    suffix_max: Vec<f64>,
}

impl FormulaEnumerator {
    pub fn new(table: &ElementTable, bounds: &[ElementBounds]) -> Result<Self, ParseError> {
        let mut elements = Vec::with_capacity(bounds.len());
        for b in bounds {
            let element = table.require(&b.symbol)?;
            elements.push(SearchElement {
                symbol: b.symbol.clone(),
                mass: element.monoisotopic_mass(),
                min: b.min.min(b.max),
                max: b.max.max(b.min),
            });
        }
        // The lightest element is searched last so its count can be solved for directly
        elements.sort_by(|a, b| b.mass.total_cmp(&a.mass));

        let n = elements.len();
        let mut suffix_min = vec![0.0; n + 1];
        let mut suffix_max = vec![0.0; n + 1];
        for i in (0..n).rev() {
            suffix_min[i] = suffix_min[i + 1] + elements[i].mass * elements[i].min as f64;
            suffix_max[i] = suffix_max[i + 1] + elements[i].mass * elements[i].max as f64;
        }
        Ok(Self {
            elements,
            suffix_min,
            suffix_max,
        })
    }

    pub fn with_default_bounds(table: &ElementTable) -> Result<Self, ParseError> {
        Self::new(table, &default_bounds())
    }

    /// Every composition whose mass lies within `tolerance` Da of `target_mass`, sorted by
    /// absolute error, then formula text.
    pub fn enumerate(&self, target_mass: f64, tolerance: f64) -> Vec<FormulaCandidate> {
        let mut results = Vec::new();
        if self.elements.is_empty() {
            return results;
        }
        let lo = target_mass - tolerance.abs() - MASS_SLACK;
        let hi = target_mass + tolerance.abs() + MASS_SLACK;
        let mut counts = vec![0u32; self.elements.len()];
        self.search(0, 0.0, lo, hi, &mut counts, &mut results, target_mass);
        results.sort_by(|a, b| match a.error.abs().total_cmp(&b.error.abs()) {
            Ordering::Equal => a.formula.to_string().cmp(&b.formula.to_string()),
            x => x,
        });
        results
    }

    #[allow(clippy::too_many_arguments)]
    fn search(
        &self,
        depth: usize,
        partial: f64,
        lo: f64,
        hi: f64,
        counts: &mut [u32],
        results: &mut Vec<FormulaCandidate>,
        target: f64,
    ) {
        let element = &self.elements[depth];
        if depth + 1 == self.elements.len() {
            let first = ((lo - partial) / element.mass).ceil().max(element.min as f64);
            let last = ((hi - partial) / element.mass).floor().min(element.max as f64);
            if first > last {
                return;
            }
            for n in (first as u32)..=(last as u32) {
                counts[depth] = n;
                let mass = partial + element.mass * n as f64;
                if mass >= lo && mass <= hi {
                    results.push(self.make_candidate(counts, mass, target));
                }
            }
            counts[depth] = 0;
            return;
        }
        for n in element.min..=element.max {
            let mass = partial + element.mass * n as f64;
            if mass + self.suffix_min[depth + 1] > hi {
                break;
            }
            if mass + self.suffix_max[depth + 1] < lo {
                continue;
            }
            counts[depth] = n;
            self.search(depth + 1, mass, lo, hi, counts, results, target);
        }
        counts[depth] = 0;
    }

    fn make_candidate(&self, counts: &[u32], mass: f64, target: f64) -> FormulaCandidate {
        let formula: ChemicalFormula = self
            .elements
            .iter()
            .zip(counts.iter())
            .map(|(e, n)| (e.symbol.as_str(), *n as i32))
            .collect();
        FormulaCandidate {
            formula,
            mass,
            error: mass - target,
        }
    }
}

/// Enumerate compositions within `tolerance` Da of `target_mass` over the default bounds
pub fn enumerate_formulas(
    table: &ElementTable,
    target_mass: f64,
    tolerance: f64,
) -> Result<Vec<FormulaCandidate>, ParseError> {
    Ok(FormulaEnumerator::with_default_bounds(table)?.enumerate(target_mass, tolerance))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::elements::DEFAULT_ELEMENT_TABLE;

    fn table() -> ElementTable {
        DEFAULT_ELEMENT_TABLE.parse().unwrap()
    }

    #[test]
    fn test_finds_glucose() {
        let table = table();
        let glucose: ChemicalFormula = "C6H12O6".parse().unwrap();
        let mass = glucose.mass(&table).unwrap();
        let hits = enumerate_formulas(&table, mass, 0.001).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].formula, glucose);
        assert!(hits[0].error.abs() < 1e-9);
        for w in hits.windows(2) {
            assert!(w[0].error.abs() <= w[1].error.abs());
        }
        for hit in hits.iter() {
            assert!(hit.error.abs() <= 0.001 + 1e-9);
        }
    }

    #[test]
    fn test_zero_tolerance_is_exact() {
        let table = table();
        let pc: ChemicalFormula = "C42H82NO8P".parse().unwrap();
        let mass = pc.mass(&table).unwrap();
        let hits = enumerate_formulas(&table, mass, 0.0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].formula, pc);
    }

    #[test]
    fn test_no_matches() {
        let table = table();
        let enumerator = FormulaEnumerator::new(&table, &[ElementBounds::new("C", 0, 10)]).unwrap();
        assert!(enumerator.enumerate(12.5, 0.1).is_empty());
        let found = enumerator.enumerate(24.0, 0.01);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].formula.to_string(), "C2");
    }

    #[test]
    fn test_recovers_known_compositions() {
        let table = table();
        let enumerator = FormulaEnumerator::with_default_bounds(&table).unwrap();
        let cases = [
            "CH4",
            "C2H6O",
            "C3H7NO2",
            "C2H7NO3S",
            "C5H5N5O",
            "C10H14N5O7P",
            "C16H32O2",
            "C27H46O",
            "C40H77O10P",
            "C42H82NO8P",
            "C55H100O6",
            "C3H7NO2S",
        ];
        for case in cases {
            let formula: ChemicalFormula = case.parse().unwrap();
            let mass = formula.mass(&table).unwrap();
            let hits = enumerator.enumerate(mass, 1e-6);
            assert!(
                hits.iter().any(|h| h.formula == formula),
                "{case} not recovered from {mass}"
            );
        }
    }

    #[test]
    fn test_tolerance_edge_is_inclusive() {
        let table = table();
        let glucose: ChemicalFormula = "C6H12O6".parse().unwrap();
        let target = glucose.mass(&table).unwrap() + 0.001;
        let enumerator = FormulaEnumerator::with_default_bounds(&table).unwrap();

        let on_edge = enumerator.enumerate(target, 0.001);
        let found = on_edge.iter().find(|h| h.formula == glucose).unwrap();
        assert!((found.error + 0.001).abs() < 1e-9);

        let inside = enumerator.enumerate(target, 0.001 - 1e-7);
        assert!(inside.iter().all(|h| h.formula != glucose));
    }

    #[test]
    fn test_unknown_bound_element() {
        let table = table();
        let err = FormulaEnumerator::new(&table, &[ElementBounds::new("Se", 0, 1)]).unwrap_err();
        assert_eq!(err, ParseError::UnknownElement("Se".into()));
    }
}
