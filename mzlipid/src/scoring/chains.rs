use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

use itertools::Itertools;

use crate::formula::ChemicalFormula;
use crate::hit::{SumComposition, SumCompositionParseError};

/// A fatty acyl chain, written `16:0`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FattyAcid {
    pub carbons: u32,
    pub double_bonds: u32,
}

impl FattyAcid {
    pub fn new(carbons: u32, double_bonds: u32) -> Self {
        Self {
            carbons,
            double_bonds,
        }
    }

    /// The free fatty acid, C<sub>n</sub>H<sub>2n-2d</sub>O<sub>2</sub>
    pub fn formula(&self) -> ChemicalFormula {
        let c = self.carbons as i32;
        let d = self.double_bonds as i32;
        [("C", c), ("H", 2 * c - 2 * d), ("O", 2)].into_iter().collect()
    }
}

impl Display for FattyAcid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.carbons, self.double_bonds)
    }
}

impl FromStr for FattyAcid {
    type Err = SumCompositionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sc: SumComposition = s.parse()?;
        Ok(Self::new(sc.carbons, sc.double_bonds))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for FattyAcid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for FattyAcid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// The chain lengths and saturation considered when splitting a sum composition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChainBounds {
    pub min_carbons: u32,
    pub max_carbons: u32,
    pub max_double_bonds: u32,
}

impl Default for ChainBounds {
    fn default() -> Self {
        Self {
            min_carbons: 2,
            max_carbons: 28,
            max_double_bonds: 6,
        }
    }
}

impl ChainBounds {
    /// Double bonds need at least two carbons each beyond the carboxyl head
    pub fn admits(&self, chain: &FattyAcid) -> bool {
        chain.carbons >= self.min_carbons
            && chain.carbons <= self.max_carbons
            && chain.double_bonds <= self.max_double_bonds
            && 2 * chain.double_bonds + 2 <= chain.carbons
    }

    fn chains(&self) -> Vec<FattyAcid> {
        let mut out = Vec::new();
        for c in self.min_carbons..=self.max_carbons {
            for d in 0..=self.max_double_bonds {
                let fa = FattyAcid::new(c, d);
                if self.admits(&fa) {
                    out.push(fa);
                }
            }
        }
        out
    }
}

/// A multiset of chains, kept sorted
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChainCombination {
    pub chains: Vec<FattyAcid>,
}

impl ChainCombination {
    pub fn new(mut chains: Vec<FattyAcid>) -> Self {
        chains.sort();
        Self { chains }
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn contains(&self, chain: &FattyAcid) -> bool {
        self.chains.binary_search(chain).is_ok()
    }

    /// Each chain once, in order
    pub fn distinct(&self) -> Vec<FattyAcid> {
        let mut chains = self.chains.clone();
        chains.dedup();
        chains
    }

    pub fn sum_composition(&self) -> SumComposition {
        SumComposition::new(
            self.chains.iter().map(|c| c.carbons).sum(),
            self.chains.iter().map(|c| c.double_bonds).sum(),
        )
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl Display for ChainCombination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.chains.iter().join("_"))
    }
}

/// Every multiset of `count` admissible chains whose totals equal `sum`, in ascending order
pub fn enumerate_combinations(
    sum: &SumComposition,
    count: usize,
    bounds: &ChainBounds,
) -> Vec<ChainCombination> {
    fn extend(
        pool: &[FattyAcid],
        start: usize,
        remaining: usize,
        carbons: u32,
        double_bonds: u32,
        current: &mut Vec<FattyAcid>,
        out: &mut Vec<ChainCombination>,
    ) {
        if remaining == 0 {
            if carbons == 0 && double_bonds == 0 {
                out.push(ChainCombination::new(current.clone()));
            }
            return;
        }
        for (i, fa) in pool.iter().enumerate().skip(start) {
            // The pool is sorted, later chains can only be longer
            if fa.carbons * remaining as u32 > carbons {
                break;
            }
            if fa.double_bonds > double_bonds {
                continue;
            }
            current.push(*fa);
            extend(
                pool,
                i,
                remaining - 1,
                carbons - fa.carbons,
                double_bonds - fa.double_bonds,
                current,
                out,
            );
            current.pop();
        }
    }

    let mut out = Vec::new();
    if count == 0 {
        return out;
    }
    let pool = bounds.chains();
    let mut current = Vec::with_capacity(count);
    extend(
        &pool,
        0,
        count,
        sum.carbons,
        sum.double_bonds,
        &mut current,
        &mut out,
    );
    out
}

/// An index into a [`CombinationArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CombinationId(pub usize);

impl Display for CombinationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// The chain combinations considered for one hit, addressed by stable [`CombinationId`]s
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinationArena {
    combinations: Vec<ChainCombination>,
}

impl CombinationArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sum_composition(sum: &SumComposition, count: usize, bounds: &ChainBounds) -> Self {
        enumerate_combinations(sum, count, bounds).into_iter().collect()
    }

    pub fn push(&mut self, combination: ChainCombination) -> CombinationId {
        if let Some(i) = self.combinations.iter().position(|c| *c == combination) {
            return CombinationId(i);
        }
        self.combinations.push(combination);
        CombinationId(self.combinations.len() - 1)
    }

    pub fn get(&self, id: CombinationId) -> Option<&ChainCombination> {
        self.combinations.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CombinationId, &ChainCombination)> {
        self.combinations
            .iter()
            .enumerate()
            .map(|(i, c)| (CombinationId(i), c))
    }

    /// Every chain appearing in any combination, in order
    pub fn distinct_chains(&self) -> Vec<FattyAcid> {
        self.combinations
            .iter()
            .flat_map(|c| c.chains.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl FromIterator<ChainCombination> for CombinationArena {
    fn from_iter<T: IntoIterator<Item = ChainCombination>>(iter: T) -> Self {
        let mut arena = Self::new();
        for c in iter {
            arena.push(c);
        }
        arena
    }
}
