use std::fmt::Display;

use crate::formula::ChemicalFormula;

/// Identifies the rule set for one lipid class ionized with one adduct
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleKey {
    pub lipid_class: String,
    pub adduct: String,
}

impl RuleKey {
    pub fn new(lipid_class: &str, adduct: &str) -> Self {
        Self {
            lipid_class: lipid_class.to_string(),
            adduct: adduct.to_string(),
        }
    }
}

impl Display for RuleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.lipid_class, self.adduct)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FragmentScope {
    Head,
    Chain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RuleScope {
    Head,
    Chain,
    Position,
}

impl Display for RuleScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RuleScope::Head => "head",
            RuleScope::Chain => "chain",
            RuleScope::Position => "position",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormulaTerm {
    /// The full precursor ion formula
    Precursor,
    /// The free fatty acid formula of the chain under consideration
    Chain,
    Literal(ChemicalFormula),
}

/// A signed sum of formula terms, resolved against a precursor and optionally a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaTemplate {
    pub terms: Vec<(i32, FormulaTerm)>,
    pub text: String,
}

impl FormulaTemplate {
    pub fn uses_chain(&self) -> bool {
        self.terms.iter().any(|(_, t)| matches!(t, FormulaTerm::Chain))
    }

    pub fn uses_precursor(&self) -> bool {
        self.terms.iter().any(|(_, t)| matches!(t, FormulaTerm::Precursor))
    }

    /// The resulting formula, which may carry negative counts when the template removes
    /// more atoms than its terms supply. A missing `chain` contributes nothing.
    pub fn resolve(&self, precursor: &ChemicalFormula, chain: Option<&ChemicalFormula>) -> ChemicalFormula {
        let mut out = ChemicalFormula::new();
        for (sign, term) in self.terms.iter() {
            let part = match term {
                FormulaTerm::Precursor => precursor,
                FormulaTerm::Chain => match chain {
                    Some(c) => c,
                    None => continue,
                },
                FormulaTerm::Literal(f) => f,
            };
            if *sign < 0 {
                out -= part;
            } else {
                out += part;
            }
        }
        out
    }
}

impl Display for FormulaTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentDefinition {
    pub name: String,
    pub formula: FormulaTemplate,
    pub charge: i32,
    pub ms_level: u8,
    /// An absolute m/z tolerance overriding the configured fragment tolerance
    pub tolerance: Option<f64>,
    pub mandatory: bool,
    pub scope: FragmentScope,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleId(pub usize);

impl Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

impl Comparison {
    pub fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Greater => lhs > rhs,
            Comparison::GreaterEqual => lhs >= rhs,
            Comparison::Less => lhs < rhs,
            Comparison::LessEqual => lhs <= rhs,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Greater => ">",
            Comparison::GreaterEqual => ">=",
            Comparison::Less => "<",
            Comparison::LessEqual => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FragmentRef {
    Fragment {
        name: String,
        /// The 1-based chain position, for position rules
        position: Option<usize>,
    },
    BasePeak,
}

impl Display for FragmentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FragmentRef::Fragment {
                name,
                position: Some(k),
            } => write!(f, "{name}[{k}]"),
            FragmentRef::Fragment {
                name,
                position: None,
            } => f.write_str(name),
            FragmentRef::BasePeak => f.write_str("$BASEPEAK"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub factor: f64,
    pub reference: FragmentRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RuleOutcome {
    Satisfied,
    Violated,
    /// Every intensity the rule refers to was zero
    NotApplicable,
}

impl RuleOutcome {
    /// Whether this outcome counts against a candidate, given the rule's mandatory flag
    pub fn is_violation(&self, mandatory: bool) -> bool {
        match self {
            RuleOutcome::Violated => true,
            RuleOutcome::NotApplicable => mandatory,
            RuleOutcome::Satisfied => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub lhs: Vec<Term>,
    pub op: Comparison,
    pub rhs: Vec<Term>,
}

impl Expression {
    pub fn references(&self) -> impl Iterator<Item = &FragmentRef> {
        self.lhs.iter().chain(self.rhs.iter()).map(|t| &t.reference)
    }

    pub fn evaluate<F: Fn(&FragmentRef) -> f64>(&self, intensity: F) -> RuleOutcome {
        let side = |terms: &[Term]| -> (f64, bool) {
            let mut total = 0.0;
            let mut any = false;
            for t in terms {
                let x = intensity(&t.reference);
                any |= x != 0.0;
                total += t.factor * x;
            }
            (total, any)
        };
        let (lhs, lhs_any) = side(&self.lhs);
        let (rhs, rhs_any) = side(&self.rhs);
        if !lhs_any && !rhs_any {
            RuleOutcome::NotApplicable
        } else if self.op.apply(lhs, rhs) {
            RuleOutcome::Satisfied
        } else {
            RuleOutcome::Violated
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntensityRule {
    pub id: RuleId,
    pub scope: RuleScope,
    pub mandatory: bool,
    pub expression: Expression,
    /// The rule as written in the rule file
    pub text: String,
    pub line: usize,
}

impl IntensityRule {
    /// The chain positions this rule compares, in ascending order
    pub fn positions(&self) -> Vec<usize> {
        let mut positions: Vec<usize> = self
            .expression
            .references()
            .filter_map(|r| match r {
                FragmentRef::Fragment {
                    position: Some(k), ..
                } => Some(*k),
                _ => None,
            })
            .collect();
        positions.sort_unstable();
        positions.dedup();
        positions
    }
}

/// Settings from the `[GENERAL]` section
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralSettings {
    pub amount_of_chains: usize,
    /// Chain fragments below this fraction of the strongest chain fragment are discarded
    pub chain_cutoff: f64,
    /// Fragments below this fraction of the base peak are treated as absent
    pub base_peak_cutoff: f64,
    pub retention_time_tolerance: Option<f64>,
    pub near_tie_delta: Option<f64>,
    pub ms_level: u8,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            amount_of_chains: 2,
            chain_cutoff: 0.0,
            base_peak_cutoff: 0.0,
            retention_time_tolerance: None,
            near_tie_delta: None,
            ms_level: 2,
        }
    }
}

/// The compiled fragment and intensity rules for one class/adduct
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    pub key: RuleKey,
    pub general: GeneralSettings,
    pub head_fragments: Vec<FragmentDefinition>,
    pub chain_fragments: Vec<FragmentDefinition>,
    pub rules: Vec<IntensityRule>,
}

impl RuleSet {
    pub fn get_head_fragments(&self) -> &[FragmentDefinition] {
        &self.head_fragments
    }

    pub fn get_chain_fragments(&self) -> &[FragmentDefinition] {
        &self.chain_fragments
    }

    pub fn get_intensity_rules(&self, scope: RuleScope) -> Vec<&IntensityRule> {
        self.rules.iter().filter(|r| r.scope == scope).collect()
    }

    pub fn fragment(&self, name: &str) -> Option<&FragmentDefinition> {
        self.head_fragments
            .iter()
            .chain(self.chain_fragments.iter())
            .find(|f| f.name == name)
    }

    pub fn rule(&self, id: RuleId) -> Option<&IntensityRule> {
        self.rules.iter().find(|r| r.id == id)
    }
}
