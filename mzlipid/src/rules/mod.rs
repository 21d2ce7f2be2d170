//! Per class/adduct fragment definitions and intensity rules, compiled from text on demand
mod expression;
mod model;
mod parser;
mod repository;

pub use expression::{parse_expression, ExpressionError};
pub use model::{
    Comparison, Expression, FormulaTemplate, FormulaTerm, FragmentDefinition, FragmentRef,
    FragmentScope, GeneralSettings, IntensityRule, RuleId, RuleKey, RuleOutcome, RuleScope,
    RuleSet, Term,
};
pub use parser::{parse_formula_template, parse_rule_set, RuleSyntaxError};
pub use repository::{
    DirectoryRuleSource, MemoryRuleSource, RuleLoadError, RuleRepository, RuleSource,
};
