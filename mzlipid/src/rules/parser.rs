/*! Reading the line-oriented fragment rule format.

```text
[GENERAL]
AmountOfChains=2
ChainCutoff=10%

[HEAD]
!FRAGMENTS
Name=Head_184 Formula=C5H15NO4P Charge=1 mandatory=true
!INTENSITIES
Equation=Head_184>0.05*$BASEPEAK mandatory=true

[CHAINS]
!FRAGMENTS
Name=NL_FA Formula=$PRECURSOR-$CHAIN Charge=1 mandatory=false

[POSITION]
!INTENSITIES
Equation=NL_FA[2]>NL_FA[1] mandatory=false
```
*/
use std::collections::HashSet;
use std::sync::LazyLock;

use nom::{
    branch::alt,
    character::complete::{alphanumeric0, char},
    combinator::{all_consuming, map, opt},
    multi::{many0, many1},
    sequence::{pair, preceded},
};
use regex::Regex;
use thiserror::Error;

use super::expression::parse_expression;
use super::model::{
    FormulaTemplate, FormulaTerm, FragmentDefinition, FragmentRef, FragmentScope, GeneralSettings,
    IntensityRule, RuleId, RuleKey, RuleScope, RuleSet,
};
use crate::formula::ChemicalFormula;
use crate::parsers::{atomic_offset, error_offset, sign, ParseResult};

static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(?P<section>[A-Za-z]+)\]$").unwrap());

static SUBSECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^!(?P<subsection>[A-Za-z]+)$").unwrap());

static SETTING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<key>[A-Za-z]+)\s*=\s*(?P<value>\S+)$").unwrap());

static FRAGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^Name=(?P<name>[A-Za-z_][A-Za-z0-9_]*)",
        r"\s+Formula=(?P<formula>\S+)",
        r"\s+Charge=(?P<charge>[+-]?\d+)",
        r"(?:\s+MSLevel=(?P<ms_level>\d+))?",
        r"(?:\s+Tolerance=(?P<tolerance>\d*\.?\d+(?:[eE][+-]?\d+)?))?",
        r"\s+mandatory=(?P<mandatory>(?i:true|false))$"
    ))
    .unwrap()
});

static RULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Equation=(?P<equation>.+?)\s+mandatory=(?P<mandatory>(?i:true|false))$").unwrap()
});

/// A malformed line in a rule file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{lipid_class}/{adduct} line {line}: {message}")]
pub struct RuleSyntaxError {
    pub lipid_class: String,
    pub adduct: String,
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    General,
    Head,
    Chains,
    Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subsection {
    None,
    Fragments,
    Intensities,
}

enum TemplatePiece<'s> {
    Variable(&'s str),
    Literal(Vec<(&'s str, i32)>),
}

/// Template Term = "$" , { letter | digit } | Atomic Offset , { Atomic Offset } ;
fn template_term(i: &str) -> ParseResult<'_, TemplatePiece<'_>> {
    alt((
        map(preceded(char('$'), alphanumeric0), TemplatePiece::Variable),
        map(many1(atomic_offset), TemplatePiece::Literal),
    ))(i)
}

/// Formula Template = [ Sign ] , Template Term , { Sign , Template Term } ;
///
/// A sign followed by digits is a count, so literal negative counts like `H-1` survive.
fn formula_template(i: &str) -> ParseResult<'_, Vec<(i32, TemplatePiece<'_>)>> {
    let (i, first_sign) = opt(sign)(i)?;
    let (i, first) = template_term(i)?;
    let (i, rest) = many0(pair(sign, template_term))(i)?;
    let mut pieces = vec![(first_sign.unwrap_or(1), first)];
    pieces.extend(rest);
    Ok((i, pieces))
}

pub fn parse_formula_template(text: &str) -> Result<FormulaTemplate, String> {
    let (_, pieces) = all_consuming(formula_template)(text).map_err(|e| {
        format!(
            "Malformed formula {text:?} at offset {}",
            error_offset(text, &e)
        )
    })?;
    let mut terms = Vec::with_capacity(pieces.len());
    for (sign, piece) in pieces {
        let term = match piece {
            TemplatePiece::Variable("PRECURSOR") => FormulaTerm::Precursor,
            TemplatePiece::Variable("CHAIN") => FormulaTerm::Chain,
            TemplatePiece::Variable(other) => return Err(format!("Unknown variable ${other}")),
            TemplatePiece::Literal(offsets) => FormulaTerm::Literal(
                ChemicalFormula::from_atomic_offsets(text, &offsets).map_err(|e| e.to_string())?,
            ),
        };
        terms.push((sign, term));
    }
    Ok(FormulaTemplate {
        terms,
        text: text.to_string(),
    })
}

/// Read a percentage (`10%`) or a fraction (`0.1`)
fn parse_fraction(value: &str) -> Result<f64, String> {
    let (number, scale) = match value.strip_suffix('%') {
        Some(v) => (v, 100.0),
        None => (value, 1.0),
    };
    let x: f64 = number
        .parse()
        .map_err(|_| format!("Malformed fraction {value:?}"))?;
    let x = x / scale;
    if !(0.0..=1.0).contains(&x) {
        return Err(format!("Fraction {value:?} must lie between 0 and 1"));
    }
    Ok(x)
}

fn syntax_error(key: &RuleKey, line: usize, message: impl Into<String>) -> RuleSyntaxError {
    RuleSyntaxError {
        lipid_class: key.lipid_class.clone(),
        adduct: key.adduct.clone(),
        line,
        message: message.into(),
    }
}

struct RuleFileParser<'a> {
    key: &'a RuleKey,
    section: Section,
    subsection: Subsection,
    general: GeneralSettings,
    head_fragments: Vec<FragmentDefinition>,
    chain_fragments: Vec<FragmentDefinition>,
    rules: Vec<IntensityRule>,
    names: HashSet<String>,
}

impl<'a> RuleFileParser<'a> {
    fn new(key: &'a RuleKey) -> Self {
        Self {
            key,
            section: Section::None,
            subsection: Subsection::None,
            general: GeneralSettings::default(),
            head_fragments: Vec::new(),
            chain_fragments: Vec::new(),
            rules: Vec::new(),
            names: HashSet::new(),
        }
    }

    fn error(&self, line: usize, message: impl Into<String>) -> RuleSyntaxError {
        syntax_error(self.key, line, message)
    }

    fn feed(&mut self, line: usize, content: &str) -> Result<(), RuleSyntaxError> {
        if let Some(caps) = SECTION_RE.captures(content) {
            self.section = match caps["section"].to_ascii_uppercase().as_str() {
                "GENERAL" => Section::General,
                "HEAD" => Section::Head,
                "CHAINS" => Section::Chains,
                "POSITION" => Section::Position,
                other => return Err(self.error(line, format!("Unknown section [{other}]"))),
            };
            self.subsection = Subsection::None;
            return Ok(());
        }
        if let Some(caps) = SUBSECTION_RE.captures(content) {
            let subsection = match caps["subsection"].to_ascii_uppercase().as_str() {
                "FRAGMENTS" => Subsection::Fragments,
                "INTENSITIES" => Subsection::Intensities,
                other => return Err(self.error(line, format!("Unknown subsection !{other}"))),
            };
            match (self.section, subsection) {
                (Section::Head | Section::Chains, _) | (Section::Position, Subsection::Intensities) => {}
                _ => {
                    return Err(self.error(line, "This section does not accept that subsection"));
                }
            }
            self.subsection = subsection;
            return Ok(());
        }
        match (self.section, self.subsection) {
            (Section::General, _) => self.feed_setting(line, content),
            (Section::Head, Subsection::Fragments) => self.feed_fragment(line, content, FragmentScope::Head),
            (Section::Chains, Subsection::Fragments) => self.feed_fragment(line, content, FragmentScope::Chain),
            (Section::Head, Subsection::Intensities) => self.feed_rule(line, content, RuleScope::Head),
            (Section::Chains, Subsection::Intensities) => self.feed_rule(line, content, RuleScope::Chain),
            (Section::Position, Subsection::Intensities) => self.feed_rule(line, content, RuleScope::Position),
            _ => Err(self.error(line, "Content outside of a section or subsection")),
        }
    }

    fn feed_setting(&mut self, line: usize, content: &str) -> Result<(), RuleSyntaxError> {
        let caps = SETTING_RE
            .captures(content)
            .ok_or_else(|| self.error(line, "Expected `Key=Value`"))?;
        let value = &caps["value"];
        let key = self.key;
        let to_err = |m: String| syntax_error(key, line, m);
        match &caps["key"] {
            "AmountOfChains" => {
                let n: usize = value
                    .parse()
                    .map_err(|_| to_err(format!("Malformed chain count {value:?}")))?;
                if n == 0 {
                    return Err(to_err("AmountOfChains must be at least 1".into()));
                }
                self.general.amount_of_chains = n;
            }
            "ChainCutoff" => self.general.chain_cutoff = parse_fraction(value).map_err(to_err)?,
            "BasePeakCutoff" => self.general.base_peak_cutoff = parse_fraction(value).map_err(to_err)?,
            "RetentionTimeTolerance" => {
                let x: f64 = value
                    .parse()
                    .map_err(|_| to_err(format!("Malformed tolerance {value:?}")))?;
                if x < 0.0 {
                    return Err(to_err("RetentionTimeTolerance must not be negative".into()));
                }
                self.general.retention_time_tolerance = Some(x);
            }
            "NearTieDelta" => self.general.near_tie_delta = Some(parse_fraction(value).map_err(to_err)?),
            "MSLevel" => {
                self.general.ms_level = value
                    .parse()
                    .map_err(|_| to_err(format!("Malformed MS level {value:?}")))?;
            }
            other => return Err(to_err(format!("Unknown setting {other}"))),
        }
        Ok(())
    }

    fn feed_fragment(&mut self, line: usize, content: &str, scope: FragmentScope) -> Result<(), RuleSyntaxError> {
        let caps = FRAGMENT_RE
            .captures(content)
            .ok_or_else(|| self.error(line, "Malformed fragment definition"))?;
        let name = caps["name"].to_string();
        if !self.names.insert(name.clone()) {
            return Err(self.error(line, format!("Fragment {name} is defined more than once")));
        }
        let formula = parse_formula_template(&caps["formula"]).map_err(|m| self.error(line, m))?;
        match scope {
            FragmentScope::Head if formula.uses_chain() => {
                return Err(self.error(line, "Head fragments may not refer to $CHAIN"));
            }
            FragmentScope::Chain if !formula.uses_chain() => {
                return Err(self.error(line, "Chain fragments must refer to $CHAIN"));
            }
            _ => {}
        }
        let charge: i32 = caps["charge"]
            .parse()
            .map_err(|_| self.error(line, "Malformed charge"))?;
        if charge == 0 {
            return Err(self.error(line, "Fragment charge may not be zero"));
        }
        let ms_level = match caps.name("ms_level") {
            Some(m) => m
                .as_str()
                .parse()
                .map_err(|_| self.error(line, "Malformed MS level"))?,
            None => self.general.ms_level,
        };
        let tolerance = match caps.name("tolerance") {
            Some(m) => Some(
                m.as_str()
                    .parse::<f64>()
                    .map_err(|_| self.error(line, "Malformed tolerance"))?,
            ),
            None => None,
        };
        let fragment = FragmentDefinition {
            name,
            formula,
            charge,
            ms_level,
            tolerance,
            mandatory: caps["mandatory"].eq_ignore_ascii_case("true"),
            scope,
            line,
        };
        match scope {
            FragmentScope::Head => self.head_fragments.push(fragment),
            FragmentScope::Chain => self.chain_fragments.push(fragment),
        }
        Ok(())
    }

    fn feed_rule(&mut self, line: usize, content: &str, scope: RuleScope) -> Result<(), RuleSyntaxError> {
        let caps = RULE_RE
            .captures(content)
            .ok_or_else(|| self.error(line, "Malformed intensity rule"))?;
        let text = caps["equation"].trim().to_string();
        let expression = parse_expression(&text).map_err(|e| self.error(line, e.to_string()))?;
        let rule = IntensityRule {
            id: RuleId(self.rules.len()),
            scope,
            mandatory: caps["mandatory"].eq_ignore_ascii_case("true"),
            expression,
            text,
            line,
        };
        self.rules.push(rule);
        Ok(())
    }

    /// Check every rule refers only to fragments visible from its scope
    fn validate(&self) -> Result<(), RuleSyntaxError> {
        let is_head = |n: &str| self.head_fragments.iter().any(|f| f.name == n);
        let is_chain = |n: &str| self.chain_fragments.iter().any(|f| f.name == n);
        for rule in self.rules.iter() {
            for reference in rule.expression.references() {
                let FragmentRef::Fragment { name, position } = reference else {
                    continue;
                };
                let problem = match (rule.scope, position) {
                    (RuleScope::Head, None) if is_head(name) => None,
                    (RuleScope::Head, None) if is_chain(name) => {
                        Some(format!("Head rules may not refer to chain fragment {name}"))
                    }
                    (RuleScope::Chain, None) if is_head(name) || is_chain(name) => None,
                    (RuleScope::Head | RuleScope::Chain, Some(_)) => {
                        Some(format!("Only position rules may index {name}"))
                    }
                    (RuleScope::Position, None) => {
                        Some(format!("Position rules must index {name} with a chain position"))
                    }
                    (RuleScope::Position, Some(k)) if is_chain(name) => {
                        if *k == 0 || *k > self.general.amount_of_chains {
                            Some(format!(
                                "Position {k} of {name} is outside 1..={}",
                                self.general.amount_of_chains
                            ))
                        } else {
                            None
                        }
                    }
                    (RuleScope::Position, Some(_)) if is_head(name) => {
                        Some(format!("Position rules may only refer to chain fragments, not {name}"))
                    }
                    _ => Some(format!("Unknown fragment {name}")),
                };
                if let Some(message) = problem {
                    return Err(self.error(rule.line, message));
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<RuleSet, RuleSyntaxError> {
        self.validate()?;
        Ok(RuleSet {
            key: self.key.clone(),
            general: self.general,
            head_fragments: self.head_fragments,
            chain_fragments: self.chain_fragments,
            rules: self.rules,
        })
    }
}

/// Compile the rule text for `key` into a [`RuleSet`]
pub fn parse_rule_set(text: &str, key: &RuleKey) -> Result<RuleSet, RuleSyntaxError> {
    let mut parser = RuleFileParser::new(key);
    for (i, raw) in text.lines().enumerate() {
        let content = raw.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }
        parser.feed(i + 1, content)?;
    }
    parser.finish()
}
