use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use thiserror::Error;
use tracing::debug;

use super::model::{RuleKey, RuleSet};
use super::parser::{parse_rule_set, RuleSyntaxError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleLoadError {
    #[error(transparent)]
    Syntax(#[from] RuleSyntaxError),
    #[error("No rules are defined for {0}")]
    NotFound(RuleKey),
    #[error("Failed to read rules for {key} from {path}: {message}")]
    Io {
        key: RuleKey,
        path: String,
        message: String,
    },
}

/// Supplies the raw rule text for a class/adduct pair
pub trait RuleSource: Send + Sync {
    fn rule_text(&self, key: &RuleKey) -> Result<String, RuleLoadError>;
}

/// Reads `{root}/{class}_{adduct}.frag.txt`
#[derive(Debug, Clone)]
pub struct DirectoryRuleSource {
    pub root: PathBuf,
}

impl DirectoryRuleSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &RuleKey) -> PathBuf {
        self.root
            .join(format!("{}_{}.frag.txt", key.lipid_class, key.adduct))
    }
}

impl RuleSource for DirectoryRuleSource {
    fn rule_text(&self, key: &RuleKey) -> Result<String, RuleLoadError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RuleLoadError::NotFound(key.clone()))
            }
            Err(e) => Err(RuleLoadError::Io {
                key: key.clone(),
                path: path.display().to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Serves rule text held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryRuleSource {
    texts: HashMap<RuleKey, String>,
}

impl MemoryRuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, lipid_class: &str, adduct: &str, text: &str) {
        self.texts
            .insert(RuleKey::new(lipid_class, adduct), text.to_string());
    }

    pub fn with_rules(mut self, lipid_class: &str, adduct: &str, text: &str) -> Self {
        self.insert(lipid_class, adduct, text);
        self
    }
}

impl RuleSource for MemoryRuleSource {
    fn rule_text(&self, key: &RuleKey) -> Result<String, RuleLoadError> {
        self.texts
            .get(key)
            .cloned()
            .ok_or_else(|| RuleLoadError::NotFound(key.clone()))
    }
}

type RuleCell = Arc<OnceLock<Result<Arc<RuleSet>, RuleLoadError>>>;

/// Compiles rule sets on first request and serves them read-only afterwards.
///
/// Each class/adduct key owns a cell that is initialized at most once, so concurrent
/// first requests for the same key wait on a single compilation instead of repeating it.
/// Failures are cached the same way.
pub struct RuleRepository {
    source: Box<dyn RuleSource>,
    cells: RwLock<HashMap<RuleKey, RuleCell>>,
    compilations: AtomicUsize,
}

impl std::fmt::Debug for RuleRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRepository")
            .field("compilations", &self.compilations.load(Ordering::Relaxed))
            .finish()
    }
}

impl RuleRepository {
    pub fn new<S: RuleSource + 'static>(source: S) -> Self {
        Self {
            source: Box::new(source),
            cells: RwLock::new(HashMap::new()),
            compilations: AtomicUsize::new(0),
        }
    }

    fn cell_for(&self, key: &RuleKey) -> RuleCell {
        if let Some(cell) = self
            .cells
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return cell.clone();
        }
        self.cells
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone()
    }

    fn compile(&self, key: &RuleKey) -> Result<Arc<RuleSet>, RuleLoadError> {
        self.compilations.fetch_add(1, Ordering::SeqCst);
        let text = self.source.rule_text(key)?;
        let rules = parse_rule_set(&text, key)?;
        debug!(
            "Compiled rules for {key}: {} head fragments, {} chain fragments, {} rules",
            rules.head_fragments.len(),
            rules.chain_fragments.len(),
            rules.rules.len()
        );
        Ok(Arc::new(rules))
    }

    pub fn load_rules(&self, lipid_class: &str, adduct: &str) -> Result<Arc<RuleSet>, RuleLoadError> {
        let key = RuleKey::new(lipid_class, adduct);
        self.cell_for(&key)
            .get_or_init(|| self.compile(&key))
            .clone()
    }

    /// The number of times a rule set has been compiled, successfully or not
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::SeqCst)
    }

    /// The keys requested so far
    pub fn loaded_keys(&self) -> Vec<RuleKey> {
        let mut keys: Vec<RuleKey> = self
            .cells
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}
