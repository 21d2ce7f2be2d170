use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Sender;
use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use mzlipid::{AnalysisContext, InMemoryScanCache, LipidIdentifier, Ms1Hit, RuleRepository};

use crate::progress::ProgressRecord;
use crate::types::HitResult;

/// A shared flag checked before each hit is started. Hits already in progress finish.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Identify every hit on the current rayon pool, sending each result keyed by its index
pub fn identify_hits(
    context: &AnalysisContext,
    scans: &InMemoryScanCache,
    rules: &RuleRepository,
    hits: Vec<(usize, Ms1Hit)>,
    sender: Sender<HitResult>,
    cancellation: &CancellationToken,
) -> ProgressRecord {
    let init_counter = AtomicU32::new(0);
    let started = Instant::now();
    let n = hits.len();
    info!("Identifying {n} hits");

    let prog = hits
        .into_par_iter()
        .map_init(
            || {
                init_counter.fetch_add(1, Ordering::AcqRel);
                LipidIdentifier::new(context, scans, rules)
            },
            |identifier, (idx, hit)| {
                if cancellation.is_cancelled() {
                    trace!("Skipping {} after cancellation", hit.id);
                    return ProgressRecord::skipped();
                }
                let span = tracing::debug_span!("hit", hit_index = idx);
                let _entered = span.enter();
                let result = identifier.identify_hit(&hit);
                let prog = ProgressRecord::from(&result);
                if sender.send((idx, result)).is_err() {
                    warn!("Result for hit {idx} could not be queued, the writer has stopped");
                }
                prog
            },
        )
        .reduce(ProgressRecord::default, |a, b| a + b);

    debug!(
        "{} identifiers were created for {n} hits in {:0.3?}",
        init_counter.load(Ordering::SeqCst),
        Instant::now() - started
    );
    prog
}

#[cfg(test)]
mod test {
    use super::*;
    use mzlipid::{AnalysisConfig, MemoryRuleSource};

    fn hits() -> Vec<(usize, Ms1Hit)> {
        (0..8)
            .map(|i| {
                let hit = Ms1Hit::new(
                    &format!("hit-{i}"),
                    "PC",
                    "H",
                    760.5851,
                    10.0,
                    1,
                    "C42H82NO8P".parse().unwrap(),
                );
                (i, hit)
            })
            .collect()
    }

    #[test]
    fn test_cancelled_hits_are_skipped() {
        let context = AnalysisContext::with_default_table(AnalysisConfig::default()).unwrap();
        let scans = InMemoryScanCache::default();
        let rules = RuleRepository::new(MemoryRuleSource::new());
        let (sender, receiver) = crossbeam_channel::unbounded();
        let token = CancellationToken::new();
        token.cancel();
        let prog = identify_hits(&context, &scans, &rules, hits(), sender, &token);
        assert_eq!(prog.skipped, 8);
        assert_eq!(prog.hits, 0);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_every_hit_is_sent() {
        let context = AnalysisContext::with_default_table(AnalysisConfig::default()).unwrap();
        let scans = InMemoryScanCache::default();
        let rules = RuleRepository::new(MemoryRuleSource::new());
        let (sender, receiver) = crossbeam_channel::unbounded();
        let prog = identify_hits(&context, &scans, &rules, hits(), sender, &CancellationToken::new());
        assert_eq!(prog.hits, 8);
        assert_eq!(prog.not_found, 8);
        let mut indices: Vec<usize> = receiver.iter().map(|(i, _)| i).collect();
        indices.sort();
        assert_eq!(indices, (0..8).collect::<Vec<_>>());
    }
}
