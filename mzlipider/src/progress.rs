use std::ops::{Add, AddAssign};

use mzlipid::{Classification, IdentificationResult, IdentificationState};

/// Counts of hits by outcome, summed across workers
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressRecord {
    pub hits: usize,
    pub skipped: usize,
    pub fragments_detected: usize,
    pub head_group_detected: usize,
    pub no_msn_present: usize,
    pub discarded: usize,
    pub not_found: usize,
    pub position_correct: usize,
}

impl ProgressRecord {
    pub fn skipped() -> Self {
        Self {
            skipped: 1,
            ..Default::default()
        }
    }
}

impl From<&IdentificationResult> for ProgressRecord {
    fn from(result: &IdentificationResult) -> Self {
        let mut prog = Self {
            hits: 1,
            ..Default::default()
        };
        match result.state {
            IdentificationState::NoMsnPresent => prog.no_msn_present += 1,
            IdentificationState::HeadGroupDetected => prog.head_group_detected += 1,
            IdentificationState::FragmentsDetected => prog.fragments_detected += 1,
            IdentificationState::DiscardHit => prog.discarded += 1,
        }
        match result.classification {
            Classification::NotFound => prog.not_found += 1,
            Classification::PositionCorrect => prog.position_correct += 1,
            _ => {}
        }
        prog
    }
}

impl Add for ProgressRecord {
    type Output = ProgressRecord;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for ProgressRecord {
    fn add_assign(&mut self, rhs: Self) {
        self.hits += rhs.hits;
        self.skipped += rhs.skipped;
        self.fragments_detected += rhs.fragments_detected;
        self.head_group_detected += rhs.head_group_detected;
        self.no_msn_present += rhs.no_msn_present;
        self.discarded += rhs.discarded;
        self.not_found += rhs.not_found;
        self.position_correct += rhs.position_correct;
    }
}
