//! Run-level counters shared by both terminal stages.
//!
//! The summary is the only state that outlives a record. It is append-only:
//! every method increments, nothing resets or decrements.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::RecordError;
use crate::resolve::LinkedRelease;

/// Ordered steps of the remote workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Create,
    OpenTendering,
    SubmitBids,
    Qualify,
    SubmitAwards,
    SubmitContracts,
    Complete,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::OpenTendering => "open_tendering",
            Self::SubmitBids => "submit_bids",
            Self::Qualify => "qualify",
            Self::SubmitAwards => "submit_awards",
            Self::SubmitContracts => "submit_contracts",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageTally {
    pub submitted: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub records_seen: u64,
    pub skipped_missing_payload: u64,
    pub skipped_malformed: u64,
    /// Records abandoned because stage 1 failed.
    pub records_failed: u64,
    /// Records that reached the end of their terminal stage.
    pub records_completed: u64,
    pub stages: BTreeMap<Stage, StageTally>,
    pub awards_excluded: u64,
    pub contracts_excluded: u64,
    pub ambiguous_bidders: u64,
    pub stored: u64,
    pub store_failed: u64,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn record_seen(&mut self) {
        self.records_seen += 1;
    }

    pub fn record_skipped(&mut self, err: &RecordError) {
        if err.is_missing_payload() {
            self.skipped_missing_payload += 1;
        } else {
            self.skipped_malformed += 1;
        }
    }

    pub fn records_skipped(&self) -> u64 {
        self.skipped_missing_payload + self.skipped_malformed
    }

    /// Count the references the resolver could not match.
    pub fn record_resolution(&mut self, linked: &LinkedRelease) {
        self.awards_excluded += linked.excluded_awards() as u64;
        self.contracts_excluded += linked.excluded_contracts() as u64;
        self.ambiguous_bidders += linked.ambiguities.len() as u64;
    }

    pub fn stage_submitted(&mut self, stage: Stage) {
        self.stages.entry(stage).or_default().submitted += 1;
    }

    pub fn stage_failed(&mut self, stage: Stage) {
        self.stages.entry(stage).or_default().failed += 1;
    }

    /// Add one record's tally for `stage`.
    pub fn add_stage(&mut self, stage: Stage, tally: StageTally) {
        let t = self.stages.entry(stage).or_default();
        t.submitted += tally.submitted;
        t.failed += tally.failed;
    }

    pub fn stage(&self, stage: Stage) -> StageTally {
        self.stages.get(&stage).copied().unwrap_or_default()
    }

    /// Awards dropped at run time because their bid was never created.
    pub fn exclude_awards(&mut self, n: u64) {
        self.awards_excluded += n;
    }

    /// Contracts dropped at run time because their award was never created.
    pub fn exclude_contracts(&mut self, n: u64) {
        self.contracts_excluded += n;
    }

    pub fn record_failed(&mut self) {
        self.records_failed += 1;
    }

    pub fn record_completed(&mut self) {
        self.records_completed += 1;
    }

    pub fn record_stored(&mut self, n: u64) {
        self.stored += n;
    }

    pub fn record_store_failed(&mut self, n: u64) {
        self.store_failed += n;
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn stage_failures(&self) -> u64 {
        self.stages.values().map(|t| t.failed).sum()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "records seen:        {}", self.records_seen)?;
        writeln!(
            f,
            "records skipped:     {} (missing payload {}, malformed {})",
            self.records_skipped(),
            self.skipped_missing_payload,
            self.skipped_malformed
        )?;
        writeln!(f, "records completed:   {}", self.records_completed)?;
        if self.records_failed > 0 {
            writeln!(f, "records failed:      {}", self.records_failed)?;
        }
        writeln!(f, "awards excluded:     {}", self.awards_excluded)?;
        writeln!(f, "contracts excluded:  {}", self.contracts_excluded)?;
        if self.ambiguous_bidders > 0 {
            writeln!(f, "ambiguous bidders:   {}", self.ambiguous_bidders)?;
        }
        if self.stored > 0 || self.store_failed > 0 {
            writeln!(f, "stored:              {} ({} failed)", self.stored, self.store_failed)?;
        }
        for (stage, tally) in &self.stages {
            writeln!(
                f,
                "  {:<18} {:>6} submitted {:>6} failed",
                stage.as_str(),
                tally.submitted,
                tally.failed
            )?;
        }
        if self.cancelled {
            writeln!(f, "run cancelled before end of input")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_records_are_split_by_cause() {
        let mut s = RunSummary::default();
        s.record_skipped(&RecordError::MissingPayload("compiledRelease".into()));
        s.record_skipped(&RecordError::malformed("tender.value.amount", "negative"));
        s.record_skipped(&RecordError::NotAnObject);
        assert_eq!(s.skipped_missing_payload, 1);
        assert_eq!(s.skipped_malformed, 2);
        assert_eq!(s.records_skipped(), 3);
    }

    #[test]
    fn stage_tallies_accumulate() {
        let mut s = RunSummary::default();
        s.stage_submitted(Stage::SubmitBids);
        s.stage_submitted(Stage::SubmitBids);
        s.stage_failed(Stage::SubmitBids);
        s.stage_failed(Stage::Complete);
        s.add_stage(Stage::SubmitBids, StageTally { submitted: 1, failed: 0 });
        assert_eq!(s.stage(Stage::SubmitBids), StageTally { submitted: 3, failed: 1 });
        assert_eq!(s.stage(Stage::Qualify), StageTally::default());
        assert_eq!(s.stage_failures(), 2);
    }

    #[test]
    fn stages_display_in_workflow_order() {
        let mut s = RunSummary::default();
        s.stage_submitted(Stage::Complete);
        s.stage_submitted(Stage::Create);
        let out = s.to_string();
        assert!(out.find("  create ").unwrap() < out.find("  complete ").unwrap());
    }

    #[test]
    fn serializes_stage_names() {
        let mut s = RunSummary::default();
        s.stage_submitted(Stage::OpenTendering);
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["stages"]["open_tendering"]["submitted"], 1);
    }
}
