//! Run counters for the linker jobs.
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! these calls are no-ops.

use crate::types::MatchTier;

pub struct LinkerMetrics;

impl LinkerMetrics {
    pub fn record_tickets_extracted(count: usize) {
        ::metrics::counter!("linker_tickets_extracted_total").increment(count as u64);
    }

    pub fn record_windows_parsed(count: usize) {
        ::metrics::counter!("linker_windows_parsed_total").increment(count as u64);
    }

    pub fn record_match(tier: MatchTier) {
        ::metrics::counter!("linker_matches_total", "tier" => tier.as_str()).increment(1);
    }

    pub fn record_unmatched(count: usize) {
        ::metrics::counter!("linker_unmatched_windows_total").increment(count as u64);
    }

    pub fn record_blocks_inserted(count: usize) {
        ::metrics::counter!("linker_blocks_inserted_total").increment(count as u64);
    }

    /// `reason` is `broken` or `duplicate`
    pub fn record_block_removed(reason: &'static str) {
        ::metrics::counter!("linker_blocks_removed_total", "reason" => reason).increment(1);
    }

    pub fn record_job_duration(job: &'static str, duration_secs: f64) {
        ::metrics::histogram!("linker_job_duration_seconds", "job" => job).record(duration_secs);
    }
}
