//! Pairing index: share of commits carrying a co-author trailer.

use serde::Serialize;

use super::derive::safe_pct;
use super::engine::PipelineQuery;
use super::filter::{FilterSpec, apply};
use super::types::{Aggregate, AnalyticsResult, EmptyReason, QueryOptions};
use crate::model::Commit;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PairingIndex {
    pub total_commits: u64,
    pub paired_commits: u64,
    /// Percentage rounded to two decimals; 0.0 for an empty log.
    pub pairing_index_percentage: f64,
}

/// True when `message` contains `trailer`, ignoring case. A blank trailer
/// never matches.
pub fn is_paired(message: &str, trailer: &str) -> bool {
    let needle = trailer.trim().to_lowercase();
    !needle.is_empty() && message.to_lowercase().contains(&needle)
}

pub fn pairing_index<'c, I>(commits: I, trailer: &str) -> PairingIndex
where
    I: IntoIterator<Item = &'c Commit>,
{
    let (total, paired) = commits.into_iter().fold((0u64, 0u64), |(total, paired), c| {
        (total + 1, paired + u64::from(is_paired(&c.message, trailer)))
    });
    PairingIndex {
        total_commits: total,
        paired_commits: paired,
        pairing_index_percentage: safe_pct(paired, total),
    }
}

impl PipelineQuery<'_> {
    /// Pairing index over commits authored within the optional date bounds.
    /// Undated commits only count when no bound is given.
    pub fn pairing_index(&self, opts: &QueryOptions, trailer: &str) -> AnalyticsResult<Aggregate<PairingIndex>> {
        let dates = FilterSpec::from_options(opts)?.dates_only();

        let commits = &self.snapshot().commits;
        if commits.is_empty() {
            return Ok(Aggregate::empty(EmptyReason::NoData));
        }

        let in_range = apply(commits, &dates);
        let index = pairing_index(in_range.iter().copied(), trailer);
        tracing::debug!(
            total = index.total_commits,
            paired = index.paired_commits,
            "pairing index computed"
        );
        if index.total_commits == 0 {
            return Ok(Aggregate::empty(EmptyReason::NoMatches));
        }
        Ok(Aggregate::populated(index))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::bucketing::parse_timestamp;
    use crate::analytics::types::AnalyticsError;
    use crate::storage::PipelineSnapshot;

    const TRAILER: &str = "co-authored-by:";

    fn commit(hash: &str, message: &str, at: &str) -> Commit {
        Commit {
            hash: hash.into(),
            message: message.into(),
            authored_at: parse_timestamp(at),
            ..Default::default()
        }
    }

    #[test]
    fn one_of_three_paired() {
        let commits = vec![
            commit("a", "Fix bug", "2023-10-01"),
            commit("b", "Fix bug", "2023-10-02"),
            commit(
                "c",
                "Fix bug\n\nCo-authored-by: dependabot[bot] <bot@noreply.github.com>",
                "2023-10-03",
            ),
        ];
        let index = pairing_index(&commits, TRAILER);
        assert_eq!(index.total_commits, 3);
        assert_eq!(index.paired_commits, 1);
        assert_eq!(index.pairing_index_percentage, 33.33);
    }

    #[test]
    fn empty_log_is_zero() {
        let index = pairing_index(&[], TRAILER);
        assert_eq!(index, PairingIndex::default());
    }

    #[test]
    fn blank_trailer_never_matches() {
        assert!(!is_paired("anything", "  "));
        assert!(is_paired("CO-AUTHORED-BY: x", TRAILER));
    }

    #[test]
    fn query_respects_date_bounds() {
        let snap = PipelineSnapshot::from_records(
            vec![],
            vec![],
            vec![
                commit("a", "Co-authored-by: x", "2023-10-01"),
                commit("b", "solo", "2023-10-05"),
                commit("c", "no date", ""),
            ],
        );
        let query = PipelineQuery::new(&snap);

        let all = query
            .pairing_index(&QueryOptions::default(), TRAILER)
            .unwrap()
            .into_data()
            .unwrap();
        assert_eq!(all.total_commits, 3);

        let opts = QueryOptions {
            start_date: Some("2023-10-01".into()),
            end_date: Some("2023-10-01".into()),
            ..Default::default()
        };
        let bounded = query.pairing_index(&opts, TRAILER).unwrap().into_data().unwrap();
        assert_eq!(bounded.total_commits, 1);
        assert_eq!(bounded.pairing_index_percentage, 100.0);
    }

    #[test]
    fn date_bounds_follow_shared_filter_rules() {
        let snap = PipelineSnapshot::from_records(
            vec![],
            vec![],
            vec![
                commit("a", "Co-authored-by: x", "2023-10-01"),
                commit("b", "solo", "2023-10-05"),
            ],
        );
        let query = PipelineQuery::new(&snap);

        let blank = QueryOptions {
            start_date: Some("  ".into()),
            end_date: Some(String::new()),
            ..Default::default()
        };
        let all = query.pairing_index(&blank, TRAILER).unwrap().into_data().unwrap();
        assert_eq!(all.total_commits, 2);

        let inverted = QueryOptions {
            start_date: Some("2023-10-05".into()),
            end_date: Some("2023-10-01".into()),
            ..Default::default()
        };
        assert!(matches!(
            query.pairing_index(&inverted, TRAILER),
            Err(AnalyticsError::InvalidArgument(_))
        ));

        let malformed = QueryOptions {
            end_date: Some("2023/10/05".into()),
            ..Default::default()
        };
        assert!(matches!(
            query.pairing_index(&malformed, TRAILER),
            Err(AnalyticsError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn no_commits_is_no_data() {
        let snap = PipelineSnapshot::default();
        let query = PipelineQuery::new(&snap);
        let agg = query.pairing_index(&QueryOptions::default(), TRAILER).unwrap();
        assert_eq!(agg.reason(), Some(&EmptyReason::NoData));
        assert_eq!(agg.unwrap_or_default().pairing_index_percentage, 0.0);
    }
}
