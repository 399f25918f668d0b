use crate::collection::Document;
use crate::common::Value;
use crate::index::IndexCoverage;
use indexmap::IndexMap;
use std::fmt::{Debug, Formatter};
use std::time::Duration;

/// A secondary index considered by the planner, with its coverage of the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMatch {
    pub index_name: String,
    pub coverage: IndexCoverage,
    /// Number of candidate documents the index lookup returned.
    pub lookup_size: usize,
    pub multikey: bool,
}

impl IndexMatch {
    /// Whether the index alone resolves the query.
    pub fn is_exact(&self) -> bool {
        self.coverage.is_full() && !self.multikey
    }
}

/// Represents an execution plan for a query.
///
/// A `FindPlan` describes how a query is executed:
///
/// * **Primary key** - whether the query is answered by a primary-key lookup
/// * **Index usage** - the ranked usable secondary indexes and the chosen one
/// * **Residual scan** - whether candidates still go through the matcher
/// * **Joins** - the join collections and the sub-queries constraining them
/// * **Timings** - how long each step of the execution took
///
/// `Collection::explain` returns the plan of an executed query.
#[derive(Clone, Default)]
pub struct FindPlan {
    pub(crate) query: Document,
    pub(crate) uses_primary_key: bool,
    pub(crate) index_matches: Vec<IndexMatch>,
    pub(crate) chosen_index: Option<String>,
    pub(crate) residual_scan: bool,
    pub(crate) joins_on: Vec<String>,
    pub(crate) join_queries: IndexMap<String, Document>,
    pub(crate) scan_length: usize,
    pub(crate) timings: Vec<(String, Duration)>,
    pub(crate) candidates: Option<Vec<Value>>,
}

impl FindPlan {
    pub(crate) fn new(query: Document) -> Self {
        FindPlan {
            query,
            residual_scan: true,
            ..Default::default()
        }
    }

    /// The query evaluated against this collection, without join constraints.
    pub fn query(&self) -> &Document {
        &self.query
    }

    /// Returns `true` when the query was resolved through the primary key.
    pub fn uses_primary_key(&self) -> bool {
        self.uses_primary_key
    }

    /// Usable secondary indexes, best first.
    ///
    /// An index matching every key of the query ranks first. Among the rest
    /// more matched keys win and ties go to the smaller candidate set.
    pub fn index_matches(&self) -> &[IndexMatch] {
        &self.index_matches
    }

    /// Name of the index whose lookup was scanned, if any.
    pub fn chosen_index(&self) -> Option<&str> {
        self.chosen_index.as_deref()
    }

    /// Returns `true` when index use was not exhaustive and the candidates
    /// were filtered by the matcher.
    pub fn requires_residual_scan(&self) -> bool {
        self.residual_scan
    }

    /// Returns `true` when every document of the collection was scanned.
    pub fn is_table_scan(&self) -> bool {
        self.candidates.is_none()
    }

    /// Names of the collections joined into the results.
    pub fn joins_on(&self) -> &[String] {
        &self.joins_on
    }

    /// Sub-queries constraining joined data, keyed by join result name.
    pub fn join_queries(&self) -> &IndexMap<String, Document> {
        &self.join_queries
    }

    /// Returns `true` when the query filters on data produced by a join.
    pub fn queries_join(&self) -> bool {
        !self.join_queries.is_empty()
    }

    /// Number of documents passed through the matcher.
    pub fn scan_length(&self) -> usize {
        self.scan_length
    }

    /// Duration of each executed step, in order.
    pub fn timings(&self) -> &[(String, Duration)] {
        &self.timings
    }

    pub(crate) fn record(&mut self, step: &str, elapsed: Duration) {
        self.timings.push((step.to_string(), elapsed));
    }
}

impl Debug for FindPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FindPlan")
            .field("query", &self.query)
            .field("uses_primary_key", &self.uses_primary_key)
            .field("index_matches", &self.index_matches)
            .field("chosen_index", &self.chosen_index)
            .field("residual_scan", &self.residual_scan)
            .field("joins_on", &self.joins_on)
            .field("join_queries", &self.join_queries)
            .field("scan_length", &self.scan_length)
            .field("timings", &self.timings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_new_plan_is_table_scan() {
        let plan = FindPlan::new(doc! { age: 1 });
        assert!(plan.is_table_scan());
        assert!(plan.requires_residual_scan());
        assert!(!plan.uses_primary_key());
        assert!(!plan.queries_join());
        assert_eq!(plan.query(), &doc! { age: 1 });
    }

    #[test]
    fn test_index_match_exactness() {
        let exact = IndexMatch {
            index_name: "age_1".to_string(),
            coverage: IndexCoverage::new(1, 1),
            lookup_size: 3,
            multikey: false,
        };
        assert!(exact.is_exact());
        let multikey = IndexMatch { multikey: true, ..exact.clone() };
        assert!(!multikey.is_exact());
    }

    #[test]
    fn test_record_timings() {
        let mut plan = FindPlan::new(doc! {});
        plan.record("analyse", Duration::from_micros(5));
        assert_eq!(plan.timings().len(), 1);
        assert_eq!(plan.timings()[0].0, "analyse");
    }
}
