use super::document_store::DocumentStore;
use crate::collection::{Document, FindOptions, FindPlan, IndexMatch};
use crate::common::{is_operator_document, ReadExecutor, Value};
use crate::index::{IndexCoverage, IndexStrategy};
use crate::FIELD_SEPARATOR;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::time::Instant;

/// Decides how a query is evaluated against a collection.
///
/// The primary key is consulted first: an exact primary-key constraint is a
/// single hash probe. Otherwise every secondary index reports its coverage
/// and the best ranked usable index supplies the candidates.
pub(crate) struct FindOptimizer;

impl FindOptimizer {
    pub fn create_find_plan(store: &DocumentStore, query: &Document, options: &FindOptions) -> FindPlan {
        let started = Instant::now();
        let (base_query, join_queries) = split_join_queries(query, options);

        let mut plan = FindPlan::new(base_query);
        plan.joins_on = options.joins.iter().map(|join| join.collection().name()).collect();
        plan.join_queries = join_queries;

        if plan.query.is_empty() {
            plan.residual_scan = false;
        } else if !options.skip_index && !Self::plan_primary_key(store, &mut plan) {
            Self::plan_index_scan(store, &mut plan);
        }

        plan.record("analyse", started.elapsed());
        plan
    }

    fn plan_primary_key(store: &DocumentStore, plan: &mut FindPlan) -> bool {
        let coverage = store.primary().coverage(&plan.query);
        if !coverage.is_usable() {
            return false;
        }

        plan.uses_primary_key = true;
        plan.residual_scan = !coverage.is_full();
        plan.candidates = Some(store.primary().lookup(&plan.query));
        true
    }

    fn plan_index_scan(store: &DocumentStore, plan: &mut FindPlan) {
        let mut ranked: Vec<(IndexMatch, Vec<Value>)> = store
            .indexes()
            .filter_map(|index| {
                let coverage = index.coverage(&plan.query);
                coverage.is_usable().then(|| {
                    let lookup = index.lookup(&plan.query);
                    (index_match(index, coverage, lookup.len()), lookup)
                })
            })
            .collect();
        ranked.sort_by(|(a, _), (b, _)| rank(a, b));

        let Some((best, mut candidates)) = ranked.first().cloned() else {
            return;
        };
        log::debug!(
            "Using index {} ({}/{} keys) for {}",
            best.index_name,
            best.coverage.matched_key_count,
            best.coverage.total_key_count,
            plan.query
        );

        let primary = store.primary();
        candidates.sort_by_key(|key| primary.position(key));
        plan.residual_scan = !best.is_exact();
        plan.chosen_index = Some(best.index_name);
        plan.candidates = Some(candidates);
        plan.index_matches = ranked.into_iter().map(|(m, _)| m).collect();
    }
}

fn index_match(
    index: &dyn IndexStrategy,
    coverage: IndexCoverage,
    lookup_size: usize,
) -> IndexMatch {
    IndexMatch {
        index_name: index.descriptor().name().to_string(),
        coverage,
        lookup_size,
        multikey: index.is_multikey(),
    }
}

/// Full coverage first, then more matched keys, then fewer candidates.
fn rank(a: &IndexMatch, b: &IndexMatch) -> Ordering {
    b.coverage
        .is_full()
        .cmp(&a.coverage.is_full())
        .then_with(|| b.coverage.matched_key_count.cmp(&a.coverage.matched_key_count))
        .then_with(|| a.lookup_size.cmp(&b.lookup_size))
}

/// Moves query keys naming a join result out of the base query.
///
/// `{orders: {status: "open"}}` and `{"orders.status": "open"}` both become
/// the join sub-query `{status: "open"}` for a join stored under `orders`.
fn split_join_queries(query: &Document, options: &FindOptions) -> (Document, IndexMap<String, Document>) {
    if options.joins.is_empty() {
        return (query.clone(), IndexMap::new());
    }

    let separator = FIELD_SEPARATOR.read_with(|it| it.clone());
    let result_keys: Vec<String> = options.joins.iter().map(|join| join.result_key()).collect();
    let mut base = Document::new();
    let mut join_queries: IndexMap<String, Document> = IndexMap::new();

    'keys: for (key, value) in query.iter() {
        for result_key in &result_keys {
            if key == result_key {
                if let Value::Document(sub) = value {
                    if !is_operator_document(sub) {
                        let entry = join_queries.entry(result_key.clone()).or_default();
                        for (sub_key, sub_value) in sub.iter() {
                            entry.put(sub_key.as_str(), sub_value.clone());
                        }
                        continue 'keys;
                    }
                }
            }

            let prefix = format!("{}{}", result_key, separator);
            if let Some(rest) = key.strip_prefix(&prefix) {
                join_queries
                    .entry(result_key.clone())
                    .or_default()
                    .put(rest, value.clone());
                continue 'keys;
            }
        }
        base.put(key.as_str(), value.clone());
    }
    (base, join_queries)
}
