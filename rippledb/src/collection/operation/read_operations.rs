use super::document_store::DocumentStore;
use crate::collection::sort::DocumentSorter;
use crate::collection::{Document, FindOptions, FindPlan};
use crate::common::Value;
use crate::errors::RippleResult;
use crate::query::{BooleanMode, Query};
use std::time::Instant;

/// Evaluates a plan against the store: the candidate keys of the plan (or
/// every document) go through the matcher unless the plan is exact.
///
/// Results come back in collection order.
pub(crate) fn select(store: &DocumentStore, plan: &mut FindPlan) -> RippleResult<Vec<Document>> {
    let query = Query::parse(&plan.query)?;
    let started = Instant::now();

    let documents: Vec<&Document> = match &plan.candidates {
        Some(keys) => keys.iter().filter_map(|key| store.get(key)).collect(),
        None => store.documents().collect(),
    };
    plan.record("lookup", started.elapsed());

    if !plan.residual_scan {
        return Ok(documents.into_iter().cloned().collect());
    }

    let started = Instant::now();
    plan.scan_length = documents.len();
    let selected = documents
        .into_iter()
        .filter(|document| query.matches(document, BooleanMode::And))
        .cloned()
        .collect();
    plan.record("scan", started.elapsed());
    Ok(selected)
}

/// Primary keys of the documents matching `plan`, in collection order.
pub(crate) fn select_keys(store: &DocumentStore, plan: &mut FindPlan) -> RippleResult<Vec<Value>> {
    let primary = store.primary();
    Ok(select(store, plan)?
        .iter()
        .filter_map(|document| primary.key_of(document))
        .collect())
}

/// Sorts, joins and pages selected documents.
///
/// Joined collections are queried here, so the caller must not hold the
/// lock of its own store.
pub(crate) fn finish(
    documents: Vec<Document>,
    plan: &mut FindPlan,
    options: &FindOptions,
) -> RippleResult<Vec<Document>> {
    let mut documents = documents;

    if options.has_sort() {
        let started = Instant::now();
        documents = DocumentSorter::new(options)?.sort(documents);
        plan.record("sort", started.elapsed());
    }

    if !options.joins.is_empty() {
        let started = Instant::now();
        documents = join(documents, plan, options)?;
        plan.record("join", started.elapsed());
    }

    let skip = options.skip.unwrap_or(0);
    let limit = options.limit.unwrap_or(usize::MAX);
    if skip > 0 || limit < documents.len() {
        documents = documents.into_iter().skip(skip).take(limit).collect();
    }
    Ok(documents)
}

fn join(documents: Vec<Document>, plan: &FindPlan, options: &FindOptions) -> RippleResult<Vec<Document>> {
    let mut joined = Vec::with_capacity(documents.len());
    'rows: for mut row in documents {
        for join in &options.joins {
            let result_key = join.result_key();
            let constraint = plan.join_queries.get(&result_key);

            let matches = match join.search_for(&row) {
                Some(search) => {
                    let search = match constraint {
                        Some(constraint) => crate::doc! {
                            "$and": [(Value::Document(search)), (Value::Document(constraint.clone()))]
                        },
                        None => search,
                    };
                    join.collection().find(&search)?
                }
                None => vec![],
            };

            if matches.is_empty() && (join.is_required() || constraint.is_some()) {
                continue 'rows;
            }
            join.attach(&mut row, matches);
        }
        joined.push(row);
    }
    Ok(joined)
}
