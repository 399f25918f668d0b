use crate::collection::Document;
use crate::common::{Path, Value, DEFAULT_INDEX_KIND};
use crate::errors::{ErrorKind, RippleError, RippleResult};
use crate::index::{IndexCoverage, IndexDescriptor, IndexKind, IndexKindProvider, IndexStrategy, KeyBounds};
use indexmap::IndexSet;
use itertools::Itertools;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::ops::Bound;

/// A key tuple, one component per indexed path.
pub type IndexKey = SmallVec<[Value; 2]>;

/// The default index kind: an ordered map from key tuples to primary keys.
///
/// It answers equality, `$in` and range tests on its key paths. A document
/// holding arrays along an indexed path is stored under every element (and
/// every combination, for compound keys); a document missing a path is
/// stored under `null` for that component.
pub struct KeyedIndexKind;

/// Returns the default index kind.
pub fn keyed_index_kind() -> IndexKind {
    IndexKind::new(KeyedIndexKind)
}

impl IndexKindProvider for KeyedIndexKind {
    fn kind_name(&self) -> String {
        DEFAULT_INDEX_KIND.to_string()
    }

    fn validate(&self, descriptor: &IndexDescriptor) -> RippleResult<()> {
        if descriptor.fields().iter().any(|f| f.path().is_empty()) {
            log::error!("Index {} has an empty key path", descriptor.name());
            return Err(RippleError::new(
                &format!("Index {} has an empty key path", descriptor.name()),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    fn create_index(&self, descriptor: IndexDescriptor) -> RippleResult<Box<dyn IndexStrategy>> {
        Ok(Box::new(KeyedIndex::new(descriptor)))
    }
}

pub struct KeyedIndex {
    descriptor: IndexDescriptor,
    paths: Vec<Path>,
    entries: BTreeMap<IndexKey, IndexSet<Value>>,
    multikey: bool,
}

impl KeyedIndex {
    pub fn new(descriptor: IndexDescriptor) -> Self {
        let paths = descriptor.fields().iter().map(|f| Path::new(f.path())).collect();
        KeyedIndex {
            descriptor,
            paths,
            entries: BTreeMap::new(),
            multikey: false,
        }
    }

    /// Every key tuple `document` is stored under, and whether producing them
    /// needed array fan-out.
    fn keys_of(&self, document: &Document) -> (Vec<IndexKey>, bool) {
        let mut fanned_out = false;
        let components: Vec<Vec<Value>> = self
            .paths
            .iter()
            .map(|path| {
                let mut values: Vec<Value> = path.values(document).into_iter().cloned().collect();
                values.sort();
                values.dedup();

                let strict = path.value(document);
                let single = values.len() == 1 && strict == values.first();
                if !single && !(values.is_empty() && strict.is_none()) {
                    fanned_out = true;
                }

                if values.is_empty() {
                    values.push(Value::Null);
                }
                values
            })
            .collect();

        let keys = components
            .into_iter()
            .multi_cartesian_product()
            .map(IndexKey::from_vec)
            .collect();
        (keys, fanned_out)
    }

    fn bounds_of(&self, query: &Document) -> Vec<Option<KeyBounds>> {
        let leaves = Path::parse(query);
        self.paths
            .iter()
            .map(|path| {
                leaves
                    .iter()
                    .find(|leaf| leaf.path == path.path())
                    .and_then(|leaf| KeyBounds::from_test(&leaf.value))
            })
            .collect()
    }

    fn violation(&self, key: &IndexKey) -> RippleError {
        let message = format!(
            "Index violation in index {}: key {:?} already exists",
            self.descriptor.name(),
            key.as_slice()
        );
        log::error!("{}", message);
        RippleError::new(&message, ErrorKind::IndexViolation)
    }

    fn scan<F>(&self, start: Option<&Value>, stop: impl Fn(&Value) -> bool, mut visit: F)
    where
        F: FnMut(&IndexKey, &IndexSet<Value>),
    {
        let entries: Box<dyn Iterator<Item = (&IndexKey, &IndexSet<Value>)>> = match start {
            Some(value) => {
                let from: IndexKey = SmallVec::from_elem(value.clone(), 1);
                Box::new(self.entries.range((Bound::Included(from), Bound::Unbounded)))
            }
            None => Box::new(self.entries.iter()),
        };

        for (key, ids) in entries {
            match key.first() {
                Some(first) if stop(first) => break,
                _ => visit(key, ids),
            }
        }
    }
}

impl IndexStrategy for KeyedIndex {
    fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    fn coverage(&self, query: &Document) -> IndexCoverage {
        let matched = self.bounds_of(query).iter().filter(|b| b.is_some()).count();
        IndexCoverage::new(matched, Path::count_keys(query))
    }

    fn lookup(&self, query: &Document) -> Vec<Value> {
        let bounds = self.bounds_of(query);
        let mut found: IndexSet<Value> = IndexSet::new();
        let mut collect = |key: &IndexKey, ids: &IndexSet<Value>| {
            let accepted = bounds
                .iter()
                .zip(key.iter())
                .all(|(bound, component)| bound.as_ref().map_or(true, |b| b.contains(component)));
            if accepted {
                found.extend(ids.iter().cloned());
            }
        };

        match bounds.first().and_then(|b| b.as_ref()) {
            Some(leading) => match leading.seeds() {
                Some(seeds) if matches!(leading, KeyBounds::Range { .. }) => {
                    self.scan(seeds.first(), |v| leading.is_past(v), &mut collect)
                }
                Some(seeds) => {
                    for seed in &seeds {
                        let exact = KeyBounds::Equals(seed.clone());
                        self.scan(Some(seed), |v| exact.is_past(v), &mut collect);
                    }
                }
                None => self.scan(None, |v| leading.is_past(v), &mut collect),
            },
            None => self.scan(None, |_| false, &mut collect),
        }

        found.into_iter().collect()
    }

    fn check(&self, primary_key: &Value, document: &Document) -> RippleResult<()> {
        if !self.descriptor.is_unique() {
            return Ok(());
        }

        let (keys, _) = self.keys_of(document);
        for key in &keys {
            if let Some(ids) = self.entries.get(key) {
                if ids.iter().any(|id| id != primary_key) {
                    return Err(self.violation(key));
                }
            }
        }
        Ok(())
    }

    fn insert(&mut self, primary_key: &Value, document: &Document) -> RippleResult<()> {
        self.check(primary_key, document)?;

        let (keys, fanned_out) = self.keys_of(document);
        self.multikey |= fanned_out;
        for key in keys {
            self.entries.entry(key).or_default().insert(primary_key.clone());
        }
        Ok(())
    }

    fn remove(&mut self, primary_key: &Value, document: &Document) {
        let (keys, _) = self.keys_of(document);
        for key in keys {
            if let Some(ids) = self.entries.get_mut(&key) {
                ids.shift_remove(primary_key);
                if ids.is_empty() {
                    self.entries.remove(&key);
                }
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.multikey = false;
    }

    fn size(&self) -> usize {
        self.entries.len()
    }

    fn is_multikey(&self) -> bool {
        self.multikey
    }
}
