use crate::collection::Document;
use crate::common::{ReadExecutor, Value};
use crate::errors::{ErrorKind, RippleError, RippleResult};
use crate::query::{BooleanMode, QueryOperator};
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use crate::FIELD_SEPARATOR;

/// A parsed query.
///
/// A query document maps field names to test values or operator documents.
/// Sibling keys are combined with AND unless evaluated in
/// [BooleanMode::Or]; `$or` and `$and` build explicit subtrees.
///
/// ```rust
/// use rippledb::doc;
/// use rippledb::query::{BooleanMode, Query};
///
/// let query = Query::parse(&doc! { age: { "$gt": 11, "$lt": 20 }, name: { "$regex": "^ja", "$options": "i" } }).unwrap();
/// assert!(query.matches(&doc! { age: 15, name: "Jake" }, BooleanMode::And));
/// assert!(!query.matches(&doc! { age: 25, name: "Jake" }, BooleanMode::And));
/// ```
#[derive(Clone)]
pub struct Query {
    source: Document,
    root: Criteria,
}

impl Query {
    /// Parses a query document. Operator misuse such as `$in` with a
    /// non-array operand is reported as [ErrorKind::MalformedQuery].
    pub fn parse(query: &Document) -> RippleResult<Query> {
        Ok(Query {
            source: query.clone(),
            root: Criteria::parse(query)?,
        })
    }

    /// A query matching every document.
    pub fn all() -> Query {
        Query {
            source: Document::new(),
            root: Criteria { clauses: vec![] },
        }
    }

    /// The query document this query was parsed from.
    pub fn document(&self) -> &Document {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.root.clauses.is_empty()
    }

    pub fn matches(&self, document: &Document, mode: BooleanMode) -> bool {
        match_criteria(Subject::Doc(document), &self.root, mode)
    }
}

impl Debug for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Query({})", self.source)
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// A parsed test against a single value, as found on the right hand side of
/// a query field or in an update operand (`$pull`, positional updates).
#[derive(Debug, Clone)]
pub struct ValueMatcher {
    test: Test,
}

impl ValueMatcher {
    pub fn parse(test: &Value) -> RippleResult<ValueMatcher> {
        Ok(ValueMatcher {
            test: Test::parse(test)?,
        })
    }

    pub fn matches(&self, value: &Value) -> bool {
        test_subject(Subject::Val(value), &self.test)
    }
}

/// Tests one query level against a subject.
#[derive(Debug, Clone)]
struct Criteria {
    clauses: Vec<Clause>,
}

#[derive(Debug, Clone)]
enum Clause {
    Compare(QueryOperator, Value),
    Eq(Value),
    Exists(bool),
    Ne(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Or(Vec<Criteria>),
    And(Vec<Criteria>),
    Pattern(Pattern),
    Field(String, Test),
}

#[derive(Debug, Clone)]
enum Test {
    /// A nested query level.
    Criteria(Criteria),
    /// A literal array; see [test_subject].
    AnyOf(Vec<Test>),
    /// A scalar to compare for equality.
    Equals(Value),
}

#[derive(Clone)]
struct Pattern(Regex);

impl Debug for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/", self.0.as_str())
    }
}

impl Criteria {
    fn parse(query: &Document) -> RippleResult<Criteria> {
        let separator = FIELD_SEPARATOR.read_with(|it| it.clone());
        let mut clauses = Vec::with_capacity(query.len());
        for (key, value) in query.iter() {
            if !key.starts_with('$') {
                clauses.push(field_clause(key, Test::parse(value)?, &separator));
                continue;
            }

            let operator = QueryOperator::from_key(key)
                .ok_or_else(|| malformed(&format!("Unknown query operator {}", key)))?;

            let clause = match operator {
                QueryOperator::Gt | QueryOperator::Gte | QueryOperator::Lt | QueryOperator::Lte => {
                    Clause::Compare(operator, value.clone())
                }
                QueryOperator::Eq => Clause::Eq(value.clone()),
                QueryOperator::Exists => Clause::Exists(exists_flag(value)?),
                QueryOperator::Ne => Clause::Ne(value.clone()),
                QueryOperator::In => Clause::In(array_operand(operator, value)?.clone()),
                QueryOperator::Nin => Clause::Nin(array_operand(operator, value)?.clone()),
                QueryOperator::Or => Clause::Or(sub_queries(operator, value)?),
                QueryOperator::And => Clause::And(sub_queries(operator, value)?),
                QueryOperator::Regex => Clause::Pattern(compile_pattern(value, query.get("$options"))?),
                QueryOperator::Options => {
                    if !query.contains_key(QueryOperator::Regex.key()) {
                        return Err(malformed("$options requires a sibling $regex"));
                    }
                    continue;
                }
            };
            clauses.push(clause);
        }
        Ok(Criteria { clauses })
    }

    fn has_exists(&self) -> bool {
        self.clauses.iter().any(|c| match c {
            Clause::Exists(_) => true,
            Clause::Field(_, Test::Criteria(inner)) => inner.has_exists(),
            _ => false,
        })
    }

    /// Whether a clause addresses an array element by position (`{"0": ..}`).
    fn has_index_field(&self) -> bool {
        self.clauses
            .iter()
            .any(|c| matches!(c, Clause::Field(key, _) if key.parse::<usize>().is_ok()))
    }
}

/// Expands a dotted key into nested field clauses, so `{"a.b": 1}` is
/// evaluated exactly like `{a: {b: 1}}`.
fn field_clause(key: &str, test: Test, separator: &str) -> Clause {
    if separator.is_empty() || !key.contains(separator) {
        return Clause::Field(key.to_string(), test);
    }

    let mut parts = key.rsplit(separator);
    let last = parts.next().unwrap_or(key);
    parts.fold(Clause::Field(last.to_string(), test), |inner, part| {
        Clause::Field(
            part.to_string(),
            Test::Criteria(Criteria {
                clauses: vec![inner],
            }),
        )
    })
}

impl Test {
    fn parse(value: &Value) -> RippleResult<Test> {
        match value {
            Value::Document(doc) => Ok(Test::Criteria(Criteria::parse(doc)?)),
            Value::Array(arr) => Ok(Test::AnyOf(
                arr.iter().map(Test::parse).collect::<RippleResult<Vec<_>>>()?,
            )),
            other => Ok(Test::Equals(other.clone())),
        }
    }
}

fn malformed(message: &str) -> RippleError {
    log::error!("{}", message);
    RippleError::new(message, ErrorKind::MalformedQuery)
}

fn exists_flag(value: &Value) -> RippleResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::I64(_) | Value::F64(_) => Ok(value.as_f64().map(|v| v != 0.0).unwrap_or(false)),
        _ => Err(malformed("$exists expects a boolean operand")),
    }
}

fn array_operand(operator: QueryOperator, value: &Value) -> RippleResult<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| malformed(&format!("Cannot use an {} operator on a non-array key", operator)))
}

fn sub_queries(operator: QueryOperator, value: &Value) -> RippleResult<Vec<Criteria>> {
    let items = array_operand(operator, value)?;
    items
        .iter()
        .map(|item| match item {
            Value::Document(doc) => Criteria::parse(doc),
            _ => Err(malformed(&format!("{} expects an array of query documents", operator))),
        })
        .collect()
}

fn compile_pattern(value: &Value, options: Option<&Value>) -> RippleResult<Pattern> {
    let source = value
        .as_string()
        .ok_or_else(|| malformed("$regex expects a string pattern"))?;

    let mut builder = RegexBuilder::new(source);
    if let Some(options) = options {
        let flags = options
            .as_string()
            .ok_or_else(|| malformed("$options expects a string of flags"))?;
        for flag in flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                other => return Err(malformed(&format!("Unsupported regex option {}", other))),
            };
        }
    }
    Ok(Pattern(builder.build()?))
}

/// What a query level is evaluated against.
#[derive(Clone, Copy)]
enum Subject<'a> {
    Absent,
    Doc(&'a Document),
    Val(&'a Value),
}

impl<'a> Subject<'a> {
    fn is_absent(&self) -> bool {
        matches!(self, Subject::Absent)
    }

    fn field(&self, key: &str) -> Option<&'a Value> {
        match *self {
            Subject::Doc(doc) => doc.get(key),
            Subject::Val(Value::Document(doc)) => doc.get(key),
            Subject::Val(Value::Array(arr)) => key.parse::<usize>().ok().and_then(|i| arr.get(i)),
            _ => None,
        }
    }

    fn equals(&self, value: &Value) -> bool {
        match *self {
            Subject::Absent => false,
            Subject::Doc(doc) => matches!(value, Value::Document(other) if other == doc),
            Subject::Val(v) => v == value,
        }
    }

    fn compare(&self, value: &Value) -> Option<Ordering> {
        match *self {
            Subject::Val(v) => v.compare_relational(value),
            _ => None,
        }
    }
}

fn match_criteria(subject: Subject<'_>, criteria: &Criteria, mode: BooleanMode) -> bool {
    for clause in &criteria.clauses {
        let matched = eval_clause(subject, clause);
        match mode {
            BooleanMode::And if !matched => return false,
            BooleanMode::Or if matched => return true,
            _ => {}
        }
    }
    mode == BooleanMode::And
}

fn eval_clause(subject: Subject<'_>, clause: &Clause) -> bool {
    match clause {
        Clause::Compare(op, value) => match subject.compare(value) {
            Some(ordering) => match op {
                QueryOperator::Gt => ordering == Ordering::Greater,
                QueryOperator::Gte => ordering != Ordering::Less,
                QueryOperator::Lt => ordering == Ordering::Less,
                QueryOperator::Lte => ordering != Ordering::Greater,
                _ => false,
            },
            None => false,
        },
        Clause::Eq(value) => subject.equals(value),
        // presence is tested, never truthiness
        Clause::Exists(expected) => subject.is_absent() != *expected,
        Clause::Ne(value) => !subject.equals(value),
        Clause::In(values) => values.iter().any(|v| subject.equals(v)),
        Clause::Nin(values) => !values.iter().any(|v| subject.equals(v)),
        Clause::Or(branches) => branches
            .iter()
            .any(|branch| match_criteria(subject, branch, BooleanMode::And)),
        Clause::And(branches) => branches
            .iter()
            .all(|branch| match_criteria(subject, branch, BooleanMode::And)),
        Clause::Pattern(pattern) => match subject {
            Subject::Val(Value::String(s)) => pattern.0.is_match(s),
            _ => false,
        },
        Clause::Field(key, test) => match subject.field(key) {
            Some(value) => test_subject(Subject::Val(value), test),
            None => match test {
                Test::Criteria(criteria) if criteria.has_exists() => {
                    match_criteria(Subject::Absent, criteria, BooleanMode::And)
                }
                _ => false,
            },
        },
    }
}

/// Applies a field test to the field's value.
///
/// Arrays get membership semantics: a scalar or nested test succeeds when
/// any element satisfies it. A literal array test against an array compares
/// element by element; against a scalar it succeeds when any of its items
/// matches.
fn test_subject(subject: Subject<'_>, test: &Test) -> bool {
    match test {
        Test::Equals(expected) => match subject {
            Subject::Val(value) if value.is_primitive() && expected.is_primitive() => value == expected,
            Subject::Val(Value::Array(items)) => {
                subject.equals(expected) || items.iter().any(|item| item == expected)
            }
            _ => subject.equals(expected),
        },
        Test::Criteria(criteria) => match subject {
            Subject::Val(Value::Array(items)) => {
                items
                    .iter()
                    .any(|item| match_criteria(Subject::Val(item), criteria, BooleanMode::And))
                    || (criteria.has_index_field() && match_criteria(subject, criteria, BooleanMode::And))
            }
            _ => match_criteria(subject, criteria, BooleanMode::And),
        },
        Test::AnyOf(tests) => match subject {
            Subject::Val(Value::Array(items)) => tests.iter().enumerate().all(|(i, t)| {
                items
                    .get(i)
                    .map(|item| test_subject(Subject::Val(item), t))
                    .unwrap_or(false)
            }),
            Subject::Absent => false,
            _ => tests.iter().any(|t| test_subject(subject, t)),
        },
    }
}
