use std::fmt::{Display, Formatter};

/// Controls short-circuiting across the sibling keys of one query level.
///
/// In `And` mode the first failing key makes the level fail. In `Or` mode
/// the first succeeding key makes the level succeed, and a level where no
/// key succeeds fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BooleanMode {
    #[default]
    And,
    Or,
}

/// The operators understood inside a query document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryOperator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Exists,
    Ne,
    In,
    Nin,
    Or,
    And,
    Regex,
    Options,
}

impl QueryOperator {
    pub fn from_key(key: &str) -> Option<QueryOperator> {
        match key {
            "$gt" => Some(QueryOperator::Gt),
            "$gte" => Some(QueryOperator::Gte),
            "$lt" => Some(QueryOperator::Lt),
            "$lte" => Some(QueryOperator::Lte),
            "$eq" => Some(QueryOperator::Eq),
            "$exists" => Some(QueryOperator::Exists),
            "$ne" => Some(QueryOperator::Ne),
            "$in" => Some(QueryOperator::In),
            "$nin" => Some(QueryOperator::Nin),
            "$or" => Some(QueryOperator::Or),
            "$and" => Some(QueryOperator::And),
            "$regex" => Some(QueryOperator::Regex),
            "$options" => Some(QueryOperator::Options),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            QueryOperator::Gt => "$gt",
            QueryOperator::Gte => "$gte",
            QueryOperator::Lt => "$lt",
            QueryOperator::Lte => "$lte",
            QueryOperator::Eq => "$eq",
            QueryOperator::Exists => "$exists",
            QueryOperator::Ne => "$ne",
            QueryOperator::In => "$in",
            QueryOperator::Nin => "$nin",
            QueryOperator::Or => "$or",
            QueryOperator::And => "$and",
            QueryOperator::Regex => "$regex",
            QueryOperator::Options => "$options",
        }
    }

    /// Operators an ordered index can answer by itself: equality, set
    /// membership and range bounds.
    pub fn is_index_bound(&self) -> bool {
        matches!(
            self,
            QueryOperator::Gt
                | QueryOperator::Gte
                | QueryOperator::Lt
                | QueryOperator::Lte
                | QueryOperator::Eq
                | QueryOperator::In
        )
    }
}

impl Display for QueryOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}
