use crate::value::{Record, Value};
use std::cmp::Ordering;

///
/// FilterOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FilterOp {
    Eq,
    Contains,
    Gt,
    Gte,
    Lt,
    Lte,
}

///
/// Filter
///
/// An in-memory list predicate: equality, substring containment, or an
/// ordered comparison against a field. Predicates that cannot compare
/// (mixed variants) simply do not match; they never error.
///

#[derive(Clone, Debug)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    #[must_use]
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    #[must_use]
    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Contains, value)
    }

    #[must_use]
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Gt, value)
    }

    #[must_use]
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Gte, value)
    }

    #[must_use]
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Lt, value)
    }

    #[must_use]
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Lte, value)
    }

    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.value(&self.field);

        match self.op {
            FilterOp::Eq => {
                actual.compare(&self.value) == Some(Ordering::Equal)
                    || actual.cell_text() == self.value.cell_text()
            }
            FilterOp::Contains => actual.cell_text().contains(&self.value.cell_text()),
            FilterOp::Gt => matches!(self.ordering(&actual), Some(Ordering::Greater)),
            FilterOp::Gte => matches!(
                self.ordering(&actual),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lt => matches!(self.ordering(&actual), Some(Ordering::Less)),
            FilterOp::Lte => matches!(
                self.ordering(&actual),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }

    /// Ordering of the record's value relative to the filter value.
    /// Falls back to timestamp interpretation so text cutoffs like
    /// `"2024-01-01"` compare against timestamp columns.
    fn ordering(&self, actual: &Value) -> Option<Ordering> {
        if let Some(ord) = actual.compare(&self.value) {
            return Some(ord);
        }
        match (actual.as_timestamp(), self.value.as_timestamp()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => None,
        }
    }
}

///
/// TESTS
///
