use derive_more::{Deref, DerefMut, IntoIterator};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap, fmt};
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, format_description::well_known::Rfc3339,
    macros::format_description,
};

///
/// Timestamp
///
/// Unix-epoch milliseconds with a canonical RFC-3339 rendering.
/// Cells in the backing grid store the rendered form; everything else
/// (ordering, cursors, retention math) works on the millisecond value.
///

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Timestamp(i64);

impl Timestamp {
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn minus_days(self, days: u32) -> Self {
        Self(self.0 - days as i64 * 86_400_000)
    }

    /// Parse a timestamp from cell text.
    ///
    /// Accepts RFC-3339, `YYYY-MM-DD HH:MM:SS` (assumed UTC), a bare
    /// `YYYY-MM-DD` date, or raw epoch milliseconds. The grid may be
    /// hand-edited, so the accepted set is deliberately wider than the
    /// canonical form we write back.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();

        if let Ok(odt) = OffsetDateTime::parse(text, &Rfc3339) {
            return Some(Self::from_odt(odt));
        }

        let naive = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        if let Ok(pdt) = PrimitiveDateTime::parse(text, naive) {
            return Some(Self::from_odt(pdt.assume_utc()));
        }

        let date_only = format_description!("[year]-[month]-[day]");
        if let Ok(date) = Date::parse(text, date_only) {
            return Some(Self::from_odt(date.midnight().assume_utc()));
        }

        text.parse::<i64>().ok().map(Self)
    }

    /// Canonical RFC-3339 rendering, the form written to grid cells.
    #[must_use]
    pub fn to_rfc3339(self) -> String {
        self.to_odt()
            .and_then(|odt| odt.format(&Rfc3339).ok())
            .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string())
    }

    /// `yyyy_mm` key used to name per-month archive sheets.
    #[must_use]
    pub fn month_key(self) -> String {
        self.to_odt().map_or_else(
            || "1970_01".to_string(),
            |odt| format!("{:04}_{:02}", odt.year(), u8::from(odt.month())),
        )
    }

    /// `yyyymmdd_hhmmss` stamp used to name backup sheets.
    #[must_use]
    pub fn backup_stamp(self) -> String {
        let stamp = format_description!("[year][month][day]_[hour][minute][second]");
        self.to_odt()
            .and_then(|odt| odt.format(stamp).ok())
            .unwrap_or_else(|| "19700101_000000".to_string())
    }

    fn from_odt(odt: OffsetDateTime) -> Self {
        Self((odt.unix_timestamp_nanos() / 1_000_000) as i64)
    }

    fn to_odt(self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.0) * 1_000_000).ok()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

///
/// Value
///
/// The closed set of typed cell values. Records are maps of these, never
/// open dictionaries; every column type maps onto exactly one variant.
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub enum Value {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Timestamp(Timestamp),
    Json(serde_json::Value),
}

impl Value {
    /// Empty means "no value": the `Empty` variant or blank text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Render the value as grid cell text.
    #[must_use]
    pub fn cell_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => format_number(*n),
            Self::Bool(b) => b.to_string(),
            Self::Timestamp(ts) => ts.to_rfc3339(),
            Self::Json(v) => v.to_string(),
        }
    }

    /// Extract a timestamp, tolerating text cells that parse as one.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            Self::Text(s) => Timestamp::parse(s),
            #[allow(clippy::cast_possible_truncation)]
            Self::Number(n) => Some(Timestamp::from_unix_millis(*n as i64)),
            _ => None,
        }
    }

    /// Ordering between two values of the same variant.
    ///
    /// Mixed variants do not compare; filter predicates treat that as a
    /// non-match rather than an error.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Empty, Self::Empty) => Some(Ordering::Equal),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Timestamp(a), Self::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Timestamp> for Value {
    fn from(ts: Timestamp) -> Self {
        Self::Timestamp(ts)
    }
}

/// Integral numbers render without a trailing fraction so cells stay
/// byte-stable across a write/read cycle.
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

///
/// Record
///
/// A field-name → value map keyed by a table's headers.
///

#[derive(
    Clone, Debug, Default, Deref, DerefMut, Deserialize, IntoIterator, PartialEq, Serialize,
)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fluent insertion, mainly for building records in callers and tests.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// The value for `field`, or `Empty` when absent.
    #[must_use]
    pub fn value(&self, field: &str) -> Value {
        self.0.get(field).cloned().unwrap_or_default()
    }

    /// True when the field is absent or holds an empty value.
    #[must_use]
    pub fn is_blank(&self, field: &str) -> bool {
        self.0.get(field).is_none_or(Value::is_empty)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

///
/// TESTS
///
