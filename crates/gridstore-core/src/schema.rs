use crate::value::Value;
use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

/// Reserved columns every table carries whether or not it declares them.
pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";
pub const DELETED_AT: &str = "deletedAt";

///
/// SchemaError
///

#[derive(Debug, ThisError)]
pub enum SchemaError {
    #[error("table name must not be empty")]
    EmptyTableName,

    #[error("column name must not be empty in table `{table}`")]
    EmptyColumnName { table: String },

    #[error("duplicate column `{name}` in table `{table}`")]
    DuplicateColumn { table: String, name: String },

    #[error("table `{table}` declares more than one primary key: `{first}` and `{second}`")]
    MultiplePrimaryKeys {
        table: String,
        first: String,
        second: String,
    },

    #[error("index on unknown field `{field}` in table `{table}`")]
    UnknownIndexField { table: String, field: String },

    #[error("invalid pattern on column `{column}`: {message}")]
    InvalidPattern { column: String, message: String },
}

///
/// ColumnType
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ColumnType {
    #[default]
    Text,
    Number,
    Bool,
    Timestamp,
    Enum,
    Json,
}

///
/// Reference
///
/// A foreign-key declaration: the column must resolve to a live record in
/// `table`, or be empty when `allow_null` is set.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reference {
    pub table: String,
    pub allow_null: bool,
}

impl Reference {
    #[must_use]
    pub fn to(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            allow_null: false,
        }
    }

    #[must_use]
    pub const fn allow_null(mut self) -> Self {
        self.allow_null = true;
        self
    }
}

///
/// ColumnDefault
///

#[derive(Clone, Debug)]
pub enum ColumnDefault {
    Fixed(Value),
    Generated(fn() -> Value),
}

impl ColumnDefault {
    #[must_use]
    pub fn produce(&self) -> Value {
        match self {
            Self::Fixed(value) => value.clone(),
            Self::Generated(thunk) => thunk(),
        }
    }
}

///
/// Column
///
/// A raw column declaration. Unset knobs take their defaults during
/// normalization: type defaults to `Text`, nullability to `!required`.
///

#[derive(Clone, Debug, Default)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub required: bool,
    pub nullable: Option<bool>,
    pub primary_key: bool,
    pub unique: bool,
    pub default: Option<ColumnDefault>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
    pub allowed_values: Vec<String>,
    pub references: Option<Reference>,
}

impl Column {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name)
    }

    #[must_use]
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name).with_type(ColumnType::Number)
    }

    #[must_use]
    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name).with_type(ColumnType::Bool)
    }

    #[must_use]
    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name).with_type(ColumnType::Timestamp)
    }

    #[must_use]
    pub fn enumeration(name: impl Into<String>, allowed: &[&str]) -> Self {
        let mut col = Self::new(name).with_type(ColumnType::Enum);
        col.allowed_values = allowed.iter().map(ToString::to_string).collect();
        col
    }

    #[must_use]
    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name).with_type(ColumnType::Json)
    }

    #[must_use]
    pub const fn with_type(mut self, ty: ColumnType) -> Self {
        self.ty = ty;
        self
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub const fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(ColumnDefault::Fixed(value.into()));
        self
    }

    #[must_use]
    pub fn default_with(mut self, thunk: fn() -> Value) -> Self {
        self.default = Some(ColumnDefault::Generated(thunk));
        self
    }

    #[must_use]
    pub const fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    #[must_use]
    pub const fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    #[must_use]
    pub const fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    #[must_use]
    pub const fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    #[must_use]
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn references(mut self, reference: Reference) -> Self {
        self.references = Some(reference);
        self
    }
}

///
/// IndexSpec
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexSpec {
    pub field: String,
    pub name: String,
}

impl IndexSpec {
    #[must_use]
    pub fn on(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            name: field.clone(),
            field,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

///
/// TableSchema
///
/// The raw, caller-declared shape of a table. `normalize` turns it into
/// the enforced [`TableModel`].
///

#[derive(Clone, Debug)]
pub struct TableSchema {
    pub name: String,
    pub primary_key: String,
    pub id_prefix: String,
    pub version: u32,
    pub columns: Vec<Column>,
    pub indexes: Vec<IndexSpec>,
    pub archive_after_days: Option<u32>,
    pub retention_days: Option<u32>,
}

impl TableSchema {
    #[must_use]
    pub fn new(name: impl Into<String>, id_prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: "id".to_string(),
            id_prefix: id_prefix.into(),
            version: 1,
            columns: Vec::new(),
            indexes: Vec::new(),
            archive_after_days: None,
            retention_days: None,
        }
    }

    #[must_use]
    pub fn primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = field.into();
        self
    }

    #[must_use]
    pub const fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    #[must_use]
    pub const fn archive_after_days(mut self, days: u32) -> Self {
        self.archive_after_days = Some(days);
        self
    }

    #[must_use]
    pub const fn retention_days(mut self, days: u32) -> Self {
        self.retention_days = Some(days);
        self
    }

    /// Normalize the declaration into an enforced model.
    ///
    /// Pure and deterministic: no I/O, no clock. Guarantees exactly one
    /// primary-key column (synthesizing one named by `primary_key` when
    /// none is flagged) and appends the reserved timestamp columns when
    /// they are not declared.
    pub fn normalize(&self) -> Result<TableModel, SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyTableName);
        }

        let mut columns: Vec<Column> = self.columns.clone();

        let mut primary: Option<String> = None;
        for col in &columns {
            if col.name.trim().is_empty() {
                return Err(SchemaError::EmptyColumnName {
                    table: self.name.clone(),
                });
            }
            if col.primary_key {
                if let Some(first) = &primary {
                    return Err(SchemaError::MultiplePrimaryKeys {
                        table: self.name.clone(),
                        first: first.clone(),
                        second: col.name.clone(),
                    });
                }
                primary = Some(col.name.clone());
            }
        }

        // No column flagged: promote the declared primary-key field,
        // synthesizing the column when it is not present at all.
        let primary_key = match primary {
            Some(name) => name,
            None => {
                if let Some(col) = columns.iter_mut().find(|c| c.name == self.primary_key) {
                    col.primary_key = true;
                } else {
                    let mut col = Column::new(self.primary_key.clone());
                    col.primary_key = true;
                    columns.insert(0, col);
                }
                self.primary_key.clone()
            }
        };

        for reserved in [CREATED_AT, UPDATED_AT, DELETED_AT] {
            if !columns.iter().any(|c| c.name == reserved) {
                columns.push(Column::timestamp(reserved).nullable(true));
            }
        }

        let mut models: Vec<ColumnModel> = Vec::with_capacity(columns.len());
        for col in columns {
            if models.iter().any(|m| m.name == col.name) {
                return Err(SchemaError::DuplicateColumn {
                    table: self.name.clone(),
                    name: col.name,
                });
            }
            models.push(ColumnModel::resolve(col)?);
        }

        for index in &self.indexes {
            if !models.iter().any(|m| m.name == index.field) {
                return Err(SchemaError::UnknownIndexField {
                    table: self.name.clone(),
                    field: index.field.clone(),
                });
            }
        }

        let headers: Vec<String> = models.iter().map(|m| m.name.clone()).collect();
        let unique: Vec<String> = models
            .iter()
            .filter(|m| m.unique)
            .map(|m| m.name.clone())
            .collect();
        let references: BTreeMap<String, Reference> = models
            .iter()
            .filter_map(|m| m.references.clone().map(|r| (m.name.clone(), r)))
            .collect();

        Ok(TableModel {
            name: self.name.clone(),
            primary_key,
            id_prefix: self.id_prefix.clone(),
            version: self.version,
            columns: models,
            headers,
            indexes: self.indexes.clone(),
            unique,
            references,
            archive_after_days: self.archive_after_days,
            retention_days: self.retention_days,
        })
    }
}

///
/// ColumnModel
///
/// A fully-resolved column: every knob concrete, pattern compiled.
///

#[derive(Clone, Debug)]
pub struct ColumnModel {
    pub name: String,
    pub ty: ColumnType,
    pub required: bool,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub default: Option<ColumnDefault>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
    pub allowed_values: Vec<String>,
    pub references: Option<Reference>,
}

impl ColumnModel {
    fn resolve(col: Column) -> Result<Self, SchemaError> {
        // Primary keys are always required and never nullable, whatever
        // the declaration said.
        let required = col.required || col.primary_key;
        let nullable = if col.primary_key {
            false
        } else {
            col.nullable.unwrap_or(!required)
        };

        let pattern = col
            .pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|err| SchemaError::InvalidPattern {
                column: col.name.clone(),
                message: err.to_string(),
            })?;

        Ok(Self {
            name: col.name,
            ty: col.ty,
            required,
            nullable,
            primary_key: col.primary_key,
            unique: col.unique || col.primary_key,
            default: col.default,
            min: col.min,
            max: col.max,
            min_length: col.min_length,
            max_length: col.max_length,
            pattern,
            allowed_values: col.allowed_values,
            references: col.references,
        })
    }
}

///
/// TableModel
///
/// The enforced schema: ordered columns, physical header row, and the
/// constraint sets every write is checked against.
///

#[derive(Clone, Debug)]
pub struct TableModel {
    pub name: String,
    pub primary_key: String,
    pub id_prefix: String,
    pub version: u32,
    pub columns: Vec<ColumnModel>,
    pub headers: Vec<String>,
    pub indexes: Vec<IndexSpec>,
    pub unique: Vec<String>,
    pub references: BTreeMap<String, Reference>,
    pub archive_after_days: Option<u32>,
    pub retention_days: Option<u32>,
}

impl TableModel {
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnModel> {
        self.columns.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }
}

///
/// TESTS
///
