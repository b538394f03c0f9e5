use crate::{
    error::Error,
    schema::{ColumnModel, ColumnType},
    value::Value,
};

/// Boolean cell literals accepted on the write path, case-insensitive.
const BOOL_TRUE: [&str; 4] = ["true", "yes", "y", "1"];
const BOOL_FALSE: [&str; 4] = ["false", "no", "n", "0"];

/// Type-check and coerce a candidate value against a column.
///
/// Invoked once per column on every create and update. Every failure names
/// the offending field. Empty values pass when the column allows them and
/// fail otherwise; non-empty values go through the type-specific rules.
pub fn coerce(value: &Value, column: &ColumnModel) -> Result<Value, Error> {
    if value.is_empty() {
        if column.required && !column.nullable {
            return Err(Error::validation(&column.name, "value is required"));
        }
        return Ok(Value::Empty);
    }

    match column.ty {
        ColumnType::Text => coerce_text(value, column),
        ColumnType::Number => coerce_number(value, column),
        ColumnType::Bool => coerce_bool(value, column),
        ColumnType::Timestamp => coerce_timestamp(value, column),
        ColumnType::Enum => coerce_enum(value, column),
        ColumnType::Json => coerce_json(value, column),
    }
}

fn coerce_text(value: &Value, column: &ColumnModel) -> Result<Value, Error> {
    let text = match value {
        Value::Text(s) => s.clone(),
        Value::Json(_) => {
            return Err(Error::validation(
                &column.name,
                "expected text, got a JSON value",
            ));
        }
        other => other.cell_text(),
    };

    let chars = text.chars().count();
    if let Some(min) = column.min_length
        && chars < min
    {
        return Err(Error::validation(
            &column.name,
            format!("must be at least {min} characters (got {chars})"),
        ));
    }
    if let Some(max) = column.max_length
        && chars > max
    {
        return Err(Error::validation(
            &column.name,
            format!("must be at most {max} characters (got {chars})"),
        ));
    }
    if let Some(pattern) = &column.pattern
        && !pattern.is_match(&text)
    {
        return Err(Error::validation(
            &column.name,
            format!("does not match pattern `{}`", pattern.as_str()),
        ));
    }

    Ok(Value::Text(text))
}

fn coerce_number(value: &Value, column: &ColumnModel) -> Result<Value, Error> {
    let n = match value {
        Value::Number(n) => *n,
        Value::Text(s) => s.trim().parse::<f64>().map_err(|_| {
            Error::validation(&column.name, format!("`{s}` is not a number"))
        })?,
        other => {
            return Err(Error::validation(
                &column.name,
                format!("expected a number, got `{}`", other.cell_text()),
            ));
        }
    };

    if !n.is_finite() {
        return Err(Error::validation(&column.name, "number must be finite"));
    }
    if let Some(min) = column.min
        && n < min
    {
        return Err(Error::validation(
            &column.name,
            format!("must be >= {min} (got {n})"),
        ));
    }
    if let Some(max) = column.max
        && n > max
    {
        return Err(Error::validation(
            &column.name,
            format!("must be <= {max} (got {n})"),
        ));
    }

    Ok(Value::Number(n))
}

fn coerce_bool(value: &Value, column: &ColumnModel) -> Result<Value, Error> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Text(s) => {
            let lowered = s.trim().to_ascii_lowercase();
            if BOOL_TRUE.contains(&lowered.as_str()) {
                Ok(Value::Bool(true))
            } else if BOOL_FALSE.contains(&lowered.as_str()) {
                Ok(Value::Bool(false))
            } else {
                Err(Error::validation(
                    &column.name,
                    format!("`{s}` is not a boolean"),
                ))
            }
        }
        other => Err(Error::validation(
            &column.name,
            format!("expected a boolean, got `{}`", other.cell_text()),
        )),
    }
}

fn coerce_timestamp(value: &Value, column: &ColumnModel) -> Result<Value, Error> {
    value.as_timestamp().map(Value::Timestamp).ok_or_else(|| {
        Error::validation(
            &column.name,
            format!("`{}` is not a timestamp", value.cell_text()),
        )
    })
}

fn coerce_enum(value: &Value, column: &ColumnModel) -> Result<Value, Error> {
    let text = value.cell_text();
    if column.allowed_values.iter().any(|v| v == &text) {
        Ok(Value::Text(text))
    } else {
        Err(Error::validation(
            &column.name,
            format!(
                "`{text}` is not one of [{}]",
                column.allowed_values.join(", ")
            ),
        ))
    }
}

fn coerce_json(value: &Value, column: &ColumnModel) -> Result<Value, Error> {
    match value {
        Value::Json(v) => Ok(Value::Json(v.clone())),
        Value::Text(s) => serde_json::from_str::<serde_json::Value>(s)
            .map(Value::Json)
            .map_err(|err| {
                Error::validation(&column.name, format!("invalid JSON: {err}"))
            }),
        other => Err(Error::validation(
            &column.name,
            format!("expected JSON, got `{}`", other.cell_text()),
        )),
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::coerce;
    use crate::{
        error::Error,
        schema::{Column, TableSchema},
        value::{Timestamp, Value},
    };

    fn column(col: Column) -> crate::schema::ColumnModel {
        let name = col.name.clone();
        let model = TableSchema::new("T", "T")
            .column(col)
            .normalize()
            .expect("schema should normalize");
        model.column(&name).expect("column model").clone()
    }

    fn assert_validation(err: Error, field: &str) {
        match err {
            Error::Validation { field: f, .. } => assert_eq!(f, field),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn required_field_rejects_empty() {
        let col = column(Column::text("email").required());
        let err = coerce(&Value::Empty, &col).expect_err("empty required");
        assert_validation(err, "email");

        let err = coerce(&Value::Text("  ".into()), &col).expect_err("blank required");
        assert_validation(err, "email");
    }

    #[test]
    fn optional_field_accepts_empty() {
        let col = column(Column::text("note"));
        assert_eq!(coerce(&Value::Empty, &col).expect("empty ok"), Value::Empty);
    }

    #[test]
    fn number_parses_text_and_enforces_bounds() {
        let col = column(Column::number("score").min(0.0).max(100.0));

        assert_eq!(
            coerce(&Value::Text(" 42 ".into()), &col).expect("parse"),
            Value::Number(42.0)
        );

        assert_validation(
            coerce(&Value::Number(101.0), &col).expect_err("over max"),
            "score",
        );
        assert_validation(
            coerce(&Value::Text("abc".into()), &col).expect_err("not a number"),
            "score",
        );
    }

    #[test]
    fn bool_accepts_the_literal_set() {
        let col = column(Column::bool("active"));
        for truthy in ["true", "Yes", "y", "1"] {
            assert_eq!(
                coerce(&Value::Text(truthy.into()), &col).expect("truthy"),
                Value::Bool(true)
            );
        }
        for falsy in ["False", "no", "N", "0"] {
            assert_eq!(
                coerce(&Value::Text(falsy.into()), &col).expect("falsy"),
                Value::Bool(false)
            );
        }
        assert_validation(
            coerce(&Value::Text("maybe".into()), &col).expect_err("not a bool"),
            "active",
        );
    }

    #[test]
    fn timestamp_normalizes_text_forms() {
        let col = column(Column::timestamp("hiredAt"));
        let coerced = coerce(&Value::Text("2023-11-14".into()), &col).expect("date");
        assert_eq!(
            coerced,
            Value::Timestamp(Timestamp::parse("2023-11-14T00:00:00Z").expect("parse"))
        );

        assert_validation(
            coerce(&Value::Text("soon".into()), &col).expect_err("not a timestamp"),
            "hiredAt",
        );
    }

    #[test]
    fn enum_checks_membership() {
        let col = column(Column::enumeration("status", &["open", "closed"]));
        assert_eq!(
            coerce(&Value::Text("open".into()), &col).expect("member"),
            Value::Text("open".into())
        );
        assert_validation(
            coerce(&Value::Text("pending".into()), &col).expect_err("not a member"),
            "status",
        );
    }

    #[test]
    fn json_round_trips_and_rejects_malformed_on_write() {
        let col = column(Column::json("payload"));
        let coerced = coerce(&Value::Text(r#"{"a":1}"#.into()), &col).expect("valid json");
        assert_eq!(coerced, Value::Json(serde_json::json!({"a": 1})));

        assert_validation(
            coerce(&Value::Text("{broken".into()), &col).expect_err("malformed json"),
            "payload",
        );
    }

    #[test]
    fn text_length_and_pattern_checks() {
        let col = column(
            Column::text("code")
                .min_length(2)
                .max_length(4)
                .pattern("^[A-Z]+$"),
        );

        assert!(coerce(&Value::Text("ABC".into()), &col).is_ok());
        assert_validation(
            coerce(&Value::Text("A".into()), &col).expect_err("too short"),
            "code",
        );
        assert_validation(
            coerce(&Value::Text("ABCDE".into()), &col).expect_err("too long"),
            "code",
        );
        assert_validation(
            coerce(&Value::Text("abc".into()), &col).expect_err("pattern"),
            "code",
        );
    }
}
