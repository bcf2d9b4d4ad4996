//! Null normalization and typed coercion of raw field text

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::db::schema::{Column, FieldType};

/// Tokens treated as missing values, in addition to blank strings
///
/// Matches the default NA markers of pandas, which produced the extracts.
const ABSENT_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%d-%m-%Y %H:%M:%S%.f",
    "%d/%m/%Y %H:%M",
    "%m/%d/%Y %H:%M",
];

/// A coerced field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit absence marker
    Null,
    Integer(i32),
    BigInt(i64),
    Decimal(f64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    /// The hashable form of this value when used in a primary key
    pub fn as_key_part(&self) -> Option<KeyPart> {
        match self {
            Value::Integer(v) => Some(KeyPart::Int(i64::from(*v))),
            Value::BigInt(v) => Some(KeyPart::Int(*v)),
            Value::Text(v) => Some(KeyPart::Text(v.clone())),
            _ => None,
        }
    }
}

/// One component of a primary key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Int(i64),
    Text(String),
}

impl std::fmt::Display for KeyPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyPart::Int(v) => write!(f, "{}", v),
            KeyPart::Text(v) => write!(f, "'{}'", v),
        }
    }
}

/// Reasons a raw field cannot be coerced to its declared type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoerceError {
    #[error("'{field}': expected {expected}, got '{value}'")]
    TypeMismatch {
        field: String,
        expected: String,
        value: String,
    },

    #[error("'{field}': value has {len} characters, column allows {max}")]
    TooLong { field: String, len: usize, max: u16 },

    #[error("'{field}': primary key value is missing")]
    NullKey { field: String },

    #[error("row has {found} fields, header has {expected}")]
    TooManyFields { expected: usize, found: usize },
}

/// True for blank values and the NA tokens listed in [`ABSENT_TOKENS`]
pub fn is_absent(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || ABSENT_TOKENS.contains(&trimmed)
}

/// Replace comma decimal separators with dots: `"19,99"` -> `"19.99"`
pub fn normalize_decimal(raw: &str) -> String {
    raw.trim().replace(',', ".")
}

/// Coerce a raw field into a typed value for `column`
///
/// `None` (a field missing from a short row) and absent values both become
/// [`Value::Null`].
pub fn coerce(raw: Option<&str>, column: &Column) -> Result<Value, CoerceError> {
    let Some(raw) = raw.filter(|r| !is_absent(r)) else {
        return Ok(Value::Null);
    };

    let mismatch = |expected: &str, value: &str| CoerceError::TypeMismatch {
        field: column.name.to_string(),
        expected: expected.to_string(),
        value: value.to_string(),
    };

    let trimmed = raw.trim();

    Ok(match column.field_type {
        FieldType::Integer => Value::Integer(
            trimmed
                .parse::<i32>()
                .map_err(|_| mismatch("INTEGER", trimmed))?,
        ),
        FieldType::BigInt => Value::BigInt(
            trimmed
                .parse::<i64>()
                .map_err(|_| mismatch("BIGINT", trimmed))?,
        ),
        FieldType::Decimal { .. } => Value::Decimal(parse_fractional(trimmed).ok_or_else(
            || mismatch(&column.field_type.sql_type(), trimmed),
        )?),
        FieldType::Float => Value::Float(
            parse_fractional(trimmed).ok_or_else(|| mismatch("DOUBLE PRECISION", trimmed))?,
        ),
        FieldType::Boolean => {
            Value::Boolean(parse_bool(trimmed).ok_or_else(|| mismatch("BOOLEAN", trimmed))?)
        }
        FieldType::Date => {
            Value::Date(parse_date(trimmed).ok_or_else(|| mismatch("DATE", trimmed))?)
        }
        FieldType::DateTime => Value::DateTime(
            parse_datetime(trimmed).ok_or_else(|| mismatch("TIMESTAMP", trimmed))?,
        ),
        FieldType::Varchar(max) => {
            let len = raw.chars().count();
            if len > max as usize {
                return Err(CoerceError::TooLong {
                    field: column.name.to_string(),
                    len,
                    max,
                });
            }
            Value::Text(raw.to_string())
        }
        FieldType::Text => Value::Text(raw.to_string()),
    })
}

fn parse_fractional(value: &str) -> Option<f64> {
    normalize_decimal(value)
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" => Some(true),
        "0" | "false" | "f" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| parse_datetime_only(value).map(|dt| dt.date()))
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    parse_datetime_only(value).or_else(|| {
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    })
}

fn parse_datetime_only(value: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(field_type: FieldType) -> Column {
        Column::new("field", field_type)
    }

    const MONEY: FieldType = FieldType::Decimal {
        precision: 18,
        scale: 2,
    };

    #[test]
    fn test_absent_values() {
        for raw in ["", "   ", "NULL", "null", "NaN", "nan", "N/A", "<NA>", " NA "] {
            assert!(is_absent(raw), "'{}' should be absent", raw);
        }
        for raw in ["0", "Nan Bread", "none of it", "-"] {
            assert!(!is_absent(raw), "'{}' should be present", raw);
        }
    }

    #[test]
    fn test_empty_and_missing_become_null() {
        assert_eq!(coerce(Some(""), &col(FieldType::Text)).unwrap(), Value::Null);
        assert_eq!(coerce(None, &col(FieldType::Text)).unwrap(), Value::Null);
        assert_eq!(coerce(Some(""), &col(FieldType::Integer)).unwrap(), Value::Null);
        assert_eq!(coerce(Some("NULL"), &col(MONEY)).unwrap(), Value::Null);
    }

    #[test]
    fn test_comma_decimal_separator() {
        assert_eq!(normalize_decimal(" 19,99 "), "19.99");
        assert_eq!(coerce(Some("19,99"), &col(MONEY)).unwrap(), Value::Decimal(19.99));
        assert_eq!(coerce(Some("19.99"), &col(MONEY)).unwrap(), Value::Decimal(19.99));
        assert_eq!(
            coerce(Some("2024,994"), &col(FieldType::Float)).unwrap(),
            Value::Float(2024.994)
        );
        assert_eq!(coerce(Some("0,00"), &col(MONEY)).unwrap(), Value::Decimal(0.0));
    }

    #[test]
    fn test_malformed_decimals() {
        assert!(coerce(Some("1.234,56"), &col(MONEY)).is_err());
        assert!(coerce(Some("abc"), &col(FieldType::Float)).is_err());
        assert!(coerce(Some("inf"), &col(FieldType::Float)).is_err());
    }

    #[test]
    fn test_integers() {
        assert_eq!(
            coerce(Some(" 42 "), &col(FieldType::Integer)).unwrap(),
            Value::Integer(42)
        );
        assert_eq!(
            coerce(Some("9999999999"), &col(FieldType::BigInt)).unwrap(),
            Value::BigInt(9_999_999_999)
        );

        let err = coerce(Some("9999999999"), &col(FieldType::Integer)).unwrap_err();
        assert!(matches!(err, CoerceError::TypeMismatch { .. }));
        assert!(coerce(Some("4.5"), &col(FieldType::Integer)).is_err());
    }

    #[test]
    fn test_booleans() {
        let cases = [
            ("1", Some(true)),
            ("0", Some(false)),
            ("True", Some(true)),
            ("FALSE", Some(false)),
            ("t", Some(true)),
            ("no", Some(false)),
            ("maybe", None),
            ("2", None),
        ];

        for (input, expected) in cases {
            let result = coerce(Some(input), &col(FieldType::Boolean));
            match expected {
                Some(b) => assert_eq!(result.unwrap(), Value::Boolean(b), "input '{}'", input),
                None => assert!(result.is_err(), "input '{}' should fail", input),
            }
        }
    }

    #[test]
    fn test_dates() {
        let expected = NaiveDate::from_ymd_opt(2011, 5, 31).unwrap();
        let cases = [
            "2011-05-31",
            "31/05/2011",
            "05/31/2011",
            "31-05-2011",
            "2011-05-31 00:00:00",
            "2011-05-31 00:00:00.000",
        ];
        for input in cases {
            assert_eq!(
                coerce(Some(input), &col(FieldType::Date)).unwrap(),
                Value::Date(expected),
                "input '{}'",
                input
            );
        }

        assert!(coerce(Some("2011-02-30"), &col(FieldType::Date)).is_err());
        assert!(coerce(Some("yesterday"), &col(FieldType::Date)).is_err());
    }

    #[test]
    fn test_datetimes() {
        let expected = NaiveDate::from_ymd_opt(2014, 6, 30)
            .unwrap()
            .and_hms_milli_opt(14, 30, 15, 250)
            .unwrap();
        assert_eq!(
            coerce(Some("2014-06-30 14:30:15.250"), &col(FieldType::DateTime)).unwrap(),
            Value::DateTime(expected)
        );
        assert_eq!(
            coerce(Some("2014-06-30T14:30:15.25"), &col(FieldType::DateTime)).unwrap(),
            Value::DateTime(expected)
        );

        let midnight = NaiveDate::from_ymd_opt(2014, 6, 30)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(
            coerce(Some("2014-06-30"), &col(FieldType::DateTime)).unwrap(),
            Value::DateTime(midnight)
        );
        assert!(coerce(Some("path/to:file"), &col(FieldType::DateTime)).is_err());
    }

    #[test]
    fn test_varchar_length_is_enforced() {
        assert_eq!(
            coerce(Some("SO43659"), &col(FieldType::Varchar(10))).unwrap(),
            Value::Text("SO43659".to_string())
        );

        let err = coerce(Some("ABC"), &col(FieldType::Varchar(2))).unwrap_err();
        assert_eq!(
            err,
            CoerceError::TooLong {
                field: "field".to_string(),
                len: 3,
                max: 2
            }
        );

        // Length counts characters, not bytes
        assert!(coerce(Some("çã"), &col(FieldType::Varchar(2))).is_ok());
    }

    #[test]
    fn test_text_is_kept_verbatim() {
        let xml = "<IndividualSurvey xmlns=\"x\"><TotalPurchaseYTD>0</TotalPurchaseYTD></IndividualSurvey>";
        assert_eq!(
            coerce(Some(xml), &col(FieldType::Text)).unwrap(),
            Value::Text(xml.to_string())
        );
    }
}
