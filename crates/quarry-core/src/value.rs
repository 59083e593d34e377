//! Bind values and their textual encoding.
//!
//! Every value reaches the engine as a positional `?` parameter carrying text.
//! Dates use a single fixed format for both directions so that a value
//! written by a predicate reads back unchanged.

use chrono::{DateTime, NaiveDate, NaiveDateTime, ParseResult, Utc};

/// The one date format used for bind values and for reading results.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Text encoding of boolean `true`.
pub const TRUE_VALUE: &str = "1";

/// Text encoding of boolean `false`.
pub const FALSE_VALUE: &str = "0";

/// Formats a date with [`DATE_FORMAT`].
#[must_use]
pub fn format_date(date: &NaiveDateTime) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parses a date written with [`DATE_FORMAT`].
///
/// # Errors
///
/// Returns the chrono parse error when `text` does not match the format.
pub fn parse_date(text: &str) -> ParseResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, DATE_FORMAT)
}

/// A value that can be bound to a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Date and time value.
    Date(NaiveDateTime),
}

impl SqlValue {
    /// Returns the text that is bound for this value.
    ///
    /// `None` means the value is absent: NULL or empty text. Predicate
    /// builders treat such values as "no condition" rather than as an error.
    #[must_use]
    pub fn to_bind_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(if *b { TRUE_VALUE } else { FALSE_VALUE }.to_string()),
            Self::Int(n) => Some(n.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Text(s) if s.is_empty() => None,
            Self::Text(s) => Some(s.clone()),
            Self::Date(d) => Some(format_date(d)),
        }
    }

    /// Returns the parameter text for a stored value, `None` only for NULL.
    ///
    /// Unlike [`Self::to_bind_text`], empty text is kept.
    #[must_use]
    pub fn to_param(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(s) => Some(s.clone()),
            other => other.to_bind_text(),
        }
    }
}

/// Trait for types that can be converted to SQL values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

impl ToSqlValue for bool {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Bool(self)
    }
}

macro_rules! int_to_sql_value {
    ($($ty:ty),*) => {
        $(
            impl ToSqlValue for $ty {
                fn to_sql_value(self) -> SqlValue {
                    SqlValue::Int(i64::from(self))
                }
            }
        )*
    };
}

int_to_sql_value!(i8, i16, i32, i64, u8, u16, u32);

impl ToSqlValue for f64 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(self)
    }
}

impl ToSqlValue for f32 {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Float(f64::from(self))
    }
}

impl ToSqlValue for String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self)
    }
}

impl ToSqlValue for &str {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(String::from(self))
    }
}

impl ToSqlValue for &String {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Text(self.clone())
    }
}

impl ToSqlValue for NaiveDateTime {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Date(self)
    }
}

impl ToSqlValue for DateTime<Utc> {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Date(self.naive_utc())
    }
}

impl ToSqlValue for NaiveDate {
    fn to_sql_value(self) -> SqlValue {
        SqlValue::Date(self.and_time(chrono::NaiveTime::MIN))
    }
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Some(v) => v.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_date() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_milli_opt(13, 5, 9, 42)
            .unwrap()
    }

    #[test]
    fn test_date_round_trip() {
        let date = sample_date();
        let text = format_date(&date);
        assert_eq!(text, "2024-02-29 13:05:09.042");
        assert_eq!(parse_date(&text).unwrap(), date);
    }

    #[test]
    fn test_parse_date_rejects_other_formats() {
        assert!(parse_date("2024-02-29T13:05:09Z").is_err());
    }

    #[test]
    fn test_bind_text() {
        assert_eq!(true.to_sql_value().to_bind_text().as_deref(), Some("1"));
        assert_eq!(false.to_sql_value().to_bind_text().as_deref(), Some("0"));
        assert_eq!(42_i32.to_sql_value().to_bind_text().as_deref(), Some("42"));
        assert_eq!(1.5_f64.to_sql_value().to_bind_text().as_deref(), Some("1.5"));
        assert_eq!("bob".to_sql_value().to_bind_text().as_deref(), Some("bob"));
    }

    #[test]
    fn test_absent_values_have_no_bind_text() {
        assert_eq!(SqlValue::Null.to_bind_text(), None);
        assert_eq!("".to_sql_value().to_bind_text(), None);
        assert_eq!(Option::<i64>::None.to_sql_value().to_bind_text(), None);
    }

    #[test]
    fn test_param_keeps_empty_text() {
        assert_eq!("".to_sql_value().to_param().as_deref(), Some(""));
        assert_eq!(SqlValue::Null.to_param(), None);
        assert_eq!(7_i64.to_sql_value().to_param().as_deref(), Some("7"));
    }

    #[test]
    fn test_dates_share_one_format() {
        let day = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        assert_eq!(
            day.to_sql_value().to_bind_text().as_deref(),
            Some("2023-01-02 00:00:00.000")
        );
        let utc = sample_date().and_utc();
        assert_eq!(
            utc.to_sql_value().to_bind_text().as_deref(),
            Some("2024-02-29 13:05:09.042")
        );
    }
}
