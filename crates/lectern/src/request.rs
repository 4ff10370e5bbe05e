// File: src/request.rs
// Purpose: Parsing of the query parameters shared by many endpoints (pagination, since-watermarks)

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const PAGINATION_REQUIRED: &str = "Limit and offset are required";
pub const SINCE_REQUIRED: &str = "Since parameter is required";

/// Raw `?limit=&offset=` query. Both arrive as strings so that an empty
/// value is reported as missing instead of as a deserialization failure.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PageParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl PageParams {
    pub fn require(&self) -> AppResult<Page> {
        let limit = non_blank(self.limit.as_deref());
        let offset = non_blank(self.offset.as_deref());
        match (limit, offset) {
            (Some(limit), Some(offset)) => Ok(Page {
                limit: parse_count("limit", limit)?,
                offset: parse_count("offset", offset)?,
            }),
            _ => Err(AppError::bad_request(PAGINATION_REQUIRED)),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_count(name: &str, raw: &str) -> AppResult<i64> {
    match raw.parse::<i64>() {
        Ok(n) if n >= 0 => Ok(n),
        _ => Err(AppError::bad_request(format!(
            "{name} must be a non-negative integer"
        ))),
    }
}

/// Raw `?since=` query
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SinceParams {
    pub since: Option<String>,
}

impl SinceParams {
    /// Parse the watermark, reporting `missing` when it is absent
    pub fn require(&self, missing: &str) -> AppResult<DateTime<Utc>> {
        let raw = non_blank(self.since.as_deref()).ok_or_else(|| AppError::bad_request(missing))?;
        parse_since(raw)
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]`, `YYYY-MM-DDTHH:MM:SS[.fff]`,
/// `YYYY-MM-DD` or integer epoch milliseconds. Naive values are UTC.
pub fn parse_since(raw: &str) -> AppResult<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }

    if let Ok(millis) = raw.parse::<i64>() {
        if let Some(dt) = DateTime::from_timestamp_millis(millis) {
            return Ok(dt);
        }
    }

    Err(AppError::bad_request(format!("Invalid since timestamp: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn params(limit: Option<&str>, offset: Option<&str>) -> PageParams {
        PageParams {
            limit: limit.map(String::from),
            offset: offset.map(String::from),
        }
    }

    #[test]
    fn test_page_parses() {
        let page = params(Some("20"), Some("40")).require().unwrap();
        assert_eq!(page, Page { limit: 20, offset: 40 });
    }

    #[rstest]
    #[case(None, None)]
    #[case(Some(""), Some(""))]
    #[case(Some("10"), None)]
    #[case(None, Some("0"))]
    #[case(Some("  "), Some("0"))]
    fn test_page_missing(#[case] limit: Option<&str>, #[case] offset: Option<&str>) {
        let err = params(limit, offset).require().unwrap_err();
        assert_eq!(err.to_string(), PAGINATION_REQUIRED);
        assert!(err.is_client_error());
    }

    #[rstest]
    #[case("-1", "0")]
    #[case("ten", "0")]
    #[case("10", "1.5")]
    fn test_page_invalid(#[case] limit: &str, #[case] offset: &str) {
        let err = params(Some(limit), Some(offset)).require().unwrap_err();
        assert!(err.is_client_error());
    }

    #[rstest]
    #[case("2024-03-01T10:00:00Z", "2024-03-01T10:00:00+00:00")]
    #[case("2024-03-01T12:00:00+02:00", "2024-03-01T10:00:00+00:00")]
    #[case("2024-03-01 10:00:00", "2024-03-01T10:00:00+00:00")]
    #[case("2024-03-01 10:00:00.250", "2024-03-01T10:00:00.250+00:00")]
    #[case("2024-03-01T10:00:00", "2024-03-01T10:00:00+00:00")]
    #[case("2024-03-01", "2024-03-01T00:00:00+00:00")]
    #[case("1709287200000", "2024-03-01T10:00:00+00:00")]
    fn test_parse_since(#[case] raw: &str, #[case] expected: &str) {
        let expected = DateTime::parse_from_rfc3339(expected).unwrap().with_timezone(&Utc);
        assert_eq!(parse_since(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("yesterday")]
    #[case("2024-13-01")]
    #[case("01/03/2024")]
    fn test_parse_since_rejects_garbage(#[case] raw: &str) {
        assert!(parse_since(raw).unwrap_err().is_client_error());
    }

    #[test]
    fn test_since_missing_uses_caller_message() {
        let err = SinceParams::default().require("Missing 'since' parameter").unwrap_err();
        assert_eq!(err.to_string(), "Missing 'since' parameter");

        let err = SinceParams { since: Some(String::new()) }.require(SINCE_REQUIRED).unwrap_err();
        assert_eq!(err.to_string(), SINCE_REQUIRED);
    }
}
