//! Date/time tool: current time and calendar arithmetic.
//!
//! Three operations:
//! - `now`: current local time in a strftime format
//! - `difference`: years/months/days between two `YYYY-MM-DD` dates
//! - `add`: shift a date by days, months and years

use async_trait::async_trait;
use chrono::{Datelike, Local, Months, NaiveDate};
use std::fmt::Write;
use stepwise_core::error::ToolError;
use stepwise_core::tool::Tool;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct DateTimeTool;

#[async_trait]
impl Tool for DateTimeTool {
    fn name(&self) -> &str {
        "date_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time, calculate the difference between two dates, \
         or calculate a date a number of days/months/years from a start date."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["now", "difference", "add"],
                    "description": "Which calculation to perform"
                },
                "format": {
                    "type": "string",
                    "description": "strftime pattern for 'now' (default %Y-%m-%d %H:%M:%S)"
                },
                "start_date": {
                    "type": "string",
                    "description": "Start date (YYYY-MM-DD); required for 'difference', defaults to today for 'add'"
                },
                "end_date": {
                    "type": "string",
                    "description": "End date (YYYY-MM-DD) for 'difference'; defaults to today"
                },
                "days": { "type": "integer", "description": "Days to add" },
                "months": { "type": "integer", "description": "Months to add" },
                "years": { "type": "integer", "description": "Years to add" }
            },
            "required": ["operation"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let operation = arguments["operation"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'operation' argument".into()))?;

        let today = Local::now().date_naive();
        match operation {
            "now" => {
                let format = non_empty(&arguments["format"]).unwrap_or(DEFAULT_DATETIME_FORMAT);
                let mut out = String::new();
                write!(out, "{}", Local::now().format(format)).map_err(|_| {
                    ToolError::InvalidArguments(format!("Invalid format pattern: {format}"))
                })?;
                Ok(out)
            }
            "difference" => {
                let start = non_empty(&arguments["start_date"])
                    .ok_or_else(|| ToolError::InvalidArguments("Missing 'start_date' argument".into()))
                    .and_then(parse_date)?;
                let end = match non_empty(&arguments["end_date"]) {
                    Some(s) => parse_date(s)?,
                    None => today,
                };
                Ok(describe_difference(start, end))
            }
            "add" => {
                let start = match non_empty(&arguments["start_date"]) {
                    Some(s) => parse_date(s)?,
                    None => today,
                };
                let days = arguments["days"].as_i64().unwrap_or(0);
                let months = arguments["months"].as_i64().unwrap_or(0);
                let years = arguments["years"].as_i64().unwrap_or(0);
                let result = add_to_date(start, days, months, years)?;
                Ok(format!(
                    "Starting from {}, adding {} gives {}",
                    start.format(DATE_FORMAT),
                    describe_offset(days, months, years),
                    result.format(DATE_FORMAT)
                ))
            }
            other => Err(ToolError::InvalidArguments(format!(
                "Unknown operation '{other}'. Use now, difference, or add."
            ))),
        }
    }
}

fn non_empty(value: &serde_json::Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(s: &str) -> Result<NaiveDate, ToolError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| {
        ToolError::InvalidArguments(format!("Invalid date '{s}', expected YYYY-MM-DD: {e}"))
    })
}

/// Calendar period between two dates, as (years, months, days).
///
/// Whole months are counted first; the remaining days are measured from the
/// start date shifted by those months. Reversed inputs give negated parts.
pub fn period_between(start: NaiveDate, end: NaiveDate) -> (i64, i64, i64) {
    if end < start {
        let (y, m, d) = period_between(end, start);
        return (-y, -m, -d);
    }

    let mut total_months =
        (end.year() as i64 - start.year() as i64) * 12 + (end.month() as i64 - start.month() as i64);
    if end.day() < start.day() {
        total_months -= 1;
    }
    let anchor = u32::try_from(total_months)
        .ok()
        .and_then(|m| start.checked_add_months(Months::new(m)))
        .unwrap_or(start);
    let days = (end - anchor).num_days();
    (total_months / 12, total_months % 12, days)
}

fn describe_difference(start: NaiveDate, end: NaiveDate) -> String {
    let (years, months, days) = period_between(start, end);
    let total = (end - start).num_days();
    format!(
        "From {} to {}: {years} years, {months} months, {days} days ({total} days total)",
        start.format(DATE_FORMAT),
        end.format(DATE_FORMAT)
    )
}

fn shift_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        date.checked_add_months(magnitude)
    } else {
        date.checked_sub_months(magnitude)
    }
}

/// Days first, then months, then years.
pub fn add_to_date(start: NaiveDate, days: i64, months: i64, years: i64) -> Result<NaiveDate, ToolError> {
    let out_of_range = || ToolError::InvalidArguments("Resulting date is out of range".into());
    let date = start
        .checked_add_signed(chrono::Duration::try_days(days).ok_or_else(out_of_range)?)
        .ok_or_else(out_of_range)?;
    let date = shift_months(date, months).ok_or_else(out_of_range)?;
    shift_months(date, years.checked_mul(12).ok_or_else(out_of_range)?).ok_or_else(out_of_range)
}

fn describe_offset(days: i64, months: i64, years: i64) -> String {
    let parts: Vec<String> = [(days, "day"), (months, "month"), (years, "year")]
        .into_iter()
        .filter(|(n, _)| *n != 0)
        .map(|(n, unit)| {
            if n.abs() == 1 {
                format!("{n} {unit}")
            } else {
                format!("{n} {unit}s")
            }
        })
        .collect();
    if parts.is_empty() {
        "nothing".into()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn period_counts_whole_months_first() {
        assert_eq!(period_between(date("2020-01-15"), date("2024-03-20")), (4, 2, 5));
        assert_eq!(period_between(date("2024-01-31"), date("2024-03-01")), (0, 1, 1));
        assert_eq!(period_between(date("2024-03-20"), date("2020-01-15")), (-4, -2, -5));
        assert_eq!(period_between(date("2024-05-05"), date("2024-05-05")), (0, 0, 0));
    }

    #[test]
    fn add_clamps_to_month_end() {
        assert_eq!(add_to_date(date("2024-01-31"), 0, 1, 0).unwrap(), date("2024-02-29"));
        assert_eq!(add_to_date(date("2024-02-29"), 0, 0, 1).unwrap(), date("2025-02-28"));
        assert_eq!(add_to_date(date("2024-03-10"), -10, -1, 0).unwrap(), date("2024-01-29"));
    }

    #[tokio::test]
    async fn difference_output() {
        let output = DateTimeTool
            .execute(serde_json::json!({
                "operation": "difference",
                "start_date": "2024-01-01",
                "end_date": "2024-12-31"
            }))
            .await
            .unwrap();
        assert_eq!(
            output,
            "From 2024-01-01 to 2024-12-31: 0 years, 11 months, 30 days (365 days total)"
        );
    }

    #[tokio::test]
    async fn add_output() {
        let output = DateTimeTool
            .execute(serde_json::json!({
                "operation": "add",
                "start_date": "2024-01-01",
                "days": 1,
                "months": 2
            }))
            .await
            .unwrap();
        assert_eq!(
            output,
            "Starting from 2024-01-01, adding 1 day, 2 months gives 2024-03-02"
        );
    }

    #[tokio::test]
    async fn now_uses_format() {
        let output = DateTimeTool
            .execute(serde_json::json!({ "operation": "now", "format": "%Y" }))
            .await
            .unwrap();
        assert_eq!(output.len(), 4);
        assert!(output.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn bad_date_is_invalid_arguments() {
        let result = DateTimeTool
            .execute(serde_json::json!({
                "operation": "difference",
                "start_date": "01/02/2024"
            }))
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn unknown_operation_rejected() {
        let result = DateTimeTool
            .execute(serde_json::json!({ "operation": "tomorrow" }))
            .await;
        assert!(result.is_err());
    }
}
