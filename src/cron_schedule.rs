use std::str::FromStr;
use chrono::{DateTime, Utc};
use cron::Schedule;
use crate::error::{Error, Result};

/// A parsed cron expression as stored on scheduled triggers.
///
/// Accepts the five field form (`minute hour day-of-month month day-of-week`)
/// with standard numbering, 0 or 7 being Sunday, as well as the six and seven
/// field forms that carry seconds and years. The latter are read as the `cron`
/// crate reads them, where numeric days of week run from 1 (Sunday) to 7.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: Schedule,
}

impl CronSchedule {

    pub fn parse(expression: &str) -> Result<Self> {
        let normalized: String = Self::normalize(expression)?;
        match Schedule::from_str(normalized.as_str()) {
            Ok(schedule) => Ok(Self {
                expression: expression.to_string(),
                schedule
            }),
            Err(error) => Err(Error::Cron {
                expression: expression.to_string(),
                message: error.to_string()
            })
        }
    }

    /// Returns the first instant matching the expression strictly after `datetime`.
    pub fn get_upcoming(&self, datetime: DateTime<Utc>) -> Result<DateTime<Utc>> {
        match self.schedule.after(&datetime).next() {
            Some(item) => Ok(item),
            None => Err(Error::Cron {
                expression: self.expression.clone(),
                message: format!("no upcoming instant after {}",datetime)
            })
        }
    }

    pub fn get_expression(&self) -> &str {
        &self.expression
    }

    /// Format: second  minute   hour   day of month   month   day of week   year
    fn normalize(expression: &str) -> Result<String> {
        let mut fields: Vec<String> = expression.split_whitespace().map(|value| value.to_string()).collect();
        if fields.len() == 5 {
            fields[4] = Self::weekdays(expression, &fields[4])?;
            fields.insert(0, "0".to_string());
        }
        Ok(fields.join(" "))
    }

    /// Rewrites numeric day-of-week items as day names, expanding ranges and steps.
    /// Named items such as `Mon` are kept as written.
    fn weekdays(expression: &str, field: &str) -> Result<String> {
        if field == "*" || field == "?" {
            return Ok(field.to_string());
        }
        let mut days: [bool; 7] = [false; 7];
        let mut named: Vec<&str> = Vec::new();
        for item in field.split(',') {
            if !item.chars().all(|value| value.is_ascii_digit() || matches!(value, '-' | '/' | '*')) {
                named.push(item);
                continue;
            }
            let Some(values) = expand_weekday(item) else {
                return Err(Error::Cron {
                    expression: expression.to_string(),
                    message: format!("invalid day of week '{}'",item)
                });
            };
            for value in values {
                days[value] = true;
            }
        }
        let mut items: Vec<&str> = (0..7).filter(|day| days[*day]).map(|day| WEEKDAYS[day]).collect();
        items.extend(named);
        Ok(items.join(","))
    }
}

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Days (0 = Sunday) matched by one numeric item: `n`, `a-b`, `*/s`, `a/s` or `a-b/s`.
fn expand_weekday(item: &str) -> Option<Vec<usize>> {
    let (range, step) = match item.split_once('/') {
        Some((range, step)) => (range, step.parse::<usize>().ok().filter(|value| *value > 0)?),
        None => (item, 1),
    };
    let (start, end) = if range == "*" {
        (0, 6)
    } else if let Some((start, end)) = range.split_once('-') {
        (start.parse::<usize>().ok()?, end.parse::<usize>().ok()?)
    } else {
        let start: usize = range.parse::<usize>().ok()?;
        (start, if item.contains('/') { 6 } else { start })
    };
    if start > end || end > 7 {
        return None;
    }
    Some((start..=end).step_by(step).map(|value| value % 7).collect())
}
