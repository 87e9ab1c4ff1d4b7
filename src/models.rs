//! Core data models for the fulfillment service

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

//
// ================= Dates =================
//

/// Parse a calendar date from either `YYYY-MM-DD` or an RFC 3339 timestamp.
///
/// Timestamps keep the date in their own offset; time of day is dropped.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn deserialize_calendar_date<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_calendar_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid date '{}'", raw)))
}

/// Inclusive calendar date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatePeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DatePeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Read a `{ startDate, endDate }` parameter value.
    ///
    /// Returns `None` when the range is incomplete: either field missing,
    /// empty, or unparseable.
    pub fn from_value(value: &Value) -> Option<Self> {
        let start = value.get("startDate")?.as_str().and_then(parse_calendar_date)?;
        let end = value.get("endDate")?.as_str().and_then(parse_calendar_date)?;
        Some(Self { start, end })
    }

    pub fn is_ordered(&self) -> bool {
        self.start <= self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DatePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

//
// ================= Mobile =================
//

/// Mobile number reduced to its digits
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MobileNumber(String);

impl MobileNumber {
    /// Subscriber digits used for matching; longer inputs carry a country code.
    pub const KEY_DIGITS: usize = 10;

    /// Strip every non-digit character. `None` if nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            None
        } else {
            Some(Self(digits))
        }
    }

    pub fn digits(&self) -> &str {
        &self.0
    }

    /// Lookup key: the trailing ten digits, or all digits when shorter.
    pub fn key(&self) -> &str {
        let len = self.0.len();
        if len > Self::KEY_DIGITS {
            &self.0[len - Self::KEY_DIGITS..]
        } else {
            &self.0
        }
    }
}

impl fmt::Display for MobileNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ================= Accounts =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(deserialize_with = "deserialize_calendar_date")]
    pub date: NaiveDate,
    pub amount: f64,
    pub fund_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub mobile: String,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Account {
    pub fn mobile_number(&self) -> Option<MobileNumber> {
        MobileNumber::parse(&self.mobile)
    }

    /// Transactions inside `period`, oldest first.
    pub fn transactions_in(&self, period: &DatePeriod) -> Vec<&Transaction> {
        let mut matched: Vec<&Transaction> = self
            .transactions
            .iter()
            .filter(|t| period.contains(t.date))
            .collect();
        matched.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.fund_name.cmp(&b.fund_name)));
        matched
    }

    pub fn total_invested(&self) -> f64 {
        self.transactions.iter().map(|t| t.amount).sum()
    }

    pub fn last_transaction(&self) -> Option<&Transaction> {
        let mut sorted: Vec<&Transaction> = self.transactions.iter().collect();
        sorted.sort_by(|a, b| b.date.cmp(&a.date));
        sorted.into_iter().next()
    }
}

//
// ================= Funds =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundEntry {
    pub fund_name: String,
    pub fund_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundCategory {
    pub category: String,
    #[serde(default)]
    pub funds: Vec<FundEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundDetail {
    pub fund_name: String,
    /// Allocation percentage per holding or sector
    #[serde(default)]
    pub breakdown: BTreeMap<String, f64>,
    pub details_link: String,
}

//
// ================= Formatting =================
//

/// Rupee amount with two decimals
pub fn format_amount(amount: f64) -> String {
    format!("₹{:.2}", amount)
}
