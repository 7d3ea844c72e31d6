use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
pub enum PayrollStatus {
    Processing,
    Paid,
    Failed,
}

/// Pay period key, canonically `YYYY-MM`. `MM/YYYY` is accepted on input.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PayPeriod {
    year: i32,
    month: u32,
}

impl PayPeriod {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        ((1..=12).contains(&month) && (1900..=9999).contains(&year)).then_some(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }
}

impl fmt::Display for PayPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for PayPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = if let Some((year, month)) = s.split_once('-') {
            year.parse().ok().zip(month.parse().ok())
        } else if let Some((month, year)) = s.split_once('/') {
            year.parse().ok().zip(month.parse().ok())
        } else {
            None
        };

        parsed
            .and_then(|(year, month)| PayPeriod::new(year, month))
            .ok_or_else(|| format!("Invalid pay period '{s}'. Use YYYY-MM or MM/YYYY"))
    }
}

impl Serialize for PayPeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PayPeriod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The salary figures of one payroll record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalaryComponents {
    #[schema(example = 5000.0)]
    pub basic_salary: f64,
    #[schema(example = 200.0)]
    pub allowances: f64,
    #[schema(example = 0.0)]
    pub bonuses: f64,
    #[schema(example = 100.0)]
    pub deductions: f64,
    #[schema(example = 0.0)]
    pub tax: f64,
}

impl SalaryComponents {
    pub fn earnings(&self) -> f64 {
        self.basic_salary + self.allowances + self.bonuses
    }

    pub fn total_deductions(&self) -> f64 {
        self.deductions + self.tax
    }

    /// basic + allowances + bonuses - deductions - tax
    pub fn net_salary(&self) -> f64 {
        self.earnings() - self.total_deductions()
    }

    pub fn first_negative(&self) -> Option<&'static str> {
        [
            ("basicSalary", self.basic_salary),
            ("allowances", self.allowances),
            ("bonuses", self.bonuses),
            ("deductions", self.deductions),
            ("tax", self.tax),
        ]
        .into_iter()
        .find(|(_, v)| *v < 0.0 || !v.is_finite())
        .map(|(name, _)| name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payroll {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1)]
    pub user_id: u64,
    #[schema(value_type = String, example = "2024-01")]
    pub period: PayPeriod,
    #[serde(flatten)]
    pub salary: SalaryComponents,
    #[schema(example = 5100.0)]
    pub net_salary: f64,
    pub status: PayrollStatus,
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<String>,
    pub generated_by: Option<u64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewPayroll {
    pub user_id: u64,
    pub period: PayPeriod,
    pub salary: SalaryComponents,
    pub generated_by: u64,
    pub created_at: NaiveDateTime,
}

impl NewPayroll {
    pub fn net_salary(&self) -> f64 {
        self.salary.net_salary()
    }
}

/// Replacement values written by an update. `net_salary` is derived from
/// `salary` by the caller, never taken from a client.
#[derive(Debug, Clone)]
pub struct PayrollUpdate {
    pub salary: SalaryComponents,
    pub net_salary: f64,
    pub status: PayrollStatus,
    pub payment_method: Option<String>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct Payment {
    pub payment_date: NaiveDate,
    pub payment_method: String,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct PayrollFilter {
    pub user_id: Option<u64>,
    pub period: Option<PayPeriod>,
    pub status: Option<PayrollStatus>,
}

impl PayrollFilter {
    pub fn matches(&self, row: &Payroll) -> bool {
        self.user_id.is_none_or(|id| row.user_id == id)
            && self.period.is_none_or(|p| row.period == p)
            && self.status.is_none_or(|s| row.status == s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayrollSummary {
    pub record_count: u32,
    pub total_earnings: f64,
    pub total_deductions: f64,
    pub total_net_salary: f64,
    pub average_net_salary: f64,
}

impl PayrollSummary {
    pub fn from_records(records: &[Payroll]) -> Self {
        if records.is_empty() {
            return Self::default();
        }
        let total_earnings: f64 = records.iter().map(|p| p.salary.earnings()).sum();
        let total_deductions: f64 = records.iter().map(|p| p.salary.total_deductions()).sum();
        let total_net_salary: f64 = records.iter().map(|p| p.net_salary).sum();
        Self {
            record_count: records.len() as u32,
            total_earnings,
            total_deductions,
            total_net_salary,
            average_net_salary: total_net_salary / records.len() as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_period_spellings_normalize() {
        let a: PayPeriod = "2024-01".parse().unwrap();
        let b: PayPeriod = "01/2024".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(b.to_string(), "2024-01");
        assert!("2024-13".parse::<PayPeriod>().is_err());
        assert!("January".parse::<PayPeriod>().is_err());
    }

    #[test]
    fn net_salary_formula() {
        let s = SalaryComponents {
            basic_salary: 5000.0,
            allowances: 200.0,
            bonuses: 0.0,
            deductions: 100.0,
            tax: 0.0,
        };
        assert_eq!(s.net_salary(), 5100.0);
    }

    #[test]
    fn negative_component_is_named() {
        let s = SalaryComponents {
            tax: -1.0,
            ..Default::default()
        };
        assert_eq!(s.first_negative(), Some("tax"));
        assert_eq!(SalaryComponents::default().first_negative(), None);
    }

    #[test]
    fn empty_summary_is_all_zero() {
        assert_eq!(PayrollSummary::from_records(&[]), PayrollSummary::default());
    }
}
