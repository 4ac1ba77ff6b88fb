use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

pub const CREDIT_SCORE_MIN: i32 = 300;
pub const CREDIT_SCORE_MAX: i32 = 850;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    MissingField { field: &'static str },
    InvalidNumber { field: &'static str, value: String },
    InvalidChoice { field: &'static str, value: String },
    OutOfRange { field: &'static str, value: String },
}

impl DomainError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingField { field }
            | Self::InvalidNumber { field, .. }
            | Self::InvalidChoice { field, .. }
            | Self::OutOfRange { field, .. } => field,
        }
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field } => write!(f, "{field} is required"),
            Self::InvalidNumber { field, value } => {
                write!(f, "{field} must be a number, got {value:?}")
            }
            Self::InvalidChoice { field, value } => {
                write!(f, "{field} has unknown value {value:?}")
            }
            Self::OutOfRange { field: "credit_score", value } => write!(
                f,
                "credit_score must be between {CREDIT_SCORE_MIN} and {CREDIT_SCORE_MAX}, got {value}"
            ),
            Self::OutOfRange { field, value } => {
                write!(f, "{field} must not be negative, got {value}")
            }
        }
    }
}

impl std::error::Error for DomainError {}

/// Backend-issued record identifier.
///
/// The backend emits integers today, but the client only ever echoes the
/// value back in request paths, so both JSON numbers and strings are accepted
/// and kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MortgageId(String);

impl MortgageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MortgageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MortgageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(n) => Self(n.to_string()),
            RawId::Text(s) => Self(s),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoanType {
    Fixed,
    Adjustable,
}

impl LoanType {
    pub const ALL: [Self; 2] = [Self::Fixed, Self::Adjustable];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Adjustable => "adjustable",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Fixed => "Fixed Rate",
            Self::Adjustable => "Adjustable Rate",
        }
    }
}

impl FromStr for LoanType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s.trim())
            .ok_or_else(|| DomainError::InvalidChoice {
                field: "loan_type",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    SingleFamily,
    Condo,
}

impl PropertyType {
    pub const ALL: [Self; 2] = [Self::SingleFamily, Self::Condo];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleFamily => "single_family",
            Self::Condo => "condo",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::SingleFamily => "Single Family Home",
            Self::Condo => "Condo",
        }
    }
}

impl FromStr for PropertyType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s.trim())
            .ok_or_else(|| DomainError::InvalidChoice {
                field: "property_type",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CreditRating {
    #[serde(rename = "AAA")]
    Aaa,
    #[serde(rename = "BBB")]
    Bbb,
    #[serde(rename = "C")]
    C,
}

impl CreditRating {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aaa => "AAA",
            Self::Bbb => "BBB",
            Self::C => "C",
        }
    }
}

impl fmt::Display for CreditRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mortgage {
    pub id: MortgageId,
    pub applicant_name: String,
    pub income: f64,
    pub credit_score: i32,
    pub loan_amount: f64,
    pub property_value: f64,
    pub debt_amount: f64,
    pub loan_type: LoanType,
    pub property_type: PropertyType,
    #[serde(default)]
    pub credit_rating: Option<CreditRating>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Request body for create (POST) and full replace (PUT).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MortgageInput {
    pub applicant_name: String,
    pub income: f64,
    pub credit_score: i32,
    pub loan_amount: f64,
    pub property_value: f64,
    pub debt_amount: f64,
    pub loan_type: LoanType,
    pub property_type: PropertyType,
}

impl From<&Mortgage> for MortgageInput {
    fn from(m: &Mortgage) -> Self {
        Self {
            applicant_name: m.applicant_name.clone(),
            income: m.income,
            credit_score: m.credit_score,
            loan_amount: m.loan_amount,
            property_value: m.property_value,
            debt_amount: m.debt_amount,
            loan_type: m.loan_type,
            property_type: m.property_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RatingResult {
    pub mortgage_id: MortgageId,
    pub rating: CreditRating,
}

/// Raw form values, one string per field, as typed by the user.
///
/// Only presence and syntax are checked here. Ranges (credit score bounds,
/// positive amounts) are left to the backend, which answers 422.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MortgageDraft {
    pub applicant_name: String,
    pub income: String,
    pub credit_score: String,
    pub loan_amount: String,
    pub property_value: String,
    pub debt_amount: String,
    pub loan_type: String,
    pub property_type: String,
}

impl MortgageDraft {
    pub const FIELDS: [&'static str; 8] = [
        "applicant_name",
        "income",
        "debt_amount",
        "credit_score",
        "loan_amount",
        "property_value",
        "loan_type",
        "property_type",
    ];

    pub fn field(&self, name: &str) -> Option<&str> {
        Some(match name {
            "applicant_name" => &self.applicant_name,
            "income" => &self.income,
            "credit_score" => &self.credit_score,
            "loan_amount" => &self.loan_amount,
            "property_value" => &self.property_value,
            "debt_amount" => &self.debt_amount,
            "loan_type" => &self.loan_type,
            "property_type" => &self.property_type,
            _ => return None,
        })
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        Some(match name {
            "applicant_name" => &mut self.applicant_name,
            "income" => &mut self.income,
            "credit_score" => &mut self.credit_score,
            "loan_amount" => &mut self.loan_amount,
            "property_value" => &mut self.property_value,
            "debt_amount" => &mut self.debt_amount,
            "loan_type" => &mut self.loan_type,
            "property_type" => &mut self.property_type,
            _ => return None,
        })
    }

    pub fn into_input(&self) -> Result<MortgageInput, DomainError> {
        let applicant_name = required("applicant_name", &self.applicant_name)?.to_string();
        Ok(MortgageInput {
            applicant_name,
            income: parse_amount("income", &self.income)?,
            credit_score: parse_score(&self.credit_score)?,
            loan_amount: parse_amount("loan_amount", &self.loan_amount)?,
            property_value: parse_amount("property_value", &self.property_value)?,
            debt_amount: parse_amount("debt_amount", &self.debt_amount)?,
            loan_type: required("loan_type", &self.loan_type)?.parse()?,
            property_type: required("property_type", &self.property_type)?.parse()?,
        })
    }
}

impl From<&Mortgage> for MortgageDraft {
    fn from(m: &Mortgage) -> Self {
        Self {
            applicant_name: m.applicant_name.clone(),
            income: m.income.to_string(),
            credit_score: m.credit_score.to_string(),
            loan_amount: m.loan_amount.to_string(),
            property_value: m.property_value.to_string(),
            debt_amount: m.debt_amount.to_string(),
            loan_type: m.loan_type.as_str().to_string(),
            property_type: m.property_type.as_str().to_string(),
        }
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, DomainError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::MissingField { field });
    }
    Ok(value)
}

fn parse_amount(field: &'static str, value: &str) -> Result<f64, DomainError> {
    let raw = required(field, value)?;
    let cleaned: String = raw.chars().filter(|c| *c != ',' && *c != '_').collect();
    let amount = cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DomainError::InvalidNumber {
            field,
            value: raw.to_string(),
        })?;
    if amount < 0.0 {
        return Err(DomainError::OutOfRange {
            field,
            value: raw.to_string(),
        });
    }
    Ok(amount)
}

fn parse_score(value: &str) -> Result<i32, DomainError> {
    let raw = required("credit_score", value)?;
    let score = raw.parse::<i32>().map_err(|_| DomainError::InvalidNumber {
        field: "credit_score",
        value: raw.to_string(),
    })?;
    if !(CREDIT_SCORE_MIN..=CREDIT_SCORE_MAX).contains(&score) {
        return Err(DomainError::OutOfRange {
            field: "credit_score",
            value: raw.to_string(),
        });
    }
    Ok(score)
}
