//! Finance record types: transactions, the category vocabulary, and analysis output

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Bumped whenever a label is added, removed or renamed.
pub const CATEGORY_VOCABULARY_VERSION: u32 = 1;

/// A single normalized financial event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Row identity assigned by the parser (`txn-00001`, ...)
    pub id: String,
    /// Date of the transaction (YYYY-MM-DD)
    pub date: NaiveDate,
    /// Human-readable description
    pub description: String,
    /// Positive = expense, negative = income/refund
    pub amount: f64,
    /// Assigned once during analysis
    #[serde(default)]
    pub category: Category,
}

impl Transaction {
    pub fn new(
        id: impl Into<String>,
        date: NaiveDate,
        description: impl Into<String>,
        amount: f64,
    ) -> Self {
        Self {
            id: id.into(),
            date,
            description: description.into(),
            amount,
            category: Category::Uncategorized,
        }
    }
}

/// Closed category vocabulary shared by every classifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Category {
    Groceries,
    Utilities,
    Rent,
    Transport,
    #[serde(rename = "Dining Out")]
    DiningOut,
    Entertainment,
    Shopping,
    Salary,
    Investments,
    Healthcare,
    Education,
    Travel,
    #[default]
    Uncategorized,
}

impl Category {
    pub const ALL: [Category; 13] = [
        Category::Groceries,
        Category::Utilities,
        Category::Rent,
        Category::Transport,
        Category::DiningOut,
        Category::Entertainment,
        Category::Shopping,
        Category::Salary,
        Category::Investments,
        Category::Healthcare,
        Category::Education,
        Category::Travel,
        Category::Uncategorized,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Groceries => "Groceries",
            Category::Utilities => "Utilities",
            Category::Rent => "Rent",
            Category::Transport => "Transport",
            Category::DiningOut => "Dining Out",
            Category::Entertainment => "Entertainment",
            Category::Shopping => "Shopping",
            Category::Salary => "Salary",
            Category::Investments => "Investments",
            Category::Healthcare => "Healthcare",
            Category::Education => "Education",
            Category::Travel => "Travel",
            Category::Uncategorized => "Uncategorized",
        }
    }

    /// Map a free-form label onto the vocabulary.
    ///
    /// Matching ignores case, surrounding whitespace and quotes. Anything
    /// outside the vocabulary becomes `Uncategorized`.
    pub fn from_label(raw: &str) -> Category {
        let cleaned = raw
            .trim()
            .trim_matches(|c: char| c == '\'' || c == '"' || c == '.')
            .trim();
        Category::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(cleaned))
            .unwrap_or(Category::Uncategorized)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsightType {
    SpendingPattern,
    AnomalyDetected,
}

/// Primitive key/value payload; shape depends on the insight type.
pub type InsightData = BTreeMap<String, serde_json::Value>;

/// A derived observation about a set of transactions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightType,
    pub title: String,
    pub description: String,
    pub data: InsightData,
}

/// Projected spending for one calendar period
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    /// Year-month, e.g. "2026-02"
    pub period: String,
    pub predicted_amount: f64,
    /// 0.0 - 1.0
    pub confidence_score: f64,
}

/// Everything a completed job produces
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub categorized_transactions: Vec<Transaction>,
    pub insights: Vec<Insight>,
    pub predictions: Vec<Prediction>,
}
