//! Analysis engine: categorize, then derive spending patterns, anomalies and a
//! same-month projection.
//!
//! Amount convention: positive = expense.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{Datelike, Local, NaiveDate};
use ledgerlens_core::{
    AnalysisResult, Category, Insight, InsightData, InsightType, Prediction, Transaction,
};
use serde_json::json;
use tracing::{debug, warn};

use crate::classifier::Classifier;

/// A transaction is anomalous when it exceeds this multiple of the mean...
pub const ANOMALY_MEAN_MULTIPLIER: f64 = 3.0;
/// ...and this absolute floor.
pub const ANOMALY_ABSOLUTE_FLOOR: f64 = 100.0;
/// Same-month projection is naive, so confidence stays low.
pub const PROJECTION_CONFIDENCE: f64 = 0.5;

pub struct AnalysisEngine {
    classifier: Arc<dyn Classifier>,
    classifier_timeout: Option<Duration>,
}

impl AnalysisEngine {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self {
            classifier,
            classifier_timeout: None,
        }
    }

    /// Bound the categorization call; exceeding it fails the analysis.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.classifier_timeout = Some(timeout);
        self
    }

    /// Analyze against today's local date.
    pub async fn analyze(&self, transactions: Vec<Transaction>) -> Result<AnalysisResult> {
        self.analyze_on(transactions, Local::now().date_naive()).await
    }

    pub async fn analyze_on(
        &self,
        transactions: Vec<Transaction>,
        today: NaiveDate,
    ) -> Result<AnalysisResult> {
        if transactions.is_empty() {
            return Ok(AnalysisResult::default());
        }

        let labels = self.categorize(&transactions).await?;
        let categorized = assign_categories(transactions, labels);

        let mut insights = spending_patterns(&categorized);
        insights.extend(anomalies(&categorized));
        let predictions = project_current_month(&categorized, today);

        Ok(AnalysisResult {
            categorized_transactions: categorized,
            insights,
            predictions,
        })
    }

    async fn categorize(&self, transactions: &[Transaction]) -> Result<Vec<Category>> {
        let descriptions: Vec<String> =
            transactions.iter().map(|t| t.description.clone()).collect();
        let call = self.classifier.categorize(&descriptions);

        let labels = match self.classifier_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                anyhow!(
                    "categorization via '{}' timed out after {}ms",
                    self.classifier.name(),
                    limit.as_millis()
                )
            })??,
            None => call.await?,
        };

        if labels.len() < descriptions.len() {
            warn!(
                classifier = self.classifier.name(),
                expected = descriptions.len(),
                got = labels.len(),
                "classifier returned fewer labels; remainder left uncategorized"
            );
        }
        debug!(classifier = self.classifier.name(), count = labels.len(), "categorized");
        Ok(labels)
    }
}

/// Assign labels by position; transactions past the end of `labels` stay Uncategorized.
pub fn assign_categories(
    transactions: Vec<Transaction>,
    labels: Vec<Category>,
) -> Vec<Transaction> {
    let mut labels = labels.into_iter();
    transactions
        .into_iter()
        .map(|mut t| {
            t.category = labels.next().unwrap_or(Category::Uncategorized);
            t
        })
        .collect()
}

/// One SPENDING_PATTERN insight per category with a positive net total, in
/// first-seen order.
pub fn spending_patterns(transactions: &[Transaction]) -> Vec<Insight> {
    let mut order: Vec<Category> = Vec::new();
    let mut totals: HashMap<Category, f64> = HashMap::new();
    for t in transactions {
        let total = totals.entry(t.category).or_insert_with(|| {
            order.push(t.category);
            0.0
        });
        *total += t.amount;
    }

    order
        .into_iter()
        .filter_map(|category| {
            let total_spent = totals[&category];
            if total_spent <= 0.0 {
                return None;
            }
            let mut data = InsightData::new();
            data.insert("category".into(), json!(category.label()));
            data.insert("total_spent".into(), json!(total_spent));
            Some(Insight {
                kind: InsightType::SpendingPattern,
                title: format!("Spending Pattern: {category}"),
                description: format!("You spent a total of {total_spent:.2} in '{category}'."),
                data,
            })
        })
        .collect()
}

/// One ANOMALY_DETECTED insight per transaction above both the relative and
/// the absolute threshold. The mean covers every transaction, income included.
pub fn anomalies(transactions: &[Transaction]) -> Vec<Insight> {
    if transactions.is_empty() {
        return Vec::new();
    }
    let mean = transactions.iter().map(|t| t.amount).sum::<f64>() / transactions.len() as f64;
    let threshold = mean * ANOMALY_MEAN_MULTIPLIER;

    transactions
        .iter()
        .filter(|t| t.amount > threshold && t.amount > ANOMALY_ABSOLUTE_FLOOR)
        .map(|t| {
            let mut data = InsightData::new();
            data.insert("transaction_id".into(), json!(t.id));
            data.insert("amount".into(), json!(t.amount));
            data.insert("category".into(), json!(t.category.label()));
            data.insert("date".into(), json!(t.date.to_string()));
            Insight {
                kind: InsightType::AnomalyDetected,
                title: format!("Anomaly Detected: Large Transaction in {}", t.category),
                description: format!(
                    "An unusually large transaction of {:.2} was detected in '{}' on {}.",
                    t.amount, t.category, t.date
                ),
                data,
            }
        })
        .collect()
}

/// Sum of this month's transactions as the projection for this month.
pub fn project_current_month(transactions: &[Transaction], today: NaiveDate) -> Vec<Prediction> {
    let mut in_month = transactions
        .iter()
        .filter(|t| t.date.year() == today.year() && t.date.month() == today.month())
        .peekable();
    if in_month.peek().is_none() {
        return Vec::new();
    }
    let total: f64 = in_month.map(|t| t.amount).sum();

    vec![Prediction {
        period: today.format("%Y-%m").to_string(),
        predicted_amount: total,
        confidence_score: PROJECTION_CONFIDENCE,
    }]
}
