//! ledgerlens-core: data model, job store and lifecycle manager for the analysis pipeline

pub mod finance;
pub mod job;
pub mod jobs;
pub mod store;

pub use finance::{
    AnalysisResult, Category, Insight, InsightData, InsightType, Prediction, Transaction,
    CATEGORY_VOCABULARY_VERSION,
};
pub use job::{AnalysisJob, JobId, JobStatus};
pub use jobs::{JobError, JobManager};
pub use store::{InMemoryJobStore, JobStore, SwapOutcome, Transition};

/// Deterministic keyword rules for transaction descriptions.
///
/// Used offline and as the fallback when no external classifier is configured.
pub mod categorizer {
    use std::sync::LazyLock;

    use regex::Regex;

    use super::Category;

    // First match wins, so the more specific groups come first.
    static RULES: LazyLock<Vec<(Category, Regex)>> = LazyLock::new(|| {
        let table: [(Category, &str); 12] = [
            (
                Category::Salary,
                r"\b(payroll|salary|direct deposit|stipend|paycheck|wages)\b",
            ),
            (
                Category::Rent,
                r"\b(rent|lease|landlord|apartment|property mgmt)\b",
            ),
            (
                Category::Investments,
                r"\b(vanguard|fidelity|schwab|robinhood|brokerage|invest\w*|401k|ira)\b",
            ),
            (
                Category::Education,
                r"\b(tuition|university|college|school|coursera|udemy|textbook)\b",
            ),
            (
                Category::Healthcare,
                r"\b(pharmacy|cvs|walgreens|clinic|hospital|dental|doctor|medical)\b",
            ),
            (
                Category::Utilities,
                r"\b(electric\w*|water bill|gas bill|utility|utilities|internet|comcast|verizon|at&t|phone bill)\b",
            ),
            (
                Category::Travel,
                r"\b(airline\w*|airbnb|hotel|expedia|booking\.com|delta|united air|southwest)\b",
            ),
            (
                Category::Transport,
                r"\b(uber|lyft|metro|transit|parking|shell|chevron|exxon|fuel|toll)\b",
            ),
            (
                Category::Groceries,
                r"\b(grocery|groceries|supermarket|whole foods|trader joe'?s|safeway|kroger|aldi|h-e-b)\b",
            ),
            (
                Category::DiningOut,
                r"\b(restaurant|cafe|coffee|starbucks|pizza|doordash|grubhub|uber eats|diner|bar & grill)\b",
            ),
            (
                Category::Entertainment,
                r"\b(netflix|spotify|hulu|cinema|movie\w*|theater|theatre|concert|steam|playstation)\b",
            ),
            (
                Category::Shopping,
                r"\b(amazon|walmart|target|best buy|ikea|clothing|mall|etsy)\b",
            ),
        ];
        table
            .into_iter()
            .filter_map(|(cat, pat)| Regex::new(&format!("(?i){pat}")).ok().map(|re| (cat, re)))
            .collect()
    });

    /// Categorize a description using keyword patterns
    pub fn categorize(description: &str) -> Category {
        RULES
            .iter()
            .find(|(_, re)| re.is_match(description))
            .map(|(cat, _)| *cat)
            .unwrap_or(Category::Uncategorized)
    }

}

pub use categorizer::categorize;
