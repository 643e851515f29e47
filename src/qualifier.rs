use once_cell::sync::Lazy;
use regex::Regex;

use crate::analyzer::visible_text;
use crate::data_models::{ListingSystem, QualificationResult};

// `$` then a price: 1-3 digits with ,ddd groups, or a bare run of up to 6 digits.
static PRICE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\s*(?:\d{1,3}(?:,\d{3})+|\d{1,6})(?:\.\d{2})?").expect("valid price regex")
});

static APPLY_NOW_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bapply\s+now\b").expect("valid apply-now regex"));

/// What to count on a page.
#[derive(Debug, Clone)]
pub struct QualifyPattern {
    name: String,
    regex: Regex,
}

impl QualifyPattern {
    pub fn new(name: impl Into<String>, regex: Regex) -> QualifyPattern {
        QualifyPattern {
            name: name.into(),
            regex,
        }
    }

    /// Price markers such as `$950`, `$1,250` or `$ 1200.00`.
    pub fn price_marker() -> QualifyPattern {
        QualifyPattern::new("price marker", PRICE_REGEX.clone())
    }

    /// The phrase "apply now", any case.
    pub fn apply_now() -> QualifyPattern {
        QualifyPattern::new("apply now", APPLY_NOW_REGEX.clone())
    }

    pub fn for_system(system: ListingSystem) -> QualifyPattern {
        match system {
            ListingSystem::Buildium => QualifyPattern::price_marker(),
            ListingSystem::AppFolio => QualifyPattern::apply_now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn count(&self, text: &str) -> usize {
        self.regex.find_iter(text).count()
    }
}

/// Counts a pattern in a page's visible text and compares it to a threshold.
#[derive(Debug, Clone)]
pub struct Qualifier {
    pattern: QualifyPattern,
    threshold: usize,
}

impl Qualifier {
    pub fn new(pattern: QualifyPattern, threshold: usize) -> Qualifier {
        Qualifier { pattern, threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn pattern(&self) -> &QualifyPattern {
        &self.pattern
    }

    /// Occurrences of the pattern in the visible text of `html`.
    pub fn count(&self, html: &str) -> usize {
        self.pattern.count(&visible_text(html))
    }

    pub fn qualify(&self, url: &str, html: &str) -> QualificationResult {
        let count = self.count(html);
        QualificationResult {
            url: url.to_string(),
            passed: count >= self.threshold,
            count,
        }
    }
}
