//! Breach predicates

use std::fmt;
use std::str::FromStr;

/// Comparison applied between an observed value and the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Breach when value > threshold
    GreaterThan,
    /// Breach when value >= threshold
    GreaterOrEqual,
    /// Breach when value == threshold
    Equals,
    /// Breach when value < threshold
    LessThan,
    /// Breach when value <= threshold
    LessOrEqual,
    /// Breach when value != threshold
    NotEquals,
}

impl Comparison {
    /// Operator symbol used in alert messages
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::GreaterThan => ">",
            Comparison::GreaterOrEqual => ">=",
            Comparison::Equals => "==",
            Comparison::LessThan => "<",
            Comparison::LessOrEqual => "<=",
            Comparison::NotEquals => "!=",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Comparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gt" | ">" | "greater_than" => Ok(Comparison::GreaterThan),
            "gte" | "ge" | ">=" | "greater_or_equal" => Ok(Comparison::GreaterOrEqual),
            "eq" | "==" | "=" | "equals" => Ok(Comparison::Equals),
            "lt" | "<" | "less_than" => Ok(Comparison::LessThan),
            "lte" | "le" | "<=" | "less_or_equal" => Ok(Comparison::LessOrEqual),
            "ne" | "!=" | "not_equals" => Ok(Comparison::NotEquals),
            other => Err(format!("unknown comparison '{}'", other)),
        }
    }
}

/// Threshold condition a signal value must satisfy to count as a breach
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Condition {
    pub comparison: Comparison,
    pub threshold: f64,
}

impl Condition {
    /// Create a condition from a comparison and threshold
    pub fn new(comparison: Comparison, threshold: f64) -> Self {
        Self {
            comparison,
            threshold,
        }
    }

    /// Breach when value > threshold
    pub fn greater_than(threshold: f64) -> Self {
        Self::new(Comparison::GreaterThan, threshold)
    }

    /// Breach when value == threshold
    pub fn equals(threshold: f64) -> Self {
        Self::new(Comparison::Equals, threshold)
    }

    /// Whether `value` satisfies the condition. NaN never breaches.
    pub fn is_breached(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        let threshold = self.threshold;
        match self.comparison {
            Comparison::GreaterThan => value > threshold,
            Comparison::GreaterOrEqual => value >= threshold,
            Comparison::Equals => value == threshold,
            Comparison::LessThan => value < threshold,
            Comparison::LessOrEqual => value <= threshold,
            Comparison::NotEquals => value != threshold,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.comparison, self.threshold)
    }
}
