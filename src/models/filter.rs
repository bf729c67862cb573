//! Typed query conditions shared by tour listings and aggregation pipelines

use chrono::{DateTime, Utc};

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    /// Parse the bracketed operator of a query parameter such as `price[lt]`
    pub fn from_param(op: &str) -> Option<Self> {
        match op {
            "eq" => Some(CompareOp::Eq),
            "ne" => Some(CompareOp::Ne),
            "gt" => Some(CompareOp::Gt),
            "gte" => Some(CompareOp::Gte),
            "lt" => Some(CompareOp::Lt),
            "lte" => Some(CompareOp::Lte),
            _ => None,
        }
    }

    /// SQL operator; `Ne` must treat NULL as a distinct value
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "IS DISTINCT FROM",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }
}

/// A bound value; never interpolated into SQL text
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        FilterValue::Bool(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::Int(v)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        FilterValue::Float(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(v: DateTime<Utc>) -> Self {
        FilterValue::Timestamp(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: CompareOp,
    pub value: FilterValue,
}

/// Conjunction of conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, op: CompareOp, value: impl Into<FilterValue>) -> Self {
        self.conditions.push(Condition {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, field: &str, value: impl Into<FilterValue>) -> Self {
        self.with(field, CompareOp::Eq, value)
    }

    pub fn ne(self, field: &str, value: impl Into<FilterValue>) -> Self {
        self.with(field, CompareOp::Ne, value)
    }

    pub fn gte(self, field: &str, value: impl Into<FilterValue>) -> Self {
        self.with(field, CompareOp::Gte, value)
    }

}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_order() {
        let f = Filter::new().gte("price", 100.0).eq("difficulty", "easy");
        assert_eq!(f.conditions.len(), 2);
        assert_eq!(f.conditions[0].field, "price");
        assert_eq!(f.conditions[1].value, FilterValue::Text("easy".into()));
    }

    #[test]
    fn test_operator_params() {
        assert_eq!(CompareOp::from_param("lte"), Some(CompareOp::Lte));
        assert_eq!(CompareOp::from_param("regex"), None);
        assert_eq!(CompareOp::Ne.as_sql(), "IS DISTINCT FROM");
    }
}
