//! Match predicates: conjunctions of field conditions

use std::cmp::Ordering;
use std::fmt;

use super::row::Row;
use super::value::Value;

/// Operator applied to a single field
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOperator {
    /// Equal to the operand
    Eq(Value),
    /// Strictly greater than the operand
    Gt(Value),
    /// Strictly less than the operand
    Lt(Value),
    /// Within the closed range `[low, high]`
    Between(Value, Value),
    /// Text starts with the operand
    StartsWith(String),
    /// Text contains the operand
    Contains(String),
    /// Field is structurally present (a present `Null` counts)
    Exists,
}

impl QueryOperator {
    /// Short operator name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Eq(_) => "eq",
            Self::Gt(_) => "gt",
            Self::Lt(_) => "lt",
            Self::Between(_, _) => "between",
            Self::StartsWith(_) => "starts_with",
            Self::Contains(_) => "contains",
            Self::Exists => "exists",
        }
    }

    fn matches_value(&self, value: &Value) -> bool {
        match self {
            Self::Eq(expected) => !value.is_null() && value == expected,
            Self::Gt(bound) => value.compare(bound) == Some(Ordering::Greater),
            Self::Lt(bound) => value.compare(bound) == Some(Ordering::Less),
            Self::Between(low, high) => {
                matches!(
                    value.compare(low),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(value.compare(high), Some(Ordering::Less | Ordering::Equal))
            }
            Self::StartsWith(prefix) => value.as_str().is_some_and(|s| s.starts_with(prefix)),
            Self::Contains(needle) => value.as_str().is_some_and(|s| s.contains(needle)),
            Self::Exists => true,
        }
    }

    fn operand_is_list(&self) -> bool {
        match self {
            Self::Eq(v) | Self::Gt(v) | Self::Lt(v) => matches!(v, Value::List(_)),
            _ => false,
        }
    }
}

/// A field condition in a query
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    /// Field path (dot notation supported)
    pub field: String,
    /// Operator to apply
    pub operator: QueryOperator,
}

impl FieldCondition {
    /// Evaluate the condition against a row.
    ///
    /// An absent field behaves as `Null` and fails every operator except
    /// `Exists`. A list-valued field matches when any element does, unless
    /// the operand is itself a list.
    pub fn matches(&self, row: &Row) -> bool {
        let Some(value) = row.lookup(&self.field) else {
            return false;
        };

        if matches!(self.operator, QueryOperator::Exists) {
            return true;
        }

        match &value {
            Value::List(items) if !self.operator.operand_is_list() => {
                items.iter().any(|item| self.operator.matches_value(item))
            }
            _ => self.operator.matches_value(&value),
        }
    }
}

/// A conjunction of field conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowQuery {
    conditions: Vec<FieldCondition>,
}

impl RowQuery {
    /// Query that matches every row
    pub fn all() -> Self {
        Self::default()
    }

    /// Conditions in evaluation order
    pub fn conditions(&self) -> &[FieldCondition] {
        &self.conditions
    }

    /// Returns true when every condition holds
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }
}

impl fmt::Display for RowQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.conditions.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{} {}", c.field, c.operator.name())?;
        }
        Ok(())
    }
}

/// Fluent builder for [`RowQuery`]
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    conditions: Vec<FieldCondition>,
}

impl QueryBuilder {
    /// Create a new query builder
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, field: &str, operator: QueryOperator) -> Self {
        self.conditions.push(FieldCondition {
            field: field.to_string(),
            operator,
        });
        self
    }

    /// Add equality condition
    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.push(field, QueryOperator::Eq(value.into()))
    }

    /// Add greater than condition
    pub fn gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.push(field, QueryOperator::Gt(value.into()))
    }

    /// Add less than condition
    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.push(field, QueryOperator::Lt(value.into()))
    }

    /// Add closed range condition
    pub fn between(self, field: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.push(field, QueryOperator::Between(low.into(), high.into()))
    }

    /// Add text prefix condition
    pub fn starts_with(self, field: &str, prefix: &str) -> Self {
        self.push(field, QueryOperator::StartsWith(prefix.to_string()))
    }

    /// Add substring condition
    pub fn contains(self, field: &str, needle: &str) -> Self {
        self.push(field, QueryOperator::Contains(needle.to_string()))
    }

    /// Add existence condition
    pub fn exists(self, field: &str) -> Self {
        self.push(field, QueryOperator::Exists)
    }

    /// Build the query
    pub fn build(self) -> RowQuery {
        RowQuery {
            conditions: self.conditions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn mark_row(subject: &str, score: i64, date: (i32, u32, u32)) -> Row {
        let mark = Row::new()
            .with("subject", subject)
            .with("score", score)
            .with(
                "date",
                NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            );
        Row::new()
            .with("id", 1)
            .with("phone", "0510000001")
            .with("marks", mark)
    }

    #[test]
    fn test_gt_is_strict() {
        let row = mark_row("Math", 80, (2024, 1, 20));
        assert!(!QueryBuilder::new().gt("marks.score", 80).build().matches(&row));
        assert!(QueryBuilder::new().gt("marks.score", 79).build().matches(&row));
    }

    #[test]
    fn test_between_is_closed() {
        let row = mark_row("Math", 80, (2024, 1, 31));
        let low = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let high = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let query = QueryBuilder::new().between("marks.date", low, high).build();
        assert!(query.matches(&row));
    }

    #[test]
    fn test_conditions_are_anded() {
        let row = mark_row("Math", 90, (2024, 1, 5));
        let hit = QueryBuilder::new()
            .eq("marks.subject", "Math")
            .gt("marks.score", 85)
            .build();
        let miss = QueryBuilder::new()
            .eq("marks.subject", "Bio")
            .gt("marks.score", 85)
            .build();
        assert!(hit.matches(&row));
        assert!(!miss.matches(&row));
    }

    #[test]
    fn test_absent_and_null_never_compare() {
        let row = Row::new().with("id", 1).with("avg", Value::Null);
        assert!(!QueryBuilder::new().gt("avg", 0).build().matches(&row));
        assert!(!QueryBuilder::new().lt("missing", 100).build().matches(&row));
        assert!(!QueryBuilder::new().eq("avg", Value::Null).build().matches(&row));
    }

    #[test]
    fn test_exists_distinguishes_absent_from_null() {
        let row = Row::new().with("avg", Value::Null);
        assert!(QueryBuilder::new().exists("avg").build().matches(&row));
        assert!(!QueryBuilder::new().exists("count").build().matches(&row));
    }

    #[test]
    fn test_mixed_kinds_never_match() {
        let row = Row::new().with("phone", "100");
        assert!(!QueryBuilder::new().gt("phone", 5).build().matches(&row));
    }

    #[test]
    fn test_text_prefix_and_substring() {
        let row = Row::new().with("phone", "0510000001");
        assert!(QueryBuilder::new().starts_with("phone", "051").build().matches(&row));
        assert!(!QueryBuilder::new().starts_with("phone", "052").build().matches(&row));
        assert!(QueryBuilder::new().contains("phone", "0000").build().matches(&row));
    }

    #[test]
    fn test_list_field_matches_any_element() {
        let marks = vec![
            Value::Row(Row::new().with("score", 60)),
            Value::Row(Row::new().with("score", 95)),
        ];
        let row = Row::new().with("marks", marks);
        assert!(QueryBuilder::new().gt("marks.score", 90).build().matches(&row));
        assert!(!QueryBuilder::new().gt("marks.score", 95).build().matches(&row));
    }

    #[test]
    fn test_empty_query_matches_everything() {
        assert!(RowQuery::all().matches(&Row::new()));
    }
}
