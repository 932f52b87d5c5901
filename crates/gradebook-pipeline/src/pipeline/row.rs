//! Row type flowing between pipeline stages

use std::collections::BTreeMap;
use std::fmt;

use super::value::Value;

/// A mapping from field name to value.
///
/// Field order carries no meaning; access is always by name or dotted path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: BTreeMap<String, Value>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Insert or replace a top-level field
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Remove a top-level field
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Top-level field by name
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Number of top-level fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when the row has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Resolve a dotted path.
    ///
    /// Returns `None` when the path is structurally absent. When an
    /// intermediate segment holds a list, the rest of the path is resolved
    /// against every element and the present results are collected into a
    /// list, so `marks.score` on an un-unwound student yields all scores.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let value = self.fields.get(head)?;
        match rest {
            None => Some(value.clone()),
            Some(rest) => lookup_in(value, rest),
        }
    }

    /// Resolve a dotted path, treating absence as `Null`
    pub fn get(&self, path: &str) -> Value {
        self.lookup(path).unwrap_or(Value::Null)
    }
}

fn lookup_in(value: &Value, path: &str) -> Option<Value> {
    match value {
        Value::Row(row) => row.lookup(path),
        Value::List(items) => Some(Value::List(
            items.iter().filter_map(|item| lookup_in(item, path)).collect(),
        )),
        _ => None,
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
