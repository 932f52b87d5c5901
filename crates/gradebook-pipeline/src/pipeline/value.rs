//! Tagged value model shared by every pipeline stage

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use super::row::Row;

/// A single value carried by a row field
#[derive(Debug, Clone)]
pub enum Value {
    /// Missing or explicit null
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// Double precision float
    Float(f64),
    /// Calendar date without a time component
    Date(NaiveDate),
    /// UTF-8 text
    Text(String),
    /// Ordered list of values
    List(Vec<Value>),
    /// Nested row
    Row(Row),
}

impl Value {
    /// Kind name, used in error messages and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Date(_) => "date",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Row(_) => "row",
        }
    }

    /// Returns true for `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the value (integers widen to f64)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Integer view of the value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Text view of the value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Date view of the value
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// List view of the value
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Nested row view of the value
    pub fn as_row(&self) -> Option<&Row> {
        match self {
            Self::Row(row) => Some(row),
            _ => None,
        }
    }

    /// Compare two values of the same kind.
    ///
    /// Integers and floats share one numeric domain and compare exactly.
    /// Returns `None` when the kinds are not comparable, either side is
    /// `Null` or either side is NaN; predicates rely on this to never match
    /// across kinds.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(_) | Self::Float(_), Self::Integer(_) | Self::Float(_)) => {
                if self.is_nan() || other.is_nan() {
                    None
                } else {
                    numeric_cmp(self, other)
                }
            }
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total order used by the sort stage.
    ///
    /// Kinds rank Null < numbers < Text < Date < List < Row. NaN sorts after
    /// every other number. Lists compare element-wise, rows by their sorted
    /// field entries.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        let rank = self.kind_rank().cmp(&other.kind_rank());
        if rank != Ordering::Equal {
            return rank;
        }

        match (self, other) {
            (Self::List(a), Self::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    let cmp = x.sort_cmp(y);
                    if cmp != Ordering::Equal {
                        return cmp;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Self::Row(a), Self::Row(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let cmp = ka.cmp(kb).then_with(|| va.sort_cmp(vb));
                    if cmp != Ordering::Equal {
                        return cmp;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Self::Integer(_) | Self::Float(_), _) => {
                numeric_cmp(self, other).unwrap_or(Ordering::Equal)
            }
            _ => self.compare(other).unwrap_or(Ordering::Equal),
        }
    }

    fn is_nan(&self) -> bool {
        matches!(self, Self::Float(f) if f.is_nan())
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Integer(_) | Self::Float(_) => 1,
            Self::Text(_) => 2,
            Self::Date(_) => 3,
            Self::List(_) => 4,
            Self::Row(_) => 5,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Integer(_) | Self::Float(_), Self::Integer(_) | Self::Float(_)) => {
                numeric_cmp(self, other) == Some(Ordering::Equal)
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Row(a), Self::Row(b)) => a == b,
            _ => false,
        }
    }
}

/// 2^63, exactly representable; every float at or above it exceeds `i64::MAX`
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Exact order over the numeric domain. NaN equals NaN and ranks above every
/// number. `None` for non-numeric operands.
fn numeric_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Some(x.cmp(y)),
        (Value::Integer(i), Value::Float(f)) => Some(int_float_cmp(*i, *f)),
        (Value::Float(f), Value::Integer(i)) => Some(int_float_cmp(*i, *f).reverse()),
        (Value::Float(x), Value::Float(y)) => Some(match (x.is_nan(), y.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            // -0.0 and 0.0 are equal here, as they are to Integer(0)
            (false, false) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        }),
        _ => None,
    }
}

/// Compares without widening the integer, so values above 2^53 stay distinct
fn int_float_cmp(i: i64, f: f64) -> Ordering {
    if f.is_nan() || f >= I64_LIMIT {
        return Ordering::Less;
    }
    if f < -I64_LIMIT {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    i.cmp(&(whole as i64))
        .then_with(|| 0.0f64.partial_cmp(&(f - whole)).unwrap_or(Ordering::Equal))
}

// Group keys hash values. Integral floats in i64 range hash as the matching
// integer and every NaN hashes alike, mirroring `numeric_cmp` equality.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Null => 0u8.hash(state),
            Self::Integer(i) => {
                1u8.hash(state);
                i.hash(state);
            }
            Self::Float(f) => {
                1u8.hash(state);
                if f.is_nan() {
                    u64::MAX.hash(state);
                } else if f.fract() == 0.0 && *f >= -I64_LIMIT && *f < I64_LIMIT {
                    (*f as i64).hash(state);
                } else {
                    f.to_bits().hash(state);
                }
            }
            Self::Text(s) => {
                2u8.hash(state);
                s.hash(state);
            }
            Self::Date(d) => {
                3u8.hash(state);
                d.hash(state);
            }
            Self::List(items) => {
                4u8.hash(state);
                items.hash(state);
            }
            Self::Row(row) => {
                5u8.hash(state);
                for (k, v) in row.iter() {
                    k.hash(state);
                    v.hash(state);
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Date(d) => write!(f, "{}", d),
            Self::Text(s) => write!(f, "{:?}", s),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Self::Row(row) => write!(f, "{}", row),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<Row> for Value {
    fn from(v: Row) -> Self {
        Self::Row(v)
    }
}
