//! # Runtime Values
//!
//! `Value<'a>` is the unit of data flowing through expression evaluation and
//! tuples. String payloads are `Cow` so a value can borrow straight out of a
//! record slot during a scan and be promoted to an owned `'static` value only
//! when it must outlive the row (sort buffers, subquery snapshots, composite
//! tuples).
//!
//! ## NULL Semantics
//!
//! `compare` returns `None` whenever either side is NULL or the types are
//! incomparable; callers decide what `None` means (comparisons evaluate to
//! false, sorting uses [`Value::compare_for_sort`] which orders NULL first).
//!
//! ## Arithmetic
//!
//! INT op INT stays INT with wrapping overflow, any FLOAT operand promotes
//! the result to FLOAT, and division always produces FLOAT. Division by zero
//! yields NULL rather than an error so one bad row cannot abort a scan.

use std::borrow::Cow;
use std::cmp::Ordering;

use crate::error::{DbError, Result};
use crate::types::{date, AttrType};

#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Null,
    Int(i32),
    Float(f32),
    Bool(bool),
    /// Day offset from 1970-01-01.
    Date(i32),
    /// Fixed-length string payload, trailing NULs already trimmed.
    Char(Cow<'a, [u8]>),
    /// Large string payload, materialized from the LOB store.
    Text(Cow<'a, [u8]>),
}

impl<'a> Value<'a> {
    pub fn char_from_str(s: &str) -> Value<'static> {
        Value::Char(Cow::Owned(s.as_bytes().to_vec()))
    }

    pub fn text_from_str(s: &str) -> Value<'static> {
        Value::Text(Cow::Owned(s.as_bytes().to_vec()))
    }

    pub fn attr_type(&self) -> AttrType {
        match self {
            Value::Null => AttrType::Undefined,
            Value::Int(_) => AttrType::Int,
            Value::Float(_) => AttrType::Float,
            Value::Bool(_) => AttrType::Bool,
            Value::Date(_) => AttrType::Date,
            Value::Char(_) => AttrType::Char,
            Value::Text(_) => AttrType::Text,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// A view of this value borrowing its payload, whatever the original
    /// lifetime. Lets owned cells hand out values without copying.
    pub fn borrow_ref(&self) -> Value<'_> {
        match self {
            Value::Null => Value::Null,
            Value::Int(v) => Value::Int(*v),
            Value::Float(v) => Value::Float(*v),
            Value::Bool(v) => Value::Bool(*v),
            Value::Date(v) => Value::Date(*v),
            Value::Char(b) => Value::Char(Cow::Borrowed(b.as_ref())),
            Value::Text(b) => Value::Text(Cow::Borrowed(b.as_ref())),
        }
    }

    /// Detaches the value from any borrowed record memory.
    pub fn to_owned_static(&self) -> Value<'static> {
        match self {
            Value::Null => Value::Null,
            Value::Int(v) => Value::Int(*v),
            Value::Float(v) => Value::Float(*v),
            Value::Bool(v) => Value::Bool(*v),
            Value::Date(v) => Value::Date(*v),
            Value::Char(b) => Value::Char(Cow::Owned(b.to_vec())),
            Value::Text(b) => Value::Text(Cow::Owned(b.to_vec())),
        }
    }

    /// Three-way comparison. `None` when either side is NULL or the types
    /// cannot be compared directly. INT and FLOAT compare through promotion;
    /// CHAR and TEXT compare bytewise against each other. Anything else
    /// needs an explicit cast first.
    pub fn compare(&self, other: &Value<'_>) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f32).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f32)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Char(a) | Value::Text(a), Value::Char(b) | Value::Text(b)) => {
                Some(a.as_ref().cmp(b.as_ref()))
            }
            _ => None,
        }
    }

    /// Total order used by sort buffers: NULL sorts before every non-NULL
    /// value, two NULLs compare equal, and incomparable pairs (which a
    /// well-typed sort key never produces) fall back to equal.
    pub fn compare_for_sort(&self, other: &Value<'_>) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.compare(other).unwrap_or(Ordering::Equal),
        }
    }

    /// Truthiness for predicate results. NULL is false.
    pub fn get_boolean(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Date(v) => *v != 0,
            Value::Char(b) | Value::Text(b) => match std::str::from_utf8(b) {
                Ok(s) => match s.trim().parse::<f32>() {
                    Ok(n) => n != 0.0,
                    Err(_) => !b.is_empty(),
                },
                Err(_) => !b.is_empty(),
            },
        }
    }

    /// Implicit cast following the type graph in [`AttrType::cast_cost`].
    /// NULL casts to NULL of any type.
    pub fn cast_to(&self, target: AttrType) -> Result<Value<'static>> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        if self.attr_type() == target {
            return Ok(self.to_owned_static());
        }
        let fail = || {
            DbError::SchemaFieldTypeMismatch(format!(
                "cannot cast {} to {}",
                self.attr_type(),
                target
            ))
        };
        match (self, target) {
            (Value::Int(v), AttrType::Float) => Ok(Value::Float(*v as f32)),
            (Value::Int(v), AttrType::Char) => Ok(Value::char_from_str(&v.to_string())),
            (Value::Float(v), AttrType::Int) => Ok(Value::Int(round_to_i32(*v))),
            (Value::Float(v), AttrType::Char) => Ok(Value::char_from_str(&float_to_string(*v))),
            (Value::Date(v), AttrType::Int) => Ok(Value::Int(*v)),
            (Value::Date(v), AttrType::Float) => Ok(Value::Float(*v as f32)),
            (Value::Date(v), AttrType::Char) => Ok(Value::char_from_str(&date::format_days(*v))),
            (Value::Char(b), AttrType::Date) => {
                let s = std::str::from_utf8(b).map_err(|_| fail())?;
                Ok(Value::Date(date::parse_date(s)?))
            }
            (Value::Char(b), AttrType::Text) => Ok(Value::Text(Cow::Owned(b.to_vec()))),
            (Value::Text(b), AttrType::Char) => Ok(Value::Char(Cow::Owned(b.to_vec()))),
            _ => Err(fail()),
        }
    }

    pub fn add(&self, other: &Value<'_>) -> Value<'static> {
        numeric_binary(self, other, i32::wrapping_add, |a, b| a + b)
    }

    pub fn subtract(&self, other: &Value<'_>) -> Value<'static> {
        numeric_binary(self, other, i32::wrapping_sub, |a, b| a - b)
    }

    pub fn multiply(&self, other: &Value<'_>) -> Value<'static> {
        numeric_binary(self, other, i32::wrapping_mul, |a, b| a * b)
    }

    /// Division always produces FLOAT; a zero divisor yields NULL.
    pub fn divide(&self, other: &Value<'_>) -> Value<'static> {
        let (a, b) = match (self.as_f32(), other.as_f32()) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                debug_assert!(
                    self.is_null() || other.is_null(),
                    "arithmetic on non-numeric values"
                );
                return Value::Null;
            }
        };
        if b == 0.0 {
            return Value::Null;
        }
        Value::Float(a / b)
    }

    pub fn negate(&self) -> Value<'static> {
        match self {
            Value::Null => Value::Null,
            Value::Int(v) => Value::Int(v.wrapping_neg()),
            Value::Float(v) => Value::Float(-v),
            _ => {
                debug_assert!(false, "arithmetic on non-numeric values");
                Value::Null
            }
        }
    }

    fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Int(v) => Some(*v as f32),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

fn numeric_binary(
    lhs: &Value<'_>,
    rhs: &Value<'_>,
    int_op: fn(i32, i32) -> i32,
    float_op: fn(f32, f32) -> f32,
) -> Value<'static> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Value::Int(int_op(*a, *b)),
        (Value::Int(a), Value::Float(b)) => Value::Float(float_op(*a as f32, *b)),
        (Value::Float(a), Value::Int(b)) => Value::Float(float_op(*a, *b as f32)),
        (Value::Float(a), Value::Float(b)) => Value::Float(float_op(*a, *b)),
        _ => {
            debug_assert!(
                lhs.is_null() || rhs.is_null(),
                "arithmetic on non-numeric values"
            );
            Value::Null
        }
    }
}

/// Round-half-away-from-zero, saturating at the i32 range.
fn round_to_i32(v: f32) -> i32 {
    let r = v.round();
    if r >= i32::MAX as f32 {
        i32::MAX
    } else if r <= i32::MIN as f32 {
        i32::MIN
    } else {
        r as i32
    }
}

/// Formats a float the way string casts expect: no scientific notation,
/// trailing fractional zeros trimmed.
fn float_to_string(v: f32) -> String {
    let mut s = format!("{v}");
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}

impl std::fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => f.write_str(&float_to_string(*v)),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Date(v) => f.write_str(&date::format_days(*v)),
            Value::Char(b) | Value::Text(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}
