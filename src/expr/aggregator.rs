//! # Aggregators
//!
//! Streaming accumulators for SUM, AVG, COUNT, MAX and MIN. NULL inputs are
//! skipped by every kind; COUNT counts rows it accepted and answers 0 (not
//! NULL) over empty input, while the others answer NULL when no non-NULL
//! value arrived. `evaluate` is pure and may be called repeatedly.

use std::cmp::Ordering;

use crate::error::{DbError, Result};
use crate::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Sum,
    Avg,
    Count,
    Max,
    Min,
}

impl std::fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AggregateKind::Sum => "SUM",
            AggregateKind::Avg => "AVG",
            AggregateKind::Count => "COUNT",
            AggregateKind::Max => "MAX",
            AggregateKind::Min => "MIN",
        })
    }
}

pub trait Aggregator: Send {
    fn accumulate(&mut self, value: &Value<'_>) -> Result<()>;

    fn evaluate(&self) -> Result<Value<'static>>;
}

pub fn create_aggregator(kind: AggregateKind) -> Box<dyn Aggregator> {
    match kind {
        AggregateKind::Sum => Box::new(SumAggregator::default()),
        AggregateKind::Avg => Box::new(AvgAggregator::default()),
        AggregateKind::Count => Box::new(CountAggregator::default()),
        AggregateKind::Max => Box::new(ExtremeAggregator::new(Ordering::Greater)),
        AggregateKind::Min => Box::new(ExtremeAggregator::new(Ordering::Less)),
    }
}

#[derive(Debug, Default)]
struct SumAggregator {
    sum: Option<Value<'static>>,
}

fn check_numeric(value: &Value<'_>) -> Result<()> {
    if !value.attr_type().is_numeric() {
        return Err(DbError::SchemaFieldTypeMismatch(format!(
            "cannot aggregate {} value numerically",
            value.attr_type()
        )));
    }
    Ok(())
}

impl Aggregator for SumAggregator {
    fn accumulate(&mut self, value: &Value<'_>) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        check_numeric(value)?;
        self.sum = Some(match &self.sum {
            None => value.to_owned_static(),
            Some(acc) => {
                debug_assert_eq!(acc.attr_type(), value.attr_type(), "mixed aggregate input");
                acc.add(value)
            }
        });
        Ok(())
    }

    fn evaluate(&self) -> Result<Value<'static>> {
        Ok(self.sum.clone().unwrap_or(Value::Null))
    }
}

#[derive(Debug, Default)]
struct AvgAggregator {
    sum: f32,
    count: u32,
}

impl Aggregator for AvgAggregator {
    fn accumulate(&mut self, value: &Value<'_>) -> Result<()> {
        match value {
            Value::Null => Ok(()),
            Value::Int(v) => {
                self.sum += *v as f32;
                self.count += 1;
                Ok(())
            }
            Value::Float(v) => {
                self.sum += v;
                self.count += 1;
                Ok(())
            }
            _ => Err(DbError::SchemaFieldTypeMismatch(format!(
                "cannot aggregate {} value numerically",
                value.attr_type()
            ))),
        }
    }

    fn evaluate(&self) -> Result<Value<'static>> {
        if self.count == 0 {
            return Ok(Value::Null);
        }
        Ok(Value::Float(self.sum / self.count as f32))
    }
}

#[derive(Debug, Default)]
struct CountAggregator {
    count: u64,
}

impl Aggregator for CountAggregator {
    fn accumulate(&mut self, value: &Value<'_>) -> Result<()> {
        if !value.is_null() {
            self.count += 1;
        }
        Ok(())
    }

    fn evaluate(&self) -> Result<Value<'static>> {
        Ok(Value::Int(self.count as i32))
    }
}

/// MAX when `keep` is `Greater`, MIN when `Less`.
#[derive(Debug)]
struct ExtremeAggregator {
    keep: Ordering,
    best: Option<Value<'static>>,
}

impl ExtremeAggregator {
    fn new(keep: Ordering) -> ExtremeAggregator {
        ExtremeAggregator { keep, best: None }
    }
}

impl Aggregator for ExtremeAggregator {
    fn accumulate(&mut self, value: &Value<'_>) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        match &self.best {
            None => self.best = Some(value.to_owned_static()),
            Some(best) => {
                debug_assert!(
                    value.compare(best).is_some(),
                    "mixed aggregate input"
                );
                if value.compare(best) == Some(self.keep) {
                    self.best = Some(value.to_owned_static());
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self) -> Result<Value<'static>> {
        Ok(self.best.clone().unwrap_or(Value::Null))
    }
}
