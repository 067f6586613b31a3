//! # Expressions
//!
//! One closed expression tree shared by row-mode and chunk-mode evaluation.
//!
//! ## Evaluation Surfaces
//!
//! | Method | Input | Produces |
//! |--------------|---------------|---------------------------|
//! | `get_value` | one tuple | one value |
//! | `try_get_value` | nothing | value of a constant expr |
//! | `get_column` | chunk | one column |
//! | `eval` | chunk | AND into a selection vector |
//!
//! `get_column` refuses comparison and conjunction nodes (those only exist
//! on the `eval` path), and `eval` refuses everything else; the two surfaces
//! partition the tree.
//!
//! ## NULL and Comparison Rules
//!
//! An ordering comparison with a NULL operand is false, never NULL. When
//! operand types differ, the side with the cheaper implicit cast (per
//! [`AttrType::cast_cost`]) is converted; if neither direction exists the
//! comparison is logged and evaluates to false rather than failing the
//! statement.

use std::cmp::Ordering;

use tracing::warn;

use crate::error::{DbError, Result};
use crate::exec::ExecutionContext;
use crate::expr::aggregator::AggregateKind;
use crate::expr::subquery::SubqueryExpr;
use crate::expr::tuple::{Tuple, TupleCellSpec};
use crate::types::{AttrType, Chunk, Column, Value};

#[derive(Debug, Clone)]
pub enum Expr {
    Field(FieldExpr),
    Literal(LiteralExpr),
    Cast(CastExpr),
    Comparison(ComparisonExpr),
    Conjunction(ConjunctionExpr),
    Arithmetic(ArithmeticExpr),
    AggregateRef(AggregateRefExpr),
    Subquery(SubqueryExpr),
}

#[derive(Debug, Clone)]
pub struct FieldExpr {
    pub table: String,
    pub field: String,
    pub attr_type: AttrType,
}

impl FieldExpr {
    pub fn new(table: &str, field: &str, attr_type: AttrType) -> FieldExpr {
        FieldExpr {
            table: table.to_string(),
            field: field.to_string(),
            attr_type,
        }
    }

    pub fn spec(&self) -> TupleCellSpec {
        TupleCellSpec::new(&self.table, &self.field)
    }
}

#[derive(Debug, Clone)]
pub struct LiteralExpr {
    pub value: Value<'static>,
}

#[derive(Debug, Clone)]
pub struct CastExpr {
    pub child: Box<Expr>,
    pub target: AttrType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    IsNull,
    IsNotNull,
    In,
    NotIn,
}

impl CompOp {
    fn is_unary(&self) -> bool {
        matches!(self, CompOp::IsNull | CompOp::IsNotNull)
    }

    fn accepts(&self, ord: Ordering) -> bool {
        match self {
            CompOp::Eq => ord == Ordering::Equal,
            CompOp::Ne => ord != Ordering::Equal,
            CompOp::Lt => ord == Ordering::Less,
            CompOp::Le => ord != Ordering::Greater,
            CompOp::Gt => ord == Ordering::Greater,
            CompOp::Ge => ord != Ordering::Less,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComparisonExpr {
    pub op: CompOp,
    pub left: Box<Expr>,
    /// Absent for IS [NOT] NULL.
    pub right: Option<Box<Expr>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConjunctionKind {
    And,
    Or,
}

#[derive(Debug, Clone)]
pub struct ConjunctionExpr {
    pub kind: ConjunctionKind,
    pub children: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
}

#[derive(Debug, Clone)]
pub struct ArithmeticExpr {
    pub op: ArithOp,
    pub left: Box<Expr>,
    /// Absent for negation.
    pub right: Option<Box<Expr>>,
}

/// Reference to an aggregate result cell produced upstream. Resolved by
/// the display name of the aggregate (`SUM(score)` and so on).
#[derive(Debug, Clone)]
pub struct AggregateRefExpr {
    pub kind: AggregateKind,
    pub child: Box<Expr>,
}

impl AggregateRefExpr {
    pub fn display_name(&self) -> String {
        format!("{}({})", self.kind, self.child.name())
    }
}

impl Expr {
    pub fn literal(value: Value<'static>) -> Expr {
        Expr::Literal(LiteralExpr { value })
    }

    pub fn field(table: &str, field: &str, attr_type: AttrType) -> Expr {
        Expr::Field(FieldExpr::new(table, field, attr_type))
    }

    pub fn comparison(op: CompOp, left: Expr, right: Option<Expr>) -> Expr {
        Expr::Comparison(ComparisonExpr {
            op,
            left: Box::new(left),
            right: right.map(Box::new),
        })
    }

    pub fn conjunction(kind: ConjunctionKind, children: Vec<Expr>) -> Expr {
        Expr::Conjunction(ConjunctionExpr { kind, children })
    }

    pub fn arithmetic(op: ArithOp, left: Expr, right: Option<Expr>) -> Expr {
        Expr::Arithmetic(ArithmeticExpr {
            op,
            left: Box::new(left),
            right: right.map(Box::new),
        })
    }

    pub fn cast(child: Expr, target: AttrType) -> Expr {
        Expr::Cast(CastExpr {
            child: Box::new(child),
            target,
        })
    }

    /// Result type of the expression, as far as it is statically known.
    pub fn value_type(&self) -> AttrType {
        match self {
            Expr::Field(f) => f.attr_type,
            Expr::Literal(l) => l.value.attr_type(),
            Expr::Cast(c) => c.target,
            Expr::Comparison(_) | Expr::Conjunction(_) => AttrType::Bool,
            Expr::Arithmetic(a) => match a.op {
                ArithOp::Neg => a.left.value_type(),
                ArithOp::Div => AttrType::Float,
                _ => {
                    let lt = a.left.value_type();
                    let rt = a
                        .right
                        .as_ref()
                        .map(|r| r.value_type())
                        .unwrap_or(AttrType::Undefined);
                    if lt == AttrType::Int && rt == AttrType::Int {
                        AttrType::Int
                    } else {
                        AttrType::Float
                    }
                }
            },
            Expr::AggregateRef(a) => match a.kind {
                AggregateKind::Avg => AttrType::Float,
                AggregateKind::Count => AttrType::Int,
                _ => a.child.value_type(),
            },
            Expr::Subquery(s) => s.value_type(),
        }
    }

    /// Display name, used for output column headers and aggregate cell
    /// resolution.
    pub fn name(&self) -> String {
        match self {
            Expr::Field(f) => f.field.clone(),
            Expr::Literal(l) => l.value.to_string(),
            Expr::Cast(c) => c.child.name(),
            Expr::Comparison(_) => "<comparison>".to_string(),
            Expr::Conjunction(_) => "<condition>".to_string(),
            Expr::Arithmetic(a) => format!("<arith:{:?}({})>", a.op, a.left.name()),
            Expr::AggregateRef(a) => a.display_name(),
            Expr::Subquery(_) => "<subquery>".to_string(),
        }
    }

    /// Row-mode evaluation against one tuple.
    pub fn get_value(&self, tuple: &dyn Tuple, ctx: &ExecutionContext) -> Result<Value<'static>> {
        match self {
            Expr::Field(f) => Ok(tuple.find_cell(&f.spec())?.to_owned_static()),
            Expr::Literal(l) => Ok(l.value.clone()),
            Expr::Cast(c) => c.child.get_value(tuple, ctx)?.cast_to(c.target),
            Expr::Comparison(c) => self.eval_comparison(c, tuple, ctx),
            Expr::Conjunction(c) => {
                let result = match c.kind {
                    ConjunctionKind::And => {
                        let mut all = true;
                        for child in &c.children {
                            if !child.get_value(tuple, ctx)?.get_boolean() {
                                all = false;
                                break;
                            }
                        }
                        all
                    }
                    ConjunctionKind::Or => {
                        let mut any = false;
                        for child in &c.children {
                            if child.get_value(tuple, ctx)?.get_boolean() {
                                any = true;
                                break;
                            }
                        }
                        any
                    }
                };
                Ok(Value::Bool(result))
            }
            Expr::Arithmetic(a) => {
                let left = a.left.get_value(tuple, ctx)?;
                Ok(match a.op {
                    ArithOp::Neg => left.negate(),
                    op => {
                        let right = a
                            .right
                            .as_ref()
                            .ok_or_else(|| {
                                DbError::Internal("binary arithmetic without right operand".into())
                            })?
                            .get_value(tuple, ctx)?;
                        match op {
                            ArithOp::Add => left.add(&right),
                            ArithOp::Sub => left.subtract(&right),
                            ArithOp::Mul => left.multiply(&right),
                            ArithOp::Div => left.divide(&right),
                            ArithOp::Neg => unreachable!(),
                        }
                    }
                })
            }
            Expr::AggregateRef(a) => {
                let spec = TupleCellSpec::new("", &a.display_name());
                Ok(tuple.find_cell(&spec)?.to_owned_static())
            }
            Expr::Subquery(s) => s.execute_single(ctx, Some(tuple)),
        }
    }

    /// Evaluates an expression with no tuple inputs. Anything touching a
    /// field, aggregate or subquery is not constant and is rejected.
    pub fn try_get_value(&self) -> Result<Value<'static>> {
        match self {
            Expr::Literal(l) => Ok(l.value.clone()),
            Expr::Cast(c) => c.child.try_get_value()?.cast_to(c.target),
            Expr::Arithmetic(a) => {
                let left = a.left.try_get_value()?;
                Ok(match a.op {
                    ArithOp::Neg => left.negate(),
                    op => {
                        let right = a
                            .right
                            .as_ref()
                            .ok_or_else(|| {
                                DbError::Internal("binary arithmetic without right operand".into())
                            })?
                            .try_get_value()?;
                        match op {
                            ArithOp::Add => left.add(&right),
                            ArithOp::Sub => left.subtract(&right),
                            ArithOp::Mul => left.multiply(&right),
                            ArithOp::Div => left.divide(&right),
                            ArithOp::Neg => unreachable!(),
                        }
                    }
                })
            }
            _ => Err(DbError::InvalidArgument(
                "expression is not constant".into(),
            )),
        }
    }

    fn eval_comparison(
        &self,
        c: &ComparisonExpr,
        tuple: &dyn Tuple,
        ctx: &ExecutionContext,
    ) -> Result<Value<'static>> {
        let left = c.left.get_value(tuple, ctx)?;
        if c.op.is_unary() {
            let is_null = left.is_null();
            return Ok(Value::Bool(match c.op {
                CompOp::IsNull => is_null,
                _ => !is_null,
            }));
        }
        let right_expr = c
            .right
            .as_ref()
            .ok_or_else(|| DbError::Internal("binary comparison without right operand".into()))?;
        if matches!(c.op, CompOp::In | CompOp::NotIn) {
            return self.eval_membership(c.op, &left, right_expr, tuple, ctx);
        }
        let right = right_expr.get_value(tuple, ctx)?;
        if left.is_null() || right.is_null() {
            return Ok(Value::Bool(false));
        }
        match compare_with_casts(&left, &right) {
            Some(ord) => Ok(Value::Bool(c.op.accepts(ord))),
            None => {
                warn!(
                    left = %left.attr_type(),
                    right = %right.attr_type(),
                    "incomparable operands, comparison is false"
                );
                Ok(Value::Bool(false))
            }
        }
    }

    /// IN / NOT IN over a subquery's result set.
    ///
    /// A NULL left operand makes both forms false. NOT IN with no match but
    /// a NULL among the candidates is also false (the membership is
    /// unknowable, and unknown collapses to false here).
    fn eval_membership(
        &self,
        op: CompOp,
        left: &Value<'static>,
        right_expr: &Expr,
        tuple: &dyn Tuple,
        ctx: &ExecutionContext,
    ) -> Result<Value<'static>> {
        let subquery = match right_expr {
            Expr::Subquery(s) => s,
            _ => {
                return Err(DbError::InvalidArgument(
                    "IN requires a subquery on the right".into(),
                ))
            }
        };
        let candidates = subquery.execute(ctx, Some(tuple))?;
        if left.is_null() {
            return Ok(Value::Bool(false));
        }
        let mut has_null = false;
        let mut found = false;
        for candidate in &candidates {
            if candidate.is_null() {
                has_null = true;
                continue;
            }
            if compare_with_casts(left, candidate) == Some(Ordering::Equal) {
                found = true;
                break;
            }
        }
        Ok(Value::Bool(match op {
            CompOp::In => found,
            CompOp::NotIn => !found && !has_null,
            _ => unreachable!(),
        }))
    }

    /// Chunk-mode projection of the expression into one column.
    pub fn get_column(&self, chunk: &Chunk) -> Result<Column> {
        match self {
            Expr::Field(f) => {
                let (_, column) = chunk
                    .column_by_name(&f.field)
                    .ok_or_else(|| DbError::SchemaFieldMissing(f.field.clone()))?;
                Ok(column.clone())
            }
            Expr::Literal(l) => Column::new_constant(&l.value),
            Expr::Cast(c) => {
                let src = c.child.get_column(chunk)?;
                let mut out = Column::new(c.target, src.len())?;
                for row in 0..src.len() {
                    out.append_value(&src.get_value(row)?.cast_to(c.target)?)?;
                }
                Ok(out)
            }
            Expr::Arithmetic(a) => self.arithmetic_column(a, chunk),
            Expr::Comparison(_) | Expr::Conjunction(_) => Err(DbError::Internal(
                "boolean expressions evaluate through eval, not get_column".into(),
            )),
            Expr::AggregateRef(_) | Expr::Subquery(_) => Err(DbError::Internal(
                "expression has no chunk-mode projection".into(),
            )),
        }
    }

    fn arithmetic_column(&self, a: &ArithmeticExpr, chunk: &Chunk) -> Result<Column> {
        let left = a.left.get_column(chunk)?;
        if a.op == ArithOp::Neg {
            let mut out = Column::new(left.attr_type(), left.len())?;
            for row in 0..left.len() {
                out.append_value(&left.get_value(row)?.negate())?;
            }
            return Ok(out);
        }
        let right = a
            .right
            .as_ref()
            .ok_or_else(|| DbError::Internal("binary arithmetic without right operand".into()))?
            .get_column(chunk)?;
        let rows = if left.is_constant() && right.is_constant() {
            1
        } else {
            left.len().max(right.len())
        };
        let out_type = match a.op {
            ArithOp::Div => AttrType::Float,
            _ => {
                if left.attr_type() == AttrType::Int && right.attr_type() == AttrType::Int {
                    AttrType::Int
                } else {
                    AttrType::Float
                }
            }
        };
        let mut out = Column::new(out_type, rows)?;
        for row in 0..rows {
            let l = left.get_value(row)?;
            let r = right.get_value(row)?;
            let v = match a.op {
                ArithOp::Add => l.add(&r),
                ArithOp::Sub => l.subtract(&r),
                ArithOp::Mul => l.multiply(&r),
                ArithOp::Div => l.divide(&r),
                ArithOp::Neg => unreachable!(),
            };
            out.append_value(&v)?;
        }
        Ok(out)
    }

    /// Chunk-mode filtering: ANDs this boolean expression's result into the
    /// selection vector (one byte per row, nonzero = selected).
    pub fn eval(&self, chunk: &Chunk, select: &mut [u8]) -> Result<()> {
        let rows = chunk.rows();
        if select.len() < rows {
            return Err(DbError::Internal(
                "selection vector shorter than chunk".into(),
            ));
        }
        match self {
            Expr::Comparison(c) => self.eval_comparison_chunk(c, chunk, select, rows),
            Expr::Conjunction(c) => match c.kind {
                ConjunctionKind::And => {
                    for child in &c.children {
                        child.eval(chunk, select)?;
                    }
                    Ok(())
                }
                ConjunctionKind::Or => {
                    let mut acc = vec![0u8; rows];
                    let mut child_sel = vec![0u8; rows];
                    for child in &c.children {
                        child_sel.fill(1);
                        child.eval(chunk, &mut child_sel)?;
                        for (a, &c) in acc.iter_mut().zip(child_sel.iter()) {
                            *a |= c;
                        }
                    }
                    for (s, &a) in select.iter_mut().zip(acc.iter()).take(rows) {
                        *s &= a;
                    }
                    Ok(())
                }
            },
            _ => Err(DbError::Internal(
                "only boolean expressions evaluate over a chunk".into(),
            )),
        }
    }

    fn eval_comparison_chunk(
        &self,
        c: &ComparisonExpr,
        chunk: &Chunk,
        select: &mut [u8],
        rows: usize,
    ) -> Result<()> {
        if c.op.is_unary() {
            // Chunk columns carry no NULL bitmap, so IS NULL selects nothing
            // and IS NOT NULL everything.
            if c.op == CompOp::IsNull {
                for s in select.iter_mut().take(rows) {
                    *s = 0;
                }
            }
            return Ok(());
        }
        if matches!(c.op, CompOp::In | CompOp::NotIn) {
            return Err(DbError::Unimplemented("IN over chunks"));
        }
        let right_expr = c
            .right
            .as_ref()
            .ok_or_else(|| DbError::Internal("binary comparison without right operand".into()))?;
        let left = c.left.get_column(chunk)?;
        let right = right_expr.get_column(chunk)?;
        compare_columns(c.op, &left, &right, rows, select)
    }

    /// Structural equality, ignoring chunk positions. Subquery nodes never
    /// compare equal.
    pub fn structurally_equal(&self, other: &Expr) -> bool {
        match (self, other) {
            (Expr::Field(a), Expr::Field(b)) => a.table == b.table && a.field == b.field,
            (Expr::Literal(a), Expr::Literal(b)) => a.value == b.value,
            (Expr::Cast(a), Expr::Cast(b)) => {
                a.target == b.target && a.child.structurally_equal(&b.child)
            }
            (Expr::Comparison(a), Expr::Comparison(b)) => {
                a.op == b.op
                    && a.left.structurally_equal(&b.left)
                    && match (&a.right, &b.right) {
                        (None, None) => true,
                        (Some(x), Some(y)) => x.structurally_equal(y),
                        _ => false,
                    }
            }
            (Expr::Conjunction(a), Expr::Conjunction(b)) => {
                a.kind == b.kind
                    && a.children.len() == b.children.len()
                    && a.children
                        .iter()
                        .zip(&b.children)
                        .all(|(x, y)| x.structurally_equal(y))
            }
            (Expr::Arithmetic(a), Expr::Arithmetic(b)) => {
                a.op == b.op
                    && a.left.structurally_equal(&b.left)
                    && match (&a.right, &b.right) {
                        (None, None) => true,
                        (Some(x), Some(y)) => x.structurally_equal(y),
                        _ => false,
                    }
            }
            (Expr::AggregateRef(a), Expr::AggregateRef(b)) => {
                a.kind == b.kind && a.child.structurally_equal(&b.child)
            }
            _ => false,
        }
    }
}

/// Direct comparison first; otherwise cast the side with the cheaper
/// implicit conversion and retry. `None` when no direction works.
pub fn compare_with_casts(left: &Value<'_>, right: &Value<'_>) -> Option<Ordering> {
    if let Some(ord) = left.compare(right) {
        return Some(ord);
    }
    if left.is_null() || right.is_null() {
        return None;
    }
    let lt = left.attr_type();
    let rt = right.attr_type();
    let r_to_l = rt.cast_cost(lt);
    let l_to_r = lt.cast_cost(rt);
    let try_r_to_l = |l: &Value<'_>, r: &Value<'_>| {
        r.cast_to(lt).ok().and_then(|cast| l.compare(&cast))
    };
    let try_l_to_r = |l: &Value<'_>, r: &Value<'_>| {
        l.cast_to(rt).ok().and_then(|cast| cast.compare(r))
    };
    match (r_to_l, l_to_r) {
        (Some(a), Some(b)) if a <= b => {
            try_r_to_l(left, right).or_else(|| try_l_to_r(left, right))
        }
        (Some(_), Some(_)) => try_l_to_r(left, right).or_else(|| try_r_to_l(left, right)),
        (Some(_), None) => try_r_to_l(left, right),
        (None, Some(_)) => try_l_to_r(left, right),
        (None, None) => None,
    }
}

fn compare_columns(
    op: CompOp,
    left: &Column,
    right: &Column,
    rows: usize,
    select: &mut [u8],
) -> Result<()> {
    if let (Some(l), Some(r)) = (left.as_i32(), right.as_i32()) {
        return typed_compare(op, l, left.is_constant(), r, right.is_constant(), rows, select);
    }
    if let (Some(l), Some(r)) = (left.as_f32(), right.as_f32()) {
        return typed_compare(op, l, left.is_constant(), r, right.is_constant(), rows, select);
    }
    // Mixed numeric widths, CHAR columns and anything else go row-wise.
    for (row, s) in select.iter_mut().enumerate().take(rows) {
        if *s == 0 {
            continue;
        }
        let l = left.get_value(row)?;
        let r = right.get_value(row)?;
        let keep = match compare_with_casts(&l, &r) {
            Some(ord) => op.accepts(ord),
            None => false,
        };
        if !keep {
            *s = 0;
        }
    }
    Ok(())
}

/// Vectorized kernel over same-typed slices. The four constant/non-constant
/// combinations are dispatched once, outside the row loop.
fn typed_compare<T: Copy + PartialOrd>(
    op: CompOp,
    left: &[T],
    left_const: bool,
    right: &[T],
    right_const: bool,
    rows: usize,
    select: &mut [u8],
) -> Result<()> {
    let keep = |l: T, r: T| -> u8 {
        match l.partial_cmp(&r) {
            Some(ord) => op.accepts(ord) as u8,
            None => 0,
        }
    };
    let bounds = || DbError::Internal("column shorter than chunk".into());
    match (left_const, right_const) {
        (true, true) => {
            let v = keep(left[0], right[0]);
            for s in select.iter_mut().take(rows) {
                *s &= v;
            }
        }
        (true, false) => {
            if right.len() < rows {
                return Err(bounds());
            }
            for (s, &r) in select.iter_mut().zip(right.iter()).take(rows) {
                *s &= keep(left[0], r);
            }
        }
        (false, true) => {
            if left.len() < rows {
                return Err(bounds());
            }
            for (s, &l) in select.iter_mut().zip(left.iter()).take(rows) {
                *s &= keep(l, right[0]);
            }
        }
        (false, false) => {
            if left.len() < rows || right.len() < rows {
                return Err(bounds());
            }
            for ((s, &l), &r) in select
                .iter_mut()
                .zip(left.iter())
                .zip(right.iter())
                .take(rows)
            {
                *s &= keep(l, r);
            }
        }
    }
    Ok(())
}
