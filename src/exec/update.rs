//! # Update
//!
//! Sets one field to a constant value on every row its child produces. The
//! child is drained completely first, then the collected rows are patched,
//! so the scan never observes its own writes.
//!
//! Each patch copies the stored record and rewrites only the target slot
//! (plus the null bit). A new TEXT value goes to the LOB store and the slot
//! receives the fresh reference; the old payload is simply abandoned.
//!
//! Unlike insert, a mid-batch failure does not undo earlier patches. Rows
//! updated before the failure stay updated; statement atomicity for update
//! is the enclosing transaction's concern.

use std::sync::Arc;

use zerocopy::IntoBytes;

use crate::error::{DbError, Result};
use crate::exec::{ExecutionContext, PhysicalOperator};
use crate::expr::{Expr, Tuple};
use crate::schema::FieldMeta;
use crate::storage::Table;
use crate::types::{AttrType, Value};

pub struct UpdateOperator {
    table: Arc<Table>,
    field_name: String,
    value_expr: Expr,
    child: Box<dyn PhysicalOperator>,
    updated: usize,
}

impl UpdateOperator {
    pub fn new(
        table: Arc<Table>,
        field_name: &str,
        value_expr: Expr,
        child: Box<dyn PhysicalOperator>,
    ) -> UpdateOperator {
        UpdateOperator {
            table,
            field_name: field_name.to_string(),
            value_expr,
            child,
            updated: 0,
        }
    }

    /// Rows patched by the last `open`.
    pub fn updated(&self) -> usize {
        self.updated
    }

    fn patch(&self, data: &mut [u8], field: &FieldMeta, value: &Value<'static>) -> Result<()> {
        let schema = self.table.schema();
        if field.attr_type == AttrType::Text {
            if value.is_null() {
                if !field.nullable {
                    return Err(DbError::InvalidArgument(format!(
                        "field {} is not nullable",
                        field.name
                    )));
                }
                schema.set_null(data, field.field_id, true);
                schema.slot_mut(data, field)?.fill(0);
                return Ok(());
            }
            let bytes = match value {
                Value::Text(b) => b.as_ref(),
                _ => return Err(DbError::Internal("TEXT cast produced non-text".into())),
            };
            let lob_ref = self.table.lob().insert_data(bytes);
            schema.set_null(data, field.field_id, false);
            schema
                .slot_mut(data, field)?
                .copy_from_slice(lob_ref.as_bytes());
            return Ok(());
        }
        schema.encode_fixed(data, field, value)
    }
}

impl PhysicalOperator for UpdateOperator {
    fn open(&mut self, ctx: &ExecutionContext) -> Result<()> {
        self.updated = 0;
        let field = self.table.schema().field_by_name(&self.field_name)?.clone();
        let raw = self.value_expr.try_get_value()?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            raw.cast_to(field.attr_type)?
        };

        self.child.open(ctx)?;
        let mut targets = Vec::new();
        let drain = loop {
            match self.child.next() {
                Ok(false) => break Ok(()),
                Ok(true) => {
                    let rid = match self.child.current_row_id() {
                        Some(rid) => rid,
                        None => {
                            break Err(DbError::Internal(
                                "update child produced a row without a row id".into(),
                            ))
                        }
                    };
                    match self.table.get_record(rid) {
                        Ok(record) => targets.push((rid, record.data)),
                        Err(e) => break Err(e),
                    }
                }
                Err(e) => break Err(e),
            }
        };
        self.child.close()?;
        drain?;

        for (rid, mut data) in targets {
            self.patch(&mut data, &field, &value)?;
            ctx.txn().update_record(&self.table, rid, data)?;
            self.updated += 1;
        }
        Ok(())
    }

    fn next(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn current_tuple(&self) -> Result<Box<dyn Tuple + '_>> {
        Err(DbError::Internal("update produces no tuples".into()))
    }

    fn children_mut(&mut self) -> &mut [Box<dyn PhysicalOperator>] {
        std::slice::from_mut(&mut self.child)
    }
}
