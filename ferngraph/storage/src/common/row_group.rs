use ferngraph_common::data_type::LogicalType;
use ferngraph_common::types::{ColumnId, RowIdx, TableId};
use ferngraph_common::value::ScalarValue;

use crate::error::{StorageError, StorageResult};

/// Columnar staging buffer holding rows of a single table.
///
/// Every value is checked against its column type on the way in; a row group never holds a
/// value of the wrong type.
#[derive(Debug, Clone)]
pub struct ChunkedRowGroup {
    table_id: TableId,
    column_types: Vec<LogicalType>,
    columns: Vec<Vec<ScalarValue>>,
    num_rows: u64,
    capacity: u64,
    mem_usage: u64,
}

impl ChunkedRowGroup {
    pub fn new(table_id: TableId, column_types: Vec<LogicalType>, capacity: u64) -> Self {
        let columns = column_types.iter().map(|_| Vec::new()).collect();
        Self {
            table_id,
            column_types,
            columns,
            num_rows: 0,
            capacity,
            mem_usage: 0,
        }
    }

    #[inline]
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    #[inline]
    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.column_types.len()
    }

    #[inline]
    pub fn column_types(&self) -> &[LogicalType] {
        &self.column_types
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    #[inline]
    pub fn estimated_mem_usage(&self) -> u64 {
        self.mem_usage
    }

    /// Appends one row and returns its index.
    ///
    /// Fails with [`StorageError::ResourceExhaustion`] once the group holds `capacity` rows or
    /// when the column buffers cannot grow.
    pub fn append_row(&mut self, values: Vec<ScalarValue>) -> StorageResult<RowIdx> {
        if values.len() != self.column_types.len() {
            return Err(StorageError::TypeMismatch {
                expected: format!("{} columns", self.column_types.len()),
                actual: format!("{} values", values.len()),
            });
        }
        for (value, ty) in values.iter().zip(&self.column_types) {
            check_type(value, *ty)?;
        }
        if self.num_rows >= self.capacity {
            return Err(self.exhausted());
        }
        if !self.columns.iter_mut().all(|c| c.try_reserve(1).is_ok()) {
            return Err(self.exhausted());
        }

        let row_idx = self.num_rows;
        for (column, value) in self.columns.iter_mut().zip(values) {
            self.mem_usage += value.estimated_size() as u64;
            column.push(value);
        }
        self.num_rows += 1;
        Ok(row_idx)
    }

    #[inline]
    pub fn get(&self, row_idx: RowIdx, column_id: ColumnId) -> Option<&ScalarValue> {
        self.columns
            .get(column_id as usize)?
            .get(usize::try_from(row_idx).ok()?)
    }

    /// Returns the values of `row_idx` projected onto `column_ids`.
    pub fn project_row(
        &self,
        row_idx: RowIdx,
        column_ids: &[ColumnId],
    ) -> StorageResult<Vec<ScalarValue>> {
        column_ids
            .iter()
            .map(|&column_id| {
                self.get(row_idx, column_id).cloned().ok_or_else(|| {
                    StorageError::ConsistencyViolation(format!(
                        "cell ({row_idx}, {column_id}) is outside row group of table {}",
                        self.table_id
                    ))
                })
            })
            .collect()
    }

    pub fn row(&self, row_idx: RowIdx) -> Option<Vec<ScalarValue>> {
        let idx = usize::try_from(row_idx).ok()?;
        if row_idx >= self.num_rows {
            return None;
        }
        Some(self.columns.iter().map(|c| c[idx].clone()).collect())
    }

    pub fn set(
        &mut self,
        row_idx: RowIdx,
        column_id: ColumnId,
        value: ScalarValue,
    ) -> StorageResult<()> {
        let ty = *self
            .column_types
            .get(column_id as usize)
            .ok_or_else(|| {
                StorageError::ConsistencyViolation(format!(
                    "column {column_id} is outside row group of table {}",
                    self.table_id
                ))
            })?;
        check_type(&value, ty)?;
        let slot = usize::try_from(row_idx)
            .ok()
            .and_then(|idx| self.columns[column_id as usize].get_mut(idx))
            .ok_or_else(|| {
                StorageError::ConsistencyViolation(format!(
                    "row {row_idx} is outside row group of table {}",
                    self.table_id
                ))
            })?;
        self.mem_usage -= slot.estimated_size() as u64;
        self.mem_usage += value.estimated_size() as u64;
        *slot = value;
        Ok(())
    }

    /// Extends every existing row with `default_value`.
    pub fn add_column(
        &mut self,
        ty: LogicalType,
        default_value: &ScalarValue,
    ) -> StorageResult<()> {
        check_type(default_value, ty)?;
        let len = self.num_rows as usize;
        let mut column = Vec::new();
        if column.try_reserve_exact(len).is_err() {
            return Err(self.exhausted());
        }
        column.resize(len, default_value.clone());
        self.mem_usage += default_value.estimated_size() as u64 * self.num_rows;
        self.column_types.push(ty);
        self.columns.push(column);
        Ok(())
    }

    /// Drops every row, keeping the column layout.
    pub fn reset(&mut self) {
        for column in &mut self.columns {
            *column = Vec::new();
        }
        self.num_rows = 0;
        self.mem_usage = 0;
    }

    fn exhausted(&self) -> StorageError {
        StorageError::ResourceExhaustion {
            table_id: self.table_id,
            capacity: self.capacity,
        }
    }
}

fn check_type(value: &ScalarValue, ty: LogicalType) -> StorageResult<()> {
    if value.conforms_to(ty) {
        Ok(())
    } else {
        Err(StorageError::TypeMismatch {
            expected: ty.to_string(),
            actual: value
                .logical_type()
                .map_or_else(|| "NULL".to_string(), |t| t.to_string()),
        })
    }
}
