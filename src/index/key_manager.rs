use std::cmp::Ordering;
use std::sync::Arc;

use crate::common::{Result, RillError};
use crate::record::{Field, Row, Schema};

/// KeyManager owns an index's key schema and gives its serialized keys a
/// fixed width and a total order.
///
/// Every column is encoded at a fixed offset (is-null byte + payload, CHAR
/// padded out to its declared width), so a tree node can address entry `i`
/// at `i * key_size` without parsing its neighbours.
pub struct KeyManager {
    key_schema: Arc<Schema>,
    key_size: usize,
}

impl KeyManager {
    pub fn new(key_schema: Arc<Schema>) -> Self {
        let key_size = key_schema
            .columns()
            .map(|c| c.data_type().fixed_width())
            .sum();
        Self {
            key_schema,
            key_size,
        }
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    pub fn key_schema(&self) -> &Arc<Schema> {
        &self.key_schema
    }

    /// Encodes a key row (fields in key-schema order) to its fixed width.
    pub fn encode_key(&self, key_row: &Row) -> Result<Vec<u8>> {
        if key_row.fields().len() != self.key_schema.column_count() {
            return Err(RillError::SchemaMismatch);
        }
        let mut buf = vec![0u8; self.key_size];
        let mut offset = 0;
        for (field, col) in key_row.fields().iter().zip(self.key_schema.columns()) {
            let width = col.data_type().fixed_width();
            let mut scratch = Vec::with_capacity(width);
            field
                .serialize_into(col.data_type(), &mut scratch)
                .ok_or(RillError::SchemaMismatch)?;
            buf[offset..offset + scratch.len()].copy_from_slice(&scratch);
            offset += width;
        }
        Ok(buf)
    }

    /// Decodes a fixed-width key back into its fields.
    pub fn decode_key(&self, data: &[u8]) -> Option<Row> {
        if data.len() < self.key_size {
            return None;
        }
        let mut fields = Vec::with_capacity(self.key_schema.column_count());
        let mut offset = 0;
        for col in self.key_schema.columns() {
            let width = col.data_type().fixed_width();
            let (field, _) = Field::deserialize(&data[offset..offset + width], col.data_type())?;
            fields.push(field);
            offset += width;
        }
        Some(Row::new(fields))
    }

    /// Total order over encoded keys: column by column, with NULL sorting
    /// before every non-null value.
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let mut offset = 0;
        for col in self.key_schema.columns() {
            let width = col.data_type().fixed_width();
            let fa = Field::deserialize(&a[offset..offset + width], col.data_type());
            let fb = Field::deserialize(&b[offset..offset + width], col.data_type());
            let ord = match (fa, fb) {
                (Some((fa, _)), Some((fb, _))) => match (fa.is_null(), fb.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    (false, false) => fa.compare(&fb).unwrap_or(Ordering::Equal),
                },
                _ => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return ord;
            }
            offset += width;
        }
        Ordering::Equal
    }
}
