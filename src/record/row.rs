use crate::common::{RowId, INVALID_ROW_ID};

use super::{Field, Schema};

/// A row: one field per column of its table's schema, plus the `RowId` the
/// heap assigned to it (invalid until the row is stored).
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    fields: Vec<Field>,
    row_id: RowId,
}

impl Row {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            row_id: INVALID_ROW_ID,
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, ordinal: usize) -> Option<&Field> {
        self.fields.get(ordinal)
    }

    pub fn row_id(&self) -> RowId {
        self.row_id
    }

    pub fn set_row_id(&mut self, row_id: RowId) {
        self.row_id = row_id;
    }

    /// Serializes the row's fields in schema order. Returns None when the
    /// field count or a field type does not match the schema.
    pub fn serialize(&self, schema: &Schema) -> Option<Vec<u8>> {
        if self.fields.len() != schema.column_count() {
            return None;
        }
        let mut buf = Vec::new();
        for (field, col) in self.fields.iter().zip(schema.columns()) {
            field.serialize_into(col.data_type(), &mut buf)?;
        }
        Some(buf)
    }

    /// Rebuilds a row from serialized bytes. The `RowId` is left invalid;
    /// callers that know where the bytes came from set it afterwards.
    pub fn deserialize(data: &[u8], schema: &Schema) -> Option<Row> {
        let mut fields = Vec::with_capacity(schema.column_count());
        let mut offset = 0;
        for col in schema.columns() {
            let (field, consumed) = Field::deserialize(&data[offset..], col.data_type())?;
            fields.push(field);
            offset += consumed;
        }
        Some(Row::new(fields))
    }

    /// Extracts the fields at `ordinals` as a new row (key extraction).
    pub fn project(&self, ordinals: &[u32]) -> Option<Row> {
        let fields: Option<Vec<Field>> = ordinals
            .iter()
            .map(|&i| self.fields.get(i as usize).cloned())
            .collect();
        fields.map(Row::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DataType;

    fn sample_schema() -> Schema {
        Schema::builder()
            .column("id", DataType::Int32)
            .column("name", DataType::Char(16))
            .nullable_column("balance", DataType::Float32)
            .build()
    }

    #[test]
    fn test_roundtrip() {
        let schema = sample_schema();
        let row = Row::new(vec![Field::from(7), Field::from("alice"), Field::from(1.5f32)]);
        let bytes = row.serialize(&schema).unwrap();
        let recovered = Row::deserialize(&bytes, &schema).unwrap();
        assert_eq!(row.fields(), recovered.fields());
    }

    #[test]
    fn test_roundtrip_with_null() {
        let schema = sample_schema();
        let row = Row::new(vec![Field::from(1), Field::from("bob"), Field::Null]);
        let bytes = row.serialize(&schema).unwrap();
        let recovered = Row::deserialize(&bytes, &schema).unwrap();
        assert!(recovered.field(2).unwrap().is_null());
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let schema = sample_schema();
        let row = Row::new(vec![Field::from("oops"), Field::from("x"), Field::Null]);
        assert!(row.serialize(&schema).is_none());
    }

    #[test]
    fn test_projection() {
        let row = Row::new(vec![Field::from(7), Field::from("alice"), Field::Null]);
        let key = row.project(&[1]).unwrap();
        assert_eq!(key.fields(), &[Field::from("alice")]);
    }
}
