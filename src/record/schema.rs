use std::collections::HashMap;
use std::sync::Arc;

use crate::common::{COLUMN_MAGIC, SCHEMA_MAGIC};

use super::DataType;

/// A single column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    data_type: DataType,
    /// Position in the schema, assigned by `Schema::new`.
    ordinal: u32,
    nullable: bool,
    unique: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool, unique: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            ordinal: 0,
            nullable,
            unique,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Serialized form:
    /// magic | name_len | name | type_tag | char_len (CHAR only) |
    /// nullable | unique | ordinal
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&COLUMN_MAGIC.to_le_bytes());
        let name_bytes = self.name.as_bytes();
        buf.extend_from_slice(&(name_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(name_bytes);
        buf.extend_from_slice(&self.data_type.type_tag().to_le_bytes());
        if let DataType::Char(n) = self.data_type {
            buf.extend_from_slice(&n.to_le_bytes());
        }
        buf.push(self.nullable as u8);
        buf.push(self.unique as u8);
        buf.extend_from_slice(&self.ordinal.to_le_bytes());
    }

    /// Returns the column and the number of bytes consumed.
    pub fn deserialize(data: &[u8]) -> Option<(Self, usize)> {
        let magic = u32::from_le_bytes(data.get(0..4)?.try_into().ok()?);
        if magic != COLUMN_MAGIC {
            return None;
        }
        let name_len = u32::from_le_bytes(data.get(4..8)?.try_into().ok()?) as usize;
        let mut offset = 8;
        let name = String::from_utf8_lossy(data.get(offset..offset + name_len)?).into_owned();
        offset += name_len;

        let type_tag = u32::from_le_bytes(data.get(offset..offset + 4)?.try_into().ok()?);
        offset += 4;
        let data_type = match type_tag {
            1 => DataType::Int32,
            2 => DataType::Float32,
            3 => {
                let n = u32::from_le_bytes(data.get(offset..offset + 4)?.try_into().ok()?);
                offset += 4;
                if n == 0 {
                    return None;
                }
                DataType::Char(n)
            }
            _ => return None,
        };

        let nullable = *data.get(offset)? != 0;
        let unique = *data.get(offset + 1)? != 0;
        offset += 2;
        let ordinal = u32::from_le_bytes(data.get(offset..offset + 4)?.try_into().ok()?);
        offset += 4;

        Some((
            Self {
                name,
                data_type,
                ordinal,
                nullable,
                unique,
            },
            offset,
        ))
    }
}

/// An ordered list of columns with a memoized name -> ordinal map.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<Column>,
    name_to_ordinal: HashMap<String, u32>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        let mut columns = columns;
        let mut name_to_ordinal = HashMap::new();
        for (i, col) in columns.iter_mut().enumerate() {
            col.ordinal = i as u32;
            name_to_ordinal.insert(col.name.clone(), i as u32);
        }
        Self {
            columns,
            name_to_ordinal,
        }
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, ordinal: usize) -> Option<&Column> {
        self.columns.get(ordinal)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.name_to_ordinal
            .get(name)
            .and_then(|&i| self.columns.get(i as usize))
    }

    pub fn column_ordinal(&self, name: &str) -> Option<u32> {
        self.name_to_ordinal.get(name).copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Builds the narrower schema made of the columns at `ordinals`, in the
    /// given order. Used for index key schemas.
    pub fn project(&self, ordinals: &[u32]) -> Option<Schema> {
        let columns: Option<Vec<Column>> = ordinals
            .iter()
            .map(|&i| self.columns.get(i as usize).cloned())
            .collect();
        columns.map(Schema::new)
    }

    /// Serialized form: magic | column_count | column*
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&SCHEMA_MAGIC.to_le_bytes());
        buf.extend_from_slice(&(self.columns.len() as u32).to_le_bytes());
        for col in &self.columns {
            col.serialize_into(buf);
        }
    }

    pub fn deserialize(data: &[u8]) -> Option<(Self, usize)> {
        let magic = u32::from_le_bytes(data.get(0..4)?.try_into().ok()?);
        if magic != SCHEMA_MAGIC {
            return None;
        }
        let column_count = u32::from_le_bytes(data.get(4..8)?.try_into().ok()?) as usize;
        let mut offset = 8;
        let mut columns = Vec::with_capacity(column_count);
        for _ in 0..column_count {
            let (col, consumed) = Column::deserialize(&data[offset..])?;
            columns.push(col);
            offset += consumed;
        }
        Some((Schema::new(columns), offset))
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for Schema {}

/// Fluent schema construction, mostly for tests and the demo binary.
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type, false, false));
        self
    }

    pub fn nullable_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type, true, false));
        self
    }

    pub fn unique_column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type, false, true));
        self
    }

    pub fn build(self) -> Schema {
        Schema::new(self.columns)
    }

    pub fn build_arc(self) -> Arc<Schema> {
        Arc::new(self.build())
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
