use std::sync::Arc;

use crate::common::{IndexId, PageId, TableId, INDEX_META_MAGIC, TABLE_META_MAGIC};
use crate::record::Schema;

/// Serialized per table into its own meta page:
/// magic | table_id | name_len | name | first_heap_page_id | schema
#[derive(Debug, Clone)]
pub struct TableMetadata {
    table_id: TableId,
    name: String,
    first_page_id: PageId,
    schema: Arc<Schema>,
}

impl TableMetadata {
    pub fn new(
        table_id: TableId,
        name: impl Into<String>,
        first_page_id: PageId,
        schema: Arc<Schema>,
    ) -> Self {
        Self {
            table_id,
            name: name.into(),
            first_page_id,
            schema,
        }
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&TABLE_META_MAGIC.to_le_bytes());
        buf.extend_from_slice(&self.table_id.to_le_bytes());
        let name_bytes = self.name.as_bytes();
        buf.extend_from_slice(&(name_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(name_bytes);
        buf.extend_from_slice(&self.first_page_id.as_i32().to_le_bytes());
        self.schema.serialize_into(&mut buf);
        buf
    }

    pub fn deserialize(data: &[u8]) -> Option<Self> {
        let magic = u32::from_le_bytes(data.get(0..4)?.try_into().ok()?);
        if magic != TABLE_META_MAGIC {
            return None;
        }
        let table_id = u32::from_le_bytes(data.get(4..8)?.try_into().ok()?);
        let name_len = u32::from_le_bytes(data.get(8..12)?.try_into().ok()?) as usize;
        let mut offset = 12;
        let name = String::from_utf8_lossy(data.get(offset..offset + name_len)?).into_owned();
        offset += name_len;
        let first_page_id = PageId::new(i32::from_le_bytes(
            data.get(offset..offset + 4)?.try_into().ok()?,
        ));
        offset += 4;
        let (schema, _) = Schema::deserialize(&data[offset..])?;
        Some(Self {
            table_id,
            name,
            first_page_id,
            schema: Arc::new(schema),
        })
    }
}

/// Serialized per index into its own meta page:
/// magic | index_id | name_len | name | table_id | key_count | ordinals*
#[derive(Debug, Clone)]
pub struct IndexMetadata {
    index_id: IndexId,
    name: String,
    table_id: TableId,
    key_ordinals: Vec<u32>,
}

impl IndexMetadata {
    pub fn new(
        index_id: IndexId,
        name: impl Into<String>,
        table_id: TableId,
        key_ordinals: Vec<u32>,
    ) -> Self {
        Self {
            index_id,
            name: name.into(),
            table_id,
            key_ordinals,
        }
    }

    pub fn index_id(&self) -> IndexId {
        self.index_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn key_ordinals(&self) -> &[u32] {
        &self.key_ordinals
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&INDEX_META_MAGIC.to_le_bytes());
        buf.extend_from_slice(&self.index_id.to_le_bytes());
        let name_bytes = self.name.as_bytes();
        buf.extend_from_slice(&(name_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(name_bytes);
        buf.extend_from_slice(&self.table_id.to_le_bytes());
        buf.extend_from_slice(&(self.key_ordinals.len() as u32).to_le_bytes());
        for ordinal in &self.key_ordinals {
            buf.extend_from_slice(&ordinal.to_le_bytes());
        }
        buf
    }

    pub fn deserialize(data: &[u8]) -> Option<Self> {
        let magic = u32::from_le_bytes(data.get(0..4)?.try_into().ok()?);
        if magic != INDEX_META_MAGIC {
            return None;
        }
        let index_id = u32::from_le_bytes(data.get(4..8)?.try_into().ok()?);
        let name_len = u32::from_le_bytes(data.get(8..12)?.try_into().ok()?) as usize;
        let mut offset = 12;
        let name = String::from_utf8_lossy(data.get(offset..offset + name_len)?).into_owned();
        offset += name_len;
        let table_id = u32::from_le_bytes(data.get(offset..offset + 4)?.try_into().ok()?);
        offset += 4;
        let key_count = u32::from_le_bytes(data.get(offset..offset + 4)?.try_into().ok()?) as usize;
        offset += 4;
        let mut key_ordinals = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            key_ordinals.push(u32::from_le_bytes(
                data.get(offset..offset + 4)?.try_into().ok()?,
            ));
            offset += 4;
        }
        Some(Self {
            index_id,
            name,
            table_id,
            key_ordinals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DataType;

    #[test]
    fn test_table_metadata_roundtrip() {
        let schema = Schema::builder()
            .unique_column("id", DataType::Int32)
            .column("name", DataType::Char(16))
            .build_arc();
        let meta = TableMetadata::new(3, "accounts", PageId::new(7), schema.clone());

        let bytes = meta.serialize();
        let recovered = TableMetadata::deserialize(&bytes).unwrap();
        assert_eq!(recovered.table_id(), 3);
        assert_eq!(recovered.name(), "accounts");
        assert_eq!(recovered.first_page_id(), PageId::new(7));
        assert_eq!(**recovered.schema(), *schema);
    }

    #[test]
    fn test_index_metadata_roundtrip() {
        let meta = IndexMetadata::new(5, "accounts_by_name", 3, vec![1, 0]);
        let bytes = meta.serialize();
        let recovered = IndexMetadata::deserialize(&bytes).unwrap();
        assert_eq!(recovered.index_id(), 5);
        assert_eq!(recovered.name(), "accounts_by_name");
        assert_eq!(recovered.table_id(), 3);
        assert_eq!(recovered.key_ordinals(), &[1, 0]);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let meta = IndexMetadata::new(5, "idx", 3, vec![0]);
        let mut bytes = meta.serialize();
        bytes[0] ^= 0xFF;
        assert!(IndexMetadata::deserialize(&bytes).is_none());
    }
}
