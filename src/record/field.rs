use std::cmp::Ordering;
use std::fmt;

use super::DataType;

/// A typed value stored in a row. The on-disk form is one is-null byte
/// followed by the payload; a null field carries no payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Null,
    Int32(i32),
    Float32(f32),
    Char(String),
}

impl Field {
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    /// Whether this field can be stored in a column of `data_type`.
    pub fn matches_type(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Field::Null, _) => true,
            (Field::Int32(_), DataType::Int32) => true,
            (Field::Float32(_), DataType::Float32) => true,
            (Field::Char(s), DataType::Char(n)) => s.len() <= *n as usize,
            _ => false,
        }
    }

    /// Appends the serialized field to `buf`. Returns the number of bytes
    /// written, or None when the value does not fit the type.
    pub fn serialize_into(&self, data_type: &DataType, buf: &mut Vec<u8>) -> Option<usize> {
        let start = buf.len();
        match (self, data_type) {
            (Field::Null, _) => buf.push(1),
            (Field::Int32(v), DataType::Int32) => {
                buf.push(0);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            (Field::Float32(v), DataType::Float32) => {
                buf.push(0);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            (Field::Char(s), DataType::Char(n)) => {
                let bytes = s.as_bytes();
                if bytes.len() > *n as usize {
                    return None;
                }
                buf.push(0);
                buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                buf.extend_from_slice(bytes);
            }
            _ => return None,
        }
        Some(buf.len() - start)
    }

    /// Deserializes a field of `data_type` from the front of `data`.
    /// Returns the field and the number of bytes consumed.
    pub fn deserialize(data: &[u8], data_type: &DataType) -> Option<(Self, usize)> {
        let is_null = *data.first()?;
        if is_null != 0 {
            return Some((Field::Null, 1));
        }
        match data_type {
            DataType::Int32 => {
                let v = i32::from_le_bytes(data.get(1..5)?.try_into().ok()?);
                Some((Field::Int32(v), 5))
            }
            DataType::Float32 => {
                let v = f32::from_le_bytes(data.get(1..5)?.try_into().ok()?);
                Some((Field::Float32(v), 5))
            }
            DataType::Char(n) => {
                let len = u32::from_le_bytes(data.get(1..5)?.try_into().ok()?) as usize;
                if len > *n as usize {
                    return None;
                }
                let bytes = data.get(5..5 + len)?;
                let s = String::from_utf8_lossy(bytes).into_owned();
                Some((Field::Char(s), 5 + len))
            }
        }
    }

    /// Compares two fields. Returns None when either side is null or the
    /// types are incomparable.
    pub fn compare(&self, other: &Field) -> Option<Ordering> {
        match (self, other) {
            (Field::Int32(a), Field::Int32(b)) => Some(a.cmp(b)),
            (Field::Float32(a), Field::Float32(b)) => a.partial_cmp(b),
            (Field::Char(a), Field::Char(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Null => write!(f, "NULL"),
            Field::Int32(v) => write!(f, "{}", v),
            Field::Float32(v) => write!(f, "{}", v),
            Field::Char(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i32> for Field {
    fn from(v: i32) -> Self {
        Field::Int32(v)
    }
}

impl From<f32> for Field {
    fn from(v: f32) -> Self {
        Field::Float32(v)
    }
}

impl From<&str> for Field {
    fn from(v: &str) -> Self {
        Field::Char(v.to_string())
    }
}

impl From<String> for Field {
    fn from(v: String) -> Self {
        Field::Char(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_roundtrip() {
        let mut buf = Vec::new();
        Field::Int32(-17).serialize_into(&DataType::Int32, &mut buf).unwrap();
        assert_eq!(buf, vec![0, 0xEF, 0xFF, 0xFF, 0xFF]);

        let (field, consumed) = Field::deserialize(&buf, &DataType::Int32).unwrap();
        assert_eq!(field, Field::Int32(-17));
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_char_roundtrip() {
        let mut buf = Vec::new();
        Field::from("hi").serialize_into(&DataType::Char(8), &mut buf).unwrap();
        assert_eq!(buf, vec![0, 2, 0, 0, 0, b'h', b'i']);

        let (field, consumed) = Field::deserialize(&buf, &DataType::Char(8)).unwrap();
        assert_eq!(field, Field::from("hi"));
        assert_eq!(consumed, 7);
    }

    #[test]
    fn test_char_too_long() {
        let mut buf = Vec::new();
        assert!(Field::from("too long").serialize_into(&DataType::Char(4), &mut buf).is_none());
    }

    #[test]
    fn test_null_roundtrip() {
        let mut buf = Vec::new();
        Field::Null.serialize_into(&DataType::Int32, &mut buf).unwrap();
        assert_eq!(buf, vec![1]);

        let (field, consumed) = Field::deserialize(&buf, &DataType::Int32).unwrap();
        assert!(field.is_null());
        assert_eq!(consumed, 1);
    }

    #[test]
    fn test_compare() {
        assert_eq!(Field::Int32(1).compare(&Field::Int32(2)), Some(Ordering::Less));
        assert_eq!(
            Field::from("abc").compare(&Field::from("abd")),
            Some(Ordering::Less)
        );
        assert_eq!(Field::Null.compare(&Field::Int32(1)), None);
        assert_eq!(Field::Int32(1).compare(&Field::from("x")), None);
    }
}
