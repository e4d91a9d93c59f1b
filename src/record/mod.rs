mod data_type;
mod field;
mod row;
mod schema;

pub use data_type::DataType;
pub use field::Field;
pub use row::Row;
pub use schema::{Column, Schema, SchemaBuilder};
