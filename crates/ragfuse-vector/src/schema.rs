use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const COL_ID: &str = "id";
pub const COL_DIR: &str = "dir";
pub const COL_METADATA: &str = "metadata";
pub const COL_VECTOR: &str = "vector";

/// Row layout of a vector collection. `dir` is a plain column so equality
/// filters are pushed down to the scan; the full metadata map rides along as JSON.
pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(COL_ID, DataType::Utf8, false),
        Field::new(COL_DIR, DataType::Utf8, false),
        Field::new(COL_METADATA, DataType::Utf8, false),
        Field::new(COL_VECTOR, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
    ]))
}
