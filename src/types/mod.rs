pub mod record;
pub mod snapshot;
pub mod table;
pub mod value;

pub use record::{Record, RecordId};
pub use snapshot::{FieldPair, LayerNode, RelationEdge, RelationsSnapshot};
pub use table::{ColumnInfo, ForeignKeyInfo, LayerInfo, RelationInfo};
pub use value::Value;
