//! Relation-tree browsing and the drop/detach edit protocol.

mod edit;
mod labels;
mod tree;

pub use edit::{
    DetachOutcome, DropOutcome, DropPayload, DropTarget, EditContext, NoticeLevel, Prompter, RowRef,
};
pub use labels::DisplayField;
pub use tree::{Expansion, NodeId, NodeKind, RelationTree, TreeOptions};
