//! List items and the operations that change them.

use crate::core::ErrorCode;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// An element of a live list.
///
/// `diff` and `apply` must agree: for any `a` and `b` with equal keys,
/// applying `a.diff(&b)` to `a` yields `b`.
pub trait ListItem: Clone + Debug + PartialEq + Send + Unpin + 'static {
    /// Identity of an item within the list
    type Key: Clone + Debug + Ord + Send + Unpin + 'static;
    /// Partial update carrying only changed fields
    type Patch: Clone + Debug + PartialEq + Send + Unpin + 'static;

    /// Key of this item.
    fn key(&self) -> Self::Key;

    /// Changes needed to turn `self` into `newer`, or `None` if nothing changed.
    fn diff(&self, newer: &Self) -> Option<Self::Patch>;

    /// Apply a patch in place.
    fn apply(&mut self, patch: &Self::Patch);
}

/// One operation of a live list feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[serde(bound(
    serialize = "T: Serialize, T::Key: Serialize, T::Patch: Serialize",
    deserialize = "T: Deserialize<'de>, T::Key: Deserialize<'de>, T::Patch: Deserialize<'de>"
))]
pub enum ListOp<T: ListItem> {
    /// New item, or full replacement of an item with the same key
    Add(T),
    /// Partial update of an existing item
    Update { key: T::Key, patch: T::Patch },
    /// Item removed
    Remove(T::Key),
    /// Initial population finished; live updates continue
    Ready,
    /// Stream failed; terminal
    Error(ErrorCode),
    /// Stream finished; terminal
    End,
}

impl<T: ListItem> ListOp<T> {
    /// Whether nothing can follow this operation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ListOp::Error(_) | ListOp::End)
    }

    /// Key the operation targets, if any.
    pub fn key(&self) -> Option<T::Key> {
        match self {
            ListOp::Add(item) => Some(item.key()),
            ListOp::Update { key, .. } | ListOp::Remove(key) => Some(key.clone()),
            ListOp::Ready | ListOp::Error(_) | ListOp::End => None,
        }
    }
}
