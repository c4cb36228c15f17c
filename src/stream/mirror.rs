//! Receiver-side replica of a live list.

use crate::core::{Error, ErrorCode, Result};
use crate::stream::op::{ListItem, ListOp};
use std::collections::BTreeMap;

/// How a mirrored stream ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    End,
    Error(ErrorCode),
}

/// Applies a snapshot and its operations the way a client would.
#[derive(Clone, Debug)]
pub struct ListMirror<T: ListItem> {
    items: Vec<T>,
    ready: bool,
    termination: Option<Termination>,
}

impl<T: ListItem> ListMirror<T> {
    /// Start from a snapshot.
    pub fn from_snapshot(snapshot: &[T]) -> Self {
        Self {
            items: snapshot.to_vec(),
            ready: false,
            termination: None,
        }
    }

    /// Apply one operation.
    ///
    /// Fails on operations after termination and on updates of unknown keys.
    pub fn apply(&mut self, op: &ListOp<T>) -> Result<()> {
        if self.termination.is_some() {
            return Err(Error::Internal(format!("operation after termination: {op:?}")));
        }
        match op {
            ListOp::Add(item) => {
                let key = item.key();
                match self.position(&key) {
                    Some(index) => self.items[index] = item.clone(),
                    None => self.items.push(item.clone()),
                }
            }
            ListOp::Update { key, patch } => {
                let index = self
                    .position(key)
                    .ok_or_else(|| Error::NotFound(format!("{key:?}")))?;
                self.items[index].apply(patch);
            }
            ListOp::Remove(key) => self.items.retain(|item| &item.key() != key),
            ListOp::Ready => self.ready = true,
            ListOp::Error(code) => self.termination = Some(Termination::Error(*code)),
            ListOp::End => self.termination = Some(Termination::End),
        }
        Ok(())
    }

    /// Current items in arrival order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Look an item up by key.
    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.items.iter().find(|item| &item.key() == key)
    }

    /// Whether `Ready` was received.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// How the stream ended, if it did.
    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    /// Items keyed for order-independent comparison.
    pub fn to_map(&self) -> BTreeMap<T::Key, T> {
        self.items
            .iter()
            .map(|item| (item.key(), item.clone()))
            .collect()
    }

    fn position(&self, key: &T::Key) -> Option<usize> {
        self.items.iter().position(|item| &item.key() == key)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub(crate) struct Row {
        pub key: u32,
        pub label: String,
    }

    impl ListItem for Row {
        type Key = u32;
        type Patch = String;

        fn key(&self) -> u32 {
            self.key
        }

        fn diff(&self, newer: &Self) -> Option<String> {
            (self.label != newer.label).then(|| newer.label.clone())
        }

        fn apply(&mut self, patch: &String) {
            self.label = patch.clone();
        }
    }

    fn row(key: u32, label: &str) -> Row {
        Row {
            key,
            label: label.to_string(),
        }
    }

    #[test]
    fn test_mirror_applies_ops() {
        let mut mirror = ListMirror::from_snapshot(&[row(1, "a"), row(2, "b")]);
        mirror.apply(&ListOp::Update { key: 1, patch: "A".into() }).unwrap();
        mirror.apply(&ListOp::Remove(2)).unwrap();
        mirror.apply(&ListOp::Add(row(3, "c"))).unwrap();
        mirror.apply(&ListOp::Ready).unwrap();

        assert_eq!(mirror.items(), &[row(1, "A"), row(3, "c")]);
        assert!(mirror.is_ready());
        assert_eq!(mirror.termination(), None);
    }

    #[test]
    fn test_add_replaces_same_key() {
        let mut mirror = ListMirror::from_snapshot(&[row(1, "a")]);
        mirror.apply(&ListOp::Add(row(1, "z"))).unwrap();
        assert_eq!(mirror.items(), &[row(1, "z")]);
    }

    #[test]
    fn test_rejects_ops_after_termination() {
        let mut mirror = ListMirror::<Row>::from_snapshot(&[]);
        mirror.apply(&ListOp::Error(ErrorCode::RemoteFailed)).unwrap();
        assert_eq!(
            mirror.termination(),
            Some(&Termination::Error(ErrorCode::RemoteFailed))
        );
        assert!(mirror.apply(&ListOp::End).is_err());
    }

    #[test]
    fn test_update_unknown_key_fails() {
        let mut mirror = ListMirror::<Row>::from_snapshot(&[]);
        let result = mirror.apply(&ListOp::Update { key: 9, patch: "x".into() });
        assert_eq!(result.unwrap_err().code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_diff_apply_agree() {
        let old = row(1, "a");
        let new = row(1, "b");
        let mut replica = old.clone();
        replica.apply(&old.diff(&new).unwrap());
        assert_eq!(replica, new);
        assert_eq!(new.diff(&new), None);
    }
}
