//! Primitives the host state container provides: reading a value at a path and describing where a
//! mutation happened.

use std::sync::RwLock;

use serde_json::Value;

/// Read access to application state.
pub trait StateReader: Send + Sync {
    /// Returns the current value at `path`, or `None` when nothing is stored there.
    fn get(&self, path: &[String]) -> Option<Value>;
}

impl StateReader for Value {
    fn get(&self, path: &[String]) -> Option<Value> {
        lookup(self, path).cloned()
    }
}

impl StateReader for RwLock<Value> {
    fn get(&self, path: &[String]) -> Option<Value> {
        let state = self.read().ok()?;
        lookup(&state, path).cloned()
    }
}

/// Walks object keys and array indices.
pub fn lookup<'a>(root: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, key| match node {
        Value::Object(entries) => entries.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    })
}

/// Splits a dotted state path (`user.profile.id`) into segments.
pub fn split_path(dotted: &str) -> Vec<String> {
    dotted.split('.').map(str::to_string).collect()
}

/// One entry of a change batch: the path a mutation touched.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StateChange {
    path: Vec<String>,
}

impl StateChange {
    pub fn new<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_dotted(dotted: &str) -> Self {
        Self {
            path: split_path(dotted),
        }
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}
