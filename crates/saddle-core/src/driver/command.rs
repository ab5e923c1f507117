use crate::schema::ModelId;
use crate::stmt::Value;

use indexmap::IndexMap;

/// The mutation kinds a command can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Insert,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// One serialized mutation, as handed to a store.
#[derive(Debug)]
pub struct StoreCommand {
    /// Position of the originating command within its transaction.
    pub index: usize,

    pub model: ModelId,

    pub action: Action,

    /// Primary key value. Present for updates and deletes; an insert may
    /// carry one when the application assigned the key itself.
    pub key: Option<Value>,

    /// Field values by storage name. Empty for deletes.
    pub payload: IndexMap<String, Value>,
}

/// The committed outcome of one command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Position of the originating command within its transaction.
    pub index: usize,

    /// The record's primary key, store-generated for inserts that carried
    /// none.
    pub key: Value,

    /// The record's new revision marker. `None` after a delete.
    pub revision: Option<String>,
}
