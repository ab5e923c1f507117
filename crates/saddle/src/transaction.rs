use crate::{Error, Result};

use saddle_core::driver::{Action, CommandResult};
use saddle_core::stmt::Instance;

/// A single pending mutation.
#[derive(Debug, Clone)]
pub struct Command {
    pub instance: Instance,
    pub action: Action,
}

/// Transaction lifecycle. The machine moves from `Created` to exactly one
/// of the terminal states and never back.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    #[default]
    Created,
    Executed,
    Failed,
}

/// An ordered batch of pending mutations.
///
/// Commands keep their insertion order within each store's group at commit
/// time; across stores there is no ordering guarantee. A transaction
/// executes exactly once; committing it again is an `InvalidOperation`.
#[derive(Debug, Default)]
pub struct Transaction {
    commands: Vec<Command>,
    state: TransactionState,
    results: Vec<Option<CommandResult>>,
}

impl Transaction {
    pub(crate) fn new() -> Transaction {
        Transaction::default()
    }

    /// Appends a command. When no action is given, insert vs update is
    /// inferred from whether the instance carries a revision marker.
    pub fn add(&mut self, instance: Instance, action: Option<Action>) -> Result<usize> {
        if self.state != TransactionState::Created {
            return Err(Error::invalid_operation(format!(
                "cannot add to a transaction in state {:?}",
                self.state
            )));
        }

        let action = action.unwrap_or_else(|| {
            if instance.is_persisted() {
                Action::Update
            } else {
                Action::Insert
            }
        });

        let index = self.commands.len();
        self.commands.push(Command { instance, action });
        self.results.push(None);
        Ok(index)
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// The committed outcome of the command at `index`, once executed.
    pub fn result(&self, index: usize) -> Option<&CommandResult> {
        self.results.get(index).and_then(Option::as_ref)
    }

    pub(crate) fn set_state(&mut self, state: TransactionState) {
        self.state = state;
    }

    pub(crate) fn record_result(&mut self, result: CommandResult) {
        let index = result.index;
        self.results[index] = Some(result);
    }
}
