pub mod connect;
pub use connect::{ConnectionKind, SchemeRegistry};

mod manager;
pub use manager::Manager;

pub mod mapper;
pub use mapper::{Application, Mapper, StoreOverrides};

mod query;
pub use query::{FilterValue, Query};

mod store;
pub use store::{Store, StoreId};

mod transaction;
pub use transaction::{Command, Transaction, TransactionState};

pub use saddle_core::{driver, schema, stmt, Error, Result};
