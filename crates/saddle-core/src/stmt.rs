mod instance;
pub use instance::Instance;

mod lookup;
pub use lookup::{Lookup, LookupOp, Operand};

mod plan;
pub use plan::QueryPlan;

mod value;
pub use value::Value;
