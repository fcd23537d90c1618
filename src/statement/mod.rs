//! Prepared statements: parameter slots, execution and result decoding.

mod descriptor;
mod outcome;
mod prepared;
mod slots;

pub use descriptor::{ColumnDescriptor, ParameterDescriptor, ResultDescriptor, StatementHandle};
pub use outcome::{ChainedResults, ExecutionResult, StatementCapabilities, StatementState};
pub use prepared::PreparedStatement;
pub(crate) use prepared::Target;
pub use slots::{ParameterStream, SlotState};
