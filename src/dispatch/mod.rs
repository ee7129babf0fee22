/// Event routing into the reconciliation state
pub mod dispatcher;

pub use dispatcher::Dispatcher;
