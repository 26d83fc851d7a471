pub mod fields;
pub mod reconciler;

pub use reconciler::{AggregateTotals, LoadState, ReconcileError, Reconciler};
