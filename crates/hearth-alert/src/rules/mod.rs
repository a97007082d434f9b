pub mod predicate;
pub mod threshold;

pub use predicate::PredicateRule;
pub use threshold::{CompareOp, RuleSpec, ThresholdRule};
