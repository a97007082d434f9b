#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("Rule: a rule named '{0}' is already registered")]
    Duplicate(String),

    #[error("Rule: no rule named '{0}'")]
    NotFound(String),

    #[error("Rule: invalid rule '{name}': {message}")]
    Invalid { name: String, message: String },

    #[error("Rule: '{rule}' failed to evaluate: {message}")]
    Evaluation { rule: String, message: String },

    #[error("Rule: '{rule}' panicked during evaluation")]
    Panicked { rule: String },
}

pub type Result<T> = std::result::Result<T, RuleError>;
