use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConditionError {
    #[error("condition failed to compile: {0}")]
    Compile(String),

    #[error("condition failed to evaluate: {0}")]
    Evaluate(String),

    #[error("condition must evaluate to a boolean, got {0}")]
    NonBooleanResult(String),
}
