use horizon_pipeline::PipelineError;
use std::any::Any;

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Handler execution error: {0}")]
    HandlerExecution(String),
    #[error("Handler '{handler}' panicked: {message}")]
    HandlerPanicked { handler: String, message: String },
    #[error("Handler name '{0}' is reserved for a priority slot")]
    ReservedName(String),
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

impl EventError {
    /// Wraps any displayable failure from inside a handler.
    pub fn handler(error: impl std::fmt::Display) -> Self {
        EventError::HandlerExecution(error.to_string())
    }

    pub(crate) fn panicked(handler: &str, payload: Box<dyn Any + Send>) -> Self {
        EventError::HandlerPanicked {
            handler: handler.to_string(),
            message: panic_message(payload.as_ref()),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
