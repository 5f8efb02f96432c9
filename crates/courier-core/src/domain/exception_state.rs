//! Per-recovery state shared by the exception handlers of one failure.

/// Created fresh for each failure and dropped when recovery ends.
///
/// `T` is the response type of the failed request, or `()` for
/// notifications.
#[derive(Debug)]
pub struct ExceptionHandlingState<T> {
    response: Option<T>,
}

impl<T> ExceptionHandlingState<T> {
    pub fn new() -> Self {
        Self { response: None }
    }

    pub fn is_handled(&self) -> bool {
        self.response.is_some()
    }

    /// Marks the failure handled; `response` replaces the failed result.
    pub fn set_handled(&mut self, response: T) {
        self.response = Some(response);
    }

    pub fn response(&self) -> Option<&T> {
        self.response.as_ref()
    }

    pub fn into_response(self) -> Option<T> {
        self.response
    }
}

impl ExceptionHandlingState<()> {
    /// Marks a notification failure handled.
    pub fn suppress(&mut self) {
        self.set_handled(());
    }
}

impl<T> Default for ExceptionHandlingState<T> {
    fn default() -> Self {
        Self::new()
    }
}
