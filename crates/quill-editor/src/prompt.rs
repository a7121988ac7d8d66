//! Confirmation capability
//!
//! The editor asks before discarding unsaved changes. How the question is
//! put to the user (dialog, terminal, test stub) is up to the caller.

pub trait ConfirmPrompt: Send + Sync {
    /// Returns true to proceed, false to cancel
    fn confirm(&self, message: &str) -> bool;
}

impl<F> ConfirmPrompt for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, message: &str) -> bool {
        self(message)
    }
}
