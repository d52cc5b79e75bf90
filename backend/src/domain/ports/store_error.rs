//! Error conditions surfaced by the store ports.

use super::macros::define_port_error;

define_port_error! {
    /// Errors raised by local and remote store adapters.
    ///
    /// The orchestrator dispatches on the variant: `Unavailable` at pass
    /// start aborts the pass, `Conflict` triggers a single id re-resolution
    /// retry, `NotFound` triggers placeholder synthesis for missing
    /// dependencies, and anything else is recorded as a row failure.
    pub enum StoreError {
        /// The referenced row or collection does not exist.
        NotFound { what: String } =>
            "not found: {what}",
        /// A unique constraint rejected the write.
        Conflict { message: String } =>
            "conflict: {message}",
        /// The store could not be reached.
        Unavailable { message: String } =>
            "store unavailable: {message}",
        /// The query or mutation failed during execution.
        Query { message: String } =>
            "store query failed: {message}",
    }
}

impl StoreError {
    /// True when the failure indicates the store as a whole is unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn constructors_render_messages() {
        assert_eq!(
            StoreError::not_found("transaction T1").to_string(),
            "not found: transaction T1"
        );
        assert_eq!(
            StoreError::conflict("duplicate username").to_string(),
            "conflict: duplicate username"
        );
    }

    #[rstest]
    fn only_unavailable_reports_unavailable() {
        assert!(StoreError::unavailable("connection refused").is_unavailable());
        assert!(!StoreError::query("bad column").is_unavailable());
        assert!(!StoreError::conflict("dup").is_unavailable());
    }
}
