//! Run identifier generation.

use uuid::Uuid;

/// Generates a fresh run identifier.
///
/// Every scheduled trigger produces a new ID; retries of a stage reuse the
/// run's ID and bump the attempt counter instead.
#[must_use]
pub fn new_run_id() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique() {
        let a = new_run_id();
        let b = new_run_id();
        assert_ne!(a, b);
    }
}
