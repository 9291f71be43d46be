//! # Toolkit Trait
//!
//! The seam shared by all third-party API clients. A toolkit is a named
//! collection of operations an agent can invoke; the trait exposes enough
//! for listings and diagnostics without prescribing operation signatures.

/// A named collection of external API operations.
pub trait Toolkit: Send + Sync {
    /// Unique toolkit name (e.g. "apollo").
    fn name(&self) -> &str;

    /// Human-readable description of what the toolkit provides.
    fn description(&self) -> &str {
        ""
    }

    /// Names of the operations this toolkit exposes.
    fn operations(&self) -> Vec<&'static str>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubToolkit;

    impl Toolkit for StubToolkit {
        fn name(&self) -> &str {
            "stub"
        }

        fn operations(&self) -> Vec<&'static str> {
            vec!["ping"]
        }
    }

    #[test]
    fn toolkit_reports_name_and_operations() {
        let toolkit = StubToolkit;
        assert_eq!(toolkit.name(), "stub");
        assert_eq!(toolkit.description(), "");
        assert_eq!(toolkit.operations(), vec!["ping"]);
    }
}
