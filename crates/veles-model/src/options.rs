//! Serializer configuration.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// How serious a recorded problem is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    /// Not recorded at all.
    Ignore,
    /// Recorded; thrown only under [`ExceptionPolicy::ThrowWarningsAndErrors`].
    Warning,
    /// Recorded; thrown unless the policy is [`ExceptionPolicy::DoNotThrow`].
    #[default]
    Error,
}

/// Which recorded problems abort the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExceptionPolicy {
    /// Warnings and errors both abort.
    #[default]
    ThrowWarningsAndErrors,
    /// Only errors abort; warnings are collected.
    ThrowErrorsOnly,
    /// Nothing aborts; everything is collected.
    DoNotThrow,
}

impl ExceptionPolicy {
    /// Check whether a problem of `severity` aborts under this policy.
    pub fn should_throw(&self, severity: Severity) -> bool {
        match (self, severity) {
            (_, Severity::Ignore) | (Self::DoNotThrow, _) => false,
            (Self::ThrowWarningsAndErrors, _) => true,
            (Self::ThrowErrorsOnly, s) => s == Severity::Error,
        }
    }
}

/// Options that control a serializer instance.
///
/// Descriptors depend on some of these values, so the descriptor cache is
/// keyed by [`SerializerOptions::fingerprint`] as well as the type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SerializerOptions {
    /// Which recorded problems abort the operation.
    pub exception_policy: ExceptionPolicy,
    /// Severity of problems that carry no member-level treatment.
    pub default_severity: Severity,
    /// Write null members as empty elements; read missing members as null.
    pub serialize_null_objects: bool,
    /// Fail on self-referential graphs instead of writing an empty element.
    pub throw_on_cycles: bool,
    /// Leave out members that cannot be written back.
    pub skip_members_without_setter: bool,
    /// Never write real-type or dimension metadata attributes.
    pub suppress_metadata: bool,
    /// Maximum nesting depth; 0 means unlimited.
    pub max_recursion: usize,
    /// Indent the XML output.
    pub pretty_print: bool,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self {
            exception_policy: ExceptionPolicy::ThrowWarningsAndErrors,
            default_severity: Severity::Error,
            serialize_null_objects: true,
            throw_on_cycles: false,
            skip_members_without_setter: false,
            suppress_metadata: false,
            max_recursion: 300,
            pretty_print: true,
        }
    }
}

impl SerializerOptions {
    /// Set the exception policy.
    pub fn with_exception_policy(mut self, policy: ExceptionPolicy) -> Self {
        self.exception_policy = policy;
        self
    }

    /// Set the default severity.
    pub fn with_default_severity(mut self, severity: Severity) -> Self {
        self.default_severity = severity;
        self
    }

    /// Set whether null members are serialized.
    pub fn with_serialize_null_objects(mut self, enabled: bool) -> Self {
        self.serialize_null_objects = enabled;
        self
    }

    /// Set whether cycles abort serialization.
    pub fn with_throw_on_cycles(mut self, enabled: bool) -> Self {
        self.throw_on_cycles = enabled;
        self
    }

    /// Set whether members without a setter are skipped.
    pub fn with_skip_members_without_setter(mut self, enabled: bool) -> Self {
        self.skip_members_without_setter = enabled;
        self
    }

    /// Set whether metadata attributes are suppressed.
    pub fn with_suppress_metadata(mut self, enabled: bool) -> Self {
        self.suppress_metadata = enabled;
        self
    }

    /// Set the maximum nesting depth.
    pub fn with_max_recursion(mut self, depth: usize) -> Self {
        self.max_recursion = depth;
        self
    }

    /// Set whether the output is indented.
    pub fn with_pretty_print(mut self, enabled: bool) -> Self {
        self.pretty_print = enabled;
        self
    }

    /// Hash of the options that affect descriptor derivation.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.serialize_null_objects.hash(&mut hasher);
        self.throw_on_cycles.hash(&mut hasher);
        self.suppress_metadata.hash(&mut hasher);
        hasher.finish()
    }

    /// Check whether `depth` exceeds the recursion limit.
    #[inline]
    pub fn depth_exceeded(&self, depth: usize) -> bool {
        self.max_recursion != 0 && depth > self.max_recursion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy() {
        let policy = ExceptionPolicy::ThrowErrorsOnly;
        assert!(policy.should_throw(Severity::Error));
        assert!(!policy.should_throw(Severity::Warning));
        assert!(!ExceptionPolicy::DoNotThrow.should_throw(Severity::Error));
        assert!(ExceptionPolicy::ThrowWarningsAndErrors.should_throw(Severity::Warning));
        assert!(!ExceptionPolicy::ThrowWarningsAndErrors.should_throw(Severity::Ignore));
    }

    #[test]
    fn test_fingerprint_ignores_output_options() {
        let base = SerializerOptions::default();
        let compact = base.clone().with_pretty_print(false);
        let no_nulls = base.clone().with_serialize_null_objects(false);
        assert_eq!(base.fingerprint(), compact.fingerprint());
        assert_ne!(base.fingerprint(), no_nulls.fingerprint());
    }

    #[test]
    fn test_depth_limit() {
        let options = SerializerOptions::default().with_max_recursion(2);
        assert!(!options.depth_exceeded(2));
        assert!(options.depth_exceeded(3));
        assert!(!SerializerOptions::default().with_max_recursion(0).depth_exceeded(10_000));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_defaults() {
        let options: SerializerOptions = serde_json::from_str(r#"{"throw_on_cycles":true}"#).unwrap();
        assert!(options.throw_on_cycles);
        assert_eq!(options.max_recursion, 300);
    }
}
