//! Runtime Configuration
//!
//! A small set of knobs that change how the runtime reacts to misuse.
//! Configuration is per thread, like the runtime itself: apply it with
//! [`Runtime::configure`](crate::reactive::Runtime::configure) or start from a
//! clean slate with [`Runtime::reset_with`](crate::reactive::Runtime::reset_with).

use std::env;

/// Default bound on computation runs performed by a single flush.
pub const DEFAULT_MAX_FLUSH_RUNS: usize = 100_000;

/// Environment variable that turns on strict owner checks.
pub const STRICT_OWNERS_ENV: &str = "STRAND_STRICT_OWNERS";

/// Environment variable that overrides the flush run limit.
pub const MAX_FLUSH_RUNS_ENV: &str = "STRAND_MAX_FLUSH_RUNS";

/// Runtime behavior switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// When set, owner-scoped calls (`on_cleanup`, `on_mount`, `provide`)
    /// made with no current owner panic instead of logging a warning.
    pub strict_owners: bool,

    /// Maximum number of computation runs a single flush may perform before
    /// it is aborted with `ReactiveError::FlushOverflow`.
    pub max_flush_runs: usize,
}

impl RuntimeConfig {
    /// Builder-style setter for [`strict_owners`](Self::strict_owners).
    pub fn with_strict_owners(mut self, strict: bool) -> Self {
        self.strict_owners = strict;
        self
    }

    /// Builder-style setter for [`max_flush_runs`](Self::max_flush_runs).
    ///
    /// A limit of zero is bumped to one so a flush can always make progress.
    pub fn with_max_flush_runs(mut self, limit: usize) -> Self {
        self.max_flush_runs = limit.max(1);
        self
    }

    /// Defaults overridden by `STRAND_STRICT_OWNERS` and
    /// `STRAND_MAX_FLUSH_RUNS`. Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(STRICT_OWNERS_ENV) {
            match parse_flag(&raw) {
                Some(strict) => config.strict_owners = strict,
                None => tracing::warn!(
                    var = STRICT_OWNERS_ENV,
                    value = %raw,
                    "ignoring unrecognized boolean"
                ),
            }
        }

        if let Some(raw) = lookup(MAX_FLUSH_RUNS_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(limit) => config = config.with_max_flush_runs(limit),
                Err(err) => tracing::warn!(
                    var = MAX_FLUSH_RUNS_ENV,
                    value = %raw,
                    %err,
                    "ignoring invalid flush limit"
                ),
            }
        }

        config
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            strict_owners: false,
            max_flush_runs: DEFAULT_MAX_FLUSH_RUNS,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_are_lenient() {
        let config = RuntimeConfig::default();
        assert!(!config.strict_owners);
        assert_eq!(config.max_flush_runs, DEFAULT_MAX_FLUSH_RUNS);
    }

    #[test]
    fn env_overrides_apply() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            (STRICT_OWNERS_ENV, "yes"),
            (MAX_FLUSH_RUNS_ENV, "250"),
        ]));
        assert!(config.strict_owners);
        assert_eq!(config.max_flush_runs, 250);
    }

    #[test]
    fn bad_env_values_fall_back_to_defaults() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            (STRICT_OWNERS_ENV, "maybe"),
            (MAX_FLUSH_RUNS_ENV, "lots"),
        ]));
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn zero_flush_limit_is_clamped() {
        let config = RuntimeConfig::default().with_max_flush_runs(0);
        assert_eq!(config.max_flush_runs, 1);
    }
}
