//! The global local-override switch.
//!
//! Consumers normally fetch pinned remote archives. Setting
//! `USE_LOCAL_XCFRAMEWORK` (any value, including empty) switches every
//! library to its locally built archive at once. The switch is read a single
//! time when the command starts and threaded through resolution as an
//! [`OverrideMode`] value; nothing else consults the environment.

use super::error::ResolveError;
use std::fmt;

/// Environment variable whose presence activates the local override.
pub const OVERRIDE_ENV_VAR: &str = "USE_LOCAL_XCFRAMEWORK";

/// Where every library's artefact comes from for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverrideMode {
    /// Pinned remote releases, checksum verified.
    #[default]
    Remote,
    /// Locally built archives for every library.
    Local,
}

/// Source choice requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedSource {
    /// `--local`.
    Local,
    /// `--remote`.
    Remote,
}

impl OverrideMode {
    /// Read the switch from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_switch(std::env::var_os(OVERRIDE_ENV_VAR).is_some())
    }

    /// Build the mode from the raw switch state.
    #[must_use]
    pub const fn from_switch(present: bool) -> Self {
        if present { Self::Local } else { Self::Remote }
    }

    /// Combine the environment switch with an optional command-line choice.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Configuration`] when the environment enables
    /// the override and `--remote` was given at the same time.
    pub fn resolve(env: Self, requested: Option<RequestedSource>) -> Result<Self, ResolveError> {
        match (env, requested) {
            (Self::Local, Some(RequestedSource::Remote)) => Err(ResolveError::Configuration {
                library: None,
                reason: format!(
                    "{OVERRIDE_ENV_VAR} is set but --remote was requested; unset the variable or drop the flag"
                ),
            }),
            (_, Some(RequestedSource::Local)) => Ok(Self::Local),
            (_, Some(RequestedSource::Remote)) => Ok(Self::Remote),
            (mode, None) => Ok(mode),
        }
    }

    /// Whether locally built archives are in use.
    #[must_use]
    pub const fn is_local(self) -> bool {
        matches!(self, Self::Local)
    }
}

impl fmt::Display for OverrideMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Remote => "remote",
            Self::Local => "local",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::with_override_env;
    use rstest::rstest;

    #[rstest]
    #[case::unset(None, OverrideMode::Remote)]
    #[case::set(Some("1"), OverrideMode::Local)]
    #[case::empty_value_still_counts(Some(""), OverrideMode::Local)]
    #[case::value_is_ignored(Some("false"), OverrideMode::Local)]
    fn presence_alone_activates_override(
        #[case] value: Option<&str>,
        #[case] expected: OverrideMode,
    ) {
        assert_eq!(with_override_env(value, OverrideMode::from_env), expected);
    }

    #[rstest]
    #[case::env_only(OverrideMode::Local, None, OverrideMode::Local)]
    #[case::flag_only(OverrideMode::Remote, Some(RequestedSource::Local), OverrideMode::Local)]
    #[case::agreeing(OverrideMode::Local, Some(RequestedSource::Local), OverrideMode::Local)]
    #[case::explicit_remote(OverrideMode::Remote, Some(RequestedSource::Remote), OverrideMode::Remote)]
    fn combines_environment_and_flags(
        #[case] env: OverrideMode,
        #[case] requested: Option<RequestedSource>,
        #[case] expected: OverrideMode,
    ) {
        assert_eq!(
            OverrideMode::resolve(env, requested).expect("consistent"),
            expected
        );
    }

    #[test]
    fn contradicting_signals_are_a_configuration_error() {
        let err = OverrideMode::resolve(OverrideMode::Local, Some(RequestedSource::Remote))
            .expect_err("contradiction");
        assert!(matches!(err, ResolveError::Configuration { .. }));
        assert!(err.to_string().contains(OVERRIDE_ENV_VAR));
    }
}
