//! Service configuration state.
//!
//! The facade composes two independently-deployable backends. Which routes
//! exist is decided exactly once, from the [`Mode`], before the server
//! accepts connections; a mode that names an absent backend fails
//! configuration immediately instead of registering a route that would fail
//! at request time.

use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::indexer::Indexer;
use crate::matcher::Matcher;

/// Which backends this process serves.
///
/// Each variant maps to a fixed, enumerable route list (see
/// [`Mode::endpoints`](crate::service::routes)); routes are never derived
/// from runtime inspection of what happens to be non-nil.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Only the Index Service surface.
    IndexerOnly,
    /// Only the Match Service surface.
    MatcherOnly,
    /// Both surfaces on one listener.
    Combined,
}

impl Mode {
    /// Stable name used in logs and configuration errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::IndexerOnly => "indexer",
            Self::MatcherOnly => "matcher",
            Self::Combined => "combined",
        }
    }

    /// Parse a mode from its configuration name.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "indexer" => Some(Self::IndexerOnly),
            "matcher" => Some(Self::MatcherOnly),
            "combined" => Some(Self::Combined),
            _ => None,
        }
    }

    /// Whether this mode serves the Index Service surface.
    pub fn serves_indexer(&self) -> bool {
        matches!(self, Self::IndexerOnly | Self::Combined)
    }

    /// Whether this mode serves the Match Service surface.
    pub fn serves_matcher(&self) -> bool {
        matches!(self, Self::MatcherOnly | Self::Combined)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The backends actually configured, shaped by mode.
///
/// Holding backends inside the variant makes "Combined mode without a
/// matcher" unrepresentable after construction, so handlers never check for
/// nil backends at request time.
pub(crate) enum Backends {
    Indexer(Arc<dyn Indexer>),
    Matcher(Arc<dyn Matcher>),
    Combined {
        indexer: Arc<dyn Indexer>,
        matcher: Arc<dyn Matcher>,
    },
}

/// Validated service configuration.
///
/// Construction is the `Unconfigured -> Configured` transition: it happens
/// once, synchronously, and [`create_router`](super::create_router) consumes
/// the state, so re-entering configuration is unrepresentable rather than a
/// runtime condition.
pub struct ServiceState {
    pub(crate) backends: Backends,
}

impl fmt::Debug for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceState")
            .field("mode", &self.mode())
            .finish()
    }
}

impl ServiceState {
    /// Validate that `mode` has the backends it requires.
    pub fn new(
        mode: Mode,
        indexer: Option<Arc<dyn Indexer>>,
        matcher: Option<Arc<dyn Matcher>>,
    ) -> Result<Self, ConfigError> {
        let backends = match mode {
            Mode::IndexerOnly => Backends::Indexer(
                indexer.ok_or(ConfigError::MissingIndexer(mode.name()))?,
            ),
            Mode::MatcherOnly => Backends::Matcher(
                matcher.ok_or(ConfigError::MissingMatcher(mode.name()))?,
            ),
            Mode::Combined => Backends::Combined {
                indexer: indexer.ok_or(ConfigError::MissingIndexer(mode.name()))?,
                matcher: matcher.ok_or(ConfigError::MissingMatcher(mode.name()))?,
            },
        };
        Ok(Self { backends })
    }

    /// The configured mode.
    pub fn mode(&self) -> Mode {
        match self.backends {
            Backends::Indexer(_) => Mode::IndexerOnly,
            Backends::Matcher(_) => Mode::MatcherOnly,
            Backends::Combined { .. } => Mode::Combined,
        }
    }
}
