//! The fixed, named-phase table.
//!
//! Every request walks the same ordered list of phases. Phases cannot be
//! reordered, disabled, or extended; applications attach handlers to them.
//! Each phase belongs to either the normal track or the error track, and
//! declares how concurrently its matched handlers run and which status a
//! failure inside it implies.

use crate::GateError;
use http::StatusCode;

/// How the matched handlers of one phase are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyPolicy {
    /// Handlers run one at a time, in registration order; a failure stops
    /// the phase immediately.
    Sequential,
    /// Handlers are dispatched together and the phase waits for all of
    /// them; the first failure in registration order is carried forward.
    FanOut,
}

/// The request-processing phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Request-scoped setup; handlers may register additional routes for
    /// this request only.
    Initialize,
    /// Identity checks.
    Authentication,
    /// Permission checks.
    Authorisation,
    /// Input validation before preprocessing.
    Prevalidation,
    /// Sequential preparation work.
    Preprocess,
    /// Input validation after preprocessing.
    Postvalidation,
    /// The main content-producing phase; its handler output becomes the
    /// response body.
    Process,
    /// Sequential cleanup of the produced output.
    Postprocess,
    /// Response serialization (internal).
    Send,
    /// Post-response work on the normal track.
    After,
    /// Error-response production; runs instead of `process` when the run
    /// has diverted onto the error track.
    Error,
    /// Error-response serialization (internal).
    SendError,
    /// Post-response work on the error track.
    AfterError,
}

/// Static description of one phase.
#[derive(Debug, Clone, Copy)]
pub struct PhaseSpec {
    /// The phase described.
    pub phase: Phase,
    /// True when this phase runs on the error track.
    pub error_track: bool,
    /// Dispatch policy for matched handlers.
    pub policy: ConcurrencyPolicy,
    /// Status implied by a failure inside this phase, applied only when no
    /// handler has raised the staged status above the success range yet.
    pub default_error_status: Option<StatusCode>,
    /// Internal phases carry a single framework-owned handler slot and
    /// refuse ordinary registration.
    pub internal: bool,
}

/// The phase table, in execution order.
pub static PHASES: [PhaseSpec; 13] = [
    PhaseSpec {
        phase: Phase::Initialize,
        error_track: false,
        policy: ConcurrencyPolicy::FanOut,
        default_error_status: Some(StatusCode::INTERNAL_SERVER_ERROR),
        internal: false,
    },
    PhaseSpec {
        phase: Phase::Authentication,
        error_track: false,
        policy: ConcurrencyPolicy::Sequential,
        default_error_status: Some(StatusCode::UNAUTHORIZED),
        internal: false,
    },
    PhaseSpec {
        phase: Phase::Authorisation,
        error_track: false,
        policy: ConcurrencyPolicy::Sequential,
        default_error_status: Some(StatusCode::FORBIDDEN),
        internal: false,
    },
    PhaseSpec {
        phase: Phase::Prevalidation,
        error_track: false,
        policy: ConcurrencyPolicy::FanOut,
        default_error_status: Some(StatusCode::BAD_REQUEST),
        internal: false,
    },
    PhaseSpec {
        phase: Phase::Preprocess,
        error_track: false,
        policy: ConcurrencyPolicy::Sequential,
        default_error_status: Some(StatusCode::INTERNAL_SERVER_ERROR),
        internal: false,
    },
    PhaseSpec {
        phase: Phase::Postvalidation,
        error_track: false,
        policy: ConcurrencyPolicy::FanOut,
        default_error_status: Some(StatusCode::BAD_REQUEST),
        internal: false,
    },
    PhaseSpec {
        phase: Phase::Process,
        error_track: false,
        policy: ConcurrencyPolicy::Sequential,
        default_error_status: Some(StatusCode::INTERNAL_SERVER_ERROR),
        internal: false,
    },
    PhaseSpec {
        phase: Phase::Postprocess,
        error_track: false,
        policy: ConcurrencyPolicy::Sequential,
        default_error_status: Some(StatusCode::INTERNAL_SERVER_ERROR),
        internal: false,
    },
    PhaseSpec {
        phase: Phase::Send,
        error_track: false,
        policy: ConcurrencyPolicy::Sequential,
        default_error_status: Some(StatusCode::INTERNAL_SERVER_ERROR),
        internal: true,
    },
    PhaseSpec {
        phase: Phase::After,
        error_track: false,
        policy: ConcurrencyPolicy::FanOut,
        default_error_status: None,
        internal: false,
    },
    PhaseSpec {
        phase: Phase::Error,
        error_track: true,
        policy: ConcurrencyPolicy::Sequential,
        default_error_status: None,
        internal: false,
    },
    PhaseSpec {
        phase: Phase::SendError,
        error_track: true,
        policy: ConcurrencyPolicy::Sequential,
        default_error_status: None,
        internal: true,
    },
    PhaseSpec {
        phase: Phase::AfterError,
        error_track: true,
        policy: ConcurrencyPolicy::FanOut,
        default_error_status: None,
        internal: false,
    },
];

impl Phase {
    /// Returns the registration name of this phase.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Authentication => "authentication",
            Self::Authorisation => "authorisation",
            Self::Prevalidation => "prevalidation",
            Self::Preprocess => "preprocess",
            Self::Postvalidation => "postvalidation",
            Self::Process => "process",
            Self::Postprocess => "postprocess",
            Self::Send => "_send",
            Self::After => "after",
            Self::Error => "error",
            Self::SendError => "_senderror",
            Self::AfterError => "aftererror",
        }
    }

    /// Resolves a registration name to a phase.
    ///
    /// Internal phases are not addressable by name.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Internal`] for unknown or internal names.
    pub fn from_name(name: &str) -> Result<Self, GateError> {
        match name {
            "initialize" => Ok(Self::Initialize),
            "authentication" => Ok(Self::Authentication),
            "authorisation" => Ok(Self::Authorisation),
            "prevalidation" => Ok(Self::Prevalidation),
            "preprocess" => Ok(Self::Preprocess),
            "postvalidation" => Ok(Self::Postvalidation),
            "process" => Ok(Self::Process),
            "postprocess" => Ok(Self::Postprocess),
            "after" => Ok(Self::After),
            "error" => Ok(Self::Error),
            "aftererror" => Ok(Self::AfterError),
            other => Err(GateError::internal(format!("unknown phase {other}"))),
        }
    }

    /// Returns the static description of this phase.
    #[must_use]
    pub fn spec(self) -> &'static PhaseSpec {
        // The table is exhaustive over the enum.
        PHASES
            .iter()
            .find(|spec| spec.phase == self)
            .unwrap_or(&PHASES[0])
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
