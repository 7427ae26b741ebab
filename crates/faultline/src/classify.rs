//! Best-effort classification of raw failures.
//!
//! Typed faults pass through untouched; everything else is matched against
//! an explicit, ordered rule table. This is a deliberate fallback for the
//! outermost handler and the remote intake path - call sites that can raise
//! a typed [`AppFault`] directly should.

use crate::taxonomy::{AppFault, FaultKind};

/// A raw, untyped failure: the type name and message are all we know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFault {
    /// Type name of the failure, e.g. "ValueError" or "reqwest::Error".
    pub type_name: String,
    /// Display message.
    pub message: String,
    /// Stack text, when the reporter supplied one.
    pub stack: Option<String>,
}

impl RawFault {
    /// Build a raw fault from a type name and message.
    #[must_use]
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            stack: None,
        }
    }

    /// Attach reporter-supplied stack text.
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Capture a raw fault from an in-process error value.
    ///
    /// The static type name is shortened to its last path segment so it
    /// reads like the class names remote reporters send.
    #[must_use]
    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        let full = std::any::type_name::<E>();
        let short = full.rsplit("::").next().unwrap_or(full);
        Self::new(short, err.to_string())
    }
}

/// A failure entering the pipeline: already typed, or raw.
#[derive(Debug, Clone)]
pub enum CaughtFault {
    /// A typed fault raised by application code.
    Typed(AppFault),
    /// An untyped failure awaiting classification.
    Raw(RawFault),
}

impl From<AppFault> for CaughtFault {
    fn from(fault: AppFault) -> Self {
        Self::Typed(fault)
    }
}

impl From<RawFault> for CaughtFault {
    fn from(raw: RawFault) -> Self {
        Self::Raw(raw)
    }
}

/// One classification rule: a kind plus the predicates that select it.
struct ClassifyRule {
    kind: FaultKind,
    /// Substrings searched in the lower-cased message.
    keywords: &'static [&'static str],
    /// Exact type-name matches.
    type_names: &'static [&'static str],
    /// Type-name prefixes, e.g. "SQL" catching SQLError/SQLTimeout.
    type_prefixes: &'static [&'static str],
}

/// The ordered rule table. First match wins; [`FaultKind::Internal`] is the
/// default when nothing matches.
const RULES: &[ClassifyRule] = &[
    ClassifyRule {
        kind: FaultKind::Validation,
        keywords: &["validation", "invalid", "format", "required"],
        type_names: &["ValueError", "ValidationError", "TypeError"],
        type_prefixes: &[],
    },
    ClassifyRule {
        kind: FaultKind::Authentication,
        keywords: &["authentication", "unauthorized", "login", "token", "credential"],
        type_names: &["AuthenticationError", "JWTError"],
        type_prefixes: &[],
    },
    ClassifyRule {
        kind: FaultKind::Authorization,
        keywords: &["authorization", "permission", "forbidden", "access denied"],
        type_names: &["AuthorizationError", "PermissionError"],
        type_prefixes: &[],
    },
    ClassifyRule {
        kind: FaultKind::NotFound,
        keywords: &["not found", "does not exist", "missing"],
        type_names: &["DoesNotExist", "NotFoundError", "FileNotFoundError"],
        type_prefixes: &[],
    },
    ClassifyRule {
        kind: FaultKind::Conflict,
        keywords: &["conflict", "duplicate", "already exists"],
        type_names: &["IntegrityError", "ConflictError"],
        type_prefixes: &[],
    },
    ClassifyRule {
        kind: FaultKind::RateLimit,
        keywords: &["rate limit", "too many requests", "throttle"],
        type_names: &["RateLimitError"],
        type_prefixes: &[],
    },
    ClassifyRule {
        kind: FaultKind::Database,
        keywords: &["database", "deadlock", "connection pool"],
        type_names: &["DatabaseError", "OperationalError"],
        type_prefixes: &["SQL", "Sql"],
    },
    ClassifyRule {
        kind: FaultKind::ExternalService,
        keywords: &["external service", "upstream", "bad gateway", "timeout"],
        type_names: &["ConnectionError", "TimeoutError"],
        type_prefixes: &[],
    },
];

impl ClassifyRule {
    fn matches(&self, type_name: &str, lower_message: &str) -> bool {
        self.type_names.iter().any(|name| *name == type_name)
            || self
                .type_prefixes
                .iter()
                .any(|prefix| type_name.starts_with(prefix))
            || self
                .keywords
                .iter()
                .any(|keyword| lower_message.contains(keyword))
    }
}

/// Assigns a canonical kind to raw failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier;

impl Classifier {
    /// Create a classifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Classify a raw failure into a kind.
    #[must_use]
    pub fn classify_raw(&self, raw: &RawFault) -> FaultKind {
        let lower = raw.message.to_lowercase();
        RULES
            .iter()
            .find(|rule| rule.matches(&raw.type_name, &lower))
            .map_or(FaultKind::Internal, |rule| rule.kind)
    }

    /// Classify a caught failure into a typed fault.
    ///
    /// Typed input is returned unchanged. Raw input becomes a typed fault
    /// carrying the raw type name as its cause summary. The typed fault's
    /// origin is the call site doing the classification.
    #[must_use]
    #[track_caller]
    pub fn classify(&self, fault: CaughtFault) -> AppFault {
        match fault {
            CaughtFault::Typed(typed) => typed,
            CaughtFault::Raw(raw) => {
                let kind = self.classify_raw(&raw);
                AppFault::new(kind, raw.message.clone()).with_cause(raw.type_name, raw.message)
            }
        }
    }
}
