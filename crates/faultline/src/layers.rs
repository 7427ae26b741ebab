//! Layer rule engine.
//!
//! Maps source-location patterns to the set of fault kinds permitted to
//! originate there, and checks a fault's explicit origin against that set
//! when it is admitted into the pipeline. Rules are configured as strings
//! so deployments can override them; [`LayerRuleEngine::validate_rules`]
//! is the offline lint that keeps those strings honest.

use tracing::warn;

use crate::config::{Environment, LayerConfig, LayerRuleConfig};
use crate::taxonomy::{AppFault, FaultKind, Origin};
use crate::FaultlineError;

/// Layer name recorded for origins matched by no rule.
pub const UNMATCHED_LAYER: &str = "unmatched";

/// Layer name for the `modules/` business-tree fallback.
pub const MODULE_LAYER: &str = "module";

/// One compiled layer rule.
#[derive(Debug, Clone)]
pub struct LayerRule {
    /// Layer name, recorded on matching fault records.
    pub name: String,
    /// Substring matched against the normalised origin path.
    pub pattern: String,
    /// Kind codes permitted here. Kept as strings so configured rules can
    /// be linted rather than silently dropped.
    pub allowed: Vec<String>,
}

/// Result of resolving an origin path against the rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerResolution {
    /// Name of the layer the path belongs to.
    pub layer: String,
    /// Kinds permitted to originate there.
    pub allowed: Vec<FaultKind>,
}

/// Enforces which fault kinds each architectural layer may raise.
#[derive(Debug, Clone)]
pub struct LayerRuleEngine {
    rules: Vec<LayerRule>,
    enabled: bool,
    strict: bool,
}

impl LayerRuleEngine {
    /// Build the engine from configuration.
    ///
    /// Enabled/strict are read once here. Enforcement defaults to on only
    /// under a development posture; strict mode always requires an explicit
    /// opt-in.
    #[must_use]
    pub fn new(config: &LayerConfig, environment: Environment) -> Self {
        let rules = if config.rules.is_empty() {
            default_rules()
        } else {
            config.rules.iter().map(compile_rule).collect()
        };
        Self {
            rules,
            enabled: config
                .enabled
                .unwrap_or(environment == Environment::Development),
            strict: config.strict,
        }
    }

    /// An engine with the built-in rules, enabled, non-strict.
    #[must_use]
    pub fn development() -> Self {
        Self {
            rules: default_rules(),
            enabled: true,
            strict: false,
        }
    }

    /// Whether enforcement is active.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether violations fail admission instead of warning.
    #[must_use]
    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// Resolve the layer and allowed kinds for an origin path.
    ///
    /// First matching rule wins. Unmatched paths under `modules/` get the
    /// business subset; any other unmatched path is permissive - the engine
    /// polices the layered tree it knows about and must not block
    /// third-party or test code.
    #[must_use]
    pub fn resolve(&self, path: &str) -> LayerResolution {
        let normalised = normalise_path(path);
        for rule in &self.rules {
            if normalised.contains(rule.pattern.as_str()) {
                return LayerResolution {
                    layer: rule.name.clone(),
                    allowed: rule
                        .allowed
                        .iter()
                        .filter_map(|code| FaultKind::from_code(code))
                        .collect(),
                };
            }
        }
        if normalised.contains("modules/") {
            return LayerResolution {
                layer: MODULE_LAYER.to_owned(),
                allowed: FaultKind::BUSINESS.to_vec(),
            };
        }
        LayerResolution {
            layer: UNMATCHED_LAYER.to_owned(),
            allowed: FaultKind::ALL.to_vec(),
        }
    }

    /// Layer name for an origin path, for fault records.
    #[must_use]
    pub fn layer_name(&self, path: &str) -> String {
        self.resolve(path).layer
    }

    /// Check that `kind` may originate from `origin`.
    ///
    /// Disabled engine: always `Ok`. Violation in strict mode: `Err`.
    /// Violation in default mode: exactly one warning naming file:line and
    /// the allowed set, then `Ok` - enforcement never blocks the raise.
    pub fn check(&self, kind: FaultKind, origin: &Origin) -> Result<(), FaultlineError> {
        if !self.enabled {
            return Ok(());
        }
        let resolution = self.resolve(&origin.file);
        if resolution.allowed.contains(&kind) {
            return Ok(());
        }
        let allowed = resolution
            .allowed
            .iter()
            .map(|k| k.code())
            .collect::<Vec<_>>()
            .join(", ");
        if self.strict {
            return Err(FaultlineError::LayerViolation {
                code: kind.code().to_owned(),
                file: origin.file.clone(),
                line: origin.line,
                allowed,
            });
        }
        warn!(
            kind = kind.code(),
            layer = %resolution.layer,
            file = %origin.file,
            line = origin.line,
            allowed = %allowed,
            "fault kind not permitted at this layer"
        );
        Ok(())
    }

    /// Checked admission of a typed fault: [`check`](Self::check) against
    /// its origin, returning the fault untouched on success.
    pub fn admit(&self, fault: AppFault) -> Result<AppFault, FaultlineError> {
        self.check(fault.kind(), fault.origin())?;
        Ok(fault)
    }

    /// Offline rule lint: every allowed entry must be a recognised kind
    /// code. Returns one violation string per bad entry.
    #[must_use]
    pub fn validate_rules(&self) -> Vec<String> {
        let mut violations = Vec::new();
        for rule in &self.rules {
            for code in &rule.allowed {
                if FaultKind::from_code(code).is_none() {
                    violations.push(format!(
                        "rule '{}': unknown fault kind '{code}'",
                        rule.name
                    ));
                }
            }
        }
        violations
    }
}

fn compile_rule(config: &LayerRuleConfig) -> LayerRule {
    LayerRule {
        name: config.name.clone(),
        pattern: config.pattern.clone(),
        allowed: config.allowed.clone(),
    }
}

fn codes(kinds: &[FaultKind]) -> Vec<String> {
    kinds.iter().map(|kind| kind.code().to_owned()).collect()
}

/// The built-in rule set for the conventional layered tree.
#[must_use]
pub fn default_rules() -> Vec<LayerRule> {
    vec![
        LayerRule {
            name: "api".to_owned(),
            pattern: "api/".to_owned(),
            allowed: codes(&[
                FaultKind::Validation,
                FaultKind::Authentication,
                FaultKind::Authorization,
                FaultKind::NotFound,
                FaultKind::RateLimit,
            ]),
        },
        LayerRule {
            name: "service".to_owned(),
            pattern: "services/".to_owned(),
            allowed: codes(&[
                FaultKind::Validation,
                FaultKind::Authorization,
                FaultKind::NotFound,
                FaultKind::Conflict,
            ]),
        },
        LayerRule {
            name: "repository".to_owned(),
            pattern: "repositories/".to_owned(),
            allowed: codes(&[FaultKind::NotFound, FaultKind::Conflict, FaultKind::Database]),
        },
        LayerRule {
            name: "client".to_owned(),
            pattern: "clients/".to_owned(),
            allowed: codes(&[
                FaultKind::ExternalService,
                FaultKind::RateLimit,
                FaultKind::Authentication,
            ]),
        },
    ]
}

fn normalise_path(path: &str) -> String {
    path.replace('\\', "/")
        .trim_start_matches("./")
        .to_owned()
}
