//! Configuration validation.
//!
//! Checks a configuration file for parse errors, unsupported or misspelled
//! sink types, invalid credentials, and duplicate sink identities, and reports
//! the findings as diagnostics instead of failing on the first one.

use std::{collections::HashSet, path::Path};

use crate::{
    loader::{find_config_file, load_config},
    schema::KvntsConfig,
    sink::SinkType,
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "sink-type", "credentials", "duplicate", "cache",
    /// "labels", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "sinks[0].slack"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

/// Error categories confined to a single sink entry.
const PER_ENTRY_CATEGORIES: &[&str] = &["sink-type", "credentials"];

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Errors that must stop startup.
    ///
    /// Sink-type and credential errors are left out: at dispatch time they
    /// disable only the offending sink entry.
    pub fn fatal(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| {
            d.severity == Severity::Error && !PER_ENTRY_CATEGORIES.contains(&d.category)
        })
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Levenshtein distance ────────────────────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest known sink type within `max_distance` edits.
fn suggest_sink_type(needle: &str, max_distance: usize) -> Option<SinkType> {
    let needle = needle.to_lowercase();
    SinkType::ALL
        .into_iter()
        .map(|t| (t, levenshtein(&needle, t.as_str())))
        .filter(|(_, d)| *d <= max_distance)
        .min_by_key(|(_, d)| *d)
        .map(|(t, _)| t)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or discover the default config
/// file location if `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = path.map(Path::to_path_buf).or_else(find_config_file);

    let Some(ref actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Info,
                category: "file-ref",
                path: String::new(),
                message: "no config file found; using defaults".into(),
            }],
            config_path: None,
        };
    };

    match load_config(actual_path) {
        Ok(config) => {
            let mut result = validate_config(&config);
            result.config_path = Some(actual_path.clone());
            result
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("failed to load config file: {e}"),
            }],
            config_path: Some(actual_path.clone()),
        },
    }
}

/// Validate an already parsed configuration.
#[must_use]
pub fn validate_config(config: &KvntsConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();

    if config.cluster_name().is_empty() {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "labels",
            path: "labels.cluster_name".into(),
            message: "cluster_name is empty; sink identities and message headers will lack a cluster".into(),
        });
    }

    if config.cache.capacity == 0 {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "cache",
            path: "cache.capacity".into(),
            message: "capacity must be at least 1".into(),
        });
    }
    if config.cache.ttl_secs == 0 {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "cache",
            path: "cache.ttl_secs".into(),
            message: "ttl_secs must be at least 1".into(),
        });
    }

    if config.loki.is_enabled()
        && let Err(e) = url::Url::parse(config.loki.url.trim())
    {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "loki",
            path: "loki.url".into(),
            message: format!("invalid url: {e}"),
        });
    }

    let mut seen = HashSet::new();
    for (i, entry) in config.sinks.iter().enumerate() {
        let path = format!("sinks[{i}]");

        if entry.name.trim().is_empty() {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "duplicate",
                path: format!("{path}.name"),
                message: "sink name must not be empty".into(),
            });
        } else if !seen.insert((entry.namespace.as_str(), entry.name.as_str())) {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "duplicate",
                path: format!("{path}.name"),
                message: format!("duplicate sink {}/{}", entry.namespace, entry.name),
            });
        }

        let sink_type = match entry.sink_type.parse::<SinkType>() {
            Ok(t) => t,
            Err(e) => {
                let message = match suggest_sink_type(&entry.sink_type, 3) {
                    Some(s) => format!("{e} (did you mean \"{s}\"?)"),
                    None => e.to_string(),
                };
                diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    category: "sink-type",
                    path: format!("{path}.type"),
                    message,
                });
                continue;
            },
        };

        let config = match entry.sink_config() {
            Ok(c) => c,
            Err(e) => {
                diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    category: "credentials",
                    path: format!("{path}.{}", sink_type.section()),
                    message: e.to_string(),
                });
                continue;
            },
        };

        if let Err(e) = config.validate() {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "credentials",
                path: format!("{path}.{}", sink_type.section()),
                message: e.to_string(),
            });
        }

        let unused = [
            (SinkType::Slack, entry.slack.is_some()),
            (SinkType::Mattermost, entry.mattermost.is_some()),
            (SinkType::MicrosoftTeams, entry.teams.is_some()),
        ];
        for (other, present) in unused {
            if present && other != sink_type {
                diagnostics.push(Diagnostic {
                    severity: Severity::Warning,
                    category: "sink-type",
                    path: format!("{path}.{}", other.section()),
                    message: format!("section ignored for a {sink_type} sink"),
                });
            }
        }
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}
