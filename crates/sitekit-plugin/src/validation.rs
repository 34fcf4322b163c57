//! Structural checks a plugin instance must pass before it is registered.
//!
//! The trait already guarantees the required members exist; these checks
//! cover what the type system cannot see.

use serde::Serialize;

use crate::traits::Plugin;

/// One validation check and its outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationCheck {
    /// What was checked.
    pub check: String,
    /// Whether it passed.
    pub passed: bool,
}

/// All checks run against a plugin.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Plugin name as reported by the instance.
    pub plugin: String,
    /// Individual checks.
    pub checks: Vec<ValidationCheck>,
}

impl ValidationReport {
    /// Whether every check passed.
    pub fn is_valid(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Names of the failed checks.
    pub fn failures(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.check.as_str())
            .collect()
    }

    fn push(&mut self, check: &str, passed: bool) {
        self.checks.push(ValidationCheck {
            check: check.to_string(),
            passed,
        });
    }
}

/// Runs every check against `plugin`.
pub fn inspect_plugin(plugin: &dyn Plugin) -> ValidationReport {
    let mut report = ValidationReport {
        plugin: plugin.name().to_string(),
        checks: Vec::new(),
    };

    report.push("name is not empty", !plugin.name().trim().is_empty());
    report.push("version is not empty", !plugin.version().trim().is_empty());
    report.push("version is dotted numeric", is_dotted_numeric(plugin.version()));
    report.push("plugin self-check passes", plugin.validate());

    report
}

/// Returns true when `plugin` passes every check.
pub fn validate_plugin(plugin: &dyn Plugin) -> bool {
    inspect_plugin(plugin).is_valid()
}

/// `1`, `1.2`, `1.2.3`, optionally followed by a `-pre` or `+build` suffix.
fn is_dotted_numeric(version: &str) -> bool {
    let core = version
        .split(['-', '+'])
        .next()
        .unwrap_or_default();
    !core.is_empty()
        && core
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}
