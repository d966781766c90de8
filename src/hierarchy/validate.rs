//! Hierarchy validation utilities.
//!
//! Verifies the structural invariants a built hierarchy must satisfy:
//! - landmark counts non-increasing with scale index
//! - provenance mappings in range, identity at scale 0
//! - every influence map a partition of its finer level
//! - transition rows non-negative and summing to 1

use std::collections::HashMap;

use super::ScaleHierarchy;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational, not a problem.
    Info,
    /// Something unusual but not necessarily wrong.
    Warning,
    /// A broken invariant.
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A single validation issue.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Severity of the issue.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Scale the issue was found at, if applicable.
    pub scale: Option<usize>,
}

impl ValidationIssue {
    /// Create a new validation issue.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            scale: None,
        }
    }

    /// Attach the scale index the issue concerns.
    pub fn at_scale(mut self, scale: usize) -> Self {
        self.scale = Some(scale);
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        if let Some(scale) = self.scale {
            write!(f, " (scale {})", scale)?;
        }
        Ok(())
    }
}

/// Report from a hierarchy validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// All issues found.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Add an issue to the report.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    fn error(&mut self, scale: usize, message: impl Into<String>) {
        self.add(ValidationIssue::new(Severity::Error, message).at_scale(scale));
    }

    /// Whether the report contains no errors.
    pub fn is_healthy(&self) -> bool {
        !self.issues.iter().any(|i| i.severity >= Severity::Error)
    }

    /// Whether there are any issues at all.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Count issues by severity.
    pub fn counts(&self) -> HashMap<Severity, usize> {
        let mut counts = HashMap::new();
        for issue in &self.issues {
            *counts.entry(issue.severity).or_default() += 1;
        }
        counts
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_clean() {
            return write!(f, "hierarchy validation passed: no issues");
        }
        writeln!(f, "hierarchy validation: {} issue(s)", self.issues.len())?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}

const ROW_SUM_TOLERANCE: f32 = 1e-3;

/// Validate all structural invariants of a hierarchy.
pub fn validate_hierarchy(hierarchy: &ScaleHierarchy) -> ValidationReport {
    let mut report = ValidationReport::new();
    let scales = hierarchy.scales();

    // Scale 0 maps every point to itself.
    if let Some(base) = scales.first() {
        let identity = base
            .landmark_to_previous()
            .iter()
            .enumerate()
            .all(|(i, &idx)| idx as usize == i);
        if !identity {
            report.error(0, "scale 0 provenance is not the identity");
        }
    }

    for (index, window) in scales.windows(2).enumerate() {
        let scale_index = index + 1;
        let (finer, coarser) = (&window[0], &window[1]);

        if coarser.num_landmarks() > finer.num_landmarks() {
            report.error(
                scale_index,
                format!(
                    "landmark count grew: {} -> {}",
                    finer.num_landmarks(),
                    coarser.num_landmarks()
                ),
            );
        }

        if let Some(&bad) = coarser
            .landmark_to_previous()
            .iter()
            .find(|&&idx| idx as usize >= finer.num_landmarks())
        {
            report.error(
                scale_index,
                format!(
                    "provenance index {bad} out of range (previous scale has {})",
                    finer.num_landmarks()
                ),
            );
        }

        match hierarchy.influence().map_at(scale_index) {
            Some(map) => {
                if map.num_landmarks() != coarser.num_landmarks() {
                    report.error(
                        scale_index,
                        format!(
                            "influence map covers {} landmarks, scale has {}",
                            map.num_landmarks(),
                            coarser.num_landmarks()
                        ),
                    );
                } else if !map.is_partition_of(finer.num_landmarks()) {
                    report.error(
                        scale_index,
                        "influence sets do not partition the finer level",
                    );
                }
            }
            None => report.error(scale_index, "missing influence map"),
        }
    }

    for (scale_index, scale) in scales.iter().enumerate() {
        if !scale.transition().is_row_stochastic(ROW_SUM_TOLERANCE) {
            report.error(scale_index, "transition matrix is not row-stochastic");
        }
        if scale
            .transition()
            .iter_rows()
            .any(|row| row.is_empty())
        {
            report.add(
                ValidationIssue::new(Severity::Warning, "transition matrix has empty rows")
                    .at_scale(scale_index),
            );
        }
    }

    report
}
