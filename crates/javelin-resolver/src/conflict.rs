//! Version conflict recording for "nearest wins" mediation.

use std::fmt;

use javelin_core::dependency::DependencyId;

/// A report of all version overrides applied during resolution.
#[derive(Debug, Default)]
pub struct ConflictReport {
    pub conflicts: Vec<VersionConflict>,
}

/// A version that was requested but lost mediation. The loser's artifact is
/// never fetched.
#[derive(Debug, Clone)]
pub struct VersionConflict {
    pub requested: DependencyId,
    pub resolved_version: String,
    pub reason: String,
}

impl ConflictReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, conflict: VersionConflict) {
        self.conflicts.push(conflict);
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conflicts.is_empty() {
            return write!(f, "No version conflicts.");
        }
        writeln!(f, "Version conflicts ({}):", self.conflicts.len())?;
        for c in &self.conflicts {
            writeln!(
                f,
                "  {}:{} requested {} but resolved {} ({})",
                c.requested.group, c.requested.name, c.requested.version, c.resolved_version, c.reason
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report() {
        let report = ConflictReport::new();
        assert!(report.is_empty());
        assert_eq!(report.to_string(), "No version conflicts.");
    }

    #[test]
    fn report_with_conflicts() {
        let mut report = ConflictReport::new();
        report.add(VersionConflict {
            requested: DependencyId::new("org.example", "lib", "2.0"),
            resolved_version: "1.0".to_string(),
            reason: "nearest wins (depth 1 vs 2)".to_string(),
        });
        assert_eq!(report.len(), 1);
        let s = report.to_string();
        assert!(s.contains("org.example:lib"));
        assert!(s.contains("requested 2.0 but resolved 1.0"));
    }
}
