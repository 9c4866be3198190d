//! Preflight check outcomes and the report that collects them.

use std::fmt;

/// Outcome of one preflight check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    /// Assemble would fail on this.
    Fail,
    /// Usable, but not the configuration a release build expects.
    Warn,
    /// Optional input that is not configured.
    Skip,
}

impl CheckStatus {
    pub fn label(self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Warn => "WARN",
            CheckStatus::Skip => "SKIP",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            CheckStatus::Pass => "✓",
            CheckStatus::Fail => "✗",
            CheckStatus::Warn => "⚠",
            CheckStatus::Skip => "○",
        }
    }
}

/// One named check with an optional detail line.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub details: Option<String>,
}

impl CheckResult {
    fn with_status(name: &str, status: CheckStatus, details: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            status,
            details: details.map(str::to_string),
        }
    }

    pub fn pass(name: &str) -> Self {
        Self::with_status(name, CheckStatus::Pass, None)
    }

    pub fn pass_with(name: &str, details: &str) -> Self {
        Self::with_status(name, CheckStatus::Pass, Some(details))
    }

    pub fn fail(name: &str, details: &str) -> Self {
        Self::with_status(name, CheckStatus::Fail, Some(details))
    }

    pub fn warn(name: &str, details: &str) -> Self {
        Self::with_status(name, CheckStatus::Warn, Some(details))
    }

    pub fn skip(name: &str, details: &str) -> Self {
        Self::with_status(name, CheckStatus::Skip, Some(details))
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.status.icon(), self.status.label(), self.name)?;
        if let Some(details) = &self.details {
            write!(f, ": {}", details)?;
        }
        Ok(())
    }
}

/// Every check from one preflight run, in the order they ran.
#[derive(Debug, Default)]
pub struct PreflightReport {
    pub checks: Vec<CheckResult>,
}

impl PreflightReport {
    pub fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }

    /// Warnings and skips do not block an assemble.
    pub fn all_passed(&self) -> bool {
        self.count(CheckStatus::Fail) == 0
    }

    pub fn fail_count(&self) -> usize {
        self.count(CheckStatus::Fail)
    }

    pub fn warn_count(&self) -> usize {
        self.count(CheckStatus::Warn)
    }

    /// Names of the failed checks.
    pub fn failures(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Fail)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Human-readable report: one line per check, then a summary.
    pub fn render(&self) -> String {
        let mut out = String::from("=== Preflight Check Results ===\n\n");
        for check in &self.checks {
            out.push_str(&format!("  {}\n", check));
        }

        out.push_str(&format!(
            "\nSummary: {}/{} passed",
            self.count(CheckStatus::Pass),
            self.checks.len()
        ));
        let skipped = self.count(CheckStatus::Skip);
        if skipped > 0 {
            out.push_str(&format!(", {} skipped", skipped));
        }
        out.push('\n');
        if self.fail_count() > 0 {
            out.push_str(&format!(
                "         {} FAILED - assemble will not succeed\n",
                self.fail_count()
            ));
        }
        if self.warn_count() > 0 {
            out.push_str(&format!("         {} warnings\n", self.warn_count()));
        }
        out
    }

    pub fn print(&self) {
        println!("{}", self.render());
    }
}
