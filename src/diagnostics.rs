// ABOUTME: Diagnostics accumulator for non-fatal warnings during operations.
// ABOUTME: Collects warnings that shouldn't fail a command but should be shown.

/// Collects non-fatal warnings during lifecycle operations.
#[derive(Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning collected during an operation.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// Local record and backend disagreed; the record was corrected.
    pub fn state_drift(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::StateDrift,
            message: message.into(),
        }
    }

    pub fn lock_release(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::LockRelease,
            message: message.into(),
        }
    }

    pub fn fix_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::FixFailed,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Backend state diverged from the local record.
    StateDrift,
    /// Failed to release the record lock (lock file may remain).
    LockRelease,
    /// An automatic install attempt did not leave the tool working.
    FixFailed,
}
