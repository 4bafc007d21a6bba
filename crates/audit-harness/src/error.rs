use std::time::Duration;

use thiserror::Error;

use crate::findings::Severity;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HarnessError {
    #[error("Browser engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Element `{selector}` not actionable within {waited:?}")]
    NotActionable { selector: String, waited: Duration },

    #[error("Browser protocol error: {0}")]
    Protocol(String),

    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    #[error("Session {0} is closed")]
    SessionClosed(String),

    #[error("Check exceeded its {0:?} budget")]
    DeadlineExceeded(Duration),

    #[error("Check panicked: {0}")]
    CheckPanicked(String),
}

impl HarnessError {
    /// Only an unreachable engine ends the whole run; everything else stays local to a check.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HarnessError::EngineUnavailable(_))
    }

    /// Errors that leave the session they happened in unusable for later checks.
    pub fn poisons_session(&self) -> bool {
        matches!(
            self,
            HarnessError::EngineUnavailable(_)
                | HarnessError::Navigation { .. }
                | HarnessError::SessionClosed(_)
        )
    }

    /// Severity of the finding recorded when a check errors out with this error.
    ///
    /// `NotActionable` is normally remapped by the runner to the severity the
    /// check declares for actionability failures.
    pub fn severity(&self) -> Severity {
        match self {
            HarnessError::EngineUnavailable(_) | HarnessError::Navigation { .. } => {
                Severity::Critical
            }
            _ => Severity::High,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_engine_failure_is_fatal() {
        assert!(HarnessError::EngineUnavailable("no chrome".into()).is_fatal());
        assert!(!HarnessError::Navigation {
            url: "http://localhost:8000".into(),
            message: "refused".into()
        }
        .is_fatal());
        assert!(!HarnessError::DeadlineExceeded(Duration::from_secs(1)).is_fatal());
    }

    #[test]
    fn test_infrastructure_errors_are_critical() {
        let nav = HarnessError::Navigation {
            url: "http://localhost:8000".into(),
            message: "net::ERR_CONNECTION_REFUSED".into(),
        };
        assert_eq!(nav.severity(), Severity::Critical);
        assert!(nav.poisons_session());

        let eval = HarnessError::Evaluation("ReferenceError".into());
        assert_eq!(eval.severity(), Severity::High);
        assert!(!eval.poisons_session());
    }

    #[test]
    fn test_not_actionable_message() {
        let err = HarnessError::NotActionable {
            selector: "#settings-button".into(),
            waited: Duration::from_millis(2000),
        };
        assert_eq!(
            err.to_string(),
            "Element `#settings-button` not actionable within 2s"
        );
    }
}
