// libs/appointment-cell/src/services/lifecycle.rs
use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// Which status changes staff may make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Any status may move to any other; off-convention moves are logged.
    #[default]
    Permissive,
    /// Only the conventional flow: Pending to Confirmed or Cancelled,
    /// Confirmed to Completed or Cancelled.
    Conventional,
}

impl fmt::Display for TransitionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionPolicy::Permissive => write!(f, "permissive"),
            TransitionPolicy::Conventional => write!(f, "conventional"),
        }
    }
}

impl FromStr for TransitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "permissive" => Ok(TransitionPolicy::Permissive),
            "conventional" | "strict" => Ok(TransitionPolicy::Conventional),
            other => Err(format!("unknown transition policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentLifecycleService {
    policy: TransitionPolicy,
}

impl AppointmentLifecycleService {
    pub fn new(policy: TransitionPolicy) -> Self {
        Self { policy }
    }

    /// Statuses reachable from `current` along the conventional flow.
    pub fn get_valid_transitions(&self, current_status: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => vec![],
        }
    }

    pub fn is_conventional(&self, current_status: &AppointmentStatus, new_status: &AppointmentStatus) -> bool {
        current_status == new_status || self.get_valid_transitions(current_status).contains(new_status)
    }

    /// The single place the transition policy is applied.
    pub fn validate_status_transition(
        &self,
        current_status: &AppointmentStatus,
        new_status: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if self.is_conventional(current_status, new_status) {
            return Ok(());
        }

        match self.policy {
            TransitionPolicy::Permissive => {
                warn!("Off-convention status transition allowed: {} -> {}", current_status, new_status);
                Ok(())
            }
            TransitionPolicy::Conventional => {
                warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
                Err(AppointmentError::InvalidStatusTransition {
                    from: *current_status,
                    to: *new_status,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AppointmentStatus::*;

    #[test]
    fn test_permissive_policy_allows_every_move() {
        let lifecycle = AppointmentLifecycleService::default();
        assert_eq!(TransitionPolicy::default(), TransitionPolicy::Permissive);

        for from in AppointmentStatus::ALL {
            for to in AppointmentStatus::ALL {
                assert!(lifecycle.validate_status_transition(&from, &to).is_ok(), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_conventional_policy_follows_intended_flow() {
        let lifecycle = AppointmentLifecycleService::new(TransitionPolicy::Conventional);

        assert!(lifecycle.validate_status_transition(&Pending, &Confirmed).is_ok());
        assert!(lifecycle.validate_status_transition(&Pending, &Cancelled).is_ok());
        assert!(lifecycle.validate_status_transition(&Confirmed, &Completed).is_ok());
        assert!(lifecycle.validate_status_transition(&Confirmed, &Cancelled).is_ok());
        assert!(lifecycle.validate_status_transition(&Completed, &Completed).is_ok());

        assert!(matches!(
            lifecycle.validate_status_transition(&Completed, &Pending),
            Err(AppointmentError::InvalidStatusTransition { from: Completed, to: Pending })
        ));
        assert!(lifecycle.validate_status_transition(&Pending, &Completed).is_err());
        assert!(lifecycle.validate_status_transition(&Cancelled, &Confirmed).is_err());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("".parse::<TransitionPolicy>().unwrap(), TransitionPolicy::Permissive);
        assert_eq!("Conventional".parse::<TransitionPolicy>().unwrap(), TransitionPolicy::Conventional);
        assert!("anything-goes".parse::<TransitionPolicy>().is_err());
    }
}
