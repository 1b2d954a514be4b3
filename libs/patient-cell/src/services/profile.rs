use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info, warn};

use shared_models::auth::AccountIdentity;

use crate::models::{NewPatient, Patient, PatientChanges, PatientError, UpdateProfileRequest};
use crate::services::store::PatientStore;

/// Name given to a profile when the account has neither username nor email.
pub const GUEST_DISPLAY_NAME: &str = "Guest";

/// Default profile name for an account: username, then email, then `Guest`.
pub fn fallback_display_name(account: &AccountIdentity) -> String {
    [account.username.as_deref(), account.email.as_deref()]
        .into_iter()
        .flatten()
        .find(|candidate| !candidate.trim().is_empty())
        .unwrap_or(GUEST_DISPLAY_NAME)
        .to_string()
}

pub struct PatientProfileService {
    store: Arc<dyn PatientStore>,
}

impl PatientProfileService {
    pub fn new(store: Arc<dyn PatientStore>) -> Self {
        Self { store }
    }

    /// The profile linked to `account`, if one exists. Never creates.
    pub async fn find_profile(&self, account: &AccountIdentity) -> Result<Option<Patient>, PatientError> {
        Ok(self.store.find_by_account(&account.account_id).await?)
    }

    pub async fn find_patient(&self, patient_id: i64) -> Result<Option<Patient>, PatientError> {
        Ok(self.store.get_patient(patient_id).await?)
    }

    /// Resolve the account's profile, creating it on first use.
    ///
    /// A new profile takes `requested_name` (trimmed) when given, otherwise the
    /// fallback display name. An existing profile is renamed when its name is
    /// blank or when the caller asks for a different name. Losing a creation
    /// race to a concurrent request is not an error: the winner's row is
    /// re-read and used.
    pub async fn ensure_profile(
        &self,
        account: &AccountIdentity,
        requested_name: Option<&str>,
    ) -> Result<Patient, PatientError> {
        let requested = requested_name.map(str::trim).filter(|name| !name.is_empty());

        let patient = match self.store.find_by_account(&account.account_id).await? {
            Some(patient) => patient,
            None => {
                let full_name = requested
                    .map(str::to_owned)
                    .unwrap_or_else(|| fallback_display_name(account));

                let new_patient = NewPatient {
                    full_name,
                    date_of_birth: None,
                    ethnicity: None,
                    account_id: Some(account.account_id.clone()),
                };

                match self.store.insert_patient(new_patient).await {
                    Ok(created) => {
                        info!("Created patient profile {} for account {}", created.id, account.account_id);
                        return Ok(created);
                    }
                    Err(e) if e.is_unique_violation() => {
                        warn!("Patient profile for account {} was created concurrently, re-reading", account.account_id);
                        self.store
                            .find_by_account(&account.account_id)
                            .await?
                            .ok_or_else(|| PatientError::DatabaseError(format!(
                                "profile for account {} reported as duplicate but not found",
                                account.account_id
                            )))?
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let rename = if patient.has_blank_name() {
            Some(requested.map(str::to_owned).unwrap_or_else(|| fallback_display_name(account)))
        } else {
            requested
                .filter(|name| *name != patient.full_name)
                .map(str::to_owned)
        };

        match rename {
            Some(full_name) => {
                debug!("Renaming patient profile {} to {:?}", patient.id, full_name);
                self.store
                    .update_patient(patient.id, PatientChanges::rename(full_name))
                    .await?
                    .ok_or(PatientError::NotFound)
            }
            None => Ok(patient),
        }
    }

    /// Edit the account's own profile, creating it first if needed.
    ///
    /// A blank `full_name` keeps the stored name; date of birth and ethnicity
    /// are overwritten with whatever the caller sent.
    pub async fn update_profile(
        &self,
        account: &AccountIdentity,
        request: UpdateProfileRequest,
    ) -> Result<Patient, PatientError> {
        if let Some(date_of_birth) = request.date_of_birth {
            if date_of_birth > Local::now().date_naive() {
                return Err(PatientError::ValidationError(
                    "date_of_birth cannot be in the future".to_string(),
                ));
            }
        }

        let patient = self.ensure_profile(account, None).await?;

        let changes = PatientChanges {
            full_name: request.full_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_owned),
            date_of_birth: Some(request.date_of_birth),
            ethnicity: Some(request.ethnicity
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())),
        };

        let updated = self.store
            .update_patient(patient.id, changes)
            .await?
            .ok_or(PatientError::NotFound)?;

        info!("Updated patient profile {}", updated.id);
        Ok(updated)
    }
}
