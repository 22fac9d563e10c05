//! Office-side admission finalization: placement data, identifiers, student login.
//!
//! With [`AccountFlagOrder::Eager`] the office-use write sets `studentAccountCreated` before
//! the account exists, so a failed provisioning call leaves the flag set with no account and
//! the action locked. [`AccountFlagOrder::TwoPhase`] writes the flag only after the account
//! is confirmed.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::domain::{
    Account, Application, ApplicationId, NewAccount, OfficeUsePatch, STUDENT_ROLE,
};
use super::repository::{AccountProvisioner, ApplicationGateway, RemoteError};
use super::validation::{validate_placement, ValidationErrors};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountFlagOrder {
    #[default]
    Eager,
    TwoPhase,
}

impl AccountFlagOrder {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "eager" | "legacy" => Some(Self::Eager),
            "two_phase" | "two-phase" | "twophase" => Some(Self::TwoPhase),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            AccountFlagOrder::Eager => "eager",
            AccountFlagOrder::TwoPhase => "two_phase",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionState {
    NotAdmitted,
    DataEntryOpen,
    OfficeDataSaved,
    AccountCreated,
}

/// Department, batch, section and admission number chosen by the office.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfficePlacement {
    pub department: String,
    pub batch: String,
    pub section: String,
    pub admission_number: String,
    pub portal_number: Option<String>,
}

/// Admission number in the form `{year}{DEPARTMENT}{sequence:04}`.
pub fn generate_admission_number(year: i32, department: &str, sequence: u32) -> String {
    format!("{}{sequence:04}", admission_prefix(year, department))
}

fn admission_prefix(year: i32, department: &str) -> String {
    let code: String = department
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_uppercase())
        .collect();
    format!("{year}{code}")
}

/// Sequence number of `issued` if it belongs to the `prefix` series.
fn issued_sequence(issued: &str, prefix: &str) -> Option<u32> {
    let digits = issued.trim().strip_prefix(prefix)?;
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[derive(Debug, thiserror::Error)]
pub enum FinalizationError {
    #[error("application {0} has not been marked admitted")]
    NotAdmitted(ApplicationId),
    #[error("a student account already exists for application {0}")]
    AlreadyProvisioned(ApplicationId),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("application could not be loaded: {0}")]
    Load(#[source] RemoteError),
    #[error("office-use data could not be saved: {0}")]
    OfficeUse(#[source] RemoteError),
    #[error("student account could not be created: {source}")]
    AccountCreation {
        source: RemoteError,
        flag_left_set: bool,
    },
}

/// One application moving through finalization, as the office screen sees it.
#[derive(Debug, Clone)]
pub struct AdmissionCase {
    application: Application,
    state: AdmissionState,
    banner: Option<String>,
}

impl AdmissionCase {
    pub fn new(application: Application) -> Self {
        let state = if application.office_use_only.student_account_created {
            AdmissionState::AccountCreated
        } else {
            AdmissionState::NotAdmitted
        };
        Self {
            application,
            state,
            banner: None,
        }
    }

    pub fn application(&self) -> &Application {
        &self.application
    }

    pub fn state(&self) -> AdmissionState {
        self.state
    }

    /// Error message left by the last failed attempt.
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    /// Whether the save-and-provision action is enabled.
    pub fn can_provision(&self) -> bool {
        !self.application.office_use_only.student_account_created
            && matches!(
                self.state,
                AdmissionState::DataEntryOpen | AdmissionState::OfficeDataSaved
            )
    }

    /// Open data entry. Has no remote side effect.
    pub fn mark_admitted(&mut self) -> Result<(), FinalizationError> {
        match self.state {
            AdmissionState::NotAdmitted => {
                self.state = AdmissionState::DataEntryOpen;
                Ok(())
            }
            AdmissionState::AccountCreated => Err(FinalizationError::AlreadyProvisioned(
                self.application.application_id.clone(),
            )),
            AdmissionState::DataEntryOpen | AdmissionState::OfficeDataSaved => Ok(()),
        }
    }
}

pub struct AdmissionFinalizer<G, P> {
    applications: Arc<G>,
    accounts: Arc<P>,
    order: AccountFlagOrder,
    default_password: String,
}

impl<G, P> AdmissionFinalizer<G, P>
where
    G: ApplicationGateway + 'static,
    P: AccountProvisioner + 'static,
{
    pub fn new(applications: Arc<G>, accounts: Arc<P>, default_password: impl Into<String>) -> Self {
        Self {
            applications,
            accounts,
            order: AccountFlagOrder::default(),
            default_password: default_password.into(),
        }
    }

    pub fn with_flag_order(mut self, order: AccountFlagOrder) -> Self {
        self.order = order;
        self
    }

    pub fn flag_order(&self) -> AccountFlagOrder {
        self.order
    }

    pub async fn load(&self, application_id: &ApplicationId) -> Result<AdmissionCase, FinalizationError> {
        let application = self
            .applications
            .fetch(application_id)
            .await
            .map_err(FinalizationError::Load)?;
        Ok(AdmissionCase::new(application))
    }

    /// Next admission number for `department` in `year`, after the highest one already issued
    /// under the same normalized department code.
    pub async fn suggest_admission_number(
        &self,
        year: i32,
        department: &str,
    ) -> Result<String, FinalizationError> {
        let applications = self
            .applications
            .list()
            .await
            .map_err(FinalizationError::Load)?;
        let prefix = admission_prefix(year, department);
        let last = applications
            .iter()
            .filter_map(|app| issued_sequence(&app.office_use_only.student_id_generated, &prefix))
            .max()
            .unwrap_or(0);
        Ok(generate_admission_number(year, department, last.saturating_add(1)))
    }

    /// Save the office-use record, then provision the student account.
    ///
    /// Re-clicking after a failure re-attempts both writes, unless the flag is already set.
    pub async fn save_and_provision(
        &self,
        case: &mut AdmissionCase,
        placement: &OfficePlacement,
    ) -> Result<Account, FinalizationError> {
        let application_id = case.application.application_id.clone();
        if case.state == AdmissionState::NotAdmitted {
            return Err(FinalizationError::NotAdmitted(application_id));
        }
        if !case.can_provision() {
            return Err(FinalizationError::AlreadyProvisioned(application_id));
        }
        validate_placement(
            &placement.department,
            &placement.batch,
            &placement.section,
            &placement.admission_number,
        )?;

        let patch = OfficeUsePatch {
            student_id_generated: Some(placement.admission_number.clone()),
            portal_number: placement.portal_number.clone(),
            department: Some(placement.department.clone()),
            batch: Some(placement.batch.clone()),
            section: Some(placement.section.clone()),
            student_account_created: Some(self.order == AccountFlagOrder::Eager),
        };

        match self
            .applications
            .update_office_use(&application_id, &patch)
            .await
        {
            Ok(updated) => {
                case.application = updated;
                case.state = AdmissionState::OfficeDataSaved;
                case.banner = None;
                info!(
                    %application_id,
                    flag_order = self.order.label(),
                    "office-use data saved"
                );
            }
            Err(source) => {
                warn!(%application_id, error = %source, "office-use save failed");
                case.banner = Some(format!("Could not save office data: {source}"));
                return Err(FinalizationError::OfficeUse(source));
            }
        }

        let request = self.account_request(&case.application, placement);
        let account = match self.accounts.create_account(&request).await {
            Ok(account) => account,
            Err(source) => {
                let flag_left_set = case.application.office_use_only.student_account_created;
                if flag_left_set {
                    error!(
                        %application_id,
                        error = %source,
                        "account creation failed after studentAccountCreated was written"
                    );
                } else {
                    warn!(%application_id, error = %source, "account creation failed");
                }
                case.banner = Some(format!("Could not create student account: {source}"));
                return Err(FinalizationError::AccountCreation {
                    source,
                    flag_left_set,
                });
            }
        };

        self.confirm_account_flag(case).await;
        case.state = AdmissionState::AccountCreated;
        case.banner = None;
        info!(%application_id, email = %account.email, "student account provisioned");
        Ok(account)
    }

    async fn confirm_account_flag(&self, case: &mut AdmissionCase) {
        let application_id = case.application.application_id.clone();
        let patch = OfficeUsePatch {
            student_account_created: Some(true),
            ..OfficeUsePatch::default()
        };
        match self
            .applications
            .update_office_use(&application_id, &patch)
            .await
        {
            Ok(updated) => case.application = updated,
            Err(err) => {
                error!(
                    %application_id,
                    error = %err,
                    "account exists but studentAccountCreated could not be confirmed"
                );
                case.application.office_use_only.student_account_created = true;
            }
        }
    }

    fn account_request(&self, application: &Application, placement: &OfficePlacement) -> NewAccount {
        let payload = &application.payload;
        NewAccount {
            name: payload.student_details.student_name.clone(),
            email: payload.contact_details.email.clone(),
            password: self.default_password.clone(),
            role: STUDENT_ROLE.to_string(),
            department: placement.department.clone(),
            batch: placement.batch.clone(),
            section: placement.section.clone(),
            phone: payload.contact_details.mobile_no.clone(),
            enrollment_id: placement.admission_number.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_numbers_use_a_cleaned_department_code() {
        assert_eq!(generate_admission_number(2026, "b.sc-mpcs", 7), "2026BSCMPCS0007");
        assert_eq!(generate_admission_number(2026, "BCom", 1234), "2026BCOM1234");
    }

    #[test]
    fn only_numbers_of_the_same_series_count() {
        assert_eq!(issued_sequence("2026BSC0007", "2026BSC"), Some(7));
        assert_eq!(issued_sequence("2026BSCMPCS0001", "2026BSC"), None);
        assert_eq!(issued_sequence("2025BSC0009", "2026BSC"), None);
        assert_eq!(issued_sequence("2026BSC", "2026BSC"), None);
    }

    #[test]
    fn flag_order_parses_known_spellings() {
        assert_eq!(AccountFlagOrder::parse("Eager"), Some(AccountFlagOrder::Eager));
        assert_eq!(
            AccountFlagOrder::parse(" two-phase "),
            Some(AccountFlagOrder::TwoPhase)
        );
        assert_eq!(AccountFlagOrder::parse("lazy"), None);
    }
}
