use std::net::SocketAddr;
use std::sync::Arc;

use admission_portal::config::AppConfig;
use admission_portal::error::AppError;
use admission_portal::telemetry;
use admission_portal::workflows::admission::{
    AccountFlagOrder, AddressDetails, AdmissionFinalizer, AttachmentTracker, ContactDetails,
    DocumentKey, DraftStore, FinalizationError, MemoryFallbackCache, OfficePlacement, OwnerId,
    PayloadPatch, PortalClient, SignatureKind, StudentDetails, SubmissionCoordinator, UploadFile,
    WizardController, WizardError,
};
use chrono::{Datelike, Utc};
use clap::Args;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::infra::PortalBackend;
use crate::routes::portal_router;

const APPLICANT: &str = "applicant-demo";
const OFFICE: &str = "office-demo";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Make the account service fail with a 500 during finalization.
    #[arg(long)]
    pub(crate) simulate_account_outage: bool,
    /// Write studentAccountCreated only after the account exists.
    #[arg(long)]
    pub(crate) two_phase: bool,
    /// Department the office places the student in.
    #[arg(long, default_value = "BSc")]
    pub(crate) department: String,
}

/// Serve `backend` on an ephemeral local port.
async fn spawn_backend(
    backend: Arc<PortalBackend>,
) -> Result<(SocketAddr, JoinHandle<std::io::Result<()>>), AppError> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;
    let app = portal_router(backend);
    let handle = tokio::spawn(async move { axum::serve(listener, app).await });
    Ok((addr, handle))
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        simulate_account_outage,
        two_phase,
        department,
    } = args;
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let backend = Arc::new(PortalBackend::default());
    let (addr, server) = spawn_backend(backend.clone()).await?;
    let base_url = format!("http://{addr}");
    println!("Admission portal demo (backend on {base_url})");

    let applicant = Arc::new(PortalClient::new(
        base_url.clone(),
        Some(APPLICANT.to_string()),
        config.portal.request_timeout,
    )?);
    let drafts = Arc::new(DraftStore::new(
        applicant.clone(),
        Arc::new(MemoryFallbackCache::default()),
        OwnerId(APPLICANT.to_string()),
    ));
    let tracker = AttachmentTracker::new(applicant.clone());
    let mut wizard = WizardController::start(drafts.clone());

    println!("\nApplicant");
    match wizard.next().await {
        Err(WizardError::Validation(errors)) => {
            println!("- empty form blocked: {errors}");
        }
        other => println!("- unexpected result for an empty form: {other:?}"),
    }

    wizard.edit(phase_one())?;
    let report = wizard.next().await?;
    println!(
        "- moved to phase {} | {} ({})",
        report.phase,
        report
            .save
            .as_ref()
            .map(|outcome| outcome.user_message())
            .unwrap_or("not saved"),
        report
            .save
            .as_ref()
            .and_then(|outcome| outcome.draft_id())
            .map(|id| id.0.as_str())
            .unwrap_or("-")
    );

    for (key, name) in [
        (DocumentKey::SscMemo, "ssc-memo.pdf"),
        (DocumentKey::TransferCertificate, "transfer-certificate.pdf"),
    ] {
        wizard
            .upload_document(&tracker, key, demo_file(name))
            .await?;
        println!("- uploaded {}", key.label());
    }
    wizard.select_degree_group("BSc")?;
    wizard.toggle_bsc_specialization("MPCs")?;
    wizard.toggle_bsc_specialization("MSCs")?;
    let report = wizard.next().await?;
    println!(
        "- moved to phase {} | {}",
        report.phase,
        report
            .save
            .as_ref()
            .map(|outcome| outcome.user_message())
            .unwrap_or("not saved")
    );

    wizard
        .upload_signature(&tracker, SignatureKind::StudentSignature, demo_file("signature.png"))
        .await?;
    wizard
        .upload_signature(&tracker, SignatureKind::PassportSizePhoto, demo_file("photo.jpg"))
        .await?;

    let coordinator = SubmissionCoordinator::new(applicant.clone(), drafts.clone());
    let application = wizard.submit(&coordinator).await?;
    println!(
        "- submitted application {} ({} drafts left)",
        application.application_id,
        drafts.list_drafts().await?.len()
    );

    println!("\nOffice");
    let office = Arc::new(applicant.with_token(OFFICE));
    if simulate_account_outage {
        backend.set_accounts_offline(true);
        println!("- account service outage simulated");
    }
    let order = if two_phase {
        AccountFlagOrder::TwoPhase
    } else {
        config.portal.account_flag_order
    };
    let finalizer = AdmissionFinalizer::new(
        office.clone(),
        office,
        config.portal.default_student_password.clone(),
    )
        .with_flag_order(order);

    let mut case = finalizer.load(&application.application_id).await?;
    case.mark_admitted()?;
    let admission_number = finalizer
        .suggest_admission_number(Utc::now().year(), &department)
        .await?;
    let placement = OfficePlacement {
        department: department.clone(),
        batch: format!("{}-{}", Utc::now().year(), Utc::now().year() + 3),
        section: "A".to_string(),
        admission_number,
        portal_number: None,
    };
    println!(
        "- admitted {} into {} as {} (flag order: {})",
        application.payload.student_details.student_name,
        placement.department,
        placement.admission_number,
        order.label()
    );

    match finalizer.save_and_provision(&mut case, &placement).await {
        Ok(account) => println!(
            "- student login created for {} ({})",
            account.email, account.enrollment_id
        ),
        Err(FinalizationError::AccountCreation {
            source,
            flag_left_set,
        }) => {
            println!("- account creation failed: {source}");
            println!(
                "  studentAccountCreated={} | accounts on file: {} | action {}",
                flag_left_set,
                backend.accounts().len(),
                if case.can_provision() {
                    "can be retried"
                } else {
                    "is locked"
                }
            );
        }
        Err(err) => return Err(err.into()),
    }

    if let Ok(stored) = backend.application(&application.application_id) {
        println!(
            "- application status: {} | state: {:?}",
            stored.status.label(),
            case.state()
        );
    }

    server.abort();
    Ok(())
}

fn phase_one() -> PayloadPatch {
    PayloadPatch {
        student_details: Some(StudentDetails {
            student_name: "Sai Teja".to_string(),
            father_name: "Venkata Rao".to_string(),
            mother_name: "Sarada".to_string(),
            date_of_birth: "2008-02-14".to_string(),
            gender: "Male".to_string(),
            nationality: "Indian".to_string(),
            ..StudentDetails::default()
        }),
        address_details: Some(AddressDetails {
            house_no: "7-1-22".to_string(),
            street: "Gandhi Nagar".to_string(),
            village: "Tenali".to_string(),
            mandal: "Tenali".to_string(),
            district: "Guntur".to_string(),
            pin_code: "522201".to_string(),
            state: "Andhra Pradesh".to_string(),
            ..AddressDetails::default()
        }),
        contact_details: Some(ContactDetails {
            mobile_no: "9848012345".to_string(),
            email: "sai.teja@example.com".to_string(),
            ..ContactDetails::default()
        }),
        ..PayloadPatch::default()
    }
}

fn demo_file(name: &str) -> UploadFile {
    UploadFile::new(name, format!("demo contents of {name}").into_bytes())
}
