use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::domain::ApplicationPayload;

/// Field-scoped messages from a failed phase gate, keyed by payload field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(field, message)| (field.as_str(), message.as_str()))
    }

    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields().collect();
        write!(f, "{} field(s) need attention: {}", fields.len(), fields.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

struct RequiredField {
    key: &'static str,
    message: &'static str,
    value: fn(&ApplicationPayload) -> &str,
}

const PERSONAL_ADDRESS_CONTACT: [RequiredField; 13] = [
    RequiredField {
        key: "studentName",
        message: "Student name is required",
        value: |p| &p.student_details.student_name,
    },
    RequiredField {
        key: "fatherName",
        message: "Father name is required",
        value: |p| &p.student_details.father_name,
    },
    RequiredField {
        key: "motherName",
        message: "Mother name is required",
        value: |p| &p.student_details.mother_name,
    },
    RequiredField {
        key: "dateOfBirth",
        message: "Date of birth is required",
        value: |p| &p.student_details.date_of_birth,
    },
    RequiredField {
        key: "gender",
        message: "Gender is required",
        value: |p| &p.student_details.gender,
    },
    RequiredField {
        key: "houseNo",
        message: "House no is required",
        value: |p| &p.address_details.house_no,
    },
    RequiredField {
        key: "street",
        message: "Street is required",
        value: |p| &p.address_details.street,
    },
    RequiredField {
        key: "village",
        message: "Village is required",
        value: |p| &p.address_details.village,
    },
    RequiredField {
        key: "mandal",
        message: "Mandal is required",
        value: |p| &p.address_details.mandal,
    },
    RequiredField {
        key: "district",
        message: "District is required",
        value: |p| &p.address_details.district,
    },
    RequiredField {
        key: "pinCode",
        message: "Pin code is required",
        value: |p| &p.address_details.pin_code,
    },
    RequiredField {
        key: "mobileNo",
        message: "Mobile no is required",
        value: |p| &p.contact_details.mobile_no,
    },
    RequiredField {
        key: "email",
        message: "Email is required",
        value: |p| &p.contact_details.email,
    },
];

/// Gate for leaving the personal/address/contact phase. Whitespace-only counts as empty.
pub fn validate_personal_address_contact(
    payload: &ApplicationPayload,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    for field in &PERSONAL_ADDRESS_CONTACT {
        if (field.value)(payload).trim().is_empty() {
            errors.insert(field.key, field.message);
        }
    }
    errors.into_result()
}

/// Gate for submitting from the signature/review phase.
pub fn validate_signature_upload(payload: &ApplicationPayload) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let signatures = &payload.signature_upload;
    if signatures.student_signature.is_none() {
        errors.insert("studentSignature", "Student signature is required");
    }
    if signatures.passport_size_photo.is_none() {
        errors.insert("passportSizePhoto", "Passport size photo is required");
    }
    errors.into_result()
}

/// Placement fields the office must fill before admission data is saved.
pub fn validate_placement(
    department: &str,
    batch: &str,
    section: &str,
    admission_number: &str,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    for (key, value, message) in [
        ("department", department, "Department is required"),
        ("batch", batch, "Batch is required"),
        ("section", section, "Section is required"),
        (
            "admissionNumber",
            admission_number,
            "Admission number is required",
        ),
    ] {
        if value.trim().is_empty() {
            errors.insert(key, message);
        }
    }
    errors.into_result()
}
