use serde::{Deserialize, Serialize};

use super::{parse_date, FieldError};
use crate::utils::contains_ignore_case;

/// Minimum length for first and last names
const MIN_NAME_LENGTH: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub patient_id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Date of birth, `YYYY-MM-DD`
    #[serde(default)]
    pub dob: String,
    #[serde(default)]
    pub gender: String,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Search box match: names and gender ignore case, the id matches as a
    /// substring of its decimal form.
    pub fn matches_search(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return true;
        }
        contains_ignore_case(&self.first_name, query)
            || contains_ignore_case(&self.last_name, query)
            || contains_ignore_case(&self.gender, query)
            || self.patient_id.to_string().contains(query)
    }
}

/// Raw text of the add/edit patient form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientForm {
    pub patient_id: String,
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    pub gender: String,
}

impl PatientForm {
    pub const FIELDS: [&'static str; 5] = [
        "Patient ID",
        "First Name",
        "Last Name",
        "Date of Birth",
        "Gender",
    ];

    pub fn from_patient(patient: &Patient) -> Self {
        Self {
            patient_id: patient.patient_id.to_string(),
            first_name: patient.first_name.clone(),
            last_name: patient.last_name.clone(),
            dob: patient.dob.clone(),
            gender: patient.gender.clone(),
        }
    }

    pub fn field_mut(&mut self, index: usize) -> Option<&mut String> {
        match index {
            0 => Some(&mut self.patient_id),
            1 => Some(&mut self.first_name),
            2 => Some(&mut self.last_name),
            3 => Some(&mut self.dob),
            4 => Some(&mut self.gender),
            _ => None,
        }
    }

    pub fn field(&self, index: usize) -> &str {
        match index {
            0 => &self.patient_id,
            1 => &self.first_name,
            2 => &self.last_name,
            3 => &self.dob,
            4 => &self.gender,
            _ => "",
        }
    }

    /// Check every field and build the record, or report all failures.
    pub fn validate(&self) -> Result<Patient, Vec<FieldError>> {
        let mut errors = Vec::new();

        let patient_id = match self.patient_id.trim() {
            "" => {
                errors.push(FieldError::new("patientId", "Patient ID cannot be empty"));
                None
            }
            raw => match raw.parse::<i64>() {
                Ok(id) if id > 0 => Some(id),
                _ => {
                    errors.push(FieldError::new(
                        "patientId",
                        "Patient ID must be a positive number",
                    ));
                    None
                }
            },
        };

        check_name(&mut errors, "firstName", "First name", &self.first_name);
        check_name(&mut errors, "lastName", "Last name", &self.last_name);

        if self.dob.trim().is_empty() {
            errors.push(FieldError::new("dob", "Date of birth is required"));
        } else if parse_date(&self.dob).is_none() {
            errors.push(FieldError::new("dob", "Date of birth must be YYYY-MM-DD"));
        }

        match (patient_id, errors.is_empty()) {
            (Some(patient_id), true) => Ok(Patient {
                patient_id,
                first_name: self.first_name.trim().to_string(),
                last_name: self.last_name.trim().to_string(),
                dob: self.dob.trim().to_string(),
                gender: self.gender.trim().to_string(),
            }),
            _ => Err(errors),
        }
    }
}

fn check_name(errors: &mut Vec<FieldError>, field: &'static str, label: &str, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        errors.push(FieldError::new(field, format!("{} is required", label)));
    } else if value.chars().count() < MIN_NAME_LENGTH {
        errors.push(FieldError::new(
            field,
            format!("{} must be more than one character", label),
        ));
    }
}
