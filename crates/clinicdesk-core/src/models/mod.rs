//! Data models for clinic records.
//!
//! - `Patient`, `PatientForm`: patient records and add/edit form input
//! - `Appointment`, `NewAppointment`, `AppointmentForm`: appointments
//! - `Page`, `PageRequest`: paged list responses from the API
//! - `FieldError`: a validation failure tied to a form field

pub mod appointment;
pub mod page;
pub mod patient;

pub use appointment::{Appointment, AppointmentForm, NewAppointment};
pub use page::{Page, PageRequest, APPOINTMENT_PAGE_SIZES, PATIENT_PAGE_SIZES};
pub use patient::{Patient, PatientForm};

use chrono::NaiveDate;

/// Date format used by the API and by form input
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A form field that failed validation, with a message for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub(crate) fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}
