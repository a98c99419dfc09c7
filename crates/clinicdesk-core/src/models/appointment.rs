use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{parse_date, FieldError, DATE_FORMAT};
use crate::utils::contains_ignore_case;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub appointment_id: i64,
    #[serde(default)]
    pub description: String,
    /// `YYYY-MM-DD`, possibly followed by a time component
    #[serde(default)]
    pub appointment_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<i64>,
    /// Patient first name, when the server joins it in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
}

impl Appointment {
    pub fn date(&self) -> Option<NaiveDate> {
        self.appointment_date.get(..10).and_then(parse_date)
    }

    /// Calendar filter: the stored date starts with the selected day.
    pub fn is_on(&self, day: NaiveDate) -> bool {
        self.appointment_date
            .starts_with(&day.format(DATE_FORMAT).to_string())
    }

    pub fn matches_search(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return true;
        }
        self.first_name
            .as_deref()
            .is_some_and(|n| contains_ignore_case(n, query))
            || contains_ignore_case(&self.description, query)
            || self.appointment_id.to_string().contains(query)
    }
}

/// Body of `POST /appointment/{patientId}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    pub description: String,
    pub appointment_date: String,
}

/// Raw text of the add/edit appointment form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentForm {
    /// Set when editing an existing appointment
    pub appointment_id: Option<i64>,
    pub description: String,
    pub patient_id: String,
    pub appointment_date: String,
}

impl AppointmentForm {
    pub const FIELDS: [&'static str; 3] = ["Description", "Patient ID", "Appointment Date"];

    pub fn from_appointment(appointment: &Appointment) -> Self {
        Self {
            appointment_id: Some(appointment.appointment_id),
            description: appointment.description.clone(),
            patient_id: appointment
                .patient_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            appointment_date: appointment.appointment_date.clone(),
        }
    }

    /// A new appointment pre-dated to the calendar selection.
    pub fn on_day(day: Option<NaiveDate>) -> Self {
        Self {
            appointment_date: day
                .map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn field_mut(&mut self, index: usize) -> Option<&mut String> {
        match index {
            0 => Some(&mut self.description),
            1 => Some(&mut self.patient_id),
            2 => Some(&mut self.appointment_date),
            _ => None,
        }
    }

    pub fn field(&self, index: usize) -> &str {
        match index {
            0 => &self.description,
            1 => &self.patient_id,
            2 => &self.appointment_date,
            _ => "",
        }
    }

    /// Validate and split into `(patient_id, body)` for creation.
    pub fn validate(&self) -> Result<(i64, NewAppointment), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.description.trim().is_empty() {
            errors.push(FieldError::new("description", "Description is required"));
        }

        let patient_id = match self.patient_id.trim() {
            "" => {
                errors.push(FieldError::new("patientId", "Patient ID is required"));
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

        let date = self.appointment_date.trim();
        if date.is_empty() {
            errors.push(FieldError::new(
                "appointmentDate",
                "Appointment Date is required",
            ));
        } else if date.get(..10).and_then(parse_date).is_none() {
            errors.push(FieldError::new(
                "appointmentDate",
                "Appointment Date must be YYYY-MM-DD",
            ));
        }

        match (patient_id, errors.is_empty()) {
            (Some(patient_id), true) => Ok((
                patient_id,
                NewAppointment {
                    description: self.description.trim().to_string(),
                    appointment_date: date.to_string(),
                },
            )),
            _ => Err(errors),
        }
    }

    /// Validate into a full record for `PUT /appointment/{id}`.
    pub fn to_appointment(&self) -> Result<Appointment, Vec<FieldError>> {
        let (patient_id, body) = self.validate()?;
        let appointment_id = self.appointment_id.ok_or_else(|| {
            vec![FieldError::new(
                "appointmentId",
                "Only existing appointments can be updated",
            )]
        })?;
        Ok(Appointment {
            appointment_id,
            description: body.description,
            appointment_date: body.appointment_date,
            patient_id: Some(patient_id),
            first_name: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Appointment {
        Appointment {
            appointment_id: 9,
            description: "Annual checkup".into(),
            appointment_date: "2024-03-05T09:30:00".into(),
            patient_id: Some(42),
            first_name: Some("Ada".into()),
        }
    }

    #[test]
    fn test_is_on_matches_date_prefix() {
        let a = sample();
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert!(a.is_on(day));
        assert!(!a.is_on(day.succ_opt().unwrap()));
        assert_eq!(a.date(), Some(day));
    }

    #[test]
    fn test_matches_search() {
        let a = sample();
        assert!(a.matches_search("checkup"));
        assert!(a.matches_search("ADA"));
        assert!(a.matches_search("9"));
        assert!(!a.matches_search("dental"));
    }

    #[test]
    fn test_validate_splits_patient_id() {
        let form = AppointmentForm {
            appointment_id: None,
            description: " Follow-up ".into(),
            patient_id: "42".into(),
            appointment_date: "2024-04-01".into(),
        };
        let (patient_id, body) = form.validate().unwrap();
        assert_eq!(patient_id, 42);
        assert_eq!(body.description, "Follow-up");
        assert_eq!(
            serde_json::to_value(&body).unwrap()["appointmentDate"],
            "2024-04-01"
        );
    }

    #[test]
    fn test_validate_missing_fields() {
        let errors = AppointmentForm::default().validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_to_appointment_requires_existing_id() {
        let mut form = AppointmentForm::from_appointment(&sample());
        let updated = form.to_appointment().unwrap();
        assert_eq!(updated.appointment_id, 9);
        assert_eq!(updated.patient_id, Some(42));

        form.appointment_id = None;
        assert!(form.to_appointment().is_err());
    }

    #[test]
    fn test_on_day_prefills_date() {
        let day = NaiveDate::from_ymd_opt(2024, 12, 24).unwrap();
        assert_eq!(AppointmentForm::on_day(Some(day)).appointment_date, "2024-12-24");
        assert!(AppointmentForm::on_day(None).appointment_date.is_empty());
    }
}
