//! Inbound lead payloads and their validation.

use database::validation::{
    self, validate_email, validate_language_code, validate_phone, validate_required,
    MAX_MESSAGE_LENGTH, MAX_NAME_LENGTH,
};
use database::NewLead;
use serde::Deserialize;

use crate::error::Result;
use crate::scoring;

/// Source recorded when the payload does not name one.
pub const DEFAULT_LEAD_SOURCE: &str = "Website";

/// A lead as submitted by a form, chat widget, or property inquiry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadIntake {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub country_prefix: Option<String>,

    pub lead_source: Option<String>,
    pub lead_source_detail: Option<String>,
    pub page_url: Option<String>,
    pub page_type: Option<String>,
    pub page_slug: Option<String>,
    pub language: Option<String>,

    /// Chat intake progress.
    pub questions_answered: u32,
    pub intake_complete: bool,

    pub message: Option<String>,

    pub location_preference: Vec<String>,
    pub sea_view_importance: Option<String>,
    pub budget_range: Option<String>,
    pub bedrooms_desired: Option<String>,
    pub property_type: Vec<String>,
    pub property_purpose: Option<String>,
    pub timeframe: Option<String>,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

impl LeadIntake {
    /// Validate, normalize and score the payload.
    pub fn into_new_lead(self, default_language: &str) -> Result<NewLead> {
        validate_required("first name", &self.first_name, MAX_NAME_LENGTH)?;
        validate_required("last name", &self.last_name, MAX_NAME_LENGTH)?;
        validate_phone(&self.phone)?;

        let email = clean(self.email.clone());
        if let Some(email) = &email {
            validate_email(email)?;
        }

        let language = clean(self.language.clone())
            .unwrap_or_else(|| default_language.to_string())
            .to_lowercase();
        validate_language_code(&language)?;

        let message = clean(self.message.clone());
        if let Some(message) = &message {
            let len = message.chars().count();
            if len > MAX_MESSAGE_LENGTH {
                return Err(validation::ValidationError::TooLong {
                    field: "message".to_string(),
                    max: MAX_MESSAGE_LENGTH,
                    actual: len,
                }
                .into());
            }
        }

        let scored = scoring::score(&self);

        Ok(NewLead {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            phone_number: self.phone.trim().to_string(),
            country_prefix: clean(self.country_prefix).unwrap_or_default(),
            email,
            language,
            lead_source: clean(self.lead_source).unwrap_or_else(|| DEFAULT_LEAD_SOURCE.to_string()),
            lead_source_detail: clean(self.lead_source_detail),
            page_type: clean(self.page_type),
            page_slug: clean(self.page_slug),
            page_url: clean(self.page_url),
            message,
            budget_range: clean(self.budget_range),
            location_preference: clean_list(self.location_preference),
            property_type: clean_list(self.property_type),
            timeframe: clean(self.timeframe),
            lead_score: scored.score,
            lead_segment: scored.segment,
            lead_priority: scored.priority,
        })
    }
}
