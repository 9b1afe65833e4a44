use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::image::ImageView,
    rating::RatingSummary,
};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_SCORE: i32 = 5;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Loo {
    pub id: Uuid,
    pub owner_id: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub cleanliness: i32,
    pub privacy: i32,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Loo {
    pub fn display_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) => name.to_string(),
            None => format!("Loo at {}, {}", self.latitude, self.longitude),
        }
    }
}

/// A loo as returned by the API, with its rating computed from the current
/// reviews and its images embedded.
#[derive(Debug, Serialize)]
pub struct LooView {
    #[serde(flatten)]
    pub loo: Loo,
    #[serde(flatten)]
    pub rating: RatingSummary,
    pub images: Vec<ImageView>,
}

/// Validated field set written by create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct LooInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub cleanliness: i32,
    pub privacy: i32,
    pub tags: Vec<String>,
}

/// Body of `POST /loos/` and `PUT /loos/{id}/`.
#[derive(Debug, Deserialize)]
pub struct LooPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub cleanliness: Option<i32>,
    #[serde(default)]
    pub privacy: Option<i32>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Body of `PATCH /loos/{id}/`. Absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct LooPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub cleanliness: Option<i32>,
    pub privacy: Option<i32>,
    pub tags: Option<Vec<String>>,
}

impl LooPayload {
    pub fn validate(self) -> AppResult<LooInput> {
        let name = non_blank(self.name);
        if let Some(name) = &name {
            if name.chars().count() > MAX_NAME_LEN {
                return Err(AppError::invalid(format!(
                    "name must be at most {MAX_NAME_LEN} characters"
                )));
            }
        }

        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(AppError::invalid("latitude must be between -90 and 90"));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(AppError::invalid("longitude must be between -180 and 180"));
        }

        let cleanliness = score("cleanliness", self.cleanliness)?;
        let privacy = score("privacy", self.privacy)?;

        Ok(LooInput {
            name,
            description: non_blank(self.description),
            latitude: self.latitude,
            longitude: self.longitude,
            cleanliness,
            privacy,
            tags: normalize_tags(self.tags.unwrap_or_default()),
        })
    }
}

impl LooPatch {
    pub fn has_changes(&self) -> bool {
        self.name.is_some()
            || self.description.is_some()
            || self.latitude.is_some()
            || self.longitude.is_some()
            || self.cleanliness.is_some()
            || self.privacy.is_some()
            || self.tags.is_some()
    }

    /// Overlays the patch on the stored loo, producing a full payload that
    /// goes through the same validation as `PUT`.
    pub fn apply_to(self, loo: &Loo) -> LooPayload {
        LooPayload {
            name: self.name.or_else(|| loo.name.clone()),
            description: self.description.or_else(|| loo.description.clone()),
            latitude: self.latitude.unwrap_or(loo.latitude),
            longitude: self.longitude.unwrap_or(loo.longitude),
            cleanliness: Some(self.cleanliness.unwrap_or(loo.cleanliness)),
            privacy: Some(self.privacy.unwrap_or(loo.privacy)),
            tags: Some(self.tags.unwrap_or_else(|| loo.tags.clone())),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn score(field: &str, value: Option<i32>) -> AppResult<i32> {
    let value = value.unwrap_or(0);
    if !(0..=MAX_SCORE).contains(&value) {
        return Err(AppError::invalid(format!(
            "{field} must be between 0 and {MAX_SCORE}"
        )));
    }
    Ok(value)
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> LooPayload {
        LooPayload {
            name: Some("  Station concourse ".to_string()),
            description: Some(String::new()),
            latitude: 51.53,
            longitude: -0.12,
            cleanliness: None,
            privacy: Some(3),
            tags: Some(vec!["Free".into(), " Free ".into(), "".into(), "24/7".into()]),
        }
    }

    #[test]
    fn validate_normalizes_fields() {
        let input = payload().validate().unwrap();
        assert_eq!(input.name.as_deref(), Some("Station concourse"));
        assert_eq!(input.description, None);
        assert_eq!(input.cleanliness, 0);
        assert_eq!(input.privacy, 3);
        assert_eq!(input.tags, vec!["Free".to_string(), "24/7".to_string()]);
    }

    #[test]
    fn validate_rejects_out_of_range_coordinates() {
        let mut p = payload();
        p.latitude = 91.0;
        assert!(matches!(p.validate(), Err(AppError::InvalidRequest(_))));

        let mut p = payload();
        p.longitude = f64::NAN;
        assert!(p.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_scores_and_long_names() {
        let mut p = payload();
        p.cleanliness = Some(6);
        assert!(p.validate().is_err());

        let mut p = payload();
        p.name = Some("x".repeat(MAX_NAME_LEN + 1));
        assert!(p.validate().is_err());
    }

    #[test]
    fn patch_keeps_unset_fields() {
        let loo = Loo {
            id: Uuid::new_v4(),
            owner_id: None,
            name: Some("Old".into()),
            description: Some("desc".into()),
            latitude: 1.0,
            longitude: 2.0,
            cleanliness: 4,
            privacy: 2,
            tags: vec!["Quiet".into()],
            created_at: Utc::now(),
        };
        let patch = LooPatch {
            name: Some("New".into()),
            ..LooPatch::default()
        };
        assert!(patch.has_changes());
        let input = patch.apply_to(&loo).validate().unwrap();
        assert_eq!(input.name.as_deref(), Some("New"));
        assert_eq!(input.description.as_deref(), Some("desc"));
        assert_eq!(input.cleanliness, 4);
        assert_eq!(input.tags, vec!["Quiet".to_string()]);
        assert!(!LooPatch::default().has_changes());
    }

    #[test]
    fn display_name_falls_back_to_coordinates() {
        let loo = Loo {
            id: Uuid::new_v4(),
            owner_id: None,
            name: None,
            description: None,
            latitude: 1.5,
            longitude: 2.5,
            cleanliness: 0,
            privacy: 0,
            tags: Vec::new(),
            created_at: Utc::now(),
        };
        assert_eq!(loo.display_name(), "Loo at 1.5, 2.5");
    }
}
