use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::client::ClientId;
use crate::dates;
use crate::errors::BackendError;

/// A body-composition snapshot as measured by the trainer.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct BodyComposition {
    pub(crate) id: Uuid,

    pub(crate) client_id: ClientId,

    #[serde(flatten)]
    pub(crate) measurement: Measurement,
}

impl BodyComposition {
    pub fn new(id: Uuid, client_id: ClientId, measurement: Measurement) -> Self {
        BodyComposition {
            id,
            client_id,
            measurement,
        }
    }

    pub fn measured_on(&self) -> Date {
        self.measurement.measured_on
    }
}

/// The measured values of a snapshot, and the keys of the activity
/// level and diet goal it should be evaluated against.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Measurement {
    #[serde(with = "dates::iso")]
    pub(crate) measured_on: Date,

    #[serde(with = "dates::iso")]
    pub(crate) date_of_birth: Date,

    pub(crate) body_wt_kg: f64,

    pub(crate) body_fat_pct: f64,

    pub(crate) height_cm: f64,

    pub(crate) activity_level: String,

    pub(crate) goal_diet: String,
}

impl Measurement {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        measured_on: Date,
        date_of_birth: Date,
        body_wt_kg: f64,
        body_fat_pct: f64,
        height_cm: f64,
        activity_level: impl Into<String>,
        goal_diet: impl Into<String>,
    ) -> Self {
        Measurement {
            measured_on,
            date_of_birth,
            body_wt_kg,
            body_fat_pct,
            height_cm,
            activity_level: activity_level.into(),
            goal_diet: goal_diet.into(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), BackendError> {
        let positive = |value: f64| value.is_finite() && value > 0.0;

        if !positive(self.body_wt_kg) {
            return Err(BackendError::InvalidField {
                field: "body_wt_kg",
                reason: "must be a positive number",
            });
        }

        if !(self.body_fat_pct.is_finite() && (0.0..100.0).contains(&self.body_fat_pct)) {
            return Err(BackendError::InvalidField {
                field: "body_fat_pct",
                reason: "must be a percentage below 100",
            });
        }

        if !positive(self.height_cm) {
            return Err(BackendError::InvalidField {
                field: "height_cm",
                reason: "must be a positive number",
            });
        }

        if self.date_of_birth > self.measured_on {
            return Err(BackendError::InvalidField {
                field: "date_of_birth",
                reason: "must not be after the measurement",
            });
        }

        Ok(())
    }
}

/// Maps an activity-level key to the multiplier applied to the basal
/// metabolic rate.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ActivityLevel {
    pub(crate) key: String,
    pub(crate) multiplier: f64,
}

impl ActivityLevel {
    pub fn new(key: impl Into<String>, multiplier: f64) -> Self {
        ActivityLevel {
            key: key.into(),
            multiplier,
        }
    }
}

/// Maps a diet-goal key to a caloric adjustment (negative when
/// cutting) and a macro split in percent.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GoalDiet {
    pub(crate) key: String,
    pub(crate) caloric_adjustment: f64,
    pub(crate) protein_pct: f64,
    pub(crate) carbs_pct: f64,
    pub(crate) fats_pct: f64,
}

impl GoalDiet {
    pub fn new(
        key: impl Into<String>,
        caloric_adjustment: f64,
        protein_pct: f64,
        carbs_pct: f64,
        fats_pct: f64,
    ) -> Self {
        GoalDiet {
            key: key.into(),
            caloric_adjustment,
            protein_pct,
            carbs_pct,
            fats_pct,
        }
    }
}
