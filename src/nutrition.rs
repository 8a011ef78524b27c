use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Date;
use url::Url;
use uuid::Uuid;

use crate::client::ClientId;
use crate::dates;
use crate::errors::BackendError;

/// The meal slots a photo can be logged against.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MealSlot {
    Breakfast,
    MorningSnack,
    Lunch,
    AfternoonSnack,
    Dinner,
    Supper,
    NightSnack,
}

impl MealSlot {
    pub const ALL: [MealSlot; 7] = [
        MealSlot::Breakfast,
        MealSlot::MorningSnack,
        MealSlot::Lunch,
        MealSlot::AfternoonSnack,
        MealSlot::Dinner,
        MealSlot::Supper,
        MealSlot::NightSnack,
    ];

    /// The key used in storage and blob paths.
    pub fn key(&self) -> &'static str {
        match self {
            MealSlot::Breakfast => "breakfast",
            MealSlot::MorningSnack => "morning_snack",
            MealSlot::Lunch => "lunch",
            MealSlot::AfternoonSnack => "afternoon_snack",
            MealSlot::Dinner => "dinner",
            MealSlot::Supper => "supper",
            MealSlot::NightSnack => "night_snack",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MealSlot::Breakfast => "Breakfast",
            MealSlot::MorningSnack => "Morning Snack",
            MealSlot::Lunch => "Lunch",
            MealSlot::AfternoonSnack => "Afternoon Snack",
            MealSlot::Dinner => "Dinner",
            MealSlot::Supper => "Supper",
            MealSlot::NightSnack => "Night Snack",
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MealSlot {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MealSlot::ALL
            .iter()
            .copied()
            .find(|slot| slot.key() == s)
            .ok_or_else(|| BackendError::InvalidField {
                field: "meal",
                reason: "unknown meal slot",
            })
    }
}

/// A slot as listed for the UI.
#[derive(Clone, Debug, Serialize)]
pub struct MealOption {
    key: &'static str,
    label: &'static str,
}

impl From<MealSlot> for MealOption {
    fn from(slot: MealSlot) -> Self {
        MealOption {
            key: slot.key(),
            label: slot.label(),
        }
    }
}

/// A meal photo logged by a client.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct NutritionEntry {
    pub(crate) id: Uuid,

    pub(crate) client_id: ClientId,

    #[serde(with = "dates::iso")]
    pub(crate) date: Date,

    pub(crate) meal: MealSlot,

    pub(crate) image_url: Url,
}

impl NutritionEntry {
    pub fn new(id: Uuid, client_id: ClientId, date: Date, meal: MealSlot, image_url: Url) -> Self {
        NutritionEntry {
            id,
            client_id,
            date,
            meal,
            image_url,
        }
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn meal(&self) -> MealSlot {
        self.meal
    }

    pub fn image_url(&self) -> &Url {
        &self.image_url
    }
}

/// The `metadata` part of a nutrition upload.
#[derive(Clone, Debug, Deserialize)]
pub struct UploadMetadata {
    #[serde(with = "dates::iso")]
    pub(crate) date: Date,

    pub(crate) meal: MealSlot,
}

/// The blob key a meal photo is stored under. Re-uploading the same
/// slot on the same day replaces the photo.
pub fn image_key(
    prefix: &str,
    client: &ClientId,
    date: Date,
    meal: MealSlot,
    extension: &str,
) -> String {
    format!(
        "{}/{}/{}/{}.{}",
        prefix,
        client,
        dates::format_date(date),
        meal.key(),
        extension
    )
}

/// Newest day first; within a day, in the order the meals are eaten.
pub fn sort_newest_first(entries: &mut [NutritionEntry]) {
    entries.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.meal.cmp(&b.meal)));
}
