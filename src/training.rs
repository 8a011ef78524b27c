use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::client::ClientId;
use crate::dates;
use crate::errors::BackendError;
use crate::normalization;

/// How a set was measured. Decided when the set is logged, never
/// inferred from stored text afterwards.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "RawMeasure")]
pub enum SetMeasure {
    /// A rep-based set.
    Reps(u32),

    /// A timed hold, in seconds.
    #[serde(rename = "duration_secs")]
    Duration(u32),
}

impl SetMeasure {
    /// The rep count, if this is a rep-based set.
    pub fn reps(&self) -> Option<u32> {
        match self {
            SetMeasure::Reps(reps) => Some(*reps),
            SetMeasure::Duration(_) => None,
        }
    }

    pub fn duration_secs(&self) -> Option<u32> {
        match self {
            SetMeasure::Reps(_) => None,
            SetMeasure::Duration(secs) => Some(*secs),
        }
    }
}

/// Parses the text form used by older session logs: `"10"` is ten
/// reps, `"30s"` is a thirty-second hold.
///
/// ```
/// use tracker::training::SetMeasure;
/// assert_eq!("10".parse::<SetMeasure>().unwrap(), SetMeasure::Reps(10));
/// assert_eq!("30s".parse::<SetMeasure>().unwrap(), SetMeasure::Duration(30));
/// ```
impl FromStr for SetMeasure {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let malformed = || BackendError::MalformedMeasure(s.to_owned());

        match text.strip_suffix('s').or_else(|| text.strip_suffix('S')) {
            Some(secs) => secs
                .trim_end()
                .parse()
                .map(SetMeasure::Duration)
                .map_err(|_| malformed()),
            None => text.parse().map(SetMeasure::Reps).map_err(|_| malformed()),
        }
    }
}

impl fmt::Display for SetMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetMeasure::Reps(reps) => write!(f, "{}", reps),
            SetMeasure::Duration(secs) => write!(f, "{}s", secs),
        }
    }
}

/// Everything a client might send as a measure: a bare count, the
/// legacy text form, or the tagged form we serialize.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawMeasure {
    Count(u32),
    Text(String),
    Tagged(TaggedMeasure),
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum TaggedMeasure {
    Reps(u32),
    DurationSecs(u32),
}

impl TryFrom<RawMeasure> for SetMeasure {
    type Error = BackendError;

    fn try_from(raw: RawMeasure) -> Result<Self, Self::Error> {
        match raw {
            RawMeasure::Count(reps) => Ok(SetMeasure::Reps(reps)),
            RawMeasure::Text(text) => text.parse(),
            RawMeasure::Tagged(TaggedMeasure::Reps(reps)) => Ok(SetMeasure::Reps(reps)),
            RawMeasure::Tagged(TaggedMeasure::DurationSecs(secs)) => Ok(SetMeasure::Duration(secs)),
        }
    }
}

/// One logged exercise entry: a client did `sets` sets of `exercise`
/// on `date`, each measured by `measure`, with `load_kg`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TrainingSession {
    pub(crate) id: Uuid,

    pub(crate) client_id: ClientId,

    #[serde(flatten)]
    pub(crate) details: SessionDetails,
}

impl TrainingSession {
    pub fn new(id: Uuid, client_id: ClientId, details: SessionDetails) -> Self {
        TrainingSession {
            id,
            client_id,
            details,
        }
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn date(&self) -> Date {
        self.details.date
    }

    pub fn exercise(&self) -> &str {
        &self.details.exercise
    }

    pub fn sets(&self) -> u32 {
        self.details.sets
    }

    pub fn measure(&self) -> SetMeasure {
        self.details.measure
    }

    pub fn load_kg(&self) -> f64 {
        self.details.load_kg
    }

    pub(crate) fn apply(&mut self, update: SessionUpdate) {
        self.details.sets = update.sets;
        self.details.measure = update.measure;
        self.details.load_kg = update.load_kg;
    }
}

/// The body of a request to log a session for a client.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SessionDetails {
    #[serde(with = "dates::iso")]
    pub(crate) date: Date,

    #[serde(deserialize_with = "normalization::deserialize")]
    pub(crate) exercise: String,

    pub(crate) sets: u32,

    #[serde(alias = "reps", alias = "rep")]
    pub(crate) measure: SetMeasure,

    pub(crate) load_kg: f64,
}

impl SessionDetails {
    pub fn new(
        date: Date,
        exercise: impl Into<String>,
        sets: u32,
        measure: SetMeasure,
        load_kg: f64,
    ) -> Self {
        SessionDetails {
            date,
            exercise: exercise.into(),
            sets,
            measure,
            load_kg,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), BackendError> {
        if self.exercise.is_empty() {
            return Err(BackendError::InvalidField {
                field: "exercise",
                reason: "must not be blank",
            });
        }

        validate_numbers(self.sets, self.measure, self.load_kg)
    }
}

/// The fields of a logged session that can be edited afterwards.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct SessionUpdate {
    pub(crate) sets: u32,

    #[serde(alias = "reps", alias = "rep")]
    pub(crate) measure: SetMeasure,

    pub(crate) load_kg: f64,
}

impl SessionUpdate {
    pub fn new(sets: u32, measure: SetMeasure, load_kg: f64) -> Self {
        SessionUpdate {
            sets,
            measure,
            load_kg,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), BackendError> {
        validate_numbers(self.sets, self.measure, self.load_kg)
    }
}

/// The largest set count or measure that can be stored.
pub const MAX_COUNT: u32 = i32::MAX as u32;

fn validate_numbers(sets: u32, measure: SetMeasure, load_kg: f64) -> Result<(), BackendError> {
    if sets > MAX_COUNT {
        return Err(BackendError::InvalidField {
            field: "sets",
            reason: "is too large",
        });
    }

    if measure.reps().or_else(|| measure.duration_secs()).unwrap_or(0) > MAX_COUNT {
        return Err(BackendError::InvalidField {
            field: "measure",
            reason: "is too large",
        });
    }

    if sets == 0 {
        return Err(BackendError::InvalidField {
            field: "sets",
            reason: "must be at least 1",
        });
    }

    if measure == SetMeasure::Reps(0) || measure == SetMeasure::Duration(0) {
        return Err(BackendError::InvalidField {
            field: "measure",
            reason: "must be at least 1",
        });
    }

    if !load_kg.is_finite() || load_kg < 0.0 {
        return Err(BackendError::InvalidField {
            field: "load_kg",
            reason: "must be a non-negative number",
        });
    }

    Ok(())
}

/// The body of a request to add an exercise to the catalogue.
#[derive(Clone, Debug, Deserialize)]
pub struct NewExercise {
    #[serde(deserialize_with = "normalization::deserialize")]
    pub(crate) name: String,
}

impl NewExercise {
    pub(crate) fn validate(&self) -> Result<(), BackendError> {
        if self.name.is_empty() {
            Err(BackendError::InvalidField {
                field: "name",
                reason: "must not be blank",
            })
        } else {
            Ok(())
        }
    }
}
