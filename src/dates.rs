use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::Date;

use crate::errors::BackendError;

/// The canonical date format used in requests, responses and blob keys.
pub const ISO_FORMAT: &str = "%Y-%m-%d";

/// The day-first format in which older session logs were written.
pub const DAY_FIRST_FORMAT: &str = "%d/%m/%Y";

/// Parses a date in ISO or day-first form.
///
/// ```
/// use tracker::dates::parse_date;
/// assert_eq!(parse_date("2024-06-15").unwrap(), parse_date("15/06/2024").unwrap());
/// ```
pub fn parse_date(s: impl AsRef<str>) -> Result<Date, BackendError> {
    let s = s.as_ref().trim();

    Date::parse(s, ISO_FORMAT)
        .or_else(|_| Date::parse(s, DAY_FIRST_FORMAT))
        .map_err(|_| BackendError::InvalidDate(s.to_owned()))
}

pub fn format_date(date: Date) -> String {
    date.format(ISO_FORMAT)
}

/// Whole years between `date_of_birth` and `today`, one less if this
/// year's birthday is still ahead.
pub fn age_on(date_of_birth: Date, today: Date) -> i32 {
    let years = today.year() - date_of_birth.year();

    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years - 1
    } else {
        years
    }
}

/// A calendar month.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct YearMonth {
    year: i32,
    month: u8,
}

impl YearMonth {
    pub fn new(year: i32, month: u8) -> Result<Self, BackendError> {
        if (1..=12).contains(&month) {
            Ok(YearMonth { year, month })
        } else {
            Err(BackendError::InvalidMonth(format!("{}-{}", year, month)))
        }
    }

    pub fn of(date: Date) -> Self {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    /// The calendar month before this one; January rolls back into
    /// December of the prior year.
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            YearMonth {
                year: self.year - 1,
                month: 12,
            }
        } else {
            YearMonth {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn contains(&self, date: Date) -> bool {
        YearMonth::of(date) == *self
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BackendError::InvalidMonth(s.to_owned());
        let mut parts = s.trim().splitn(2, '-');

        match (parts.next(), parts.next()) {
            (Some(year), Some(month)) => {
                let year: i32 = year.parse().map_err(|_| invalid())?;
                let month: u8 = month.parse().map_err(|_| invalid())?;

                YearMonth::new(year, month).map_err(|_| invalid())
            }
            _ => Err(invalid()),
        }
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// (De)serializes a [`Date`] as an ISO string; for `#[serde(with = ...)]`.
pub mod iso {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
    where D: Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        super::parse_date(&s).map_err(serde::de::Error::custom)
    }
}
