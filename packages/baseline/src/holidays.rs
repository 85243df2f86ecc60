//! Fixed-date public holiday calendars.
//!
//! Only holidays that fall on the same calendar day every year are listed.
//! Movable feasts are out of reach without an ecclesiastical calendar and
//! are simply absent.

use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HolidayError {
    #[error("no holiday calendar for country {0:?}")]
    UnknownCountry(String),
}

/// (month, day) pairs.
type Days = &'static [(u32, u32)];

const NEW_YEAR: (u32, u32) = (1, 1);
const LABOUR_DAY: (u32, u32) = (5, 1);
const CHRISTMAS: (u32, u32) = (12, 25);
const BOXING_DAY: (u32, u32) = (12, 26);

/// (alpha-2, alpha-3, fixed holidays)
const CALENDARS: &[(&str, &str, Days)] = &[
    ("AT", "AUT", &[NEW_YEAR, (1, 6), LABOUR_DAY, (8, 15), (10, 26), (11, 1), (12, 8), CHRISTMAS, BOXING_DAY]),
    ("BE", "BEL", &[NEW_YEAR, LABOUR_DAY, (7, 21), (8, 15), (11, 1), (11, 11), CHRISTMAS]),
    ("CH", "CHE", &[NEW_YEAR, (8, 1), CHRISTMAS]),
    ("DE", "DEU", &[NEW_YEAR, LABOUR_DAY, (10, 3), CHRISTMAS, BOXING_DAY]),
    ("ES", "ESP", &[NEW_YEAR, (1, 6), LABOUR_DAY, (8, 15), (10, 12), (11, 1), (12, 6), (12, 8), CHRISTMAS]),
    ("FR", "FRA", &[NEW_YEAR, LABOUR_DAY, (5, 8), (7, 14), (8, 15), (11, 1), (11, 11), CHRISTMAS]),
    ("GB", "GBR", &[NEW_YEAR, CHRISTMAS, BOXING_DAY]),
    ("IT", "ITA", &[NEW_YEAR, (1, 6), (4, 25), LABOUR_DAY, (6, 2), (8, 15), (11, 1), (12, 8), CHRISTMAS, BOXING_DAY]),
    ("NL", "NLD", &[NEW_YEAR, (4, 27), CHRISTMAS, BOXING_DAY]),
    ("PT", "PRT", &[NEW_YEAR, (4, 25), LABOUR_DAY, (6, 10), (8, 15), (10, 5), (11, 1), (12, 1), (12, 8), CHRISTMAS]),
    ("SE", "SWE", &[NEW_YEAR, (1, 6), LABOUR_DAY, (6, 6), CHRISTMAS, BOXING_DAY]),
    ("US", "USA", &[NEW_YEAR, (6, 19), (7, 4), (11, 11), CHRISTMAS]),
];

/// Holidays of one country.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HolidayCalendar {
    country: &'static str,
    days: Days,
}

impl HolidayCalendar {
    /// Look up a calendar by ISO 3166 alpha-2 or alpha-3 code, case-insensitive.
    pub fn for_country(iso_code: &str) -> Result<Self, HolidayError> {
        let code = iso_code.trim();
        CALENDARS
            .iter()
            .find(|(alpha2, alpha3, _)| {
                code.eq_ignore_ascii_case(alpha2) || code.eq_ignore_ascii_case(alpha3)
            })
            .map(|&(alpha2, _, days)| Self {
                country: alpha2,
                days,
            })
            .ok_or_else(|| HolidayError::UnknownCountry(iso_code.to_string()))
    }

    /// Alpha-2 code of the calendar.
    pub fn country(&self) -> &'static str {
        self.country
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.days.contains(&(date.month(), date.day()))
    }
}
