//! In-world clock, calendar and weather.
//!
//! Game time is a day counter plus minutes-of-day; it never touches the wall
//! clock. Advancing is monotonic except an explicit rewind.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Day of the in-world week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    /// Weekday for an absolute day number (day 1 is a Monday).
    pub fn for_day(day: u32) -> Self {
        Self::ALL[((day.max(1) - 1) % 7) as usize]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        }
    }
}

impl std::str::FromStr for DayOfWeek {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monday" => Ok(Self::Monday),
            "tuesday" => Ok(Self::Tuesday),
            "wednesday" => Ok(Self::Wednesday),
            "thursday" => Ok(Self::Thursday),
            "friday" => Ok(Self::Friday),
            "saturday" => Ok(Self::Saturday),
            "sunday" => Ok(Self::Sunday),
            _ => Err(DomainError::parse(format!("Unknown day of week: {}", s))),
        }
    }
}

impl std::fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse weather states, advanced on day rollover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    Clear,
    Overcast,
    Rain,
    Storm,
    Fog,
    Snow,
}

impl Weather {
    /// Pick the next day's weather from a uniform roll in 0..100.
    ///
    /// Weather tends to persist: a low roll keeps the current state.
    pub fn next(self, roll: u8) -> Self {
        if roll < 50 {
            return self;
        }
        match (self, roll) {
            (Weather::Clear, 50..=79) => Weather::Overcast,
            (Weather::Clear, _) => Weather::Fog,
            (Weather::Overcast, 50..=74) => Weather::Rain,
            (Weather::Overcast, _) => Weather::Clear,
            (Weather::Rain, 50..=69) => Weather::Overcast,
            (Weather::Rain, _) => Weather::Storm,
            (Weather::Storm, _) => Weather::Rain,
            (Weather::Fog, _) => Weather::Clear,
            (Weather::Snow, 50..=79) => Weather::Snow,
            (Weather::Snow, _) => Weather::Overcast,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Weather::Clear => "clear",
            Weather::Overcast => "overcast",
            Weather::Rain => "rain",
            Weather::Storm => "storm",
            Weather::Fog => "fog",
            Weather::Snow => "snow",
        }
    }
}

impl std::str::FromStr for Weather {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clear" => Ok(Self::Clear),
            "overcast" => Ok(Self::Overcast),
            "rain" => Ok(Self::Rain),
            "storm" => Ok(Self::Storm),
            "fog" => Ok(Self::Fog),
            "snow" => Ok(Self::Snow),
            _ => Err(DomainError::parse(format!("Unknown weather: {}", s))),
        }
    }
}

impl std::fmt::Display for Weather {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Activity class during a stretch of time; scales needs decay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityClass {
    Resting,
    Idle,
    Active,
    Strenuous,
}

impl ActivityClass {
    /// Multiplier on baseline per-hour needs decay.
    pub fn decay_multiplier(&self) -> f32 {
        match self {
            ActivityClass::Resting => 0.25,
            ActivityClass::Idle => 1.0,
            ActivityClass::Active => 1.5,
            ActivityClass::Strenuous => 2.5,
        }
    }
}

/// The session's in-world clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameClock {
    /// Day counter starting at 1.
    pub day: u32,
    /// Minutes since midnight, 0..1440.
    pub minutes_of_day: u32,
    pub weather: Weather,
}

impl GameClock {
    /// Day 1 at the given HH:MM, clear skies.
    pub fn starting_at(time: &str) -> Result<Self, DomainError> {
        Ok(Self {
            day: 1,
            minutes_of_day: parse_hhmm(time)?,
            weather: Weather::Clear,
        })
    }

    pub fn day_of_week(&self) -> DayOfWeek {
        DayOfWeek::for_day(self.day)
    }

    /// Current time as "HH:MM".
    pub fn time_string(&self) -> String {
        format!(
            "{:02}:{:02}",
            self.minutes_of_day / 60,
            self.minutes_of_day % 60
        )
    }

    /// Advance the clock by `minutes`, rolling over days.
    ///
    /// Returns the number of day boundaries crossed; the caller rolls
    /// weather once per boundary.
    pub fn advance(&mut self, minutes: u32) -> u32 {
        let total = self.minutes_of_day + minutes;
        let days_crossed = total / MINUTES_PER_DAY;
        self.minutes_of_day = total % MINUTES_PER_DAY;
        self.day += days_crossed;
        days_crossed
    }

    /// Absolute minute count since day 1 00:00, for ordering comparisons.
    pub fn absolute_minutes(&self) -> u64 {
        u64::from(self.day - 1) * u64::from(MINUTES_PER_DAY) + u64::from(self.minutes_of_day)
    }
}

impl Default for GameClock {
    fn default() -> Self {
        Self {
            day: 1,
            minutes_of_day: 8 * 60,
            weather: Weather::Clear,
        }
    }
}

/// Parse "HH:MM" into minutes since midnight.
pub fn parse_hhmm(time: &str) -> Result<u32, DomainError> {
    let (hours, minutes) = time
        .split_once(':')
        .ok_or_else(|| DomainError::parse(format!("Expected HH:MM, got '{}'", time)))?;
    let hours: u32 = hours
        .parse()
        .map_err(|_| DomainError::parse(format!("Invalid hour in '{}'", time)))?;
    let minutes: u32 = minutes
        .parse()
        .map_err(|_| DomainError::parse(format!("Invalid minute in '{}'", time)))?;
    if hours > 23 || minutes > 59 {
        return Err(DomainError::parse(format!("Time out of range: '{}'", time)));
    }
    Ok(hours * 60 + minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("00:00").unwrap(), 0);
        assert_eq!(parse_hhmm("08:30").unwrap(), 510);
        assert_eq!(parse_hhmm("23:59").unwrap(), 1439);
        assert!(parse_hhmm("24:00").is_err());
        assert!(parse_hhmm("0830").is_err());
    }

    #[test]
    fn test_advance_within_day() {
        let mut clock = GameClock::starting_at("08:00").unwrap();
        let crossed = clock.advance(90);
        assert_eq!(crossed, 0);
        assert_eq!(clock.day, 1);
        assert_eq!(clock.time_string(), "09:30");
    }

    #[test]
    fn test_advance_rolls_over_midnight() {
        let mut clock = GameClock::starting_at("23:30").unwrap();
        let crossed = clock.advance(45);
        assert_eq!(crossed, 1);
        assert_eq!(clock.day, 2);
        assert_eq!(clock.time_string(), "00:15");
    }

    #[test]
    fn test_advance_multiple_days() {
        let mut clock = GameClock::starting_at("12:00").unwrap();
        let crossed = clock.advance(3 * MINUTES_PER_DAY + 60);
        assert_eq!(crossed, 3);
        assert_eq!(clock.day, 4);
        assert_eq!(clock.time_string(), "13:00");
    }

    #[test]
    fn test_advance_is_exact_in_minutes() {
        let mut clock = GameClock::starting_at("10:15").unwrap();
        let before = clock.absolute_minutes();
        clock.advance(617);
        assert_eq!(clock.absolute_minutes(), before + 617);
    }

    #[test]
    fn test_day_of_week_cycles() {
        assert_eq!(DayOfWeek::for_day(1), DayOfWeek::Monday);
        assert_eq!(DayOfWeek::for_day(7), DayOfWeek::Sunday);
        assert_eq!(DayOfWeek::for_day(8), DayOfWeek::Monday);
    }

    #[test]
    fn test_weather_persists_on_low_roll() {
        assert_eq!(Weather::Rain.next(10), Weather::Rain);
    }

    #[test]
    fn test_weather_transitions_on_high_roll() {
        assert_eq!(Weather::Clear.next(60), Weather::Overcast);
        assert_eq!(Weather::Storm.next(90), Weather::Rain);
    }
}
