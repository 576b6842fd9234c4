use serde::{Deserialize, Serialize};
use wayfarer_common::Color;

const SECS_PER_DAY: i64 = 60 * 60 * 24;

/// In-day window (seconds) of the recurring morning dew event.
const MANTLE_WINDOW: (i64, i64) = (4 * 3600 + 45 * 60, 7 * 3600 + 15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn from_index(i: i32) -> Option<Season> {
        match i {
            0 => Some(Season::Spring),
            1 => Some(Season::Summer),
            2 => Some(Season::Autumn),
            3 => Some(Season::Winter),
            _ => None,
        }
    }

    /// Real-world days a full season lasts.
    pub fn length_days(self) -> f64 {
        match self {
            Season::Summer => 30.0,
            _ => 10.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Autumn => "Autumn",
            Season::Winter => "Winter",
        }
    }
}

/// Latest astronomy snapshot from the server.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Astronomy {
    pub day_time: f64,
    pub moon_phase: f64,
    pub year_time: f64,
    pub night: bool,
    pub moon_color: Color,
    pub season_index: i32,
    pub season_progress: f64,
    pub season_day: f64,
}

impl Astronomy {
    /// Defaults for servers that do not send the season fields.
    pub const DEFAULT_SEASON_INDEX: i32 = 1;
    pub const DEFAULT_SEASON_PROGRESS: f64 = 0.5;
    pub const DEFAULT_SEASON_DAY: f64 = 0.5;

    pub fn season(&self) -> Option<Season> {
        Season::from_index(self.season_index)
    }

    /// Whole real-world days until the season changes.
    pub fn days_left(&self) -> i64 {
        let len = self.season().map_or(10.0, Season::length_days);
        ((1.0 - self.season_progress) * len).ceil() as i64
    }

    /// Human-readable in-world date and time for `globtime`.
    pub fn describe(&self, globtime: f64) -> String {
        let secs = globtime.floor() as i64;
        let day = secs.div_euclid(SECS_PER_DAY);
        let in_day = secs.rem_euclid(SECS_PER_DAY);
        let hours = in_day / 3600;
        let mins = (in_day % 3600) / 60;
        let mut text = match self.season() {
            Some(season) => {
                let left = self.days_left();
                let unit = if left == 1 { "day" } else { "days" };
                format!(
                    "Day {day}, {hours:02}:{mins:02}. {} ({left} RL {unit} left).",
                    season.name()
                )
            }
            None => "Unknown Season".to_string(),
        };
        if (MANTLE_WINDOW.0..=MANTLE_WINDOW.1).contains(&in_day) {
            text.push_str(" (Dewy Lady's Mantle)");
        }
        text
    }
}
