use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::errors::{BrewError, BrewResult};

pub const POUR_COUNT: usize = 5; // Bloom + four main pours
pub const EVENT_COUNT: usize = 9; // Pours + three drawdown phases + completion

pub const EARLY_DRAWDOWN_SECONDS: u32 = 210;
pub const GOOD_DRAWDOWN_SECONDS: u32 = 240;
pub const LATE_DRAWDOWN_SECONDS: u32 = 300;
pub const BREW_COMPLETE_SECONDS: u32 = 360;

/// Names and offsets of the fixed recipe. Only the weights depend on the inputs.
const RECIPE: [(&str, u32); EVENT_COUNT] = [
    ("Bloom", 0),
    ("Second Pour", 45),
    ("Third Pour", 90),
    ("Fourth Pour", 150),
    ("Final Pour", 210),
    ("Early Drawdown", 211),
    ("Good Drawdown", GOOD_DRAWDOWN_SECONDS),
    ("Late Drawdown", LATE_DRAWDOWN_SECONDS),
    ("Brewing Complete", BREW_COMPLETE_SECONDS),
];

// Longest leading decimal number, the way a browser number field is read.
static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid number pattern")
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PourEvent {
    pub name: &'static str,
    pub time_offset_seconds: u32,
    pub pour_weight_grams: f64,
    pub cumulative_weight_grams: f64,
}

impl PourEvent {
    /// Offset as `m:ss`, e.g. `3:31`.
    pub fn time_label(&self) -> String {
        format!(
            "{}:{:02}",
            self.time_offset_seconds / 60,
            self.time_offset_seconds % 60
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Schedule {
    events: [PourEvent; EVENT_COUNT],
}

impl Schedule {
    #[cfg(test)]
    pub fn events(&self) -> &[PourEvent] {
        &self.events
    }

    /// The five entries that actually add water.
    pub fn pours(&self) -> &[PourEvent] {
        &self.events[..POUR_COUNT]
    }

    pub fn total_water(&self) -> f64 {
        self.events[EVENT_COUNT - 1].cumulative_weight_grams
    }

    /// Index of the event whose interval `[t[i], t[i+1])` contains `elapsed`; the last
    /// event once `elapsed` reaches its offset. `None` before the first event.
    pub fn current_index(&self, elapsed: u32) -> Option<usize> {
        let last = self.events.len() - 1;
        for (i, pair) in self.events.windows(2).enumerate() {
            if elapsed >= pair[0].time_offset_seconds && elapsed < pair[1].time_offset_seconds {
                return Some(i);
            }
        }
        if elapsed >= self.events[last].time_offset_seconds {
            Some(last)
        } else {
            None
        }
    }

    pub fn get(&self, index: usize) -> Option<&PourEvent> {
        self.events.get(index)
    }
}

/// Build the pour schedule for `coffee_weight` grams at `ratio` grams of water per gram.
///
/// The bloom is twice the coffee weight and the remaining water is split over four
/// equal pours. A ratio below 2 yields negative pours; that is passed through as is.
pub fn calculate_pours(coffee_weight: f64, ratio: f64) -> BrewResult<Schedule> {
    ensure_finite("coffee weight", coffee_weight)?;
    ensure_finite("ratio", ratio)?;

    let bloom_weight = coffee_weight * 2.0;
    let total_water = coffee_weight * ratio;
    let remaining_water = total_water - bloom_weight;
    let additional_pour_weight = remaining_water / 4.0;

    let events = std::array::from_fn(|i| {
        let (name, time_offset_seconds) = RECIPE[i];
        let (pour_weight_grams, cumulative_weight_grams) = match i {
            0 => (bloom_weight, bloom_weight),
            1..=3 => (
                additional_pour_weight,
                bloom_weight + i as f64 * additional_pour_weight,
            ),
            // Final pour lands exactly on the total, no summing drift
            4 => (additional_pour_weight, total_water),
            _ => (0.0, total_water),
        };
        PourEvent {
            name,
            time_offset_seconds,
            pour_weight_grams,
            cumulative_weight_grams,
        }
    });

    Ok(Schedule { events })
}

/// Parse the text of an input field. Trailing garbage is ignored (`"20g"` is 20).
pub fn parse_input(field: &'static str, raw: &str) -> BrewResult<f64> {
    let invalid = || BrewError::InvalidInput {
        field,
        value: raw.to_string(),
    };

    let number = LEADING_NUMBER.find(raw).ok_or_else(invalid)?;
    let value: f64 = number.as_str().trim().parse().map_err(|_| invalid())?;
    if value.is_finite() { Ok(value) } else { Err(invalid()) }
}

/// Parse both fields and build the schedule.
pub fn calculate_from_inputs(coffee_weight: &str, ratio: &str) -> BrewResult<Schedule> {
    let coffee_weight = parse_input("coffee weight", coffee_weight)?;
    let ratio = parse_input("ratio", ratio)?;
    calculate_pours(coffee_weight, ratio)
}

/// Grams for display, rounded half-up.
pub fn round_grams(weight: f64) -> i64 {
    (weight + 0.5).floor() as i64
}

fn ensure_finite(field: &'static str, value: f64) -> BrewResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(BrewError::InvalidInput {
            field,
            value: value.to_string(),
        })
    }
}
