use chrono::Local;
use notify_rust::Notification;
use std::io::Write;
use tracing::warn;

use super::BrewDisplay;
use crate::schedule::schedule::{POUR_COUNT, PourEvent, round_grams};

const SEGMENT_ON: char = '■';
const SEGMENT_OFF: char = '□';

/// Renders the brew on stdout and raises a desktop notification when the instruction
/// changes mid-brew.
#[derive(Debug, Default)]
pub struct TerminalDisplay {
    notifications: bool,
    pour_names: Vec<String>,
    highlighted: Option<usize>,
    stage: Option<usize>,
    instruction: String,
    inputs_locked: bool,
    clock_line_open: bool,
}

impl TerminalDisplay {
    pub fn new(notifications: bool) -> Self {
        Self {
            notifications,
            ..Self::default()
        }
    }

    fn end_clock_line(&mut self) {
        if self.clock_line_open {
            println!();
            self.clock_line_open = false;
        }
    }
}

/// Five segments, `0..=stage` filled.
pub fn fill_bar(stage: Option<usize>) -> String {
    (0..POUR_COUNT)
        .map(|i| match stage {
            Some(s) if i <= s => SEGMENT_ON,
            _ => SEGMENT_OFF,
        })
        .collect()
}

pub fn schedule_row(pour: &PourEvent) -> String {
    format!(
        "{:<12} {:>5}   Add: {:>4}g   Total: {:>4}g",
        pour.name,
        pour.time_label(),
        round_grams(pour.pour_weight_grams),
        round_grams(pour.cumulative_weight_grams)
    )
}

fn send_notification(message: &str) -> Result<(), Box<dyn std::error::Error>> {
    Notification::new()
        .summary("Pour It - Brew Alert")
        .body(message)
        .show()?;
    Ok(())
}

impl BrewDisplay for TerminalDisplay {
    fn render_schedule(&mut self, pours: &[PourEvent]) {
        self.end_clock_line();
        self.pour_names = pours.iter().map(|p| p.name.to_string()).collect();
        self.highlighted = None;

        println!("\n--- Pour Schedule ---");
        for pour in pours {
            println!("  {}", schedule_row(pour));
        }
        println!("---------------------\n");
    }

    fn highlight_pour(&mut self, index: Option<usize>) {
        if index == self.highlighted {
            return;
        }
        self.highlighted = index;
        if let Some(name) = index.and_then(|i| self.pour_names.get(i)) {
            let name = name.clone();
            self.end_clock_line();
            println!("▶ {}", name);
        }
    }

    fn set_visualization_stage(&mut self, index: Option<usize>) {
        self.stage = index;
    }

    fn set_instruction_text(&mut self, text: &str) {
        if text == self.instruction {
            return;
        }
        self.instruction = text.to_string();
        self.end_clock_line();
        println!("[{}] {}", Local::now().format("%H:%M:%S"), text);

        if self.notifications && self.inputs_locked {
            if let Err(e) = send_notification(text) {
                warn!("Failed to send notification: {}", e);
            }
        }
    }

    fn set_clock_display(&mut self, clock: &str) {
        print!("\r⏱  {}  [{}]", clock, fill_bar(self.stage));
        let _ = std::io::stdout().flush();
        self.clock_line_open = true;
    }

    fn set_inputs_locked(&mut self, locked: bool) {
        if locked == self.inputs_locked {
            return;
        }
        self.inputs_locked = locked;
        self.end_clock_line();
        if locked {
            println!("🔒 Inputs locked until reset");
        } else {
            println!("🔓 Inputs unlocked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::schedule::calculate_pours;

    #[test]
    fn test_fill_bar() {
        assert_eq!(fill_bar(None), "□□□□□");
        assert_eq!(fill_bar(Some(0)), "■□□□□");
        assert_eq!(fill_bar(Some(4)), "■■■■■");
    }

    #[test]
    fn test_schedule_row_rounds_grams() {
        let schedule = calculate_pours(15.0, 15.5).unwrap();
        let row = schedule_row(&schedule.pours()[1]);
        assert!(row.starts_with("Second Pour"));
        assert!(row.contains("0:45"));
        // (232.5 - 30) / 4 = 50.625
        assert!(row.contains("Add:   51g"));
        assert!(row.contains("Total:   81g"));
    }

    #[test]
    fn test_tracks_highlight_and_instruction_changes() {
        let schedule = calculate_pours(20.0, 16.0).unwrap();
        let mut display = TerminalDisplay::new(false);
        display.render_schedule(schedule.pours());
        display.set_inputs_locked(true);
        display.highlight_pour(Some(2));
        display.set_instruction_text("Current: Third Pour | Target: (120g)");

        assert_eq!(display.highlighted, Some(2));
        assert_eq!(display.instruction, "Current: Third Pour | Target: (120g)");
        assert!(display.inputs_locked);
        assert_eq!(display.pour_names.len(), 5);
    }
}
