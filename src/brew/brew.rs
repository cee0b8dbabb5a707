use serde::Serialize;
use tracing::{debug, info, warn};

use crate::display::BrewDisplay;
use crate::errors::BrewResult;
use crate::schedule::schedule::{
    BREW_COMPLETE_SECONDS, EARLY_DRAWDOWN_SECONDS, GOOD_DRAWDOWN_SECONDS, LATE_DRAWDOWN_SECONDS,
    POUR_COUNT, Schedule, calculate_from_inputs, round_grams,
};

pub const TICK_INTERVAL_MS: u64 = 1000; // One tick per elapsed second
pub const GET_READY_SECONDS: u32 = 10; // Warn this long before the next pour

pub const INITIAL_INSTRUCTION: &str = "Press Start to begin brewing";
pub const COMPLETE_INSTRUCTION: &str = "Brewing complete! Enjoy your coffee.";
pub const LATE_DRAWDOWN_INSTRUCTION: &str =
    "Might be a late drawdown, grind a tad finer next time! (6:00)";
pub const GOOD_DRAWDOWN_INSTRUCTION: &str = "Looking like a good drawdown! (5:00)";
pub const EARLY_DRAWDOWN_INSTRUCTION: &str =
    "Possibly an early drawdown, grind a little coarser next time! (4:00)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BrewState {
    Idle,
    Running,
    /// Paused. Inputs stay locked until a reset.
    Stopped,
}

impl BrewState {
    pub(crate) fn as_str(&self) -> &str {
        match self {
            BrewState::Idle => "IDLE",
            BrewState::Running => "RUNNING",
            BrewState::Stopped => "STOPPED",
        }
    }

    pub(crate) fn emoji(&self) -> &str {
        match self {
            BrewState::Idle => "☕",
            BrewState::Running => "💧",
            BrewState::Stopped => "⏸",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrewSession {
    pub elapsed_seconds: u32,
    pub state: BrewState,
}

impl BrewSession {
    pub fn is_running(&self) -> bool {
        self.state == BrewState::Running
    }
}

impl Default for BrewSession {
    fn default() -> Self {
        Self {
            elapsed_seconds: 0,
            state: BrewState::Idle,
        }
    }
}

/// Raw text of the two input fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrewInputs {
    pub coffee_weight: String,
    pub ratio: String,
}

impl BrewInputs {
    pub fn new(coffee_weight: impl Into<String>, ratio: impl Into<String>) -> Self {
        Self {
            coffee_weight: coffee_weight.into(),
            ratio: ratio.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BrewStatus {
    pub state: BrewState,
    pub elapsed_seconds: u32,
    pub clock: String,
    pub instruction: String,
    pub inputs: BrewInputs,
    pub inputs_locked: bool,
    pub active_pour: Option<usize>,
    pub schedule: Option<Schedule>,
}

/// `mm:ss`, zero padded. Minutes keep counting past 59.
pub fn format_clock(total_seconds: u32) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Instruction for `elapsed` seconds into the brew, or `None` when nothing applies
/// and the previous text should stay up.
pub fn resolve_instruction(schedule: &Schedule, elapsed: u32) -> Option<String> {
    if elapsed >= BREW_COMPLETE_SECONDS {
        return Some(COMPLETE_INSTRUCTION.to_string());
    }
    if elapsed >= LATE_DRAWDOWN_SECONDS {
        return Some(LATE_DRAWDOWN_INSTRUCTION.to_string());
    }
    if elapsed >= GOOD_DRAWDOWN_SECONDS {
        return Some(GOOD_DRAWDOWN_INSTRUCTION.to_string());
    }
    if elapsed >= EARLY_DRAWDOWN_SECONDS {
        return Some(EARLY_DRAWDOWN_INSTRUCTION.to_string());
    }

    let index = schedule.current_index(elapsed)?;
    let current = schedule.get(index)?;
    let next = schedule.get(index + 1)?;

    if next.time_offset_seconds - elapsed <= GET_READY_SECONDS {
        Some(format!(
            "Get ready for {} (adding {}g)",
            next.name,
            round_grams(next.pour_weight_grams)
        ))
    } else {
        Some(format!(
            "Current: {} | Target: ({}g)",
            current.name,
            round_grams(current.cumulative_weight_grams)
        ))
    }
}

/// The one brew session: run state, the schedule it follows and the display it drives.
pub struct BrewTimer<D: BrewDisplay> {
    session: BrewSession,
    inputs: BrewInputs,
    schedule: Option<Schedule>,
    instruction: String,
    active_pour: Option<usize>,
    display: D,
}

impl<D: BrewDisplay> BrewTimer<D> {
    pub fn new(inputs: BrewInputs, display: D) -> Self {
        Self {
            session: BrewSession::default(),
            inputs,
            schedule: None,
            instruction: INITIAL_INSTRUCTION.to_string(),
            active_pour: None,
            display,
        }
    }

    pub fn session(&self) -> BrewSession {
        self.session
    }

    #[cfg(test)]
    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    #[cfg(test)]
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    #[cfg(test)]
    pub fn display(&self) -> &D {
        &self.display
    }

    /// Inputs are locked from the first start until a reset, paused or not.
    pub fn inputs_locked(&self) -> bool {
        self.session.state != BrewState::Idle
    }

    pub fn set_inputs(&mut self, inputs: BrewInputs) {
        if self.inputs_locked() {
            debug!("Ignoring input change while a brew is in progress");
            return;
        }
        self.inputs = inputs;
    }

    /// Recompute the schedule from the current inputs. On error the previous schedule
    /// stays in place.
    pub fn calculate(&mut self) -> BrewResult<()> {
        if self.inputs_locked() {
            debug!("Ignoring calculate while a brew is in progress");
            return Ok(());
        }

        let schedule = calculate_from_inputs(&self.inputs.coffee_weight, &self.inputs.ratio)?;
        info!(
            coffee = %self.inputs.coffee_weight,
            ratio = %self.inputs.ratio,
            total_water = schedule.total_water(),
            "Calculated pour schedule"
        );

        self.display.render_schedule(schedule.pours());
        self.display.set_visualization_stage(None);
        self.schedule = Some(schedule);
        Ok(())
    }

    pub fn start(&mut self) -> BrewResult<()> {
        if self.session.is_running() {
            debug!("Start ignored, already running");
            return Ok(());
        }
        if self.schedule.is_none() {
            self.calculate()?;
        }

        self.session.state = BrewState::Running;
        self.display.set_inputs_locked(true);
        info!(
            elapsed = self.session.elapsed_seconds,
            "{} Brew {}",
            self.session.state.emoji(),
            self.session.state.as_str()
        );
        Ok(())
    }

    /// Advance one second. Does nothing unless running.
    pub fn tick(&mut self) {
        if !self.session.is_running() {
            return;
        }
        let Some(schedule) = self.schedule.as_ref() else {
            warn!("Tick while running without a schedule");
            return;
        };

        self.session.elapsed_seconds += 1;
        let elapsed = self.session.elapsed_seconds;
        self.display.set_clock_display(&format_clock(elapsed));

        let current = schedule.current_index(elapsed);
        let active_pour = current.filter(|&i| i < POUR_COUNT);
        self.display.highlight_pour(active_pour);
        if let Some(index) = current {
            self.display
                .set_visualization_stage(Some(index.min(POUR_COUNT - 1)));
            if current != schedule.current_index(elapsed - 1) {
                if let Some(event) = schedule.get(index) {
                    info!(elapsed, "Now at {}", event.name);
                }
            }
        }
        self.active_pour = active_pour;

        if let Some(text) = resolve_instruction(schedule, elapsed) {
            self.instruction = text;
        }
        self.display.set_instruction_text(&self.instruction);

        if elapsed >= BREW_COMPLETE_SECONDS {
            self.stop();
        }
    }

    pub fn stop(&mut self) {
        if !self.session.is_running() {
            debug!("Stop ignored, not running");
            return;
        }
        self.session.state = BrewState::Stopped;
        info!(
            elapsed = self.session.elapsed_seconds,
            "{} Brew {}",
            self.session.state.emoji(),
            self.session.state.as_str()
        );
    }

    /// Back to a fresh, unlocked session. The last schedule is kept.
    pub fn reset(&mut self) {
        self.stop();
        self.session = BrewSession::default();
        self.instruction = INITIAL_INSTRUCTION.to_string();
        self.active_pour = None;

        self.display.set_inputs_locked(false);
        self.display.set_clock_display(&format_clock(0));
        self.display.set_instruction_text(&self.instruction);
        self.display.highlight_pour(None);
        self.display.set_visualization_stage(None);
        info!("{} Brew reset", self.session.state.emoji());
    }

    pub fn status(&self) -> BrewStatus {
        BrewStatus {
            state: self.session.state,
            elapsed_seconds: self.session.elapsed_seconds,
            clock: format_clock(self.session.elapsed_seconds),
            instruction: self.instruction.clone(),
            inputs: self.inputs.clone(),
            inputs_locked: self.inputs_locked(),
            active_pour: self.active_pour,
            schedule: self.schedule.clone(),
        }
    }
}
