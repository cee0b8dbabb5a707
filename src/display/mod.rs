pub mod terminal;

use crate::schedule::schedule::PourEvent;

/// Everything the brew timer tells the outside world. Implementations only render;
/// they never call back into the timer.
pub trait BrewDisplay {
    /// Called after every successful calculation with the five pours.
    fn render_schedule(&mut self, pours: &[PourEvent]);
    fn highlight_pour(&mut self, index: Option<usize>);
    /// Drive the 5-segment fill indicator; segments `0..=index` are lit.
    fn set_visualization_stage(&mut self, index: Option<usize>);
    fn set_instruction_text(&mut self, text: &str);
    fn set_clock_display(&mut self, clock: &str);
    fn set_inputs_locked(&mut self, locked: bool);
}
