use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::debug;

use crate::brew::brew::{BrewInputs, BrewStatus, BrewTimer, TICK_INTERVAL_MS};
use crate::config::text_or_number;
use crate::display::BrewDisplay;
use crate::errors::{BrewError, BrewResult};

/// The triggers a user can pull, from the console or over the socket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlCommand {
    SetInputs {
        #[serde(deserialize_with = "text_or_number")]
        coffee_weight: String,
        #[serde(deserialize_with = "text_or_number")]
        ratio: String,
    },
    Calculate,
    Start,
    Stop,
    Reset,
    Status,
}

#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub success: bool,
    pub message: Option<String>,
    pub status: Option<BrewStatus>,
}

impl ControlResponse {
    pub fn from_result(result: BrewResult<BrewStatus>) -> Self {
        match result {
            Ok(status) => Self {
                success: true,
                message: None,
                status: Some(status),
            },
            Err(e) => Self {
                success: false,
                message: Some(e.to_string()),
                status: None,
            },
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            status: None,
        }
    }
}

/// What one console line asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleAction {
    Run(Vec<ControlCommand>),
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub const CONSOLE_HELP: &str = "Commands: start | stop | reset | calc [coffee ratio] | set <coffee> <ratio> | status | quit";

pub fn parse_console_line(line: &str) -> ConsoleAction {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((head, args)) = words.split_first() else {
        return ConsoleAction::Empty;
    };

    let set_inputs = |args: &[&str]| match args {
        [coffee, ratio] => Some(ControlCommand::SetInputs {
            coffee_weight: coffee.to_string(),
            ratio: ratio.to_string(),
        }),
        _ => None,
    };

    match (head.to_ascii_lowercase().as_str(), args) {
        ("start", []) => ConsoleAction::Run(vec![ControlCommand::Start]),
        ("stop", []) => ConsoleAction::Run(vec![ControlCommand::Stop]),
        ("reset", []) => ConsoleAction::Run(vec![ControlCommand::Reset]),
        ("status", []) => ConsoleAction::Run(vec![ControlCommand::Status]),
        ("calc" | "calculate", []) => ConsoleAction::Run(vec![ControlCommand::Calculate]),
        ("calc" | "calculate", args) => match set_inputs(args) {
            Some(cmd) => ConsoleAction::Run(vec![cmd, ControlCommand::Calculate]),
            None => ConsoleAction::Unknown(line.trim().to_string()),
        },
        ("set", args) => match set_inputs(args) {
            Some(cmd) => ConsoleAction::Run(vec![cmd]),
            None => ConsoleAction::Unknown(line.trim().to_string()),
        },
        ("help" | "?", _) => ConsoleAction::Help,
        ("quit" | "exit" | "q", _) => ConsoleAction::Quit,
        _ => ConsoleAction::Unknown(line.trim().to_string()),
    }
}

/// Shared handle on the brew timer. Ticks and control calls take the same lock, so
/// each one sees and leaves a consistent session.
pub struct BrewController<D: BrewDisplay> {
    timer: Arc<Mutex<BrewTimer<D>>>,
    rearm: Arc<Notify>,
}

impl<D: BrewDisplay> Clone for BrewController<D> {
    fn clone(&self) -> Self {
        Self {
            timer: Arc::clone(&self.timer),
            rearm: Arc::clone(&self.rearm),
        }
    }
}

impl<D: BrewDisplay> BrewController<D> {
    pub fn new(timer: BrewTimer<D>) -> Self {
        Self {
            timer: Arc::new(Mutex::new(timer)),
            rearm: Arc::new(Notify::new()),
        }
    }

    // Poisoned lock: keep using the session as it stands.
    fn lock(&self) -> MutexGuard<'_, BrewTimer<D>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn apply(&self, command: ControlCommand) -> BrewResult<BrewStatus> {
        self.apply_all(vec![command])
    }

    /// Run a batch under one lock, so no tick lands between its commands. Stops at the
    /// first error; earlier commands in the batch stay applied.
    pub fn apply_all(&self, commands: Vec<ControlCommand>) -> BrewResult<BrewStatus> {
        let mut timer = self.lock();
        let was_running = timer.session().is_running();

        let result = commands
            .into_iter()
            .try_for_each(|command| Self::run_command(&mut timer, command));

        if !was_running && timer.session().is_running() {
            self.rearm.notify_one();
        }
        result.map(|()| timer.status())
    }

    fn run_command(timer: &mut BrewTimer<D>, command: ControlCommand) -> BrewResult<()> {
        debug!(?command, "Applying control command");
        match command {
            ControlCommand::SetInputs {
                coffee_weight,
                ratio,
            } => timer.set_inputs(BrewInputs::new(coffee_weight, ratio)),
            ControlCommand::Calculate => timer.calculate()?,
            ControlCommand::Start => timer.start()?,
            ControlCommand::Stop => timer.stop(),
            ControlCommand::Reset => timer.reset(),
            ControlCommand::Status => {}
        }
        Ok(())
    }

    pub fn status(&self) -> BrewStatus {
        self.lock().status()
    }

    pub fn tick(&self) {
        self.lock().tick();
    }

    /// Tick once per second forever. The period restarts whenever the brew enters
    /// running, so the first tick comes a full second after start.
    pub async fn run_ticker(self) {
        let mut timer_interval = interval(Duration::from_millis(TICK_INTERVAL_MS));
        timer_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer_interval.tick().await;

        loop {
            // Re-arm wins over a tick that is due at the same instant as start
            tokio::select! {
                biased;
                _ = self.rearm.notified() => timer_interval.reset(),
                _ = timer_interval.tick() => self.tick(),
            }
        }
    }
}

/// Read commands from stdin until `quit` or end of input.
pub async fn run_console<D: BrewDisplay>(controller: BrewController<D>) -> BrewResult<()> {
    println!("{}", CONSOLE_HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match parse_console_line(&line) {
            ConsoleAction::Run(commands) => {
                let show_status = commands == [ControlCommand::Status];
                match controller.apply_all(commands) {
                    Ok(status) if show_status => print_status(&status),
                    Ok(_) => {}
                    Err(e @ BrewError::InvalidInput { .. }) => eprintln!("\n⚠️  {}", e),
                    Err(e) => return Err(e),
                }
            }
            ConsoleAction::Help => println!("{}", CONSOLE_HELP),
            ConsoleAction::Quit => break,
            ConsoleAction::Empty => {}
            ConsoleAction::Unknown(text) => {
                eprintln!("Unknown command: {}\n{}", text, CONSOLE_HELP)
            }
        }
    }
    Ok(())
}

fn print_status(status: &BrewStatus) {
    println!("\n--- Brew Status ---");
    println!("State: {:?}  Clock: {}", status.state, status.clock);
    println!(
        "Coffee: {}g  Ratio: 1:{}  Inputs locked: {}",
        status.inputs.coffee_weight, status.inputs.ratio, status.inputs_locked
    );
    println!("{}", status.instruction);
    println!("-------------------\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brew::brew::BrewState;
    use crate::brew::brew::tests::RecordingDisplay;

    fn controller(coffee: &str, ratio: &str) -> BrewController<RecordingDisplay> {
        BrewController::new(BrewTimer::new(
            BrewInputs::new(coffee, ratio),
            RecordingDisplay::default(),
        ))
    }

    #[test]
    fn test_decode_json_commands() {
        let cmd: ControlCommand = serde_json::from_str(r#"{"type":"start"}"#).unwrap();
        assert_eq!(cmd, ControlCommand::Start);

        let cmd: ControlCommand =
            serde_json::from_str(r#"{"type":"set_inputs","coffee_weight":18,"ratio":"15.5"}"#)
                .unwrap();
        assert_eq!(
            cmd,
            ControlCommand::SetInputs {
                coffee_weight: "18".to_string(),
                ratio: "15.5".to_string(),
            }
        );

        assert!(serde_json::from_str::<ControlCommand>(r#"{"type":"brew_faster"}"#).is_err());
    }

    #[test]
    fn test_parse_console_lines() {
        assert_eq!(
            parse_console_line(" Start "),
            ConsoleAction::Run(vec![ControlCommand::Start])
        );
        assert_eq!(
            parse_console_line("calc 18 15"),
            ConsoleAction::Run(vec![
                ControlCommand::SetInputs {
                    coffee_weight: "18".to_string(),
                    ratio: "15".to_string(),
                },
                ControlCommand::Calculate,
            ])
        );
        assert_eq!(parse_console_line(""), ConsoleAction::Empty);
        assert_eq!(parse_console_line("quit"), ConsoleAction::Quit);
        assert_eq!(
            parse_console_line("set 18"),
            ConsoleAction::Unknown("set 18".to_string())
        );
        assert_eq!(
            parse_console_line("stop now"),
            ConsoleAction::Unknown("stop now".to_string())
        );
    }

    #[test]
    fn test_apply_reports_status() {
        let controller = controller("20", "16");

        let status = controller.apply(ControlCommand::Start).unwrap();
        assert_eq!(status.state, BrewState::Running);
        assert!(status.inputs_locked);
        assert_eq!(status.schedule.map(|s| s.total_water()), Some(320.0));

        controller.tick();
        controller.tick();
        let status = controller.apply(ControlCommand::Stop).unwrap();
        assert_eq!(status.state, BrewState::Stopped);
        assert_eq!(status.clock, "00:02");
        assert_eq!(status.active_pour, Some(0));
    }

    #[test]
    fn test_invalid_inputs_surface_as_error() {
        let controller = controller("20", "16");
        controller.apply(ControlCommand::Calculate).unwrap();

        let result = controller.apply_all(vec![
            ControlCommand::SetInputs {
                coffee_weight: "".to_string(),
                ratio: "16".to_string(),
            },
            ControlCommand::Calculate,
        ]);

        assert!(matches!(result, Err(BrewError::InvalidInput { .. })));
        let status = controller.status();
        assert_eq!(status.schedule.map(|s| s.total_water()), Some(320.0));

        let response = ControlResponse::from_result(controller.apply(ControlCommand::Calculate));
        assert!(!response.success);
        assert!(response.message.unwrap().contains("coffee weight"));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let controller = controller("20", "16");
        let response = ControlResponse::from_result(controller.apply(ControlCommand::Status));
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"state\":\"idle\""));
        assert!(json.contains("\"clock\":\"00:00\""));
        assert!(json.contains("\"schedule\":null"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_counts_seconds_after_start() {
        let controller = controller("20", "16");
        controller.apply(ControlCommand::Start).unwrap();
        let ticker = tokio::spawn(controller.clone().run_ticker());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(controller.status().elapsed_seconds, 3);

        controller.apply(ControlCommand::Stop).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(controller.status().elapsed_seconds, 3);

        ticker.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_on_idle_tick_boundary_waits_full_second() {
        let period = Duration::from_millis(TICK_INTERVAL_MS);
        let controller = controller("20", "16");
        let mut boundary = tokio::time::Instant::now() + period;
        let ticker = tokio::spawn(controller.clone().run_ticker());

        for _ in 0..20 {
            // Idle ticks keep firing every period; start right on one of them
            tokio::time::sleep_until(boundary).await;
            controller.apply(ControlCommand::Start).unwrap();
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
            assert_eq!(controller.status().elapsed_seconds, 0);

            tokio::time::sleep(Duration::from_millis(999)).await;
            assert_eq!(controller.status().elapsed_seconds, 0);
            tokio::time::sleep(Duration::from_millis(2)).await;
            assert_eq!(controller.status().elapsed_seconds, 1);

            controller.apply(ControlCommand::Reset).unwrap();
            boundary += period * 2;
        }

        ticker.abort();
    }

    #[test]
    fn test_batch_runs_as_one_step() {
        let controller = controller("20", "16");

        let status = controller
            .apply_all(vec![
                ControlCommand::SetInputs {
                    coffee_weight: "18".to_string(),
                    ratio: "15".to_string(),
                },
                ControlCommand::Calculate,
                ControlCommand::Start,
            ])
            .unwrap();

        assert_eq!(status.state, BrewState::Running);
        assert_eq!(status.elapsed_seconds, 0);
        assert_eq!(status.schedule.map(|s| s.total_water()), Some(270.0));

        let result = controller.apply_all(vec![ControlCommand::Stop, ControlCommand::Reset]);
        assert_eq!(result.unwrap().state, BrewState::Idle);
    }

    #[test]
    fn test_failed_batch_keeps_earlier_commands() {
        let controller = controller("20", "16");

        let result = controller.apply_all(vec![
            ControlCommand::SetInputs {
                coffee_weight: "x".to_string(),
                ratio: "15".to_string(),
            },
            ControlCommand::Start,
            ControlCommand::Stop,
        ]);

        assert!(matches!(result, Err(BrewError::InvalidInput { .. })));
        let status = controller.status();
        assert_eq!(status.state, BrewState::Idle);
        assert_eq!(status.inputs, BrewInputs::new("x", "15"));
    }
}
