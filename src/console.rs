use crate::commands::{save_all_limits, Intent};
use crate::ws::protocol::LOAD_COUNT;
use thiserror::Error;

/// What one line of user input asks for
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// Intents to send, in order
    Dispatch(Vec<Intent>),
    RefreshNotifications,
    ExportLogs { path: Option<String> },
    Show,
    Quit,
    /// Nothing to send: a form field changed, or the line was blank
    Nothing,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsoleError {
    #[error("unknown command `{0}`; try: relay, timer, preset, limit, limits, price, clear, refresh, export, show, quit")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Line-oriented stand-in for the dashboard's controls. Holds the one field
/// that outlives a single action: the timer minutes box that presets fill in.
#[derive(Debug, Default)]
pub struct Console {
    timer_minutes: String,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timer_minutes(&self) -> &str {
        &self.timer_minutes
    }

    pub fn parse(&mut self, line: &str) -> Result<UiEvent, ConsoleError> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(UiEvent::Nothing);
        };
        let args: Vec<&str> = words.collect();

        match command.to_ascii_lowercase().as_str() {
            "relay" => {
                const USAGE: &str = "relay <1-4> on|off";
                let [id, state] = args[..] else {
                    return Err(ConsoleError::Usage(USAGE));
                };
                let load_id = load_id(id, false).ok_or(ConsoleError::Usage(USAGE))?;
                let on = switch(state).ok_or(ConsoleError::Usage(USAGE))?;
                Ok(UiEvent::Dispatch(vec![Intent::ToggleRelay { load_id, on }]))
            }
            "preset" => {
                let [minutes] = args[..] else {
                    return Err(ConsoleError::Usage("preset <minutes>"));
                };
                self.timer_minutes = minutes.to_owned();
                Ok(UiEvent::Nothing)
            }
            "timer" => {
                const USAGE: &str = "timer <0-4> [minutes]";
                let (load, minutes) = match args[..] {
                    [load] => (load, None),
                    [load, minutes] => (load, Some(minutes)),
                    _ => return Err(ConsoleError::Usage(USAGE)),
                };
                let selected_load = load_id(load, true).ok_or(ConsoleError::Usage(USAGE))?;
                if let Some(minutes) = minutes {
                    self.timer_minutes = minutes.to_owned();
                }
                Ok(UiEvent::Dispatch(vec![Intent::ApplyTimer {
                    selected_load,
                    minutes_input: self.timer_minutes.clone(),
                }]))
            }
            "limit" => {
                const USAGE: &str = "limit <1-4> [hours]";
                let (id, hours) = match args[..] {
                    [id] => (id, ""),
                    [id, hours] => (id, hours),
                    _ => return Err(ConsoleError::Usage(USAGE)),
                };
                let load_id = load_id(id, false).ok_or(ConsoleError::Usage(USAGE))?;
                Ok(UiEvent::Dispatch(vec![Intent::SaveLimit {
                    load_id,
                    hours_input: hours.to_owned(),
                }]))
            }
            "limits" => {
                if args.len() > LOAD_COUNT {
                    return Err(ConsoleError::Usage("limits [h1 h2 h3 h4]"));
                }
                let mut hours = [""; LOAD_COUNT];
                for (slot, value) in hours.iter_mut().zip(args.iter()) {
                    *slot = *value;
                }
                Ok(UiEvent::Dispatch(save_all_limits(hours)))
            }
            "price" => {
                if args.len() > 1 {
                    return Err(ConsoleError::Usage("price [value]"));
                }
                Ok(UiEvent::Dispatch(vec![Intent::SavePrice {
                    price_input: args.first().copied().unwrap_or("").to_owned(),
                }]))
            }
            "clear" => Ok(UiEvent::Dispatch(vec![Intent::ClearNotifications])),
            "refresh" => Ok(UiEvent::RefreshNotifications),
            "export" => Ok(UiEvent::ExportLogs {
                path: args.first().map(|p| (*p).to_owned()),
            }),
            "show" => Ok(UiEvent::Show),
            "quit" | "exit" => Ok(UiEvent::Quit),
            other => Err(ConsoleError::Unknown(other.to_owned())),
        }
    }
}

fn load_id(input: &str, allow_selected: bool) -> Option<u8> {
    let id = input.parse::<u8>().ok()?;
    let min = if allow_selected { 0 } else { 1 };
    (min..=LOAD_COUNT as u8).contains(&id).then_some(id)
}

fn switch(input: &str) -> Option<bool> {
    match input.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Some(true),
        "off" | "0" | "false" => Some(false),
        _ => None,
    }
}
