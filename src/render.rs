//! Pure projection of dashboard state into display strings.
//!
//! Nothing here mutates state; the runtime calls [`project`] after every update
//! and prints the result.

use crate::notifications::format_entry;
use crate::session::DashboardState;
use crate::telemetry::{AggregateTotals, LoadState};
use crate::ws::connection::ConnectionState;
use chrono::{DateTime, TimeZone};
use std::fmt::{self, Display};

#[derive(Debug, Clone, PartialEq)]
pub struct LoadTile {
    pub id: u8,
    pub voltage: String,
    pub current: String,
    pub power: String,
    pub energy: String,
    pub state: &'static str,
}

impl LoadTile {
    fn from_state(load: &LoadState) -> Self {
        Self {
            id: load.id,
            voltage: volts(load.voltage),
            current: amps(load.current),
            power: watts(load.power),
            energy: watt_hours(load.energy),
            state: if load.relay_on { "ON" } else { "OFF" },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TotalsView {
    pub avg_voltage: String,
    pub current: String,
    pub power: String,
    pub energy: String,
}

impl From<&AggregateTotals> for TotalsView {
    fn from(totals: &AggregateTotals) -> Self {
        Self {
            avg_voltage: volts(totals.avg_voltage),
            current: amps(totals.total_current),
            power: watts(totals.total_power),
            energy: watt_hours(totals.total_energy),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub header: String,
    pub connection: &'static str,
    pub tiles: Vec<LoadTile>,
    pub totals: TotalsView,
    /// Empty until a price is known
    pub price: String,
    pub notifications: Vec<String>,
}

pub fn project<Tz>(
    state: &DashboardState,
    connection: ConnectionState,
    device_host: &str,
    now: &DateTime<Tz>,
) -> DashboardView
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let tz = now.timezone();

    DashboardView {
        header: format!("{}  |  device {}", format_clock(now), device_host),
        connection: match connection {
            ConnectionState::Opening => "connecting",
            ConnectionState::Open => "live",
            ConnectionState::Closed => "disconnected",
        },
        tiles: state
            .reconciler
            .loads()
            .iter()
            .map(LoadTile::from_state)
            .collect(),
        totals: TotalsView::from(state.reconciler.totals()),
        price: state.unit_price.map(|p| p.to_string()).unwrap_or_default(),
        notifications: state
            .notifications
            .entries()
            .iter()
            .map(|entry| format_entry(entry, &tz))
            .collect(),
    }
}

/// `Sunday, 19/10/2026, 3:04:05 PM`
pub fn format_clock<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    now.format("%A, %d/%m/%Y, %-I:%M:%S %p").to_string()
}

fn volts(v: f64) -> String {
    format!("{v:.2} V")
}

fn amps(a: f64) -> String {
    format!("{a:.3} A")
}

fn watts(w: f64) -> String {
    format!("{w:.2} W")
}

fn watt_hours(wh: f64) -> String {
    format!("{wh:.2} Wh")
}

impl Display for DashboardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}  [{}]", self.header, self.connection)?;
        for tile in &self.tiles {
            writeln!(
                f,
                "Load {}: {:>10} {:>10} {:>11} {:>12}  {}",
                tile.id, tile.voltage, tile.current, tile.power, tile.energy, tile.state
            )?;
        }
        writeln!(
            f,
            "Total:  {:>10} {:>10} {:>11} {:>12}",
            self.totals.avg_voltage, self.totals.current, self.totals.power, self.totals.energy
        )?;
        writeln!(f, "Unit price: {}", self.price)?;
        writeln!(f, "Notifications ({}):", self.notifications.len())?;
        for line in &self.notifications {
            writeln!(f, "  {line}")?;
        }
        Ok(())
    }
}
