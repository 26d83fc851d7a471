use crate::ws::protocol::{LoadRecord, StateFrame, LOAD_COUNT};
use thiserror::Error;
use tracing::debug;

/// Last reported state of one load
#[derive(Debug, Clone, PartialEq)]
pub struct LoadState {
    pub id: u8,
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    /// Cumulative Wh counter owned by the device
    pub energy: f64,
    pub relay_on: bool,
}

impl LoadState {
    fn new(id: u8) -> Self {
        Self {
            id,
            voltage: 0.0,
            current: 0.0,
            power: 0.0,
            energy: 0.0,
            relay_on: false,
        }
    }

    fn overwrite(&mut self, record: &LoadRecord) {
        self.voltage = record.voltage;
        self.current = record.current;
        self.power = record.power;
        self.energy = record.energy;
        self.relay_on = record.relay;
    }
}

/// Totals across the loads carried by the last accepted frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateTotals {
    /// Mean over the frame's records, not over all four loads
    pub avg_voltage: f64,
    pub total_current: f64,
    pub total_power: f64,
    pub total_energy: f64,
}

impl AggregateTotals {
    /// Sums over `records` as given; a load listed twice counts twice.
    pub fn from_records(records: &[LoadRecord]) -> Self {
        let mut totals = AggregateTotals::default();
        if records.is_empty() {
            return totals;
        }

        let mut voltage_sum = 0.0;
        for record in records {
            voltage_sum += record.voltage;
            totals.total_current += record.current;
            totals.total_power += record.power;
            totals.total_energy += record.energy;
        }
        totals.avg_voltage = voltage_sum / records.len() as f64;
        totals
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconcileError {
    #[error("state frame carries no loads")]
    EmptyFrame,
}

/// Owns the load table and totals. The only writer of either.
#[derive(Debug, Clone)]
pub struct Reconciler {
    loads: [LoadState; LOAD_COUNT],
    totals: AggregateTotals,
    frames_applied: u64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            loads: std::array::from_fn(|i| LoadState::new(i as u8 + 1)),
            totals: AggregateTotals::default(),
            frames_applied: 0,
        }
    }

    /// Merge a decoded state frame. Fields are last-write-wins per load; loads
    /// missing from the frame keep their previous values. Totals are replaced
    /// in one step.
    pub fn apply(&mut self, frame: &StateFrame) -> Result<&AggregateTotals, ReconcileError> {
        if frame.loads.is_empty() {
            return Err(ReconcileError::EmptyFrame);
        }

        let totals = AggregateTotals::from_records(&frame.loads);

        for record in &frame.loads {
            // ids were range-checked at decode time
            if let Some(load) = self.load_mut(record.id) {
                load.overwrite(record);
            }
        }
        self.totals = totals;
        self.frames_applied += 1;

        if frame.loads.len() < LOAD_COUNT {
            debug!(
                loads = frame.loads.len(),
                avg_voltage = self.totals.avg_voltage,
                "partial state frame; average covers reported loads only"
            );
        }

        Ok(&self.totals)
    }

    pub fn loads(&self) -> &[LoadState; LOAD_COUNT] {
        &self.loads
    }

    pub fn load(&self, id: u8) -> Option<&LoadState> {
        self.loads.iter().find(|l| l.id == id)
    }

    fn load_mut(&mut self, id: u8) -> Option<&mut LoadState> {
        self.loads.iter_mut().find(|l| l.id == id)
    }

    pub fn totals(&self) -> &AggregateTotals {
        &self.totals
    }

    pub fn frames_applied(&self) -> u64 {
        self.frames_applied
    }
}
