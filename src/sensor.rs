//! Read-only projections of the cached snapshot into scalar sensor values.

use serde_json::Value;

use crate::{
    coordinator::{Snapshot, Status},
    payload::{self, KeyPath},
    quantity::{KilowattHours, Watts},
};

/// Known locations of the PV power in the flow payload, most specific first.
pub const PV_POWER: &[KeyPath] =
    &[&["pv", "power"], &["pv", "w"], &["pvPower"], &["solar", "power"], &["solarPower"]];

/// Known locations of today's PV energy in the flow payload.
pub const PV_ENERGY_TODAY: &[KeyPath] =
    &[&["pv", "eDay"], &["pv", "energyDay"], &["energy", "day"], &["eDay"], &["day_energy"]];

/// Known locations of the grid power in the flow payload.
pub const GRID_POWER: &[KeyPath] =
    &[&["grid", "power"], &["gridOrMeterPower"], &["gridPower"], &["grid", "w"]];

/// Dedicated fields of the day payload.
const DAY_ENERGY_KEYS: &[&str] = &["eDay", "day", "energy", "pvEnergy", "today", "etoday"];

/// Fields holding the number when a day energy field turns out to be an object.
const DAY_ENERGY_VALUES: &[KeyPath] = &[&["value"], &["kWh"]];

#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Display)]
pub enum DeviceClass {
    #[display("power")]
    Power,

    #[display("energy")]
    Energy,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Display)]
pub enum StateClass {
    #[display("measurement")]
    Measurement,

    /// Only increases within a day, resets at the day boundary.
    #[display("total_increasing")]
    TotalIncreasing,
}

#[must_use]
pub struct Description {
    /// Suffix of the unique ID.
    pub key: &'static str,
    pub name: &'static str,
    pub unit: &'static str,
    pub device_class: DeviceClass,
    pub state_class: StateClass,
}

/// What a sensor shows to the host.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Reading {
    Available(f64),

    /// Last known value while the coordinator reports the source as unavailable.
    Stale(f64),

    /// The snapshot exists, but none of the known fields holds the value.
    Missing,

    /// No snapshot has been fetched yet.
    NoData,
}

pub trait Sensor: Send + Sync {
    fn description(&self) -> &Description;

    fn value(&self, snapshot: &Snapshot) -> Option<f64>;

    fn unique_id(&self, snapshot: &Snapshot) -> String {
        format!("{}_{}", snapshot.account_id, self.description().key)
    }

    fn read(&self, status: &Status) -> Reading {
        let Some(snapshot) = &status.snapshot else {
            return Reading::NoData;
        };
        match self.value(snapshot) {
            None => Reading::Missing,
            Some(value) if status.is_available => Reading::Available(value),
            Some(value) => Reading::Stale(value),
        }
    }
}

/// All sensors derived from a single Sol-Ark plant.
pub fn all(invert_grid_sign: bool) -> Vec<Box<dyn Sensor>> {
    vec![Box::new(PvPower), Box::new(PvEnergyToday), Box::new(GridPower { invert_grid_sign })]
}

pub fn pv_power(snapshot: &Snapshot) -> Option<Watts> {
    payload::extract(payload::unwrap_data(&snapshot.flow), PV_POWER).map(Watts)
}

/// Prefer the day payload, fall back to the flow payload.
pub fn pv_energy_today(snapshot: &Snapshot) -> Option<KilowattHours> {
    snapshot
        .day
        .as_ref()
        .and_then(day_energy)
        .or_else(|| payload::extract(payload::unwrap_data(&snapshot.flow), PV_ENERGY_TODAY))
        .map(KilowattHours)
}

/// Positive when importing, unless inverted.
pub fn grid_power(snapshot: &Snapshot, invert_sign: bool) -> Option<Watts> {
    payload::extract(payload::unwrap_data(&snapshot.flow), GRID_POWER)
        .map(Watts)
        .map(|power| if invert_sign { -power } else { power })
}

/// Top-level fields win over the ones in the `data` envelope.
fn day_energy(day: &Value) -> Option<f64> {
    [day, payload::unwrap_data(day)].into_iter().find_map(|day| {
        DAY_ENERGY_KEYS.iter().find_map(|key| {
            let value = payload::lookup(day, key)?;
            value.as_f64().or_else(|| payload::extract(value, DAY_ENERGY_VALUES))
        })
    })
}

static PV_POWER_DESCRIPTION: Description = Description {
    key: "pv_power",
    name: "PV Power",
    unit: Watts::UNIT,
    device_class: DeviceClass::Power,
    state_class: StateClass::Measurement,
};

pub struct PvPower;

impl Sensor for PvPower {
    fn description(&self) -> &Description {
        &PV_POWER_DESCRIPTION
    }

    fn value(&self, snapshot: &Snapshot) -> Option<f64> {
        pv_power(snapshot).map(f64::from)
    }
}

static PV_ENERGY_TODAY_DESCRIPTION: Description = Description {
    key: "pv_energy_today",
    name: "PV Energy Today",
    unit: KilowattHours::UNIT,
    device_class: DeviceClass::Energy,
    state_class: StateClass::TotalIncreasing,
};

pub struct PvEnergyToday;

impl Sensor for PvEnergyToday {
    fn description(&self) -> &Description {
        &PV_ENERGY_TODAY_DESCRIPTION
    }

    fn value(&self, snapshot: &Snapshot) -> Option<f64> {
        pv_energy_today(snapshot).map(f64::from)
    }
}

static GRID_POWER_DESCRIPTION: Description = Description {
    key: "grid_power",
    name: "Grid Power",
    unit: Watts::UNIT,
    device_class: DeviceClass::Power,
    state_class: StateClass::Measurement,
};

pub struct GridPower {
    pub invert_grid_sign: bool,
}

impl Sensor for GridPower {
    fn description(&self) -> &Description {
        &GRID_POWER_DESCRIPTION
    }

    fn value(&self, snapshot: &Snapshot) -> Option<f64> {
        grid_power(snapshot, self.invert_grid_sign).map(f64::from)
    }
}
