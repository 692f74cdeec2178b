use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};

use crate::{
    coordinator::Status,
    sensor::{Reading, Sensor},
};

pub fn build_readings_table<'a>(
    readings: impl IntoIterator<Item = (&'a dyn Sensor, Reading)>,
    status: &Status,
) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table.set_header(vec!["Sensor", "Value", "Unit", "Class", "State", "Unique ID"]);
    for (sensor, reading) in readings {
        let description = sensor.description();
        let (value, state) = match reading {
            Reading::Available(value) => (Cell::new(value), Cell::new("ok").fg(Color::Green)),
            Reading::Stale(value) => {
                (Cell::new(value).add_attribute(Attribute::Dim), Cell::new("stale").fg(Color::DarkYellow))
            }
            Reading::Missing => (Cell::new("–"), Cell::new("unavailable").fg(Color::Red)),
            Reading::NoData => (Cell::new("–"), Cell::new("no data").fg(Color::Red)),
        };
        table.add_row(vec![
            Cell::new(description.name),
            value.set_alignment(CellAlignment::Right),
            Cell::new(description.unit).add_attribute(Attribute::Dim),
            Cell::new(format!("{}/{}", description.device_class, description.state_class))
                .add_attribute(Attribute::Dim),
            state,
            Cell::new(
                status.snapshot.as_ref().map_or_else(String::new, |snapshot| sensor.unique_id(snapshot)),
            )
            .add_attribute(Attribute::Dim),
        ]);
    }
    if let Some(snapshot) = &status.snapshot {
        table.add_row(vec![
            Cell::new("Plant").add_attribute(Attribute::Dim),
            Cell::new(&snapshot.account_id).set_alignment(CellAlignment::Right),
            Cell::new(""),
            Cell::new(snapshot.fetched_at.format("%H:%M:%S")).add_attribute(Attribute::Dim),
            Cell::new(status.consecutive_failures).fg(if status.consecutive_failures == 0 {
                Color::Green
            } else {
                Color::Red
            }),
            Cell::new(status.last_error.as_deref().unwrap_or_default()).fg(Color::Red),
        ]);
    }
    table
}
