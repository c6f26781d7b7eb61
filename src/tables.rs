use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};
use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::{
    pump::PlanningState,
    schedule::{OptimizationResult, ScheduleEntry},
    units::{EuroPerKilowattHour, Metres},
};

pub fn build_schedule_table(
    result: &OptimizationResult,
    low_level_threshold: Metres,
    max_level: Metres,
) -> Table {
    let median_price = median_price(&result.schedule);

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table.set_header(vec![
        "Start",
        "Price",
        "Pumps",
        "Level before",
        "Level after",
        "Inflow",
        "Outflow",
        "Cost",
    ]);
    for entry in &result.schedule {
        table.add_row(vec![
            Cell::new(entry.start_time.format("%d %H:%M")),
            Cell::new(format!("{:.4}", entry.electricity_price_eur_per_kwh))
                .set_alignment(CellAlignment::Right)
                .fg(if entry.electricity_price_eur_per_kwh >= median_price {
                    Color::Red
                } else {
                    Color::Green
                }),
            Cell::new(entry.active_pumps.iter().join(" ")),
            Cell::new(format!("{:.2} m", entry.water_level_start_m))
                .set_alignment(CellAlignment::Right)
                .add_attribute(Attribute::Dim),
            Cell::new(format!("{:.2} m", entry.water_level_end_m))
                .set_alignment(CellAlignment::Right)
                .fg(level_color(entry.water_level_end_m, low_level_threshold, max_level)),
            Cell::new(format!("{:.0} m³", entry.inflow_m3)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.0} m³", entry.outflow_m3)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2} €", entry.interval_cost_eur))
                .set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

/// Per-pump summary over one planned cycle: the states before and after
/// come in matching order, the exporter preserves the request ordering.
#[must_use]
pub fn build_pumps_table(
    before: &PlanningState,
    after: &PlanningState,
    horizon_minutes: u64,
) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table.set_header(vec!["Pump", "Category", "State", "Lock left", "Total usage", "Duty cycle"]);
    for (before, after) in before.0.iter().zip(&after.0) {
        let cycle_minutes = after.usage_minutes.saturating_sub(before.usage_minutes);
        #[expect(clippy::cast_precision_loss)]
        let duty_percent = if horizon_minutes == 0 {
            0.0
        } else {
            100.0 * cycle_minutes as f64 / horizon_minutes as f64
        };
        table.add_row(vec![
            Cell::new(&after.id),
            Cell::new(format!("{:?}", after.category)),
            Cell::new(if after.is_on { "on" } else { "off" }).fg(if after.is_on {
                Color::Green
            } else {
                Color::Reset
            }),
            Cell::new(format!("{} min", after.lock_minutes_remaining))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} min", after.usage_minutes)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{duty_percent:.0}%")).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

fn median_price(schedule: &[ScheduleEntry]) -> EuroPerKilowattHour {
    let sorted: Vec<EuroPerKilowattHour> = schedule
        .iter()
        .map(|entry| entry.electricity_price_eur_per_kwh)
        .sorted_by_key(|price| OrderedFloat(price.0))
        .collect();
    sorted.get(sorted.len() / 2).copied().unwrap_or(EuroPerKilowattHour::ZERO)
}

fn level_color(level: Metres, low_level_threshold: Metres, max_level: Metres) -> Color {
    if level >= max_level {
        Color::Red
    } else if level <= low_level_threshold {
        Color::Green
    } else {
        Color::Reset
    }
}
