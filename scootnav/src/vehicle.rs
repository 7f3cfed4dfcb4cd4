use crate::models::{Vehicle, VehicleKind};

pub const DEFAULT_LEVEL: u8 = 85;

struct Preset {
    id: &'static str,
    name: &'static str,
    kind: VehicleKind,
    capacity: f64,
    consumption: f64,
}

const PRESETS: [Preset; 4] = [
    Preset {
        id: "segway_e125s",
        name: "Segway E125S",
        kind: VehicleKind::Electric,
        capacity: 2.88,
        consumption: 3.5,
    },
    Preset {
        id: "niu_nqi_sport",
        name: "Niu NQi Sport",
        kind: VehicleKind::Electric,
        capacity: 1.56,
        consumption: 3.2,
    },
    Preset {
        id: "vespa_elettrica",
        name: "Vespa Elettrica 45",
        kind: VehicleKind::Electric,
        capacity: 4.2,
        consumption: 4.2,
    },
    Preset {
        id: "aerox_4",
        name: "Yamaha Aerox 4 (4T)",
        kind: VehicleKind::Petrol,
        capacity: 6.0,
        consumption: 2.2,
    },
];

impl Preset {
    fn to_vehicle(&self, level: u8) -> Vehicle {
        Vehicle {
            id: self.id.to_string(),
            name: self.name.to_string(),
            kind: self.kind,
            capacity_units: self.capacity,
            consumption_per_hundred_km: self.consumption,
            level,
        }
    }
}

pub fn presets(level: u8) -> Vec<Vehicle> {
    PRESETS.iter().map(|p| p.to_vehicle(level)).collect()
}

/// Looks up a preset by id, carrying over the current level.
pub fn preset(id: &str, level: u8) -> Option<Vehicle> {
    PRESETS
        .iter()
        .find(|p| p.id == id)
        .map(|p| p.to_vehicle(level))
}

pub fn default_vehicle() -> Vehicle {
    PRESETS[0].to_vehicle(DEFAULT_LEVEL)
}

/// Share of the tank or battery a trip of `distance_km` uses, in whole percent.
pub fn usage_cost_percent(
    distance_km: f64,
    consumption_per_hundred_km: f64,
    capacity_units: f64,
) -> i64 {
    if capacity_units <= 0.0 {
        return 0;
    }
    let usage = distance_km / 100.0 * consumption_per_hundred_km / capacity_units * 100.0;
    if usage.is_finite() { usage.round() as i64 } else { 0 }
}

pub fn range_km(vehicle: &Vehicle) -> i64 {
    if vehicle.consumption_per_hundred_km <= 0.0 {
        return 0;
    }
    (vehicle.capacity_units / vehicle.consumption_per_hundred_km * 100.0).round() as i64
}
