//! The static signal catalog: which `telemetry.signals` metric names exist
//! and which `value*` field on a signal record is semantically active for
//! each. Consulted by `control` at registration time and by `ingest` when
//! deciding which field of an inbound record to bind as `value`.

/// Mirrors the condition environment's `value*` aliases: a number metric
/// binds `valueNumber`, a location metric binds `valueLocation`, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalValueType {
    Number,
    Text,
    Location,
}

impl SignalValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            | SignalValueType::Number => "number",
            | SignalValueType::Text => "text",
            | SignalValueType::Location => "vss.Location",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SignalDefinition {
    pub name: &'static str,
    pub unit: &'static str,
    pub value_type: SignalValueType,
}

const CATALOG: &[SignalDefinition] = &[
    SignalDefinition { name: "speed", unit: "km/h", value_type: SignalValueType::Number },
    SignalDefinition { name: "powertrainType", unit: "", value_type: SignalValueType::Text },
    SignalDefinition { name: "currentLocation", unit: "deg", value_type: SignalValueType::Location },
    SignalDefinition { name: "powertrainFuelSystemRelativeLevel", unit: "percent", value_type: SignalValueType::Number },
    SignalDefinition { name: "powertrainTractionBatteryStateOfChargeCurrent", unit: "percent", value_type: SignalValueType::Number },
    SignalDefinition { name: "exteriorAirTemperature", unit: "celsius", value_type: SignalValueType::Number },
];

/// `SignalCatalog.GetDefinition(name)` from spec.md §6.
pub fn get_definition(name: &str) -> Option<SignalDefinition> {
    CATALOG.iter().find(|d| d.name == name).copied()
}

/// `GetSignalCatalog()` from spec.md §6.
pub fn all() -> &'static [SignalDefinition] {
    CATALOG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_metric_resolves_its_value_type() {
        let def = get_definition("speed").unwrap();
        assert_eq!(def.value_type, SignalValueType::Number);
        let def = get_definition("currentLocation").unwrap();
        assert_eq!(def.value_type, SignalValueType::Location);
    }

    #[test]
    fn unknown_metric_is_absent() {
        assert!(get_definition("doesNotExist").is_none());
    }
}
