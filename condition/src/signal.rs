use std::collections::HashMap;
use std::sync::Arc;

use cel_interpreter::objects::{Key, Map as CelMap};
use cel_interpreter::Value;

/// A GPS fix, the `location` value type of the signal catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub hdop: f64,
}

/// The value carried by one signal reading; which variant is active is
/// determined by the signal's catalog entry, not by the record itself.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalValue {
    Number(f64),
    Text(String),
    Location(Location),
}

impl Default for SignalValue {
    fn default() -> Self {
        SignalValue::Number(0.0)
    }
}

/// One signal reading bound into the condition environment as `value` or
/// `previousValue`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalReading {
    pub value: SignalValue,
}

impl SignalReading {
    pub fn number(v: f64) -> Self {
        Self {
            value: SignalValue::Number(v),
        }
    }

    pub fn text(v: impl Into<String>) -> Self {
        Self {
            value: SignalValue::Text(v.into()),
        }
    }

    pub fn location(v: Location) -> Self {
        Self {
            value: SignalValue::Location(v),
        }
    }

    pub(crate) fn to_cel_value(&self) -> Value {
        match &self.value {
            | SignalValue::Number(n) => Value::Float(*n),
            | SignalValue::Text(s) => Value::String(Arc::new(s.clone())),
            | SignalValue::Location(loc) => location_to_cel(loc),
        }
    }

    pub(crate) fn number_alias(&self) -> Value {
        match &self.value {
            | SignalValue::Number(n) => Value::Float(*n),
            | _ => Value::Null,
        }
    }

    pub(crate) fn string_alias(&self) -> Value {
        match &self.value {
            | SignalValue::Text(s) => Value::String(Arc::new(s.clone())),
            | _ => Value::Null,
        }
    }
}

fn location_to_cel(loc: &Location) -> Value {
    let mut fields = HashMap::new();
    fields.insert(
        Key::String(Arc::new("Latitude".to_string())),
        Value::Float(loc.latitude),
    );
    fields.insert(
        Key::String(Arc::new("Longitude".to_string())),
        Value::Float(loc.longitude),
    );
    fields.insert(
        Key::String(Arc::new("HDOP".to_string())),
        Value::Float(loc.hdop),
    );
    Value::Map(CelMap {
        map: Arc::new(fields),
    })
}

/// One event reading bound into the condition environment as `event`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventReading {
    pub name: String,
    pub source: String,
    pub producer: String,
    pub duration_ns: i64,
    pub metadata: String,
}

impl EventReading {
    pub(crate) fn to_cel_value(&self) -> Value {
        let mut fields = HashMap::new();
        fields.insert(
            Key::String(Arc::new("name".to_string())),
            Value::String(Arc::new(self.name.clone())),
        );
        fields.insert(
            Key::String(Arc::new("source".to_string())),
            Value::String(Arc::new(self.source.clone())),
        );
        fields.insert(
            Key::String(Arc::new("producer".to_string())),
            Value::String(Arc::new(self.producer.clone())),
        );
        fields.insert(
            Key::String(Arc::new("durationNs".to_string())),
            Value::Int(self.duration_ns),
        );
        fields.insert(
            Key::String(Arc::new("metadata".to_string())),
            Value::String(Arc::new(self.metadata.clone())),
        );
        Value::Map(CelMap {
            map: Arc::new(fields),
        })
    }
}

/// Great-circle distance between two lat/lon points, in kilometers.
/// Bound into the condition environment as `geoDistance`.
pub fn geo_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geo_distance_is_zero_for_identical_points() {
        let d = geo_distance(54.7106132, 25.239926, 54.7106132, 25.239926);
        assert!(d < 1e-6);
    }

    #[test]
    fn geo_distance_matches_known_short_hop() {
        let d = geo_distance(54.7106132, 25.239926, 54.72, 25.25);
        assert!(d < 2.0 && d > 0.0);
    }
}
