//! Inbound record shapes for the two telemetry topics (spec.md §6) and
//! their conversion into the compiled-condition environment types.

use condition::{EventReading, Location, SignalReading};
use lib::signal_catalog::{self, SignalValueType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct SignalValueLocation {
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "HDOP")]
    pub hdop: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalRecord {
    #[serde(rename = "tokenId")]
    pub token_id: u64,
    pub timestamp: String,
    pub name: String,
    #[serde(rename = "valueNumber", default)]
    pub value_number: Option<f64>,
    #[serde(rename = "valueString", default)]
    pub value_string: Option<String>,
    #[serde(rename = "valueLocation", default)]
    pub value_location: Option<SignalValueLocation>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub producer: String,
    #[serde(rename = "cloudEventId", default)]
    pub cloud_event_id: String,
}

impl SignalRecord {
    /// Binds whichever `value*` field the catalog says is active for this
    /// metric. An unknown metric name has no subscribers in the index
    /// anyway (nothing can have registered a trigger for it), so it's
    /// treated as a number by default rather than rejected outright.
    pub fn to_signal_reading(&self) -> SignalReading {
        let value_type = signal_catalog::get_definition(&self.name)
            .map(|d| d.value_type)
            .unwrap_or(SignalValueType::Number);
        match value_type {
            | SignalValueType::Number => SignalReading::number(self.value_number.unwrap_or(0.0)),
            | SignalValueType::Text => {
                SignalReading::text(self.value_string.clone().unwrap_or_default())
            }
            | SignalValueType::Location => {
                let loc = self.value_location.as_ref();
                SignalReading::location(Location {
                    latitude: loc.map(|l| l.latitude).unwrap_or(0.0),
                    longitude: loc.map(|l| l.longitude).unwrap_or(0.0),
                    hdop: loc.map(|l| l.hdop).unwrap_or(0.0),
                })
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub subject: String,
    pub timestamp: String,
    pub name: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub producer: String,
    #[serde(rename = "cloudEventId", default)]
    pub cloud_event_id: String,
    #[serde(rename = "durationNs", default)]
    pub duration_ns: i64,
    #[serde(default)]
    pub metadata: String,
}

impl EventRecord {
    pub fn to_event_reading(&self) -> EventReading {
        EventReading {
            name: self.name.clone(),
            source: self.source.clone(),
            producer: self.producer.clone(),
            duration_ns: self.duration_ns,
            metadata: self.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_numeric_signal_record() {
        let raw = r#"{"tokenId":12345,"timestamp":"2024-01-01T00:00:00Z","name":"speed","valueNumber":25.0,"valueString":"","source":"vehicle","producer":"dimo/integration","cloudEventId":"abc"}"#;
        let record: SignalRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.token_id, 12345);
        let reading = record.to_signal_reading();
        assert_eq!(reading, SignalReading::number(25.0));
    }

    #[test]
    fn decodes_a_location_signal_record() {
        let raw = r#"{"tokenId":1,"timestamp":"2024-01-01T00:00:00Z","name":"currentLocation","valueLocation":{"Latitude":54.7,"Longitude":25.2,"HDOP":1.0}}"#;
        let record: SignalRecord = serde_json::from_str(raw).unwrap();
        let reading = record.to_signal_reading();
        assert_eq!(
            reading,
            SignalReading::location(Location { latitude: 54.7, longitude: 25.2, hdop: 1.0 })
        );
    }

    #[test]
    fn decodes_an_event_record_array() {
        let raw = r#"[{"subject":"did:erc721:137:0xabc:1","timestamp":"2024-01-01T00:00:00Z","name":"HarshBraking","durationNs":1000000000,"metadata":"{}"}]"#;
        let records: Vec<EventRecord> = serde_json::from_str(raw).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].duration_ns, 1_000_000_000);
    }
}
