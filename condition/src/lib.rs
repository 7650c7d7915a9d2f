//! Compiles CEL trigger conditions against a service-specific environment
//! and evaluates them against current/previous telemetry readings.

mod error;
mod signal;

use cel_interpreter::{Context, Program, Value};

pub use error::ConditionError;
pub use signal::{geo_distance, EventReading, Location, SignalReading, SignalValue};

/// A compiled condition, reusable across every matching (trigger, asset)
/// pair until the underlying source changes.
#[derive(Clone)]
pub struct CompiledCondition {
    source: String,
    program: Program,
}

impl std::fmt::Debug for CompiledCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledCondition")
            .field("source", &self.source)
            .finish()
    }
}

impl CompiledCondition {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Compiles `source` against the `telemetry.signals` environment:
    /// `value`, `previousValue`, `valueNumber`, `valueString`, `geoDistance`.
    pub fn compile_signal(source: &str) -> Result<Self, ConditionError> {
        Self::compile(source)
    }

    /// Compiles `source` against the `telemetry.events` environment:
    /// a single `event` struct.
    pub fn compile_event(source: &str) -> Result<Self, ConditionError> {
        Self::compile(source)
    }

    fn compile(source: &str) -> Result<Self, ConditionError> {
        let program = Program::compile(source)
            .map_err(|e| ConditionError::Compile(e.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            program,
        })
    }

    pub fn evaluate_signal(
        &self,
        current: &SignalReading,
        previous: &SignalReading,
    ) -> Result<bool, ConditionError> {
        let mut ctx = Context::default();
        ctx.add_variable("value", current.to_cel_value())
            .map_err(|e| ConditionError::Evaluate(e.to_string()))?;
        ctx.add_variable("previousValue", previous.to_cel_value())
            .map_err(|e| ConditionError::Evaluate(e.to_string()))?;
        ctx.add_variable("valueNumber", current.number_alias())
            .map_err(|e| ConditionError::Evaluate(e.to_string()))?;
        ctx.add_variable("valueString", current.string_alias())
            .map_err(|e| ConditionError::Evaluate(e.to_string()))?;
        ctx.add_function("geoDistance", geo_distance);

        let result = self
            .program
            .execute(&ctx)
            .map_err(|e| ConditionError::Evaluate(e.to_string()))?;
        as_bool(result)
    }

    pub fn evaluate_event(
        &self,
        current: &EventReading,
    ) -> Result<bool, ConditionError> {
        let mut ctx = Context::default();
        ctx.add_variable("event", current.to_cel_value())
            .map_err(|e| ConditionError::Evaluate(e.to_string()))?;

        let result = self
            .program
            .execute(&ctx)
            .map_err(|e| ConditionError::Evaluate(e.to_string()))?;
        as_bool(result)
    }
}

fn as_bool(value: Value) -> Result<bool, ConditionError> {
    match value {
        | Value::Bool(b) => Ok(b),
        | other => Err(ConditionError::NonBooleanResult(format!("{other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_condition_fires_on_crossing() {
        let cond = CompiledCondition::compile_signal(
            "valueNumber > 20.0 && valueNumber != previousValue",
        )
        .unwrap();

        let first = cond
            .evaluate_signal(&SignalReading::number(25.0), &SignalReading::number(0.0))
            .unwrap();
        assert!(first);

        let repeat = cond
            .evaluate_signal(&SignalReading::number(25.0), &SignalReading::number(25.0))
            .unwrap();
        assert!(!repeat);

        let changed = cond
            .evaluate_signal(&SignalReading::number(24.0), &SignalReading::number(25.0))
            .unwrap();
        assert!(changed);
    }

    #[test]
    fn geofence_condition_uses_geo_distance_helper() {
        let cond = CompiledCondition::compile_signal(
            "geoDistance(value.Latitude, value.Longitude, 54.7106132, 25.239926) < 0.7138406571965812",
        )
        .unwrap();

        let inside = cond
            .evaluate_signal(
                &SignalReading::location(Location {
                    latitude: 54.7106132,
                    longitude: 25.239926,
                    hdop: 1.0,
                }),
                &SignalReading::default(),
            )
            .unwrap();
        assert!(inside);

        let outside = cond
            .evaluate_signal(
                &SignalReading::location(Location {
                    latitude: 55.0,
                    longitude: 26.0,
                    hdop: 1.0,
                }),
                &SignalReading::default(),
            )
            .unwrap();
        assert!(!outside);
    }

    #[test]
    fn event_condition_reads_event_fields() {
        let cond = CompiledCondition::compile_event("event.durationNs > 500000000").unwrap();
        let fires = cond
            .evaluate_event(&EventReading {
                name: "HarshBraking".into(),
                duration_ns: 1_000_000_000,
                ..Default::default()
            })
            .unwrap();
        assert!(fires);
    }

    #[test]
    fn non_boolean_result_is_rejected() {
        let cond = CompiledCondition::compile_signal("valueNumber").unwrap();
        let err = cond
            .evaluate_signal(&SignalReading::number(1.0), &SignalReading::default())
            .unwrap_err();
        assert!(matches!(err, ConditionError::NonBooleanResult(_)));
    }

    #[test]
    fn invalid_syntax_fails_to_compile() {
        let err = CompiledCondition::compile_signal("valueNumber >").unwrap_err();
        assert!(matches!(err, ConditionError::Compile(_)));
    }
}
