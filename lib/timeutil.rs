use chrono::{DateTime, TimeZone, Utc};

pub fn parse_utc_from_rfc3339(input: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(input).map(|t| t.with_timezone(&Utc))
}

pub fn to_rfc3339<T>(input: &DateTime<T>) -> String
where
    T: TimeZone,
    <T as TimeZone>::Offset: std::fmt::Display,
{
    input.to_rfc3339_opts(chrono::SecondsFormat::Secs, /* use_z */ true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_rfc3339() {
        let now = Utc::now();
        let formatted = to_rfc3339(&now);
        let parsed = parse_utc_from_rfc3339(&formatted).unwrap();
        assert_eq!(parsed.timestamp(), now.timestamp());
    }

    #[test]
    fn rejects_non_rfc3339_input() {
        assert!(parse_utc_from_rfc3339("not a date").is_err());
    }
}
