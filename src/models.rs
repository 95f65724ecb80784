pub mod domain {
    use std::cmp::Ordering;
    use std::fmt;

    use chrono::{DateTime, Local, NaiveDateTime};
    use serde::{Serialize, Serializer};

    use crate::error::RecordError;

    /// Formats the capture backend and browsers emit, tried in order after RFC 3339.
    const TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

    /// Observation time. Keeps the string exactly as received for display and
    /// export, and orders by the parsed instant. Instants are local wall-clock
    /// time: the backend writes local times without an offset, and times that
    /// carry one are converted to the local zone.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct Timestamp {
        raw: String,
        at: NaiveDateTime,
    }

    impl Timestamp {
        pub fn parse(raw: &str) -> Result<Self, RecordError> {
            let trimmed = raw.trim();
            let at = DateTime::parse_from_rfc3339(trimmed)
                .map(|dt| dt.with_timezone(&Local).naive_local())
                .or_else(|_| {
                    TIME_FORMATS
                        .iter()
                        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
                        .ok_or(())
                })
                .map_err(|_| RecordError::BadTime(raw.to_string()))?;

            Ok(Timestamp {
                raw: trimmed.to_string(),
                at,
            })
        }

        pub fn as_str(&self) -> &str {
            &self.raw
        }

        pub fn instant(&self) -> NaiveDateTime {
            self.at
        }
    }

    impl Ord for Timestamp {
        fn cmp(&self, other: &Self) -> Ordering {
            self.at.cmp(&other.at).then_with(|| self.raw.cmp(&other.raw))
        }
    }

    impl PartialOrd for Timestamp {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }

    impl fmt::Display for Timestamp {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.raw)
        }
    }

    impl Serialize for Timestamp {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&self.raw)
        }
    }

    /// One DNS query seen by the capture backend. Never mutated after ingestion.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    pub struct ObservationRecord {
        pub domain: String,
        pub ip: String,
        pub time: Timestamp,
        pub protocol: String,
        pub length: u64,
    }

    impl ObservationRecord {
        pub fn new(
            domain: impl Into<String>,
            ip: impl Into<String>,
            time: &str,
            protocol: impl Into<String>,
            length: u64,
        ) -> Result<Self, RecordError> {
            let domain = domain.into();
            let ip = ip.into();
            if domain.trim().is_empty() {
                return Err(RecordError::MissingField("domain"));
            }
            if ip.trim().is_empty() {
                return Err(RecordError::MissingField("ip"));
            }
            if time.trim().is_empty() {
                return Err(RecordError::MissingField("time"));
            }

            Ok(ObservationRecord {
                domain,
                ip,
                time: Timestamp::parse(time)?,
                protocol: protocol.into(),
                length,
            })
        }
    }
}

pub mod dto {
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    use super::domain::ObservationRecord;
    use crate::error::RecordError;

    /// Record as it travels over `/logs` and the `new_log` push event. Every
    /// field is optional here so a bad record fails validation instead of
    /// failing the whole batch.
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct RecordDTO {
        #[serde(default)]
        pub domain: Option<String>,
        #[serde(default)]
        pub ip: Option<String>,
        #[serde(default)]
        pub time: Option<String>,
        #[serde(default)]
        pub protocol: Option<String>,
        #[serde(default)]
        pub length: Option<Value>,
    }

    impl TryFrom<RecordDTO> for ObservationRecord {
        type Error = RecordError;

        fn try_from(dto: RecordDTO) -> Result<Self, Self::Error> {
            let domain = dto.domain.ok_or(RecordError::MissingField("domain"))?;
            let ip = dto.ip.ok_or(RecordError::MissingField("ip"))?;
            let time = dto.time.ok_or(RecordError::MissingField("time"))?;
            let length = dto.length.as_ref().map(coerce_length).unwrap_or(0);

            ObservationRecord::new(domain, ip, &time, dto.protocol.unwrap_or_default(), length)
        }
    }

    /// `length` arrives as a number or a numeric string. Anything that does
    /// not start with digits, and anything negative, counts as 0 bytes.
    pub fn coerce_length(value: &Value) -> u64 {
        match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
                .unwrap_or(0),
            Value::String(s) => parse_leading_int(s),
            _ => 0,
        }
    }

    fn parse_leading_int(s: &str) -> u64 {
        let s = s.trim_start();
        let (negative, digits) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let value = digits
            .bytes()
            .take_while(u8::is_ascii_digit)
            .fold(0u64, |acc, b| acc.saturating_mul(10).saturating_add(u64::from(b - b'0')));

        if negative {
            0
        } else {
            value
        }
    }

    /// Entry of `GET /interfaces`.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct InterfaceInfo {
        pub name: String,
        #[serde(default)]
        pub description: Option<String>,
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serde_json::json;

        #[test]
        fn length_accepts_numbers_and_numeric_strings() {
            assert_eq!(coerce_length(&json!(120)), 120);
            assert_eq!(coerce_length(&json!("120")), 120);
            assert_eq!(coerce_length(&json!(" 64 bytes")), 64);
            assert_eq!(coerce_length(&json!(12.9)), 12);
        }

        #[test]
        fn unparseable_length_degrades_to_zero() {
            assert_eq!(coerce_length(&json!("abc")), 0);
            assert_eq!(coerce_length(&json!("-5")), 0);
            assert_eq!(coerce_length(&json!(-5)), 0);
            assert_eq!(coerce_length(&json!(null)), 0);
            assert_eq!(coerce_length(&json!({"n": 1})), 0);
        }

        #[test]
        fn wire_record_converts() {
            let dto: RecordDTO = serde_json::from_value(json!({
                "domain": "example.com",
                "ip": "192.168.1.10",
                "time": "2024-03-01 12:00:00",
                "protocol": "UDP",
                "length": "87"
            }))
            .unwrap();

            let record = ObservationRecord::try_from(dto).unwrap();
            assert_eq!(record.domain, "example.com");
            assert_eq!(record.length, 87);
            assert_eq!(record.time.as_str(), "2024-03-01 12:00:00");
        }

        #[test]
        fn missing_fields_are_rejected() {
            let dto: RecordDTO = serde_json::from_value(json!({
                "ip": "192.168.1.10",
                "time": "2024-03-01 12:00:00"
            }))
            .unwrap();
            assert_eq!(
                ObservationRecord::try_from(dto),
                Err(RecordError::MissingField("domain"))
            );

            let dto: RecordDTO = serde_json::from_value(json!({
                "domain": "example.com",
                "ip": "",
                "time": "2024-03-01 12:00:00"
            }))
            .unwrap();
            assert_eq!(
                ObservationRecord::try_from(dto),
                Err(RecordError::MissingField("ip"))
            );
        }

        #[test]
        fn unknown_time_format_is_rejected() {
            let dto = RecordDTO {
                domain: Some("example.com".into()),
                ip: Some("10.0.0.1".into()),
                time: Some("yesterday".into()),
                ..Default::default()
            };
            assert!(matches!(
                ObservationRecord::try_from(dto),
                Err(RecordError::BadTime(_))
            ));
        }

        #[test]
        fn timestamps_order_across_formats() {
            use super::super::domain::Timestamp;

            let a = Timestamp::parse("2024-03-01 12:00:00").unwrap();
            let b = Timestamp::parse("2024-03-01T12:00:00.500").unwrap();
            let c = Timestamp::parse(&offset_time("2024-03-01 12:00:01")).unwrap();
            assert!(a < b);
            assert!(b < c);
        }

        /// RFC 3339 rendering of a local wall-clock time, with this host's offset.
        fn offset_time(local: &str) -> String {
            use chrono::{Local, NaiveDateTime, TimeZone};

            let naive = NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S").unwrap();
            Local.from_local_datetime(&naive).earliest().unwrap().to_rfc3339()
        }

        #[test]
        fn offset_times_share_the_local_reference() {
            use super::super::domain::Timestamp;

            let plain = Timestamp::parse("2024-03-01 12:00:00").unwrap();
            let with_offset = Timestamp::parse(&offset_time("2024-03-01 12:00:00")).unwrap();
            assert_eq!(plain.instant(), with_offset.instant());
        }
    }
}
