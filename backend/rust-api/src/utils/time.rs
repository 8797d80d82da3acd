use chrono::{DateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;

pub fn chrono_to_bson(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

/// Drops sub-millisecond precision so values compare equal after a trip
/// through BSON.
pub fn truncate_to_millis(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(dt.timestamp_millis()).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_to_millis_matches_bson_precision() {
        let now = Utc::now();
        let truncated = truncate_to_millis(now);

        assert_eq!(
            chrono_to_bson(truncated).timestamp_millis(),
            truncated.timestamp_millis()
        );
        assert_eq!(truncated.timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
