use serde::{Deserialize, Serialize};

// The voice gateway sends the interval as a float, unlike the main one.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct Hello {
    #[serde(with = "crate::deserializers::u64_from_f64")]
    pub heartbeat_interval: u64,
}

#[cfg(test)]
mod tests {
    use super::Hello;

    #[test]
    fn fractional_interval_is_truncated() {
        let hello = serde_json::from_str::<Hello>(r#"{"heartbeat_interval":41250.5}"#).unwrap();
        assert_eq!(hello.heartbeat_interval, 41250);

        let hello = serde_json::from_str::<Hello>(r#"{"heartbeat_interval":13750}"#).unwrap();
        assert_eq!(hello.heartbeat_interval, 13750);
    }
}
