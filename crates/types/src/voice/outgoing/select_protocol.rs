use serde::{Deserialize, Serialize};
use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct SelectProtocol {
    pub protocol: String,
    pub data: SelectProtocolData,
}

impl SelectProtocol {
    /// Selects the UDP transport sending to `address:port` with the given
    /// encryption mode.
    #[must_use]
    pub fn udp(address: IpAddr, port: u16, mode: impl Into<String>) -> Self {
        Self {
            protocol: "udp".to_string(),
            data: SelectProtocolData {
                address,
                port,
                mode: mode.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Hash, Serialize)]
pub struct SelectProtocolData {
    #[serde(with = "crate::deserializers::ip_string")]
    pub address: IpAddr,
    pub port: u16,
    pub mode: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::net::Ipv4Addr;

    #[test]
    fn structure() {
        let payload = SelectProtocol::udp(
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            50004,
            "xsalsa20_poly1305_lite",
        );
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "protocol": "udp",
                "data": {
                    "address": "10.0.0.2",
                    "port": 50004,
                    "mode": "xsalsa20_poly1305_lite",
                },
            })
        );
    }
}
