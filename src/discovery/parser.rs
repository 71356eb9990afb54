//! Parser for SSDP search responses

use std::collections::HashMap;
use std::net::IpAddr;

use tracing::trace;

use super::ZONE_PLAYER_URN;
use crate::types::DiscoveryRecord;

/// Header names read from a search response
pub mod headers {
    /// Device description URL
    pub const LOCATION: &str = "LOCATION";
    /// Unique service name, carries the player uuid
    pub const USN: &str = "USN";
    /// Household identifier
    pub const HOUSEHOLD: &str = "X-RINCON-HOUSEHOLD";
}

/// Parse a response datagram into a record
///
/// Returns `None` for datagrams that do not mention the `ZonePlayer` device
/// type (other UPnP devices share the multicast group) and for responses
/// without a `LOCATION` header.
#[must_use]
pub fn parse_response(datagram: &[u8], source: IpAddr) -> Option<DiscoveryRecord> {
    let text = String::from_utf8_lossy(datagram);

    if !text.contains(ZONE_PLAYER_URN) {
        trace!("Ignoring non-ZonePlayer response from {}", source);
        return None;
    }

    let mut fields = parse_headers(&text);

    let Some(location) = fields.remove(headers::LOCATION) else {
        trace!("Response from {} has no LOCATION header", source);
        return None;
    };

    Some(DiscoveryRecord {
        household: fields.remove(headers::HOUSEHOLD),
        location,
        uuid: fields
            .get(headers::USN)
            .map(String::as_str)
            .and_then(extract_uuid)
            .map(ToString::to_string),
        ip: source,
    })
}

/// Collect `Key: Value` lines into a map
///
/// Keys are upper-cased, values trimmed. A repeated key keeps its last value.
/// Lines without a colon (such as the status line) and lines with an empty
/// key or value are skipped.
#[must_use]
pub fn parse_headers(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some((key.to_ascii_uppercase(), value.to_string()))
        })
        .collect()
}

/// Extract the `uuid:<TOKEN>` token from a USN value
///
/// The token runs over upper-case letters, digits and underscores, e.g.
/// `uuid:RINCON_000E58A0B1C201400::urn:...` yields `RINCON_000E58A0B1C201400`.
#[must_use]
pub fn extract_uuid(usn: &str) -> Option<&str> {
    let start = usn.find("uuid:")? + "uuid:".len();
    let rest = &usn[start..];
    let len = rest
        .find(|c: char| !(c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'))
        .unwrap_or(rest.len());

    (len > 0).then(|| &rest[..len])
}
