//! Common test utilities and fixtures
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt};
use zoneplayer_discovery::testing::{MockZonePlayer, response_datagram};

static INIT: Once = Once::new();

/// Initialize test logging (call once per test module)
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env()
            .add_directive("zoneplayer_discovery=debug".parse().unwrap());

        fmt().with_env_filter(filter).with_test_writer().init();
    });
}

/// A living room player and a kitchen player in household `Sonos_H1`,
/// plus a bedroom player in another household
pub fn household_responses() -> Vec<Vec<u8>> {
    vec![
        response_datagram(
            Some("RINCON_LIVINGROOM01400"),
            "http://10.0.0.2:1400/xml/device_description.xml",
            Some("Sonos_H1"),
        ),
        response_datagram(
            Some("RINCON_KITCHEN01400"),
            "http://10.0.0.3:1400/xml/device_description.xml",
            Some("Sonos_H1"),
        ),
        response_datagram(
            Some("RINCON_BEDROOM01400"),
            "http://10.0.0.4:1400/xml/device_description.xml",
            Some("Sonos_H2"),
        ),
    ]
}

/// Start a mock player answering with `responses`
pub async fn start_mock(
    responses: Vec<Vec<u8>>,
) -> anyhow::Result<(MockZonePlayer, SocketAddr)> {
    let mut player = MockZonePlayer::new(responses);
    let addr = player.start().await?;
    Ok((player, addr))
}
