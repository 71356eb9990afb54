use crate::discovery::Discovery;
use crate::error::DiscoveryError;
use crate::state::{DiscoveryEvent, EventKind};
use crate::testing::{MockZonePlayer, create_test_record, loopback_config, response_datagram};
use crate::types::{DiscoveryConfig, DiscoveryRequest};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// A search target that never answers
async fn silent_target() -> (UdpSocket, SocketAddr) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

async fn mock_players(responses: Vec<Vec<u8>>) -> (MockZonePlayer, SocketAddr) {
    let mut player = MockZonePlayer::new(responses);
    let addr = player.start().await.unwrap();
    (player, addr)
}

fn player_a() -> Vec<u8> {
    response_datagram(Some("A"), "http://10.0.0.2:1400/x", Some("H1"))
}

fn player_b() -> Vec<u8> {
    response_datagram(Some("B"), "http://10.0.0.3:1400/x", Some("H1"))
}

#[tokio::test]
async fn test_concurrent_lookups_resolve_independently() {
    let (mut player, addr) = mock_players(vec![player_a(), player_b()]).await;
    let discovery = Discovery::new(loopback_config(addr));

    let (any, b) = tokio::join!(
        discovery.discover_player(DiscoveryRequest::any()),
        discovery.discover_player(DiscoveryRequest::player("B")),
    );

    let any = any.unwrap();
    assert_eq!(any.uuid.as_deref(), Some("A"));
    assert_eq!(any.location, "http://10.0.0.2:1400/x");
    assert_eq!(any.household.as_deref(), Some("H1"));

    let b = b.unwrap();
    assert_eq!(b.uuid.as_deref(), Some("B"));
    assert_eq!(b.location, "http://10.0.0.3:1400/x");

    assert_eq!(discovery.open_requests(), 0);
    assert!(!discovery.is_running());

    player.stop().await;
}

#[tokio::test]
async fn test_open_requests_reference_count() {
    let (_target, addr) = silent_target().await;
    let discovery = Discovery::new(loopback_config(addr));

    let any = tokio::spawn({
        let discovery = discovery.clone();
        async move { discovery.discover_player(DiscoveryRequest::any()).await }
    });
    let b = tokio::spawn({
        let discovery = discovery.clone();
        async move { discovery.discover_player(DiscoveryRequest::player("B")).await }
    });

    wait_until(|| discovery.open_requests() == 2).await;
    assert!(discovery.is_running());

    let bus = discovery.event_bus();
    bus.publish(&DiscoveryEvent::Found(create_test_record(
        "A",
        Ipv4Addr::new(10, 0, 0, 2),
        "H1",
    )));

    let any = any.await.unwrap().unwrap();
    assert_eq!(any.uuid.as_deref(), Some("A"));
    assert_eq!(discovery.open_requests(), 1);
    // The other lookup still needs the socket
    assert!(discovery.is_running());

    bus.publish(&DiscoveryEvent::Found(create_test_record(
        "B",
        Ipv4Addr::new(10, 0, 0, 3),
        "H1",
    )));

    let b = b.await.unwrap().unwrap();
    assert_eq!(b.ip, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3)));
    assert_eq!(discovery.open_requests(), 0);
    assert!(!discovery.is_running());
    assert_eq!(bus.subscriber_count(EventKind::Found), 0);
    assert_eq!(bus.subscriber_count(EventKind::Error), 0);
}

#[tokio::test]
async fn test_player_filter_ignores_other_players() {
    let (mut player, addr) = mock_players(vec![player_a()]).await;
    let discovery = Discovery::new(loopback_config(addr));

    let result = discovery
        .discover_player(DiscoveryRequest::player("X").with_timeout(Duration::from_millis(300)))
        .await;

    assert!(matches!(result, Err(DiscoveryError::Timeout { .. })));
    // Player A answered every search and was skipped each time
    assert!(player.search_count().await > 1);
    assert_eq!(discovery.open_requests(), 0);
    assert!(!discovery.is_running());

    player.stop().await;
}

#[tokio::test]
async fn test_household_filter() {
    let other = response_datagram(Some("C"), "http://10.0.0.4:1400/x", Some("H2"));
    let (mut player, addr) = mock_players(vec![player_a(), other]).await;
    let discovery = Discovery::new(loopback_config(addr));

    let record = discovery
        .discover_player(DiscoveryRequest::household("H2"))
        .await
        .unwrap();

    assert_eq!(record.uuid.as_deref(), Some("C"));
    player.stop().await;
}

#[tokio::test]
async fn test_non_target_datagrams_produce_no_events() {
    let noise = b"HTTP/1.1 200 OK\r\nLOCATION: http://10.0.0.9:49152/desc.xml\r\nST: urn:schemas-upnp-org:device:MediaRenderer:1\r\n\r\n".to_vec();
    let (mut player, addr) = mock_players(vec![noise, player_a()]).await;
    let discovery = Discovery::new(loopback_config(addr));
    let mut events = discovery.subscribe();

    let record = discovery
        .discover_player(DiscoveryRequest::any())
        .await
        .unwrap();
    assert_eq!(record.uuid.as_deref(), Some("A"));

    while let Some(event) = events.try_recv() {
        match event {
            DiscoveryEvent::Found(record) => assert_eq!(record.uuid.as_deref(), Some("A")),
            DiscoveryEvent::Error(e) => panic!("unexpected error event: {e}"),
        }
    }

    player.stop().await;
}

#[tokio::test]
async fn test_new_session_after_resolution() {
    let (mut player, addr) = mock_players(vec![player_a()]).await;
    let discovery = Discovery::new(loopback_config(addr));

    discovery
        .discover_player(DiscoveryRequest::any())
        .await
        .unwrap();
    assert!(!discovery.is_running());
    let searches = player.search_count().await;

    let record = discovery
        .discover_player(DiscoveryRequest::player("A"))
        .await
        .unwrap();
    assert_eq!(record.uuid.as_deref(), Some("A"));
    assert!(player.search_count().await > searches);
    assert_eq!(discovery.open_requests(), 0);
    assert!(!discovery.is_running());

    player.stop().await;
}

#[tokio::test]
async fn test_socket_fault_rejects_pending_lookups() {
    // An IPv4 socket cannot send to an IPv6 target, so the first search faults
    let discovery = Discovery::new(loopback_config("[::1]:1900".parse().unwrap()));

    let (first, second) = tokio::join!(
        discovery.discover_player(DiscoveryRequest::any()),
        discovery.discover_player(DiscoveryRequest::player("B")),
    );

    assert!(matches!(first, Err(DiscoveryError::SendFailed { .. })));
    assert!(matches!(second, Err(DiscoveryError::SendFailed { .. })));
    assert_eq!(discovery.open_requests(), 0);
    assert!(!discovery.is_running());

    // The faulted session starts cleanly again
    let again = discovery.discover_player(DiscoveryRequest::any()).await;
    assert!(matches!(again, Err(DiscoveryError::SendFailed { .. })));
    assert_eq!(discovery.open_requests(), 0);
}

#[tokio::test]
async fn test_bind_failure_is_returned_to_caller() {
    let config = DiscoveryConfig {
        local_addresses: vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))],
        ..loopback_config("127.0.0.1:1900".parse().unwrap())
    };
    let discovery = Discovery::new(config);

    let result = discovery.discover_player(DiscoveryRequest::any()).await;

    assert!(matches!(result, Err(DiscoveryError::BindFailed { .. })));
    assert_eq!(discovery.open_requests(), 0);
    assert!(!discovery.is_running());
    assert_eq!(discovery.event_bus().subscriber_count(EventKind::Found), 0);
}

#[tokio::test]
async fn test_refresh_moves_to_next_address_and_faults_on_rebind_failure() {
    let (_target, addr) = silent_target().await;
    let unroutable = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));
    let config = DiscoveryConfig {
        local_addresses: vec![IpAddr::V4(Ipv4Addr::LOCALHOST), unroutable],
        ..loopback_config(addr)
    };
    let discovery = Discovery::new(config);

    // The first bind uses loopback; the first refresh moves to the unroutable address
    let result = timeout(
        Duration::from_secs(2),
        discovery.discover_player(DiscoveryRequest::any()),
    )
    .await
    .expect("rebind failure should reject the lookup");

    match result {
        Err(DiscoveryError::BindFailed { addr, .. }) => assert_eq!(addr.ip(), unroutable),
        other => panic!("expected bind failure, got {other:?}"),
    }
    assert_eq!(discovery.open_requests(), 0);
    assert!(!discovery.is_running());

    // A later lookup binds loopback again
    let again = discovery
        .discover_player(DiscoveryRequest::any().with_timeout(Duration::from_millis(50)))
        .await;
    assert!(matches!(again, Err(DiscoveryError::Timeout { .. })));
    assert_eq!(discovery.open_requests(), 0);
    assert!(!discovery.is_running());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let config = DiscoveryConfig {
        local_addresses: Vec::new(),
        ..DiscoveryConfig::default()
    };
    let discovery = Discovery::new(config);

    let result = discovery.discover_player(DiscoveryRequest::any()).await;
    assert!(matches!(result, Err(DiscoveryError::InvalidConfig { .. })));
    assert!(discovery.start().is_err());
}

#[tokio::test]
async fn test_stop_rejects_pending_lookups() {
    let (_target, addr) = silent_target().await;
    let discovery = Discovery::new(loopback_config(addr));

    let pending = tokio::spawn({
        let discovery = discovery.clone();
        async move { discovery.discover_player(DiscoveryRequest::any()).await }
    });
    wait_until(|| discovery.open_requests() == 1).await;

    discovery.stop();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(DiscoveryError::Stopped)));
    assert_eq!(discovery.open_requests(), 0);
    assert!(!discovery.is_running());

    // Stopping an idle session does nothing
    discovery.stop();
    assert!(!discovery.is_running());
}

#[tokio::test]
async fn test_dropped_lookup_releases_its_share() {
    let (_target, addr) = silent_target().await;
    let discovery = Discovery::new(loopback_config(addr));

    let lookup = discovery.discover_player(DiscoveryRequest::any());
    assert!(timeout(Duration::from_millis(100), lookup).await.is_err());

    assert_eq!(discovery.open_requests(), 0);
    assert!(!discovery.is_running());
    assert_eq!(discovery.event_bus().subscriber_count(EventKind::Found), 0);
}

#[tokio::test]
async fn test_default_timeout_from_config() {
    let (_target, addr) = silent_target().await;
    let config = DiscoveryConfig {
        default_timeout: Some(Duration::from_millis(100)),
        ..loopback_config(addr)
    };
    let discovery = Discovery::new(config);

    let result = discovery.discover_player(DiscoveryRequest::any()).await;
    match result {
        Err(DiscoveryError::Timeout { duration }) => {
            assert_eq!(duration, Duration::from_millis(100));
        }
        other => panic!("expected timeout, got {other:?}"),
    }

    // A per-call timeout overrides the default
    let result = discovery
        .discover_player(DiscoveryRequest::any().with_timeout(Duration::from_millis(50)))
        .await;
    assert!(matches!(
        result,
        Err(DiscoveryError::Timeout { duration }) if duration == Duration::from_millis(50)
    ));
}

#[tokio::test]
async fn test_scan_collects_distinct_players() {
    let (mut player, addr) = mock_players(vec![player_a(), player_b(), player_a()]).await;
    let discovery = Discovery::new(loopback_config(addr));

    let players = discovery.scan(Duration::from_millis(300)).await.unwrap();

    let uuids: Vec<_> = players.iter().map(|p| p.uuid.as_deref()).collect();
    assert_eq!(uuids, vec![Some("A"), Some("B")]);
    assert_eq!(discovery.open_requests(), 0);
    assert!(!discovery.is_running());

    player.stop().await;
}

#[tokio::test]
async fn test_manual_start_lets_subscribers_observe() {
    let (mut player, addr) = mock_players(vec![player_b()]).await;
    let discovery = Discovery::new(loopback_config(addr));
    let mut events = discovery.subscribe();

    discovery.start().unwrap();
    discovery.start().unwrap();
    assert!(discovery.is_running());
    assert_eq!(discovery.open_requests(), 0);

    let event = timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, DiscoveryEvent::Found(ref r) if r.uuid.as_deref() == Some("B")));

    discovery.stop();
    assert!(!discovery.is_running());

    player.stop().await;
}
