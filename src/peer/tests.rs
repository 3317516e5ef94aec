//! Peer Module Tests
//!
//! Validates the gossip engine and its configuration source.
//!
//! ## Test Scopes
//! - **Config**: list order determines ids; both file formats; bad lines.
//! - **Scoring**: send-time payout, first-round grace, idempotent receipt.
//! - **Dispatch Rules**: mismatched envelopes never touch the state.
//! - **Wire**: a heartbeat banked over a real loopback socket.

#[cfg(test)]
mod tests {
    use crate::packet::codec;
    use crate::packet::types::{Envelope, NodeRecord, PacketKind, ProtocolMode};
    use crate::peer::config::{
        parse_peer_addresses, parse_peer_addresses_local, position_of_address, position_of_port,
        registry_from_peers, DEFAULT_PEER_PORT,
    };
    use crate::peer::service::{PeerService, PeerState};
    use crate::registry::registry::LiveSet;
    use crate::registry::types::Liveness;

    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::UdpSocket;

    fn peers(addrs: &[&str]) -> Vec<SocketAddr> {
        addrs.iter().map(|a| a.parse().unwrap()).collect()
    }

    fn state(addrs: &[&str], rounds: u32) -> PeerState {
        PeerState {
            peers: registry_from_peers(&peers(addrs)),
            received_from: LiveSet::new(),
            rounds,
        }
    }

    // ============================================================
    // CONFIG TESTS
    // ============================================================

    #[test]
    fn test_parse_standard_config_orders_ids() {
        let parsed = parse_peer_addresses("10.0.0.1\n10.0.0.2\n\n10.0.0.3\n").unwrap();

        assert_eq!(parsed.len(), 3);
        assert!(parsed.iter().all(|p| p.port() == DEFAULT_PEER_PORT));

        let registry = registry_from_peers(&parsed);
        let ids: Vec<i32> = registry.iter().map(|r| r.node_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(registry.get(1).unwrap().address.to_string(), "10.0.0.2");
    }

    #[test]
    fn test_parse_local_config_reads_ports() {
        let parsed =
            parse_peer_addresses_local("127.0.0.1 5000\n127.0.0.1 5001\n127.0.0.1 5002\n").unwrap();

        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[2].port(), 5002);
    }

    #[test]
    fn test_parse_rejects_bad_address() {
        assert!(parse_peer_addresses("not-an-address\n").is_err());
    }

    #[test]
    fn test_parse_local_rejects_missing_port() {
        assert!(parse_peer_addresses_local("127.0.0.1\n").is_err());
        assert!(parse_peer_addresses_local("127.0.0.1 not-a-port\n").is_err());
    }

    #[test]
    fn test_self_lookup_by_address_and_port() {
        let list = peers(&["10.0.0.1:6000", "10.0.0.2:6000", "10.0.0.3:6000"]);
        assert_eq!(position_of_address(&list, "10.0.0.2".parse().unwrap()), Some(1));
        assert_eq!(position_of_address(&list, "10.9.9.9".parse().unwrap()), None);

        let local = peers(&["127.0.0.1:5000", "127.0.0.1:5001"]);
        assert_eq!(position_of_port(&local, 5001), Some(1));
        assert_eq!(position_of_port(&local, 5999), None);
    }

    // ============================================================
    // SCORING TESTS
    // ============================================================

    #[test]
    fn test_first_round_advertises_without_scoring() {
        let mut state = state(&["10.0.0.1:6000", "10.0.0.2:6000"], 0);
        state.received_from.insert(1);

        let outcome = state.score_round(0).unwrap();

        assert_eq!(outcome.rounds_before, 0);
        assert!(outcome.rows.is_empty());
        assert_eq!(state.peers.get(1).unwrap().availability, 0);
        // Whatever was banked before the first send is scored next round.
        assert!(state.received_from.contains(1));
        assert_eq!(state.rounds, 1);
    }

    #[test]
    fn test_scoring_pays_out_at_send_time() {
        let mut state = state(&["10.0.0.1:6000", "10.0.0.2:6000", "10.0.0.3:6000"], 1);
        state.received_from.insert(1);

        let outcome = state.score_round(0).unwrap();

        // Heard-from peer gains a point and leaves the set.
        assert_eq!(state.peers.get(1).unwrap().availability, 1);
        assert!(!state.received_from.contains(1));
        // Silent peer is untouched.
        assert_eq!(state.peers.get(2).unwrap().availability, 0);
        assert_eq!(outcome.rounds_before, 1);
        assert_eq!(state.rounds, 2);
    }

    #[test]
    fn test_own_record_is_never_a_target() {
        let mut state = state(&["10.0.0.1:6000", "10.0.0.2:6000"], 0);
        let outcome = state.score_round(0).unwrap();

        assert_eq!(outcome.self_record.node_id, 0);
        assert_eq!(outcome.targets, peers(&["10.0.0.2:6000"]));
    }

    #[test]
    fn test_duplicate_heartbeats_count_once_per_round() {
        let mut state = state(&["10.0.0.1:6000", "10.0.0.2:6000"], 1);

        assert!(state.record_heartbeat(1));
        assert!(!state.record_heartbeat(1));

        let _ = state.score_round(0);
        assert_eq!(state.peers.get(1).unwrap().availability, 1);
    }

    #[test]
    fn test_unknown_sender_is_dropped() {
        let mut state = state(&["10.0.0.1:6000", "10.0.0.2:6000"], 1);
        assert!(!state.record_heartbeat(99));
        assert!(state.received_from.is_empty());
    }

    #[test]
    fn test_rows_classify_against_own_round_count() {
        let mut state = state(
            &["10.0.0.1:6000", "10.0.0.2:6000", "10.0.0.3:6000"],
            10,
        );
        state.peers.get_mut(1).unwrap().availability = 4;
        state.peers.get_mut(2).unwrap().availability = 3;

        let outcome = state.score_round(0).unwrap();

        assert_eq!(outcome.rows.len(), 2);
        // 4/10 = 40% > 30% cutoff.
        assert_eq!(outcome.rows[0].status, Liveness::Alive);
        // 3/10 = exactly 30%, which is dead.
        assert_eq!(outcome.rows[1].status, Liveness::Dead);
        assert!(outcome.rows.iter().all(|row| row.rounds == 10));
    }

    // ============================================================
    // DISPATCH RULE TESTS
    // ============================================================

    async fn test_service() -> std::sync::Arc<PeerService> {
        // Own entry uses port 0 so the test binds an OS-assigned port.
        PeerService::bind(peers(&["127.0.0.1:0", "127.0.0.1:1"]), 0)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_matching_heartbeat_is_banked() {
        let service = test_service().await;

        let envelope = Envelope::single(
            ProtocolMode::PeerToPeer,
            PacketKind::PeerHeartbeat,
            NodeRecord::registered("127.0.0.1".parse().unwrap(), 1, 1),
        );
        service
            .handle_datagram(&codec::encode(&envelope).unwrap(), "127.0.0.1:1".parse().unwrap())
            .await;

        assert!(service.state.lock().await.received_from.contains(1));
    }

    #[tokio::test]
    async fn test_client_server_envelope_is_a_no_op() {
        let service = test_service().await;

        let envelope = Envelope::single(
            ProtocolMode::ClientServer,
            PacketKind::AvailabilityReport,
            NodeRecord::registered("127.0.0.1".parse().unwrap(), 1, 1),
        );
        service
            .handle_datagram(&codec::encode(&envelope).unwrap(), "127.0.0.1:1".parse().unwrap())
            .await;

        assert!(service.state.lock().await.received_from.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_bytes_are_dropped() {
        let service = test_service().await;
        service
            .handle_datagram(&[0xCD; 24], "127.0.0.1:1".parse().unwrap())
            .await;
        assert!(service.state.lock().await.received_from.is_empty());
    }

    // ============================================================
    // LOOPBACK WIRE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_heartbeat_is_banked_over_loopback() {
        let service = test_service().await;
        let target = SocketAddr::new(
            "127.0.0.1".parse().unwrap(),
            service.local_addr().unwrap().port(),
        );
        tokio::spawn(service.clone().receive_loop());

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let envelope = Envelope::single(
            ProtocolMode::PeerToPeer,
            PacketKind::PeerHeartbeat,
            NodeRecord::registered("127.0.0.1".parse().unwrap(), 1, 1),
        );
        sender
            .send_to(&codec::encode(&envelope).unwrap(), target)
            .await
            .unwrap();

        // The receive loop banks the heartbeat on its own task; poll for it.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if service.state.lock().await.received_from.contains(1) {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "heartbeat was never banked"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
