//! # Channel Scenarios
//!
//! The authentication gate and the command stream, end to end:
//!
//! 1. a valid envelope streams `echo hello` to a successful `end`
//! 2. stale, forged or wrong-secret envelopes get a closed connection and
//!    not a single byte
//! 3. closing the client cancels the remote process promptly
//! 4. silent commands still produce heartbeats

#[cfg(all(test, unix))]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::{Duration, Instant};

    use fr_02_channel_server::AgentConfig;
    use fr_03_channel_client::{ChannelClient, ClientError};
    use futures::StreamExt;
    use rand::RngCore;
    use shared_crypto::current_timestamp;
    use shared_types::{EventKind, StreamEvent, ROUTE_EXECUTE};

    use crate::{
        agent_config, collect_events, raw_exchange, raw_request, signer, signer_with,
        wait_until, TestAgent, AES_KEY, HMAC_KEY,
    };

    fn terminal_count(events: &[StreamEvent]) -> usize {
        events.iter().filter(|e| e.is_terminal()).count()
    }

    // =========================================================================
    // STREAMING
    // =========================================================================

    #[tokio::test]
    async fn test_echo_streams_data_then_end() {
        let agent = TestAgent::start().await;
        let client = agent.client("echo hello");
        client.connect().await.unwrap();

        let events = collect_events(&client, Duration::from_secs(10)).await;
        let data = events
            .iter()
            .position(|e| e.kind == EventKind::Data && e.payload.contains("hello"))
            .expect("data event with hello");
        let end = events.iter().position(|e| e.kind == EventKind::End).unwrap();

        assert!(data < end);
        assert_eq!(end, events.len() - 1, "nothing follows the end event");
        assert_eq!(terminal_count(&events), 1);
        assert!(events[end].is_success(), "{:?}", events[end]);
    }

    #[tokio::test]
    async fn test_multiline_output_preserved() {
        let agent = TestAgent::start().await;
        let client = agent.client("printf 'first\\nsecond\\n'");
        client.connect().await.unwrap();

        let events = collect_events(&client, Duration::from_secs(10)).await;
        let output: String = events
            .iter()
            .filter(|e| e.kind == EventKind::Data)
            .map(|e| e.payload.as_str())
            .collect();
        assert!(output.contains("first\nsecond"), "{output:?}");
    }

    #[tokio::test]
    async fn test_failing_command_reports_exit_code() {
        let agent = TestAgent::start().await;
        let client = agent.client("echo oops >&2; exit 4");
        client.connect().await.unwrap();

        let events = collect_events(&client, Duration::from_secs(10)).await;
        assert!(events
            .iter()
            .any(|e| e.kind == EventKind::Data && e.payload.contains("oops")));
        let end = events.last().unwrap();
        assert_eq!(end.kind, EventKind::End);
        assert!(end.payload.contains("exit 4"), "{}", end.payload);
        assert!(!end.is_success());
    }

    // =========================================================================
    // AUTHENTICATION GATE
    // =========================================================================

    #[tokio::test]
    async fn test_stale_timestamp_gets_no_bytes() {
        let agent = TestAgent::start().await;
        let envelope = signer()
            .seal_at(current_timestamp() - 400, "stale-nonce")
            .unwrap();

        let received = raw_exchange(agent.addr, &raw_request("POST", ROUTE_EXECUTE, &envelope)).await;

        assert!(received.is_empty(), "{:?}", String::from_utf8_lossy(&received));
        let snapshot = agent.metrics.snapshot();
        assert_eq!(snapshot.auth_rejected, 1);
        assert_eq!(snapshot.sessions_started, 0);
    }

    #[tokio::test]
    async fn test_forged_signature_gets_no_bytes() {
        let agent = TestAgent::start().await;
        let mut envelope = signer().seal().unwrap();
        let mut forged = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut forged);
        envelope.signature = hex::encode(forged);

        let received = raw_exchange(agent.addr, &raw_request("POST", ROUTE_EXECUTE, &envelope)).await;

        assert!(received.is_empty(), "{:?}", String::from_utf8_lossy(&received));
        assert_eq!(agent.metrics.snapshot().sessions_started, 0);
    }

    #[tokio::test]
    async fn test_future_timestamp_gets_no_bytes() {
        let agent = TestAgent::start().await;
        let envelope = signer()
            .seal_at(current_timestamp() + 120, "early-nonce")
            .unwrap();

        let received = raw_exchange(agent.addr, &raw_request("POST", ROUTE_EXECUTE, &envelope)).await;
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected_by_client_connect() {
        let agent = TestAgent::start().await;
        // Same keys, so the signature and window pass; only the token differs.
        let client = ChannelClient::for_command(
            &agent.address(),
            signer_with(AES_KEY, HMAC_KEY, "not-the-secret"),
            "echo never",
        )
        .unwrap();

        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed(_)), "{err:?}");
        assert!(!client.is_connected());
        assert!(matches!(client.events(), Err(ClientError::NotConnected)));
        assert_eq!(agent.metrics.snapshot().sessions_started, 0);
    }

    #[tokio::test]
    async fn test_wrong_signing_key_rejected_by_client_connect() {
        let agent = TestAgent::start().await;
        let client = ChannelClient::for_command(
            &agent.address(),
            signer_with(AES_KEY, "another-hmac-key", "meiyoumima"),
            "echo never",
        )
        .unwrap();

        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed(_)), "{err:?}");
        assert_eq!(agent.metrics.auth_rejected.load(Ordering::Relaxed), 1);
    }

    // =========================================================================
    // CANCELLATION
    // =========================================================================

    #[tokio::test]
    async fn test_client_close_cancels_remote_process() {
        let mut config = agent_config();
        config.session.heartbeat_interval = Duration::from_millis(10);
        let agent = TestAgent::start_with(config).await;
        let client = agent.client("sleep 60");

        let started = Instant::now();
        client.connect().await.unwrap();
        let mut events = client.events().unwrap();
        assert!(
            wait_until(Duration::from_secs(5), || async {
                agent.metrics.snapshot().sessions_active == 1
            })
            .await
        );

        tokio::time::sleep(Duration::from_secs(1).saturating_sub(started.elapsed())).await;
        client.close();
        let closed_at = Instant::now();

        let released = wait_until(Duration::from_secs(2), || async {
            agent.metrics.snapshot().sessions_active == 0
        })
        .await;
        let elapsed = closed_at.elapsed();

        assert!(released, "remote session still running");
        assert!(
            elapsed < Duration::from_millis(100),
            "cancellation took {elapsed:?}"
        );
        assert_eq!(agent.metrics.snapshot().sessions_started, 1);

        // Closing ends the local stream as well.
        let rest: Vec<_> = tokio::time::timeout(Duration::from_secs(1), async {
            let mut rest = Vec::new();
            while let Some(event) = events.next().await {
                rest.push(event);
            }
            rest
        })
        .await
        .unwrap();
        assert!(terminal_count(&rest) <= 1);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_deadline_ends_session_once() {
        let mut config = agent_config();
        config.session.deadline = Duration::from_millis(300);
        let agent = TestAgent::start_with(config).await;
        let client = agent.client("sleep 30");
        client.connect().await.unwrap();

        let events = collect_events(&client, Duration::from_secs(5)).await;
        assert_eq!(terminal_count(&events), 1);
        let end = events.last().unwrap();
        assert_eq!(end.payload, "cancelled: deadline exceeded");
    }

    #[tokio::test]
    async fn test_agent_shutdown_cancels_live_sessions() {
        let agent = TestAgent::start().await;
        let client = agent.client("sleep 60");
        client.connect().await.unwrap();
        let metrics = agent.metrics.clone();
        assert!(
            wait_until(Duration::from_secs(5), || async {
                metrics.snapshot().sessions_active == 1
            })
            .await
        );

        let events = tokio::spawn(async move {
            let events = client.events().unwrap();
            events.collect::<Vec<_>>().await
        });
        agent.stop().await;

        let events = tokio::time::timeout(Duration::from_secs(5), events)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(terminal_count(&events), 1);
        assert_eq!(
            events.last().unwrap().payload,
            "cancelled: cancelled by caller"
        );
    }

    // =========================================================================
    // HEARTBEATS
    // =========================================================================

    async fn heartbeat_before_end(config: AgentConfig, command: &str, limit: Duration) {
        let agent = TestAgent::start_with(config).await;
        let client = agent.client(command);
        client.connect().await.unwrap();

        let events = collect_events(&client, limit).await;
        let end = events.iter().position(|e| e.is_terminal()).unwrap();
        assert!(
            events[..end].iter().any(|e| e.kind == EventKind::Heartbeat),
            "{events:?}"
        );
        assert!(events[end].is_success());
    }

    #[tokio::test]
    async fn test_silent_command_gets_heartbeats() {
        let mut config = agent_config();
        config.session.heartbeat_interval = Duration::from_millis(150);
        heartbeat_before_end(config, "sleep 1", Duration::from_secs(10)).await;
    }

    #[tokio::test]
    #[ignore = "runs for 20 seconds"]
    async fn test_silent_command_gets_heartbeats_at_default_interval() {
        let mut config = agent_config();
        config.session.heartbeat_interval = Duration::from_secs(15);
        heartbeat_before_end(config, "sleep 20", Duration::from_secs(30)).await;
    }
}
