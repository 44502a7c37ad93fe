//! TransportChannel tests against a real ZeroMQ REQ peer

#[cfg(all(test, feature = "server"))]
mod tests {
    use rehab_bridge::{
        channel::PlannerChannel,
        config::TransportConfig,
        transport::{TransportChannel, TransportStatus},
    };
    use std::thread;
    use std::time::{Duration, Instant};
    use zeromq::{ReqSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

    fn config(port: u16) -> TransportConfig {
        TransportConfig {
            host: "127.0.0.1".into(),
            port,
            reply_delay_ms: 0,
            poll_interval_ms: 1,
        }
    }

    fn wait_until(mut ready: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if ready() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn start(port: u16) -> TransportChannel {
        let transport = TransportChannel::start(config(port)).unwrap();
        assert!(wait_until(|| transport.status() == TransportStatus::Listening));
        transport
    }

    fn text(msg: &ZmqMessage) -> String {
        String::from_utf8(msg.get(0).unwrap().to_vec()).unwrap()
    }

    // -----------------------------------------------------------------------
    // Exchange
    // -----------------------------------------------------------------------

    #[test]
    fn replies_with_latest_snapshot_and_reuses_it() {
        let transport = start(47551);
        transport.set_outbound("snap-1".into());

        tokio_test::block_on(async {
            let mut req = ReqSocket::new();
            req.connect(transport.endpoint()).await.unwrap();

            req.send(ZmqMessage::from(r#"{"timestepNumber": 1}"#.to_string()))
                .await
                .unwrap();
            assert_eq!(text(&req.recv().await.unwrap()), "snap-1");
            assert_eq!(
                transport.latest_inbound().as_deref(),
                Some(r#"{"timestepNumber": 1}"#)
            );

            // Nothing newer: the previous payload is sent again.
            req.send(ZmqMessage::from(r#"{"timestepNumber": 2}"#.to_string()))
                .await
                .unwrap();
            assert_eq!(text(&req.recv().await.unwrap()), "snap-1");

            transport.set_outbound("snap-2".into());
            req.send(ZmqMessage::from(r#"{"timestepNumber": 3}"#.to_string()))
                .await
                .unwrap();
            assert_eq!(text(&req.recv().await.unwrap()), "snap-2");
        });
    }

    #[test]
    fn holds_reply_until_first_snapshot() {
        let transport = start(47552);

        tokio_test::block_on(async {
            let mut req = ReqSocket::new();
            req.connect(transport.endpoint()).await.unwrap();
            req.send(ZmqMessage::from(r#"{"timestepNumber": 1}"#.to_string()))
                .await
                .unwrap();

            // The request is delivered while the reply is still pending.
            let mut inbound = None;
            let deadline = Instant::now() + Duration::from_secs(5);
            while inbound.is_none() && Instant::now() < deadline {
                inbound = transport.latest_inbound();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            assert_eq!(inbound.as_deref(), Some(r#"{"timestepNumber": 1}"#));

            transport.set_outbound("first".into());
            assert_eq!(text(&req.recv().await.unwrap()), "first");
        });
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn stop_is_idempotent() {
        let mut transport = start(47553);
        transport.stop();
        assert_eq!(transport.status(), TransportStatus::Stopped);
        transport.stop();
        assert_eq!(transport.status(), TransportStatus::Stopped);
    }

    #[test]
    fn stop_while_holding_reply() {
        let mut transport = start(47554);

        tokio_test::block_on(async {
            let mut req = ReqSocket::new();
            req.connect(transport.endpoint()).await.unwrap();
            req.send(ZmqMessage::from("{}".to_string())).await.unwrap();
        });

        assert!(wait_until(|| transport.latest_inbound().is_some()));
        transport.stop();
        assert_eq!(transport.status(), TransportStatus::Stopped);
    }

    #[test]
    fn bind_conflict_faults_without_panicking() {
        let _first = start(47555);
        let second = TransportChannel::start(config(47555)).unwrap();

        assert!(wait_until(|| !second.status().is_running()));
        assert!(matches!(second.status(), TransportStatus::Faulted(_)));
        assert_eq!(second.latest_inbound(), None);
    }
}
