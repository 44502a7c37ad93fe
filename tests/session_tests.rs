//! SessionCoordinator integration tests

#[cfg(test)]
mod tests {
    use rehab_bridge::{
        actions::{default_registry, AvatarActions},
        channel::{MemoryChannel, PlannerChannel},
        config::SessionConfig,
        registry::{EntityHandle, EntityKind, EntityRegistry, Template},
        session::{SessionCoordinator, SessionState, TickRejection},
        snapshot::StatusProvider,
        types::Vec3,
    };
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Host {
        calls: Vec<String>,
    }

    impl StatusProvider for Host {}

    impl AvatarActions for Host {
        fn speak(&mut self, text: &str) {
            self.calls.push(format!("speak:{}", text));
        }

        fn move_to(&mut self, avatar: &EntityHandle, position: Vec3) {
            self.calls.push(format!("move:{}:{}", avatar.name, position));
        }

        fn done(&mut self) {
            self.calls.push("done".into());
        }
    }

    fn make_coordinator() -> SessionCoordinator<MemoryChannel> {
        let catalog = [
            Template::new("Avatar", EntityKind::Player),
            Template::new("Cube", EntityKind::Object),
        ]
        .into_iter()
        .collect();

        SessionCoordinator::new(
            SessionConfig {
                stale_timeout_ms: 2000,
                tick_gap_warning: 10,
            },
            MemoryChannel::new(),
            EntityRegistry::new(catalog),
            default_registry().unwrap(),
        )
    }

    fn tick(n: i64) -> String {
        format!(r#"{{"timestepNumber": {n}}}"#)
    }

    fn spawn(n: i64, models: &[&str]) -> String {
        let queue: Vec<String> = models
            .iter()
            .map(|m| format!(r#"{{"model": {{"type": "{m}"}}, "position": [1.0, 2.0, 3.0]}}"#))
            .collect();
        format!(
            r#"{{"timestepNumber": {n}, "control": true, "addObject": true, "spawnQueue": [{}]}}"#,
            queue.join(",")
        )
    }

    fn destroy(n: i64) -> String {
        format!(r#"{{"timestepNumber": {n}, "control": true, "destroy": true}}"#)
    }

    /// Feed one payload and run one cycle.
    fn step(
        coord: &mut SessionCoordinator<MemoryChannel>,
        host: &mut Host,
        payload: &str,
    ) -> rehab_bridge::CycleReport {
        coord.channel().push_inbound(payload);
        coord.cycle(host)
    }

    // -----------------------------------------------------------------------
    // Tick sequencing
    // -----------------------------------------------------------------------

    #[test]
    fn processed_ticks_never_decrease() {
        let mut coord = make_coordinator();
        let mut host = Host::default();

        let processed: Vec<Option<i64>> = [1, 2, 2, 1, 3]
            .iter()
            .map(|n| step(&mut coord, &mut host, &tick(*n)).processed_tick)
            .collect();

        assert_eq!(processed, [Some(1), Some(2), None, None, Some(3)]);
        let stats = coord.stats();
        assert_eq!(stats.processed_ticks, 3);
        assert_eq!(stats.duplicate_ticks, 1);
        assert_eq!(stats.regressed_ticks, 1);
        assert_eq!(coord.last_tick(), 3);
    }

    #[test]
    fn duplicate_and_regressed_ticks_are_reported() {
        let mut coord = make_coordinator();
        let mut host = Host::default();

        step(&mut coord, &mut host, &tick(5));
        assert_eq!(
            step(&mut coord, &mut host, &tick(5)).rejected,
            Some(TickRejection::Duplicate)
        );
        assert_eq!(
            step(&mut coord, &mut host, &tick(4)).rejected,
            Some(TickRejection::Regressed)
        );
        assert_eq!(coord.state(), SessionState::Active);
    }

    #[test]
    fn large_gap_warns_but_advances() {
        let mut coord = make_coordinator();
        let mut host = Host::default();

        step(&mut coord, &mut host, &tick(1));
        let report = step(&mut coord, &mut host, &tick(50));

        assert_eq!(report.processed_tick, Some(50));
        assert_eq!(coord.last_tick(), 50);
        assert_eq!(coord.stats().gap_warnings, 1);
    }

    #[test]
    fn gap_threshold_is_strict() {
        let mut coord = make_coordinator();
        let mut host = Host::default();

        step(&mut coord, &mut host, &tick(1));
        step(&mut coord, &mut host, &tick(11));
        assert_eq!(coord.stats().gap_warnings, 0);

        step(&mut coord, &mut host, &tick(22));
        assert_eq!(coord.stats().gap_warnings, 1);
        assert_eq!(coord.last_tick(), 22);
    }

    #[test]
    fn ticks_near_the_limit_do_not_overflow() {
        let mut coord = make_coordinator();
        let mut host = Host::default();

        let first = step(&mut coord, &mut host, &tick(i64::MAX - 1));
        let second = step(&mut coord, &mut host, &tick(i64::MAX));

        assert_eq!(first.processed_tick, Some(i64::MAX - 1));
        assert_eq!(second.processed_tick, Some(i64::MAX));
        assert_eq!(coord.last_tick(), i64::MAX);
        // Only the jump up from -1 counts as a gap.
        assert_eq!(coord.stats().gap_warnings, 1);
    }

    // -----------------------------------------------------------------------
    // Sentinels and staleness
    // -----------------------------------------------------------------------

    #[test]
    fn sentinel_always_empties_registry() {
        for sentinel in [0, -1] {
            let mut coord = make_coordinator();
            let mut host = Host::default();

            step(&mut coord, &mut host, &spawn(1, &["Avatar", "Cube"]));
            assert_eq!(coord.entities().len(), 2);

            let report = step(&mut coord, &mut host, &tick(sentinel));
            assert_eq!(coord.entities().len(), 0);
            assert_eq!(coord.state(), SessionState::Disconnected);
            assert_eq!(report.despawned.len(), 2);
            assert_eq!(coord.last_tick(), sentinel);
        }
    }

    #[test]
    fn startup_then_silence_goes_stale_once() {
        let mut coord = make_coordinator();
        let mut host = Host::default();
        let t0 = Instant::now();

        let mut states = Vec::new();
        for (i, n) in [-1, 0, 1, 2, 3].iter().enumerate() {
            coord.channel().push_inbound(tick(*n));
            let at = t0 + Duration::from_millis(100 * i as u64);
            states.push(coord.cycle_at(at, &mut host).state);
        }
        assert_eq!(coord.stats().resets, 0);

        // Still within the timeout.
        let quiet = coord.cycle_at(t0 + Duration::from_millis(1500), &mut host);
        states.push(quiet.state);

        let stale = coord.cycle_at(t0 + Duration::from_millis(3400), &mut host);
        states.push(stale.state);

        use SessionState::*;
        assert_eq!(
            states,
            [
                Some(Disconnected),
                Some(Disconnected),
                Some(Active),
                Some(Active),
                Some(Active),
                Some(Active),
                Some(Disconnected),
            ]
        );
        assert_eq!(stale.transitions, [(Active, Stale), (Stale, Disconnected)]);
        assert!(stale.passed_through(Stale));
        assert_eq!(coord.stats().resets, 1);
        assert_eq!(coord.last_tick(), -1);

        // Further silence does not reset again.
        coord.cycle_at(t0 + Duration::from_secs(10), &mut host);
        assert_eq!(coord.stats().resets, 1);
    }

    #[test]
    fn stale_session_despawns_entities() {
        let mut coord = make_coordinator();
        let mut host = Host::default();
        let t0 = Instant::now();

        coord.channel().push_inbound(spawn(1, &["Avatar"]));
        coord.cycle_at(t0, &mut host);
        assert_eq!(coord.entities().len(), 1);

        let report = coord.cycle_at(t0 + Duration::from_secs(3), &mut host);
        assert_eq!(report.despawned.len(), 1);
        assert!(coord.entities().is_empty());
    }

    // -----------------------------------------------------------------------
    // Control path
    // -----------------------------------------------------------------------

    #[test]
    fn spawn_names_are_unique_per_template() {
        let mut coord = make_coordinator();
        let mut host = Host::default();

        let report = step(&mut coord, &mut host, &spawn(1, &["Cube", "Cube", "Avatar", "Cube"]));
        let names: Vec<_> = report.spawned.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["Cube", "Cube2", "Avatar", "Cube3"]);
        assert_eq!(coord.entities().count("Cube"), 3);

        // Spawn positions are converted once into the engine frame.
        let cube = coord.entities().find_by_name("Cube").unwrap();
        assert_eq!(cube.pose.position, Vec3::new(1.0, 3.0, 2.0));

        step(&mut coord, &mut host, &tick(0));
        let report = step(&mut coord, &mut host, &spawn(1, &["Cube"]));
        assert_eq!(report.spawned[0].name, "Cube");
    }

    #[test]
    fn unknown_template_is_skipped() {
        let mut coord = make_coordinator();
        let mut host = Host::default();

        let report = step(&mut coord, &mut host, &spawn(1, &["Teapot", "Cube"]));
        assert_eq!(report.spawned.len(), 1);
        assert_eq!(coord.entities().len(), 1);
    }

    #[test]
    fn control_false_never_touches_registry() {
        let mut coord = make_coordinator();
        let mut host = Host::default();

        let payload = spawn(1, &["Cube"]).replace(r#""control": true"#, r#""control": false"#);
        let report = step(&mut coord, &mut host, &payload);

        assert!(report.spawned.is_empty());
        assert!(coord.entities().is_empty());
        assert_eq!(coord.state(), SessionState::Active);
    }

    #[test]
    fn spawn_takes_precedence_over_destroy() {
        let mut coord = make_coordinator();
        let mut host = Host::default();

        let payload = spawn(1, &["Cube"]).replace(r#""addObject": true"#, r#""addObject": true, "destroy": true"#);
        step(&mut coord, &mut host, &payload);

        assert_eq!(coord.entities().len(), 1);
        assert_eq!(coord.state(), SessionState::Active);
    }

    #[test]
    fn destroy_holds_until_planner_restarts() {
        let mut coord = make_coordinator();
        let mut host = Host::default();

        step(&mut coord, &mut host, &spawn(1, &["Avatar", "Cube"]));
        let report = step(&mut coord, &mut host, &destroy(2));
        assert_eq!(report.despawned.len(), 2);
        assert_eq!(coord.state(), SessionState::Disconnected);
        assert!(coord.entities().is_empty());

        let report = step(&mut coord, &mut host, &spawn(3, &["Cube"]));
        assert_eq!(report.rejected, Some(TickRejection::AwaitingRestart));
        assert!(coord.entities().is_empty());

        // -1 is a sentinel but does not end the destroyed state.
        let report = step(&mut coord, &mut host, &tick(-1));
        assert_eq!(report.rejected, Some(TickRejection::AwaitingRestart));

        step(&mut coord, &mut host, &tick(0));
        let report = step(&mut coord, &mut host, &spawn(1, &["Cube"]));
        assert_eq!(report.processed_tick, Some(1));
        assert_eq!(coord.state(), SessionState::Active);
        assert_eq!(coord.entities().len(), 1);
    }

    // -----------------------------------------------------------------------
    // Action dispatch
    // -----------------------------------------------------------------------

    const ACTIONS: &str = r#"{
        "timestepNumber": 2,
        "objects": [{
            "model": {"type": "Avatar"},
            "position": [0.0, 0.0, 0.0],
            "actionDict": {
                "Speak": {"stringVals": ["raise your arm"]},
                "MoveToPos": {"tupleVals": [[1.0, 2.0, 3.0]]},
                "Juggle": {},
                "Done": {}
            }
        }]
    }"#;

    #[test]
    fn actions_dispatch_in_order_on_first_player() {
        let mut coord = make_coordinator();
        let mut host = Host::default();

        step(&mut coord, &mut host, &spawn(1, &["Avatar", "Avatar"]));
        let report = step(&mut coord, &mut host, ACTIONS);

        assert_eq!(
            host.calls,
            ["speak:raise your arm", "move:Avatar:(1.00, 3.00, 2.00)", "done"]
        );
        assert_eq!(report.dispatched.len(), 4);
        assert!(!report.dispatched[2].is_invoked());

        let stats = coord.stats();
        assert_eq!(stats.actions_dispatched, 3);
        assert_eq!(stats.unknown_actions, 1);
    }

    #[test]
    fn actions_without_avatar_do_not_panic() {
        let mut coord = make_coordinator();
        let mut host = Host::default();

        let report = step(&mut coord, &mut host, ACTIONS);
        assert_eq!(report.dispatched.len(), 4);
        assert_eq!(host.calls, ["speak:raise your arm", "done"]);
    }

    #[test]
    fn malformed_action_args_do_not_drop_the_command() {
        let mut coord = make_coordinator();
        let mut host = Host::default();

        let payload = r#"{
            "timestepNumber": 1,
            "control": true,
            "addObject": true,
            "spawnQueue": [{"model": {"type": "Cube"}, "position": [0.0, 0.0, 0.0]}],
            "objects": [{
                "model": {"type": "Avatar"},
                "position": [0.0, 0.0, 0.0],
                "actionDict": {"Juggle": "three balls"}
            }]
        }"#;
        let report = step(&mut coord, &mut host, payload);

        assert!(!report.decode_failed);
        assert_eq!(report.processed_tick, Some(1));
        assert_eq!(coord.entities().len(), 1);
        assert_eq!(coord.stats().unknown_actions, 1);
    }

    #[test]
    fn null_args_invoke_parameterless_action() {
        let mut coord = make_coordinator();
        let mut host = Host::default();

        step(&mut coord, &mut host, &spawn(1, &["Avatar"]));
        let payload = r#"{
            "timestepNumber": 2,
            "objects": [{
                "model": {"type": "Avatar"},
                "position": [0.0, 0.0, 0.0],
                "actionDict": {"Done": null}
            }]
        }"#;
        let report = step(&mut coord, &mut host, payload);

        assert!(!report.decode_failed);
        assert!(report.dispatched[0].is_invoked());
        assert_eq!(host.calls, ["done"]);
    }

    #[test]
    fn destroy_skips_actions() {
        let mut coord = make_coordinator();
        let mut host = Host::default();

        step(&mut coord, &mut host, &spawn(1, &["Avatar"]));
        let payload = ACTIONS.replace(
            r#""timestepNumber": 2,"#,
            r#""timestepNumber": 2, "control": true, "destroy": true,"#,
        );
        let report = step(&mut coord, &mut host, &payload);

        assert!(report.dispatched.is_empty());
        assert!(host.calls.is_empty());
    }

    // -----------------------------------------------------------------------
    // Inbound faults
    // -----------------------------------------------------------------------

    #[test]
    fn decode_failure_keeps_last_good_command() {
        let mut coord = make_coordinator();
        let mut host = Host::default();

        step(&mut coord, &mut host, &spawn(1, &["Cube"]));
        let report = step(&mut coord, &mut host, "{\"timestepNumber\": ");

        assert!(report.decode_failed);
        assert_eq!(coord.stats().decode_failures, 1);
        assert_eq!(coord.last_command().map(|c| c.tick), Some(1));
        assert_eq!(coord.state(), SessionState::Active);
        assert_eq!(coord.entities().len(), 1);
    }

    #[test]
    fn empty_and_null_payloads_are_ignored() {
        let mut coord = make_coordinator();
        let mut host = Host::default();

        for payload in ["", "Null", "  "] {
            let report = step(&mut coord, &mut host, payload);
            assert!(!report.decode_failed);
            assert_eq!(report.processed_tick, None);
        }
        assert_eq!(coord.stats().decode_failures, 0);
        assert_eq!(coord.stats().cycles, 3);
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    #[test]
    fn snapshot_is_built_before_inbound() {
        let mut coord = make_coordinator();
        let mut host = Host::default();

        step(&mut coord, &mut host, &spawn(1, &["Cube"]));
        let first: serde_json::Value =
            serde_json::from_str(&coord.channel().take_outbound().unwrap()).unwrap();
        assert_eq!(first["TickData"]["ScenicObjects"].as_array().map(Vec::len), Some(0));

        coord.cycle(&mut host);
        let second: serde_json::Value =
            serde_json::from_str(&coord.channel().take_outbound().unwrap()).unwrap();
        let objects = &second["TickData"]["ScenicObjects"];
        assert_eq!(objects.as_array().map(Vec::len), Some(1));
        // Back in the planner frame.
        assert_eq!(objects[0]["movementData"]["transform"]["y"], 2.0);
    }

    #[test]
    fn planner_stop_clears_after_restart() {
        let mut coord = make_coordinator();
        let mut host = Host::default();

        step(&mut coord, &mut host, &spawn(1, &["Avatar"]));
        coord.request_planner_stop();
        coord.cycle(&mut host);
        let out: serde_json::Value =
            serde_json::from_str(&coord.channel().take_outbound().unwrap()).unwrap();
        assert_eq!(
            out["TickData"]["ScenicPlayers"][0]["movementData"]["stopButton"],
            true
        );

        step(&mut coord, &mut host, &tick(0));
        step(&mut coord, &mut host, &spawn(1, &["Avatar"]));
        coord.cycle(&mut host);
        let out: serde_json::Value =
            serde_json::from_str(&coord.channel().take_outbound().unwrap()).unwrap();
        assert_eq!(
            out["TickData"]["ScenicPlayers"][0]["movementData"]["stopButton"],
            false
        );
    }

    #[test]
    fn from_config_uses_catalog() {
        let config = rehab_bridge::BridgeConfig::from_toml(
            r#"
            [[catalog]]
            key = "Cube"
            kind = "object"
            "#,
        )
        .unwrap();
        let mut coord = SessionCoordinator::from_config(&config, MemoryChannel::new()).unwrap();
        let mut host = Host::default();

        let report = step(&mut coord, &mut host, &spawn(1, &["Cube", "Avatar"]));
        assert_eq!(report.spawned.len(), 1);
        assert_eq!(coord.actions().len(), 14);
    }

    #[test]
    fn borrowed_channel_is_a_planner_channel() {
        let channel = MemoryChannel::new();
        let mut coord = SessionCoordinator::new(
            SessionConfig::default(),
            &channel,
            EntityRegistry::new(Default::default()),
            default_registry().unwrap(),
        );
        channel.push_inbound(tick(4));
        coord.cycle(&mut Host::default());
        assert_eq!(coord.last_tick(), 4);
        assert!(channel.take_outbound().is_some());
        let _ = channel.latest_inbound();
    }
}
