// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection supervisor scenarios against scripted printer clients.

mod common;

use std::sync::Arc;
use std::time::Duration;

use bambu_fleet::client::{PrinterClient, PrinterCommand, PrinterStatus, ServiceState};
use bambu_fleet::error::{ClientError, Error};
use bambu_fleet::event::{DeviceId, LifecycleKind};
use bambu_fleet::supervisor::{
    CONNECTION_LOST, ConnectionState, ReconnectionPolicy, Supervisor, SupervisorConfig,
};
use common::{Behaviour, MockFactory, RecordingSink, printer, wait_for};

const WAIT: Duration = Duration::from_secs(30);

fn supervisor(factory: &Arc<MockFactory>, sink: &Arc<RecordingSink>) -> Supervisor {
    Supervisor::new(factory.clone(), sink.clone(), SupervisorConfig::default())
}

fn state_of(supervisor: &Supervisor, id: &str) -> Option<ConnectionState> {
    supervisor
        .get_state(&DeviceId::new(id))
        .map(|s| s.connection_state)
}

async fn wait_for_state(supervisor: &Supervisor, id: &str, state: ConnectionState) -> bool {
    wait_for(WAIT, || state_of(supervisor, id) == Some(state)).await
}

// ============================================================================
// Connecting
// ============================================================================

mod connecting {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn connect_reports_connecting_then_connected() {
        let factory = MockFactory::new();
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        supervisor.connect(printer("a")).unwrap();
        assert_eq!(sink.lifecycle_kinds("a"), vec![LifecycleKind::Connecting]);

        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);
        assert_eq!(
            sink.lifecycle_kinds("a"),
            vec![LifecycleKind::Connecting, LifecycleKind::Connected]
        );

        let state = supervisor.get_state(&DeviceId::new("a")).unwrap();
        assert_eq!(state.name, "Printer a");
        assert_eq!(state.model, "X1C");
        assert!(state.error.is_empty());
        assert!(state.snapshot.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn connect_rejects_invalid_config() {
        let factory = MockFactory::new();
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        let mut config = printer("a");
        config.hostname = "  ".to_string();

        let err = supervisor.connect(config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(supervisor.is_empty());
        assert!(sink.all().is_empty());
        assert_eq!(factory.created("a"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn second_connect_is_a_no_op() {
        let factory = MockFactory::new();
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        supervisor.connect(printer("a")).unwrap();
        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);
        supervisor.connect(printer("a")).unwrap();

        assert_eq!(factory.created("a"), 1);
        assert_eq!(supervisor.len(), 1);
        assert_eq!(
            sink.lifecycle_kinds("a"),
            vec![LifecycleKind::Connecting, LifecycleKind::Connected]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_connects_keep_one_session() {
        let factory = MockFactory::new();
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let supervisor = supervisor.clone();
                scope.spawn(move || supervisor.connect(printer("a")).unwrap());
            }
        });

        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);
        assert_eq!(supervisor.len(), 1);
        assert_eq!(
            sink.lifecycle_kinds("a")
                .iter()
                .filter(|k| **k == LifecycleKind::Connecting)
                .count(),
            1
        );

        // Losing installs never started a retry loop.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let attempted = factory
            .clients("a")
            .iter()
            .filter(|c| c.connect_calls() > 0)
            .count();
        assert_eq!(attempted, 1);
        assert!(supervisor.session(&DeviceId::new("a")).unwrap().is_connected());

        // Every losing client was closed.
        for client in factory.clients("a") {
            if client.connect_calls() == 0 {
                assert_eq!(client.service_state(), ServiceState::Quit);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn connect_all_skips_manual_and_invalid() {
        let factory = MockFactory::new();
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        let mut manual = printer("manual");
        manual.auto_connect = false;
        let mut broken = printer("broken");
        broken.access_code.clear();

        let started = supervisor.connect_all(&[printer("a"), manual, broken, printer("b")]);

        assert_eq!(started, 2);
        assert_eq!(
            supervisor.device_ids(),
            vec![DeviceId::new("a"), DeviceId::new("b")]
        );
    }
}

// ============================================================================
// Retrying and recovery
// ============================================================================

mod retrying {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn unreachable_host_keeps_retrying() {
        let factory = MockFactory::new();
        factory.set_behaviour("a", Behaviour::unreachable());
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        supervisor.connect(printer("a")).unwrap();
        assert!(
            wait_for(WAIT, || supervisor
                .get_state(&DeviceId::new("a"))
                .is_some_and(|s| !s.error.is_empty()))
            .await
        );

        let state = supervisor.get_state(&DeviceId::new("a")).unwrap();
        assert_eq!(state.connection_state, ConnectionState::Connecting);
        assert!(state.error.contains("host unreachable"));

        tokio::time::sleep(Duration::from_secs(5)).await;
        let client = factory.latest("a").unwrap();
        assert!(client.connect_calls() >= 5);
        assert_eq!(sink.lifecycle_kinds("a"), vec![LifecycleKind::Connecting]);
        assert_eq!(state_of(&supervisor, "a"), Some(ConnectionState::Connecting));

        client.set_reachable(true);
        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);
        assert!(supervisor.get_state(&DeviceId::new("a")).unwrap().error.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_session_reconnects_after_delay() {
        let factory = MockFactory::new();
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        supervisor.connect(printer("a")).unwrap();
        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);
        let client = factory.latest("a").unwrap();
        let calls = client.connect_calls();

        client.drop_connection();

        let state = supervisor.get_state(&DeviceId::new("a")).unwrap();
        assert_eq!(state.connection_state, ConnectionState::Reconnecting);
        assert_eq!(state.error, CONNECTION_LOST);
        assert_eq!(
            sink.lifecycle("a").last().cloned(),
            Some((LifecycleKind::Reconnecting, CONNECTION_LOST.to_string()))
        );

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(state_of(&supervisor, "a"), Some(ConnectionState::Reconnecting));
        assert_eq!(client.connect_calls(), calls);

        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);
        assert_eq!(client.connect_calls(), calls + 1);
        assert_eq!(factory.created("a"), 1);
        assert_eq!(
            sink.lifecycle_kinds("a"),
            vec![
                LifecycleKind::Connecting,
                LifecycleKind::Connected,
                LifecycleKind::Reconnecting,
                LifecycleKind::Connected,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn client_side_reconnect_cancels_pending_recovery() {
        let factory = MockFactory::new();
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        supervisor.connect(printer("a")).unwrap();
        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);
        let client = factory.latest("a").unwrap();
        let calls = client.connect_calls();

        client.drop_connection();
        tokio::time::sleep(Duration::from_secs(1)).await;

        // The client restores the session on its own before the first attempt.
        client.set_service_state(ServiceState::Connected);
        assert_eq!(state_of(&supervisor, "a"), Some(ConnectionState::Connected));
        tokio::time::sleep(Duration::from_secs(1)).await;

        factory.set_behaviour(
            "a",
            Behaviour {
                reachable: false,
                connect_delay: Some(Duration::from_secs(10)),
                ..Behaviour::default()
            },
        );
        client.drop_connection();

        // Only the second drop's recovery may attempt, and not before its delay.
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(client.connect_calls(), calls);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(client.connect_calls(), calls + 1);
        assert_eq!(state_of(&supervisor, "a"), Some(ConnectionState::Reconnecting));
    }

    #[tokio::test(start_paused = true)]
    async fn finished_recovery_allows_the_next_one() {
        let factory = MockFactory::new();
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        supervisor.connect(printer("a")).unwrap();
        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);
        let client = factory.latest("a").unwrap();
        let calls = client.connect_calls();

        for round in 1..=2 {
            client.drop_connection();
            assert_eq!(state_of(&supervisor, "a"), Some(ConnectionState::Reconnecting));
            assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);
            assert_eq!(client.connect_calls(), calls + round);
        }
        assert_eq!(factory.created("a"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovery_gives_up_after_max_retries() {
        let factory = MockFactory::new();
        let sink = RecordingSink::new();
        let config = SupervisorConfig::default()
            .with_reconnection(ReconnectionPolicy::new().with_max_retries(2));
        let supervisor = Supervisor::new(factory.clone(), sink.clone(), config);

        supervisor.connect(printer("a")).unwrap();
        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);
        let client = factory.latest("a").unwrap();
        client.set_reachable(false);
        client.drop_connection();

        assert!(
            wait_for(Duration::from_secs(120), || state_of(&supervisor, "a")
                == Some(ConnectionState::Error))
            .await
        );
        let message = "Reconnection failed after 2 attempts".to_string();
        assert_eq!(
            sink.lifecycle("a").last().cloned(),
            Some((LifecycleKind::Error, message.clone()))
        );
        assert_eq!(supervisor.get_state(&DeviceId::new("a")).unwrap().error, message);

        // A session in error state can be connected again.
        factory.set_behaviour("a", Behaviour::default());
        supervisor.connect(printer("a")).unwrap();
        assert_eq!(factory.created("a"), 2);
        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_retries() {
        let factory = MockFactory::new();
        factory.set_behaviour("a", Behaviour::unreachable());
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        supervisor.connect(printer("a")).unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        supervisor.disconnect(&DeviceId::new("a")).unwrap();

        let client = factory.latest("a").unwrap();
        let calls = client.connect_calls();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(client.connect_calls(), calls);
    }
}

// ============================================================================
// Disconnecting and configuration changes
// ============================================================================

mod lifecycle {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn disconnect_then_connect_recovers() {
        let factory = MockFactory::new();
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);
        let id = DeviceId::new("a");

        supervisor.connect(printer("a")).unwrap();
        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);
        let first = factory.latest("a").unwrap();

        supervisor.disconnect(&id).unwrap();
        assert!(supervisor.get_state(&id).is_none());
        assert_eq!(first.service_state(), ServiceState::Quit);
        assert_eq!(
            sink.lifecycle_kinds("a").last(),
            Some(&LifecycleKind::Disconnected)
        );
        assert_eq!(
            sink.state_updates("a").last().map(|s| s.connection_state),
            Some(ConnectionState::Disconnected)
        );

        supervisor.connect(printer("a")).unwrap();
        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);
        assert_eq!(factory.created("a"), 2);
        assert_eq!(
            sink.lifecycle_kinds("a"),
            vec![
                LifecycleKind::Connecting,
                LifecycleKind::Connected,
                LifecycleKind::Disconnected,
                LifecycleKind::Connecting,
                LifecycleKind::Connected,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_unknown_device_fails() {
        let factory = MockFactory::new();
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        let err = supervisor.disconnect(&DeviceId::new("ghost")).unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound(id) if id.as_str() == "ghost"));
    }

    #[tokio::test(start_paused = true)]
    async fn updates_from_replaced_session_are_ignored() {
        let factory = MockFactory::new();
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        supervisor.connect(printer("a")).unwrap();
        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);
        let old = factory.latest("a").unwrap();

        supervisor.reconnect(printer("a")).unwrap();
        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);
        sink.clear();

        old.drop_connection();
        assert_eq!(state_of(&supervisor, "a"), Some(ConnectionState::Connected));
        assert!(sink.all().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sync_configs_applies_differences() {
        let factory = MockFactory::new();
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        supervisor.connect_all(&[printer("a"), printer("b")]);
        assert!(wait_for_state(&supervisor, "b", ConnectionState::Connected).await);

        let renamed = printer("b").with_name("Renamed");
        supervisor.sync_configs(&[renamed.clone(), printer("c")]);

        assert_eq!(
            supervisor.device_ids(),
            vec![DeviceId::new("b"), DeviceId::new("c")]
        );
        assert_eq!(
            sink.lifecycle_kinds("a").last(),
            Some(&LifecycleKind::Disconnected)
        );
        assert_eq!(factory.created("b"), 1);
        assert_eq!(
            supervisor.get_state(&DeviceId::new("b")).unwrap().name,
            "Renamed"
        );

        let mut moved = renamed;
        moved.hostname = "10.0.0.9".to_string();
        supervisor.sync_configs(&[moved, printer("c")]);
        assert_eq!(factory.created("b"), 2);
        assert_eq!(
            supervisor
                .printer_config(&DeviceId::new("b"))
                .unwrap()
                .hostname,
            "10.0.0.9"
        );
        assert!(wait_for_state(&supervisor, "b", ConnectionState::Connected).await);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_all_disconnects_everything() {
        let factory = MockFactory::new();
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        supervisor.connect_all(&[printer("a"), printer("b")]);
        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);

        supervisor.shutdown_all();

        assert!(supervisor.is_empty());
        for id in ["a", "b"] {
            assert_eq!(
                sink.lifecycle_kinds(id).last(),
                Some(&LifecycleKind::Disconnected)
            );
            assert_eq!(
                factory.latest(id).unwrap().service_state(),
                ServiceState::Quit
            );
        }
    }
}

// ============================================================================
// State updates and queries
// ============================================================================

mod updates {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn bursts_are_throttled_to_one_update() {
        let factory = MockFactory::new();
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        supervisor.connect(printer("a")).unwrap();
        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);
        let client = factory.latest("a").unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        sink.clear();

        for layer in 1..=10 {
            client.push(|report| report.status.current_layer = Some(layer));
        }
        let updates = sink.state_updates("a");
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].snapshot.as_ref().unwrap().current_layer, 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        client.push(|report| report.status.current_layer = Some(11));
        let updates = sink.state_updates("a");
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].snapshot.as_ref().unwrap().current_layer, 11);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_fields_fall_back_to_defaults() {
        let factory = MockFactory::new();
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        supervisor.connect(printer("a")).unwrap();
        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);
        tokio::time::sleep(Duration::from_secs(2)).await;

        let status = PrinterStatus::from_json(serde_json::json!({
            "gcode_state": "RUNNING",
            "print_percentage": "not a number",
            "ams_units": "broken",
            "climate": {"bed_temp": 61.5, "chamber_temp": [1, 2]},
        }));
        factory
            .latest("a")
            .unwrap()
            .push(move |report| report.status = status);

        let state = supervisor.get_state(&DeviceId::new("a")).unwrap();
        let snapshot = state.snapshot.unwrap();
        assert_eq!(snapshot.gcode_state, "RUNNING");
        assert_eq!(snapshot.print_percentage, 0);
        assert!(snapshot.ams_units.is_empty());
        assert!((snapshot.bed_temp - 61.5).abs() < f64::EPSILON);
        assert!(snapshot.chamber_temp.abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn queries_do_not_wait_for_slow_connects() {
        let factory = MockFactory::new();
        factory.set_behaviour("slow", Behaviour::slow(Duration::from_secs(60)));
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        supervisor.connect_all(&[printer("slow"), printer("fast")]);
        assert!(wait_for_state(&supervisor, "fast", ConnectionState::Connected).await);

        let states = supervisor.get_all_states();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].device_id.as_str(), "fast");
        assert_eq!(states[1].device_id.as_str(), "slow");
        assert_eq!(states[1].connection_state, ConnectionState::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn state_update_serializes_as_tagged_json() {
        let factory = MockFactory::new();
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        supervisor.connect(printer("a")).unwrap();
        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);

        let notification = sink.all().into_iter().last().unwrap();
        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["type"], "state_update");
        assert_eq!(json["device_id"], "a");
        assert_eq!(json["connection_state"], "connected");
    }
}

// ============================================================================
// Commands and connection tests
// ============================================================================

mod commands {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn execute_checks_device_and_connection() {
        let factory = MockFactory::new();
        factory.set_behaviour("a", Behaviour::unreachable());
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);
        let id = DeviceId::new("a");

        let err = supervisor
            .execute(&DeviceId::new("ghost"), PrinterCommand::Pause)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound(_)));

        supervisor.connect(printer("a")).unwrap();
        let err = supervisor.execute(&id, PrinterCommand::Pause).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected(_)));

        factory.latest("a").unwrap().set_reachable(true);
        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);
        supervisor.execute(&id, PrinterCommand::Pause).await.unwrap();
        assert_eq!(factory.latest("a").unwrap().commands(), vec![PrinterCommand::Pause]);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_command_keeps_connection() {
        let factory = MockFactory::new();
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);
        let id = DeviceId::new("a");

        supervisor.connect(printer("a")).unwrap();
        assert!(wait_for_state(&supervisor, "a", ConnectionState::Connected).await);
        factory.latest("a").unwrap().reject_commands(true);

        let err = supervisor
            .execute(&id, PrinterCommand::SetLight { on: true })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Client(ClientError::CommandRejected(_))));
        assert_eq!(state_of(&supervisor, "a"), Some(ConnectionState::Connected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_reports_model_and_closes_client() {
        let factory = MockFactory::new();
        factory.set_behaviour(
            "a",
            Behaviour {
                model: "P1S".to_string(),
                ..Behaviour::default()
            },
        );
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        let result = supervisor.test_connection(&printer("a")).await;

        assert!(result.success);
        assert_eq!(result.message, "Connected successfully");
        assert_eq!(result.printer_model.as_deref(), Some("P1S"));
        assert_eq!(factory.latest("a").unwrap().service_state(), ServiceState::Quit);
        assert!(supervisor.is_empty());
        assert!(sink.all().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_failures() {
        let factory = MockFactory::new();
        factory.set_behaviour("down", Behaviour::unreachable());
        factory.set_behaviour("slow", Behaviour::slow(Duration::from_secs(60)));
        let sink = RecordingSink::new();
        let supervisor = supervisor(&factory, &sink);

        let down = supervisor.test_connection(&printer("down")).await;
        assert!(!down.success);
        assert!(down.message.contains("host unreachable"));
        assert_eq!(down.printer_model, None);

        let slow = supervisor.test_connection(&printer("slow")).await;
        assert!(!slow.success);
        assert_eq!(slow.message, "timed out after 15000 ms");

        let mut invalid = printer("x");
        invalid.serial_number.clear();
        let invalid = supervisor.test_connection(&invalid).await;
        assert!(!invalid.success);
        assert!(invalid.message.contains("serial_number"));
    }
}
