//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置样例与合约测试
//! - 模拟 e2e 测试（无需仿真器与共享内存）

#[cfg(test)]
mod contract_tests {
    use std::path::Path;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::BridgeBlueprint;

    #[test]
    fn test_sample_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/bridge.toml");
        let blueprint = ConfigLoader::load_from_path(&path).unwrap();
        assert!(!blueprint.channels.is_empty());
        assert!(blueprint.to_registry().is_ok());
    }

    #[test]
    fn test_default_blueprint_survives_toml() {
        let blueprint = BridgeBlueprint::default();
        let toml = ConfigLoader::to_toml(&blueprint).unwrap();
        let parsed = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(parsed.channels, blueprint.channels);
        assert_eq!(parsed.server.port, blueprint.server.port);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use attacher::SharedBufferAttacher;
    use broadcast::{memory_sink, BroadcastHub, CommandRelay, HubSources, SettingsChannel};
    use contracts::{
        fields, BridgeBlueprint, CadenceConfig, ChannelDescriptor, ChannelRegistry, ControlValue,
        ProducerConfig, ProducerEvent, ProducerMessage, SubscriberRole, DEFAULT_READY_TAG,
    };
    use ingestion::{FrameProcessor, SignalWaiter, DATA_URI_PREFIX};
    use producer_link::{
        mock_link, EventTargets, MockProducerRemote, ProducerHandle, ProducerWorker,
        SimulatedProducer, WorkerStats,
    };
    use snapshot_store::{BridgeStateCell, FrameStore, TelemetryMirror};
    use tokio::task::JoinHandle;
    use tokio_util::sync::CancellationToken;

    /// Everything between the producer link and the subscribers.
    struct Bridge {
        registry: ChannelRegistry,
        hub: Arc<BroadcastHub>,
        waiter: Arc<SignalWaiter>,
        producer: ProducerHandle,
        remote: MockProducerRemote,
        worker: JoinHandle<WorkerStats>,
        cancel: CancellationToken,
    }

    fn bridge() -> Bridge {
        let registry = ChannelRegistry::new(vec![
            ChannelDescriptor::color("mobile_rgb", 24, 32),
            ChannelDescriptor::color("hand_rgb", 24, 32),
        ])
        .unwrap();
        let blueprint = BridgeBlueprint::default();
        let cancel = CancellationToken::new();

        let frames = Arc::new(FrameStore::new(&registry));
        let telemetry = Arc::new(TelemetryMirror::new(&blueprint.telemetry.to_schema()));
        let bridge_state = Arc::new(BridgeStateCell::default());
        let waiter = Arc::new(SignalWaiter::new(DEFAULT_READY_TAG));

        let (producer, outbound) = ProducerHandle::channel(16);
        let (client, remote) = mock_link();
        let targets = EventTargets {
            waiter: Arc::clone(&waiter),
            telemetry: Arc::clone(&telemetry),
            bridge_state: Arc::clone(&bridge_state),
        };
        let worker = tokio::spawn(ProducerWorker::new(client, targets, outbound).run(cancel.clone()));

        let hub = BroadcastHub::new(
            HubSources {
                frames,
                telemetry,
                bridge_state,
            },
            CadenceConfig::default(),
            cancel.clone(),
        );

        Bridge {
            registry,
            hub,
            waiter,
            producer,
            remote,
            worker,
            cancel,
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(3), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    /// Simulated producer -> in-memory regions -> FrameProcessor -> FrameStore
    /// -> BroadcastHub -> image subscriber
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_frames_reach_image_subscriber() {
        let bridge = bridge();
        let regions = attacher::InMemoryRegions::new();
        let mut simulator = SimulatedProducer::new(
            bridge.registry.clone(),
            regions.clone(),
            bridge.remote.clone(),
            &ProducerConfig::default(),
            DEFAULT_READY_TAG,
        );
        simulator.create_regions();

        let attacher = Arc::new(SharedBufferAttacher::new(
            bridge.registry.clone(),
            Arc::new(regions),
        ));
        assert!(attacher.attach_all().is_complete());

        let processor = FrameProcessor::new(
            &BridgeBlueprint::default().processing,
            Arc::clone(&attacher),
            Arc::clone(&bridge.hub.sources().frames),
            Arc::clone(&bridge.waiter),
        )
        .spawn()
        .unwrap();

        let (sink, mut rx) = memory_sink("gui");
        let subscription = bridge.hub.subscribe(SubscriberRole::Image, sink).unwrap();

        // nothing is published while every slot still holds the placeholder
        assert_eq!(bridge.hub.publish(SubscriberRole::Image), None);

        let frames = Arc::clone(&bridge.hub.sources().frames);
        wait_until(|| {
            assert!(simulator.emit_frame(ingestion::system_clock_ns()));
            frames.snapshot().populated() == 2
        })
        .await;

        assert!(bridge.hub.publish(SubscriberRole::Image).is_some());
        let message = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&message).unwrap();
        for channel in ["mobile_rgb", "hand_rgb"] {
            let uri = value["images"][channel].as_str().unwrap();
            assert!(uri.starts_with(DATA_URI_PREFIX), "{channel}: {uri:.40}");
        }
        assert!(value["server_send_timestamp_ms"].as_i64().unwrap() > 0);

        let snapshot = tokio::task::spawn_blocking(move || processor.shutdown())
            .await
            .unwrap();
        assert!(snapshot.frames_published >= 2);

        bridge.cancel.cancel();
        subscription.finished().await;
        bridge.worker.await.unwrap();
    }

    /// Operator command -> CommandRelay -> telemetry mirror -> data subscriber,
    /// and the command reaches the producer link.
    #[tokio::test]
    async fn test_e2e_command_mirrored_to_data_subscriber() {
        let bridge = bridge();
        let relay = CommandRelay::new(
            bridge.producer.clone(),
            Arc::clone(&bridge.hub.sources().telemetry),
        );

        let (sink, mut rx) = memory_sink("gui");
        let _subscription = bridge.hub.subscribe(SubscriberRole::Data, sink).unwrap();

        relay
            .handle(r#"{"MobileValue": {"linear_accel": -0.5, "steer": 1.0}}"#)
            .unwrap();
        bridge.hub.publish(SubscriberRole::Data).unwrap();

        let message = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&message).unwrap();
        assert_eq!(value[fields::GEAR_STATUS], "reverse");
        assert_eq!(value[fields::ACCEL], -50.0);
        assert_eq!(value[fields::ANGLE], 90.0);

        let remote = &bridge.remote;
        wait_until(|| remote.sent_count() == 1).await;
        assert!(matches!(
            &remote.sent()[0],
            ProducerMessage::MasterInfo(c) if c.mobile.linear_accel == -0.5
        ));

        bridge.cancel.cancel();
        bridge.worker.await.unwrap();
    }

    /// Producer `slave_info` -> BridgeStateCell -> bridge subscriber.
    #[tokio::test]
    async fn test_e2e_robot_state_reaches_bridge_subscriber() {
        let bridge = bridge();
        let (sink, mut rx) = memory_sink("ros");
        let _subscription = bridge.hub.subscribe(SubscriberRole::Bridge, sink).unwrap();

        let mut state = ControlValue::default();
        state.stamp = 12.5;
        state.gripper.position = 40.0;
        assert!(bridge.remote.emit(ProducerEvent::SlaveInfo(state)));

        let cell = Arc::clone(&bridge.hub.sources().bridge_state);
        wait_until(|| cell.snapshot().stamp == 12.5).await;
        bridge.hub.publish(SubscriberRole::Bridge).unwrap();

        let message = rx.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&message).unwrap();
        assert_eq!(value["stamp"], 12.5);
        assert_eq!(value["GripperValue"]["position"], 40.0);

        bridge.cancel.cancel();
        bridge.worker.await.unwrap();
    }

    /// Settings connection -> SettingsChannel -> producer link.
    #[tokio::test]
    async fn test_e2e_settings_forwarded_to_producer() {
        let bridge = bridge();
        let settings = SettingsChannel::new(bridge.producer.clone());

        let (tx, source) = broadcast::memory_source("settings-gui");
        let (sink, mut replies) = memory_sink("settings-gui");
        tx.send(r#"{"type": "dataset_setting", "Hertz": 15, "fileName": "run_7"}"#.into())
            .unwrap();
        tx.send(r#"{"type": "start_recording"}"#.into()).unwrap();
        drop(tx);

        let stats = settings.run(source, sink, CancellationToken::new()).await;
        assert_eq!(stats.acknowledged, 2);
        assert_eq!(
            replies.recv().await.as_deref(),
            Some(broadcast::ACK_DATASET_SETTINGS)
        );
        assert_eq!(replies.recv().await.as_deref(), Some("ACK: start_recording"));

        let remote = &bridge.remote;
        wait_until(|| remote.sent_count() == 2).await;
        let sent = remote.sent();
        let ProducerMessage::DatasetSettings { data } = &sent[0] else {
            panic!("expected dataset_settings, got {:?}", sent[0]);
        };
        let forwarded: serde_json::Value = serde_json::from_str(data).unwrap();
        assert_eq!(forwarded["HZ"], 15);
        assert_eq!(forwarded["fileName"], "run_7");
        assert_eq!(
            sent[1],
            ProducerMessage::RecordingState {
                data: "start_recording".into()
            }
        );

        bridge.cancel.cancel();
        bridge.worker.await.unwrap();
    }
}
