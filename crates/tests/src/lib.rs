//! # Integration Tests
//!
//! End-to-end tests across crates.
//!
//! Covers:
//! - configuration round trips
//! - config -> builder -> fork -> real sinks
//! - failure policies over nested forks

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{FailurePolicy, SinkType};

    const NESTED_TOML: &str = r#"
[fork]
name = "tee"
policy = "strict"

[[sinks]]
name = "console"
sink_type = "log"

[[sinks]]
name = "mirror"
sink_type = "fork"
policy = "ignore_errors"

[[sinks.sinks]]
name = "primary"
sink_type = "file"
params = { path = "/tmp/primary.log" }

[[sinks.sinks]]
name = "scratch"
sink_type = "memory"
"#;

    #[test]
    fn test_nested_config_round_trip() {
        let blueprint = ConfigLoader::load_from_str(NESTED_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(blueprint.fork.name, "tee");
        assert_eq!(blueprint.leaf_count(), 3);

        let mirror = &blueprint.sinks[1];
        assert_eq!(mirror.sink_type, SinkType::Fork);
        assert_eq!(mirror.policy, Some(FailurePolicy::Permissive));

        let json = ConfigLoader::render(&blueprint, ConfigFormat::Json).unwrap();
        let reloaded = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(reloaded.leaf_count(), 3);
        assert_eq!(reloaded.sinks[1].sinks[0].params["path"], "/tmp/primary.log");

        let toml = ConfigLoader::render(&blueprint, ConfigFormat::Toml).unwrap();
        let reloaded = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(reloaded.sinks[1].policy, Some(FailurePolicy::Permissive));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{Chunk, ContractError, FailurePolicy, SinkConfig, SinkType};
    use fanout::{
        create_sink_handle, DataSink, ForkBuilder, ForkSink, MemorySink, MemorySinkControl,
        SinkHandle,
    };
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn memory_handles(names: &[&str]) -> (Vec<SinkHandle>, Vec<MemorySinkControl>) {
        names
            .iter()
            .map(|name| {
                let (sink, control) = MemorySink::new(*name);
                (SinkHandle::spawn(sink, 4), control)
            })
            .unzip()
    }

    /// Config file -> ForkBuilder -> two file sinks
    #[tokio::test]
    async fn test_config_to_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.log");
        let second = dir.path().join("nested").join("second.log");
        let config = format!(
            r#"
[fork]
name = "files"

[[sinks]]
name = "first"
sink_type = "file"
params = {{ path = "{}" }}

[[sinks]]
name = "second"
sink_type = "file"
params = {{ path = "{}", append = "false" }}
"#,
            first.display(),
            second.display()
        );
        let path = dir.path().join("fork.toml");
        std::fs::write(&path, config).unwrap();

        let blueprint = ConfigLoader::load_from_path(&path).unwrap();
        let mut fork = ForkBuilder::new(blueprint).build().await.unwrap();
        assert_eq!(fork.live_targets(), vec!["first", "second"]);

        for line in ["alpha\n", "beta\n"] {
            fork.write(&Chunk::text(line)).await.unwrap();
        }
        fork.close().await.unwrap();

        for file in [&first, &second] {
            assert_eq!(std::fs::read_to_string(file).unwrap(), "alpha\nbeta\n");
        }
    }

    /// Strict: [T1, T2], T1 fails the second write
    #[tokio::test]
    async fn test_strict_scenario() {
        let (handles, controls) = memory_handles(&["t1", "t2"]);
        let mut fork = ForkSink::new("strict", handles, FailurePolicy::Strict);

        fork.write(&Chunk::text("x")).await.unwrap();
        assert_eq!(fork.live_targets(), vec!["t1", "t2"]);

        controls[0].fail_next_write("E");
        let err = fork.write(&Chunk::text("y")).await.unwrap_err();
        assert_eq!(err.sink_name(), Some("t1"));
        assert_eq!(fork.live_targets(), vec!["t2"]);

        fork.write(&Chunk::text("z")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!controls[0].is_closed());

        fork.close().await.unwrap();

        assert_eq!(controls[0].texts(), vec!["x"]);
        assert_eq!(controls[1].texts(), vec!["x", "y", "z"]);
        assert!(controls[1].is_closed());
        assert!(!controls[0].is_closed());
    }

    /// Permissive: [T1], T1 fails the first write
    #[tokio::test]
    async fn test_permissive_scenario() {
        let (handles, controls) = memory_handles(&["t1"]);
        let mut fork = ForkSink::new("permissive", handles, FailurePolicy::Permissive);

        controls[0].fail_writes("gone");
        fork.write(&Chunk::text("x")).await.unwrap();
        assert!(fork.is_empty());

        fork.write(&Chunk::text("y")).await.unwrap();
        assert!(fork.is_empty());
        assert_eq!(controls[0].write_attempts(), 1);
        fork.close().await.unwrap();
    }

    /// An inner permissive fork hides its failures from a strict outer fork
    #[tokio::test]
    async fn test_nested_fork_isolation() {
        let (inner_handles, inner_controls) = memory_handles(&["inner_a", "inner_b"]);
        let inner = ForkSink::new("inner", inner_handles, FailurePolicy::Permissive);

        let (mut outer_handles, outer_controls) = memory_handles(&["outer"]);
        outer_handles.push(SinkHandle::spawn(inner, 4));
        let mut outer = ForkSink::new("outer", outer_handles, FailurePolicy::Strict);

        inner_controls[0].fail_writes("broken");
        outer.write(&Chunk::text("x")).await.unwrap();
        outer.write(&Chunk::text("y")).await.unwrap();
        assert_eq!(outer.live_targets(), vec!["outer", "inner"]);

        outer.close().await.unwrap();
        assert_eq!(outer_controls[0].texts(), vec!["x", "y"]);
        assert_eq!(inner_controls[1].texts(), vec!["x", "y"]);
        assert!(inner_controls[1].is_closed());
    }

    /// A strict inner fork surfaces its failure, so the outer fork drops it
    #[tokio::test]
    async fn test_nested_strict_failure_drops_inner_fork() {
        let (inner_handles, inner_controls) = memory_handles(&["a"]);
        let inner = ForkSink::new("inner", inner_handles, FailurePolicy::Strict);
        let (mut handles, controls) = memory_handles(&["b"]);
        handles.insert(0, SinkHandle::spawn(inner, 4));
        let mut outer = ForkSink::new("outer", handles, FailurePolicy::Permissive);

        inner_controls[0].fail_next_write("disk full");
        outer.write(&Chunk::text("x")).await.unwrap();
        assert_eq!(outer.live_targets(), vec!["b"]);

        outer.close().await.unwrap();
        assert_eq!(controls[0].texts(), vec!["x"]);

        // Neither the dropped inner fork nor its target were closed
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!inner_controls[0].is_closed());
    }

    /// Out-of-band faults before the first write escalate, later ones only drop
    #[tokio::test]
    async fn test_network_hang_up_before_first_write_escalates() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let net = SinkConfig::new("net", SinkType::Network).with_param("addr", addr.to_string());
        let net_handle = create_sink_handle(&net).await.unwrap();
        let (peer, _) = listener.accept().await.unwrap();

        let (mut handles, controls) = memory_handles(&["mem"]);
        handles.insert(0, net_handle);
        let mut fork = ForkSink::new("tee", handles, FailurePolicy::Strict);
        let mut escalated = fork.take_faults().unwrap();

        drop(peer);
        tokio::time::timeout(Duration::from_secs(2), fork.observe_faults())
            .await
            .unwrap();

        let fault = escalated.try_recv().unwrap();
        assert!(matches!(fault, ContractError::SinkFault { .. }));
        assert_eq!(fork.live_targets(), vec!["mem"]);

        fork.write(&Chunk::text("x")).await.unwrap();
        controls[0].raise_fault("late");
        fork.write(&Chunk::text("y")).await.unwrap();

        // Dropped at the second write without escalation
        assert!(fork.is_empty());
        assert!(escalated.try_recv().is_err());
        fork.close().await.unwrap();
    }

    /// Length-prefixed frames reach the peer in write order
    #[tokio::test]
    async fn test_network_framing_from_config() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = format!(
            r#"{{
  "fork": {{ "name": "wire" }},
  "sinks": [
    {{
      "name": "net",
      "sink_type": "network",
      "params": {{ "addr": "{}", "framing": "length_prefixed" }}
    }}
  ]
}}"#,
            listener.local_addr().unwrap()
        );

        let blueprint = ConfigLoader::load_from_str(&config, ConfigFormat::Json).unwrap();
        let mut fork = ForkBuilder::new(blueprint).build().await.unwrap();
        let (mut peer, _) = listener.accept().await.unwrap();

        fork.write(&Chunk::text("ab")).await.unwrap();
        fork.write(&Chunk::text("c")).await.unwrap();
        fork.close().await.unwrap();

        let mut received = Vec::new();
        peer.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, [0, 0, 0, 2, b'a', b'b', 0, 0, 0, 1, b'c']);
    }

    /// A fork used through the sink trait behaves like any target
    #[tokio::test]
    async fn test_fork_as_data_sink() {
        let (handles, controls) = memory_handles(&["a", "b"]);
        let mut fork = ForkSink::new("generic", handles, FailurePolicy::Strict);

        async fn pump<S: DataSink>(sink: &mut S) -> Result<(), ContractError> {
            sink.write(&Chunk::text("one")).await?;
            sink.flush().await?;
            sink.close().await
        }

        pump(&mut fork).await.unwrap();
        assert_eq!(DataSink::name(&fork), "generic");
        for control in &controls {
            assert_eq!(control.texts(), vec!["one"]);
            assert!(control.is_closed());
        }
    }
}
