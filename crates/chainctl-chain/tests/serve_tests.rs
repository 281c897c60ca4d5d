//! Serve supervisor tests
//!
//! Real child processes (shell-script node stubs), recording generator and
//! toolchain. Unix only.

#![cfg(unix)]

use chainctl_chain::{Chain, ChainError, ProcessError, ServeEvent};
use chainctl_test_utils::{
    drain, event_channel, wait_for, AppFixture, Pace, RecordingGenerator, RecordingToolchain,
    CRASHING_NODE, LONG_RUNNING_NODE,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(20);

struct Harness {
    fixture: AppFixture,
    generator: Arc<RecordingGenerator>,
    toolchain: Arc<RecordingToolchain>,
    events: UnboundedReceiver<ServeEvent>,
    chain: Chain,
}

impl Harness {
    fn new(node: &str) -> Self {
        Self::with_generator(node, RecordingGenerator::new())
    }

    fn with_generator(node: &str, generator: Arc<RecordingGenerator>) -> Self {
        Self::with_collaborators(node, generator, RecordingToolchain::new())
    }

    fn with_collaborators(
        node: &str,
        generator: Arc<RecordingGenerator>,
        toolchain: Arc<RecordingToolchain>,
    ) -> Self {
        let fixture = AppFixture::stargate();
        fixture.install_node(node);
        let (tx, events) = event_channel();
        let chain = Chain::new(
            fixture.path(),
            fixture.options(&generator, &toolchain).with_events(tx),
        )
        .unwrap();
        Self {
            fixture,
            generator,
            toolchain,
            events,
            chain,
        }
    }

    fn start(self, shutdown: CancellationToken) -> (Running, UnboundedReceiver<ServeEvent>) {
        let Self {
            fixture,
            generator,
            toolchain,
            events,
            mut chain,
        } = self;
        let refresher = chain.refresher();
        let handle = tokio::spawn(async move {
            let result = chain.serve(shutdown).await;
            (chain, result)
        });
        (
            Running {
                fixture,
                generator,
                toolchain,
                refresher,
                handle,
            },
            events,
        )
    }
}

struct Running {
    fixture: AppFixture,
    generator: Arc<RecordingGenerator>,
    toolchain: Arc<RecordingToolchain>,
    refresher: chainctl_chain::Refresher,
    handle: JoinHandle<(Chain, chainctl_chain::Result<()>)>,
}

impl Running {
    async fn finish(self) -> (Chain, chainctl_chain::Result<()>) {
        tokio::time::timeout(WAIT, self.handle)
            .await
            .expect("serve did not return")
            .unwrap()
    }
}

fn is_started(e: &ServeEvent) -> bool {
    matches!(e, ServeEvent::Started { .. })
}

/// Receive events up to and including the first one matching `want`
async fn collect_until<F>(events: &mut UnboundedReceiver<ServeEvent>, want: F) -> Vec<ServeEvent>
where
    F: Fn(&ServeEvent) -> bool,
{
    let mut seen = Vec::new();
    loop {
        let event = wait_for(events, WAIT, |_| true).await;
        let done = want(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

fn started_pid(event: ServeEvent) -> u32 {
    match event {
        ServeEvent::Started { pid } => pid.unwrap(),
        other => panic!("expected Started, got {other:?}"),
    }
}

#[tokio::test]
async fn first_pass_generates_builds_and_starts() {
    let shutdown = CancellationToken::new();
    let (running, mut events) = Harness::new(LONG_RUNNING_NODE).start(shutdown.clone());

    let started = wait_for(&mut events, WAIT, is_started).await;
    assert_eq!(running.generator.calls(), 1);
    assert_eq!(RecordingToolchain::count(&running.toolchain.tidy), 1);
    assert_eq!(RecordingToolchain::count(&running.toolchain.format), 1);
    assert_eq!(RecordingToolchain::count(&running.toolchain.install), 1);
    assert_eq!(RecordingToolchain::count(&running.toolchain.verify), 0);

    shutdown.cancel();
    let (chain, result) = running.finish().await;
    result.unwrap();
    assert!(!chain.is_serving());
    assert!(chain.last_generation().is_some());
    wait_for(&mut events, WAIT, |e| *e == ServeEvent::Stopped).await;

    #[cfg(target_os = "linux")]
    assert!(!chainctl_test_utils::process_alive(started_pid(started)));
    #[cfg(not(target_os = "linux"))]
    drop(started);
}

#[tokio::test(flavor = "current_thread")]
async fn refresh_burst_restarts_exactly_once() {
    let shutdown = CancellationToken::new();
    let (running, mut events) = Harness::new(LONG_RUNNING_NODE).start(shutdown.clone());
    wait_for(&mut events, WAIT, is_started).await;

    let accepted = (0..5).filter(|_| running.refresher.request()).count();
    assert_eq!(accepted, 1);

    wait_for(&mut events, WAIT, |e| *e == ServeEvent::Restarting).await;
    wait_for(&mut events, WAIT, is_started).await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    let late = drain(&mut events);
    assert!(
        !late.iter().any(|e| is_started(e) || *e == ServeEvent::Restarting),
        "unexpected events after restart: {late:?}"
    );

    // Proto sources did not change: no second generation.
    assert_eq!(running.generator.calls(), 1);
    assert_eq!(RecordingToolchain::count(&running.toolchain.install), 2);

    shutdown.cancel();
    running.finish().await.1.unwrap();
}

#[tokio::test]
async fn burst_spanning_rebuild_restarts_once() {
    let shutdown = CancellationToken::new();
    let harness = Harness::with_collaborators(
        LONG_RUNNING_NODE,
        RecordingGenerator::new(),
        RecordingToolchain::paced(Pace::Slow(Duration::from_millis(500))),
    );
    let (running, mut events) = harness.start(shutdown.clone());
    wait_for(&mut events, WAIT, is_started).await;

    for _ in 0..10 {
        running.refresher.request();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let mut seen = collect_until(&mut events, is_started).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    seen.extend(drain(&mut events));

    let restarts = seen.iter().filter(|e| **e == ServeEvent::Restarting).count();
    assert_eq!(restarts, 1, "{seen:?}");
    assert_eq!(seen.iter().filter(|e| is_started(e)).count(), 1, "{seen:?}");
    assert_eq!(RecordingToolchain::count(&running.toolchain.install), 2);

    shutdown.cancel();
    running.finish().await.1.unwrap();
}

#[tokio::test]
async fn cancel_during_rebuild_stops_cleanly() {
    let shutdown = CancellationToken::new();
    let harness = Harness::with_collaborators(
        LONG_RUNNING_NODE,
        RecordingGenerator::new(),
        RecordingToolchain::paced(Pace::UntilCancelled),
    );
    let (running, mut events) = harness.start(shutdown.clone());
    let first = wait_for(&mut events, WAIT, is_started).await;

    assert!(running.refresher.request());
    wait_for(&mut events, WAIT, |e| *e == ServeEvent::Restarting).await;
    wait_for(&mut events, WAIT, |e| *e == ServeEvent::Building).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!running.handle.is_finished());

    shutdown.cancel();
    let toolchain = running.toolchain.clone();
    let (chain, result) = running.finish().await;
    result.unwrap();
    assert!(!chain.is_serving());
    assert_eq!(RecordingToolchain::count(&toolchain.install), 2);

    let rest = drain(&mut events);
    assert!(!rest.iter().any(is_started), "{rest:?}");
    assert_eq!(rest.last(), Some(&ServeEvent::Stopped));

    #[cfg(target_os = "linux")]
    assert!(!chainctl_test_utils::process_alive(started_pid(first)));
    #[cfg(not(target_os = "linux"))]
    drop(first);
}

#[tokio::test]
async fn proto_edit_during_generation_regenerates() {
    let shutdown = CancellationToken::new();
    let harness = Harness::with_collaborators(
        LONG_RUNNING_NODE,
        RecordingGenerator::paced(Pace::Slow(Duration::from_millis(500))),
        RecordingToolchain::new(),
    );
    let root = harness.fixture.path().to_path_buf();
    let (running, mut events) = harness.start(shutdown.clone());
    wait_for(&mut events, WAIT, is_started).await;

    std::fs::write(root.join("proto/mars/tx.proto"), "syntax = \"proto3\";\n").unwrap();
    wait_for(&mut events, WAIT, |e| *e == ServeEvent::Generating).await;
    std::fs::write(root.join("proto/mars/query.proto"), "syntax = \"proto3\";\n").unwrap();

    wait_for(&mut events, WAIT, is_started).await;
    wait_for(&mut events, WAIT, |e| *e == ServeEvent::Generating).await;
    wait_for(&mut events, WAIT, is_started).await;
    assert_eq!(running.generator.calls(), 3);

    shutdown.cancel();
    running.finish().await.1.unwrap();
}

#[tokio::test]
async fn proto_change_regenerates() {
    let shutdown = CancellationToken::new();
    let harness = Harness::new(LONG_RUNNING_NODE);
    harness.fixture.write("x/mars/keeper.go", "package mars\n");
    let proto = harness.fixture.path().join("proto/mars/tx.proto");
    let (running, mut events) = harness.start(shutdown.clone());

    wait_for(&mut events, WAIT, is_started).await;
    std::fs::write(&proto, "syntax = \"proto3\";\nmessage MsgCreate {}\n").unwrap();

    wait_for(&mut events, WAIT, |e| *e == ServeEvent::Restarting).await;
    wait_for(&mut events, WAIT, |e| *e == ServeEvent::Generated).await;
    wait_for(&mut events, WAIT, is_started).await;
    assert_eq!(running.generator.calls(), 2);

    shutdown.cancel();
    running.finish().await.1.unwrap();
}

#[tokio::test]
async fn crashed_node_waits_for_refresh() {
    let shutdown = CancellationToken::new();
    let (running, mut events) = Harness::new(CRASHING_NODE).start(shutdown.clone());

    let exited = wait_for(&mut events, WAIT, |e| matches!(e, ServeEvent::Exited { .. })).await;
    assert_eq!(exited, ServeEvent::Exited { code: Some(3) });
    assert!(!running.handle.is_finished());

    running.refresher.request();
    wait_for(&mut events, WAIT, |e| *e == ServeEvent::Building).await;
    wait_for(&mut events, WAIT, |e| matches!(e, ServeEvent::Exited { .. })).await;

    shutdown.cancel();
    running.finish().await.1.unwrap();
}

#[tokio::test]
async fn cancelled_before_start_does_nothing() {
    let shutdown = CancellationToken::new();
    shutdown.cancel();
    let (running, mut events) = Harness::new(LONG_RUNNING_NODE).start(shutdown);
    let generator = running.generator.clone();
    let toolchain = running.toolchain.clone();

    let (chain, result) = running.finish().await;
    result.unwrap();
    assert!(!chain.is_serving());
    assert_eq!(generator.calls(), 0);
    assert_eq!(RecordingToolchain::count(&toolchain.install), 0);
    assert_eq!(drain(&mut events), vec![ServeEvent::Stopped]);
}

#[tokio::test(flavor = "current_thread")]
async fn shutdown_preempts_pending_restart() {
    let shutdown = CancellationToken::new();
    let (running, mut events) = Harness::new(LONG_RUNNING_NODE).start(shutdown.clone());
    wait_for(&mut events, WAIT, is_started).await;

    assert!(running.refresher.request());
    shutdown.cancel();
    running.finish().await.1.unwrap();

    let rest = drain(&mut events);
    assert!(!rest.contains(&ServeEvent::Restarting), "{rest:?}");
    assert_eq!(rest.last(), Some(&ServeEvent::Stopped));
}

#[tokio::test]
async fn second_session_reuses_generation() {
    let harness = Harness::new(LONG_RUNNING_NODE);
    let generator = harness.generator.clone();

    let first = CancellationToken::new();
    let (running, mut events) = harness.start(first.clone());
    wait_for(&mut events, WAIT, is_started).await;
    first.cancel();
    let Running { fixture, handle, .. } = running;
    let (mut chain, result) = tokio::time::timeout(WAIT, handle)
        .await
        .unwrap()
        .unwrap();
    result.unwrap();

    let second = CancellationToken::new();
    let token = second.clone();
    let handle = tokio::spawn(async move { chain.serve(token).await });
    wait_for(&mut events, WAIT, is_started).await;
    assert_eq!(generator.calls(), 1);

    second.cancel();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
    drop(fixture);
}

#[tokio::test]
async fn generation_failure_ends_serve() {
    let shutdown = CancellationToken::new();
    let harness = Harness::with_generator(
        LONG_RUNNING_NODE,
        RecordingGenerator::failing("protoc-gen-gocosmos missing"),
    );
    let (running, mut events) = harness.start(shutdown);

    let (_chain, result) = running.finish().await;
    let err = result.unwrap_err();
    assert!(matches!(err, ChainError::Generation(_)), "{err}");
    assert!(err.to_string().contains("protoc-gen-gocosmos missing"));
    assert!(!drain(&mut events).iter().any(is_started));
}

#[tokio::test]
async fn unstartable_node_is_process_error() {
    let shutdown = CancellationToken::new();
    let harness = Harness::new(LONG_RUNNING_NODE);
    harness.fixture.write_config(
        "validators:\n  - name: alice\nbuild:\n  binary: /definitely/not/marsd\n",
    );
    let (running, _events) = harness.start(shutdown);

    let (_chain, result) = running.finish().await;
    assert!(matches!(
        result,
        Err(ChainError::Process(ProcessError::Spawn { .. }))
    ));
}

#[tokio::test]
async fn flags_reach_collaborators() {
    let shutdown = CancellationToken::new();
    let fixture = AppFixture::stargate();
    fixture.install_node(LONG_RUNNING_NODE);
    let generator = RecordingGenerator::new();
    let toolchain = RecordingToolchain::new();
    let (tx, mut events) = event_channel();
    let mut chain = Chain::new(
        fixture.path(),
        fixture
            .options(&generator, &toolchain)
            .with_events(tx)
            .check_dependencies()
            .enable_third_party_codegen()
            .print_generated_paths(),
    )
    .unwrap();

    let token = shutdown.clone();
    let handle = tokio::spawn(async move { chain.serve(token).await });
    wait_for(&mut events, WAIT, is_started).await;

    assert_eq!(RecordingToolchain::count(&toolchain.verify), 1);
    let options = generator.last_options().unwrap();
    assert!(options.third_party_modules);
    assert_eq!(options.go_module_path, chainctl_test_utils::APP_MODULE);

    shutdown.cancel();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
}
