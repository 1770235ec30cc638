//! End-to-end tests: real pollers against the job API server over HTTP.

use std::net::SocketAddr;
use std::time::Duration;

use opensaw_monitor_core::{
    ControlLabel, MonitorConfig, NullView, PollerExit, PollerHandle, StatisticsPoller,
    TraceGraphPoller,
};
use opensaw_monitor_server::{ApiData, serve};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct TestServer {
    addr: SocketAddr,
    data: ApiData,
    stop: Option<oneshot::Sender<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let data = ApiData::new();
        let (stop, stopped) = oneshot::channel::<()>();
        let served = data.clone();
        tokio::spawn(async move {
            let _ = serve(listener, served, async {
                let _ = stopped.await;
            })
            .await;
        });
        Self {
            addr,
            data,
            stop: Some(stop),
        }
    }

    fn config(&self) -> MonitorConfig {
        MonitorConfig {
            statistics_interval: Duration::from_millis(30),
            tracegraph_interval: Duration::from_millis(20),
            ..MonitorConfig::with_base_url(format!("http://{}", self.addr))
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

fn statistics(blocks: &[u64], crashes: &[i64], done: bool) -> Value {
    json!({
        "performance": {
            "il_tool": {"total": 4.5, "average": 1.5, "measurements": 3},
            "smt_solver": {"total": 2.0, "average": 0.5}
        },
        "crashes": crashes.iter().map(|s| json!({"signal": s})).collect::<Vec<_>>(),
        "coverage": {
            "visited": {
                "blocks": blocks,
                "branches": blocks.iter().map(|b| b * 2).collect::<Vec<_>>(),
                "timestamps": (0..blocks.len()).map(|i| i as f64 * 1.5).collect::<Vec<_>>()
            }
        },
        "done": done
    })
}

async fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

fn spawn_statistics(
    poller: StatisticsPoller<NullView>,
) -> (PollerHandle, tokio::task::JoinHandle<(PollerExit, StatisticsPoller<NullView>)>) {
    let handle = poller.handle();
    let mut poller = poller;
    let task = tokio::spawn(async move {
        let exit = poller.run().await;
        (exit, poller)
    });
    (handle, task)
}

fn spawn_tracegraph(
    poller: TraceGraphPoller<NullView>,
) -> (PollerHandle, tokio::task::JoinHandle<(PollerExit, TraceGraphPoller<NullView>)>) {
    let handle = poller.handle();
    let mut poller = poller;
    let task = tokio::spawn(async move {
        let exit = poller.run().await;
        (exit, poller)
    });
    (handle, task)
}

#[tokio::test]
async fn statistics_poller_runs_to_completion() {
    let server = TestServer::start().await;
    server
        .data
        .set_value("statistics", statistics(&[0, 5, 9], &[1, 11, 11], false))
        .await;

    let poller = server
        .config()
        .statistics_poller(reqwest::Client::new(), NullView);
    let (handle, task) = spawn_statistics(poller);

    wait_until("first merge", || handle.status().cycles >= 2).await;
    assert_eq!(handle.label(), ControlLabel::Stop);

    server
        .data
        .set_value("statistics", statistics(&[0, 5, 9, 12], &[1, 11, 11, 4], true))
        .await;
    let (exit, poller) = task.await.unwrap();
    assert_eq!(exit, PollerExit::Complete);
    assert_eq!(handle.label(), ControlLabel::Complete);

    let model = poller.model();
    assert!(model.is_complete());
    let names: Vec<&str> = model.entries().iter().map(|e| e.label.as_str()).collect();
    assert_eq!(names, ["IL TOOL", "SMT SOLVER"]);

    assert_eq!(model.crashes().count(0), Some(1));
    assert_eq!(model.crashes().count(3), Some(1));
    assert_eq!(model.crashes().count(10), Some(2));
    assert_eq!(model.crashes().total(), 4);

    let labels: Vec<&str> = model
        .coverage()
        .points()
        .iter()
        .map(|p| p.label.as_str())
        .collect();
    assert_eq!(labels, ["0s", "1.50s", "3.00s", "4.50s"]);
    assert_eq!(model.coverage().last().unwrap().branches, 24);
}

#[tokio::test]
async fn missing_coverage_halts_after_one_fetch() {
    let server = TestServer::start().await;
    server
        .data
        .set_value(
            "statistics",
            json!({"performance": {}, "crashes": [], "done": false}),
        )
        .await;

    let poller = server
        .config()
        .statistics_poller(reqwest::Client::new(), NullView);
    let (handle, task) = spawn_statistics(poller);

    wait_until("halt", || handle.status().halted).await;
    // Several intervals pass without another request.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let status = handle.status();
    assert_eq!(status.failures, 1);
    assert_eq!(status.label(), ControlLabel::Resume);
    assert!(status.last_error.unwrap().contains("coverage"));
    assert_eq!(server.data.hits("statistics").await, 1);

    // Fix the document and resume by hand.
    server
        .data
        .set_value("statistics", statistics(&[0, 1], &[], true))
        .await;
    assert!(handle.toggle());
    let (exit, poller) = task.await.unwrap();
    assert_eq!(exit, PollerExit::Complete);
    assert_eq!(poller.model().coverage().len(), 2);
    assert_eq!(server.data.hits("statistics").await, 2);
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    // Bind and release a port so nothing is listening on it.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let config = MonitorConfig::with_base_url(format!("http://{addr}"));
    let poller = config.tracegraph_poller(reqwest::Client::new(), NullView);
    let (handle, task) = spawn_tracegraph(poller);

    wait_until("halt", || handle.status().halted).await;
    let error = handle.status().last_error.unwrap();
    assert!(error.starts_with("transport error"), "{error}");

    handle.shutdown();
    let (exit, poller) = task.await.unwrap();
    assert_eq!(exit, PollerExit::Shutdown);
    assert!(poller.model().nodes().is_empty());
}

#[tokio::test]
async fn unknown_document_is_a_transport_error() {
    let server = TestServer::start().await;
    let poller = server
        .config()
        .statistics_poller(reqwest::Client::new(), NullView);
    let (handle, task) = spawn_statistics(poller);

    wait_until("halt", || handle.status().halted).await;
    assert!(handle.status().last_error.unwrap().contains("404"));

    handle.shutdown();
    assert_eq!(task.await.unwrap().0, PollerExit::Shutdown);
}

#[tokio::test]
async fn trace_graph_keeps_nodes_and_replaces_links() {
    let server = TestServer::start().await;
    server
        .data
        .set_value(
            "tracegraph",
            json!({
                "nodes": [{"id": "100000000_0", "group": 0}, {"id": "b", "group": 40, "ins": 7}],
                "links": [{"source": "100000000_0", "target": "b", "value": 4}]
            }),
        )
        .await;

    let poller = server
        .config()
        .tracegraph_poller(reqwest::Client::new(), NullView);
    let (handle, task) = spawn_tracegraph(poller);
    wait_until("first graph", || handle.status().cycles >= 1).await;

    server
        .data
        .set_value(
            "tracegraph",
            json!({
                "nodes": [{"id": "c", "group": 80}],
                "links": [{"source": "b", "target": "c", "value": 1}, {"source": "c", "target": "b", "value": 9}]
            }),
        )
        .await;
    let before = server.data.hits("tracegraph").await;
    wait_until("second graph", || handle.status().cycles >= before + 2).await;

    handle.shutdown();
    let (exit, poller) = task.await.unwrap();
    assert_eq!(exit, PollerExit::Shutdown);
    assert!(!handle.status().halted);

    let model = poller.model();
    let ids: Vec<&str> = model.nodes().iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, ["100000000_0", "b", "c"]);
    assert_eq!(model.node("b").unwrap().instructions, Some(7));
    assert_eq!(model.links().len(), 2);
    assert_eq!(model.links()[0].source, 1);
    assert_eq!(model.links()[0].target, 2);
    assert_eq!(model.links()[1].stroke_width(), 3.0);
}
