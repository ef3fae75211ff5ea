use ecgstream::core::{DisplayPoint, PipelineConfig};
use ecgstream::engine::{PipelineState, SignalPipeline, TaskState, WriterState};
use ecgstream::sinks::{MemorySink, RecordingRenderer, Renderer};
use ecgstream::visualization::Viewport;
use serde_json::json;
use tempfile::tempdir;
use tokio::time::{sleep, Duration};

fn test_config() -> PipelineConfig {
    PipelineConfig {
        sampling_hz: 500.0,
        ui_refresh_interval_ms: 10,
        chart_window_size: 50,
        channel_capacity: 10_000,
        flush_every: 25,
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn test_pipeline_runs_and_shuts_down_in_order() {
    let (sink, handle) = MemorySink::new();
    let renderer = RecordingRenderer::new();
    let mut pipeline = SignalPipeline::new(test_config(), sink, renderer.clone()).unwrap();

    assert_eq!(pipeline.state().name(), "Idle");
    pipeline.start().await.unwrap();
    assert_eq!(pipeline.state().name(), "Running");
    assert_eq!(pipeline.writer_state(), WriterState::Running);

    sleep(Duration::from_millis(150)).await;

    let report = pipeline.shutdown().await.unwrap();
    assert_eq!(pipeline.state(), &PipelineState::Completed);
    assert_eq!(pipeline.producer_state(), TaskState::Stopped);
    assert_eq!(pipeline.writer_state(), WriterState::Closed);
    assert_eq!(pipeline.display_state(), TaskState::Stopped);

    assert!(report.samples_produced > 0);
    assert_eq!(report.persistence_channel.sent, report.samples_produced);
    assert_eq!(
        report.records_written,
        report.persistence_channel.sent - report.persistence_channel.evicted
    );

    let lines = handle.lines();
    assert!(handle.is_closed());
    assert_eq!(lines[0], "SampleNumber,ECG_Value");
    assert_eq!(lines.len() as u64, report.records_written + 1);
    for (i, line) in lines[1..].iter().enumerate() {
        assert!(line.starts_with(&format!("{},", i)));
    }
    assert_eq!(lines[1], "0,0.0");

    let points = renderer.points();
    assert_eq!(points.len() as u64, report.points_displayed);
    assert!(points.windows(2).all(|w| w[1].index == w[0].index + 1));
    assert!(pipeline.display_window().unwrap().len() <= 50);
}

#[tokio::test]
async fn test_unavailable_sink_aborts_start() {
    let (sink, _handle) = MemorySink::unavailable();
    let renderer = RecordingRenderer::new();
    let mut pipeline = SignalPipeline::new(test_config(), sink, renderer.clone()).unwrap();

    assert!(pipeline.start().await.is_err());
    assert_eq!(pipeline.state().name(), "Error");
    assert_eq!(pipeline.writer_state(), WriterState::Idle);
    assert_eq!(pipeline.producer_state(), TaskState::Idle);
    assert_eq!(pipeline.display_state(), TaskState::Idle);

    sleep(Duration::from_millis(20)).await;
    assert_eq!(pipeline.persistence_channel_stats().sent, 0);
    assert!(renderer.frames().is_empty());
}

#[tokio::test]
async fn test_shutdown_requires_running_pipeline() {
    let (sink, _handle) = MemorySink::new();
    let mut pipeline = SignalPipeline::new(test_config(), sink, RecordingRenderer::new()).unwrap();

    assert!(pipeline.shutdown().await.is_err());
    assert_eq!(pipeline.state().name(), "Idle");
}

#[tokio::test]
async fn test_persistence_failure_surfaces_on_shutdown() {
    let (sink, handle) = MemorySink::failing_after(3);
    let mut pipeline = SignalPipeline::new(test_config(), sink, RecordingRenderer::new()).unwrap();

    pipeline.start().await.unwrap();
    sleep(Duration::from_millis(50)).await;

    assert!(pipeline.shutdown().await.is_err());
    assert_eq!(pipeline.state().name(), "Error");
    assert_eq!(pipeline.display_state(), TaskState::Stopped);
    assert!(handle.is_closed());
}

#[tokio::test]
async fn test_pipeline_from_json_writes_csv_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out").join("ecg_data.csv");

    let config = json!({
        "pipeline_config": {
            "sampling_hz": 250.0,
            "ui_refresh_interval_ms": 20,
            "chart_window_size": 200,
            "channel_capacity": 1000,
            "flush_every": 10,
            "output_path": path.to_str().unwrap(),
        }
    });

    let mut pipeline = SignalPipeline::from_json(config, RecordingRenderer::new()).unwrap();
    pipeline.start().await.unwrap();
    sleep(Duration::from_millis(100)).await;
    let report = pipeline.shutdown().await.unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "SampleNumber,ECG_Value");
    assert_eq!(lines.len() as u64, report.records_written + 1);
    assert!(content.ends_with('\n'));
}

#[tokio::test]
async fn test_monitor_reports_all_stages() {
    let (sink, _handle) = MemorySink::new();
    let mut pipeline = SignalPipeline::new(test_config(), sink, RecordingRenderer::new()).unwrap();

    pipeline.start().await.unwrap();
    sleep(Duration::from_millis(50)).await;
    let report = pipeline.shutdown().await.unwrap();

    let monitor = pipeline.get_monitor();
    let snapshot = monitor.collector().snapshot();
    assert_eq!(snapshot["producer"].items_processed, report.samples_produced);
    assert_eq!(snapshot["writer"].items_processed, report.records_written);
    assert_eq!(snapshot["display"].items_processed, report.points_displayed);

    assert_eq!(snapshot["writer"].flushes, report.flushes);

    let channels = monitor.channel_stats();
    assert_eq!(channels[0], ("display".to_string(), report.display_channel));
    assert_eq!(channels[1], ("persistence".to_string(), report.persistence_channel));

    let text = monitor.generate_report();
    for stage in ["display", "producer", "writer", "persistence"] {
        assert!(text.lines().any(|l| l.starts_with(stage)), "missing {}", stage);
    }
}

struct PanickingRenderer;

impl Renderer for PanickingRenderer {
    fn render(&mut self, _appended: &[DisplayPoint], _viewport: Viewport) {
        panic!("renderer gone");
    }
}

#[tokio::test]
async fn test_display_failure_still_drains_writer() {
    let (sink, handle) = MemorySink::new();
    let mut pipeline = SignalPipeline::new(test_config(), sink, PanickingRenderer).unwrap();

    pipeline.start().await.unwrap();
    sleep(Duration::from_millis(50)).await;

    let err = pipeline.shutdown().await.unwrap_err();
    assert!(format!("{:#}", err).contains("Display task failed"));

    assert_eq!(pipeline.state().name(), "Error");
    assert_eq!(pipeline.producer_state(), TaskState::Stopped);
    assert_eq!(pipeline.display_state(), TaskState::Stopped);
    assert_eq!(pipeline.writer_state(), WriterState::Closed);

    // Everything accepted by the persistence channel is still on the sink
    let stats = pipeline.persistence_channel_stats();
    assert!(handle.is_closed());
    assert_eq!(handle.lines().len() as u64, stats.sent - stats.evicted + 1);

    // Error is terminal; a second shutdown is rejected without side effects
    assert!(pipeline.shutdown().await.is_err());
    assert_eq!(pipeline.state().name(), "Error");
}
