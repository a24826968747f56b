/// Integration tests: Reader and Writer sharing a temp directory inside one
/// runtime, standing in for the two processes.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use handoff_core::{BenchConfig, FailurePolicy, FsConfig, Reporter, RoundError, RoundRunner, run_benchmark};
use handoff_fs::{FsWriter, HandoffDir, Reader, ReaderStats, WriterState};
use tokio::task::JoinHandle;

fn config(dir: &Path) -> FsConfig {
    FsConfig {
        data_dir: dir.to_path_buf(),
        chunk_size: 64 * 1024,
        fsync: false,
        // Keeps a broken protocol from hanging the test run.
        ack_timeout: Some(Duration::from_secs(10)),
        beacon_poll: Duration::from_millis(5),
        watch_backoff: Duration::from_millis(20),
    }
}

fn spawn_reader(config: &FsConfig) -> (Arc<ReaderStats>, JoinHandle<Result<(), RoundError>>) {
    let reader = Reader::new(config);
    let stats = reader.stats();
    (stats, tokio::spawn(reader.run()))
}

async fn wait_for(path: &Path, limit: Duration) -> bool {
    tokio::time::timeout(limit, async {
        while !tokio::fs::try_exists(path).await.unwrap_or(false) {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .is_ok()
}

async fn assert_no_signals(dir: &HandoffDir) {
    for path in [dir.tmp(), dir.ready(), dir.ack(), dir.ack_tmp()] {
        assert!(
            !tokio::fs::try_exists(&path).await.unwrap(),
            "{} should not exist between rounds",
            path.display()
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rounds_leave_directory_clean() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let dir = HandoffDir::new(tmp.path());
    let (stats, reader) = spawn_reader(&config);

    let mut writer = FsWriter::new(&config, None);
    writer.wait_for_reader().await.unwrap();
    assert_eq!(writer.state(), WriterState::Idle);

    let sizes = [1usize, 4096, 300_000];
    for (i, &size) in sizes.iter().enumerate() {
        assert_no_signals(&dir).await;
        let elapsed = writer.run_round(size, i as u32 + 1).await.unwrap();
        assert!(elapsed > Duration::ZERO);
        assert_eq!(writer.state(), WriterState::Idle);
        assert_no_signals(&dir).await;
    }

    // The beacon outlives rounds.
    assert!(tokio::fs::try_exists(dir.beacon()).await.unwrap());
    assert_eq!(stats.consumed.load(Ordering::SeqCst), sizes.len() as u64);
    assert_eq!(
        stats.bytes_drained.load(Ordering::SeqCst),
        sizes.iter().sum::<usize>() as u64
    );
    assert_eq!(stats.peak_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(stats.failures.load(Ordering::SeqCst), 0);

    reader.abort();
}

#[tokio::test]
async fn reader_consumes_ready_signal_present_at_startup() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let dir = HandoffDir::new(tmp.path());
    tokio::fs::write(dir.ready(), vec![7u8; 10_000]).await.unwrap();

    let (stats, reader) = spawn_reader(&config);

    // No filesystem event follows; the catch-up check alone must fire.
    assert!(wait_for(&dir.ack(), Duration::from_secs(5)).await);
    assert_eq!(stats.consumed.load(Ordering::SeqCst), 1);
    assert_eq!(stats.bytes_drained.load(Ordering::SeqCst), 10_000);
    assert!(tokio::fs::try_exists(dir.beacon()).await.unwrap());

    reader.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rapid_rename_events_do_not_double_consume() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let dir = HandoffDir::new(tmp.path());
    let (stats, reader) = spawn_reader(&config);
    assert!(wait_for(&dir.beacon(), Duration::from_secs(5)).await);

    tokio::fs::write(dir.tmp(), vec![1u8; 256 * 1024]).await.unwrap();
    tokio::fs::rename(dir.tmp(), dir.ready()).await.unwrap();

    // Hammer the ready name with more renames while the first consume runs
    // and after it has been acknowledged.
    for _ in 0..25 {
        tokio::fs::write(dir.tmp(), b"again").await.unwrap();
        tokio::fs::rename(dir.tmp(), dir.ready()).await.unwrap();
    }

    assert!(wait_for(&dir.ack(), Duration::from_secs(5)).await);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(stats.consumed.load(Ordering::SeqCst), 1);
    assert_eq!(stats.peak_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(stats.in_flight.load(Ordering::SeqCst), 0);

    reader.abort();
}

#[tokio::test]
async fn writer_waits_for_late_reader() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());

    let writer_config = config.clone();
    let writer = tokio::spawn(async move {
        let mut writer = FsWriter::new(&writer_config, None);
        writer.wait_for_reader().await.unwrap();
        writer.run_round(2048, 1).await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!writer.is_finished());

    let (stats, reader) = spawn_reader(&config);
    let elapsed = tokio::time::timeout(Duration::from_secs(10), writer)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(elapsed > Duration::ZERO);
    assert_eq!(stats.consumed.load(Ordering::SeqCst), 1);

    reader.abort();
}

#[tokio::test]
async fn missing_ack_becomes_reported_failure_with_timeout() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config(tmp.path());
    config.ack_timeout = Some(Duration::from_millis(150));
    let dir = HandoffDir::new(tmp.path());

    // A beacon with nobody behind it.
    tokio::fs::write(dir.beacon(), b"0\n").await.unwrap();

    let mut writer = FsWriter::new(&config, None);
    let err = writer.run_round(1024, 1).await.unwrap_err();
    assert!(matches!(err, RoundError::AckTimeout(_)));
    assert_eq!(err.category(), "ack_timeout");
    assert_eq!(writer.state(), WriterState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn leftovers_from_previous_round_are_cleared() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());
    let dir = HandoffDir::new(tmp.path());
    let (stats, reader) = spawn_reader(&config);
    assert!(wait_for(&dir.beacon(), Duration::from_secs(5)).await);

    tokio::fs::write(dir.tmp(), b"stale").await.unwrap();
    tokio::fs::write(dir.ack(), b"ok").await.unwrap();

    let mut writer = FsWriter::new(&config, None);
    writer.run_round(8192, 1).await.unwrap();

    assert_no_signals(&dir).await;
    assert_eq!(stats.consumed.load(Ordering::SeqCst), 1);
    assert_eq!(stats.bytes_drained.load(Ordering::SeqCst), 8192);

    reader.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn benchmark_emits_one_record_per_round() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config(tmp.path());
    config.fsync = true;
    let (_stats, reader) = spawn_reader(&config);

    let bench = BenchConfig {
        sizes: vec![1024, 1_048_576],
        reps: 2,
        on_failure: FailurePolicy::Abort,
        storage_medium: Some("disk".into()),
        results_file: None,
    };
    let mut writer = FsWriter::new(&config, bench.storage_medium.clone());
    let mut reporter = Reporter::new(Vec::new()).unwrap();
    run_benchmark(&bench, &mut writer, &mut reporter).await.unwrap();

    let (out, summary) = reporter.finish();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().skip(1).collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines.iter().filter(|l| l.starts_with("file-disk,1024,")).count(), 2);
    assert_eq!(lines.iter().filter(|l| l.starts_with("file-disk,1048576,")).count(), 2);
    assert_eq!(summary.total_successes(), 4);
    assert_no_signals(&HandoffDir::new(tmp.path())).await;

    reader.abort();
}
