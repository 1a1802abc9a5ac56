use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{TimeDelta, TimeZone, Utc};

use stowage_content_memory::MemoryContentStore;
use stowage_core::ManualClock;
use stowage_lifecycle::{
    AttachmentService, BackgroundConfig, BackgroundProcessorBuilder, CleanerConfig,
    LifecycleMetrics,
};
use stowage_metadata::MetadataIndex;
use stowage_metadata_memory::MemoryMetadataBackend;
use stowage_thumbnail::{ImageResizer, ThumbnailCache, ThumbnailConfig};

struct Parts {
    backend: Arc<MemoryMetadataBackend>,
    clock: Arc<ManualClock>,
    metrics: Arc<LifecycleMetrics>,
    service: Arc<AttachmentService>,
}

fn parts() -> Parts {
    let content = Arc::new(MemoryContentStore::new());
    let backend = Arc::new(MemoryMetadataBackend::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
    ));
    let index = Arc::new(
        MetadataIndex::new(backend.clone(), "attachments_", "attachments_datetime")
            .with_clock(clock.clone()),
    );
    let thumbs = Arc::new(ThumbnailCache::new(
        ThumbnailConfig::default(),
        content.clone(),
        Arc::new(ImageResizer::new()),
    ));
    let metrics = Arc::new(LifecycleMetrics::default());
    let service = AttachmentService::builder()
        .content(content)
        .index(index)
        .thumbnails(thumbs)
        .clock(clock.clone())
        .metrics(metrics.clone())
        .cleaner_config(CleanerConfig {
            expire: Duration::from_secs(60),
            ..CleanerConfig::default()
        })
        .build()
        .unwrap();
    Parts {
        backend,
        clock,
        metrics,
        service: Arc::new(service),
    }
}

fn config(cleaner_interval: Duration) -> BackgroundConfig {
    BackgroundConfig {
        enable_cleaner: true,
        cleaner_interval,
        rebuild_index_on_start: false,
        enable_reconciler: false,
        reconciler_interval: Duration::from_secs(3600),
    }
}

#[tokio::test(start_paused = true)]
async fn processor_starts_and_stops() {
    let p = parts();
    let (mut processor, shutdown_tx) = BackgroundProcessorBuilder::new()
        .service(p.service.clone())
        .config(config(Duration::from_millis(100)))
        .build()
        .unwrap();

    let handle = tokio::spawn(async move {
        processor.run().await;
    });

    tokio::time::sleep(Duration::from_millis(250)).await;
    let _ = shutdown_tx.send(()).await;

    let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
    assert!(result.is_ok(), "processor should stop within timeout");
    assert_eq!(p.metrics.snapshot().sweeps, 2);
}

#[tokio::test(start_paused = true)]
async fn first_sweep_waits_one_interval() {
    let p = parts();
    let (mut processor, shutdown_tx) = BackgroundProcessorBuilder::new()
        .service(p.service.clone())
        .config(config(Duration::from_secs(10)))
        .build()
        .unwrap();
    let handle = tokio::spawn(async move { processor.run().await });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(p.metrics.snapshot().sweeps, 0);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(p.metrics.snapshot().sweeps, 1);

    let _ = shutdown_tx.send(()).await;
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_sweeps_do_not_stop_the_loop() {
    let p = parts();
    let record = p
        .service
        .upload(Bytes::from_static(b"expiring"), "text/plain")
        .await
        .unwrap();
    p.clock.advance(TimeDelta::minutes(5));
    p.backend.set_unavailable(true);

    let (mut processor, shutdown_tx) = BackgroundProcessorBuilder::new()
        .service(p.service.clone())
        .config(config(Duration::from_secs(1)))
        .build()
        .unwrap();
    let handle = tokio::spawn(async move { processor.run().await });

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(p.metrics.snapshot().sweep_failures, 2);

    p.backend.set_unavailable(false);
    tokio::time::sleep(Duration::from_secs(1)).await;
    let snap = p.metrics.snapshot();
    assert_eq!(snap.sweeps, 1);
    assert_eq!(snap.attachments_expired, 1);
    assert!(p.service.fetch(&record.id).await.unwrap_err().is_not_found());

    let _ = shutdown_tx.send(()).await;
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn external_cancellation_stops_the_processor() {
    let p = parts();
    let (mut processor, _shutdown_tx) = BackgroundProcessorBuilder::new()
        .service(p.service.clone())
        .config(config(Duration::from_secs(3600)))
        .build()
        .unwrap();
    let token = processor.cancellation_token();
    let handle = tokio::spawn(async move { processor.run().await });

    token.cancel();
    let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
    assert!(result.is_ok());
}

#[test]
fn zero_interval_is_rejected() {
    let p = parts();
    let err = BackgroundProcessorBuilder::new()
        .service(p.service)
        .config(config(Duration::ZERO))
        .build()
        .err()
        .unwrap();
    assert_eq!(err, "background intervals must be non-zero");
}

#[test]
fn missing_service_is_rejected() {
    assert!(BackgroundProcessorBuilder::new().build().is_err());
}
