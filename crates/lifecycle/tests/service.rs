use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{TimeDelta, TimeZone, Utc};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use stowage_content::{ContentStore, collect_bytes};
use stowage_content_memory::MemoryContentStore;
use stowage_core::{AttachmentError, ContentId, ManualClock};
use stowage_lifecycle::{
    AttachmentService, CancellationToken, CleanerConfig, ServiceConfig,
};
use stowage_metadata::MetadataIndex;
use stowage_metadata_memory::MemoryMetadataBackend;
use stowage_thumbnail::{ImageResizer, ThumbnailCache, ThumbnailConfig, ThumbnailKind};

struct Harness {
    content: Arc<MemoryContentStore>,
    clock: Arc<ManualClock>,
    thumbs: Arc<ThumbnailCache>,
    service: AttachmentService,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let content = Arc::new(MemoryContentStore::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
    ));
    let index = Arc::new(
        MetadataIndex::new(
            Arc::new(MemoryMetadataBackend::new()),
            "attachments_",
            "attachments_datetime",
        )
        .with_clock(clock.clone()),
    );
    let thumbs = Arc::new(ThumbnailCache::new(
        ThumbnailConfig {
            cache: true,
            path: dir.path().to_path_buf(),
            ..ThumbnailConfig::default()
        },
        content.clone(),
        Arc::new(ImageResizer::new()),
    ));
    let service = AttachmentService::builder()
        .content(content.clone())
        .index(index)
        .thumbnails(thumbs.clone())
        .clock(clock.clone())
        .service_config(ServiceConfig {
            max_upload_bytes: 64 * 1024,
            ..ServiceConfig::default()
        })
        .cleaner_config(CleanerConfig {
            expire: std::time::Duration::from_secs(3600),
            ..CleanerConfig::default()
        })
        .build()
        .unwrap();
    Harness {
        content,
        clock,
        thumbs,
        service,
        _dir: dir,
    }
}

/// A noisy PNG so compression leaves it around ten kilobytes.
fn noisy_png() -> Bytes {
    let mut state: u32 = 0x1234_5678;
    let img = RgbaImage::from_fn(56, 56, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        Rgba([r, g, b, 255])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    Bytes::from(buf.into_inner())
}

#[tokio::test]
async fn upload_fetch_round_trip_preserves_bytes_and_record() {
    let h = harness();
    let png = noisy_png();
    assert!(png.len() > 8 * 1024, "fixture should be around 10KB");

    let record = h.service.upload(png.clone(), "image/png").await.unwrap();
    assert_eq!(record.size_bytes, png.len() as u64);

    let fetched = h.service.fetch(&record.id).await.unwrap();
    assert_eq!(fetched.record.mime_type, "image/png");
    assert_eq!(fetched.record.size_bytes, png.len() as u64);
    let body = collect_bytes(fetched.stream, 1024 * 1024).await.unwrap();
    assert_eq!(body, png);
}

#[tokio::test]
async fn thumbnail_is_a_distinct_jpeg() {
    let h = harness();
    let png = noisy_png();
    let record = h.service.upload(png.clone(), "image/png").await.unwrap();

    let (thumb_record, thumb) = h.service.fetch_thumbnail(&record.id, 128).await.unwrap();
    assert_eq!(thumb_record, record);
    assert_eq!(thumb.kind, ThumbnailKind::Resized);
    let bytes = collect_bytes(thumb.stream, 1024 * 1024).await.unwrap();
    assert_ne!(bytes, png);
    assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
}

#[tokio::test]
async fn thumbnail_of_non_image_degrades_to_original() {
    let h = harness();
    let record = h
        .service
        .upload(Bytes::from_static(b"just text"), "text/plain")
        .await
        .unwrap();

    let (_, thumb) = h.service.fetch_thumbnail(&record.id, 128).await.unwrap();
    assert_eq!(thumb.kind, ThumbnailKind::Original);
    let bytes = collect_bytes(thumb.stream, 1024).await.unwrap();
    assert_eq!(&bytes[..], b"just text");
    assert!(!h.thumbs.cache_path(&record.id, 128).exists());
}

#[tokio::test]
async fn identical_bytes_yield_identical_ids() {
    let h = harness();
    let a = h.service.upload(Bytes::from_static(b"same"), "text/plain").await.unwrap();
    let b = h.service.upload(Bytes::from_static(b"same"), "text/plain").await.unwrap();
    assert_eq!(a.id, b.id);
}

#[tokio::test]
async fn delete_then_fetch_is_not_found_and_delete_is_idempotent() {
    let h = harness();
    let record = h.service.upload(noisy_png(), "image/png").await.unwrap();
    h.service.fetch_thumbnail(&record.id, 128).await.unwrap();
    assert!(h.thumbs.cache_path(&record.id, 128).exists());

    h.service.delete(&record.id).await.unwrap();
    assert!(h.service.fetch(&record.id).await.unwrap_err().is_not_found());
    assert!(!h.thumbs.cache_path(&record.id, 128).exists());

    h.service.delete(&record.id).await.unwrap();
    assert_eq!(h.service.metrics().snapshot().deletes, 2);
}

#[tokio::test]
async fn unknown_id_is_not_found_everywhere() {
    let h = harness();
    let id = ContentId::parse("QmNeverUploaded").unwrap();
    assert!(h.service.fetch(&id).await.unwrap_err().is_not_found());
    assert!(h.service.fetch_thumbnail(&id, 64).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn metadata_without_content_is_not_found() {
    let h = harness();
    let record = h.service.upload(Bytes::from_static(b"orphan"), "text/plain").await.unwrap();
    h.content.forget_local(&record.id);

    assert!(h.service.fetch(&record.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn oversized_upload_is_rejected_before_storage() {
    let h = harness();
    let big = Bytes::from(vec![0u8; 64 * 1024 + 1]);
    let err = h.service.upload(big, "application/octet-stream").await.unwrap_err();
    assert!(matches!(err, AttachmentError::Validation(_)));
    assert!(h.content.is_empty());
}

#[tokio::test]
async fn missing_mime_defaults_to_octet_stream() {
    let h = harness();
    let record = h.service.upload(Bytes::from_static(b"?"), "").await.unwrap();
    assert_eq!(record.mime_type, "application/octet-stream");
}

#[tokio::test]
async fn sweep_through_the_service_expires_old_uploads() {
    let h = harness();
    let old = h.service.upload(Bytes::from_static(b"old"), "text/plain").await.unwrap();
    h.clock.advance(TimeDelta::minutes(90));
    let new = h.service.upload(Bytes::from_static(b"new"), "text/plain").await.unwrap();

    let report = h
        .service
        .run_cleanup_sweep(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.deleted, 1);
    assert!(h.service.fetch(&old.id).await.unwrap_err().is_not_found());
    assert!(h.service.fetch(&new.id).await.is_ok());
    assert!(h.content.get(&new.id).await.is_ok());
}

#[tokio::test]
async fn rebuild_through_the_service_counts_records() {
    let h = harness();
    h.service.upload(Bytes::from_static(b"a"), "text/plain").await.unwrap();
    h.service.upload(Bytes::from_static(b"b"), "text/plain").await.unwrap();

    let report = h.service.rebuild_time_index().await.unwrap();
    assert_eq!(report.indexed, 2);
}
