//! Integration tests for the device adapter: identity bootstrap,
//! availability polling, image download and remote reporting.

use crate::mock_hw::*;

use otam::app::events::{AdapterEvent, AdapterEventKind};
use otam::app::model::{Availability, FirmwareDescriptor};
use otam::app::ports::{Method, TransportError};
use otam::error::{DownloadError, IdentityError, PollError, ReportError};

// ── Identity bootstrap ───────────────────────────────────────

#[test]
fn first_init_registers_and_persists_identity() {
    let mut http = MockHttp::new();
    http.reply(Method::Post, "/init-device", 200, "  guid-abc\n");
    let store = MockStore::new();
    let mut adapter = adapter(http, store.clone());

    adapter.init().unwrap();

    assert!(adapter.is_ready());
    assert_eq!(adapter.guid(), "guid-abc");
    assert_eq!(adapter.device_id(), "D1");
    assert_eq!(adapter.device_profile_id(), Some(7));

    let req = adapter.http().last(Method::Post, "/init-device").unwrap();
    assert_eq!(req.url, format!("{BASE_URL}/init-device"));
    assert_eq!(req.header("x-api-key"), Some(API_KEY));
    assert_eq!(req.header("Content-Type"), Some("application/json"));
    assert_eq!(
        req.body.as_deref(),
        Some(r#"{"deviceId":"D1","deviceGuid":"","deviceProfileId":7}"#)
    );

    assert_eq!(store.get_str(KEY_GUID).as_deref(), Some("guid-abc"));
    assert_eq!(store.get_str(KEY_DEVICE_ID).as_deref(), Some("D1"));
    assert_eq!(store.get_i32(KEY_PROFILE_ID), Some(7));
}

#[test]
fn matching_stored_identity_skips_registration() {
    let store = MockStore::new();

    let mut http = MockHttp::new();
    http.reply(Method::Post, "/init-device", 200, "guid-abc");
    adapter(http, store.clone()).init().unwrap();

    // Second boot against the same store.
    let mut again = adapter(MockHttp::new(), store.clone());
    again.init().unwrap();

    assert!(again.is_ready());
    assert_eq!(again.guid(), "guid-abc");
    assert!(again.http().requests.is_empty(), "no request expected on second boot");
    assert_eq!(store.write_count(KEY_GUID), 1);
}

#[test]
fn changed_profile_reregisters_with_known_guid() {
    let store = registered_store();
    store.put(KEY_PROFILE_ID, &3i32.to_le_bytes());

    let mut http = MockHttp::new();
    http.reply(Method::Post, "/init-device", 200, "guid-new");
    let mut adapter = adapter(http, store.clone());
    adapter.init().unwrap();

    let body = adapter.http().last(Method::Post, "/init-device").unwrap().body.clone().unwrap();
    assert!(body.contains(&format!(r#""deviceGuid":"{GUID}""#)), "body: {body}");
    assert_eq!(adapter.guid(), "guid-new");
    assert_eq!(store.get_i32(KEY_PROFILE_ID), Some(7));
}

#[test]
fn store_open_failure_leaves_adapter_not_ready() {
    let store = MockStore::new();
    store.state().fail_open = true;
    let mut adapter = adapter(MockHttp::new(), store);

    let err = adapter.init().unwrap_err();
    assert_eq!(err, IdentityError::StoreOpen);
    assert_eq!(err.code(), -1);
    assert!(!adapter.is_ready());
    assert!(adapter.http().requests.is_empty());
}

#[test]
fn registration_failure_persists_nothing() {
    let mut http = MockHttp::new();
    http.reply(Method::Post, "/init-device", 500, "boom");
    let store = MockStore::new();
    let mut adapter = adapter(http, store.clone());

    let err = adapter.init().unwrap_err();
    assert_eq!(err, IdentityError::Registration);
    assert_eq!(err.code(), -2);
    assert!(!adapter.is_ready());
    assert!(store.get(KEY_GUID).is_none());
}

#[test]
fn empty_registration_reply_is_a_failure() {
    let mut http = MockHttp::new();
    http.reply(Method::Post, "/init-device", 200, "");
    let mut adapter = adapter(http, MockStore::new());
    assert_eq!(adapter.init(), Err(IdentityError::Registration));
}

#[test]
fn each_persist_failure_has_its_own_code() {
    for (key, expected) in [
        (KEY_GUID, IdentityError::WriteGuid),
        (KEY_DEVICE_ID, IdentityError::WriteDeviceId),
        (KEY_PROFILE_ID, IdentityError::WriteProfileId),
    ] {
        let mut http = MockHttp::new();
        http.reply(Method::Post, "/init-device", 200, "guid-abc");
        let store = MockStore::new();
        store.state().fail_write = Some(key.to_owned());
        let mut adapter = adapter(http, store);

        let err = adapter.init().unwrap_err();
        assert_eq!(err, expected, "failing key {key}");
        assert!(!adapter.is_ready());
    }
    assert_eq!(IdentityError::WriteGuid.code(), -3);
    assert_eq!(IdentityError::WriteDeviceId.code(), -4);
    assert_eq!(IdentityError::WriteProfileId.code(), -5);
}

// ── Availability ─────────────────────────────────────────────

fn polling_adapter(status: u16, body: &str) -> TestAdapter {
    let mut http = MockHttp::new();
    http.reply(Method::Get, "/status", status, body);
    let mut adapter = adapter(http, registered_store());
    adapter.init().unwrap();
    adapter
}

#[test]
fn pending_update_populates_descriptor() {
    let mut adapter = polling_adapter(200, STATUS_PENDING);

    let availability = adapter.update_available().unwrap();
    assert_eq!(availability, Availability::Available);
    assert_eq!(availability.code(), 0);

    assert_eq!(
        adapter.available_firmware(),
        Some(&FirmwareDescriptor {
            file_id: 3,
            id: 9,
            name: "app".into(),
            version: "1.2.0".into(),
            size: 123456,
        })
    );

    let req = adapter.http().last(Method::Get, "/status").unwrap();
    assert_eq!(req.url, format!("{BASE_URL}/devices/{GUID}/status"));
    assert_eq!(req.header("x-api-key"), Some(API_KEY));
}

#[test]
fn empty_status_object_means_nothing_available() {
    let mut adapter = polling_adapter(200, "{}");

    let availability = adapter.update_available().unwrap();
    assert_eq!(availability, Availability::NoneAvailable);
    assert_eq!(availability.code(), 1);
    assert!(adapter.available_firmware().is_none());
}

#[test]
fn incomplete_firmware_fields_are_a_parse_error() {
    let mut adapter = polling_adapter(
        200,
        r#"{"deviceStatus":"UPDATE_PENDING","firmwareFileId":3,"firmwareId":9,"firmwareName":"app","firmwareSize":1}"#,
    );

    let err = adapter.update_available().unwrap_err();
    assert_eq!(err, PollError::Parse);
    assert_eq!(err.code(), -2);
    assert!(adapter.available_firmware().is_none());
}

#[test]
fn status_transport_failures() {
    let mut adapter = polling_adapter(503, STATUS_PENDING);
    assert_eq!(adapter.update_available(), Err(PollError::Transport));

    let mut adapter = polling_adapter(200, "");
    assert_eq!(adapter.update_available(), Err(PollError::Transport));
}

#[test]
fn failed_poll_clears_earlier_descriptor() {
    let mut adapter = polling_adapter(200, STATUS_PENDING);
    adapter.update_available().unwrap();
    assert!(adapter.available_firmware().is_some());

    // Later routes take precedence in the mock.
    adapter.http_mut().reply(Method::Get, "/status", 500, "");
    assert_eq!(adapter.update_available(), Err(PollError::Transport));
    assert!(adapter.available_firmware().is_none());
}

// ── Download ─────────────────────────────────────────────────

#[test]
fn download_without_poll_is_refused() {
    let mut adapter = adapter_with_update(image(IMAGE_LEN));
    let err = adapter.download_available_firmware().unwrap_err();
    assert_eq!(err, DownloadError::NoFirmwareAvailable);
    assert_eq!(err.code(), -1);
    assert_eq!(adapter.http().count(Method::Get, "/firmware-file-url"), 0);
}

#[test]
fn download_buffers_exact_image_and_reports_progress() {
    let payload = image(IMAGE_LEN);
    let mut adapter = adapter_with_update(payload.clone());
    let progress = record(adapter.events(), &[AdapterEventKind::DownloadProgress]);

    adapter.update_available().unwrap();
    let size = adapter.download_available_firmware().unwrap();

    assert_eq!(size, IMAGE_LEN);
    assert_eq!(adapter.firmware_image(), Some(payload.as_slice()));

    let pcts: Vec<u8> = progress
        .borrow()
        .iter()
        .map(|AdapterEvent::DownloadProgress(p)| *p)
        .collect();
    assert!(!pcts.is_empty());
    assert!(pcts.windows(2).all(|w| w[0] < w[1]), "progress must rise: {pcts:?}");
    assert_eq!(pcts.last(), Some(&100));

    let stream = adapter.http().last(Method::Get, "fw.bin").unwrap();
    assert_eq!(stream.url, "https://cdn.test/fw.bin");
    assert_eq!(stream.header("x-api-key"), Some(API_KEY));
}

#[test]
fn download_url_is_fetched_once_per_poll() {
    let mut adapter = adapter_with_update(image(IMAGE_LEN));
    adapter.update_available().unwrap();
    adapter.download_available_firmware().unwrap();
    adapter.download_available_firmware().unwrap();
    assert_eq!(adapter.http().count(Method::Get, "/firmware-file-url"), 1);

    adapter.update_available().unwrap();
    adapter.download_available_firmware().unwrap();
    assert_eq!(adapter.http().count(Method::Get, "/firmware-file-url"), 2);
}

#[test]
fn relative_download_url_is_resolved_against_base() {
    let mut http = MockHttp::new();
    http.reply(Method::Get, "/status", 200, STATUS_PENDING);
    http.reply(Method::Get, "/firmware-file-url", 200, "/files/fw.bin");
    http.serve(image(IMAGE_LEN));
    let mut adapter = adapter(http, registered_store());
    adapter.init().unwrap();
    adapter.update_available().unwrap();
    adapter.download_available_firmware().unwrap();

    let stream = adapter.http().last(Method::Get, "fw.bin").unwrap();
    assert_eq!(stream.url, format!("{BASE_URL}/files/fw.bin"));
}

#[test]
fn url_lookup_failure() {
    let mut http = MockHttp::new();
    http.reply(Method::Get, "/status", 200, STATUS_PENDING);
    http.fail(Method::Get, "/firmware-file-url", TransportError::Connect);
    let mut adapter = adapter(http, registered_store());
    adapter.init().unwrap();
    adapter.update_available().unwrap();

    let err = adapter.download_available_firmware().unwrap_err();
    assert_eq!(err, DownloadError::UrlFetch);
    assert_eq!(err.code(), -7);
}

#[test]
fn non_200_download_reports_status() {
    let mut adapter = adapter_with_update(image(IMAGE_LEN));
    adapter.http_mut().stream_mut().status = 404;
    adapter.update_available().unwrap();

    let err = adapter.download_available_firmware().unwrap_err();
    assert_eq!(err, DownloadError::HttpStatus(404));
    assert_eq!(err.code(), -2);
    assert!(adapter.firmware_image().is_none());
}

#[test]
fn missing_or_zero_content_length_is_rejected() {
    for declared in [None, Some(0)] {
        let mut adapter = adapter_with_update(image(IMAGE_LEN));
        adapter.http_mut().stream_mut().content_length = declared;
        adapter.update_available().unwrap();

        let err = adapter.download_available_firmware().unwrap_err();
        assert_eq!(err, DownloadError::InvalidContentLength, "declared {declared:?}");
        assert_eq!(err.code(), -3);
    }
}

#[test]
fn heap_admission_rejects_before_reading() {
    let payload = image(IMAGE_LEN);
    let mut http = MockHttp::new();
    http.reply(Method::Get, "/status", 200, STATUS_PENDING);
    http.reply(Method::Get, "/firmware-file-url", 200, "https://cdn.test/fw.bin");
    http.serve(payload);
    let limits = otam::config::UpdateLimits::default();
    // One byte short of covering image plus margin.
    let system = MockSystem {
        free_heap: IMAGE_LEN + limits.heap_safety_margin - 1,
    };
    let mut adapter = otam::app::adapter::DeviceAdapter::new(config(), limits, http, registered_store(), system);
    let progress = record(adapter.events(), &[AdapterEventKind::DownloadProgress]);
    adapter.init().unwrap();
    adapter.update_available().unwrap();

    let err = adapter.download_available_firmware().unwrap_err();
    assert_eq!(err, DownloadError::InsufficientMemory);
    assert_eq!(err.code(), -5);
    assert!(adapter.firmware_image().is_none());
    assert!(progress.borrow().is_empty());
}

#[test]
fn interrupted_stream_keeps_no_buffer() {
    let mut adapter = adapter_with_update(image(IMAGE_LEN));
    adapter.http_mut().stream_mut().fail_after = Some(IMAGE_LEN / 2);
    adapter.update_available().unwrap();

    let err = adapter.download_available_firmware().unwrap_err();
    assert_eq!(err, DownloadError::Interrupted);
    assert_eq!(err.code(), -4);
    assert!(adapter.firmware_image().is_none());
    // One attempt only.
    assert_eq!(adapter.http().count(Method::Get, "fw.bin"), 1);
}

#[test]
fn new_poll_drops_downloaded_image() {
    let mut adapter = adapter_with_update(image(IMAGE_LEN));
    adapter.update_available().unwrap();
    adapter.download_available_firmware().unwrap();
    assert!(adapter.firmware_image().is_some());

    adapter.update_available().unwrap();
    assert!(adapter.available_firmware().is_some());
    assert!(adapter.firmware_image().is_none());

    adapter.download_available_firmware().unwrap();
    adapter.http_mut().reply(Method::Get, "/status", 200, "{}");
    assert_eq!(adapter.update_available(), Ok(Availability::NoneAvailable));
    assert!(adapter.firmware_image().is_none());
}

#[test]
fn url_lookup_failure_after_download_keeps_no_image() {
    let mut adapter = adapter_with_update(image(IMAGE_LEN));
    adapter.update_available().unwrap();
    adapter.download_available_firmware().unwrap();

    adapter.update_available().unwrap();
    adapter.http_mut().fail(Method::Get, "/firmware-file-url", TransportError::Io);
    assert_eq!(adapter.download_available_firmware(), Err(DownloadError::UrlFetch));
    assert!(adapter.firmware_image().is_none());
}

#[test]
fn short_body_is_an_interruption() {
    let mut adapter = adapter_with_update(image(IMAGE_LEN));
    // Server declares more than it sends.
    adapter.http_mut().stream_mut().content_length = Some(IMAGE_LEN + 10);
    adapter.update_available().unwrap();

    assert_eq!(adapter.download_available_firmware(), Err(DownloadError::Interrupted));
    assert!(adapter.firmware_image().is_none());
}

#[test]
fn partial_reads_still_assemble_full_image() {
    let payload = image(IMAGE_LEN);
    let mut adapter = adapter_with_update(payload.clone());
    adapter.http_mut().stream_mut().max_read = 300;
    adapter.update_available().unwrap();

    adapter.download_available_firmware().unwrap();
    assert_eq!(adapter.firmware_image(), Some(payload.as_slice()));
}

#[test]
fn failed_redownload_drops_previous_image() {
    let mut adapter = adapter_with_update(image(IMAGE_LEN));
    adapter.update_available().unwrap();
    adapter.download_available_firmware().unwrap();
    assert!(adapter.firmware_image().is_some());

    adapter.http_mut().stream_mut().fail_after = Some(10);
    assert!(adapter.download_available_firmware().is_err());
    assert!(adapter.firmware_image().is_none());
}

#[test]
fn clear_forgets_image_and_descriptor() {
    let mut adapter = adapter_with_update(image(IMAGE_LEN));
    adapter.update_available().unwrap();
    adapter.download_available_firmware().unwrap();

    adapter.clear_available_firmware();
    assert!(adapter.firmware_image().is_none());
    assert!(adapter.available_firmware().is_none());
    assert_eq!(adapter.download_available_firmware(), Err(DownloadError::NoFirmwareAvailable));

    // Idempotent.
    adapter.clear_available_firmware();
}

// ── Reporting ────────────────────────────────────────────────

#[test]
fn log_error_posts_failure_status() {
    let mut adapter = adapter_with_update(image(IMAGE_LEN));
    adapter.update_available().unwrap();

    adapter.log_error("Flash Write \"Failed\"").unwrap();

    let req = adapter.http().last(Method::Post, "/status").unwrap();
    assert_eq!(req.url, format!("{BASE_URL}/devices/{GUID}/status"));
    assert_eq!(
        req.body.as_deref(),
        Some(
            r#"{"deviceStatus":"UPDATE_FAILED","firmwareFileId":3,"firmwareId":9,"firmwareVersion":"1.2.0","logMessage":"Flash Write \"Failed\""}"#
        )
    );
}

#[test]
fn log_error_needs_a_descriptor() {
    let mut adapter = adapter_with_update(image(IMAGE_LEN));
    let err = adapter.log_error("oops").unwrap_err();
    assert_eq!(err, ReportError::NoUpdateContext);
    assert_eq!(adapter.http().count(Method::Post, "/status"), 0);
}

#[test]
fn success_report_and_rejected_post() {
    let mut http = MockHttp::new();
    http.reply(Method::Get, "/status", 200, STATUS_PENDING);
    http.reply(Method::Post, "/status", 500, "");
    let mut adapter = adapter(http, registered_store());
    adapter.init().unwrap();
    adapter.update_available().unwrap();

    assert_eq!(adapter.report_update_success(), Err(ReportError::Transport));
    let body = adapter.http().last(Method::Post, "/status").unwrap().body.clone().unwrap();
    assert!(body.starts_with(r#"{"deviceStatus":"UPDATE_SUCCESS""#), "body: {body}");
}

#[test]
fn log_message_posts_to_device_log() {
    let mut http = MockHttp::new();
    http.reply(Method::Post, "/log", 201, "");
    let mut adapter = adapter(http, registered_store());
    adapter.init().unwrap();

    adapter.log_message("booted\nok").unwrap();
    let req = adapter.http().last(Method::Post, "/log").unwrap();
    assert_eq!(req.url, format!("{BASE_URL}/devices/{GUID}/log"));
    assert_eq!(req.body.as_deref(), Some(r#"{"message":"booted\nok"}"#));
}
