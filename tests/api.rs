//! HTTP-level tests driving the router over the in-memory store.

#![allow(clippy::panic)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use reservation_core::api;
use reservation_core::app_state::AppState;
use reservation_core::config::ServiceConfig;
use reservation_core::domain::DiningTable;
use reservation_core::persistence::MemoryStore;

const ADMIN_TOKEN: &str = "let-me-in";

fn app() -> Router {
    let tables = (1..=6).map(|id| DiningTable {
        id,
        code: format!("M-{id:02}"),
        capacity: 4,
        location: None,
        active: true,
    });
    let config = ServiceConfig {
        admin_override_token: Some(ADMIN_TOKEN.to_string()),
        ..ServiceConfig::default()
    };
    let state = AppState::new(MemoryStore::with_tables(tables), config);
    api::build_router().with_state(state)
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    };
    let Ok(request) = request else {
        panic!("bad request for {uri}");
    };
    let Ok(response) = app.clone().oneshot(request).await else {
        panic!("router failed for {uri}");
    };
    let status = response.status();
    let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
        panic!("body read failed for {uri}");
    };
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn table_booking(customer_id: i64, date: &str, time: &str, table_id: i64) -> Value {
    json!({
        "customer_id": customer_id,
        "reservation_date": date,
        "reservation_time": time,
        "payment_method": "CASH",
        "reservation_type": "TABLE",
        "holder_name": "Lucia Ramos",
        "holder_email": "lucia@example.com",
        "terms_accepted": true,
        "tables": [{"table_id": table_id}]
    })
}

fn id_of(body: &Value) -> i64 {
    let Some(id) = body.get("id").and_then(Value::as_i64) else {
        panic!("response has no id: {body}");
    };
    id
}

#[tokio::test]
async fn booking_scenario_end_to_end() {
    let app = app();

    let (status, created) = call(
        &app,
        "POST",
        "/reservation",
        Some(table_booking(10, "2025-07-04", "13:00:00", 2)),
        &[("x-user-id", "42")],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "PENDING");
    assert_eq!(created["code"], "RES-20250704-001");
    assert_eq!(created["created_by"], 42);
    assert_eq!(created["tables"][0]["table_id"], 2);
    let id = id_of(&created);

    let (status, available) = call(
        &app,
        "GET",
        "/reservation/table-availability?tableId=2&date=2025-07-04&time=13:00",
        None,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(available, Value::Bool(false));

    let (status, _) = call(
        &app,
        "POST",
        "/reservation",
        Some(table_booking(11, "2025-07-04", "13:00", 2)),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, cancelled) = call(&app, "PATCH", &format!("/reservation/{id}/cancel"), None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");
    assert!(cancelled["cancelled_at"].is_string());

    let (status, again) = call(&app, "PATCH", &format!("/reservation/{id}/cancel"), None, &[]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(again["error"]["code"], 2201);

    let (_, available) = call(
        &app,
        "GET",
        "/reservation/table-availability?tableId=2&date=2025-07-04&time=13:00:00",
        None,
        &[],
    )
    .await;
    assert_eq!(available, Value::Bool(true));

    let (status, notifications) = call(
        &app,
        "GET",
        &format!("/notification/reservation/{id}"),
        None,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let types: Vec<&str> = notifications
        .as_array()
        .map(|list| list.iter().filter_map(|n| n["notification_type"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(types, vec!["CREATION", "CANCELLATION"]);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let app = app();
    let (status, body) = call(&app, "GET", "/reservation/999", None, &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], 2001);

    let (status, body) = call(&app, "GET", "/notification/999", None, &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], 2002);

    let (status, _) = call(&app, "PATCH", "/reservation/999/checkin", None, &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_persistence() {
    let app = app();
    let mut missing_time = table_booking(10, "2025-07-04", "13:00", 1);
    if let Some(body) = missing_time.as_object_mut() {
        body.remove("reservation_time");
    }
    let (status, body) = call(&app, "POST", "/reservation", Some(missing_time), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1001);

    let event = json!({
        "customer_id": 10,
        "reservation_date": "2025-08-15",
        "payment_method": "CARD",
        "reservation_type": "EVENTO",
        "event_type_id": 3,
        "event_shift": "brunch"
    });
    let (status, body) = call(&app, "POST", "/reservation", Some(event), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], 1002);

    let (status, listed) = call(&app, "GET", "/reservation/customer/10", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed, json!([]));

    let (status, _) = call(
        &app,
        "GET",
        "/reservation/date/2025-07-04/status/LOST",
        None,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn event_booking_and_shift_grid() {
    let app = app();
    let event = json!({
        "customer_id": 10,
        "reservation_date": "2025-08-15",
        "payment_method": "CARD",
        "reservation_type": "EVENT",
        "event_type_id": 3,
        "event_shift": 3,
        "events": [{"service_id": 8, "quantity": 1, "subtotal": "150.00"}]
    });
    let (status, created) = call(&app, "POST", "/reservation", Some(event.clone()), &[]).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["event_shift"], "EVENING");
    assert_eq!(created["events"][0]["subtotal"], "150.00");

    let (status, _) = call(&app, "POST", "/reservation", Some(event), &[]).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, grid) = call(
        &app,
        "GET",
        "/reservation/event-shifts/availability?date=2025-08-15",
        None,
        &[],
    )
    .await;
    assert_eq!(grid["available_shifts"], json!([1, 2]));
    assert_eq!(grid["occupied_shifts"], json!([3]));

    let (_, free) = call(
        &app,
        "GET",
        "/reservation/event-availability?eventTypeId=3&date=2025-08-15&shift=noche",
        None,
        &[],
    )
    .await;
    assert_eq!(free, Value::Bool(false));
}

#[tokio::test]
async fn schedule_reports_sixteen_slots() {
    let app = app();
    let (status, _) = call(
        &app,
        "POST",
        "/reservation",
        Some(table_booking(10, "2025-06-01", "19:00", 5)),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, grid) = call(&app, "GET", "/reservation/availability?date=2025-06-01", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    let Some(slots) = grid.as_array() else {
        panic!("grid should be an array");
    };
    assert_eq!(slots.len(), 16);
    for slot in slots {
        let Some(tables) = slot["tables"].as_array() else {
            panic!("slot without tables: {slot}");
        };
        let Some(table5) = tables.iter().find(|t| t["id"] == 5) else {
            panic!("table 5 missing");
        };
        let expected = slot["time"] != "19:00:00";
        assert_eq!(table5["available"], Value::Bool(expected), "slot {slot}");
    }
}

#[tokio::test]
async fn update_replaces_line_items() {
    let app = app();
    let mut booking = table_booking(10, "2025-07-04", "13:00", 2);
    booking["products"] = json!([
        {"product_id": 1, "quantity": 1, "subtotal": "10.00"},
        {"product_id": 2, "quantity": 1, "subtotal": "12.00"}
    ]);
    let (_, created) = call(&app, "POST", "/reservation", Some(booking.clone()), &[]).await;
    let id = id_of(&created);

    booking["products"] = json!([{"product_id": 3, "quantity": 2, "subtotal": "30.00"}]);
    booking["people_count"] = json!(4);
    let (status, updated) = call(&app, "PUT", &format!("/reservation/{id}"), Some(booking), &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["people_count"], 4);
    assert_eq!(updated["code"], created["code"]);
    assert_eq!(updated["products"].as_array().map(Vec::len), Some(1));

    let (_, audit) = call(
        &app,
        "GET",
        &format!("/reservation/{id}?include_inactive=true"),
        None,
        &[],
    )
    .await;
    let Some(products) = audit["products"].as_array() else {
        panic!("products missing");
    };
    assert_eq!(products.len(), 3);
    assert_eq!(
        products.iter().filter(|p| p["active"] == false).count(),
        2
    );
}

#[tokio::test]
async fn status_override_needs_the_admin_token() {
    let app = app();
    let (_, created) = call(
        &app,
        "POST",
        "/reservation",
        Some(table_booking(10, "2025-07-04", "20:00", 3)),
        &[],
    )
    .await;
    let id = id_of(&created);
    let uri = format!("/reservation/{id}/status");
    let body = json!({"status": "PAID"});

    let (status, denied) = call(&app, "PATCH", &uri, Some(body.clone()), &[]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(denied["error"]["code"], 2401);

    let (status, forced) = call(
        &app,
        "PATCH",
        &uri,
        Some(body),
        &[("x-admin-token", ADMIN_TOKEN)],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(forced["status"], "PAID");

    let (status, again) = call(&app, "PATCH", &format!("/reservation/{id}/paid"), None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["status"], "PAID");
}

#[tokio::test]
async fn manual_notification_and_listing_by_date() {
    let app = app();
    let (_, created) = call(
        &app,
        "POST",
        "/reservation",
        Some(table_booking(10, "2025-07-04", "13:00", 2)),
        &[],
    )
    .await;
    let id = id_of(&created);

    let (status, note) = call(
        &app,
        "POST",
        "/notification",
        Some(json!({
            "reservation_id": id,
            "notification_type": "UPDATE",
            "channel": "SMS",
            "message": "Running ten minutes late is fine"
        })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(note["status"], "PENDING");
    let Some(note_id) = note["id"].as_i64() else {
        panic!("notification id missing");
    };
    let (status, fetched) = call(&app, "GET", &format!("/notification/{note_id}"), None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["channel"], "SMS");

    let (status, missing) = call(
        &app,
        "POST",
        "/notification",
        Some(json!({
            "reservation_id": 999,
            "notification_type": "UPDATE",
            "message": "hello"
        })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(missing["error"]["code"], 2001);

    let (_, all) = call(&app, "GET", "/reservation/date/2025-07-04/status/ALL", None, &[]).await;
    assert_eq!(all.as_array().map(Vec::len), Some(1));
    let (_, paid) = call(&app, "GET", "/reservation/date/2025-07-04/status/PAID", None, &[]).await;
    assert_eq!(paid, json!([]));
}

#[tokio::test]
async fn health_reports_version() {
    let app = app();
    let (status, body) = call(&app, "GET", "/health", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
