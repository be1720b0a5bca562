//! Integration tests for spreadsheet sync.
//!
//! A fake script endpoint is served in-process; the real transport, poller,
//! importer and outbound pusher talk to it over HTTP.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    routing::post,
    Json, Router,
};
use custody_engine::{Importer, MemoryStorage, RecordStore, StoreMode};
use custody_server::{
    app,
    config::Config,
    sheets::{self, OutboundHook, SheetClient, SyncController},
    websocket::{ConnectionManager, LiveFeedHook, ServerMessage},
    AppState,
};
use serde_json::{json, Value};
use std::{
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};
use tokio::sync::{mpsc, Mutex};
use tower::ServiceExt;

#[derive(Default)]
struct Sheet {
    rows: Vec<Value>,
    pushes: Vec<Value>,
}

type SharedSheet = Arc<StdMutex<Sheet>>;

async fn script(State(sheet): State<SharedSheet>, Json(body): Json<Value>) -> Json<Value> {
    let mut sheet = sheet.lock().unwrap();
    match body["type"].as_str().unwrap_or_default() {
        "get_row_count" => Json(json!({"success": true, "rowCount": sheet.rows.len()})),
        "sync_read" => Json(json!({"success": true, "data": {"rows": sheet.rows}})),
        _ => {
            sheet.pushes.push(body);
            Json(json!({"success": true}))
        }
    }
}

async fn serve_sheet(sheet: SharedSheet) -> String {
    let app = Router::new().route("/exec", post(script)).with_state(sheet);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/exec", addr)
}

struct Harness {
    app: Router,
    sheet: SharedSheet,
    conn_manager: Arc<ConnectionManager>,
}

async fn harness(rows: Value) -> Harness {
    let sheet: SharedSheet = Arc::new(StdMutex::new(Sheet {
        rows: serde_json::from_value(rows).unwrap(),
        pushes: Vec::new(),
    }));
    let url = serve_sheet(sheet.clone()).await;

    let client = SheetClient::new(sheets::default_transport(&url, Duration::from_secs(2)).unwrap());
    let conn_manager = ConnectionManager::new_shared();

    let mut store = RecordStore::new(Box::new(MemoryStorage::new()), StoreMode::Local);
    store.register_hook(Box::new(LiveFeedHook::new(conn_manager.clone())));
    let (tx, rx) = mpsc::unbounded_channel();
    store.register_hook(Box::new(OutboundHook::new(tx)));
    sheets::spawn_pusher(client.clone(), rx);

    let store = Arc::new(Mutex::new(store));
    let sync = SyncController::new(
        client,
        store.clone(),
        Importer::default(),
        conn_manager.clone(),
        Duration::from_secs(15),
    );

    let state = AppState {
        store,
        config: Arc::new(Config::default()),
        conn_manager: conn_manager.clone(),
        sync: Some(sync),
    };

    Harness {
        app: app(state),
        sheet,
        conn_manager,
    }
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn wait_for_pushes(sheet: &SharedSheet, count: usize) -> Vec<Value> {
    for _ in 0..50 {
        let pushes = sheet.lock().unwrap().pushes.clone();
        if pushes.len() >= count {
            return pushes;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    sheet.lock().unwrap().pushes.clone()
}

#[tokio::test]
async fn manual_sync_imports_rows() {
    let h = harness(json!([
        ["رقم", "الاسم", "الكمية الأصلية", "الكمية الكلية", "المتاح", "ملاحظات"],
        [1, "Drill", 5, 5, 5, ""]
    ]))
    .await;

    let (status, outcome) = call(&h.app, "POST", "/sync", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "merged");
    assert_eq!(outcome["report"]["created"], 1);
    assert_eq!(outcome["report"]["skipped"], 1);

    let (_, items) = call(&h.app, "GET", "/items", None).await;
    assert_eq!(items[0]["id"], "item_1");
    assert_eq!(items[0]["totalQty"], 5);

    let (_, status) = call(&h.app, "GET", "/sync/status", None).await;
    assert_eq!(status["configured"], true);
    assert_eq!(status["lastRowCount"], 2);
    assert_eq!(status["watermark"]["sequence"], 1);

    // Unchanged sheet: probe only
    let (_, outcome) = call(&h.app, "POST", "/sync", None).await;
    assert_eq!(outcome["outcome"], "unchanged");

    // Forced: fetch again, the row is compared and left alone
    let (_, outcome) = call(&h.app, "POST", "/sync", Some(json!({"force": true}))).await;
    assert_eq!(outcome["report"]["created"], 0);
    assert_eq!(outcome["report"]["unchanged"], 1);
}

#[tokio::test]
async fn local_changes_are_pushed_and_imports_are_not() {
    let h = harness(json!([[1, "Drill", 5, 5, 5, ""]])).await;

    call(&h.app, "POST", "/sync", None).await;

    let (status, item) = call(
        &h.app,
        "POST",
        "/items",
        Some(json!({"name": "Ladder", "totalQty": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let pushes = wait_for_pushes(&h.sheet, 1).await;
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0]["type"], "add_inventory");
    assert_eq!(pushes[0]["data"]["name"], "Ladder");

    call(&h.app, "DELETE", &format!("/items/{}", item["id"].as_str().unwrap()), None).await;
    let pushes = wait_for_pushes(&h.sheet, 2).await;
    assert_eq!(pushes[1]["type"], "delete_inventory");
    assert_eq!(pushes[1]["id"], item["id"]);
}

#[tokio::test]
async fn merges_are_announced_to_live_clients() {
    let h = harness(json!([[1, "Drill", 5, 5, 5, ""], [2, "Saw", 1, 1, 1, ""]])).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    h.conn_manager.register("test".to_string(), tx);

    call(&h.app, "POST", "/sync", None).await;

    let mut changed = 0;
    let mut synced = None;
    while let Ok(message) = rx.try_recv() {
        match message {
            ServerMessage::Changed { .. } => changed += 1,
            ServerMessage::Synced { report } => synced = Some(report),
            _ => {}
        }
    }
    assert_eq!(changed, 2);
    assert_eq!(synced.map(|r| r.created), Some(2));
}

#[tokio::test]
async fn sheet_edits_update_in_place() {
    let h = harness(json!([[1, "Drill", 5, 5, 5, "", "2024-05-01T08:00:00Z"]])).await;
    call(&h.app, "POST", "/sync", None).await;

    h.sheet.lock().unwrap().rows = vec![json!([1, "Drill", 5, 7, 7, "restocked", "2024-05-02T08:00:00Z"])];
    let (_, outcome) = call(&h.app, "POST", "/sync", Some(json!({"force": true}))).await;
    assert_eq!(outcome["report"]["updated"], 1);

    let (_, items) = call(&h.app, "GET", "/items", None).await;
    assert_eq!(items.as_array().unwrap().len(), 1);
    assert_eq!(items[0]["totalQty"], 7);
    assert_eq!(items[0]["notes"], "restocked");
    assert!(wait_for_pushes(&h.sheet, 1).await.is_empty());
}

#[tokio::test]
async fn untimestamped_edits_apply_when_the_sheet_grows() {
    let h = harness(json!([[1, "Drill", 5, 5, 5, ""]])).await;
    call(&h.app, "POST", "/sync", None).await;

    h.sheet.lock().unwrap().rows = vec![
        json!([1, "Drill", 5, 8, 8, ""]),
        json!([2, "Saw", 1, 1, 1, ""]),
    ];
    let (_, outcome) = call(&h.app, "POST", "/sync", None).await;
    assert_eq!(outcome["outcome"], "merged");
    assert_eq!(outcome["report"]["updated"], 1);
    assert_eq!(outcome["report"]["created"], 1);

    let (_, drill) = call(&h.app, "GET", "/items?q=Drill", None).await;
    assert_eq!(drill[0]["totalQty"], 8);
}
