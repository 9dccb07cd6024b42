//! API integration tests
//!
//! These run against a live server with a migrated database.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:5000/api";

fn unique(prefix: &str) -> String {
    format!("{} {}", prefix, chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

/// Creates a non-consumable item with `count` generated unit codes
async fn create_unit_item(client: &Client, count: usize) -> Value {
    let units: Vec<Value> = (0..count).map(|_| json!({})).collect();
    let response = client
        .post(format!("{}/barang", BASE_URL))
        .json(&json!({
            "nama": unique("Proyektor"),
            "jurusan": "RPL",
            "tipe": "tidak_habis_pakai",
            "units": units,
            "maxDurasiPinjam": 3
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse response");
    body["data"].clone()
}

async fn create_consumable(client: &Client, stock: i32) -> Value {
    let response = client
        .post(format!("{}/barang", BASE_URL))
        .json(&json!({
            "nama": unique("Kertas"),
            "jurusan": "DKV",
            "tipe": "habis_pakai",
            "stok": stock
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse response");
    body["data"].clone()
}

async fn request_units(client: &Client, item_id: i64, codes: &[&str]) -> Value {
    let response = client
        .post(format!("{}/peminjaman", BASE_URL))
        .json(&json!({
            "barang": item_id,
            "peminjamType": "lainnya",
            "peminjamNama": "Bu Sari",
            "peminjamAsal": "Guru RPL",
            "peminjamPhone": "081234567890",
            "isConsumable": false,
            "unitKodes": codes
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse response");
    body["data"].clone()
}

async fn get_item(client: &Client, id: i64) -> Value {
    let response = client
        .get(format!("{}/barang/{}", BASE_URL, id))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    body["data"].clone()
}

async fn put(client: &Client, path: String, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = client.put(format!("{}{}", BASE_URL, path));
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await.expect("Failed to send request");
    let status = response.status();
    let body: Value = response.json().await.expect("Failed to parse response");
    (status, body)
}

fn unit_status<'a>(item: &'a Value, code: &str) -> &'a str {
    item["units"]
        .as_array()
        .and_then(|units| units.iter().find(|u| u["kode"] == code))
        .and_then(|u| u["status"].as_str())
        .unwrap_or("")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_create_item_generates_unit_codes() {
    let client = Client::new();
    let item = create_unit_item(&client, 3).await;

    let units = item["units"].as_array().expect("units");
    assert_eq!(units.len(), 3);
    for unit in units {
        assert!(unit["kode"].as_str().unwrap().starts_with("RPL-PRO-"));
        assert_eq!(unit["status"], "tersedia");
    }
    assert_eq!(item["stok_dipinjam"], 0);
}

#[tokio::test]
#[ignore]
async fn test_loan_round_trip() {
    let client = Client::new();
    let item = create_unit_item(&client, 2).await;
    let item_id = item["_id"].as_i64().unwrap();
    let code = item["units"][0]["kode"].as_str().unwrap().to_string();

    let loan = request_units(&client, item_id, &[&code]).await;
    assert_eq!(loan["status"], "pending");
    let loan_id = loan["_id"].as_i64().unwrap();

    let (status, body) = put(&client, format!("/peminjaman/approve/{}", loan_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "approved");
    assert_eq!(body["data"]["rentalStatus"], "pinjam");

    let item = get_item(&client, item_id).await;
    assert_eq!(unit_status(&item, &code), "dipinjam");
    assert_eq!(item["stok_dipinjam"], 1);

    let (status, body) = put(
        &client,
        format!("/peminjaman/{}/return", loan_id),
        Some(json!({ "unitReturns": [{ "kode": code, "kondisi": "tersedia" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rentalStatus"], "kembali");
    assert_eq!(body["data"]["unitStatus"][0]["statusSetelahKembali"], "tersedia");

    let item = get_item(&client, item_id).await;
    assert_eq!(unit_status(&item, &code), "tersedia");
    assert_eq!(item["stok_dipinjam"], 0);
}

#[tokio::test]
#[ignore]
async fn test_second_approve_is_rejected() {
    let client = Client::new();
    let item = create_unit_item(&client, 1).await;
    let item_id = item["_id"].as_i64().unwrap();
    let code = item["units"][0]["kode"].as_str().unwrap().to_string();
    let loan = request_units(&client, item_id, &[&code]).await;
    let loan_id = loan["_id"].as_i64().unwrap();

    let (status, _) = put(&client, format!("/peminjaman/approve/{}", loan_id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = put(&client, format!("/peminjaman/approve/{}", loan_id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "AlreadyProcessed");

    let item = get_item(&client, item_id).await;
    assert_eq!(item["stok_dipinjam"], 1);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_approvals_of_same_unit() {
    let client = Client::new();
    let item = create_unit_item(&client, 1).await;
    let item_id = item["_id"].as_i64().unwrap();
    let code = item["units"][0]["kode"].as_str().unwrap().to_string();

    let first = request_units(&client, item_id, &[&code]).await;
    let second = request_units(&client, item_id, &[&code]).await;

    let (a, b) = tokio::join!(
        put(&client, format!("/peminjaman/approve/{}", first["_id"]), None),
        put(&client, format!("/peminjaman/approve/{}", second["_id"]), None),
    );

    let statuses = [a.0, b.0];
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    let loser = if a.0 == StatusCode::OK { b.1 } else { a.1 };
    assert_eq!(loser["error"], "UnitNotAvailable");

    let item = get_item(&client, item_id).await;
    assert_eq!(unit_status(&item, &code), "dipinjam");
    assert_eq!(item["stok_dipinjam"], 1);
}

async fn allocate(client: &Client, key: &str, count: u32) -> Vec<i64> {
    let response = client
        .post(format!("{}/barang/nextKode", BASE_URL))
        .json(&json!({ "key": key, "count": count }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    body["seq"]
        .as_array()
        .expect("seq")
        .iter()
        .map(|s| s.as_i64().unwrap())
        .collect()
}

async fn preview_code(client: &Client, jurusan: &str, nama: &str) -> String {
    let response = client
        .get(format!("{}/barang/nextKode", BASE_URL))
        .query(&[("jurusan", jurusan), ("nama", nama)])
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    body["kode"].as_str().unwrap().to_string()
}

#[tokio::test]
#[ignore]
async fn test_concurrent_counter_allocations_are_distinct() {
    let client = Client::new();
    let key = format!("TEST-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default());

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..10 {
        let client = client.clone();
        let key = key.clone();
        tasks.spawn(async move { allocate(&client, &key, 1).await });
    }

    let mut seqs = Vec::new();
    while let Some(result) = tasks.join_next().await {
        seqs.extend(result.expect("allocation task panicked"));
    }
    seqs.sort_unstable();

    assert_eq!(seqs, (1..=10).collect::<Vec<i64>>());
}

#[tokio::test]
#[ignore]
async fn test_code_preview_does_not_consume() {
    let client = Client::new();
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let abbrev: String = (0..3)
        .map(|i| (b'A' + ((nanos >> (i * 7)) % 26) as u8) as char)
        .collect();
    let name = format!("{} Alat", abbrev);

    let first = preview_code(&client, "TKJ", &name).await;
    let second = preview_code(&client, "TKJ", &name).await;
    assert_eq!(first, second);

    let key = format!("TKJ-{}", abbrev);
    let seq = allocate(&client, &key, 1).await[0];
    assert_eq!(first, format!("{}-{:03}", key, seq));
}

#[tokio::test]
#[ignore]
async fn test_deleting_active_loan_releases_units() {
    let client = Client::new();
    let item = create_unit_item(&client, 2).await;
    let item_id = item["_id"].as_i64().unwrap();
    let code = item["units"][1]["kode"].as_str().unwrap().to_string();
    let loan = request_units(&client, item_id, &[&code]).await;
    let loan_id = loan["_id"].as_i64().unwrap();
    put(&client, format!("/peminjaman/approve/{}", loan_id), None).await;

    let response = client
        .delete(format!("{}/peminjaman/{}", BASE_URL, loan_id))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let item = get_item(&client, item_id).await;
    assert_eq!(unit_status(&item, &code), "tersedia");
    assert_eq!(item["stok_dipinjam"], 0);

    let response = client
        .get(format!("{}/peminjaman/{}", BASE_URL, loan_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn test_consumable_stock_boundary() {
    let client = Client::new();
    let item = create_consumable(&client, 5).await;
    let item_id = item["_id"].as_i64().unwrap();

    let request = |jumlah: i32| {
        client.post(format!("{}/peminjaman", BASE_URL)).json(&json!({
            "barang": item_id,
            "peminjamType": "lainnya",
            "peminjamNama": "Pak Budi",
            "peminjamAsal": "Tata Usaha",
            "peminjamPhone": "0812000111",
            "isConsumable": true,
            "jumlah": jumlah
        }))
    };

    let response = request(6).send().await.expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "InsufficientStock");

    let response = request(5).send().await.expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse response");
    let loan_id = body["data"]["_id"].as_i64().unwrap();

    let (status, _) = put(&client, format!("/peminjaman/approve/{}", loan_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(get_item(&client, item_id).await["stok"], 0);

    let (status, body) = put(&client, format!("/peminjaman/{}/return", loan_id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "NotApplicable");
}

#[tokio::test]
#[ignore]
async fn test_rejection_leaves_item_untouched() {
    let client = Client::new();
    let item = create_unit_item(&client, 1).await;
    let item_id = item["_id"].as_i64().unwrap();
    let code = item["units"][0]["kode"].as_str().unwrap().to_string();
    let loan = request_units(&client, item_id, &[&code]).await;
    let loan_id = loan["_id"].as_i64().unwrap();

    let (status, body) = put(&client, format!("/peminjaman/reject/{}", loan_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "rejected");

    let (status, body) = put(&client, format!("/peminjaman/approve/{}", loan_id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "AlreadyProcessed");

    let item = get_item(&client, item_id).await;
    assert_eq!(unit_status(&item, &code), "tersedia");
}

#[tokio::test]
#[ignore]
async fn test_item_with_units_on_loan_cannot_be_deleted() {
    let client = Client::new();
    let item = create_unit_item(&client, 1).await;
    let item_id = item["_id"].as_i64().unwrap();
    let code = item["units"][0]["kode"].as_str().unwrap().to_string();
    let loan = request_units(&client, item_id, &[&code]).await;
    put(&client, format!("/peminjaman/approve/{}", loan["_id"]), None).await;

    let response = client
        .delete(format!("{}/barang/{}", BASE_URL, item_id))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore]
async fn test_unit_override_return() {
    let client = Client::new();
    let item = create_unit_item(&client, 1).await;
    let item_id = item["_id"].as_i64().unwrap();
    let code = item["units"][0]["kode"].as_str().unwrap().to_string();
    let loan = request_units(&client, item_id, &[&code]).await;
    put(&client, format!("/peminjaman/approve/{}", loan["_id"]), None).await;

    let (status, body) = put(
        &client,
        format!("/barang/unit/{}/kembalikan", code),
        Some(json!({ "status": "dipinjam" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidCondition");

    let (status, _) = put(
        &client,
        format!("/barang/unit/{}/kembalikan", code),
        Some(json!({ "status": "rusak" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let item = get_item(&client, item_id).await;
    assert_eq!(unit_status(&item, &code), "rusak");
    assert_eq!(item["stok_dipinjam"], 0);
}

#[tokio::test]
#[ignore]
async fn test_logs_require_authentication() {
    let client = Client::new();

    let response = client
        .get(format!("{}/logs", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
