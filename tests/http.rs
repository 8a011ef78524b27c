use std::sync::Arc;

use serde_json::{json, Value};
use time::Date;
use url::Url;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::test::request;
use warp::Reply;

use tracker::auth::{hash_password, Credential};
use tracker::client::{Client, ClientDetails, ClientId};
use tracker::db::memory::MemoryDb;
use tracker::db::Db;
use tracker::environment::{Config, Environment};
use tracker::routes;
use tracker::store::mock::MockStore;
use tracker::urls::Urls;

type Api = BoxedFilter<(Box<dyn Reply>,)>;

const BOUNDARY: &str = "thisisaboundary1234";
const PASSWORD: &str = "correct horse";

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];

struct Harness {
    api: Api,
    db: Arc<MemoryDb>,
    store: Arc<MockStore>,
}

fn ymd(year: i32, month: u8, day: u8) -> Date {
    Date::try_from_ymd(year, month, day).unwrap()
}

fn blob_base() -> Url {
    Url::parse("https://cdn.example.com/").unwrap()
}

async fn harness() -> Harness {
    harness_with_store(MockStore::new(blob_base())).await
}

/// An API over an in-memory database holding an admin login and two
/// clients, `jdoe` and `rroe`, each with their own login. Today is
/// pinned to 2024-06-15.
async fn harness_with_store(store: MockStore) -> Harness {
    let db = Arc::new(MemoryDb::with_default_lookups());
    let store = Arc::new(store);

    for (username, name) in &[("admin", "Coach"), ("jdoe", "Jane Doe"), ("rroe", "Richard Roe")] {
        let hash = hash_password(PASSWORD, 4).unwrap();
        db.create_credential(Credential::new(username.to_string(), name.to_string(), hash))
            .await
            .unwrap();
    }

    for (id, first, last) in &[("jdoe", "Jane", "Doe"), ("rroe", "Richard", "Roe")] {
        let details = ClientDetails::new(*first, *last, ymd(1994, 1, 1), "strength", "referral");
        db.insert_client(Client::new(ClientId::parse(id).unwrap(), details))
            .await
            .unwrap();
    }

    let environment: Environment<()> = Environment::new(
        Arc::new(log::discard()),
        db.clone(),
        Arc::new(Urls::new(
            Url::parse("https://www.example.com/").unwrap(),
            "api",
        )),
        store.clone(),
        Arc::new(|| Date::try_from_ymd(2024, 6, 15).unwrap()),
        Config::default(),
    );

    Harness {
        api: routes::make_api(environment),
        db,
        store,
    }
}

async fn login(api: &Api, username: &str) -> String {
    let response = request()
        .method("POST")
        .path("/api/login")
        .body(json!({ "username": username, "password": PASSWORD }).to_string())
        .reply(api)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_of(response.body());

    format!("Bearer {}", body["token"].as_str().unwrap())
}

async fn get(api: &Api, path: &str, token: &str) -> (StatusCode, Value) {
    let response = request()
        .method("GET")
        .path(path)
        .header("authorization", token)
        .reply(api)
        .await;

    (response.status(), body_of(response.body()))
}

async fn send(api: &Api, method: &str, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
    let response = request()
        .method(method)
        .path(path)
        .header("authorization", token)
        .body(body.to_string())
        .reply(api)
        .await;

    (response.status(), body_of(response.body()))
}

fn body_of(raw: &[u8]) -> Value {
    if raw.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(raw).unwrap()
    }
}

fn multipart_body(metadata: &str, image: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();

    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"metadata\"\r\nContent-Type: application/json\r\n\r\n{}\r\n",
            BOUNDARY, metadata
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"meal\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            BOUNDARY
        )
        .as_bytes(),
    );
    body.extend_from_slice(image);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    body
}

async fn upload(api: &Api, client: &str, token: &str, metadata: &str, image: &[u8]) -> (StatusCode, Value) {
    let response = request()
        .method("POST")
        .path(&format!("/api/clients/{}/nutrition", client))
        .header("authorization", token)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(multipart_body(metadata, image))
        .reply(api)
        .await;

    (response.status(), body_of(response.body()))
}

async fn log_sessions(api: &Api, client: &str, token: &str, sessions: Vec<Value>) {
    for session in sessions {
        let (status, body) = send(
            api,
            "POST",
            &format!("/api/clients/{}/sessions", client),
            token,
            session,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }
}

#[tokio::test]
async fn logging_in_reports_the_role() {
    let h = harness().await;

    let admin = login(&h.api, "admin").await;
    let (status, me) = get(&h.api, "/api/me", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["role"], "admin");
    assert_eq!(me["name"], "Coach");

    let client = login(&h.api, "jdoe").await;
    let (_, me) = get(&h.api, "/api/me", &client).await;
    assert_eq!(me["role"], "client");
    assert_eq!(me["client"], "jdoe");
}

#[tokio::test]
async fn bad_credentials_are_refused_inline() {
    let h = harness().await;

    for (username, password) in &[("jdoe", "wrong"), ("nobody", PASSWORD)] {
        let response = request()
            .method("POST")
            .path("/api/login")
            .body(json!({ "username": username, "password": password }).to_string())
            .reply(&h.api)
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_of(response.body());
        assert_eq!(body["message"], "username/password is incorrect");
        assert_eq!(body["operation"], "login");
    }
}

#[tokio::test]
async fn requests_need_a_live_token() {
    let h = harness().await;

    let response = request()
        .method("GET")
        .path("/api/exercises")
        .reply(&h.api)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (status, _) = get(&h.api, "/api/exercises", "Bearer not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = login(&h.api, "jdoe").await;
    let (status, _) = get(&h.api, "/api/exercises", &token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&h.api, "POST", "/api/logout", &token, Value::Null).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = get(&h.api, "/api/exercises", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn clients_only_reach_their_own_records() {
    let h = harness().await;
    let token = login(&h.api, "jdoe").await;

    for path in &[
        "/api/clients",
        "/api/dashboard",
        "/api/clients/rroe",
        "/api/clients/rroe/sessions",
        "/api/clients/rroe/progress",
        "/api/clients/rroe/body",
        "/api/clients/rroe/nutrition",
    ] {
        let (status, body) = get(&h.api, path, &token).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", path);
        assert_eq!(body["message"], "not allowed");
    }

    let (status, _) = get(&h.api, "/api/clients/jdoe", &token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &h.api,
        "POST",
        "/api/clients/jdoe/body",
        &token,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_manages_clients() {
    let h = harness().await;
    let token = login(&h.api, "admin").await;

    let new_client = json!({
        "id": "asmith",
        "first_name": "  Anna ",
        "last_name": "Smith",
        "date_of_birth": "1988-03-02",
        "program": "hypertrophy",
        "source": "instagram"
    });

    let response = request()
        .method("POST")
        .path("/api/clients")
        .header("authorization", &token)
        .body(new_client.to_string())
        .reply(&h.api)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        response.headers().get("location").unwrap().to_str().unwrap(),
        "https://www.example.com/api/clients/asmith"
    );
    assert!(response.headers().contains_key("server-timing"));

    let (status, client) = get(&h.api, "/api/clients/asmith", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(client["first_name"], "Anna");
    assert_eq!(client["date_of_birth"], "1988-03-02");

    let (status, body) = send(&h.api, "POST", "/api/clients", &token, new_client).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "client already exists");

    let (status, updated) = send(
        &h.api,
        "PUT",
        "/api/clients/asmith",
        &token,
        json!({
            "first_name": "Anna",
            "last_name": "Smith-Jones",
            "date_of_birth": "02/03/1988",
            "program": "strength"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["last_name"], "Smith-Jones");
    assert_eq!(updated["date_of_birth"], "1988-03-02");

    let (_, clients) = get(&h.api, "/api/clients", &token).await;
    let ids = clients
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap().to_owned())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["asmith", "jdoe", "rroe"]);

    let (status, _) = send(&h.api, "DELETE", "/api/clients/asmith", &token, Value::Null).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = get(&h.api, "/api/clients/asmith", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&h.api, "DELETE", "/api/clients/asmith", &token, Value::Null).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_client_records_are_rejected() {
    let h = harness().await;
    let token = login(&h.api, "admin").await;

    let (status, _) = send(
        &h.api,
        "POST",
        "/api/clients",
        &token,
        json!({ "id": "admin", "first_name": "A", "last_name": "B", "date_of_birth": "1990-01-01" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &h.api,
        "POST",
        "/api/clients",
        &token,
        json!({ "id": "blank", "first_name": "  ", "last_name": "B", "date_of_birth": "1990-01-01" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["operation"], "create_client");
    assert_eq!(body["id"], "blank");
}

#[tokio::test]
async fn logged_sessions_read_back_unchanged() {
    let h = harness().await;
    let token = login(&h.api, "jdoe").await;

    let (status, created) = send(
        &h.api,
        "POST",
        "/api/clients/jdoe/sessions",
        &token,
        json!({
            "date": "2024-06-10",
            "exercise": "Squat",
            "sets": 3,
            "reps": "10",
            "load_kg": 100
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    log_sessions(
        &h.api,
        "jdoe",
        &token,
        vec![json!({
            "date": "12/06/2024",
            "exercise": "Plank",
            "sets": 2,
            "measure": { "duration_secs": 45 },
            "load_kg": 0
        })],
    )
    .await;

    let (status, body) = get(&h.api, "/api/clients/jdoe/sessions", &token).await;
    assert_eq!(status, StatusCode::OK);

    let sessions = body["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 2);

    assert_eq!(sessions[0]["exercise"], "Plank");
    assert_eq!(sessions[0]["measure"], json!({ "duration_secs": 45 }));

    let squat = &sessions[1];
    assert_eq!(squat["id"], created["id"]);
    assert_eq!(squat["client_id"], "jdoe");
    assert_eq!(squat["date"], "2024-06-10");
    assert_eq!(squat["exercise"], "Squat");
    assert_eq!(squat["sets"], 3);
    assert_eq!(squat["measure"], json!({ "reps": 10 }));
    assert_eq!(squat["load_kg"], 100.0);

    let (_, one_day) = get(&h.api, "/api/clients/jdoe/sessions?date=2024-06-12", &token).await;
    assert_eq!(one_day["sessions"].as_array().unwrap().len(), 1);

    let (status, _) = get(&h.api, "/api/clients/jdoe/sessions?date=yesterday", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_counts_never_reach_the_session_log() {
    let h = harness().await;
    let token = login(&h.api, "jdoe").await;

    for session in vec![
        json!({ "date": "2024-06-10", "exercise": "Squat", "sets": 3, "reps": 3_000_000_000u64, "load_kg": 100 }),
        json!({ "date": "2024-06-10", "exercise": "Plank", "sets": 1, "reps": "3000000000s", "load_kg": 0 }),
        json!({ "date": "2024-06-10", "exercise": "Squat", "sets": 3_000_000_000u64, "reps": 5, "load_kg": 100 }),
    ] {
        let (status, body) = send(&h.api, "POST", "/api/clients/jdoe/sessions", &token, session).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    }

    log_sessions(
        &h.api,
        "jdoe",
        &token,
        vec![json!({ "date": "2024-06-11", "exercise": "Squat", "sets": 3, "reps": 5, "load_kg": 100 })],
    )
    .await;

    let (status, body) = get(&h.api, "/api/clients/jdoe/progress", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessions_done"], 1);
}

#[tokio::test]
async fn malformed_measures_are_never_stored() {
    let h = harness().await;
    let token = login(&h.api, "jdoe").await;

    for measure in &[json!("ten"), json!("30m"), json!(-3)] {
        let (status, body) = send(
            &h.api,
            "POST",
            "/api/clients/jdoe/sessions",
            &token,
            json!({
                "date": "2024-06-10",
                "exercise": "Squat",
                "sets": 3,
                "reps": measure,
                "load_kg": 100
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", measure);
        assert_eq!(body["operation"], "log_session");
    }

    let (_, body) = get(&h.api, "/api/clients/jdoe/sessions", &token).await;
    assert!(body["sessions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn sessions_need_a_known_client() {
    let h = harness().await;
    let token = login(&h.api, "admin").await;

    let (status, body) = send(
        &h.api,
        "POST",
        "/api/clients/ghost/sessions",
        &token,
        json!({ "date": "2024-06-10", "exercise": "Squat", "sets": 3, "reps": 5, "load_kg": 100 }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "client does not exist");
}

#[tokio::test]
async fn sessions_are_edited_by_their_owner_only() {
    let h = harness().await;
    let jdoe = login(&h.api, "jdoe").await;
    let rroe = login(&h.api, "rroe").await;

    let (_, created) = send(
        &h.api,
        "POST",
        "/api/clients/jdoe/sessions",
        &jdoe,
        json!({ "date": "2024-06-10", "exercise": "Deadlift", "sets": 5, "reps": 5, "load_kg": 120 }),
    )
    .await;
    let path = format!("/api/sessions/{}", created["id"].as_str().unwrap());
    let update = json!({ "sets": 4, "reps": "6", "load_kg": 125 });

    let (status, _) = send(&h.api, "PUT", &path, &rroe, update.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = send(&h.api, "PUT", &path, &jdoe, update).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["sets"], 4);
    assert_eq!(updated["measure"], json!({ "reps": 6 }));
    assert_eq!(updated["load_kg"], 125.0);
    assert_eq!(updated["exercise"], "Deadlift");

    let (status, _) = send(&h.api, "DELETE", &path, &rroe, Value::Null).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&h.api, "DELETE", &path, &jdoe, Value::Null).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&h.api, "DELETE", &path, &jdoe, Value::Null).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&h.api, "DELETE", "/api/sessions/42", &jdoe, Value::Null).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn progress_reports_one_rep_max_estimates() {
    let h = harness().await;
    let token = login(&h.api, "jdoe").await;

    log_sessions(
        &h.api,
        "jdoe",
        &token,
        vec![
            json!({ "date": "2024-06-10", "exercise": "Squat", "sets": 1, "reps": 5, "load_kg": 100 }),
            json!({ "date": "2024-06-10", "exercise": "Squat", "sets": 1, "reps": 10, "load_kg": 90 }),
            json!({ "date": "2024-06-12", "exercise": "Squat", "sets": 1, "reps": 1, "load_kg": 120 }),
            json!({ "date": "2024-06-12", "exercise": "Plank", "sets": 3, "reps": "60s", "load_kg": 0 }),
        ],
    )
    .await;

    let (status, body) = get(&h.api, "/api/clients/jdoe/progress?exercise=Squat", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessions_done"], 2);

    let rows = body["one_rep_max"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["exercise"] == "Squat"));

    assert_eq!(rows[0]["date"], "2024-06-12");
    assert!((rows[0]["one_rep_max"].as_f64().unwrap() - 120.0 * (1.0 + 0.0333)).abs() < 1e-9);

    let averaged = (100.0 * (1.0 + 0.0333 * 5.0) + 90.0 * (1.0 + 0.0333 * 10.0)) / 2.0;
    assert!((rows[1]["one_rep_max"].as_f64().unwrap() - averaged).abs() < 1e-9);

    assert_eq!(body["history"], body["one_rep_max"]);

    let (_, without) = get(&h.api, "/api/clients/jdoe/progress", &token).await;
    assert_eq!(without["history"], Value::Null);
}

#[tokio::test]
async fn body_metrics_are_derived_from_snapshots() {
    let h = harness().await;
    let admin = login(&h.api, "admin").await;
    let client = login(&h.api, "jdoe").await;

    let snapshot = |measured_on: &str, weight: f64, activity: &str| {
        json!({
            "measured_on": measured_on,
            "date_of_birth": "1994-01-01",
            "body_wt_kg": weight,
            "body_fat_pct": 20,
            "height_cm": 180,
            "activity_level": activity,
            "goal_diet": "cut"
        })
    };

    for body in vec![
        snapshot("2024-05-01", 82.0, "moderately_active"),
        snapshot("2024-06-01", 80.0, "moderately_active"),
        snapshot("2024-06-05", 79.0, "couch"),
    ] {
        let (status, _) = send(&h.api, "POST", "/api/clients/jdoe/body", &admin, body).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = get(&h.api, "/api/clients/jdoe/body", &client).await;
    assert_eq!(status, StatusCode::OK);

    let latest = &body["latest"];
    assert_eq!(latest["measured_on"], "2024-06-01");
    assert_eq!(latest["fat_mass"], 16.0);
    assert_eq!(latest["lean_mass"], 64.0);
    assert_eq!(latest["age"], 30);
    assert_eq!(latest["bmr"], 1780.0);
    assert_eq!(latest["tee"], 2759.0);
    assert_eq!(latest["goal_calories"], 2259.0);

    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["measured_on"], "2024-05-01");

    let (status, _) = send(
        &h.api,
        "POST",
        "/api/clients/jdoe/body",
        &admin,
        json!({
            "measured_on": "2024-06-01",
            "date_of_birth": "1994-01-01",
            "body_wt_kg": -1,
            "body_fat_pct": 20,
            "height_cm": 180,
            "activity_level": "sedentary",
            "goal_diet": "cut"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn body_metrics_are_empty_without_snapshots() {
    let h = harness().await;
    let token = login(&h.api, "jdoe").await;

    let (status, body) = get(&h.api, "/api/clients/jdoe/body", &token).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["latest"], Value::Null);
    assert_eq!(body["history"], json!([]));
}

#[tokio::test]
async fn meal_photos_are_stored_per_slot() {
    let h = harness().await;
    let token = login(&h.api, "jdoe").await;
    let metadata = r#"{"date": "2024-06-14", "meal": "lunch"}"#;

    let (status, entry) = upload(&h.api, "jdoe", &token, metadata, JPEG).await;
    assert_eq!(status, StatusCode::CREATED, "{}", entry);
    assert_eq!(
        entry["image_url"],
        "https://cdn.example.com/nutrition/jdoe/2024-06-14/lunch.jpg"
    );

    let stored = h.store.get("nutrition/jdoe/2024-06-14/lunch.jpg").unwrap();
    assert_eq!(stored.content_type, "image/jpeg");
    assert_eq!(stored.data, JPEG);

    let (status, replaced) = upload(&h.api, "jdoe", &token, metadata, PNG).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(replaced["id"], entry["id"]);

    upload(
        &h.api,
        "jdoe",
        &token,
        r#"{"date": "2024-06-14", "meal": "breakfast"}"#,
        JPEG,
    )
    .await;

    let (status, body) = get(&h.api, "/api/clients/jdoe/nutrition", &token).await;
    assert_eq!(status, StatusCode::OK);

    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["meal"], "breakfast");
    assert_eq!(entries[1]["meal"], "lunch");
    assert_eq!(
        entries[1]["image_url"],
        "https://cdn.example.com/nutrition/jdoe/2024-06-14/lunch.png"
    );
}

#[tokio::test]
async fn bad_uploads_are_refused() {
    let h = harness().await;
    let token = login(&h.api, "jdoe").await;
    let metadata = r#"{"date": "2024-06-14", "meal": "dinner"}"#;

    let (status, body) = upload(&h.api, "jdoe", &token, metadata, b"GIF89a....").await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["message"], "unsupported image format");

    let (status, _) = upload(&h.api, "jdoe", &token, r#"{"date": "2024-06-14", "meal": "brunch"}"#, JPEG).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let admin = login(&h.api, "admin").await;
    let (status, _) = upload(&h.api, "ghost", &admin, metadata, JPEG).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(h.store.keys().is_empty());
    assert!(h
        .db
        .retrieve_nutrition(&ClientId::parse("jdoe").unwrap())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn upload_parts_are_read_in_any_order() {
    let h = harness().await;
    let token = login(&h.api, "jdoe").await;

    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"meal\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            BOUNDARY
        )
        .as_bytes(),
    );
    body.extend_from_slice(PNG);
    body.extend_from_slice(
        format!(
            "\r\n--{}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nextra cheese\r\n",
            BOUNDARY
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"metadata\"\r\n\r\n{}\r\n--{}--\r\n",
            BOUNDARY, r#"{"date": "2024-06-13", "meal": "dinner"}"#, BOUNDARY
        )
        .as_bytes(),
    );

    let response = request()
        .method("POST")
        .path("/api/clients/jdoe/nutrition")
        .header("authorization", &token)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(body)
        .reply(&h.api)
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        h.store.keys(),
        vec!["nutrition/jdoe/2024-06-13/dinner.png".to_owned()]
    );

    let (status, body) = upload_image_only(&h.api, "jdoe", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "missing parts in form submission");
}

async fn upload_image_only(api: &Api, client: &str, token: &str) -> (StatusCode, Value) {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"meal\"\r\n\r\n",
            BOUNDARY
        )
        .as_bytes(),
    );
    body.extend_from_slice(JPEG);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    let response = request()
        .method("POST")
        .path(&format!("/api/clients/{}/nutrition", client))
        .header("authorization", token)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(body)
        .reply(api)
        .await;

    (response.status(), body_of(response.body()))
}

#[tokio::test]
async fn failed_uploads_write_nothing() {
    let h = harness_with_store(MockStore::failing(blob_base())).await;
    let token = login(&h.api, "jdoe").await;

    let (status, body) = upload(
        &h.api,
        "jdoe",
        &token,
        r#"{"date": "2024-06-14", "meal": "supper"}"#,
        PNG,
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "failed to upload image");
    assert!(h
        .db
        .retrieve_nutrition(&ClientId::parse("jdoe").unwrap())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn dashboard_summarizes_the_cohort() {
    let h = harness().await;
    let admin = login(&h.api, "admin").await;

    let session = |date: &str| {
        json!({ "date": date, "exercise": "Row", "sets": 3, "reps": 12, "load_kg": 40 })
    };

    log_sessions(
        &h.api,
        "jdoe",
        &admin,
        vec![session("2024-05-20"), session("2024-06-03"), session("2024-06-04"), session("2024-06-04")],
    )
    .await;
    log_sessions(&h.api, "rroe", &admin, vec![session("2024-06-10")]).await;

    let (status, body) = get(&h.api, "/api/dashboard", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_clients"], 2);
    assert_eq!(
        body["cohort"],
        json!({
            "month": "2024-06",
            "active_clients": 2,
            "previous_active_clients": 1,
            "change_percent": 100.0
        })
    );
    assert_eq!(
        body["sessions_per_client"],
        json!([
            { "client_id": "jdoe", "sessions": 2 },
            { "client_id": "rroe", "sessions": 1 }
        ])
    );

    let (_, may) = get(&h.api, "/api/dashboard?month=2024-05", &admin).await;
    assert_eq!(may["cohort"]["active_clients"], 1);
    assert_eq!(may["cohort"]["previous_active_clients"], 0);
    assert_eq!(may["cohort"]["change_percent"], Value::Null);

    let (status, _) = get(&h.api, "/api/dashboard?month=2024-13", &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn lookups_are_listed() {
    let h = harness().await;
    let admin = login(&h.api, "admin").await;

    let (status, _) = send(&h.api, "POST", "/api/exercises", &admin, json!({ "name": " Bench Press " })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&h.api, "POST", "/api/exercises", &admin, json!({ "name": "Bench Press" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let client = login(&h.api, "jdoe").await;
    let (status, _) = send(&h.api, "POST", "/api/exercises", &client, json!({ "name": "Curl" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, exercises) = get(&h.api, "/api/exercises", &client).await;
    assert_eq!(exercises, json!(["Bench Press"]));

    let (_, meals) = get(&h.api, "/api/meals", &client).await;
    let meals = meals.as_array().unwrap();
    assert_eq!(meals.len(), 7);
    assert_eq!(meals[0], json!({ "key": "breakfast", "label": "Breakfast" }));

    let (_, levels) = get(&h.api, "/api/activity-levels", &client).await;
    assert_eq!(levels.as_array().unwrap().len(), 5);

    let (_, diets) = get(&h.api, "/api/goal-diets", &client).await;
    assert_eq!(diets[0]["key"], "cut");
}

#[tokio::test]
async fn healthz_reports_the_version() {
    let h = harness().await;
    let environment: Environment<()> = Environment::new(
        Arc::new(log::discard()),
        h.db.clone(),
        Arc::new(Urls::new(Url::parse("https://www.example.com/").unwrap(), "api")),
        h.store.clone(),
        Arc::new(|| Date::try_from_ymd(2024, 6, 15).unwrap()),
        Config::default(),
    );

    let response = request()
        .method("GET")
        .path("/healthz")
        .reply(&routes::admin::make_healthz_route(environment))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_of(response.body())["version"], info::VERSION);
}
