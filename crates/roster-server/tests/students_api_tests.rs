//! Integration tests for students API endpoints

use axum::http::StatusCode;
use roster_common::types::Student;
use roster_server::store::{MemoryStore, RecordStore};
use serde_json::json;
use tower::ServiceExt;

mod helpers;
use helpers::{body_json, get_request, json_request, setup_test_app, setup_test_app_with};

async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .insert_batch(&[
            Student::new("Ada Lovelace", "Mathematics", 99),
            Student::new("Alan Turing", "Mathematics", 88),
            Student::new("Grace Hopper", "Computer Science", 95),
            Student::new("Marie Curie", "Chemistry", 97),
        ])
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn test_create_student() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/students",
            json!({ "name": "Ada Lovelace", "subject": "Mathematics", "grade": 99 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    let id = json["data"]["id"].as_str().unwrap();
    assert_eq!(app.store.rows().await[0].id.to_string(), id);
}

#[tokio::test]
async fn test_create_student_missing_fields() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/students",
            json!({ "name": "Ada Lovelace" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "MISSING_DATA");
    assert_eq!(
        json["error"]["message"],
        "student data are missing, required name, subject and grade"
    );
    assert!(app.store.is_empty().await);
}

#[tokio::test]
async fn test_create_student_malformed_body() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/students",
            json!({ "name": "Ada", "subject": "Art", "grade": "high" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_list_students_with_filters() {
    let app = setup_test_app_with(seeded_store().await);

    let response = app
        .router
        .clone()
        .oneshot(get_request(
            "/api/v1/students?subject=mathematics&sort_by=grade&sort_order=asc",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["count"], 2);
    assert_eq!(json["data"]["records"][0]["name"], "Alan Turing");
    assert_eq!(json["data"]["records"][1]["name"], "Ada Lovelace");
    assert_eq!(json["meta"]["page"], 1);
    assert_eq!(json["meta"]["size"], 100);
}

#[tokio::test]
async fn test_list_students_name_substring_and_paging() {
    let app = setup_test_app_with(seeded_store().await);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/students?name=a&sort_by=name&page=2&size=2"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    // every seeded name contains an "a"
    assert_eq!(json["data"]["count"], 4);
    assert_eq!(json["data"]["records"].as_array().unwrap().len(), 2);
    assert_eq!(json["data"]["records"][0]["name"], "Grace Hopper");
    assert_eq!(json["meta"]["pages"], 2);
}

#[tokio::test]
async fn test_list_students_rejects_sort_by_id() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/students?sort_by=id"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_students_rejects_unknown_subject() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/students?subject=Alchemy"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["message"], "Unknown subject: Alchemy");
}

#[tokio::test]
async fn test_list_students_rejects_bad_page() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/students?page=first"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_find_by_name() {
    let app = setup_test_app_with(seeded_store().await);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/students/by-name/Grace%20Hopper"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"][0]["subject"], "Computer Science");
}

#[tokio::test]
async fn test_find_by_name_not_found() {
    let app = setup_test_app_with(seeded_store().await);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/students/by-name/Grace"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_by_subject() {
    let app = setup_test_app_with(seeded_store().await);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/students/by-subject/computer%20science?size=10"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["count"], 1);
    assert_eq!(json["meta"]["size"], 10);
}

#[tokio::test]
async fn test_by_subject_unknown() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/students/by-subject/Alchemy"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_reports_memory_store() {
    let app = setup_test_app();

    let response = app.router.clone().oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["store"], "memory");
}
