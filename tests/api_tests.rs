//! API integration tests
//!
//! These run against a live server seeded with an administrator
//! account (admin@biblioteca.local / admin123).

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

/// Helper to get an authenticated admin token
async fn get_auth_token(client: &Client) -> String {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "email": "admin@biblioteca.local",
            "password": "admin123"
        }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

/// Helper to register a book and return its ID
async fn create_book(client: &Client, token: &str, title: &str, copies: i32) -> i64 {
    let response = client
        .post(format!("{}/books", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({
            "title": title,
            "total_copies": copies
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    body["id"].as_i64().expect("No book ID")
}

/// Helper to lend a book, returning the raw response
async fn lend(
    client: &Client,
    token: &str,
    book_id: i64,
    borrower_id_number: &str,
) -> reqwest::Response {
    client
        .post(format!("{}/loans", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({
            "book_ids": [book_id],
            "borrower_name": "Test Borrower",
            "borrower_id_number": borrower_id_number,
            "due_date": "2030-12-31"
        }))
        .send()
        .await
        .expect("Failed to send request")
}

fn unique_suffix() -> i64 {
    chrono::Utc::now().timestamp_micros()
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
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "email": "admin@biblioteca.local",
            "password": "wrong"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/books", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_get_current_user() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .get(format!("{}/auth/me", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["email"], "admin@biblioteca.local");
}

#[tokio::test]
#[ignore]
async fn test_search_books() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .get(format!("{}/books?q=&page=1&per_page=10", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["items"].is_array());
    assert!(body["total"].is_number());
}

#[tokio::test]
#[ignore]
async fn test_book_validation() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .post(format!("{}/books", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({
            "title": "",
            "total_copies": 0
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["success"], false);
    assert!(body["field_errors"]["title"].is_array());
    assert!(body["field_errors"]["total_copies"].is_array());
}

#[tokio::test]
#[ignore]
async fn test_lend_until_exhausted_then_return_restores() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let suffix = unique_suffix();

    let book_id = create_book(&client, &token, &format!("Exhaustion {}", suffix), 2).await;

    // Two distinct borrowers drain both copies
    let response = lend(&client, &token, book_id, &format!("D1-{}", suffix)).await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    let loan_id = body[0]["id"].as_i64().expect("No loan ID");

    let response = lend(&client, &token, book_id, &format!("D2-{}", suffix)).await;
    assert_eq!(response.status(), 201);

    // Third request must hit the no-copies conflict
    let response = lend(&client, &token, book_id, &format!("D3-{}", suffix)).await;
    assert_eq!(response.status(), 409);

    // Returning one loan restores a copy
    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let response = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["available_copies"], 1);
}

#[tokio::test]
#[ignore]
async fn test_double_return_is_rejected() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let suffix = unique_suffix();

    let book_id = create_book(&client, &token, &format!("Double return {}", suffix), 1).await;

    let response = lend(&client, &token, book_id, &format!("DR-{}", suffix)).await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    let loan_id = body[0]["id"].as_i64().expect("No loan ID");

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"notes": "first return"}))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    // Second return must conflict, not silently succeed
    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    // The rejected return must not free a second copy
    let response = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["available_copies"], 1);
}

#[tokio::test]
#[ignore]
async fn test_delete_book_after_loans_returned() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let suffix = unique_suffix();

    let book_id = create_book(&client, &token, &format!("Retired {}", suffix), 1).await;

    let response = lend(&client, &token, book_id, &format!("RT-{}", suffix)).await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    let loan_id = body[0]["id"].as_i64().expect("No loan ID");

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    // With no active loans left the book can be removed, history or not
    let response = client
        .delete(format!("{}/books/{}", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 204);

    // The closed loan survives the deletion, with its book detached
    let response = client
        .get(format!("{}/loans/{}", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "RETURNED");
    assert!(body["book"].is_null());
}

#[tokio::test]
#[ignore]
async fn test_borrower_loan_cap() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let suffix = unique_suffix();
    let borrower = format!("CAP-{}", suffix);

    for i in 0..3 {
        let book_id =
            create_book(&client, &token, &format!("Cap {} #{}", suffix, i), 1).await;
        let response = lend(&client, &token, book_id, &borrower).await;
        assert_eq!(response.status(), 201);
    }

    let book_id = create_book(&client, &token, &format!("Cap {} #4", suffix), 1).await;
    let response = lend(&client, &token, book_id, &borrower).await;
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore]
async fn test_delete_book_with_active_loan_conflicts() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let suffix = unique_suffix();

    let book_id = create_book(&client, &token, &format!("Undeletable {}", suffix), 1).await;
    let response = lend(&client, &token, book_id, &format!("DEL-{}", suffix)).await;
    assert_eq!(response.status(), 201);

    let response = client
        .delete(format!("{}/books/{}", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore]
async fn test_total_copies_edit_adjusts_availability() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let suffix = unique_suffix();

    let book_id = create_book(&client, &token, &format!("Resize {}", suffix), 3).await;
    let response = lend(&client, &token, book_id, &format!("RS1-{}", suffix)).await;
    assert_eq!(response.status(), 201);
    let response = lend(&client, &token, book_id, &format!("RS2-{}", suffix)).await;
    assert_eq!(response.status(), 201);

    // {total: 3, available: 1} edited to total 5 -> available 3
    let response = client
        .put(format!("{}/books/{}", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({"total_copies": 5}))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total_copies"], 5);
    assert_eq!(body["available_copies"], 3);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_email_conflicts() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let email = format!("dup-{}@example.org", unique_suffix());

    let response = client
        .post(format!("{}/users", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({
            "name": "First User",
            "email": email,
            "password": "secret123",
            "role": "user"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    // Same email with different casing must still conflict
    let response = client
        .post(format!("{}/users", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({
            "name": "Second User",
            "email": email.to_uppercase(),
            "password": "secret123",
            "role": "user"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore]
async fn test_self_deletion_is_forbidden() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .get(format!("{}/auth/me", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.unwrap();
    let my_id = body["id"].as_i64().expect("No user ID");

    let response = client
        .delete(format!("{}/users/{}", BASE_URL, my_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 403);
}

#[tokio::test]
#[ignore]
async fn test_non_admin_cannot_manage_users() {
    let client = Client::new();
    let admin_token = get_auth_token(&client).await;
    let suffix = unique_suffix();
    let email = format!("clerk-{}@example.org", suffix);

    let response = client
        .post(format!("{}/users", BASE_URL))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&json!({
            "name": "Clerk User",
            "email": email,
            "password": "secret123",
            "role": "user"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    // Log in as the non-admin
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({"email": email, "password": "secret123"}))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.unwrap();
    let clerk_token = body["token"].as_str().expect("No token").to_string();

    let response = client
        .post(format!("{}/users", BASE_URL))
        .header("Authorization", format!("Bearer {}", clerk_token))
        .json(&json!({
            "name": "Sneaky User",
            "email": format!("sneaky-{}@example.org", suffix),
            "password": "secret123",
            "role": "admin"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 403);

    let response = client
        .get(format!("{}/audit", BASE_URL))
        .header("Authorization", format!("Bearer {}", clerk_token))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 403);
}

#[tokio::test]
#[ignore]
async fn test_audit_trail_records_returns() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let suffix = unique_suffix();

    let book_id = create_book(&client, &token, &format!("Audited {}", suffix), 1).await;
    let response = lend(&client, &token, book_id, &format!("AU-{}", suffix)).await;
    let body: Value = response.json().await.unwrap();
    let loan_id = body[0]["id"].as_i64().expect("No loan ID");

    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let response = client
        .get(format!("{}/audit?page=1&per_page=20", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body: Value = response.json().await.unwrap();
    let entries = body["items"].as_array().expect("No entries");
    assert!(entries
        .iter()
        .any(|e| e["action"] == "RETURN" && e["entity_id"].as_i64() == Some(loan_id)));
}

#[tokio::test]
#[ignore]
async fn test_get_stats() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .get(format!("{}/stats", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["books"].is_number());
    assert!(body["total_copies"].is_number());
    assert!(body["active_loans"].is_number());
    assert!(body["users"].is_number());
}
