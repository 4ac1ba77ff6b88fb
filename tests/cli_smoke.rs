use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record(id: i64, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "applicant_name": name,
        "income": 1200000.0,
        "credit_score": 780,
        "loan_amount": 3000000.0,
        "property_value": 5000000.0,
        "debt_amount": 50000.0,
        "loan_type": "fixed",
        "property_type": "single_family",
        "credit_rating": null
    })
}

fn client(server: &MockServer) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mortgage-client");
    cmd.env_remove("MORTGAGE_NOTIFICATION_TIMEOUT_MS");
    cmd.env_remove("MORTGAGE_DISCARD_STALE_RESPONSES");
    cmd.env("MORTGAGE_API_BASE_URL", server.uri());
    cmd
}

#[tokio::test]
async fn list_json_prints_backend_records_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mortgages"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([record(2, "B"), record(1, "A")])),
        )
        .mount(&server)
        .await;

    let assert = client(&server).args(["list", "--json"]).assert().success();
    let out: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    let ids: Vec<&str> = out
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["2", "1"]);
}

#[tokio::test]
async fn list_table_shows_labels() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mortgages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([record(1, "A. Singh")])))
        .mount(&server)
        .await;

    client(&server)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("APPLICANT"))
        .stdout(predicate::str::contains("A. Singh"))
        .stdout(predicate::str::contains("Fixed Rate"));
}

#[tokio::test]
async fn create_posts_body_and_reports_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mortgages"))
        .and(body_json(json!({
            "applicant_name": "A. Singh",
            "income": 1200000.0,
            "credit_score": 780,
            "loan_amount": 3000000.0,
            "property_value": 5000000.0,
            "debt_amount": 50000.0,
            "loan_type": "fixed",
            "property_type": "single_family"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(record(9, "A. Singh")))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .args([
            "create",
            "--applicant-name",
            "A. Singh",
            "--income",
            "1,200,000",
            "--debt-amount",
            "50000",
            "--credit-score",
            "780",
            "--loan-amount",
            "3000000",
            "--property-value",
            "5000000",
            "--loan-type",
            "fixed",
            "--property-type",
            "single_family",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("id: 9"))
        .stderr(predicate::str::contains(
            "Mortgage application created successfully",
        ));
}

#[tokio::test]
async fn create_with_missing_field_exits_2_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    client(&server)
        .args(["create", "--applicant-name", "A. Singh"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("income is required"));
}

#[tokio::test]
async fn delete_missing_record_exits_4_with_detail() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/mortgages/42"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"detail": "Mortgage not found"})),
        )
        .mount(&server)
        .await;

    client(&server)
        .args(["delete", "42"])
        .assert()
        .failure()
        .code(4)
        .stderr(predicate::str::contains("Mortgage not found"));
}

#[tokio::test]
async fn delete_reports_success_notification() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/mortgages/7"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"message": "Mortgage deleted successfully"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .args(["delete", "7"])
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "Mortgage application deleted successfully",
        ));
}

#[tokio::test]
async fn partial_update_keeps_unchanged_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mortgages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([record(3, "A. Singh")])))
        .mount(&server)
        .await;

    let mut expected = record(3, "A. Singh");
    let obj = expected.as_object_mut().unwrap();
    obj.remove("id");
    obj.remove("credit_rating");
    obj.insert("income".to_string(), json!(900000.0));
    Mock::given(method("PUT"))
        .and(path("/mortgages/3"))
        .and(body_json(expected))
        .respond_with(ResponseTemplate::new(200).set_body_json(record(3, "A. Singh")))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .args(["update", "3", "--income", "900000"])
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "Mortgage application updated successfully",
        ));
}

#[tokio::test]
async fn rate_prints_rating() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mortgages/5/calculate-rating"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"mortgage_id": 5, "rating": "AAA"})),
        )
        .mount(&server)
        .await;

    client(&server)
        .args(["rate", "5"])
        .assert()
        .success()
        .stdout(predicate::str::diff("5: AAA\n"));
}

#[test]
fn unreachable_backend_exits_3() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mortgage-client");
    cmd.args(["--api-base-url", "http://127.0.0.1:9", "list"]);
    cmd.assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("network_error"));
}

#[test]
fn out_of_range_notification_timeout_is_rejected() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mortgage-client");
    cmd.args(["--notification-timeout-ms", "70000", "list"]);
    cmd.assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("--notification-timeout-ms"));
}

#[tokio::test]
async fn create_with_out_of_range_score_exits_2_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    client(&server)
        .args([
            "create",
            "--applicant-name",
            "A. Singh",
            "--income",
            "1200000",
            "--debt-amount",
            "50000",
            "--credit-score",
            "900",
            "--loan-amount",
            "3000000",
            "--property-value",
            "5000000",
            "--loan-type",
            "fixed",
            "--property-type",
            "condo",
        ])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains(
            "credit_score must be between 300 and 850",
        ));
}
