//! End-to-end run tests against a mocked GitHub API.
//!
//! Every remote call goes to a single wiremock server; GraphQL requests
//! are told apart by the operation name in the request body. The clock
//! is pinned to Wednesday 2024-03-06 so milestone and effort decisions
//! are deterministic.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use board::config::{EffortBuckets, SyncConfig};
use board::event::{IssueEvent, PullRequestEvent, TriggerEvent};
use board::run::{run, RunOutcome, SyncError};
use github::GithubClient;

fn now() -> DateTime<Utc> {
    // Wednesday.
    Utc.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap()
}

fn test_config(include_effort: bool) -> SyncConfig {
    SyncConfig {
        owner: "acme".to_string(),
        repo_owner: "acme".to_string(),
        repo: "widgets".to_string(),
        project_number: 5,
        status_field: "status".to_string(),
        pr_status_value: "in progress".to_string(),
        issue_status_value: "todo".to_string(),
        include_effort,
        effort_field: "effort".to_string(),
        effort_buckets: EffortBuckets::from_json(r#"{"two days": 2, "workweek": 5}"#).unwrap(),
        monthly_milestone_field: "monthly milestone".to_string(),
        quarterly_milestone_field: "quarterly milestone".to_string(),
    }
}

fn client_for(server: &MockServer) -> GithubClient {
    GithubClient::with_endpoints(
        "test-token",
        &server.uri(),
        &format!("{}/graphql", server.uri()),
    )
    .unwrap()
}

/// Board schema with both milestones covering 2024-03-06.
fn schema_fields() -> Value {
    json!([
        {
            "id": "F_status",
            "name": "status",
            "options": [
                { "id": "SO_todo", "name": "Todo 📋" },
                { "id": "SO_wip", "name": "In Progress 🛠" }
            ]
        },
        {
            "id": "F_effort",
            "name": "effort",
            "options": [
                { "id": "EO_two", "name": "Two Days ⏱" },
                { "id": "EO_week", "name": "Workweek 📅" }
            ]
        },
        {
            "id": "F_monthly",
            "name": "monthly milestone",
            "configuration": {
                "iterations": [
                    { "id": "IT_mar", "startDate": "2024-03-01", "duration": 31 }
                ]
            }
        },
        {
            "id": "F_quarterly",
            "name": "quarterly milestone",
            "configuration": {
                "iterations": [
                    { "id": "IT_q1", "startDate": "2024-01-01", "duration": 91 }
                ]
            }
        },
        {}
    ])
}

fn schema_response(fields: Value) -> Value {
    json!({
        "data": {
            "organization": {
                "projectV2": {
                    "id": "PVT_1",
                    "fields": { "nodes": fields }
                }
            }
        }
    })
}

async fn mount_graphql(server: &MockServer, operation: &str, response: Value, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains(operation))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_schema(server: &MockServer, fields: Value) {
    mount_graphql(server, "ProjectSchema", schema_response(fields), 1).await;
}

async fn mount_add_item(server: &MockServer) {
    mount_graphql(
        server,
        "AddItemToProject",
        json!({ "data": { "addProjectV2ItemById": { "item": { "id": "PVTI_1" } } } }),
        1,
    )
    .await;
}

/// Find the first recorded request whose body contains `operation` and
/// return its parsed JSON body.
async fn graphql_request_body(server: &MockServer, operation: &str) -> Value {
    let requests = server.received_requests().await.unwrap();
    let request = requests
        .iter()
        .find(|r| String::from_utf8_lossy(&r.body).contains(operation))
        .unwrap_or_else(|| panic!("no request for operation {operation}"));
    serde_json::from_slice(&request.body).unwrap()
}

fn pr_event(number: u64, draft: bool) -> TriggerEvent {
    TriggerEvent::PullRequest(PullRequestEvent {
        number,
        author: "octocat".to_string(),
        draft,
    })
}

#[tokio::test]
async fn issue_run_uses_the_issue_mutation_shape() {
    let server = MockServer::start().await;
    mount_schema(&server, schema_fields()).await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/issues/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "node_id": "I_7" })))
        .expect(1)
        .mount(&server)
        .await;
    mount_add_item(&server).await;
    mount_graphql(
        &server,
        "UpdateIssueStatus",
        json!({ "data": { "status": { "projectV2Item": { "id": "PVTI_1" } } } }),
        1,
    )
    .await;

    // The PR-shaped mutation and all effort machinery must stay untouched.
    mount_graphql(&server, "UpdatePullRequestFields", json!({ "data": {} }), 0).await;
    mount_graphql(&server, "PullRequestCommits", json!({ "data": {} }), 0).await;
    mount_graphql(&server, "AssignUser", json!({ "data": {} }), 0).await;

    let config = test_config(true);
    let client = client_for(&server);
    let event = TriggerEvent::Issue(IssueEvent { number: 7 });

    let outcome = run(&config, &event, &client, now()).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Completed { item_id } if item_id == "PVTI_1"));

    let body = graphql_request_body(&server, "UpdateIssueStatus").await;
    assert_eq!(body["variables"]["statusValue"], "SO_todo");
}

#[tokio::test]
async fn draft_pr_stops_after_the_schema_read() {
    let server = MockServer::start().await;
    mount_schema(&server, schema_fields()).await;

    let config = test_config(true);
    let client = client_for(&server);

    let outcome = run(&config, &pr_event(42, true), &client, now())
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::SkippedDraft));

    // The schema query is the only request the run is allowed to make.
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn pr_run_with_effort_writes_all_fields_and_comments() {
    let server = MockServer::start().await;
    mount_schema(&server, schema_fields()).await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/pulls/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "node_id": "PR_42" })))
        .expect(1)
        .mount(&server)
        .await;
    mount_add_item(&server).await;
    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "node_id": "U_1" })))
        .expect(1)
        .mount(&server)
        .await;
    mount_graphql(
        &server,
        "AssignUser",
        json!({ "data": { "addAssigneesToAssignable": { "clientMutationId": null } } }),
        1,
    )
    .await;
    // Commits listed out of order; the earliest (Tue 2024-03-05) wins,
    // giving 1 elapsed working day on Wednesday -> "two days".
    mount_graphql(
        &server,
        "PullRequestCommits",
        json!({
            "data": {
                "repository": {
                    "pullRequest": {
                        "commits": {
                            "nodes": [
                                { "commit": { "authoredDate": "2024-03-06T08:00:00Z" } },
                                { "commit": { "authoredDate": "2024-03-05T09:00:00Z" } }
                            ]
                        }
                    }
                }
            }
        }),
        1,
    )
    .await;
    mount_graphql(
        &server,
        "UpdatePullRequestFields",
        json!({ "data": { "status": { "projectV2Item": { "id": "PVTI_1" } } } }),
        1,
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/issues/42/comments"))
        .and(body_string_contains("Two Days"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(true);
    let client = client_for(&server);

    let outcome = run(&config, &pr_event(42, false), &client, now())
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Completed { .. }));

    let body = graphql_request_body(&server, "UpdatePullRequestFields").await;

    // The conditional field-id variables feed a non-null `fieldId:`
    // position; static validation only allows a nullable variable there
    // when its declaration carries a default.
    let query = body["query"].as_str().unwrap();
    for declaration in [
        r#"$monthlyField: ID = "0""#,
        r#"$quarterlyField: ID = "0""#,
        r#"$effortField: ID = "0""#,
    ] {
        assert!(
            query.contains(declaration),
            "mutation document must declare a default for the conditional field id: {declaration}"
        );
    }

    let variables = &body["variables"];
    assert_eq!(variables["statusValue"], "SO_wip");
    assert_eq!(variables["effortIncluded"], true);
    assert_eq!(variables["effortValue"], "EO_two");
    assert_eq!(variables["monthlyIncluded"], true);
    assert_eq!(variables["monthlyValue"], "IT_mar");
    assert_eq!(variables["quarterlyIncluded"], true);
    assert_eq!(variables["quarterlyValue"], "IT_q1");
}

#[tokio::test]
async fn milestone_gaps_are_passed_as_unset() {
    let server = MockServer::start().await;
    // Monthly iterations all lapsed; quarterly field missing entirely.
    let fields = json!([
        {
            "id": "F_status",
            "name": "status",
            "options": [
                { "id": "SO_todo", "name": "Todo 📋" },
                { "id": "SO_wip", "name": "In Progress 🛠" }
            ]
        },
        {
            "id": "F_monthly",
            "name": "monthly milestone",
            "configuration": {
                "iterations": [
                    { "id": "IT_jan", "startDate": "2024-01-01", "duration": 31 }
                ]
            }
        }
    ]);
    mount_schema(&server, fields).await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/pulls/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "node_id": "PR_42" })))
        .expect(1)
        .mount(&server)
        .await;
    mount_add_item(&server).await;
    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "node_id": "U_1" })))
        .expect(1)
        .mount(&server)
        .await;
    mount_graphql(
        &server,
        "AssignUser",
        json!({ "data": { "addAssigneesToAssignable": { "clientMutationId": null } } }),
        1,
    )
    .await;
    mount_graphql(
        &server,
        "UpdatePullRequestFields",
        json!({ "data": { "status": { "projectV2Item": { "id": "PVTI_1" } } } }),
        1,
    )
    .await;

    // Effort disabled: commits are never fetched.
    mount_graphql(&server, "PullRequestCommits", json!({ "data": {} }), 0).await;

    let config = test_config(false);
    let client = client_for(&server);

    let outcome = run(&config, &pr_event(42, false), &client, now())
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Completed { .. }));

    let body = graphql_request_body(&server, "UpdatePullRequestFields").await;
    let variables = &body["variables"];
    assert_eq!(variables["monthlyIncluded"], false);
    assert_eq!(variables["monthlyValue"], Value::Null);
    assert_eq!(variables["quarterlyIncluded"], false);
    assert_eq!(variables["effortIncluded"], false);
}

#[tokio::test]
async fn stale_pr_beyond_every_bucket_fails_the_run() {
    let server = MockServer::start().await;
    mount_schema(&server, schema_fields()).await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/pulls/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "node_id": "PR_42" })))
        .expect(1)
        .mount(&server)
        .await;
    mount_add_item(&server).await;
    Mock::given(method("GET"))
        .and(path("/users/octocat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "node_id": "U_1" })))
        .expect(1)
        .mount(&server)
        .await;
    mount_graphql(
        &server,
        "AssignUser",
        json!({ "data": { "addAssigneesToAssignable": { "clientMutationId": null } } }),
        1,
    )
    .await;
    // First commit in mid-January: far beyond the 5-day workweek bucket.
    mount_graphql(
        &server,
        "PullRequestCommits",
        json!({
            "data": {
                "repository": {
                    "pullRequest": {
                        "commits": {
                            "nodes": [
                                { "commit": { "authoredDate": "2024-01-15T09:00:00Z" } }
                            ]
                        }
                    }
                }
            }
        }),
        1,
    )
    .await;

    // No field write and no comment once estimation fails.
    mount_graphql(&server, "UpdatePullRequestFields", json!({ "data": {} }), 0).await;

    let config = test_config(true);
    let client = client_for(&server);

    let error = run(&config, &pr_event(42, false), &client, now())
        .await
        .unwrap_err();
    assert!(matches!(error, SyncError::EffortOutOfRange { days } if days >= 5));
}

#[tokio::test]
async fn unmatched_status_target_fails_even_when_unused() {
    let server = MockServer::start().await;
    // Only a Todo option: the PR target "in progress" cannot resolve,
    // which fails the run even though the trigger is an issue.
    let fields = json!([
        {
            "id": "F_status",
            "name": "status",
            "options": [ { "id": "SO_todo", "name": "Todo 📋" } ]
        }
    ]);
    mount_schema(&server, fields).await;

    let config = test_config(true);
    let client = client_for(&server);
    let event = TriggerEvent::Issue(IssueEvent { number: 7 });

    let error = run(&config, &event, &client, now()).await.unwrap_err();
    assert!(matches!(
        error,
        SyncError::StatusTargetUnmatched { target, .. } if target == "in progress"
    ));
}

#[tokio::test]
async fn graphql_errors_surface_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [ { "message": "Resource not accessible by integration" } ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(true);
    let client = client_for(&server);
    let event = TriggerEvent::Issue(IssueEvent { number: 7 });

    let error = run(&config, &event, &client, now()).await.unwrap_err();
    assert!(error
        .to_string()
        .contains("Resource not accessible by integration"));
}
