use chrono::NaiveDate;
use std::sync::{Arc, Mutex};
use std::thread;

use tempo_sync::check::{all_ok, check_connectivity, CheckStatus};
use tempo_sync::clients::{
    ApiError, IssueLookup, JiraClient, Service, TempoClient, WorklogSource,
};
use tempo_sync::config::{AppConfig, JiraConfig, TempoConfig};

type Handler = dyn Fn(&str, &str) -> (u16, String) + Send + Sync;

struct StubServer {
    base: String,
    auth_headers: Arc<Mutex<Vec<String>>>,
    _server: Arc<tiny_http::Server>,
}

/// Serve `handler(base_url, request_url)` on a random local port.
fn start_stub(handler: Box<Handler>) -> StubServer {
    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    let base = format!("http://127.0.0.1:{port}");
    let server = Arc::new(server);
    let auth_headers = Arc::new(Mutex::new(Vec::new()));

    let server_clone = server.clone();
    let headers_clone = auth_headers.clone();
    let base_clone = base.clone();
    thread::spawn(move || {
        for request in server_clone.incoming_requests() {
            if let Some(h) = request
                .headers()
                .iter()
                .find(|h| h.field.equiv("Authorization"))
            {
                headers_clone.lock().unwrap().push(h.value.as_str().to_string());
            }
            let (status, body) = handler(&base_clone, request.url());
            let header: tiny_http::Header = "Content-Type: application/json".parse().unwrap();
            let response = tiny_http::Response::from_string(body)
                .with_status_code(status)
                .with_header(header);
            let _ = request.respond(response);
        }
    });

    StubServer {
        base,
        auth_headers,
        _server: server,
    }
}

fn jira_config(base: &str) -> JiraConfig {
    JiraConfig {
        base_url: base.to_string(),
        user_email: "someone@example.com".to_string(),
        api_token: "jira-token".to_string(),
        account_field: "customfield_10048".to_string(),
    }
}

fn tempo_config(base: &str) -> TempoConfig {
    TempoConfig {
        api_token: "tempo-token".to_string(),
        base_url: base.to_string(),
    }
}

fn jira_and_tempo_routes(base: &str, url: &str) -> (u16, String) {
    if url.starts_with("/rest/api/3/myself") {
        return (200, r#"{"accountId": "5f1234567890abcdef"}"#.to_string());
    }
    if url.starts_with("/rest/api/3/issue/10001") {
        return (
            200,
            r#"{
                "id": "10001",
                "key": "ABC-1",
                "fields": {
                    "summary": "Fix login",
                    "customfield_10048": {"id": 7, "value": "Platform"}
                }
            }"#
            .to_string(),
        );
    }
    if url.starts_with("/rest/api/3/issue/10002") {
        return (
            200,
            r#"{"key": "ABC-2", "fields": {"summary": "No account", "customfield_10048": null}}"#
                .to_string(),
        );
    }
    if url.starts_with("/worklogs/user/5f1234567890abcdef") {
        if url.contains("page=2") {
            return (
                200,
                r#"{"results": [
                    {"tempoWorklogId": 3, "issue": {"id": 10001}, "startDate": "2026-01-28",
                     "timeSpentSeconds": 1800}
                ], "metadata": {"count": 1}}"#
                    .to_string(),
            );
        }
        return (
            200,
            format!(
                r#"{{"results": [
                    {{"tempoWorklogId": 1, "issue": {{"id": 10001}}, "startDate": "2026-01-26",
                     "timeSpentSeconds": 3600, "description": "Review"}},
                    {{"tempoWorklogId": 2, "issue": {{"id": 10002}}, "startDate": "2026-01-27",
                     "timeSpentSeconds": 5400}}
                ], "metadata": {{"count": 2, "next": "{base}/worklogs/user/5f1234567890abcdef?page=2"}}}}"#
            ),
        );
    }
    if url.starts_with("/unit4") {
        return (200, String::new());
    }
    (404, r#"{"errorMessages": ["not found"]}"#.to_string())
}

fn unauthorized(_base: &str, _url: &str) -> (u16, String) {
    (401, r#"{"message": "nope"}"#.to_string())
}

fn unavailable(_base: &str, _url: &str) -> (u16, String) {
    (503, String::new())
}

#[tokio::test]
async fn test_jira_account_and_issue_details() {
    let stub = start_stub(Box::new(jira_and_tempo_routes));
    let jira = JiraClient::new(&jira_config(&stub.base)).unwrap();

    assert_eq!(jira.my_account_id().await.unwrap(), "5f1234567890abcdef");

    let issue = jira.issue_details(10001).await.unwrap().unwrap();
    assert_eq!(issue.key, "ABC-1");
    assert_eq!(issue.summary, "Fix login");
    let account = issue.account.unwrap();
    assert_eq!(account.key, "7");
    assert_eq!(account.name, "Platform");

    let no_account = jira.issue_details(10002).await.unwrap().unwrap();
    assert!(no_account.account.is_none());

    assert!(jira.issue_details(424242).await.unwrap().is_none());

    let headers = stub.auth_headers.lock().unwrap();
    assert!(headers.iter().all(|h| h.starts_with("Basic ")));
}

#[tokio::test]
async fn test_tempo_follows_pagination() {
    let stub = start_stub(Box::new(jira_and_tempo_routes));
    let jira = JiraClient::new(&jira_config(&stub.base)).unwrap();
    let tempo = TempoClient::new(&tempo_config(&stub.base), jira).unwrap();

    let account = tempo.current_user_account_id().await.unwrap();
    let from = NaiveDate::from_ymd_opt(2026, 1, 26).unwrap();
    let to = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
    let worklogs = tempo.fetch_worklogs_for_user(&account, from, to).await.unwrap();

    let ids: Vec<u64> = worklogs.iter().map(|w| w.tempo_worklog_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(worklogs[0].description.as_deref(), Some("Review"));
    assert_eq!(worklogs[1].time_spent_seconds, 5400);

    let headers = stub.auth_headers.lock().unwrap();
    assert!(headers.iter().any(|h| h == "Bearer tempo-token"));
}

#[tokio::test]
async fn test_auth_failure_is_classified() {
    let stub = start_stub(Box::new(unauthorized));
    let jira = JiraClient::new(&jira_config(&stub.base)).unwrap();

    let err = jira.my_account_id().await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(Service::Jira)));
    assert_eq!(err.status_code(), Some(401));

    let tempo = TempoClient::new(&tempo_config(&stub.base), jira).unwrap();
    let day = NaiveDate::from_ymd_opt(2026, 1, 26).unwrap();
    let err = tempo.fetch_worklogs_for_user("x", day, day).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(Service::Tempo)));
}

#[tokio::test]
async fn test_server_error_and_unreachable_host() {
    let stub = start_stub(Box::new(unavailable));
    let jira = JiraClient::new(&jira_config(&stub.base)).unwrap();
    let err = jira.my_account_id().await.unwrap_err();
    assert!(matches!(err, ApiError::Server { status: 503, .. }));

    // Nothing listens on port 9 of localhost
    let jira = JiraClient::new(&jira_config("http://127.0.0.1:9")).unwrap();
    let err = jira.my_account_id().await.unwrap_err();
    assert!(matches!(err, ApiError::Connect { service: Service::Jira, .. }));
    assert!(err.to_string().starts_with("Jira: Cannot connect to"));
}

#[tokio::test]
async fn test_connectivity_check_against_stubs() {
    let stub = start_stub(Box::new(jira_and_tempo_routes));
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig {
        jira: jira_config(&stub.base),
        tempo: tempo_config(&stub.base),
        mapping_file: dir.path().join("mapping.json"),
        ..AppConfig::default()
    };
    config.unit4.url = format!("{}/unit4", stub.base);

    let items = check_connectivity(&config).await;

    assert_eq!(items.len(), 4);
    assert_eq!(items[0].status, CheckStatus::Ok("(account: 5f123456...)".to_string()));
    assert!(matches!(items[1].status, CheckStatus::Ok(_)));
    assert!(matches!(items[2].status, CheckStatus::Ok(_)));
    assert!(matches!(items[3].status, CheckStatus::Warning(_)));
    assert!(all_ok(&items));
}

#[tokio::test]
async fn test_connectivity_check_reports_failures() {
    let stub = start_stub(Box::new(unauthorized));
    let config = AppConfig {
        jira: jira_config(&stub.base),
        tempo: tempo_config(&stub.base),
        ..AppConfig::default()
    };

    let items = check_connectivity(&config).await;

    assert!(items[0].is_failed());
    assert!(items[1].is_failed());
    // unit4.url missing
    assert!(items[2].is_failed());
    assert!(!all_ok(&items));
}
