//! Session lifecycle routes (spec §6.2): sessions are created implicitly by
//! `execute`/`chat`, so each test drives one execute call first.

use super::common;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn echo_agent_json() -> String {
    serde_json::json!({
        "metadata": {},
        "identity": {"id": "echo", "name": "Echo", "description": "Echoes the user's message back.", "status": "active"},
        "business_logic": {
            "system_prompt": "Echo back.",
            "llm_provider": "mistral"
        },
        "workflows": {
            "workflows": [
                {
                    "id": "main",
                    "name": "Main",
                    "trigger": "user_message",
                    "steps": [
                        {
                            "type": "llm_call",
                            "id": "ask",
                            "name": "Ask",
                            "prompt_template": "{{ message }}",
                            "output_variable": "response"
                        }
                    ]
                }
            ],
            "default_workflow": "main"
        }
    })
    .to_string()
}

async fn create_session(base_url: &str, client: &reqwest::Client) -> String {
    let resp: serde_json::Value = client
        .post(format!("{base_url}/agents/echo/chat"))
        .json(&serde_json::json!({"message": "Hi"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    resp["session_id"].as_str().unwrap().to_string()
}

async fn setup() -> (wiremock::MockServer, tempfile::TempDir) {
    let llm_mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"content": "echoed"})))
        .mount(&llm_mock)
        .await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("echo.json"), echo_agent_json()).unwrap();
    std::env::set_var("RUNTIME_AGENTS_STORAGE_PATH", dir.path());
    std::env::set_var("RUNTIME_LLM_MISTRAL_URL", llm_mock.uri());
    (llm_mock, dir)
}

#[tokio::test]
async fn get_and_delete_session() {
    let _guard = common::ENV_LOCK.lock().unwrap();
    let (_llm_mock, _dir) = setup().await;

    let (base_url, handle) = common::spawn_server().await;
    let client = reqwest::Client::new();
    let session_id = create_session(&base_url, &client).await;

    let session: serde_json::Value = client
        .get(format!("{base_url}/sessions/{session_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["session_id"], session_id);
    assert_eq!(session["agent_id"], "echo");

    let deleted: serde_json::Value = client
        .delete(format!("{base_url}/sessions/{session_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(deleted["deleted"], true);

    let resp = client.get(format!("{base_url}/sessions/{session_id}")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    handle.abort();
    std::env::remove_var("RUNTIME_LLM_MISTRAL_URL");
}

#[tokio::test]
async fn clear_session_empties_messages_but_keeps_session() {
    let _guard = common::ENV_LOCK.lock().unwrap();
    let (_llm_mock, _dir) = setup().await;

    let (base_url, handle) = common::spawn_server().await;
    let client = reqwest::Client::new();
    let session_id = create_session(&base_url, &client).await;

    let messages: Vec<serde_json::Value> = client
        .get(format!("{base_url}/sessions/{session_id}/messages"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);

    let cleared: serde_json::Value = client
        .post(format!("{base_url}/sessions/{session_id}/clear"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleared["cleared"], true);

    let messages: Vec<serde_json::Value> = client
        .get(format!("{base_url}/sessions/{session_id}/messages"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(messages.is_empty());

    let resp = client.get(format!("{base_url}/sessions/{session_id}")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    handle.abort();
    std::env::remove_var("RUNTIME_LLM_MISTRAL_URL");
}

#[tokio::test]
async fn unknown_session_routes_404() {
    let _guard = common::ENV_LOCK.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("RUNTIME_AGENTS_STORAGE_PATH", dir.path());

    let (base_url, handle) = common::spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base_url}/sessions/missing/messages"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    let resp = client
        .post(format!("{base_url}/sessions/missing/clear"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    handle.abort();
}
