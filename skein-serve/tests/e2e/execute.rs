//! Execute flow: mocks the LLM and moderation peers with `wiremock` so the
//! real HTTP round trip through [`skein::llm_manager`]/[`skein::safety`] is
//! exercised, not just the in-process types (spec §6.3 example flows).

use super::common;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn greeter_agent_json() -> String {
    serde_json::json!({
        "metadata": {},
        "identity": {"id": "greeter", "name": "Greeter", "description": "Greets the user.", "status": "active"},
        "business_logic": {
            "system_prompt": "You are helpful.",
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

#[tokio::test]
async fn simple_chat_completes_and_records_session_messages() {
    let _guard = common::ENV_LOCK.lock().unwrap();

    let llm_mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": "Hello!",
            "model": "mistral-small-latest",
            "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
        })))
        .mount(&llm_mock)
        .await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("greeter.json"), greeter_agent_json()).unwrap();
    std::env::set_var("RUNTIME_AGENTS_STORAGE_PATH", dir.path());
    std::env::set_var("RUNTIME_LLM_MISTRAL_URL", llm_mock.uri());

    let (base_url, handle) = common::spawn_server().await;
    let client = reqwest::Client::new();

    let resp: serde_json::Value = client
        .post(format!("{base_url}/agents/greeter/execute"))
        .json(&serde_json::json!({"message": "Hi"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(resp["success"], true);
    assert_eq!(resp["output"], "Hello!");
    assert_eq!(resp["usage"]["total_tokens"], 7);
    assert_eq!(resp["steps_executed"], 1);
    let session_id = resp["session_id"].as_str().unwrap().to_string();

    let messages: Vec<serde_json::Value> = client
        .get(format!("{base_url}/sessions/{session_id}/messages"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "Hi");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "Hello!");

    handle.abort();
    std::env::remove_var("RUNTIME_LLM_MISTRAL_URL");
}

#[tokio::test]
async fn moderation_peer_blocks_before_any_llm_call() {
    let _guard = common::ENV_LOCK.lock().unwrap();

    let llm_mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"content": "should not be called"})))
        .expect(0)
        .mount(&llm_mock)
        .await;

    let moderation_mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/moderate/check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "approved": false,
            "reason": "blocked content"
        })))
        .mount(&moderation_mock)
        .await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("greeter.json"), greeter_agent_json()).unwrap();
    std::env::set_var("RUNTIME_AGENTS_STORAGE_PATH", dir.path());
    std::env::set_var("RUNTIME_LLM_MISTRAL_URL", llm_mock.uri());
    std::env::set_var("RUNTIME_TOOL_PROMPT_MODERATION", moderation_mock.uri());

    let (base_url, handle) = common::spawn_server().await;
    let client = reqwest::Client::new();

    let resp: serde_json::Value = client
        .post(format!("{base_url}/agents/greeter/execute"))
        .json(&serde_json::json!({"message": "Hi"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(resp["success"], false);
    assert_eq!(resp["status"], "blocked");
    assert_eq!(resp["blocked_reason"], "blocked content");
    assert_eq!(resp["steps_executed"], 0);

    moderation_mock.verify().await;
    llm_mock.verify().await;

    handle.abort();
    std::env::remove_var("RUNTIME_LLM_MISTRAL_URL");
    std::env::remove_var("RUNTIME_TOOL_PROMPT_MODERATION");
}
