use super::common;

#[tokio::test]
async fn health_check_and_empty_registry() {
    let _guard = common::ENV_LOCK.lock().unwrap();

    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("RUNTIME_AGENTS_STORAGE_PATH", dir.path());

    let (base_url, handle) = common::spawn_server().await;
    let client = reqwest::Client::new();

    let health: serde_json::Value = client
        .get(format!("{base_url}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let agents: Vec<serde_json::Value> = client
        .get(format!("{base_url}/agents"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(agents.is_empty());

    let stats: serde_json::Value = client
        .get(format!("{base_url}/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["agent_count"], 0);
    assert_eq!(stats["session_count"], 0);

    handle.abort();
}

#[tokio::test]
async fn unknown_agent_returns_404() {
    let _guard = common::ENV_LOCK.lock().unwrap();

    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("RUNTIME_AGENTS_STORAGE_PATH", dir.path());

    let (base_url, handle) = common::spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base_url}/agents/nonexistent")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    let resp = client.get(format!("{base_url}/sessions/nonexistent")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    handle.abort();
}
