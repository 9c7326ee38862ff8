//! Full-crate exercises of the literal end-to-end scenarios (spec §8),
//! wired against wiremock peers rather than the in-process unit doubles
//! used by the per-module `#[cfg(test)]` suites. Scenarios 1 and 5 (simple
//! chat, moderation block) are covered at the HTTP-surface level by
//! `skein-serve`'s `tests/e2e`; this file covers the remaining scenarios
//! that only need the `skein` crate's own public API.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skein::adl::Agent;
use skein::executor::{ExecutionStatus, WorkflowExecutor};
use skein::llm_manager::LlmManager;
use skein::tool_manager::{ToolManager, ToolRegistry, ToolRegistryEntry};

fn agent_from_json(value: Value) -> Agent {
    serde_json::from_value(value).expect("agent parses")
}

/// Scenario 2: document analysis. A `document-extractor` tool call feeds an
/// `Analyse` `llm_call` whose rendered prompt contains the extracted body.
#[tokio::test]
async fn document_analysis_extract_then_analyse() {
    let tool_mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/extract"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "text": "quarterly revenue rose 12%"
        })))
        .mount(&tool_mock)
        .await;

    let llm_mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat"))
        .and(wiremock::matchers::body_string_contains("quarterly revenue rose 12%"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": "Revenue is trending up.",
            "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14}
        })))
        .mount(&llm_mock)
        .await;

    let agent = agent_from_json(json!({
        "metadata": {},
        "identity": {"id": "doc-agent", "name": "Doc Agent", "status": "active"},
        "business_logic": {
            "system_prompt": "You analyse documents.",
            "llm_provider": "mistral"
        },
        "tools": {
            "tools": [{
                "id": "extract-1",
                "tool_id": "document-extractor",
                "parameters": [
                    {"name": "file", "source": "input", "input_component": "document_input"}
                ],
                "output_variable": "extracted_text"
            }]
        },
        "workflows": {
            "workflows": [{
                "id": "main",
                "name": "Main",
                "trigger": "button_click",
                "trigger_config": {"button": "analyze_button"},
                "steps": [
                    {
                        "type": "tool_call",
                        "id": "extract",
                        "name": "Extract",
                        "tool_config_id": "extract-1",
                        "output_variable": "extracted_text",
                        "next_step": "analyse"
                    },
                    {
                        "type": "llm_call",
                        "id": "analyse",
                        "name": "Analyse",
                        "prompt_template": "Summarise: {{ extracted_text.text }}",
                        "output_variable": "summary"
                    }
                ]
            }]
        }
    }));

    let mut base_urls = HashMap::new();
    base_urls.insert("mistral".to_string(), llm_mock.uri());
    let llm_manager = LlmManager::new(reqwest::Client::new(), base_urls, Duration::from_secs(5));

    let registry = ToolRegistry::new().with_entry(ToolRegistryEntry {
        tool_id: "document-extractor".to_string(),
        name: "Document Extractor".to_string(),
        description: "extract".to_string(),
        base_url: tool_mock.uri(),
        endpoint_path: "/api/v1/extract".to_string(),
        requires_file_input: false,
        produces_file_output: false,
    });
    let tool_manager = ToolManager::new(reqwest::Client::new(), registry);

    let executor = WorkflowExecutor::new(tool_manager, llm_manager);
    let workflow = &agent.workflows.workflows[0];

    let mut inputs = serde_json::Map::new();
    inputs.insert("document_input".to_string(), Value::from("<file bytes>"));
    let context = executor
        .execute(&agent, workflow, Value::Object(inputs), &vec![], None)
        .await;

    assert_eq!(context.status, ExecutionStatus::Completed);
    assert_eq!(context.step_results.len(), 2);
    assert_eq!(
        context.variable("extracted_text"),
        Some(&json!({"text": "quarterly revenue rose 12%"}))
    );
    assert_eq!(context.step_results.last().unwrap().step_id, "analyse");
    // The LLM mock only matches a request body containing the extracted
    // text, so a completed status already proves the rendered prompt
    // carried it through (spec §8 scenario 2).
    assert_eq!(
        context.step_results.last().unwrap().output,
        Some(Value::from("Revenue is trending up."))
    );
}

/// Scenario 4: `parallel` with `wait_for_all = true` collects every
/// branch's output keyed by step id, and the cumulative usage is the
/// elementwise sum across both `llm_call` children.
#[tokio::test]
async fn parallel_wait_for_all_sums_usage_across_branches() {
    let llm_mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": "branch done",
            "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
        })))
        .mount(&llm_mock)
        .await;

    let agent = agent_from_json(json!({
        "metadata": {},
        "identity": {"id": "fanout-agent", "name": "Fanout", "status": "active"},
        "business_logic": {
            "system_prompt": "You fan out.",
            "llm_provider": "mistral"
        },
        "workflows": {
            "workflows": [{
                "id": "main",
                "name": "Main",
                "trigger": "user_message",
                "steps": [{
                    "type": "parallel",
                    "id": "fanout",
                    "name": "Fanout",
                    "wait_for_all": true,
                    "parallel_steps": [
                        {
                            "type": "llm_call",
                            "id": "p1",
                            "name": "P1",
                            "prompt_template": "branch one"
                        },
                        {
                            "type": "llm_call",
                            "id": "p2",
                            "name": "P2",
                            "prompt_template": "branch two"
                        }
                    ]
                }]
            }]
        }
    }));

    let mut base_urls = HashMap::new();
    base_urls.insert("mistral".to_string(), llm_mock.uri());
    let llm_manager = LlmManager::new(reqwest::Client::new(), base_urls, Duration::from_secs(5));
    let tool_manager = ToolManager::new(reqwest::Client::new(), ToolRegistry::new());
    let executor = WorkflowExecutor::new(tool_manager, llm_manager);
    let workflow = &agent.workflows.workflows[0];

    let context = executor
        .execute(&agent, workflow, Value::Object(Default::default()), &vec![], None)
        .await;

    assert_eq!(context.status, ExecutionStatus::Completed);
    let parallel_result = &context.step_results[0];
    let output = parallel_result.output.as_ref().unwrap();
    assert_eq!(output.get("p1").and_then(Value::as_str), Some("branch done"));
    assert_eq!(output.get("p2").and_then(Value::as_str), Some("branch done"));

    assert_eq!(context.usage.prompt_tokens, Some(2));
    assert_eq!(context.usage.completion_tokens, Some(2));
    assert_eq!(context.usage.total_tokens, Some(4));
}

/// Scenario 6: a workflow step whose `next_step` does not resolve to any
/// step id in the same workflow makes the whole file `ReferenceInvalid`;
/// the agent never appears in the registry, and `list_all`/`get` both miss
/// it — the same "absent from `GET /agents`" behaviour spec.md describes.
#[test]
fn loader_rejects_file_with_dangling_next_step_reference() {
    let dir = tempfile::tempdir().unwrap();
    let bad_agent = json!({
        "metadata": {},
        "identity": {"id": "broken", "name": "Broken", "status": "active"},
        "business_logic": {
            "system_prompt": "hi",
            "llm_provider": "openai"
        },
        "workflows": {
            "workflows": [{
                "id": "main",
                "name": "Main",
                "trigger": "user_message",
                "steps": [{
                    "type": "set_variable",
                    "id": "s1",
                    "name": "S1",
                    "variable_name": "x",
                    "variable_value": 1,
                    "next_step": "Z"
                }]
            }]
        }
    });
    std::fs::write(
        dir.path().join("broken.json"),
        serde_json::to_string(&bad_agent).unwrap(),
    )
    .unwrap();

    let (registry, _warnings) = skein::loader::AgentRegistry::load_dir(dir.path()).unwrap();

    assert!(registry.get("broken").is_none());
    assert!(registry.get_by_slug("broken").is_none());
    assert_eq!(registry.count(), 0);
    assert!(registry.list_all().is_empty());
}
