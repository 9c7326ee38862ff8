//! Workflow Executor (spec §4.1): walks an agent's workflow graph, building
//! an [`ExecutionContext`] as it dispatches each step to a sub-executor.
//!
//! Grounded end-to-end on `original_source/.../workflow_executor.py`
//! (`WorkflowExecutor.execute`, `_execute_step`, and the per-step-type
//! helpers it dispatches to); `parallel` fan-out is generalized from
//! `asyncio.create_task`/`asyncio.wait(FIRST_COMPLETED)` to
//! `tokio::task::JoinSet`, the teacher's idiom for bounded concurrent
//! fan-out-then-join.

mod condition;
mod context;

pub use context::{ExecutionContext, ExecutionStatus, StepResult};

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::warn;

use crate::adl::{Agent, ConnectorConfig, OnError, Step, Workflow};
use crate::llm_manager::LlmManager;
use crate::message::{Message, Role};
use crate::session::Session;
use crate::template;
use crate::tool_manager::{execute_with_policy, ToolFile, ToolManager};

/// Files attached to the inbound request that triggered this execution
/// (spec §4.1 "files"), looked up by the form field name a `tool_call`'s
/// file-input parameters reference.
pub type InputFiles = Vec<ToolFile>;

/// Per-execution step-visit budget (spec.md §9 open question on circular
/// `next_step` references) — see DESIGN.md "Open Question decisions" item 4.
const MAX_STEPS_PER_EXECUTION: u32 = 10_000;

/// Composes the Tool Manager and LLM Manager into workflow-graph execution
/// (spec §4.1). Stateless beyond its two collaborators, so a single
/// instance is shared across concurrent executions (spec §5).
#[derive(Clone)]
pub struct WorkflowExecutor {
    tool_manager: ToolManager,
    llm_manager: LlmManager,
}

impl WorkflowExecutor {
    pub fn new(tool_manager: ToolManager, llm_manager: LlmManager) -> Self {
        Self {
            tool_manager,
            llm_manager,
        }
    }

    /// Runs `workflow` to completion (or failure/timeout) and returns the
    /// terminal context (spec §4.1, §3 "ExecutionContext").
    pub async fn execute(
        &self,
        agent: &Agent,
        workflow: &Workflow,
        inputs: Value,
        files: &InputFiles,
        session: Option<&Session>,
    ) -> ExecutionContext {
        self.execute_with_sink(agent, workflow, inputs, files, session, None).await
    }

    /// Same as [`Self::execute`], additionally forwarding a clone of every
    /// top-level step's [`StepResult`] to `sink` as it completes — the
    /// hook `skein-serve`'s `execute/stream` route uses to emit `step`/
    /// `tool` SSE events while the workflow is still running. Steps nested
    /// inside a `loop`/`parallel` body are not forwarded individually; only
    /// the graph-level walk in [`Self::run_graph`] reports through the sink.
    pub async fn execute_with_sink(
        &self,
        agent: &Agent,
        workflow: &Workflow,
        inputs: Value,
        files: &InputFiles,
        session: Option<&Session>,
        sink: Option<tokio::sync::mpsc::UnboundedSender<StepResult>>,
    ) -> ExecutionContext {
        let mut context = ExecutionContext::new(workflow.id.clone(), agent.id().to_string());

        if let Value::Object(map) = &mut context.variables {
            for (k, v) in &workflow.initial_variables {
                map.insert(k.clone(), v.clone());
            }
            if let Value::Object(input_map) = inputs {
                map.extend(input_map);
            }
            map.insert("agent_name".to_string(), Value::from(agent.identity.name.clone()));
            map.insert(
                "system_prompt".to_string(),
                Value::from(agent.business_logic.system_prompt.clone()),
            );
            if let Some(session) = session {
                map.insert("session_id".to_string(), Value::from(session.session_id.clone()));
                let limit = agent.business_logic.context_window_messages as usize;
                let history = crate::llm_manager::format_messages_for_context(&session.messages, limit);
                map.insert("conversation_history".to_string(), messages_to_value(&history));
            }
        }

        let run = if let Some(timeout_ms) = workflow.timeout_ms {
            tokio::time::timeout(
                std::time::Duration::from_millis(timeout_ms),
                self.run_graph(agent, workflow, &mut context, files, sink.as_ref()),
            )
            .await
        } else {
            Ok(self.run_graph(agent, workflow, &mut context, files, sink.as_ref()).await)
        };

        if run.is_err() {
            context.finish(
                ExecutionStatus::Failed,
                Some(format!("workflow timed out after {}ms", workflow.timeout_ms.unwrap_or(0))),
            );
            return context;
        }

        if context.status != ExecutionStatus::Failed {
            context.finish(ExecutionStatus::Completed, None);
        } else {
            context.completed_at = Some(Utc::now());
        }
        context
    }

    async fn run_graph(
        &self,
        agent: &Agent,
        workflow: &Workflow,
        context: &mut ExecutionContext,
        files: &InputFiles,
        sink: Option<&tokio::sync::mpsc::UnboundedSender<StepResult>>,
    ) {
        let Some(mut current) = workflow.entry() else {
            return;
        };

        // spec.md §9 notes that circular `next_step` references are not
        // rejected at load time and can loop indefinitely at runtime; this
        // budget turns a cycle into a failed execution instead of a hang.
        let mut steps_visited: u32 = 0;

        loop {
            steps_visited += 1;
            if steps_visited > MAX_STEPS_PER_EXECUTION {
                warn!(
                    workflow_id = %workflow.id,
                    "step visit budget exceeded, aborting workflow (possible next_step cycle)"
                );
                context.finish(
                    ExecutionStatus::Failed,
                    Some(format!(
                        "workflow exceeded the maximum of {MAX_STEPS_PER_EXECUTION} step visits; this usually means a next_step cycle"
                    )),
                );
                return;
            }

            context.current_step_id = Some(current.id().to_string());
            let result = self.execute_step(current, agent, context, files).await;
            let failed = result.status == ExecutionStatus::Failed;
            let on_error = current.common().on_error;
            context.step_results.push(result.clone());
            if let Some(sink) = sink {
                let _ = sink.send(result.clone());
            }

            if failed && on_error == OnError::Stop {
                warn!(step_id = %result.step_id, error = ?result.error, "step failed, stopping workflow");
                context.finish(ExecutionStatus::Failed, result.error.clone());
                return;
            }

            let next_id = next_step_id(current, &result);
            match next_id.and_then(|id| workflow.step_by_id(&id)) {
                Some(next) => current = next,
                None => return,
            }
        }
    }

    async fn execute_step(
        &self,
        step: &Step,
        agent: &Agent,
        context: &mut ExecutionContext,
        files: &InputFiles,
    ) -> StepResult {
        let started_at = Instant::now();
        let started_stamp = Utc::now();
        let common = step.common();

        let outcome: Result<Value, String> = match step {
            Step::LlmCall { .. } => self.execute_llm_call(step, agent, context).await,
            Step::ToolCall { .. } => self.execute_tool_call(step, agent, context, files).await,
            Step::Condition { condition, .. } => {
                Ok(Value::from(condition::evaluate(condition, &context.variables)))
            }
            Step::Loop { .. } => self.execute_loop(step, agent, context, files).await,
            Step::Parallel { .. } => self.execute_parallel(step, agent, context, files).await,
            Step::SetVariable {
                variable_name,
                variable_value,
                ..
            } => Ok(self.execute_set_variable(variable_name, variable_value, context)),
            Step::DataTransform {
                transform_expression, ..
            } => Ok(Value::from(template::render(transform_expression, &context.variables))),
            Step::UserInput { input_components, .. } => Ok(self.collect_user_input(input_components, context)),
            Step::Validation { .. } => Ok(Value::from(true)),
            Step::HttpRequest { .. } => Ok(Value::Null),
        };

        let mut result = StepResult {
            step_id: common.id.clone(),
            step_name: common.name.clone(),
            step_type: step_type_name(step).to_string(),
            status: ExecutionStatus::Completed,
            output: None,
            error: None,
            started_at: started_stamp,
            completed_at: None,
            duration_ms: 0,
        };

        match outcome {
            Ok(output) => {
                if let Some(output_var) = &common.output_variable {
                    context.set_variable(output_var.clone(), output.clone());
                }
                result.output = Some(output);
            }
            Err(e) => {
                result.status = ExecutionStatus::Failed;
                result.error = Some(e);
            }
        }

        result.completed_at = Some(Utc::now());
        result.duration_ms = started_at.elapsed().as_millis() as u64;
        result
    }

    async fn execute_llm_call(&self, step: &Step, agent: &Agent, context: &mut ExecutionContext) -> Result<Value, String> {
        let Step::LlmCall {
            prompt_template,
            system_prompt_override,
            connector_id,
            temperature,
            max_tokens,
            ..
        } = step
        else {
            unreachable!()
        };

        let prompt = template::render(prompt_template, &context.variables);
        let system_prompt = system_prompt_override
            .clone()
            .unwrap_or_else(|| agent.business_logic.system_prompt.clone());

        let mut messages = Vec::new();
        if let Some(history) = context.variable("conversation_history").cloned() {
            messages.extend(value_to_messages(&history));
        }
        messages.push(Message::user(prompt));

        let (provider, model, temp, max_tok) = self.resolve_llm_settings(
            agent,
            connector_id.as_deref(),
            *temperature,
            *max_tokens,
        );

        let response = self
            .llm_manager
            .chat(&messages, &provider, model.as_deref(), Some(&system_prompt), temp, max_tok)
            .await;

        if !response.success {
            return Err(format!(
                "LLM call failed: {}",
                response.error.unwrap_or_else(|| "unknown error".to_string())
            ));
        }

        if let Some(usage) = &response.usage {
            context.add_usage(usage);
        }

        Ok(Value::from(response.content))
    }

    /// Resolves provider/model/temperature/max_tokens for an `llm_call`
    /// step: a `connector_id` supplies provider/model/defaults, with the
    /// step's own `temperature`/`max_tokens` taking precedence over the
    /// connector's, and the agent's business logic as the final fallback
    /// (spec §4.1 "per-step LLM overrides via connector").
    fn resolve_llm_settings(
        &self,
        agent: &Agent,
        connector_id: Option<&str>,
        step_temperature: Option<f32>,
        step_max_tokens: Option<u32>,
    ) -> (String, Option<String>, f32, u32) {
        let connector = connector_id.and_then(|id| self.resolve_connector(agent, id));
        let provider = connector
            .map(|c| c.provider.clone())
            .unwrap_or_else(|| agent.business_logic.llm_provider.clone());
        let model = connector
            .and_then(|c| c.model.clone())
            .or_else(|| agent.business_logic.llm_model.clone());
        let temperature = step_temperature
            .or_else(|| connector.and_then(|c| c.temperature))
            .unwrap_or(agent.business_logic.temperature);
        let max_tokens = step_max_tokens
            .or_else(|| connector.and_then(|c| c.max_tokens))
            .unwrap_or(agent.business_logic.max_tokens);
        (provider, model, temperature, max_tokens)
    }

    fn resolve_connector<'a>(&self, agent: &'a Agent, connector_id: &str) -> Option<&'a ConnectorConfig> {
        agent.connectors.as_ref()?.by_id(connector_id)
    }

    async fn execute_tool_call(
        &self,
        step: &Step,
        agent: &Agent,
        context: &mut ExecutionContext,
        files: &InputFiles,
    ) -> Result<Value, String> {
        let Step::ToolCall { tool_config_id, .. } = step else {
            unreachable!()
        };

        let Some(tool_config) = agent.tool_config_by_id(tool_config_id) else {
            return Err(format!("tool config not found: {tool_config_id}"));
        };

        let parameters = self.tool_manager.resolve_parameters(
            tool_config,
            &context.variables,
            &context.variables,
            &context.variables,
        );

        let result = execute_with_policy(
            &self.tool_manager,
            tool_config,
            &tool_config.tool_id,
            &parameters,
            files,
        )
        .await;

        if result.success {
            return Ok(result.output.unwrap_or(Value::Null));
        }

        match tool_config.on_error {
            OnError::Stop => Err(format!(
                "tool call failed: {}",
                result.error.unwrap_or_else(|| "unknown error".to_string())
            )),
            OnError::Fallback => Ok(tool_config.fallback_value.clone().unwrap_or(Value::Null)),
            OnError::Continue | OnError::Retry => Ok(Value::Null),
        }
    }

    fn execute_set_variable(&self, variable_name: &str, variable_value: &Value, context: &mut ExecutionContext) -> Value {
        let rendered = match variable_value {
            Value::String(s) => Value::from(template::render(s, &context.variables)),
            other => other.clone(),
        };
        context.set_variable(variable_name.to_string(), rendered.clone());
        rendered
    }

    fn collect_user_input(&self, input_components: &[String], context: &ExecutionContext) -> Value {
        let mut out = serde_json::Map::new();
        for name in input_components {
            if let Some(value) = context.variable(name) {
                out.insert(name.clone(), value.clone());
            }
        }
        Value::Object(out)
    }

    /// Iterates `loop_variable` (must resolve to an array) up to
    /// `max_iterations`, running `loop_body` sequentially per item (spec
    /// §4.1). A body step's failure breaks only the current iteration.
    async fn execute_loop(
        &self,
        step: &Step,
        agent: &Agent,
        context: &mut ExecutionContext,
        files: &InputFiles,
    ) -> Result<Value, String> {
        let Step::Loop {
            loop_variable,
            loop_item_name,
            loop_index_name,
            loop_body,
            max_iterations,
            ..
        } = step
        else {
            unreachable!()
        };

        let Some(Value::Array(items)) = context.variable(loop_variable).cloned() else {
            return Ok(Value::Array(Vec::new()));
        };

        let mut results = Vec::new();
        for (i, item) in items.into_iter().take(*max_iterations).enumerate() {
            context.set_variable(loop_item_name.clone(), item);
            context.set_variable(loop_index_name.clone(), Value::from(i));

            for body_step in loop_body {
                let step_result = Box::pin(self.execute_step(body_step, agent, context, files)).await;
                let failed = step_result.status == ExecutionStatus::Failed;
                if let Some(output) = step_result.output.clone() {
                    results.push(output);
                }
                context.step_results.push(step_result);
                if failed {
                    break;
                }
            }
        }

        Ok(Value::Array(results))
    }

    /// Spawns each `parallel_steps` entry on an isolated snapshot of the
    /// current context (spec §5: parallel sub-steps run on independent
    /// tasks). `wait_for_all = false` returns as soon as the first
    /// completes and cancels the rest.
    async fn execute_parallel(
        &self,
        step: &Step,
        agent: &Agent,
        context: &mut ExecutionContext,
        files: &InputFiles,
    ) -> Result<Value, String> {
        let Step::Parallel {
            parallel_steps,
            wait_for_all,
            ..
        } = step
        else {
            unreachable!()
        };

        let mut join_set = tokio::task::JoinSet::new();
        for (index, body_step) in parallel_steps.iter().cloned().enumerate() {
            let executor = self.clone();
            let agent = agent.clone();
            let mut branch_context = context.clone();
            branch_context.usage = crate::llm_manager::Usage::default();
            let files = files.clone();
            let output_var = body_step.common().output_variable.clone();
            join_set.spawn(async move {
                let result = Box::pin(executor.execute_step(&body_step, &agent, &mut branch_context, &files)).await;
                (index, result, output_var, branch_context.usage)
            });
        }

        let mut collected: Vec<(usize, StepResult, Option<String>, crate::llm_manager::Usage)> = Vec::new();
        if *wait_for_all {
            while let Some(joined) = join_set.join_next().await {
                if let Ok(item) = joined {
                    collected.push(item);
                }
            }
        } else if let Some(joined) = join_set.join_next().await {
            if let Ok(item) = joined {
                collected.push(item);
            }
            join_set.abort_all();
        }

        collected.sort_by_key(|(index, _, _, _)| *index);

        let mut output_map = serde_json::Map::new();
        for (_, result, output_var, usage) in &collected {
            output_map.insert(result.step_id.clone(), result.output.clone().unwrap_or(Value::Null));
            if let (Some(output_var), Some(value)) = (output_var, &result.output) {
                context.set_variable(output_var.clone(), value.clone());
            }
            context.add_usage(usage);
        }
        for (_, result, _, _) in collected {
            context.step_results.push(result);
        }

        Ok(Value::Object(output_map))
    }
}

fn messages_to_value(messages: &[Message]) -> Value {
    Value::Array(
        messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": serde_json::to_value(&m.role).unwrap_or(Value::from("user")),
                    "content": m.content,
                })
            })
            .collect(),
    )
}

fn value_to_messages(value: &Value) -> Vec<Message> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let role = match item.get("role").and_then(Value::as_str) {
                Some("assistant") => Role::Assistant,
                Some("system") => Role::System,
                _ => Role::User,
            };
            let content = item.get("content").and_then(Value::as_str)?.to_string();
            Some(Message::new(role, content))
        })
        .collect()
}

fn next_step_id(step: &Step, result: &StepResult) -> Option<String> {
    match step {
        Step::Condition { on_true, on_false, .. } => {
            let truthy = result.output.as_ref().map(|v| v.as_bool().unwrap_or(false)).unwrap_or(false);
            if truthy {
                on_true.clone()
            } else {
                on_false.clone()
            }
        }
        other => other.common().next_step.clone(),
    }
}

fn step_type_name(step: &Step) -> &'static str {
    match step {
        Step::LlmCall { .. } => "llm_call",
        Step::ToolCall { .. } => "tool_call",
        Step::Condition { .. } => "condition",
        Step::Loop { .. } => "loop",
        Step::Parallel { .. } => "parallel",
        Step::UserInput { .. } => "user_input",
        Step::DataTransform { .. } => "data_transform",
        Step::SetVariable { .. } => "set_variable",
        Step::Validation { .. } => "validation",
        Step::HttpRequest { .. } => "http_request",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adl::{BusinessLogic, Deployment, Identity, Status, ToolsBlock};
    use std::collections::HashMap as Map;

    fn minimal_agent() -> Agent {
        Agent {
            metadata: Default::default(),
            identity: Identity {
                id: "a1".into(),
                name: "Agent".into(),
                slug: None,
                description: String::new(),
                long_description: None,
                icon: None,
                category: None,
                status: Status::Active,
            },
            business_logic: BusinessLogic {
                system_prompt: "You are helpful.".into(),
                user_prompt_template: None,
                personality_traits: vec![],
                tone: None,
                language: None,
                llm_provider: "mistral".into(),
                llm_model: None,
                temperature: 0.7,
                max_tokens: 1024,
                top_p: None,
                top_k: None,
                context_window_messages: 10,
                include_system_context: false,
                response_format: None,
                include_sources: false,
                include_confidence: false,
                streaming_enabled: false,
                moderation: false,
                classification: false,
                task_prompts: Map::new(),
                instructions: vec![],
                constraints: vec![],
            },
            tools: ToolsBlock::default(),
            ui: Value::Null,
            connectors: None,
            security: Value::Null,
            workflows: Default::default(),
            deployment: Deployment::default(),
        }
    }

    fn executor() -> WorkflowExecutor {
        WorkflowExecutor::new(
            ToolManager::new(reqwest::Client::new(), crate::tool_manager::ToolRegistry::new()),
            LlmManager::new(reqwest::Client::new(), HashMap::new(), std::time::Duration::from_secs(5)),
        )
    }

    #[tokio::test]
    async fn set_variable_step_renders_template_and_stores() {
        let executor = executor();
        let agent = minimal_agent();
        let workflow = Workflow {
            id: "w1".into(),
            name: "W".into(),
            trigger: crate::adl::Trigger::UserMessage,
            trigger_config: Map::new(),
            steps: vec![Step::SetVariable {
                common: crate::adl::StepCommon {
                    id: "s1".into(),
                    name: "Set".into(),
                    next_step: None,
                    output_variable: None,
                    on_error: OnError::Stop,
                },
                variable_name: "greeting".into(),
                variable_value: Value::from("hi {{ name }}"),
            }],
            entry_step: None,
            initial_variables: {
                let mut m = Map::new();
                m.insert("name".to_string(), Value::from("world"));
                m
            },
            timeout_ms: None,
        };

        let context = executor
            .execute(&agent, &workflow, Value::Object(Default::default()), &vec![], None)
            .await;

        assert_eq!(context.status, ExecutionStatus::Completed);
        assert_eq!(context.variable("greeting"), Some(&Value::from("hi world")));
    }

    #[tokio::test]
    async fn condition_step_branches_to_on_true() {
        let executor = executor();
        let agent = minimal_agent();
        let workflow = Workflow {
            id: "w1".into(),
            name: "W".into(),
            trigger: crate::adl::Trigger::UserMessage,
            trigger_config: Map::new(),
            steps: vec![
                Step::Condition {
                    common: crate::adl::StepCommon {
                        id: "c1".into(),
                        name: "Check".into(),
                        next_step: None,
                        output_variable: None,
                        on_error: OnError::Stop,
                    },
                    condition: crate::adl::Condition {
                        variable: "x".into(),
                        operator: crate::adl::ConditionOperator::Eq,
                        value: Some(Value::from(1)),
                        and_conditions: vec![],
                        or_conditions: vec![],
                    },
                    on_true: Some("s_true".into()),
                    on_false: Some("s_false".into()),
                },
                Step::SetVariable {
                    common: crate::adl::StepCommon {
                        id: "s_true".into(),
                        name: "True".into(),
                        next_step: None,
                        output_variable: None,
                        on_error: OnError::Stop,
                    },
                    variable_name: "branch".into(),
                    variable_value: Value::from("true-branch"),
                },
                Step::SetVariable {
                    common: crate::adl::StepCommon {
                        id: "s_false".into(),
                        name: "False".into(),
                        next_step: None,
                        output_variable: None,
                        on_error: OnError::Stop,
                    },
                    variable_name: "branch".into(),
                    variable_value: Value::from("false-branch"),
                },
            ],
            entry_step: None,
            initial_variables: {
                let mut m = Map::new();
                m.insert("x".to_string(), Value::from(1));
                m
            },
            timeout_ms: None,
        };

        let context = executor
            .execute(&agent, &workflow, Value::Object(Default::default()), &vec![], None)
            .await;
        assert_eq!(context.variable("branch"), Some(&Value::from("true-branch")));
    }

    #[tokio::test]
    async fn tool_call_with_unknown_config_stops_workflow() {
        let executor = executor();
        let agent = minimal_agent();
        let workflow = Workflow {
            id: "w1".into(),
            name: "W".into(),
            trigger: crate::adl::Trigger::UserMessage,
            trigger_config: Map::new(),
            steps: vec![Step::ToolCall {
                common: crate::adl::StepCommon {
                    id: "t1".into(),
                    name: "Tool".into(),
                    next_step: None,
                    output_variable: None,
                    on_error: OnError::Stop,
                },
                tool_config_id: "missing".into(),
            }],
            entry_step: None,
            initial_variables: Map::new(),
            timeout_ms: None,
        };

        let context = executor
            .execute(&agent, &workflow, Value::Object(Default::default()), &vec![], None)
            .await;
        assert_eq!(context.status, ExecutionStatus::Failed);
    }
}
