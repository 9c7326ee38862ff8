//! Shape/range and cross-reference validation (spec §4.4). Error-level
//! findings reject the file; warning-level findings are returned alongside
//! a successfully loaded agent.

use std::collections::HashSet;

use crate::adl::{Agent, Step};

use super::LoadError;

#[derive(Debug, Default)]
pub struct ValidationOutcome {
    pub warnings: Vec<String>,
}

/// Checks the §6.1 numeric-range and string-length constraints that parsing
/// alone cannot enforce (shape and enum violations are already rejected by
/// serde at parse time; see `load_one`). Spec §4.4: "reject files that fail
/// shape, enum, or range constraints"; §7: `SchemaInvalid` covers all three.
pub fn validate_constraints(agent: &Agent) -> Result<(), LoadError> {
    let identity = &agent.identity;
    check_len("identity.name", &identity.name, 1, 100)?;
    check_len("identity.description", &identity.description, 1, 500)?;
    if let Some(long_description) = &identity.long_description {
        check_len_max("identity.long_description", long_description, 5000)?;
    }

    let business_logic = &agent.business_logic;
    check_range("business_logic.temperature", business_logic.temperature, 0.0, 2.0)?;
    check_range_u32("business_logic.max_tokens", business_logic.max_tokens, 1, 128_000)?;
    if let Some(top_p) = business_logic.top_p {
        check_range("business_logic.top_p", top_p, 0.0, 1.0)?;
    }
    if let Some(top_k) = business_logic.top_k {
        if top_k < 1 {
            return Err(LoadError::SchemaInvalid(
                "business_logic.top_k must be >= 1".to_string(),
            ));
        }
    }
    for trait_ in &business_logic.personality_traits {
        check_range(
            &format!("business_logic.personality_traits[{:?}].intensity", trait_.name),
            trait_.intensity,
            0.0,
            2.0,
        )?;
    }

    check_range_u32("tools.max_parallel_tools", agent.tools.max_parallel_tools, 1, 10)?;

    if agent.deployment.max_instances < 1 {
        return Err(LoadError::SchemaInvalid(
            "deployment.max_instances must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), LoadError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(LoadError::SchemaInvalid(format!(
            "{field} length {len} is outside the allowed range {min}..{max}"
        )));
    }
    Ok(())
}

fn check_len_max(field: &str, value: &str, max: usize) -> Result<(), LoadError> {
    let len = value.chars().count();
    if len > max {
        return Err(LoadError::SchemaInvalid(format!(
            "{field} length {len} exceeds the maximum of {max}"
        )));
    }
    Ok(())
}

fn check_range(field: &str, value: f32, min: f32, max: f32) -> Result<(), LoadError> {
    if value < min || value > max {
        return Err(LoadError::SchemaInvalid(format!(
            "{field} value {value} is outside the allowed range [{min}, {max}]"
        )));
    }
    Ok(())
}

fn check_range_u32(field: &str, value: u32, min: u32, max: u32) -> Result<(), LoadError> {
    if value < min || value > max {
        return Err(LoadError::SchemaInvalid(format!(
            "{field} value {value} is outside the allowed range [{min}, {max}]"
        )));
    }
    Ok(())
}

/// Validates `agent`'s cross-references. Returns `Ok` with accumulated
/// warnings, or `Err(LoadError::ReferenceInvalid)` on the first error-level
/// violation (spec §4.4, §3 invariants).
pub fn validate_agent(agent: &Agent) -> Result<ValidationOutcome, LoadError> {
    let mut warnings = Vec::new();

    if let Some(connectors) = &agent.connectors {
        if let Some(default_id) = &connectors.default_connector {
            if connectors.by_id(default_id).is_none() {
                return Err(LoadError::ReferenceInvalid(format!(
                    "connectors.default_connector {default_id:?} is not a known connector id"
                )));
            }
        }
    }

    let ui_component_names = collect_ui_component_names(&agent.ui);

    for workflow in &agent.workflows.workflows {
        // A `next_step`/`on_true`/`on_false` may name either a step's `id`
        // or its `name` (spec §4.4, confirmed by
        // `original_source/.../workflow_executor.py::_find_step`), so both
        // resolve here.
        let step_ids: HashSet<&str> = workflow
            .steps
            .iter()
            .flat_map(all_steps)
            .flat_map(|s| [s.id(), s.common().name.as_str()])
            .collect();

        for step in workflow.steps.iter().flat_map(all_steps) {
            for target in step.outgoing_refs() {
                if !step_ids.contains(target) {
                    return Err(LoadError::ReferenceInvalid(format!(
                        "workflow {:?} step {:?} references unknown step {target:?}",
                        workflow.id,
                        step.id()
                    )));
                }
            }

            if let Step::ToolCall {
                tool_config_id, ..
            } = step
            {
                if agent.tool_config_by_id(tool_config_id).is_none() {
                    return Err(LoadError::ReferenceInvalid(format!(
                        "workflow {:?} step {:?} references unknown tool_config_id {tool_config_id:?}",
                        workflow.id,
                        step.id()
                    )));
                }
            }

            if let Step::UserInput {
                input_components, ..
            } = step
            {
                for name in input_components {
                    if !ui_component_names.is_empty() && !ui_component_names.contains(name.as_str())
                    {
                        warnings.push(format!(
                            "step {:?} input_component {name:?} does not match any UI component name",
                            step.id()
                        ));
                    }
                }
            }
        }
    }

    Ok(ValidationOutcome { warnings })
}

/// Warning-level check that needs the Tool Manager's live registry (spec
/// §4.4: "`tool_id` values not present in the Tool Registry"), run
/// separately from [`validate_agent`] since the Agent Loader does not own
/// a Tool Registry instance — a caller that has one (the public API at
/// startup/reload) can combine these warnings with `validate_agent`'s.
pub fn validate_against_tool_registry(
    agent: &Agent,
    known_tool_ids: &HashSet<String>,
) -> Vec<String> {
    agent
        .tools
        .tools
        .iter()
        .filter(|tc| !known_tool_ids.contains(&tc.tool_id))
        .map(|tc| {
            format!(
                "tool_config {:?} references unknown tool_id {:?}",
                tc.id, tc.tool_id
            )
        })
        .collect()
}

/// Flattens a step and (recursively) its `loop_body`/`parallel_steps`
/// children, so nested step ids participate in the same-workflow id set.
fn all_steps(step: &Step) -> Vec<&Step> {
    let mut out = vec![step];
    match step {
        Step::Loop { loop_body, .. } => {
            for child in loop_body {
                out.extend(all_steps(child));
            }
        }
        Step::Parallel { parallel_steps, .. } => {
            for child in parallel_steps {
                out.extend(all_steps(child));
            }
        }
        _ => {}
    }
    out
}

/// Best-effort extraction of UI component names from the otherwise-opaque
/// `ui` block (spec §3: "UI descriptor (opaque to the core)"). Only objects
/// that look like a component (carry both `name` and `type` keys) count,
/// searched recursively since the UI tree shape is not specified.
fn collect_ui_component_names(ui: &serde_json::Value) -> HashSet<String> {
    let mut names = HashSet::new();
    collect_ui_component_names_inner(ui, &mut names);
    names
}

fn collect_ui_component_names_inner(value: &serde_json::Value, names: &mut HashSet<String>) {
    match value {
        serde_json::Value::Object(map) => {
            if let (Some(serde_json::Value::String(name)), Some(_)) =
                (map.get("name"), map.get("type"))
            {
                names.insert(name.clone());
            }
            for v in map.values() {
                collect_ui_component_names_inner(v, names);
            }
        }
        serde_json::Value::Array(items) => {
            for v in items {
                collect_ui_component_names_inner(v, names);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adl::*;

    fn agent_with_workflow(steps: Vec<Step>) -> Agent {
        Agent {
            metadata: AgentMetadata::default(),
            identity: Identity {
                id: "a1".into(),
                name: "Agent".into(),
                slug: None,
                description: "".into(),
                long_description: None,
                icon: None,
                category: None,
                status: Status::Active,
            },
            business_logic: BusinessLogic {
                system_prompt: "hi".into(),
                user_prompt_template: None,
                personality_traits: vec![],
                tone: None,
                language: None,
                llm_provider: "openai".into(),
                llm_model: None,
                temperature: 0.7,
                max_tokens: 100,
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
                task_prompts: Default::default(),
                instructions: vec![],
                constraints: vec![],
            },
            tools: ToolsBlock::default(),
            ui: serde_json::Value::Null,
            connectors: None,
            security: serde_json::Value::Null,
            workflows: WorkflowsBlock {
                workflows: vec![Workflow {
                    id: "w1".into(),
                    name: "Main".into(),
                    trigger: Trigger::UserMessage,
                    trigger_config: Default::default(),
                    steps,
                    entry_step: None,
                    initial_variables: Default::default(),
                    timeout_ms: None,
                }],
                default_workflow: None,
            },
            deployment: Deployment::default(),
        }
    }

    fn step(id: &str, next: Option<&str>) -> Step {
        Step::SetVariable {
            common: StepCommon {
                id: id.into(),
                name: id.into(),
                next_step: next.map(String::from),
                output_variable: None,
                on_error: OnError::Stop,
            },
            variable_name: "x".into(),
            variable_value: serde_json::json!(1),
        }
    }

    #[test]
    fn valid_next_step_passes() {
        let agent = agent_with_workflow(vec![step("s1", Some("s2")), step("s2", None)]);
        assert!(validate_agent(&agent).is_ok());
    }

    #[test]
    fn unknown_next_step_rejected() {
        let agent = agent_with_workflow(vec![step("s1", Some("Z"))]);
        let err = validate_agent(&agent).unwrap_err();
        assert!(matches!(err, LoadError::ReferenceInvalid(_)));
    }

    #[test]
    fn unknown_tool_config_id_rejected() {
        let agent = agent_with_workflow(vec![Step::ToolCall {
            common: StepCommon {
                id: "s1".into(),
                name: "s1".into(),
                next_step: None,
                output_variable: None,
                on_error: OnError::Stop,
            },
            tool_config_id: "missing".into(),
        }]);
        let err = validate_agent(&agent).unwrap_err();
        assert!(matches!(err, LoadError::ReferenceInvalid(_)));
    }

    #[test]
    fn in_range_agent_passes_constraints() {
        let mut agent = agent_with_workflow(vec![]);
        agent.identity.description = "a helpful agent".into();
        assert!(validate_constraints(&agent).is_ok());
    }

    #[test]
    fn temperature_out_of_range_rejected() {
        let mut agent = agent_with_workflow(vec![]);
        agent.identity.description = "a helpful agent".into();
        agent.business_logic.temperature = 5.0;
        let err = validate_constraints(&agent).unwrap_err();
        assert!(matches!(err, LoadError::SchemaInvalid(_)));
    }

    #[test]
    fn max_tokens_out_of_range_rejected() {
        let mut agent = agent_with_workflow(vec![]);
        agent.identity.description = "a helpful agent".into();
        agent.business_logic.max_tokens = 0;
        let err = validate_constraints(&agent).unwrap_err();
        assert!(matches!(err, LoadError::SchemaInvalid(_)));
    }

    #[test]
    fn empty_description_rejected() {
        let agent = agent_with_workflow(vec![]);
        let err = validate_constraints(&agent).unwrap_err();
        assert!(matches!(err, LoadError::SchemaInvalid(_)));
    }

    #[test]
    fn personality_trait_intensity_out_of_range_rejected() {
        let mut agent = agent_with_workflow(vec![]);
        agent.identity.description = "a helpful agent".into();
        agent.business_logic.personality_traits.push(PersonalityTrait {
            name: "curious".into(),
            intensity: 9.0,
        });
        let err = validate_constraints(&agent).unwrap_err();
        assert!(matches!(err, LoadError::SchemaInvalid(_)));
    }

    #[test]
    fn max_parallel_tools_out_of_range_rejected() {
        let mut agent = agent_with_workflow(vec![]);
        agent.identity.description = "a helpful agent".into();
        agent.tools.max_parallel_tools = 0;
        let err = validate_constraints(&agent).unwrap_err();
        assert!(matches!(err, LoadError::SchemaInvalid(_)));
    }
}
