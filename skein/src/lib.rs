//! `skein`: a declarative agent runtime. An [`Agent`](adl::Agent) describes
//! identity, business logic, tool bindings, and workflows; the [`loader`]
//! validates and publishes it; the [`executor::WorkflowExecutor`] walks its
//! workflow graph, dispatching to the [`tool_manager`] and [`llm_manager`]
//! and recording state in a [`session::SessionManager`]. The
//! [`safety::SafetyGate`] sits in front of the executor, checked by
//! callers before invoking it.

pub mod adl;
pub mod config;
pub mod error;
pub mod executor;
pub mod http_client;
pub mod llm_manager;
pub mod loader;
pub mod message;
pub mod safety;
pub mod session;
pub mod template;
pub mod tool_manager;

pub use error::RuntimeError;
pub use executor::{ExecutionContext, ExecutionStatus, WorkflowExecutor};
pub use llm_manager::LlmManager;
pub use loader::AgentRegistry;
pub use message::{Message, Role};
pub use safety::SafetyGate;
pub use session::SessionManager;
pub use tool_manager::ToolManager;
