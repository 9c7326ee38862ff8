//! Runtime configuration (spec §6.4) and the printable config summary
//! pattern, grounded on `config::summary::{ConfigSection, RunConfigSummary}`
//! (trait + ordered section list, each section responsible for its own
//! `entries()`/`print_to_stderr()`).

use std::collections::HashMap;
use std::path::PathBuf;

const TOOL_PREFIX: &str = "RUNTIME_TOOL_";
const LLM_PREFIX: &str = "RUNTIME_LLM_";
const LLM_SUFFIX: &str = "_URL";

/// Process-wide configuration, read once at startup from environment
/// variables (spec §6.4).
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub agents_storage_path: PathBuf,
    /// `RUNTIME_TOOL_<tool_id>` → base URL, one entry per configured tool.
    pub tool_base_urls: HashMap<String, String>,
    /// `RUNTIME_LLM_<provider>_URL` → base URL override.
    pub llm_base_urls: HashMap<String, String>,
    pub tool_timeout_seconds: u64,
    pub llm_timeout_seconds: u64,
    pub moderation_settings_path: Option<PathBuf>,
    pub nemo_guardrails_config_path: Option<PathBuf>,
}

impl RuntimeConfig {
    /// Reads configuration from the process environment. Callers should
    /// run `skein_config::load_and_apply` first so `.env`/XDG values are
    /// already applied to `std::env` by the time this runs.
    pub fn from_env() -> Self {
        let mut tool_base_urls = HashMap::new();
        let mut llm_base_urls = HashMap::new();

        for (key, value) in std::env::vars() {
            if let Some(tool_id) = key.strip_prefix(TOOL_PREFIX) {
                // Tool ids in the registry are hyphenated (`web-search`); env
                // var names can't contain hyphens in most shells, so the
                // suffix is written with underscores and translated back here.
                tool_base_urls.insert(tool_id.to_lowercase().replace('_', "-"), value);
            } else if let Some(rest) = key.strip_prefix(LLM_PREFIX) {
                if let Some(provider) = rest.strip_suffix(LLM_SUFFIX) {
                    llm_base_urls.insert(provider.to_lowercase(), value);
                }
            }
        }

        Self {
            host: env_or("RUNTIME_HOST", "0.0.0.0"),
            port: env_or("RUNTIME_PORT", "8080").parse().unwrap_or(8080),
            cors_origins: std::env::var("RUNTIME_CORS_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
            agents_storage_path: PathBuf::from(env_or(
                "RUNTIME_AGENTS_STORAGE_PATH",
                "./agents",
            )),
            tool_base_urls,
            llm_base_urls,
            tool_timeout_seconds: env_or("RUNTIME_TOOL_TIMEOUT_SECONDS", "60")
                .parse()
                .unwrap_or(60),
            llm_timeout_seconds: env_or("RUNTIME_LLM_TIMEOUT_SECONDS", "600")
                .parse()
                .unwrap_or(600),
            moderation_settings_path: std::env::var("MODERATION_SETTINGS_PATH").ok().map(PathBuf::from),
            nemo_guardrails_config_path: std::env::var("NEMO_GUARDRAILS_CONFIG_PATH")
                .ok()
                .map(PathBuf::from),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// One labeled block of key/value pairs in a startup config dump.
pub trait ConfigSection {
    fn section_name(&self) -> &'static str;
    fn entries(&self) -> Vec<(&'static str, String)>;

    fn print_to_stderr(&self) {
        eprintln!("[{}]", self.section_name());
        for (key, value) in self.entries() {
            eprintln!("  {key} = {value}");
        }
    }
}

impl ConfigSection for RuntimeConfig {
    fn section_name(&self) -> &'static str {
        "runtime"
    }

    fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("host", self.host.clone()),
            ("port", self.port.to_string()),
            ("agents_storage_path", self.agents_storage_path.display().to_string()),
            ("tool_timeout_seconds", self.tool_timeout_seconds.to_string()),
            ("llm_timeout_seconds", self.llm_timeout_seconds.to_string()),
            ("configured_tools", self.tool_base_urls.len().to_string()),
            ("configured_llm_overrides", self.llm_base_urls.len().to_string()),
        ]
    }
}

/// Ordered collection of [`ConfigSection`]s printed together at startup.
#[derive(Default)]
pub struct RunConfigSummary {
    sections: Vec<Box<dyn ConfigSection>>,
}

impl RunConfigSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_section(mut self, section: Box<dyn ConfigSection>) -> Self {
        self.sections.push(section);
        self
    }

    pub fn print_to_stderr(&self) {
        for section in &self.sections {
            section.print_to_stderr();
        }
    }
}

/// Implemented by anything that can contribute one or more sections to a
/// startup [`RunConfigSummary`] (spec §5: services are "created at startup
/// under a lock").
pub trait RunConfigSummarySource {
    fn config_sections(&self) -> Vec<Box<dyn ConfigSection>>;
}

pub fn build_config_summary(sources: &[&dyn RunConfigSummarySource]) -> RunConfigSummary {
    let mut summary = RunConfigSummary::new();
    for source in sources {
        for section in source.config_sections() {
            summary = summary.with_section(section);
        }
    }
    summary
}
