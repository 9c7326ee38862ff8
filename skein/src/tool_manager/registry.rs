//! Static tool registry (spec §4.2: `tool_id → (base_url, endpoint_path,
//! requires_file_input, produces_file_output)`), seeded from configuration
//! at process start.

use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct ToolRegistryEntry {
    pub tool_id: String,
    pub name: String,
    pub description: String,
    pub base_url: String,
    pub endpoint_path: String,
    pub requires_file_input: bool,
    pub produces_file_output: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ToolRegistry {
    entries: HashMap<String, ToolRegistryEntry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, entry: ToolRegistryEntry) -> Self {
        self.entries.insert(entry.tool_id.clone(), entry);
        self
    }

    pub fn get(&self, tool_id: &str) -> Option<&ToolRegistryEntry> {
        self.entries.get(tool_id)
    }

    pub fn tool_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds a registry from `RUNTIME_TOOL_<tool_id>` base-URL overrides
    /// (spec §6.4) layered onto the well-known tool catalogue (spec
    /// `original_source/.../tool_manager.py`'s `TOOL_REGISTRY`).
    pub fn from_base_urls(base_urls: &HashMap<String, String>) -> Self {
        let mut registry = Self::new();
        for (tool_id, name, description, endpoint_path, requires_file_input, produces_file_output) in
            well_known_tools()
        {
            let Some(base_url) = base_urls.get(tool_id) else {
                continue;
            };
            registry = registry.with_entry(ToolRegistryEntry {
                tool_id: tool_id.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                base_url: base_url.clone(),
                endpoint_path: endpoint_path.to_string(),
                requires_file_input,
                produces_file_output,
            });
        }
        registry
    }
}

/// `(tool_id, name, description, endpoint_path, requires_file_input,
/// produces_file_output)` for every tool the catalogue knows about (spec
/// `original_source/.../tool_manager.py`'s `TOOL_REGISTRY`).
fn well_known_tools() -> Vec<(&'static str, &'static str, &'static str, &'static str, bool, bool)>
{
    vec![
        (
            "word-crud",
            "Word Document",
            "Create and manipulate Word documents",
            "/api/v1/word",
            false,
            true,
        ),
        (
            "pdf-crud",
            "PDF Document",
            "Create and manipulate PDF documents",
            "/api/v1/pdf",
            false,
            true,
        ),
        (
            "excel-crud",
            "Excel Spreadsheet",
            "Create and manipulate Excel spreadsheets",
            "/api/v1/excel",
            false,
            true,
        ),
        (
            "pptx-crud",
            "PowerPoint",
            "Create PowerPoint presentations",
            "/api/v1/pptx",
            false,
            true,
        ),
        (
            "document-extractor",
            "Document Extractor",
            "Extract text from documents (PDF, Word, etc.)",
            "/api/v1/extract",
            true,
            false,
        ),
        (
            "web-search",
            "Web Search",
            "Search the web for information",
            "/api/v1/search",
            false,
            false,
        ),
        (
            "file-upload",
            "File Upload",
            "Upload and store files",
            "/api/v1/upload",
            true,
            false,
        ),
        (
            "prompt-moderation",
            "Content Moderation",
            "Check content for policy violations",
            "/api/v1/moderate",
            false,
            false,
        ),
        (
            "content-classification",
            "Content Classification",
            "Classify content type and domain",
            "/api/v1/classify",
            false,
            false,
        ),
        (
            "eml-parser",
            "Email Parser",
            "Parse email files (.eml)",
            "/api/v1/parse-email",
            true,
            false,
        ),
        (
            "image-analysis",
            "Image Analysis",
            "Analyze images with AI vision",
            "/api/v1/analyze",
            true,
            false,
        ),
        (
            "data-export",
            "Data Export",
            "Export structured data to CSV/JSON/ZIP",
            "/api/v1/export/generate-zip",
            false,
            true,
        ),
    ]
}
