//! SSE line classification for the streaming chat path (spec §4.3),
//! grounded on `original_source/.../llm_manager.py::chat_stream`'s
//! `"data: "`-prefix / `"[DONE]"` handling and the teacher's
//! `openai_sse::write_sse_line` line format.

const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, PartialEq, Eq)]
pub enum SseLine {
    Data(String),
    Done,
    Other,
}

/// Classifies one line of an SSE stream.
pub fn parse_sse_line(line: &str) -> SseLine {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return SseLine::Other;
    };
    if payload == DONE_MARKER {
        SseLine::Done
    } else {
        SseLine::Data(payload.to_string())
    }
}
