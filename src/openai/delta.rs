use serde::Deserialize;

// Only the fields needed to get at `choices[0].delta.content`. Every
// other field in the chunk is ignored.
#[derive(Debug, Deserialize)]
struct ContentDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunkChoice {
    delta: Option<ContentDelta>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<CompletionChunkChoice>,
}

/// Pulls the incremental content out of a frame payload.
///
/// Returns `None` for anything that isn't a chunk with non-empty
/// content: invalid JSON, a different shape, role-only or finish
/// deltas. A bad frame must never end the stream so there is no error
/// case.
pub fn extract_delta(payload: &str) -> Option<String> {
    let chunk = serde_json::from_str::<CompletionChunk>(payload)
        .inspect_err(|e| tracing::debug!("Skipping frame {}: {}", payload, e))
        .ok()?;

    chunk
        .choices
        .into_iter()
        .next()?
        .delta?
        .content
        .filter(|content| !content.is_empty())
}
