//! Prompt extraction from embedded image metadata.
//!
//! Generated images carry their node graph as JSON in a `prompt` text field:
//! an object of node id → `{ "class_type": ..., "inputs": { ... } }`. The tag
//! text a user wants is buried somewhere in there, and where exactly depends
//! on the workflow that produced the image.
//!
//! ## Lookup priority
//!
//! The first rule that yields a non-empty string wins:
//!
//! 1. `inputs.clip_l` on any node
//! 2. `inputs.text_g`, else `inputs.text_l`, on any node
//! 3. the first node with `inputs.positive`: follow its `[node_id, slot]`
//!    reference one hop and read that node's `inputs.text`
//! 4. `inputs.text` on any node whose `class_type` is `CLIPTextEncode`
//!
//! ## Node order
//!
//! Rules that scan "any node" visit nodes with integer ids first, in
//! ascending numeric order, then every other id in document order. Graph
//! exporters number their nodes, so this makes `"3"` come before `"10"`
//! regardless of how the JSON was serialized.
//!
//! Only non-empty strings count as a hit. Numbers, arrays and blank
//! strings are skipped.

use serde_json::{Map, Value};

/// Text field holding the node graph.
pub const PROMPT_FIELD: &str = "prompt";

const TEXT_ENCODE_CLASS: &str = "CLIPTextEncode";

/// Return the first non-empty, trimmed value in priority order.
pub fn resolve(sources: &[Option<&str>]) -> Option<String> {
    sources
        .iter()
        .filter_map(|opt| {
            opt.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .next()
}

/// Extract the prompt tag text from decoded metadata fields.
///
/// Returns `None` when there is no `prompt` field, it isn't a JSON object,
/// or no rule matches.
pub fn extract_prompt_tags<'a, I>(fields: I) -> Option<String>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let raw = fields
        .into_iter()
        .find(|(key, _)| key.as_str() == PROMPT_FIELD)
        .map(|(_, value)| value)?;
    let graph: Value = serde_json::from_str(raw).ok()?;
    extract_from_graph(graph.as_object()?)
}

/// Apply the lookup rules to a parsed node graph.
pub fn extract_from_graph(graph: &Map<String, Value>) -> Option<String> {
    let nodes = ordered_nodes(graph);

    let by_field = |field: &str| {
        nodes
            .iter()
            .find_map(|(_, node)| input_text(node, field))
    };

    by_field("clip_l")
        .or_else(|| {
            nodes.iter().find_map(|(_, node)| {
                resolve(&[
                    input_text(node, "text_g").as_deref(),
                    input_text(node, "text_l").as_deref(),
                ])
            })
        })
        .or_else(|| follow_positive(graph, &nodes))
        .or_else(|| {
            nodes
                .iter()
                .filter(|(_, node)| {
                    node.get("class_type").and_then(Value::as_str) == Some(TEXT_ENCODE_CLASS)
                })
                .find_map(|(_, node)| input_text(node, "text"))
        })
}

fn follow_positive(graph: &Map<String, Value>, nodes: &[(&str, &Value)]) -> Option<String> {
    let reference = nodes
        .iter()
        .find_map(|(_, node)| node.get("inputs")?.get("positive"))?;
    let target_id = match reference.get(0)? {
        Value::String(id) => id.clone(),
        Value::Number(id) => id.to_string(),
        _ => return None,
    };
    input_text(graph.get(&target_id)?, "text")
}

/// Non-empty string at `node.inputs.<field>`.
fn input_text(node: &Value, field: &str) -> Option<String> {
    node.get("inputs")?
        .get(field)?
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(String::from)
}

/// Nodes with integer ids ascending, then the rest in document order.
fn ordered_nodes(graph: &Map<String, Value>) -> Vec<(&str, &Value)> {
    let mut numeric: Vec<(u64, &str, &Value)> = Vec::new();
    let mut named: Vec<(&str, &Value)> = Vec::new();
    for (id, node) in graph {
        match canonical_index(id) {
            Some(n) => numeric.push((n, id, node)),
            None => named.push((id, node)),
        }
    }
    numeric.sort_by_key(|(n, _, _)| *n);
    numeric
        .into_iter()
        .map(|(_, id, node)| (id, node))
        .chain(named)
        .collect()
}

/// `"12"` → 12, but `"012"`, `"+1"` and `""` are plain names.
fn canonical_index(id: &str) -> Option<u64> {
    let n: u64 = id.parse().ok()?;
    (n.to_string() == id).then_some(n)
}
