//! JSON codec for pipeline graphs.
//!
//! The wire shape is `{"graph": [record, ...]}` where a record carrying a
//! `"vertex": true` marker is a node and anything else is an edge. Fields
//! this crate does not model are preserved through pass-through bags and
//! re-emitted on serialization.

use super::model::{Edge, Graph, Node, NodeKind, PathCondition};
use crate::errors::MalformedGraphError;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

impl Graph {
    /// Parses the raw graph JSON.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedGraphError`] if the input is not valid JSON, lacks
    /// the `graph` record array, or a record is missing required fields.
    pub fn parse(raw: &str) -> Result<Self, MalformedGraphError> {
        let document: Value = serde_json::from_str(raw)
            .map_err(|e| MalformedGraphError::new(format!("invalid JSON: {e}")))?;

        let records = document
            .as_object()
            .and_then(|o| o.get("graph"))
            .and_then(Value::as_array)
            .ok_or_else(|| MalformedGraphError::new("expected a top-level 'graph' array"))?;

        let mut nodes = Vec::new();
        let mut edges = Vec::new();

        for record in records {
            let map = record
                .as_object()
                .ok_or_else(|| MalformedGraphError::new("graph records must be objects"))?;

            if map.get("vertex").and_then(Value::as_bool) == Some(true) {
                nodes.push(parse_vertex(map)?);
            } else {
                edges.push(parse_edge(map)?);
            }
        }

        Ok(Self::new(nodes, edges))
    }

    /// Serializes the graph back to its canonical JSON string.
    ///
    /// Nodes are emitted in parse order, then edges in parse order;
    /// pass-through fields are restored alongside the modeled ones.
    #[must_use]
    pub fn serialize(&self) -> String {
        self.to_value().to_string()
    }

    /// Serializes the graph to a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut records = Vec::with_capacity(self.nodes.len() + self.edges.len());
        for node in &self.nodes {
            records.push(vertex_to_value(node));
        }
        for edge in &self.edges {
            records.push(edge_to_value(edge));
        }

        let mut document = Map::new();
        document.insert("graph".to_string(), Value::Array(records));
        Value::Object(document)
    }

    /// Hex SHA-256 of the canonical serialization.
    #[must_use]
    pub fn content_hash(&self) -> String {
        hex::encode(Sha256::digest(self.serialize().as_bytes()))
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            // Non-string values stay in the pass-through bag.
            map.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

fn parse_vertex(record: &Map<String, Value>) -> Result<Node, MalformedGraphError> {
    let mut extra = record.clone();

    let id = take_string(&mut extra, "id")
        .ok_or_else(|| MalformedGraphError::new("vertex record missing string 'id'"))?;

    let mut value_extra = match extra.remove("value") {
        Some(Value::Object(map)) => map,
        _ => {
            return Err(MalformedGraphError::new(format!(
                "vertex '{id}' missing 'value' object"
            )))
        }
    };

    let operation = take_string(&mut value_extra, "operation");
    let name = take_string(&mut value_extra, "name");

    let kind = match operation.as_deref() {
        Some("JOB") => {
            let job_id = take_string(&mut value_extra, "jobId").ok_or_else(|| {
                MalformedGraphError::new(format!("JOB vertex '{id}' missing 'jobId'"))
            })?;
            NodeKind::Job { job_id }
        }
        Some("PIPELINE") => {
            let pipeline_id = take_string(&mut value_extra, "pipelineId").ok_or_else(|| {
                MalformedGraphError::new(format!("PIPELINE vertex '{id}' missing 'pipelineId'"))
            })?;
            NodeKind::Pipeline { pipeline_id }
        }
        _ => NodeKind::Other { operation },
    };

    Ok(Node {
        id,
        kind,
        outgoing: Vec::new(),
        name,
        extra,
        value_extra,
    })
}

fn parse_edge(record: &Map<String, Value>) -> Result<Edge, MalformedGraphError> {
    let mut extra = record.clone();

    let source = take_string(&mut extra, "source")
        .ok_or_else(|| MalformedGraphError::new("edge record missing string 'source'"))?;
    let target = take_string(&mut extra, "target")
        .ok_or_else(|| MalformedGraphError::new("edge record missing string 'target'"))?;

    let mut value_extra = match extra.remove("value") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    let condition = take_string(&mut value_extra, "successPath").map(PathCondition::new);

    Ok(Edge {
        source,
        target,
        condition,
        extra,
        value_extra,
    })
}

fn vertex_to_value(node: &Node) -> Value {
    let mut record = node.extra.clone();
    record.insert("id".to_string(), Value::String(node.id.clone()));

    let mut value = node.value_extra.clone();
    if let Some(name) = &node.name {
        value.insert("name".to_string(), Value::String(name.clone()));
    }
    match &node.kind {
        NodeKind::Job { job_id } => {
            value.insert("operation".to_string(), Value::String("JOB".to_string()));
            value.insert("jobId".to_string(), Value::String(job_id.clone()));
        }
        NodeKind::Pipeline { pipeline_id } => {
            value.insert(
                "operation".to_string(),
                Value::String("PIPELINE".to_string()),
            );
            value.insert(
                "pipelineId".to_string(),
                Value::String(pipeline_id.clone()),
            );
        }
        NodeKind::Other { operation } => {
            if let Some(op) = operation {
                value.insert("operation".to_string(), Value::String(op.clone()));
            }
        }
    }
    record.insert("value".to_string(), Value::Object(value));

    Value::Object(record)
}

fn edge_to_value(edge: &Edge) -> Value {
    let mut record = edge.extra.clone();
    record.insert("source".to_string(), Value::String(edge.source.clone()));
    record.insert("target".to_string(), Value::String(edge.target.clone()));

    let mut value = edge.value_extra.clone();
    if let Some(condition) = &edge.condition {
        value.insert(
            "successPath".to_string(),
            Value::String(condition.as_str().to_string()),
        );
    }
    if !value.is_empty() {
        record.insert("value".to_string(), Value::Object(value));
    }

    Value::Object(record)
}
