//! Read-modify-write updates of raw record documents

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use super::error::ApiError;
use super::models::{format_timestamp, platform};
use super::DocumentClient;

const PERSON_TYPE: &str = "IB.EdBundle.Document.Person";

/// Ticket workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TicketState {
    Created,
    Started,
    Completed,
}

impl TicketState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketState::Created => "created",
            TicketState::Started => "started",
            TicketState::Completed => "completed",
        }
    }
}

/// A change to a ticket document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketUpdate {
    SetState(TicketState),
    /// Sets the responsible person; a ticket that was not yet started moves
    /// to started
    Assign(String),
    /// Removes the responsible person and moves the ticket back to created
    Unassign,
    /// Completes the ticket, assigning it to the actor when nobody is
    /// responsible yet
    Complete,
    Retitle(String),
    Describe(String),
    /// Due date as an ISO 8601 timestamp
    SetDue(String),
    ClearDue,
    Comment(String),
    /// Archives (true) or restores (false) the ticket
    Archive(bool),
}

struct Change {
    property: &'static str,
    old: String,
    new: String,
}

impl Change {
    fn new(property: &'static str, old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            property,
            old: old.into(),
            new: new.into(),
        }
    }
}

fn set_nested(doc: &mut Map<String, Value>, key: &str, field: &str, value: Value) {
    match doc.get_mut(key) {
        Some(Value::Object(map)) => {
            map.insert(field.to_string(), value);
        }
        _ => {
            let mut map = Map::new();
            map.insert(field.to_string(), value);
            doc.insert(key.to_string(), Value::Object(map));
        }
    }
}

fn nested_str(doc: &Map<String, Value>, key: &str, field: &str) -> String {
    doc.get(key)
        .and_then(|v| v.get(field))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn current_state(doc: &Map<String, Value>) -> String {
    nested_str(doc, "state", "state")
}

fn current_responsible(doc: &Map<String, Value>) -> String {
    let responsible = doc.get("participants").and_then(|p| p.get("responsible"));
    match responsible {
        Some(Value::String(email)) => email.clone(),
        Some(value) => value
            .get("email")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        None => String::new(),
    }
}

/// Archive marker as text; empty when the document is not archived
fn archived_marker(doc: &Map<String, Value>) -> String {
    match doc.get("archived") {
        Some(Value::String(at)) => at.clone(),
        Some(Value::Bool(true)) => "true".to_string(),
        _ => String::new(),
    }
}

fn set_state(doc: &mut Map<String, Value>, state: TicketState, changes: &mut Vec<Change>) {
    let old = current_state(doc);
    if old == state.as_str() {
        return;
    }

    set_nested(doc, "state", "state", json!(state.as_str()));
    changes.push(Change::new("status", old, state.as_str()));
}

fn set_responsible(doc: &mut Map<String, Value>, email: &str, changes: &mut Vec<Change>) {
    let old = current_responsible(doc);
    if old == email {
        return;
    }

    let person = json!({ "type": PERSON_TYPE, "email": email });
    match doc.get_mut("participants") {
        Some(Value::Object(participants)) => {
            participants.insert("responsible".to_string(), person);
        }
        _ => {
            doc.insert(
                "participants".to_string(),
                json!({
                    "type": "IB.EdBundle.Document.Participants",
                    "responsible": person,
                    "consulted": [],
                    "informed": [],
                }),
            );
        }
    }
    changes.push(Change::new("responsible", old, email));
}

fn set_text(
    doc: &mut Map<String, Value>,
    field: &str,
    property: &'static str,
    text: &str,
    changes: &mut Vec<Change>,
) {
    let old = nested_str(doc, "content", field);
    if old == text {
        return;
    }
    set_nested(doc, "content", field, json!(text));
    changes.push(Change::new(property, old, text));
}

fn apply_one(
    doc: &mut Map<String, Value>,
    update: &TicketUpdate,
    actor: &str,
    now: &str,
    changes: &mut Vec<Change>,
) {
    match update {
        TicketUpdate::SetState(state) => set_state(doc, *state, changes),
        TicketUpdate::Assign(email) => {
            set_responsible(doc, email, changes);
            if current_state(doc) != TicketState::Completed.as_str() {
                set_state(doc, TicketState::Started, changes);
            }
        }
        TicketUpdate::Unassign => {
            let old = current_responsible(doc);
            if let Some(Value::Object(participants)) = doc.get_mut("participants") {
                participants.remove("responsible");
            }
            if !old.is_empty() {
                changes.push(Change::new("responsible", old, ""));
            }
            set_state(doc, TicketState::Created, changes);
        }
        TicketUpdate::Complete => {
            if current_responsible(doc).is_empty() {
                set_responsible(doc, actor, changes);
            }
            set_state(doc, TicketState::Completed, changes);
        }
        TicketUpdate::Retitle(title) => set_text(doc, "title", "title", title, changes),
        TicketUpdate::Describe(body) => set_text(doc, "body", "description", body, changes),
        TicketUpdate::SetDue(due) => {
            let old = nested_str(doc, "plan", "dueDate");
            if old != *due {
                set_nested(doc, "plan", "dueDate", json!(due));
                changes.push(Change::new("duedate", old, due.as_str()));
            }
        }
        TicketUpdate::ClearDue => {
            let old = nested_str(doc, "plan", "dueDate");
            if let Some(Value::Object(plan)) = doc.get_mut("plan") {
                plan.remove("dueDate");
            }
            if !old.is_empty() {
                changes.push(Change::new("duedate", old, ""));
            }
        }
        TicketUpdate::Comment(text) => changes.push(Change::new("comment", "", text.as_str())),
        TicketUpdate::Archive(archive) => {
            let old = archived_marker(doc);
            if *archive && old.is_empty() {
                doc.insert("archived".to_string(), json!(now));
                changes.push(Change::new("archived", old, now));
            } else if !*archive && !old.is_empty() {
                doc.insert("archived".to_string(), Value::Null);
                changes.push(Change::new("archived", old, ""));
            }
        }
    }
}

/// Applies `updates` in order to a ticket document and appends one
/// operation entry covering every change.
///
/// Returns false (and leaves the document untouched) when nothing changes.
pub fn apply_ticket_updates(
    doc: &mut Value,
    updates: &[TicketUpdate],
    actor: &str,
    at: DateTime<Utc>,
) -> bool {
    let Value::Object(doc) = doc else {
        return false;
    };

    let now = format_timestamp(at);
    let mut changes = Vec::new();
    for update in updates {
        apply_one(doc, update, actor, &now, &mut changes);
    }

    if changes.is_empty() {
        return false;
    }

    if let Some(Value::Object(dates)) = doc.get_mut("dates") {
        dates.insert("lastModifiedDate".to_string(), json!(now));
    }
    if let Some(Value::Object(content)) = doc.get_mut("content") {
        content.insert(
            "lastmodifier".to_string(),
            json!({ "type": PERSON_TYPE, "email": actor }),
        );
    }

    let operation = json!({
        "author": actor,
        "changedProperties": changes.iter().map(|c| c.property).collect::<Vec<_>>(),
        "oldValues": changes.iter().map(|c| c.old.as_str()).collect::<Vec<_>>(),
        "newValues": changes.iter().map(|c| c.new.as_str()).collect::<Vec<_>>(),
        "time": now,
        "summary": "user updated following fields",
        "actionType": "updated",
        "platform": platform(),
    });

    match doc.get_mut("operation") {
        Some(Value::Array(ops)) => ops.push(operation),
        _ => {
            doc.insert("operation".to_string(), json!([operation]));
        }
    }

    true
}

/// Fetches a ticket, applies `updates` and writes it back.
///
/// Returns false when the ticket already reflected every update.
pub fn update_ticket<C: DocumentClient + ?Sized>(
    client: &C,
    project_id: &str,
    ticket_id: &str,
    updates: &[TicketUpdate],
    actor: &str,
) -> Result<bool, ApiError> {
    let mut doc = client.get_document(project_id, ticket_id)?;
    if !apply_ticket_updates(&mut doc, updates, actor, Utc::now()) {
        tracing::debug!(project_id, ticket_id, "ticket already up to date");
        return Ok(false);
    }
    client.put_document(project_id, ticket_id, &doc)?;
    Ok(true)
}

/// Overwrites top-level fields of a document. Returns false when every
/// field already held the given value.
pub fn merge_fields(doc: &mut Value, fields: &Map<String, Value>) -> bool {
    let Value::Object(doc) = doc else {
        return false;
    };

    let mut changed = false;
    for (key, value) in fields {
        if doc.get(key) != Some(value) {
            doc.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

/// Fetches a document, overwrites `fields` and writes it back.
pub fn update_fields<C: DocumentClient + ?Sized>(
    client: &C,
    project_id: &str,
    doc_id: &str,
    fields: &Map<String, Value>,
) -> Result<bool, ApiError> {
    let mut doc = client.get_document(project_id, doc_id)?;
    if !merge_fields(&mut doc, fields) {
        tracing::debug!(project_id, doc_id, "document already up to date");
        return Ok(false);
    }
    client.put_document(project_id, doc_id, &doc)?;
    Ok(true)
}

/// Escapes markup in user text stored in rich-text fields
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
