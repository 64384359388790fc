//! Coalescing of related events into one unread notification.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use notify_entity::notification::{ContentContext, Notification};

/// Merge a new event's context into an existing notification's context.
pub type Grouper = fn(new: &ContentContext, existing: &ContentContext) -> ContentContext;

/// Type name of the built-in reply grouper.
pub const NEW_COMMENT: &str = "new_comment";

/// Dispatch table from notification type to its grouper.
#[derive(Debug, Clone, Default)]
pub struct GroupingRegistry {
    groupers: HashMap<String, Grouper>,
}

impl GroupingRegistry {
    /// An empty registry; nothing is grouped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in groupers.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(NEW_COMMENT, group_new_comment);
        registry
    }

    /// Register or replace the grouper of a type.
    pub fn register(&mut self, notification_type: &str, grouper: Grouper) {
        self.groupers.insert(notification_type.to_string(), grouper);
    }

    /// The grouper of a type, if any.
    pub fn get(&self, notification_type: &str) -> Option<Grouper> {
        self.groupers.get(notification_type).copied()
    }
}

/// Collects `replier_name` values into `replier_name_list`.
pub fn group_new_comment(new: &ContentContext, existing: &ContentContext) -> ContentContext {
    group_by_key("replier_name", new, existing)
}

/// Append `new[key]` to `existing["{key}_list"]` and bump `grouped_count`.
///
/// The first grouping seeds the list with the existing value and sets
/// `grouped = true`.
pub fn group_by_key(key: &str, new: &ContentContext, existing: &ContentContext) -> ContentContext {
    let list_key = format!("{key}_list");
    let mut context = existing.clone();
    let already_grouped = context
        .get("grouped")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !already_grouped {
        let seed = context.get(key).cloned().unwrap_or(Value::Null);
        context.insert(list_key.clone(), Value::Array(vec![seed]));
        context.insert("grouped_count".to_string(), Value::from(1));
        context.insert("grouped".to_string(), Value::Bool(true));
    }

    let incoming = new.get(key).cloned().unwrap_or(Value::Null);
    match context.get_mut(&list_key) {
        Some(Value::Array(list)) => list.push(incoming),
        _ => {
            context.insert(list_key, Value::Array(vec![incoming]));
        }
    }
    let count = context
        .get("grouped_count")
        .and_then(Value::as_i64)
        .unwrap_or(1);
    context.insert("grouped_count".to_string(), Value::from(count + 1));

    for (field, value) in new {
        if field != key && !context.contains_key(field) {
            context.insert(field.clone(), value.clone());
        }
    }
    context
}

/// Fold a new event into `existing` and reset it to unread.
pub fn coalesce(
    existing: &Notification,
    grouper: Grouper,
    new_context: &ContentContext,
    web: bool,
    email: bool,
    now: DateTime<Utc>,
) -> Notification {
    let context = grouper(new_context, &existing.context());
    Notification {
        content_context: Value::Object(context),
        web: existing.web || web,
        email: existing.email || email,
        last_read: None,
        last_seen: None,
        created: now,
        ..existing.clone()
    }
}
