//! Notification kinds and their creation-time policy.
//!
//! The kind set is closed: adding a notification type means adding a
//! variant and a constructor here, and the compiler finds every match that
//! needs updating. Priority is decided once, when the draft is built, and
//! baked into the stored row — later changes to the underlying deadline or
//! event never update an already-created notification.

use serde::Serialize;
use serde_json::Value;

/// Delivery priority, stored as text on the row and immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

/// The closed set of notification types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    AssignmentDueSoon,
    StudySessionStarting,
    AchievementUnlocked,
    NewMessage,
    CourseUpdate,
}

impl NotificationKind {
    /// Stored in the `kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::AssignmentDueSoon => "assignment_due_soon",
            NotificationKind::StudySessionStarting => "study_session_starting",
            NotificationKind::AchievementUnlocked => "achievement_unlocked",
            NotificationKind::NewMessage => "new_message",
            NotificationKind::CourseUpdate => "course_update",
        }
    }

    /// The specialized gateway event emitted alongside `new-notification`.
    pub fn event_name(&self) -> &'static str {
        match self {
            NotificationKind::AssignmentDueSoon => "assignment-due-soon",
            NotificationKind::StudySessionStarting => "study-session-starting",
            NotificationKind::AchievementUnlocked => "achievement-unlocked",
            NotificationKind::NewMessage => "new-message",
            NotificationKind::CourseUpdate => "course-update",
        }
    }
}

/// A notification ready to persist. Built only through the per-kind
/// constructors so each kind's priority rule cannot be bypassed.
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub action_url: Option<String>,
    pub metadata: Option<Value>,
}

impl NotificationDraft {
    /// An assignment deadline approaching. Priority scales with urgency:
    /// two hours or less is urgent, within a day is high, otherwise medium.
    pub fn assignment_due(
        user_id: &str,
        assignment_title: &str,
        course_name: &str,
        hours_remaining: i64,
    ) -> Self {
        let priority = if hours_remaining <= 2 {
            Priority::Urgent
        } else if hours_remaining <= 24 {
            Priority::High
        } else {
            Priority::Medium
        };

        Self {
            user_id: user_id.to_string(),
            kind: NotificationKind::AssignmentDueSoon,
            title: "Assignment due soon".to_string(),
            message: format!("\"{assignment_title}\" for {course_name} is due in {hours_remaining}h"),
            priority,
            action_url: Some("/assignments".to_string()),
            metadata: Some(serde_json::json!({
                "courseName": course_name,
                "hoursRemaining": hours_remaining,
            })),
        }
    }

    pub fn study_session_starting(user_id: &str, session_title: &str, starts_in_minutes: i64) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind: NotificationKind::StudySessionStarting,
            title: "Study session starting".to_string(),
            message: format!("\"{session_title}\" starts in {starts_in_minutes} minutes"),
            priority: Priority::High,
            action_url: Some("/sessions".to_string()),
            metadata: Some(serde_json::json!({ "startsInMinutes": starts_in_minutes })),
        }
    }

    pub fn achievement_unlocked(user_id: &str, achievement_name: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind: NotificationKind::AchievementUnlocked,
            title: "Achievement unlocked".to_string(),
            message: format!("You earned \"{achievement_name}\""),
            priority: Priority::Medium,
            action_url: Some("/achievements".to_string()),
            metadata: None,
        }
    }

    /// Fired by the messaging channel on every stored message. The preview
    /// is truncated so the notification row never mirrors full content.
    pub fn new_message(user_id: &str, sender_id: &str, content: &str) -> Self {
        let preview: String = content.chars().take(80).collect();
        Self {
            user_id: user_id.to_string(),
            kind: NotificationKind::NewMessage,
            title: "New message".to_string(),
            message: preview,
            priority: Priority::Medium,
            action_url: Some("/messages".to_string()),
            metadata: Some(serde_json::json!({ "senderId": sender_id })),
        }
    }

    pub fn course_update(user_id: &str, course_name: &str, summary: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind: NotificationKind::CourseUpdate,
            title: format!("{course_name} updated"),
            message: summary.to_string(),
            priority: Priority::Low,
            action_url: None,
            metadata: None,
        }
    }
}
