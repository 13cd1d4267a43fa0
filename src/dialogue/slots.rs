//! Question slot definitions for the task-creation dialogue.
//!
//! The slot sequence is fixed at engine configuration time; the default
//! flow collects title, description, priority, category, and due date.

use std::sync::Arc;

/// Which task-draft field a slot fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotField {
    /// Task title (required).
    Title,
    /// Free-text description.
    Description,
    /// Task priority.
    Priority,
    /// Category label.
    Category,
    /// Due date.
    DueDate,
}

/// How a slot interprets an answer.
#[derive(Clone)]
pub enum SlotKind {
    /// Store the normalized answer verbatim.
    FreeText,
    /// Resolve to the first option that appears as a substring of the
    /// answer; fall back to `fallback` when none match.
    Enumerated {
        /// Recognized option names.
        options: Vec<String>,
        /// Option used when no option matches the answer.
        fallback: String,
    },
    /// Resolve the answer with the date phrase grammar; unresolvable
    /// phrases leave the field unset.
    Date,
}

/// Optional answer validator; a rejected answer re-asks the slot.
pub type SlotValidator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// One question in the slot-filling flow.
#[derive(Clone)]
pub struct QuestionSlot {
    /// Stable identifier, used in logs.
    pub id: &'static str,
    /// Which draft field this slot fills.
    pub field: SlotField,
    /// Spoken question.
    pub prompt: String,
    /// Spoken corrective question when a required slot is skipped or an
    /// answer fails validation.
    pub reject_prompt: String,
    /// Spoken acknowledgement prefix; the stored value is appended.
    pub ack_template: String,
    /// Answer interpretation.
    pub kind: SlotKind,
    /// Required slots cannot be skipped.
    pub required: bool,
    /// Optional extra validation on the normalized answer.
    pub validator: Option<SlotValidator>,
}

/// The default task-creation slot sequence.
#[must_use]
pub fn default_task_slots() -> Vec<QuestionSlot> {
    vec![
        QuestionSlot {
            id: "title",
            field: SlotField::Title,
            prompt: "what should the task be called?".to_owned(),
            reject_prompt: "the task needs a name. what should it be called?".to_owned(),
            ack_template: "got it, the task is".to_owned(),
            kind: SlotKind::FreeText,
            required: true,
            validator: None,
        },
        QuestionSlot {
            id: "description",
            field: SlotField::Description,
            prompt: "any description? say skip if not".to_owned(),
            reject_prompt: "please describe the task, or say skip".to_owned(),
            ack_template: "noted".to_owned(),
            kind: SlotKind::FreeText,
            required: false,
            validator: None,
        },
        QuestionSlot {
            id: "priority",
            field: SlotField::Priority,
            prompt: "what priority: low, medium, or high?".to_owned(),
            reject_prompt: "please say low, medium, or high".to_owned(),
            ack_template: "priority set to".to_owned(),
            kind: SlotKind::Enumerated {
                options: vec!["low".to_owned(), "medium".to_owned(), "high".to_owned()],
                fallback: "medium".to_owned(),
            },
            required: false,
            validator: None,
        },
        QuestionSlot {
            id: "category",
            field: SlotField::Category,
            prompt: "which category? say skip if none".to_owned(),
            reject_prompt: "which category should I file it under, or say skip".to_owned(),
            ack_template: "filed under".to_owned(),
            kind: SlotKind::FreeText,
            required: false,
            validator: None,
        },
        QuestionSlot {
            id: "due_date",
            field: SlotField::DueDate,
            prompt: "when is it due? you can say tomorrow, a weekday, or skip".to_owned(),
            reject_prompt: "when is it due? for example tomorrow or friday".to_owned(),
            ack_template: "due".to_owned(),
            kind: SlotKind::Date,
            required: false,
            validator: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn default_flow_starts_with_required_title() {
        let slots = default_task_slots();
        assert_eq!(slots[0].field, SlotField::Title);
        assert!(slots[0].required);
        assert!(slots.iter().skip(1).all(|s| !s.required));
    }

    #[test]
    fn default_flow_covers_all_draft_fields_once() {
        let slots = default_task_slots();
        let fields: Vec<SlotField> = slots.iter().map(|s| s.field).collect();
        assert_eq!(
            fields,
            vec![
                SlotField::Title,
                SlotField::Description,
                SlotField::Priority,
                SlotField::Category,
                SlotField::DueDate,
            ]
        );
    }

    #[test]
    fn priority_slot_falls_back_to_medium() {
        let slots = default_task_slots();
        let priority = slots.iter().find(|s| s.id == "priority").unwrap();
        match &priority.kind {
            SlotKind::Enumerated { fallback, options } => {
                assert_eq!(fallback, "medium");
                assert_eq!(options.len(), 3);
            }
            _ => panic!("priority slot should be enumerated"),
        }
    }
}
