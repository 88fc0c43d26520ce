//! Ticket lifecycle engine - creation, updates, status transitions, audit.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::warn;

use super::numbering::{self, SequenceOverflow};
use super::sla;
use super::store::{StoreError, TicketStore};
use super::types::{
    ActivityType, NewActivity, NewTicket, Ticket, TicketActivity, TicketCategory, TicketChanges,
    TicketFilter, TicketPriority, TicketStatus,
};
use crate::classifier::Classification;
use crate::notify::{NotificationEvent, Notifier};

/// How often create() re-derives the sequence after losing a number race.
const NUMBER_ALLOCATION_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("ticket {0} not found")]
    NotFound(i32),
    #[error("ticket {0} not found")]
    NumberNotFound(String),
    #[error(transparent)]
    SequenceOverflow(#[from] SequenceOverflow),
    #[error("ticket number allocation kept colliding, retry the request")]
    NumberConflict,
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct CreateTicket {
    pub title: String,
    pub description: String,
    pub category: TicketCategory,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateTicket {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<TicketCategory>,
    pub priority: Option<TicketPriority>,
    pub status: Option<TicketStatus>,
    pub assigned_to_id: Option<i32>,
}

/// Orchestrates every ticket mutation: validates preconditions, derives the
/// column changes plus the audit entries documenting them, and hands both to
/// the store to apply atomically. Callers always pass the acting user; the
/// engine never substitutes one.
pub struct TicketEngine {
    store: Arc<dyn TicketStore>,
    notifier: Arc<dyn Notifier>,
}

impl TicketEngine {
    pub fn new(store: Arc<dyn TicketStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Create a ticket: allocate the year-scoped number, default the
    /// priority to medium, compute the SLA deadline, and record the
    /// `created` activity in the same unit of work.
    ///
    /// A lost race on the number's unique constraint is retried with a
    /// freshly derived sequence; sequence gaps are acceptable, reuse is not.
    pub fn create(&self, input: CreateTicket, creator: i32) -> Result<Ticket, EngineError> {
        let now = Utc::now();
        let year = now.year();
        let priority = TicketPriority::default();
        let policy = self.store.sla_policy(priority)?;
        let sla_deadline = sla::resolution_deadline(policy.as_ref(), now);

        for attempt in 1..=NUMBER_ALLOCATION_ATTEMPTS {
            let last = self.store.max_sequence_for_year(year)?;
            let sequence = numbering::next_sequence(last)?;
            let ticket_number = numbering::format_ticket_number(year, sequence);
            let ticket = NewTicket {
                ticket_number,
                user_id: creator,
                title: input.title.clone(),
                description: input.description.clone(),
                category: input.category,
                priority,
                status: TicketStatus::Open,
                sla_deadline,
                created_at: now,
                updated_at: now,
            };
            let activity = NewActivity {
                ticket_id: 0,
                user_id: Some(creator),
                activity_type: ActivityType::Created,
                description: format!("Ticket created: {}", ticket.title),
                old_value: None,
                new_value: None,
                created_at: now,
            };
            match self.store.create_ticket(ticket, activity) {
                Ok(created) => {
                    self.notifier.notify(
                        created.user_id,
                        &created.ticket_number,
                        NotificationEvent::Created,
                        &created.title,
                    );
                    return Ok(created);
                }
                Err(StoreError::DuplicateTicketNumber) => {
                    warn!(year, attempt, "ticket number collision, re-deriving sequence");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(EngineError::NumberConflict)
    }

    /// Apply the fields present in `update`, logging one `updated` activity
    /// per field whose value actually changed. Writing the same values back
    /// is a silent no-op. Setting status this way deliberately bypasses the
    /// transition side effects and SLA stays untouched even when priority
    /// changes; only creation and classification compute deadlines.
    pub fn update(&self, id: i32, update: UpdateTicket, actor: i32) -> Result<Ticket, EngineError> {
        let ticket = self.load(id)?;
        let now = Utc::now();
        let mut changes = TicketChanges::default();
        let mut activities = Vec::new();

        if let Some(title) = update.title {
            if title != ticket.title {
                activities.push(field_change(id, actor, "title", &ticket.title, &title, now));
                changes.title = Some(title);
            }
        }
        if let Some(description) = update.description {
            if description != ticket.description {
                activities.push(field_change(
                    id,
                    actor,
                    "description",
                    &ticket.description,
                    &description,
                    now,
                ));
                changes.description = Some(description);
            }
        }
        if let Some(category) = update.category {
            if category != ticket.category {
                activities.push(field_change(
                    id,
                    actor,
                    "category",
                    ticket.category.as_str(),
                    category.as_str(),
                    now,
                ));
                changes.category = Some(category);
            }
        }
        if let Some(priority) = update.priority {
            if priority != ticket.priority {
                activities.push(field_change(
                    id,
                    actor,
                    "priority",
                    ticket.priority.as_str(),
                    priority.as_str(),
                    now,
                ));
                changes.priority = Some(priority);
            }
        }
        if let Some(status) = update.status {
            if status != ticket.status {
                activities.push(field_change(
                    id,
                    actor,
                    "status",
                    ticket.status.as_str(),
                    status.as_str(),
                    now,
                ));
                changes.status = Some(status);
            }
        }
        if let Some(assignee) = update.assigned_to_id {
            if ticket.assigned_to_id != Some(assignee) {
                let old = ticket
                    .assigned_to_id
                    .map_or_else(|| "none".to_string(), |v| v.to_string());
                activities.push(field_change(
                    id,
                    actor,
                    "assigned_to_id",
                    &old,
                    &assignee.to_string(),
                    now,
                ));
                changes.assigned_to_id = Some(Some(assignee));
            }
        }

        if activities.is_empty() {
            return Ok(ticket);
        }
        changes.updated_at = Some(now);
        Ok(self.store.update_ticket(id, changes, activities)?)
    }

    /// Set the status and apply the transition's timestamp side effects.
    /// Always appends exactly one `status_changed` activity, including when
    /// the status is written back unchanged.
    pub fn change_status(
        &self,
        id: i32,
        status: TicketStatus,
        actor: i32,
    ) -> Result<Ticket, EngineError> {
        let ticket = self.load(id)?;
        let now = Utc::now();
        let mut changes = TicketChanges {
            status: Some(status),
            updated_at: Some(now),
            ..TicketChanges::default()
        };
        match status {
            TicketStatus::Resolved if ticket.resolved_at.is_none() => {
                changes.resolved_at = Some(Some(now));
            }
            TicketStatus::Closed => {
                changes.closed_at = Some(Some(now));
            }
            _ => {}
        }
        let activity = NewActivity {
            ticket_id: id,
            user_id: Some(actor),
            activity_type: ActivityType::StatusChanged,
            description: format!("Status changed from {} to {}", ticket.status, status),
            old_value: Some(ticket.status.to_string()),
            new_value: Some(status.to_string()),
            created_at: now,
        };
        let updated = self.store.update_ticket(id, changes, vec![activity])?;
        self.notifier.notify(
            updated.user_id,
            &updated.ticket_number,
            NotificationEvent::StatusChanged,
            status.as_str(),
        );
        Ok(updated)
    }

    /// Hand the ticket to a staff member. An open ticket moves to
    /// in_progress; any other status stays as it is.
    pub fn assign(&self, id: i32, assignee: i32, actor: i32) -> Result<Ticket, EngineError> {
        let ticket = self.load(id)?;
        let now = Utc::now();
        let mut changes = TicketChanges {
            assigned_to_id: Some(Some(assignee)),
            updated_at: Some(now),
            ..TicketChanges::default()
        };
        if ticket.status == TicketStatus::Open {
            changes.status = Some(TicketStatus::InProgress);
        }
        let activity = NewActivity {
            ticket_id: id,
            user_id: Some(actor),
            activity_type: ActivityType::Assigned,
            description: format!("Ticket assigned to user {assignee}"),
            old_value: ticket.assigned_to_id.map(|v| v.to_string()),
            new_value: Some(assignee.to_string()),
            created_at: now,
        };
        let updated = self.store.update_ticket(id, changes, vec![activity])?;
        self.notifier.notify(
            assignee,
            &updated.ticket_number,
            NotificationEvent::Assigned,
            &updated.title,
        );
        Ok(updated)
    }

    /// Comments live in the activity log only; the ticket row is untouched.
    pub fn add_comment(
        &self,
        id: i32,
        comment: String,
        actor: i32,
    ) -> Result<TicketActivity, EngineError> {
        let ticket = self.load(id)?;
        let activity = NewActivity {
            ticket_id: id,
            user_id: Some(actor),
            activity_type: ActivityType::Comment,
            description: comment,
            old_value: None,
            new_value: None,
            created_at: Utc::now(),
        };
        let saved = self.store.append_activity(activity)?;
        self.notifier.notify(
            ticket.user_id,
            &ticket.ticket_number,
            NotificationEvent::CommentAdded,
            &saved.description,
        );
        Ok(saved)
    }

    /// Soft delete: the ticket is cancelled, the row and its audit trail
    /// stay.
    pub fn cancel(&self, id: i32) -> Result<Ticket, EngineError> {
        self.load(id)?;
        let changes = TicketChanges {
            status: Some(TicketStatus::Cancelled),
            updated_at: Some(Utc::now()),
            ..TicketChanges::default()
        };
        Ok(self.store.update_ticket(id, changes, Vec::new())?)
    }

    /// Merge an external classification result. Category and priority are
    /// overwritten unconditionally (last writer wins), the derived label and
    /// confidence are stored, and the SLA deadline is recomputed from the
    /// new priority. The merge is recorded as a system-authored
    /// `priority_changed` activity so the audit trail stays complete.
    pub fn apply_classification(
        &self,
        id: i32,
        classification: &Classification,
    ) -> Result<Ticket, EngineError> {
        let ticket = self.load(id)?;
        let now = Utc::now();
        let policy = self.store.sla_policy(classification.priority)?;
        let label = format!("{}_{}", classification.category, classification.priority);
        let changes = TicketChanges {
            category: Some(classification.category),
            priority: Some(classification.priority),
            ai_classification: Some(label.clone()),
            ai_confidence: Some(classification.confidence),
            sla_deadline: Some(sla::resolution_deadline(policy.as_ref(), now)),
            updated_at: Some(now),
            ..TicketChanges::default()
        };
        let activity = NewActivity {
            ticket_id: id,
            user_id: None,
            activity_type: ActivityType::PriorityChanged,
            description: format!("AI classification applied: {label}"),
            old_value: Some(ticket.priority.to_string()),
            new_value: Some(classification.priority.to_string()),
            created_at: now,
        };
        Ok(self.store.update_ticket(id, changes, vec![activity])?)
    }

    pub fn ticket(&self, id: i32) -> Result<Ticket, EngineError> {
        self.load(id)
    }

    pub fn ticket_by_number(&self, number: &str) -> Result<Ticket, EngineError> {
        self.store
            .ticket_by_number(number)?
            .ok_or_else(|| EngineError::NumberNotFound(number.to_string()))
    }

    pub fn list(&self, filter: &TicketFilter) -> Result<(Vec<Ticket>, i64), EngineError> {
        Ok(self.store.list_tickets(filter)?)
    }

    /// Audit trail, newest first. `limit` caps the page; ordering is fixed.
    pub fn activities(
        &self,
        id: i32,
        limit: Option<i64>,
    ) -> Result<Vec<TicketActivity>, EngineError> {
        self.load(id)?;
        Ok(self.store.activities(id, limit)?)
    }

    fn load(&self, id: i32) -> Result<Ticket, EngineError> {
        self.store.ticket(id)?.ok_or(EngineError::NotFound(id))
    }
}

fn field_change(
    ticket_id: i32,
    actor: i32,
    field: &str,
    old: &str,
    new: &str,
    now: DateTime<Utc>,
) -> NewActivity {
    NewActivity {
        ticket_id,
        user_id: Some(actor),
        activity_type: ActivityType::Updated,
        description: format!("Updated {field}"),
        old_value: Some(old.to_string()),
        new_value: Some(new.to_string()),
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;
    use crate::tickets::store::MemoryTicketStore;
    use chrono::Duration;
    use std::sync::Mutex;

    fn harness() -> (Arc<MemoryTicketStore>, TicketEngine) {
        let store = Arc::new(MemoryTicketStore::new());
        store.add_policy(TicketPriority::Low, 24, 72);
        store.add_policy(TicketPriority::Medium, 8, 24);
        store.add_policy(TicketPriority::High, 4, 8);
        store.add_policy(TicketPriority::Urgent, 1, 4);
        let engine = TicketEngine::new(store.clone(), Arc::new(LogNotifier));
        (store, engine)
    }

    fn printer_jam() -> CreateTicket {
        CreateTicket {
            title: "Printer jam".to_string(),
            description: "Paper stuck in tray 2".to_string(),
            category: TicketCategory::Printer,
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        events: Mutex<Vec<(i32, NotificationEvent)>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(
            &self,
            recipient: i32,
            _ticket_number: &str,
            event: NotificationEvent,
            _details: &str,
        ) {
            self.events.lock().unwrap().push((recipient, event));
        }
    }

    #[test]
    fn create_defaults_and_logs_creation() {
        let (_, engine) = harness();
        let ticket = engine.create(printer_jam(), 1).unwrap();

        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.priority, TicketPriority::Medium);
        assert_eq!(ticket.category, TicketCategory::Printer);
        let year = numbering::current_year();
        assert_eq!(ticket.ticket_number, format!("TKT-{year}-0001"));
        assert_eq!(
            ticket.sla_deadline,
            Some(ticket.created_at + Duration::hours(24))
        );

        let activities = engine.activities(ticket.id, None).unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].activity_type, ActivityType::Created);
        assert_eq!(activities[0].description, "Ticket created: Printer jam");
        assert_eq!(activities[0].user_id, Some(1));
    }

    #[test]
    fn create_without_policy_has_no_deadline() {
        let store = Arc::new(MemoryTicketStore::new());
        let engine = TicketEngine::new(store, Arc::new(LogNotifier));
        let ticket = engine.create(printer_jam(), 1).unwrap();
        assert_eq!(ticket.sla_deadline, None);
    }

    #[test]
    fn sequential_numbers_are_distinct_and_dense() {
        let (_, engine) = harness();
        let numbers: Vec<String> = (0..3)
            .map(|_| engine.create(printer_jam(), 1).unwrap().ticket_number)
            .collect();
        let year = numbering::current_year();
        assert_eq!(
            numbers,
            vec![
                format!("TKT-{year}-0001"),
                format!("TKT-{year}-0002"),
                format!("TKT-{year}-0003"),
            ]
        );
    }

    #[test]
    fn number_collision_is_retried() {
        let (store, engine) = harness();
        store.queue_number_conflicts(1);
        let ticket = engine.create(printer_jam(), 1).unwrap();
        assert_eq!(numbering::sequence_of(&ticket.ticket_number), Some(1));
    }

    #[test]
    fn collision_retries_are_bounded() {
        let (store, engine) = harness();
        store.queue_number_conflicts(NUMBER_ALLOCATION_ATTEMPTS as usize);
        let err = engine.create(printer_jam(), 1).unwrap_err();
        assert!(matches!(err, EngineError::NumberConflict));
    }

    #[test]
    fn exhausted_year_sequence_is_an_explicit_error() {
        let (store, engine) = harness();
        let year = numbering::current_year();
        let now = Utc::now();
        store
            .create_ticket(
                NewTicket {
                    ticket_number: numbering::format_ticket_number(year, numbering::MAX_SEQUENCE),
                    user_id: 1,
                    title: "last of the year".to_string(),
                    description: "sequence is full".to_string(),
                    category: TicketCategory::Other,
                    priority: TicketPriority::Medium,
                    status: TicketStatus::Open,
                    sla_deadline: None,
                    created_at: now,
                    updated_at: now,
                },
                NewActivity {
                    ticket_id: 0,
                    user_id: Some(1),
                    activity_type: ActivityType::Created,
                    description: "Ticket created: last of the year".to_string(),
                    old_value: None,
                    new_value: None,
                    created_at: now,
                },
            )
            .unwrap();

        let err = engine.create(printer_jam(), 1).unwrap_err();
        assert!(matches!(err, EngineError::SequenceOverflow(_)));
    }

    #[test]
    fn update_logs_each_changed_field() {
        let (_, engine) = harness();
        let ticket = engine.create(printer_jam(), 1).unwrap();
        let deadline = ticket.sla_deadline;

        let updated = engine
            .update(
                ticket.id,
                UpdateTicket {
                    priority: Some(TicketPriority::High),
                    ..UpdateTicket::default()
                },
                2,
            )
            .unwrap();

        assert_eq!(updated.priority, TicketPriority::High);
        // update() never recomputes the deadline, even for priority.
        assert_eq!(updated.sla_deadline, deadline);

        let activities = engine.activities(ticket.id, None).unwrap();
        let changes: Vec<_> = activities
            .iter()
            .filter(|a| a.activity_type == ActivityType::Updated)
            .collect();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].description, "Updated priority");
        assert_eq!(changes[0].old_value.as_deref(), Some("medium"));
        assert_eq!(changes[0].new_value.as_deref(), Some("high"));
    }

    #[test]
    fn update_with_identical_values_is_silent() {
        let (_, engine) = harness();
        let ticket = engine.create(printer_jam(), 1).unwrap();

        let updated = engine
            .update(
                ticket.id,
                UpdateTicket {
                    title: Some(ticket.title.clone()),
                    priority: Some(TicketPriority::Medium),
                    ..UpdateTicket::default()
                },
                1,
            )
            .unwrap();

        assert_eq!(updated.updated_at, ticket.updated_at);
        assert_eq!(engine.activities(ticket.id, None).unwrap().len(), 1);
    }

    #[test]
    fn update_bypasses_transition_side_effects() {
        let (_, engine) = harness();
        let ticket = engine.create(printer_jam(), 1).unwrap();

        let updated = engine
            .update(
                ticket.id,
                UpdateTicket {
                    status: Some(TicketStatus::Resolved),
                    ..UpdateTicket::default()
                },
                1,
            )
            .unwrap();

        assert_eq!(updated.status, TicketStatus::Resolved);
        assert_eq!(updated.resolved_at, None);
    }

    #[test]
    fn change_status_always_logs_even_without_transition() {
        let (_, engine) = harness();
        let ticket = engine.create(printer_jam(), 1).unwrap();

        engine
            .change_status(ticket.id, TicketStatus::Open, 2)
            .unwrap();

        let activities = engine.activities(ticket.id, None).unwrap();
        let status_changes: Vec<_> = activities
            .iter()
            .filter(|a| a.activity_type == ActivityType::StatusChanged)
            .collect();
        assert_eq!(status_changes.len(), 1);
        assert_eq!(status_changes[0].old_value.as_deref(), Some("open"));
        assert_eq!(status_changes[0].new_value.as_deref(), Some("open"));
    }

    #[test]
    fn resolved_at_is_written_exactly_once() {
        let (_, engine) = harness();
        let ticket = engine.create(printer_jam(), 1).unwrap();

        let resolved = engine
            .change_status(ticket.id, TicketStatus::Resolved, 2)
            .unwrap();
        let first = resolved.resolved_at;
        assert!(first.is_some());

        engine
            .change_status(ticket.id, TicketStatus::InProgress, 2)
            .unwrap();
        let resolved_again = engine
            .change_status(ticket.id, TicketStatus::Resolved, 2)
            .unwrap();
        assert_eq!(resolved_again.resolved_at, first);
    }

    #[test]
    fn closing_sets_closed_at() {
        let (_, engine) = harness();
        let ticket = engine.create(printer_jam(), 1).unwrap();
        let closed = engine
            .change_status(ticket.id, TicketStatus::Closed, 2)
            .unwrap();
        assert!(closed.closed_at.is_some());
        assert_eq!(closed.status, TicketStatus::Closed);
    }

    #[test]
    fn assigning_an_open_ticket_starts_progress() {
        let (_, engine) = harness();
        let ticket = engine.create(printer_jam(), 1).unwrap();

        let assigned = engine.assign(ticket.id, 7, 2).unwrap();
        assert_eq!(assigned.status, TicketStatus::InProgress);
        assert_eq!(assigned.assigned_to_id, Some(7));

        let activities = engine.activities(ticket.id, None).unwrap();
        let assignments: Vec<_> = activities
            .iter()
            .filter(|a| a.activity_type == ActivityType::Assigned)
            .collect();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].new_value.as_deref(), Some("7"));
    }

    #[test]
    fn assigning_a_resolved_ticket_keeps_its_status() {
        let (_, engine) = harness();
        let ticket = engine.create(printer_jam(), 1).unwrap();
        engine
            .change_status(ticket.id, TicketStatus::Resolved, 2)
            .unwrap();

        let assigned = engine.assign(ticket.id, 7, 2).unwrap();
        assert_eq!(assigned.status, TicketStatus::Resolved);
        assert_eq!(assigned.assigned_to_id, Some(7));
    }

    #[test]
    fn comments_never_touch_the_ticket_row() {
        let (_, engine) = harness();
        let ticket = engine.create(printer_jam(), 1).unwrap();

        let comment = engine
            .add_comment(ticket.id, "Tried turning it off and on".to_string(), 2)
            .unwrap();
        assert_eq!(comment.activity_type, ActivityType::Comment);
        assert_eq!(comment.description, "Tried turning it off and on");

        let after = engine.ticket(ticket.id).unwrap();
        assert_eq!(after.updated_at, ticket.updated_at);
    }

    #[test]
    fn cancel_is_a_soft_delete() {
        let (_, engine) = harness();
        let ticket = engine.create(printer_jam(), 1).unwrap();
        engine.add_comment(ticket.id, "note".to_string(), 1).unwrap();

        let cancelled = engine.cancel(ticket.id).unwrap();
        assert_eq!(cancelled.status, TicketStatus::Cancelled);
        // Row and audit trail both survive.
        assert!(engine.ticket(ticket.id).is_ok());
        assert_eq!(engine.activities(ticket.id, None).unwrap().len(), 2);
    }

    #[test]
    fn classification_overwrites_and_recomputes_sla() {
        let (_, engine) = harness();
        let ticket = engine.create(printer_jam(), 1).unwrap();

        let merged = engine
            .apply_classification(
                ticket.id,
                &Classification {
                    category: TicketCategory::Hardware,
                    priority: TicketPriority::High,
                    confidence: 0.9,
                },
            )
            .unwrap();

        assert_eq!(merged.category, TicketCategory::Hardware);
        assert_eq!(merged.priority, TicketPriority::High);
        assert_eq!(merged.ai_classification.as_deref(), Some("hardware_high"));
        assert_eq!(merged.ai_confidence, Some(0.9));
        assert_eq!(
            merged.sla_deadline,
            Some(merged.updated_at + Duration::hours(8))
        );

        let activities = engine.activities(ticket.id, None).unwrap();
        let reclassified: Vec<_> = activities
            .iter()
            .filter(|a| a.activity_type == ActivityType::PriorityChanged)
            .collect();
        assert_eq!(reclassified.len(), 1);
        assert_eq!(reclassified[0].user_id, None);
        assert_eq!(reclassified[0].old_value.as_deref(), Some("medium"));
        assert_eq!(reclassified[0].new_value.as_deref(), Some("high"));
    }

    #[test]
    fn missing_tickets_are_not_found() {
        let (_, engine) = harness();
        assert!(matches!(
            engine.ticket(99).unwrap_err(),
            EngineError::NotFound(99)
        ));
        assert!(matches!(
            engine.change_status(99, TicketStatus::Closed, 1).unwrap_err(),
            EngineError::NotFound(99)
        ));
        assert!(matches!(
            engine.assign(99, 7, 1).unwrap_err(),
            EngineError::NotFound(99)
        ));
        assert!(matches!(
            engine.add_comment(99, "hello".to_string(), 1).unwrap_err(),
            EngineError::NotFound(99)
        ));
        assert!(matches!(
            engine.cancel(99).unwrap_err(),
            EngineError::NotFound(99)
        ));
        assert!(matches!(
            engine.ticket_by_number("TKT-2025-0099").unwrap_err(),
            EngineError::NumberNotFound(_)
        ));
    }

    #[test]
    fn activities_come_back_newest_first_with_limit() {
        let (_, engine) = harness();
        let ticket = engine.create(printer_jam(), 1).unwrap();
        engine.add_comment(ticket.id, "first".to_string(), 1).unwrap();
        engine.add_comment(ticket.id, "second".to_string(), 1).unwrap();

        let all = engine.activities(ticket.id, None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].description, "second");
        assert_eq!(all[2].activity_type, ActivityType::Created);

        let page = engine.activities(ticket.id, Some(1)).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].description, "second");
    }

    #[test]
    fn lifecycle_events_reach_the_notifier() {
        let store = Arc::new(MemoryTicketStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = TicketEngine::new(store, notifier.clone());

        let ticket = engine.create(printer_jam(), 1).unwrap();
        engine.assign(ticket.id, 7, 2).unwrap();
        engine
            .change_status(ticket.id, TicketStatus::Resolved, 7)
            .unwrap();

        let events = notifier.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                (1, NotificationEvent::Created),
                (7, NotificationEvent::Assigned),
                (1, NotificationEvent::StatusChanged),
            ]
        );
    }
}
