//! Storage seam for tickets, activities and SLA policies.
//!
//! The engine talks to a `TicketStore` and never to Diesel directly. Each
//! mutating method is atomic: the ticket write and the activity rows that
//! document it land in one transaction or not at all.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::result::DatabaseErrorKind;

use super::numbering;
use super::types::{
    NewActivity, NewTicket, SlaPolicy, Ticket, TicketActivity, TicketChanges, TicketFilter,
    TicketPriority,
};
use crate::shared::schema::{sla_policies, ticket_activities, tickets};
use crate::shared::utils::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The `ticket_number` unique constraint fired; the caller may re-derive
    /// the sequence and retry.
    #[error("duplicate ticket number")]
    DuplicateTicketNumber,
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

/// Persistence contract for the lifecycle engine.
///
/// `create_ticket` and `update_ticket` take the activity rows belonging to
/// the mutation and apply the pair atomically. The created activity's
/// `ticket_id` is filled in from the inserted row. `update_ticket` expects a
/// non-empty changeset; the engine short-circuits no-op updates before
/// reaching the store.
pub trait TicketStore: Send + Sync {
    /// Highest allocated sequence among this year's ticket numbers.
    fn max_sequence_for_year(&self, year: i32) -> Result<Option<u32>, StoreError>;

    fn create_ticket(&self, ticket: NewTicket, activity: NewActivity)
        -> Result<Ticket, StoreError>;

    fn ticket(&self, id: i32) -> Result<Option<Ticket>, StoreError>;

    fn ticket_by_number(&self, number: &str) -> Result<Option<Ticket>, StoreError>;

    fn list_tickets(&self, filter: &TicketFilter) -> Result<(Vec<Ticket>, i64), StoreError>;

    fn update_ticket(
        &self,
        id: i32,
        changes: TicketChanges,
        activities: Vec<NewActivity>,
    ) -> Result<Ticket, StoreError>;

    fn append_activity(&self, activity: NewActivity) -> Result<TicketActivity, StoreError>;

    /// Activities for a ticket, newest first.
    fn activities(
        &self,
        ticket_id: i32,
        limit: Option<i64>,
    ) -> Result<Vec<TicketActivity>, StoreError>;

    fn sla_policy(&self, priority: TicketPriority) -> Result<Option<SlaPolicy>, StoreError>;
}

pub struct DieselTicketStore {
    pool: DbPool,
}

impl DieselTicketStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>, StoreError> {
        self.pool.get().map_err(|e| StoreError::Pool(e.to_string()))
    }

    fn filtered(filter: &TicketFilter) -> tickets::BoxedQuery<'static, Pg> {
        let mut query = tickets::table.into_boxed();
        if let Some(status) = filter.status {
            query = query.filter(tickets::status.eq(status));
        }
        if let Some(priority) = filter.priority {
            query = query.filter(tickets::priority.eq(priority));
        }
        if let Some(category) = filter.category {
            query = query.filter(tickets::category.eq(category));
        }
        if let Some(user_id) = filter.user_id {
            query = query.filter(tickets::user_id.eq(user_id));
        }
        if let Some(assignee) = filter.assigned_to_id {
            query = query.filter(tickets::assigned_to_id.eq(assignee));
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{search}%");
            query = query.filter(
                tickets::title
                    .ilike(pattern.clone())
                    .or(tickets::description.ilike(pattern.clone()))
                    .or(tickets::ticket_number.ilike(pattern)),
            );
        }
        query
    }
}

impl TicketStore for DieselTicketStore {
    fn max_sequence_for_year(&self, year: i32) -> Result<Option<u32>, StoreError> {
        let mut conn = self.conn()?;
        let pattern = format!("{}%", numbering::year_prefix(year));
        let last: Option<String> = tickets::table
            .filter(tickets::ticket_number.like(pattern))
            .select(tickets::ticket_number)
            .order(tickets::ticket_number.desc())
            .first(&mut conn)
            .optional()?;
        Ok(last.as_deref().and_then(numbering::sequence_of))
    }

    fn create_ticket(
        &self,
        ticket: NewTicket,
        mut activity: NewActivity,
    ) -> Result<Ticket, StoreError> {
        let mut conn = self.conn()?;
        conn.transaction(|conn| {
            let created: Ticket = diesel::insert_into(tickets::table)
                .values(&ticket)
                .get_result(conn)?;
            activity.ticket_id = created.id;
            diesel::insert_into(ticket_activities::table)
                .values(&activity)
                .execute(conn)?;
            Ok(created)
        })
        .map_err(|e| match e {
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                StoreError::DuplicateTicketNumber
            }
            other => StoreError::Database(other),
        })
    }

    fn ticket(&self, id: i32) -> Result<Option<Ticket>, StoreError> {
        let mut conn = self.conn()?;
        Ok(tickets::table.find(id).first(&mut conn).optional()?)
    }

    fn ticket_by_number(&self, number: &str) -> Result<Option<Ticket>, StoreError> {
        let mut conn = self.conn()?;
        Ok(tickets::table
            .filter(tickets::ticket_number.eq(number))
            .first(&mut conn)
            .optional()?)
    }

    fn list_tickets(&self, filter: &TicketFilter) -> Result<(Vec<Ticket>, i64), StoreError> {
        let mut conn = self.conn()?;
        let total: i64 = Self::filtered(filter).count().get_result(&mut conn)?;
        let rows: Vec<Ticket> = Self::filtered(filter)
            .order(tickets::created_at.desc())
            .offset(filter.offset)
            .limit(filter.limit)
            .load(&mut conn)?;
        Ok((rows, total))
    }

    fn update_ticket(
        &self,
        id: i32,
        changes: TicketChanges,
        activities: Vec<NewActivity>,
    ) -> Result<Ticket, StoreError> {
        debug_assert!(!changes.is_empty(), "update_ticket needs a non-empty changeset");
        let mut conn = self.conn()?;
        let updated = conn.transaction(|conn| {
            let updated: Ticket = diesel::update(tickets::table.find(id))
                .set(&changes)
                .get_result(conn)?;
            for activity in &activities {
                diesel::insert_into(ticket_activities::table)
                    .values(activity)
                    .execute(conn)?;
            }
            Ok::<_, diesel::result::Error>(updated)
        })?;
        Ok(updated)
    }

    fn append_activity(&self, activity: NewActivity) -> Result<TicketActivity, StoreError> {
        let mut conn = self.conn()?;
        Ok(diesel::insert_into(ticket_activities::table)
            .values(&activity)
            .get_result(&mut conn)?)
    }

    fn activities(
        &self,
        ticket_id: i32,
        limit: Option<i64>,
    ) -> Result<Vec<TicketActivity>, StoreError> {
        let mut conn = self.conn()?;
        let mut query = ticket_activities::table
            .filter(ticket_activities::ticket_id.eq(ticket_id))
            .order(ticket_activities::created_at.desc())
            .into_boxed();
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        Ok(query.load(&mut conn)?)
    }

    fn sla_policy(&self, priority: TicketPriority) -> Result<Option<SlaPolicy>, StoreError> {
        let mut conn = self.conn()?;
        Ok(sla_policies::table
            .filter(sla_policies::priority.eq(priority))
            .first(&mut conn)
            .optional()?)
    }
}

/// In-process store backing the engine test-suite. Mirrors the database
/// semantics the engine relies on: unique ticket numbers, atomic
/// mutation+activity pairs, newest-first activity listing.
#[derive(Default)]
pub struct MemoryTicketStore {
    inner: Mutex<MemoryInner>,
    queued_conflicts: AtomicUsize,
}

#[derive(Default)]
struct MemoryInner {
    tickets: Vec<Ticket>,
    activities: Vec<TicketActivity>,
    policies: Vec<SlaPolicy>,
    next_ticket_id: i32,
    next_activity_id: i32,
    next_policy_id: i32,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_policy(
        &self,
        priority: TicketPriority,
        response_time_hours: i32,
        resolution_time_hours: i32,
    ) {
        let mut inner = self.lock();
        inner.next_policy_id += 1;
        let id = inner.next_policy_id;
        inner.policies.push(SlaPolicy {
            id,
            priority,
            response_time_hours,
            resolution_time_hours,
            description: None,
        });
    }

    /// Make the next `count` inserts fail with a duplicate-number conflict,
    /// simulating a concurrent creation winning the race.
    pub fn queue_number_conflicts(&self, count: usize) {
        self.queued_conflicts.store(count, Ordering::SeqCst);
    }

    fn matches(ticket: &Ticket, filter: &TicketFilter) -> bool {
        if filter.status.is_some_and(|s| ticket.status != s) {
            return false;
        }
        if filter.priority.is_some_and(|p| ticket.priority != p) {
            return false;
        }
        if filter.category.is_some_and(|c| ticket.category != c) {
            return false;
        }
        if filter.user_id.is_some_and(|u| ticket.user_id != u) {
            return false;
        }
        if filter
            .assigned_to_id
            .is_some_and(|a| ticket.assigned_to_id != Some(a))
        {
            return false;
        }
        if let Some(search) = &filter.search {
            let needle = search.to_lowercase();
            let hit = ticket.title.to_lowercase().contains(&needle)
                || ticket.description.to_lowercase().contains(&needle)
                || ticket.ticket_number.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        true
    }

    fn apply_changes(ticket: &mut Ticket, changes: &TicketChanges) {
        if let Some(v) = &changes.title {
            ticket.title = v.clone();
        }
        if let Some(v) = &changes.description {
            ticket.description = v.clone();
        }
        if let Some(v) = changes.category {
            ticket.category = v;
        }
        if let Some(v) = changes.priority {
            ticket.priority = v;
        }
        if let Some(v) = changes.status {
            ticket.status = v;
        }
        if let Some(v) = changes.assigned_to_id {
            ticket.assigned_to_id = v;
        }
        if let Some(v) = &changes.ai_classification {
            ticket.ai_classification = Some(v.clone());
        }
        if let Some(v) = changes.ai_confidence {
            ticket.ai_confidence = Some(v);
        }
        if let Some(v) = changes.sla_deadline {
            ticket.sla_deadline = v;
        }
        if let Some(v) = changes.resolved_at {
            ticket.resolved_at = v;
        }
        if let Some(v) = changes.closed_at {
            ticket.closed_at = v;
        }
        if let Some(v) = changes.updated_at {
            ticket.updated_at = v;
        }
    }
}

impl TicketStore for MemoryTicketStore {
    fn max_sequence_for_year(&self, year: i32) -> Result<Option<u32>, StoreError> {
        let prefix = numbering::year_prefix(year);
        let inner = self.lock();
        Ok(inner
            .tickets
            .iter()
            .filter(|t| t.ticket_number.starts_with(&prefix))
            .filter_map(|t| numbering::sequence_of(&t.ticket_number))
            .max())
    }

    fn create_ticket(
        &self,
        ticket: NewTicket,
        mut activity: NewActivity,
    ) -> Result<Ticket, StoreError> {
        if self
            .queued_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::DuplicateTicketNumber);
        }
        let mut inner = self.lock();
        if inner
            .tickets
            .iter()
            .any(|t| t.ticket_number == ticket.ticket_number)
        {
            return Err(StoreError::DuplicateTicketNumber);
        }
        inner.next_ticket_id += 1;
        let id = inner.next_ticket_id;
        let created = Ticket {
            id,
            ticket_number: ticket.ticket_number,
            user_id: ticket.user_id,
            assigned_to_id: None,
            title: ticket.title,
            description: ticket.description,
            category: ticket.category,
            priority: ticket.priority,
            status: ticket.status,
            ai_classification: None,
            ai_confidence: None,
            sla_deadline: ticket.sla_deadline,
            resolved_at: None,
            closed_at: None,
            created_at: ticket.created_at,
            updated_at: ticket.updated_at,
        };
        inner.tickets.push(created.clone());
        activity.ticket_id = id;
        inner.next_activity_id += 1;
        let activity_id = inner.next_activity_id;
        inner.activities.push(TicketActivity {
            id: activity_id,
            ticket_id: activity.ticket_id,
            user_id: activity.user_id,
            activity_type: activity.activity_type,
            description: activity.description,
            old_value: activity.old_value,
            new_value: activity.new_value,
            created_at: activity.created_at,
        });
        Ok(created)
    }

    fn ticket(&self, id: i32) -> Result<Option<Ticket>, StoreError> {
        Ok(self.lock().tickets.iter().find(|t| t.id == id).cloned())
    }

    fn ticket_by_number(&self, number: &str) -> Result<Option<Ticket>, StoreError> {
        Ok(self
            .lock()
            .tickets
            .iter()
            .find(|t| t.ticket_number == number)
            .cloned())
    }

    fn list_tickets(&self, filter: &TicketFilter) -> Result<(Vec<Ticket>, i64), StoreError> {
        let inner = self.lock();
        let mut rows: Vec<Ticket> = inner
            .tickets
            .iter()
            .filter(|t| Self::matches(t, filter))
            .cloned()
            .collect();
        let total = rows.len() as i64;
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let rows = rows
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();
        Ok((rows, total))
    }

    fn update_ticket(
        &self,
        id: i32,
        changes: TicketChanges,
        activities: Vec<NewActivity>,
    ) -> Result<Ticket, StoreError> {
        let mut inner = self.lock();
        let Some(index) = inner.tickets.iter().position(|t| t.id == id) else {
            return Err(StoreError::Database(diesel::result::Error::NotFound));
        };
        Self::apply_changes(&mut inner.tickets[index], &changes);
        let updated = inner.tickets[index].clone();
        for activity in activities {
            inner.next_activity_id += 1;
            let activity_id = inner.next_activity_id;
            inner.activities.push(TicketActivity {
                id: activity_id,
                ticket_id: activity.ticket_id,
                user_id: activity.user_id,
                activity_type: activity.activity_type,
                description: activity.description,
                old_value: activity.old_value,
                new_value: activity.new_value,
                created_at: activity.created_at,
            });
        }
        Ok(updated)
    }

    fn append_activity(&self, activity: NewActivity) -> Result<TicketActivity, StoreError> {
        let mut inner = self.lock();
        inner.next_activity_id += 1;
        let saved = TicketActivity {
            id: inner.next_activity_id,
            ticket_id: activity.ticket_id,
            user_id: activity.user_id,
            activity_type: activity.activity_type,
            description: activity.description,
            old_value: activity.old_value,
            new_value: activity.new_value,
            created_at: activity.created_at,
        };
        inner.activities.push(saved.clone());
        Ok(saved)
    }

    fn activities(
        &self,
        ticket_id: i32,
        limit: Option<i64>,
    ) -> Result<Vec<TicketActivity>, StoreError> {
        let inner = self.lock();
        let mut rows: Vec<TicketActivity> = inner
            .activities
            .iter()
            .filter(|a| a.ticket_id == ticket_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = limit {
            rows.truncate(limit.max(0) as usize);
        }
        Ok(rows)
    }

    fn sla_policy(&self, priority: TicketPriority) -> Result<Option<SlaPolicy>, StoreError> {
        Ok(self
            .lock()
            .policies
            .iter()
            .find(|p| p.priority == priority)
            .cloned())
    }
}
