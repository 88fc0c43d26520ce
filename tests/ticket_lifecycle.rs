use std::sync::Arc;

use chrono::Duration;
use serde_json::json;

use fixora::classifier::parse_classification;
use fixora::notify::LogNotifier;
use fixora::tickets::engine::{CreateTicket, TicketEngine, UpdateTicket};
use fixora::tickets::numbering;
use fixora::tickets::store::MemoryTicketStore;
use fixora::tickets::types::{
    ActivityType, TicketCategory, TicketFilter, TicketPriority, TicketStatus,
};

fn engine() -> TicketEngine {
    let store = Arc::new(MemoryTicketStore::new());
    store.add_policy(TicketPriority::Low, 24, 72);
    store.add_policy(TicketPriority::Medium, 8, 24);
    store.add_policy(TicketPriority::High, 4, 8);
    store.add_policy(TicketPriority::Urgent, 1, 4);
    TicketEngine::new(store, Arc::new(LogNotifier))
}

#[test]
fn printer_jam_walks_the_whole_lifecycle() {
    let engine = engine();

    let ticket = engine
        .create(
            CreateTicket {
                title: "Printer jam".to_string(),
                description: "Paper stuck in tray 2".to_string(),
                category: TicketCategory::Printer,
            },
            1,
        )
        .unwrap();

    assert_eq!(ticket.status, TicketStatus::Open);
    assert_eq!(ticket.priority, TicketPriority::Medium);
    let year = numbering::current_year();
    assert!(ticket.ticket_number.starts_with(&format!("TKT-{year}-")));
    assert_eq!(numbering::sequence_of(&ticket.ticket_number), Some(1));
    let created_activities = engine.activities(ticket.id, None).unwrap();
    assert_eq!(created_activities.len(), 1);
    assert_eq!(created_activities[0].activity_type, ActivityType::Created);

    // Raising the priority by hand audits the change but leaves the SLA
    // deadline alone; only creation and classification compute deadlines.
    let raised = engine
        .update(
            ticket.id,
            UpdateTicket {
                priority: Some(TicketPriority::High),
                ..UpdateTicket::default()
            },
            2,
        )
        .unwrap();
    assert_eq!(raised.priority, TicketPriority::High);
    assert_eq!(raised.sla_deadline, ticket.sla_deadline);
    let updates: Vec<_> = engine
        .activities(ticket.id, None)
        .unwrap()
        .into_iter()
        .filter(|a| a.activity_type == ActivityType::Updated)
        .collect();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].old_value.as_deref(), Some("medium"));
    assert_eq!(updates[0].new_value.as_deref(), Some("high"));

    let assigned = engine.assign(ticket.id, 7, 2).unwrap();
    assert_eq!(assigned.status, TicketStatus::InProgress);

    let resolved = engine
        .change_status(ticket.id, TicketStatus::Resolved, 7)
        .unwrap();
    assert!(resolved.resolved_at.is_some());

    let closed = engine
        .change_status(ticket.id, TicketStatus::Closed, 7)
        .unwrap();
    assert!(closed.closed_at.is_some());
    assert_eq!(closed.resolved_at, resolved.resolved_at);

    let trail = engine.activities(ticket.id, None).unwrap();
    // created, updated, assigned, two status changes - all retained,
    // newest first.
    assert_eq!(trail.len(), 5);
    assert_eq!(trail[0].activity_type, ActivityType::StatusChanged);
    assert_eq!(trail[4].activity_type, ActivityType::Created);
}

#[test]
fn bogus_classification_payload_falls_back_and_recomputes_sla() {
    let engine = engine();
    let ticket = engine
        .create(
            CreateTicket {
                title: "Cannot log in".to_string(),
                description: "Password reset loop".to_string(),
                category: TicketCategory::Access,
            },
            1,
        )
        .unwrap();

    let classification = parse_classification(&json!({
        "ticket_id": ticket.id,
        "classification": {
            "category": "bogus",
            "priority": "bogus",
            "confidence": "bogus"
        }
    }));
    let merged = engine.apply_classification(ticket.id, &classification).unwrap();

    assert_eq!(merged.category, TicketCategory::Other);
    assert_eq!(merged.priority, TicketPriority::Medium);
    assert_eq!(merged.ai_confidence, Some(0.7));
    assert_eq!(merged.ai_classification.as_deref(), Some("other_medium"));
    assert_eq!(
        merged.sla_deadline,
        Some(merged.updated_at + Duration::hours(24))
    );
}

#[test]
fn listing_filters_and_finds_by_number() {
    let engine = engine();
    let jam = engine
        .create(
            CreateTicket {
                title: "Printer jam".to_string(),
                description: "Paper stuck in tray 2".to_string(),
                category: TicketCategory::Printer,
            },
            1,
        )
        .unwrap();
    let vpn = engine
        .create(
            CreateTicket {
                title: "VPN drops".to_string(),
                description: "Disconnects every few minutes".to_string(),
                category: TicketCategory::Network,
            },
            2,
        )
        .unwrap();
    engine.assign(vpn.id, 7, 2).unwrap();

    let (open, total) = engine
        .list(&TicketFilter {
            status: Some(TicketStatus::Open),
            limit: 20,
            ..TicketFilter::default()
        })
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(open[0].id, jam.id);

    let (hits, _) = engine
        .list(&TicketFilter {
            search: Some("tray".to_string()),
            limit: 20,
            ..TicketFilter::default()
        })
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, jam.id);

    let found = engine.ticket_by_number(&vpn.ticket_number).unwrap();
    assert_eq!(found.id, vpn.id);
}
