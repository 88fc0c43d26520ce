diesel::table! {
    tickets (id) {
        id -> Int4,
        ticket_number -> Varchar,
        user_id -> Int4,
        assigned_to_id -> Nullable<Int4>,
        title -> Varchar,
        description -> Text,
        category -> Varchar,
        priority -> Varchar,
        status -> Varchar,
        ai_classification -> Nullable<Varchar>,
        ai_confidence -> Nullable<Float8>,
        sla_deadline -> Nullable<Timestamptz>,
        resolved_at -> Nullable<Timestamptz>,
        closed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    ticket_activities (id) {
        id -> Int4,
        ticket_id -> Int4,
        user_id -> Nullable<Int4>,
        activity_type -> Varchar,
        description -> Text,
        old_value -> Nullable<Varchar>,
        new_value -> Nullable<Varchar>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    sla_policies (id) {
        id -> Int4,
        priority -> Varchar,
        response_time_hours -> Int4,
        resolution_time_hours -> Int4,
        description -> Nullable<Varchar>,
    }
}

diesel::joinable!(ticket_activities -> tickets (ticket_id));

diesel::allow_tables_to_appear_in_same_query!(tickets, ticket_activities, sla_policies);
