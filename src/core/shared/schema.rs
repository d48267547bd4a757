diesel::table! {
    users (id) {
        id -> Uuid,
        name -> Varchar,
        email -> Varchar,
        role -> Varchar,
        password_hash -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    certification_programs (id) {
        id -> Uuid,
        code -> Varchar,
        name -> Varchar,
        description -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    principles (id) {
        id -> Uuid,
        program_id -> Uuid,
        code -> Nullable<Varchar>,
        title -> Varchar,
        description -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    criteria (id) {
        id -> Uuid,
        program_id -> Uuid,
        principle_id -> Uuid,
        code -> Nullable<Varchar>,
        title -> Varchar,
        description -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    indicators (id) {
        id -> Uuid,
        program_id -> Uuid,
        criterion_id -> Uuid,
        code -> Nullable<Varchar>,
        title -> Varchar,
        description -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    audit_cycles (id) {
        id -> Uuid,
        program_id -> Uuid,
        year -> Int4,
        audit_type -> Nullable<Varchar>,
        start_date -> Nullable<Date>,
        end_date -> Nullable<Date>,
        certifying_body -> Nullable<Varchar>,
        scope -> Nullable<Text>,
        standard_used -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    evaluations (id) {
        id -> Uuid,
        program_id -> Uuid,
        indicator_id -> Uuid,
        audit_cycle_id -> Uuid,
        conformity_status -> Varchar,
        justification -> Nullable<Text>,
        assessed_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    evidence_types (id) {
        id -> Uuid,
        program_id -> Nullable<Uuid>,
        criterion_id -> Nullable<Uuid>,
        indicator_id -> Nullable<Uuid>,
        name -> Varchar,
        description -> Nullable<Text>,
        conformity_status -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    evidences (id) {
        id -> Uuid,
        program_id -> Uuid,
        evaluation_id -> Uuid,
        evidence_type_id -> Nullable<Uuid>,
        kind -> Varchar,
        location -> Text,
        non_conforming -> Bool,
        notes -> Nullable<Text>,
        created_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    corrective_actions (id) {
        id -> Uuid,
        program_id -> Uuid,
        evaluation_id -> Uuid,
        title -> Varchar,
        standard -> Nullable<Varchar>,
        description -> Nullable<Text>,
        responsible_id -> Nullable<Uuid>,
        start_date -> Nullable<Date>,
        due_date -> Nullable<Date>,
        status -> Varchar,
        priority -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    root_cause_analyses (id) {
        id -> Uuid,
        program_id -> Uuid,
        audit_cycle_id -> Uuid,
        evaluation_id -> Uuid,
        corrective_action_id -> Nullable<Uuid>,
        problem_title -> Varchar,
        context -> Nullable<Text>,
        why_1 -> Nullable<Text>,
        why_2 -> Nullable<Text>,
        why_3 -> Nullable<Text>,
        why_4 -> Nullable<Text>,
        why_5 -> Nullable<Text>,
        root_cause -> Nullable<Text>,
        corrective_action_plan -> Nullable<Text>,
        swot_strengths -> Nullable<Text>,
        swot_weaknesses -> Nullable<Text>,
        swot_opportunities -> Nullable<Text>,
        swot_threats -> Nullable<Text>,
        status -> Varchar,
        responsible_id -> Nullable<Uuid>,
        created_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    evidence_documents (id) {
        id -> Uuid,
        program_id -> Uuid,
        audit_cycle_id -> Uuid,
        evidence_id -> Uuid,
        title -> Varchar,
        content -> Nullable<Text>,
        version -> Int4,
        status -> Varchar,
        review_notes -> Nullable<Text>,
        deadline -> Nullable<Date>,
        responsible_id -> Nullable<Uuid>,
        reviewed_by_id -> Nullable<Uuid>,
        reviewed_at -> Nullable<Timestamptz>,
        created_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    criterion_monitorings (id) {
        id -> Uuid,
        program_id -> Uuid,
        audit_cycle_id -> Uuid,
        criterion_id -> Uuid,
        reference_month -> Date,
        status -> Varchar,
        notes -> Nullable<Text>,
        created_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    monitoring_notifications (id) {
        id -> Uuid,
        program_id -> Uuid,
        audit_cycle_id -> Uuid,
        criterion_id -> Uuid,
        monitoring_id -> Uuid,
        title -> Varchar,
        description -> Nullable<Text>,
        severity -> Varchar,
        status -> Varchar,
        responsible_id -> Nullable<Uuid>,
        deadline -> Nullable<Date>,
        created_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    notification_resolutions (id) {
        id -> Uuid,
        program_id -> Uuid,
        notification_id -> Uuid,
        description -> Text,
        outcome -> Nullable<Text>,
        created_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    audit_logs (id) {
        id -> Uuid,
        entity_kind -> Varchar,
        entity_id -> Uuid,
        action -> Varchar,
        old_value -> Nullable<Jsonb>,
        new_value -> Nullable<Jsonb>,
        actor_id -> Nullable<Uuid>,
        program_id -> Nullable<Uuid>,
        audit_cycle_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    system_settings (id) {
        id -> Uuid,
        company_name -> Varchar,
        logo_url -> Nullable<Text>,
        updated_by -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(principles -> certification_programs (program_id));
diesel::joinable!(criteria -> principles (principle_id));
diesel::joinable!(indicators -> criteria (criterion_id));
diesel::joinable!(audit_cycles -> certification_programs (program_id));
diesel::joinable!(evaluations -> indicators (indicator_id));
diesel::joinable!(evaluations -> audit_cycles (audit_cycle_id));
diesel::joinable!(evidences -> evaluations (evaluation_id));
diesel::joinable!(corrective_actions -> evaluations (evaluation_id));
diesel::joinable!(evidence_documents -> evidences (evidence_id));
diesel::joinable!(monitoring_notifications -> criterion_monitorings (monitoring_id));
diesel::joinable!(notification_resolutions -> monitoring_notifications (notification_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    certification_programs,
    principles,
    criteria,
    indicators,
    audit_cycles,
    evaluations,
    evidence_types,
    evidences,
    corrective_actions,
    root_cause_analyses,
    evidence_documents,
    criterion_monitorings,
    monitoring_notifications,
    notification_resolutions,
    audit_logs,
    system_settings,
);
