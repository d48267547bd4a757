//! Certification Compliance Module
//!
//! Tracks certification programs through their principle, criterion and
//! indicator hierarchy, evaluated once per audit cycle.
//!
//! ## Features
//!
//! - **Catalog**: programs, principles, criteria, indicators
//! - **Audit cycles**: yearly cycles and evaluation generation
//! - **Evidence**: typed evidence, file uploads to the object store, documents under review
//! - **Remediation**: corrective actions and root-cause analyses
//! - **Monitoring**: monthly criterion monitoring, notifications, resolutions
//! - **Audit trail**: every mutation records before/after snapshots
//!
//! Workflow functions are synchronous and take a `PgConnection`; the
//! `handlers` module runs them on the blocking pool.

pub mod actions;
pub mod analyses;
pub mod audit;
pub mod catalog;
pub mod cycles;
pub mod documents;
pub mod error;
pub mod evaluations;
pub mod evidence;
pub mod handlers;
pub mod monitoring;
pub mod permissions;
pub mod rules;
pub mod storage;
pub mod types;
pub mod validation;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use handlers::{
    actions as action_handlers, analyses as analysis_handlers, audit_log,
    catalog as catalog_handlers, cycles as cycle_handlers, documents as document_handlers,
    evaluations as evaluation_handlers, evidence as evidence_handlers,
    monitoring as monitoring_handlers,
};

/// Configure certification routes. All of them require authentication.
pub fn configure_certification_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Catalog
        .route(
            "/api/programs",
            get(catalog_handlers::list_programs).post(catalog_handlers::create_program),
        )
        .route(
            "/api/programs/:id",
            get(catalog_handlers::get_program)
                .put(catalog_handlers::update_program)
                .delete(catalog_handlers::delete_program),
        )
        .route(
            "/api/principles",
            get(catalog_handlers::list_principles).post(catalog_handlers::create_principle),
        )
        .route(
            "/api/principles/:id",
            get(catalog_handlers::get_principle)
                .put(catalog_handlers::update_principle)
                .delete(catalog_handlers::delete_principle),
        )
        .route(
            "/api/criteria",
            get(catalog_handlers::list_criteria).post(catalog_handlers::create_criterion),
        )
        .route(
            "/api/criteria/:id",
            get(catalog_handlers::get_criterion)
                .put(catalog_handlers::update_criterion)
                .delete(catalog_handlers::delete_criterion),
        )
        .route(
            "/api/indicators",
            get(catalog_handlers::list_indicators).post(catalog_handlers::create_indicator),
        )
        .route(
            "/api/indicators/:id",
            get(catalog_handlers::get_indicator)
                .put(catalog_handlers::update_indicator)
                .delete(catalog_handlers::delete_indicator),
        )
        // Audit cycles and evaluations
        .route(
            "/api/audit-cycles",
            get(cycle_handlers::list_audit_cycles).post(cycle_handlers::create_audit_cycle),
        )
        .route(
            "/api/audit-cycles/:id",
            get(cycle_handlers::get_audit_cycle)
                .put(cycle_handlers::update_audit_cycle)
                .delete(cycle_handlers::delete_audit_cycle),
        )
        .route(
            "/api/audit-cycles/:id/generate-evaluations",
            post(cycle_handlers::generate_evaluations),
        )
        .route(
            "/api/evaluations",
            get(evaluation_handlers::list_evaluations).post(evaluation_handlers::create_evaluation),
        )
        .route(
            "/api/evaluations/:id",
            get(evaluation_handlers::get_evaluation)
                .put(evaluation_handlers::update_evaluation)
                .patch(evaluation_handlers::update_evaluation)
                .delete(evaluation_handlers::delete_evaluation),
        )
        .route(
            "/api/evaluations/:id/detail",
            get(evaluation_handlers::get_evaluation_detail),
        )
        // Evidence
        .route(
            "/api/evidence-types",
            get(evidence_handlers::list_evidence_types)
                .post(evidence_handlers::create_evidence_type),
        )
        .route(
            "/api/evidence-types/:id",
            get(evidence_handlers::get_evidence_type)
                .put(evidence_handlers::update_evidence_type)
                .delete(evidence_handlers::delete_evidence_type),
        )
        .route(
            "/api/evidences",
            get(evidence_handlers::list_evidences).post(evidence_handlers::create_evidence),
        )
        .route("/api/evidences/upload", post(evidence_handlers::upload_evidence))
        .route(
            "/api/evidences/:id",
            get(evidence_handlers::get_evidence).delete(evidence_handlers::delete_evidence),
        )
        .route(
            "/api/evidences/:id/download",
            get(evidence_handlers::download_evidence),
        )
        .route(
            "/api/evidence-documents",
            get(document_handlers::list_documents).post(document_handlers::create_document),
        )
        .route(
            "/api/evidence-documents/:id",
            get(document_handlers::get_document)
                .put(document_handlers::update_document)
                .delete(document_handlers::delete_document),
        )
        .route(
            "/api/evidence-documents/:id/status",
            patch(document_handlers::change_document_status),
        )
        // Remediation
        .route(
            "/api/corrective-actions",
            get(action_handlers::list_corrective_actions)
                .post(action_handlers::create_corrective_action),
        )
        .route(
            "/api/corrective-actions/:id",
            get(action_handlers::get_corrective_action)
                .put(action_handlers::replace_corrective_action)
                .patch(action_handlers::patch_corrective_action)
                .delete(action_handlers::delete_corrective_action),
        )
        .route(
            "/api/root-cause-analyses",
            get(analysis_handlers::list_analyses).post(analysis_handlers::create_analysis),
        )
        .route(
            "/api/root-cause-analyses/:id",
            get(analysis_handlers::get_analysis)
                .put(analysis_handlers::update_analysis)
                .delete(analysis_handlers::delete_analysis),
        )
        .route(
            "/api/root-cause-analyses/:id/status",
            patch(analysis_handlers::change_analysis_status),
        )
        .route(
            "/api/root-cause-analyses/:id/history",
            get(analysis_handlers::analysis_history),
        )
        // Monitoring
        .route(
            "/api/monitorings",
            get(monitoring_handlers::list_monitorings).post(monitoring_handlers::create_monitoring),
        )
        .route(
            "/api/monitorings/:id",
            get(monitoring_handlers::get_monitoring)
                .put(monitoring_handlers::update_monitoring)
                .delete(monitoring_handlers::delete_monitoring),
        )
        .route(
            "/api/notifications",
            get(monitoring_handlers::list_notifications)
                .post(monitoring_handlers::create_notification),
        )
        .route(
            "/api/notifications/:id",
            get(monitoring_handlers::get_notification).put(monitoring_handlers::update_notification),
        )
        .route(
            "/api/notifications/:id/status",
            patch(monitoring_handlers::change_notification_status),
        )
        .route(
            "/api/resolutions",
            get(monitoring_handlers::list_resolutions).post(monitoring_handlers::create_resolution),
        )
        .route(
            "/api/resolutions/:id",
            delete(monitoring_handlers::delete_resolution),
        )
        // Audit trail
        .route("/api/audit-logs", get(audit_log::list_audit_logs))
        .route("/api/audit-logs/export", get(audit_log::export_audit_logs))
}
