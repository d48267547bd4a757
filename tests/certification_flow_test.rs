#[cfg(test)]
mod certification_flow_tests {
    use certserver::auth::users::insert_user;
    use certserver::certification::actions::{
        create_corrective_action, delete_corrective_action, get_corrective_action,
        patch_corrective_action, CreateCorrectiveActionRequest, UpdateCorrectiveActionRequest,
    };
    use certserver::certification::analyses::{
        create_analysis, get_analysis, CreateAnalysisRequest,
    };
    use certserver::certification::audit::{list_entries, AuditFilter};
    use certserver::certification::catalog::{
        create_criterion, create_indicator, create_principle, create_program, update_criterion,
        CreateCriterionRequest, CreateIndicatorRequest, CreatePrincipleRequest,
        CreateProgramRequest, UpdateCriterionRequest,
    };
    use certserver::certification::cycles::{create_audit_cycle, CreateAuditCycleRequest};
    use certserver::certification::documents::{
        create_document, get_document, CreateDocumentRequest,
    };
    use certserver::certification::error::CertificationError;
    use certserver::certification::evaluations::{
        create_evaluation, get_evaluation, update_evaluation, CreateEvaluationRequest,
        UpdateEvaluationRequest,
    };
    use certserver::certification::evidence::{create_evidence, CreateEvidenceRequest};
    use certserver::certification::permissions::{Actor, Role};
    use certserver::certification::storage::{
        DbAuditCycle, DbCriterion, DbIndicator, DbPrinciple,
    };
    use certserver::certification::types::{
        ActionStatus, AnalysisStatus, ConformityStatus, DocumentStatus, EvidenceKind, Priority,
    };
    use certserver::core::shared::utils::{create_conn, run_migrations, DbPool};
    use chrono::NaiveDate;
    use diesel::PgConnection;
    use uuid::Uuid;

    fn test_pool() -> Option<DbPool> {
        let url = match std::env::var("TEST_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                println!("Skipping test - TEST_DATABASE_URL not set");
                return None;
            }
        };
        let pool = match create_conn(&url) {
            Ok(pool) => pool,
            Err(e) => {
                println!("Skipping test - Cannot build pool: {e}");
                return None;
            }
        };
        if pool.get().is_err() {
            println!("Skipping test - Database not reachable");
            return None;
        }
        if let Err(e) = run_migrations(&pool) {
            println!("Skipping test - Migrations failed: {e}");
            return None;
        }
        Some(pool)
    }

    fn admin(conn: &mut PgConnection) -> Actor {
        let email = format!("admin-{}@test.local", Uuid::new_v4().simple());
        let user = insert_user(conn, "Admin de Teste", &email, "segredo123", Role::Admin)
            .expect("admin user");
        Actor::new(user.id, Role::Admin)
    }

    struct ProgramTree {
        principle: DbPrinciple,
        criterion: DbCriterion,
        indicator: DbIndicator,
        cycle: DbAuditCycle,
    }

    fn audit_cycle(conn: &mut PgConnection, actor: &Actor, program_id: Uuid, year: i32) -> DbAuditCycle {
        create_audit_cycle(
            conn,
            actor,
            CreateAuditCycleRequest {
                program_id,
                year,
                audit_type: Some("Certificação".to_string()),
                start_date: None,
                end_date: None,
                certifying_body: None,
                scope: None,
                standard_used: None,
            },
        )
        .expect("audit cycle")
    }

    /// A program with one principle, criterion, indicator and a 2026 cycle.
    fn program_tree(conn: &mut PgConnection, actor: &Actor) -> ProgramTree {
        let suffix = Uuid::new_v4().simple().to_string();
        let program = create_program(
            conn,
            actor,
            CreateProgramRequest {
                code: format!("QA{}", &suffix[..10]),
                name: format!("Programa {suffix}"),
                description: None,
            },
        )
        .expect("program");
        let principle = create_principle(
            conn,
            actor,
            CreatePrincipleRequest {
                program_id: program.id,
                code: Some("P1".to_string()),
                title: "Conformidade legal".to_string(),
                description: None,
            },
        )
        .expect("principle");
        let criterion = create_criterion(
            conn,
            actor,
            CreateCriterionRequest {
                program_id: program.id,
                principle_id: principle.id,
                code: Some("1.1".to_string()),
                title: "Licenciamento".to_string(),
                description: None,
            },
        )
        .expect("criterion");
        let indicator = create_indicator(
            conn,
            actor,
            CreateIndicatorRequest {
                program_id: program.id,
                criterion_id: criterion.id,
                code: Some("1.1.1".to_string()),
                title: "Licenças vigentes".to_string(),
                description: None,
            },
        )
        .expect("indicator");
        let cycle = audit_cycle(conn, actor, program.id, 2026);
        ProgramTree {
            principle,
            criterion,
            indicator,
            cycle,
        }
    }

    fn audit_rows(conn: &mut PgConnection, entity_id: Uuid) -> usize {
        list_entries(
            conn,
            &AuditFilter {
                entity_id: Some(entity_id),
                ..Default::default()
            },
        )
        .expect("audit entries")
        .len()
    }

    fn conforming_evaluation(
        conn: &mut PgConnection,
        actor: &Actor,
        indicator: &DbIndicator,
        cycle: &DbAuditCycle,
    ) -> Uuid {
        create_evaluation(
            conn,
            actor,
            CreateEvaluationRequest {
                indicator_id: indicator.id,
                audit_cycle_id: cycle.id,
                conformity_status: ConformityStatus::Conforme,
                justification: None,
            },
        )
        .expect("evaluation")
        .id
    }

    #[test]
    fn test_evaluation_across_programs_is_inconsistent() {
        let Some(pool) = test_pool() else { return };
        let mut conn = pool.get().expect("connection");
        let actor = admin(&mut conn);
        let indicator = program_tree(&mut conn, &actor).indicator;
        let other_cycle = program_tree(&mut conn, &actor).cycle;

        let result = create_evaluation(
            &mut conn,
            &actor,
            CreateEvaluationRequest {
                indicator_id: indicator.id,
                audit_cycle_id: other_cycle.id,
                conformity_status: ConformityStatus::Conforme,
                justification: None,
            },
        );
        assert!(matches!(result, Err(CertificationError::InconsistentProgram(_))));
    }

    #[test]
    fn test_major_nonconformity_support_and_last_action_guard() {
        let Some(pool) = test_pool() else { return };
        let mut conn = pool.get().expect("connection");
        let actor = admin(&mut conn);
        let ProgramTree { indicator, cycle, .. } = program_tree(&mut conn, &actor);
        let evaluation_id = conforming_evaluation(&mut conn, &actor, &indicator, &cycle);

        let to_major = || UpdateEvaluationRequest {
            conformity_status: Some(ConformityStatus::NcMaior),
            ..Default::default()
        };
        let rejected = update_evaluation(&mut conn, &actor, evaluation_id, to_major());
        assert!(matches!(
            rejected,
            Err(CertificationError::UnsupportedNonConformity(_))
        ));
        assert_eq!(audit_rows(&mut conn, evaluation_id), 1);

        let start = NaiveDate::from_ymd_opt(2026, 3, 1).expect("date");
        let action = create_corrective_action(
            &mut conn,
            &actor,
            CreateCorrectiveActionRequest {
                evaluation_id,
                title: "Renovar licença ambiental".to_string(),
                standard: None,
                description: None,
                responsible_id: None,
                start_date: Some(start),
                due_date: None,
                status: ActionStatus::Aberta,
                priority: Priority::Alta,
            },
        )
        .expect("corrective action");
        assert_eq!(action.start_date, Some(start));
        assert_eq!(action.due_date, Some(start));
        assert_eq!(audit_rows(&mut conn, action.id), 1);

        let saved = update_evaluation(&mut conn, &actor, evaluation_id, to_major())
            .expect("supported by the open action");
        assert_eq!(saved.conformity_status, "nc_maior");
        assert_eq!(audit_rows(&mut conn, evaluation_id), 2);

        let blocked = delete_corrective_action(&mut conn, &actor, action.id);
        assert!(matches!(
            blocked,
            Err(CertificationError::UnsupportedNonConformity(_))
        ));
        assert!(get_corrective_action(&mut conn, &actor, action.id).is_ok());
        assert_eq!(audit_rows(&mut conn, action.id), 1);

        let closing = patch_corrective_action(
            &mut conn,
            &actor,
            action.id,
            UpdateCorrectiveActionRequest {
                status: Some(ActionStatus::Concluida),
                ..Default::default()
            },
        );
        assert!(matches!(
            closing,
            Err(CertificationError::UnsupportedNonConformity(_))
        ));
        let evaluation = get_evaluation(&mut conn, evaluation_id).expect("evaluation");
        assert_eq!(evaluation.conformity_status, "nc_maior");
    }

    #[test]
    fn test_responsible_can_only_move_status_of_own_action() {
        let Some(pool) = test_pool() else { return };
        let mut conn = pool.get().expect("connection");
        let actor = admin(&mut conn);
        let ProgramTree { indicator, cycle, .. } = program_tree(&mut conn, &actor);
        let evaluation_id = conforming_evaluation(&mut conn, &actor, &indicator, &cycle);

        let email = format!("resp-{}@test.local", Uuid::new_v4().simple());
        let responsible = insert_user(&mut conn, "Responsável", &email, "segredo123", Role::Responsible)
            .expect("responsible");
        let responsible_actor = Actor::new(responsible.id, Role::Responsible);

        let action = create_corrective_action(
            &mut conn,
            &actor,
            CreateCorrectiveActionRequest {
                evaluation_id,
                title: "Atualizar procedimento".to_string(),
                standard: None,
                description: None,
                responsible_id: Some(responsible.id),
                start_date: None,
                due_date: None,
                status: ActionStatus::Aberta,
                priority: Priority::Media,
            },
        )
        .expect("corrective action");

        let retitled = patch_corrective_action(
            &mut conn,
            &responsible_actor,
            action.id,
            UpdateCorrectiveActionRequest {
                title: Some("Outro título".to_string()),
                ..Default::default()
            },
        );
        assert!(matches!(retitled, Err(CertificationError::Permission(_))));

        let moved = patch_corrective_action(
            &mut conn,
            &responsible_actor,
            action.id,
            UpdateCorrectiveActionRequest {
                status: Some(ActionStatus::EmAndamento),
                ..Default::default()
            },
        )
        .expect("status change");
        assert_eq!(moved.status, "em_andamento");
        assert_eq!(audit_rows(&mut conn, action.id), 2);
    }

    #[test]
    fn test_document_approval_requires_review_notes() {
        let Some(pool) = test_pool() else { return };
        let mut conn = pool.get().expect("connection");
        let actor = admin(&mut conn);
        let ProgramTree { indicator, cycle, .. } = program_tree(&mut conn, &actor);
        let evaluation_id = conforming_evaluation(&mut conn, &actor, &indicator, &cycle);

        let evidence = create_evidence(
            &mut conn,
            &actor,
            CreateEvidenceRequest {
                evaluation_id,
                evidence_type_id: None,
                kind: EvidenceKind::Link,
                location: "https://intranet.local/licencas".to_string(),
                non_conforming: false,
                notes: None,
            },
        )
        .expect("evidence");

        let request = |review_notes: Option<&str>| CreateDocumentRequest {
            evidence_id: evidence.id,
            title: "Procedimento de licenciamento".to_string(),
            content: Some("Versão inicial".to_string()),
            status: DocumentStatus::Aprovado,
            review_notes: review_notes.map(str::to_string),
            deadline: None,
            responsible_id: None,
        };

        let rejected = create_document(&mut conn, &actor, request(Some("  ")));
        assert!(matches!(rejected, Err(CertificationError::MissingReviewNotes)));

        let approved =
            create_document(&mut conn, &actor, request(Some("Conferido em campo"))).expect("document");
        assert_eq!(approved.status, "aprovado");
        assert_eq!(approved.reviewed_by_id, Some(actor.user_id));
        assert_eq!(approved.program_id, indicator.program_id);
        assert_eq!(approved.audit_cycle_id, cycle.id);
        assert_eq!(audit_rows(&mut conn, approved.id), 1);
    }

    #[test]
    fn test_criterion_under_foreign_principle_is_inconsistent() {
        let Some(pool) = test_pool() else { return };
        let mut conn = pool.get().expect("connection");
        let actor = admin(&mut conn);
        let home = program_tree(&mut conn, &actor);
        let foreign = program_tree(&mut conn, &actor);

        let created = create_criterion(
            &mut conn,
            &actor,
            CreateCriterionRequest {
                program_id: home.criterion.program_id,
                principle_id: foreign.principle.id,
                code: Some("9.9".to_string()),
                title: "Critério cruzado".to_string(),
                description: None,
            },
        );
        assert!(matches!(created, Err(CertificationError::InconsistentProgram(_))));

        let moved = update_criterion(
            &mut conn,
            &actor,
            home.criterion.id,
            UpdateCriterionRequest {
                principle_id: Some(foreign.principle.id),
                ..Default::default()
            },
        );
        assert!(matches!(moved, Err(CertificationError::InconsistentProgram(_))));
        assert_eq!(audit_rows(&mut conn, home.criterion.id), 1);
    }

    #[test]
    fn test_audit_entry_holds_full_rows_before_and_after() {
        let Some(pool) = test_pool() else { return };
        let mut conn = pool.get().expect("connection");
        let actor = admin(&mut conn);
        let ProgramTree { indicator, cycle, .. } = program_tree(&mut conn, &actor);
        let evaluation_id = conforming_evaluation(&mut conn, &actor, &indicator, &cycle);

        let before = get_evaluation(&mut conn, evaluation_id).expect("evaluation");
        let saved = update_evaluation(
            &mut conn,
            &actor,
            evaluation_id,
            UpdateEvaluationRequest {
                conformity_status: Some(ConformityStatus::OportunidadeMelhoria),
                justification: Some(Some("Registro de treinamento incompleto".to_string())),
                ..Default::default()
            },
        )
        .expect("update");

        let entries = list_entries(
            &mut conn,
            &AuditFilter {
                entity_id: Some(evaluation_id),
                ..Default::default()
            },
        )
        .expect("audit entries");
        let latest = entries.first().expect("latest entry");
        assert_eq!(latest.action, "STATUS_CHANGE");
        assert_eq!(latest.actor_id, Some(actor.user_id));
        assert_eq!(latest.program_id, Some(saved.program_id));
        assert_eq!(latest.audit_cycle_id, Some(saved.audit_cycle_id));
        assert_eq!(
            latest.old_value,
            Some(serde_json::to_value(&before).expect("json"))
        );
        assert_eq!(
            latest.new_value,
            Some(serde_json::to_value(&saved).expect("json"))
        );

        let created = entries.last().expect("create entry");
        assert_eq!(created.action, "CREATE");
        assert_eq!(created.old_value, None);
    }

    #[test]
    fn test_empty_evaluation_update_is_rejected_without_audit() {
        let Some(pool) = test_pool() else { return };
        let mut conn = pool.get().expect("connection");
        let actor = admin(&mut conn);
        let ProgramTree { indicator, cycle, .. } = program_tree(&mut conn, &actor);
        let evaluation_id = conforming_evaluation(&mut conn, &actor, &indicator, &cycle);

        let result = update_evaluation(
            &mut conn,
            &actor,
            evaluation_id,
            UpdateEvaluationRequest::default(),
        );
        assert!(matches!(result, Err(CertificationError::Validation(_))));
        assert_eq!(audit_rows(&mut conn, evaluation_id), 1);
    }

    #[test]
    fn test_moving_evaluation_carries_analyses_and_documents_to_new_cycle() {
        let Some(pool) = test_pool() else { return };
        let mut conn = pool.get().expect("connection");
        let actor = admin(&mut conn);
        let ProgramTree { indicator, cycle, .. } = program_tree(&mut conn, &actor);
        let evaluation_id = conforming_evaluation(&mut conn, &actor, &indicator, &cycle);

        let analysis = create_analysis(
            &mut conn,
            &actor,
            CreateAnalysisRequest {
                program_id: None,
                audit_cycle_id: cycle.id,
                evaluation_id,
                corrective_action_id: None,
                problem_title: "Licença vencida".to_string(),
                context: None,
                why_1: Some("Renovação não solicitada".to_string()),
                why_2: None,
                why_3: None,
                why_4: None,
                why_5: None,
                root_cause: None,
                corrective_action_plan: None,
                swot_strengths: None,
                swot_weaknesses: None,
                swot_opportunities: None,
                swot_threats: None,
                status: AnalysisStatus::Aberta,
                responsible_id: None,
            },
        )
        .expect("analysis");

        let evidence = create_evidence(
            &mut conn,
            &actor,
            CreateEvidenceRequest {
                evaluation_id,
                evidence_type_id: None,
                kind: EvidenceKind::Texto,
                location: "Protocolo de renovação 2026/114".to_string(),
                non_conforming: false,
                notes: None,
            },
        )
        .expect("evidence");
        let document = create_document(
            &mut conn,
            &actor,
            CreateDocumentRequest {
                evidence_id: evidence.id,
                title: "Plano de renovação".to_string(),
                content: None,
                status: DocumentStatus::EmConstrucao,
                review_notes: None,
                deadline: None,
                responsible_id: None,
            },
        )
        .expect("document");

        let next_cycle = audit_cycle(&mut conn, &actor, cycle.program_id, 2027);
        let moved = update_evaluation(
            &mut conn,
            &actor,
            evaluation_id,
            UpdateEvaluationRequest {
                audit_cycle_id: Some(next_cycle.id),
                ..Default::default()
            },
        )
        .expect("move evaluation");
        assert_eq!(moved.audit_cycle_id, next_cycle.id);

        let analysis = get_analysis(&mut conn, analysis.id).expect("analysis");
        assert_eq!(analysis.audit_cycle_id, next_cycle.id);
        assert_eq!(audit_rows(&mut conn, analysis.id), 2);

        let document = get_document(&mut conn, document.id).expect("document");
        assert_eq!(document.audit_cycle_id, next_cycle.id);
        assert_eq!(audit_rows(&mut conn, document.id), 2);
    }
}
