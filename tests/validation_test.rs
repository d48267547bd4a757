#[cfg(test)]
mod validation_tests {
    use certserver::certification::error::CertificationError;
    use certserver::certification::rules::{
        review_state_for, validate_analysis_completion, validate_document_review_requirement,
        validate_nonconformity_support,
    };
    use certserver::certification::types::{AnalysisStatus, ConformityStatus, DocumentStatus};
    use certserver::certification::validation::{
        normalize_optional_date_pair, validate_date_order, validate_evidence_type_scope,
        validate_same_program, validate_schedule_requirement, EvidenceTypeScope, IndicatorScope,
    };
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_program_mismatch_is_reported_as_inconsistent() {
        let result = validate_same_program(Uuid::new_v4(), Uuid::new_v4(), "evaluation/cycle");
        assert!(matches!(result, Err(CertificationError::InconsistentProgram(_))));
    }

    #[test]
    fn test_single_date_is_mirrored_and_normalizing_twice_is_stable() {
        let start = date(2026, 3, 1);
        let once = normalize_optional_date_pair(Some(start), None);
        assert_eq!(once, (Some(start), Some(start)));
        assert_eq!(normalize_optional_date_pair(once.0, once.1), once);

        let due = date(2026, 4, 30);
        assert_eq!(
            normalize_optional_date_pair(None, Some(due)),
            (Some(due), Some(due))
        );
        assert_eq!(normalize_optional_date_pair(None, None), (None, None));
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        let result = validate_date_order(Some(date(2026, 5, 10)), Some(date(2026, 5, 1)), "action");
        assert!(matches!(result, Err(CertificationError::InvalidDateRange(_))));
        assert!(validate_date_order(Some(date(2026, 5, 1)), Some(date(2026, 5, 1)), "action").is_ok());
    }

    #[test]
    fn test_schedule_required_only_for_findings() {
        for status in [
            ConformityStatus::NcMenor,
            ConformityStatus::NcMaior,
            ConformityStatus::OportunidadeMelhoria,
        ] {
            assert!(matches!(
                validate_schedule_requirement(status, None, Some(date(2026, 6, 1))),
                Err(CertificationError::MissingSchedule(_))
            ));
        }
        assert!(validate_schedule_requirement(ConformityStatus::Conforme, None, None).is_ok());
        assert!(validate_schedule_requirement(ConformityStatus::NaoSeAplica, None, None).is_ok());
    }

    #[test]
    fn test_major_nonconformity_needs_justification_or_active_action() {
        assert!(matches!(
            validate_nonconformity_support(ConformityStatus::NcMaior, None, 0),
            Err(CertificationError::UnsupportedNonConformity(_))
        ));
        assert!(matches!(
            validate_nonconformity_support(ConformityStatus::NcMaior, Some("   "), 0),
            Err(CertificationError::UnsupportedNonConformity(_))
        ));
        assert!(validate_nonconformity_support(ConformityStatus::NcMaior, None, 1).is_ok());
        assert!(
            validate_nonconformity_support(ConformityStatus::NcMenor, Some("Plano em curso"), 0)
                .is_ok()
        );
        assert!(validate_nonconformity_support(ConformityStatus::Conforme, None, 0).is_ok());
    }

    #[test]
    fn test_evidence_type_scope_must_match_target_indicator() {
        let target = IndicatorScope {
            program_id: Uuid::new_v4(),
            criterion_id: Uuid::new_v4(),
            indicator_id: Uuid::new_v4(),
        };
        let matching = EvidenceTypeScope {
            program_id: Some(target.program_id),
            criterion_id: Some(target.criterion_id),
            indicator_id: Some(target.indicator_id),
        };
        assert!(validate_evidence_type_scope(&matching, &target).is_ok());

        let other_indicator = EvidenceTypeScope {
            indicator_id: Some(Uuid::new_v4()),
            ..matching
        };
        assert!(matches!(
            validate_evidence_type_scope(&other_indicator, &target),
            Err(CertificationError::EvidenceTypeMismatch(_))
        ));

        let unscoped = EvidenceTypeScope::default();
        assert!(matches!(
            validate_evidence_type_scope(&unscoped, &target),
            Err(CertificationError::EvidenceTypeMismatch(_))
        ));
    }

    #[test]
    fn test_review_decisions_need_notes_and_stamp_reviewer() {
        assert!(matches!(
            validate_document_review_requirement(DocumentStatus::Aprovado, Some("")),
            Err(CertificationError::MissingReviewNotes)
        ));
        assert!(
            validate_document_review_requirement(DocumentStatus::Reprovado, Some("Sem assinatura"))
                .is_ok()
        );
        assert!(validate_document_review_requirement(DocumentStatus::EmRevisao, None).is_ok());

        let reviewer = Uuid::new_v4();
        let now = Utc::now();
        let decided = review_state_for(DocumentStatus::Aprovado, reviewer, now);
        assert_eq!(decided.reviewed_by_id, Some(reviewer));
        assert_eq!(decided.reviewed_at, Some(now));
        let reopened = review_state_for(DocumentStatus::EmConstrucao, reviewer, now);
        assert_eq!(reopened.reviewed_by_id, None);
        assert_eq!(reopened.reviewed_at, None);
    }

    #[test]
    fn test_concluded_analysis_needs_cause_and_plan() {
        assert!(matches!(
            validate_analysis_completion(AnalysisStatus::Concluida, Some("Falta de treinamento"), None),
            Err(CertificationError::IncompleteAnalysis)
        ));
        assert!(validate_analysis_completion(
            AnalysisStatus::Concluida,
            Some("Falta de treinamento"),
            Some("Treinar equipe de campo")
        )
        .is_ok());
        assert!(validate_analysis_completion(AnalysisStatus::EmAnalise, None, None).is_ok());
    }
}
