use chrono::{DateTime, Utc};
use diesel::PgConnection;
use uuid::Uuid;

use super::error::CertificationError;
use super::storage::{count_active_actions, DbEvaluation};
use super::types::{AnalysisStatus, ConformityStatus, DocumentStatus};
use crate::core::shared::utils::has_text;

pub fn validate_nonconformity_support(
    status: ConformityStatus,
    justification: Option<&str>,
    active_remediation_count: i64,
) -> Result<(), CertificationError> {
    match status {
        ConformityStatus::NaoSeAplica if !has_text(justification) => {
            Err(CertificationError::UnsupportedNonConformity(
                "Status nao_se_aplica requires a justification".to_string(),
            ))
        }
        ConformityStatus::NcMenor | ConformityStatus::NcMaior
            if !has_text(justification) && active_remediation_count == 0 =>
        {
            Err(CertificationError::UnsupportedNonConformity(format!(
                "Status {status} requires a justification or an active corrective action"
            )))
        }
        _ => Ok(()),
    }
}

/// Re-checks the support rule for `evaluation` against the corrective actions
/// currently visible in the transaction. Call it after any write that touches
/// the evaluation's corrective actions, before the audit row is recorded.
pub fn validate_post_mutation_invariant(
    conn: &mut PgConnection,
    evaluation: &DbEvaluation,
) -> Result<(), CertificationError> {
    let status = evaluation.status()?;
    if !matches!(
        status,
        ConformityStatus::NcMenor | ConformityStatus::NcMaior | ConformityStatus::NaoSeAplica
    ) {
        return Ok(());
    }
    let active = count_active_actions(conn, evaluation.id)?;
    validate_nonconformity_support(status, evaluation.justification.as_deref(), active).map_err(
        |_| {
            CertificationError::UnsupportedNonConformity(format!(
                "Evaluation {} is {status} without justification and would be left without an active corrective action",
                evaluation.id
            ))
        },
    )
}

pub fn validate_document_review_requirement(
    status: DocumentStatus,
    review_notes: Option<&str>,
) -> Result<(), CertificationError> {
    if status.is_review_decision() && !has_text(review_notes) {
        return Err(CertificationError::MissingReviewNotes);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewState {
    pub reviewed_by_id: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Reviewer bookkeeping for a document entering `status`. A decision stamps
/// the reviewer; going back to construction or review wipes it.
pub fn review_state_for(status: DocumentStatus, reviewer: Uuid, now: DateTime<Utc>) -> ReviewState {
    match status {
        DocumentStatus::Aprovado | DocumentStatus::Reprovado => ReviewState {
            reviewed_by_id: Some(reviewer),
            reviewed_at: Some(now),
        },
        DocumentStatus::EmConstrucao | DocumentStatus::EmRevisao => ReviewState {
            reviewed_by_id: None,
            reviewed_at: None,
        },
    }
}

pub fn validate_analysis_completion(
    status: AnalysisStatus,
    root_cause: Option<&str>,
    corrective_action_plan: Option<&str>,
) -> Result<(), CertificationError> {
    if status == AnalysisStatus::Concluida
        && (!has_text(root_cause) || !has_text(corrective_action_plan))
    {
        return Err(CertificationError::IncompleteAnalysis);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nao_se_aplica_requires_justification() {
        assert!(matches!(
            validate_nonconformity_support(ConformityStatus::NaoSeAplica, None, 3),
            Err(CertificationError::UnsupportedNonConformity(_))
        ));
        assert!(validate_nonconformity_support(ConformityStatus::NaoSeAplica, Some("  "), 0).is_err());
        assert!(
            validate_nonconformity_support(ConformityStatus::NaoSeAplica, Some("fora do escopo"), 0)
                .is_ok()
        );
    }

    #[test]
    fn test_nonconformity_needs_text_or_active_action() {
        for status in [ConformityStatus::NcMenor, ConformityStatus::NcMaior] {
            assert!(validate_nonconformity_support(status, None, 0).is_err());
            assert!(validate_nonconformity_support(status, Some(""), 0).is_err());
            assert!(validate_nonconformity_support(status, None, 1).is_ok());
            assert!(validate_nonconformity_support(status, Some("registro de campo"), 0).is_ok());
        }
    }

    #[test]
    fn test_other_statuses_need_nothing() {
        assert!(validate_nonconformity_support(ConformityStatus::Conforme, None, 0).is_ok());
        assert!(
            validate_nonconformity_support(ConformityStatus::OportunidadeMelhoria, None, 0).is_ok()
        );
    }

    #[test]
    fn test_document_review_requirement() {
        assert!(matches!(
            validate_document_review_requirement(DocumentStatus::Aprovado, None),
            Err(CertificationError::MissingReviewNotes)
        ));
        assert!(validate_document_review_requirement(DocumentStatus::Reprovado, Some(" ")).is_err());
        assert!(
            validate_document_review_requirement(DocumentStatus::Aprovado, Some("ok, conferido"))
                .is_ok()
        );
        assert!(validate_document_review_requirement(DocumentStatus::EmRevisao, None).is_ok());
        assert!(validate_document_review_requirement(DocumentStatus::EmConstrucao, None).is_ok());
    }

    #[test]
    fn test_review_state_transitions() {
        let reviewer = Uuid::new_v4();
        let now = Utc::now();

        let approved = review_state_for(DocumentStatus::Aprovado, reviewer, now);
        assert_eq!(approved.reviewed_by_id, Some(reviewer));
        assert_eq!(approved.reviewed_at, Some(now));

        let reopened = review_state_for(DocumentStatus::EmRevisao, reviewer, now);
        assert_eq!(reopened.reviewed_by_id, None);
        assert_eq!(reopened.reviewed_at, None);

        let rejected = review_state_for(DocumentStatus::Reprovado, reviewer, now);
        assert_eq!(rejected.reviewed_by_id, Some(reviewer));

        let rebuilt = review_state_for(DocumentStatus::EmConstrucao, reviewer, now);
        assert_eq!(rebuilt.reviewed_by_id, None);
    }

    #[test]
    fn test_analysis_completion() {
        assert!(matches!(
            validate_analysis_completion(AnalysisStatus::Concluida, Some("falta de treinamento"), None),
            Err(CertificationError::IncompleteAnalysis)
        ));
        assert!(validate_analysis_completion(AnalysisStatus::Concluida, None, Some("treinar")).is_err());
        assert!(validate_analysis_completion(
            AnalysisStatus::Concluida,
            Some("falta de treinamento"),
            Some("treinar equipe")
        )
        .is_ok());
        assert!(validate_analysis_completion(AnalysisStatus::EmAnalise, None, None).is_ok());
    }
}
