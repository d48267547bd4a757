//! Cross-entity consistency checks run before any write is issued.
//!
//! Every function here is pure: callers load the rows involved and pass the
//! denormalized values in, so the same checks serve create and update paths.

use chrono::{Datelike, NaiveDate};
use uuid::Uuid;

use super::error::CertificationError;
use super::types::ConformityStatus;

/// The program/criterion/indicator triple an evaluation is bound to through
/// its indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorScope {
    pub program_id: Uuid,
    pub criterion_id: Uuid,
    pub indicator_id: Uuid,
}

/// Scope columns of an evidence type. Legacy rows may leave any of them unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvidenceTypeScope {
    pub program_id: Option<Uuid>,
    pub criterion_id: Option<Uuid>,
    pub indicator_id: Option<Uuid>,
}

pub fn validate_same_program(
    program_a: Uuid,
    program_b: Uuid,
    context: &str,
) -> Result<(), CertificationError> {
    if program_a != program_b {
        return Err(CertificationError::InconsistentProgram(format!(
            "Program mismatch in {context}: {program_a} != {program_b}"
        )));
    }
    Ok(())
}

pub fn validate_date_order(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    context: &str,
) -> Result<(), CertificationError> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(CertificationError::InvalidDateRange(format!(
                "{context}: end date {end} is before start date {start}"
            )));
        }
    }
    Ok(())
}

/// A single date stands for a zero-length range.
pub fn normalize_optional_date_pair(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    match (start, end) {
        (Some(start), None) => (Some(start), Some(start)),
        (None, Some(end)) => (Some(end), Some(end)),
        pair => pair,
    }
}

pub fn validate_schedule_requirement(
    status: ConformityStatus,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(), CertificationError> {
    if status.requires_schedule() && (start.is_none() || end.is_none()) {
        return Err(CertificationError::MissingSchedule(status.to_string()));
    }
    Ok(())
}

pub fn validate_evidence_type_scope(
    evidence_type: &EvidenceTypeScope,
    target: &IndicatorScope,
) -> Result<(), CertificationError> {
    let (Some(program_id), Some(criterion_id), Some(indicator_id)) = (
        evidence_type.program_id,
        evidence_type.criterion_id,
        evidence_type.indicator_id,
    ) else {
        return Err(CertificationError::EvidenceTypeMismatch(
            "Evidence type must be scoped to a program, criterion and indicator".to_string(),
        ));
    };

    if program_id != target.program_id {
        return Err(CertificationError::EvidenceTypeMismatch(
            "Evidence type belongs to another program".to_string(),
        ));
    }
    if criterion_id != target.criterion_id {
        return Err(CertificationError::EvidenceTypeMismatch(
            "Evidence type belongs to another criterion".to_string(),
        ));
    }
    if indicator_id != target.indicator_id {
        return Err(CertificationError::EvidenceTypeMismatch(
            "Evidence type belongs to another indicator".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_cycle_year(year: i32) -> Result<(), CertificationError> {
    if !(2000..=2100).contains(&year) {
        return Err(CertificationError::Validation(format!(
            "Audit year {year} must be between 2000 and 2100"
        )));
    }
    Ok(())
}

pub fn require_text(value: &str, field: &str) -> Result<String, CertificationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CertificationError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_same_program() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(validate_same_program(a, a, "criterion/principle").is_ok());
        let err = validate_same_program(a, b, "criterion/principle").unwrap_err();
        assert!(matches!(err, CertificationError::InconsistentProgram(_)));
        assert!(err.to_string().contains("criterion/principle"));
    }

    #[test]
    fn test_date_order() {
        assert!(validate_date_order(Some(date(2026, 3, 1)), Some(date(2026, 3, 1)), "x").is_ok());
        assert!(validate_date_order(Some(date(2026, 3, 1)), None, "x").is_ok());
        assert!(validate_date_order(None, None, "x").is_ok());
        let err = validate_date_order(Some(date(2026, 3, 2)), Some(date(2026, 3, 1)), "x")
            .unwrap_err();
        assert!(matches!(err, CertificationError::InvalidDateRange(_)));
    }

    #[test]
    fn test_normalize_mirrors_single_date() {
        let start = date(2026, 3, 1);
        assert_eq!(
            normalize_optional_date_pair(Some(start), None),
            (Some(start), Some(start))
        );
        assert_eq!(
            normalize_optional_date_pair(None, Some(start)),
            (Some(start), Some(start))
        );
        assert_eq!(normalize_optional_date_pair(None, None), (None, None));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let d1 = date(2026, 1, 10);
        let d2 = date(2026, 2, 20);
        let inputs = [
            (None, None),
            (Some(d1), None),
            (None, Some(d2)),
            (Some(d1), Some(d2)),
            (Some(d2), Some(d1)),
        ];
        for (start, end) in inputs {
            let once = normalize_optional_date_pair(start, end);
            let twice = normalize_optional_date_pair(once.0, once.1);
            assert_eq!(once, twice);
            if start.is_some() != end.is_some() {
                assert_eq!(once.0, once.1);
            }
        }
    }

    #[test]
    fn test_schedule_requirement() {
        let d = Some(date(2026, 3, 1));
        for status in [
            ConformityStatus::NcMenor,
            ConformityStatus::NcMaior,
            ConformityStatus::OportunidadeMelhoria,
        ] {
            assert!(validate_schedule_requirement(status, d, d).is_ok());
            assert!(matches!(
                validate_schedule_requirement(status, d, None),
                Err(CertificationError::MissingSchedule(_))
            ));
            assert!(validate_schedule_requirement(status, None, None).is_err());
        }
        assert!(validate_schedule_requirement(ConformityStatus::Conforme, None, None).is_ok());
        assert!(validate_schedule_requirement(ConformityStatus::NaoSeAplica, None, d).is_ok());
    }

    #[test]
    fn test_evidence_type_scope() {
        let target = IndicatorScope {
            program_id: Uuid::new_v4(),
            criterion_id: Uuid::new_v4(),
            indicator_id: Uuid::new_v4(),
        };
        let exact = EvidenceTypeScope {
            program_id: Some(target.program_id),
            criterion_id: Some(target.criterion_id),
            indicator_id: Some(target.indicator_id),
        };
        assert!(validate_evidence_type_scope(&exact, &target).is_ok());

        let partial = EvidenceTypeScope {
            indicator_id: None,
            ..exact
        };
        assert!(matches!(
            validate_evidence_type_scope(&partial, &target),
            Err(CertificationError::EvidenceTypeMismatch(_))
        ));
        assert!(validate_evidence_type_scope(&EvidenceTypeScope::default(), &target).is_err());

        let other_indicator = EvidenceTypeScope {
            indicator_id: Some(Uuid::new_v4()),
            ..exact
        };
        assert!(validate_evidence_type_scope(&other_indicator, &target).is_err());

        let other_program = EvidenceTypeScope {
            program_id: Some(Uuid::new_v4()),
            ..exact
        };
        assert!(validate_evidence_type_scope(&other_program, &target).is_err());
    }

    #[test]
    fn test_cycle_year_bounds() {
        assert!(validate_cycle_year(2000).is_ok());
        assert!(validate_cycle_year(2100).is_ok());
        assert!(validate_cycle_year(1999).is_err());
        assert!(validate_cycle_year(2101).is_err());
    }

    #[test]
    fn test_require_text_and_month() {
        assert_eq!(require_text("  FSC ", "code").expect("text"), "FSC");
        assert!(require_text("   ", "code").is_err());
        assert_eq!(first_day_of_month(date(2026, 5, 17)), date(2026, 5, 1));
    }
}
