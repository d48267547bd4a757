use serde::Serialize;
use uuid::Uuid;

use super::error::CertificationError;
use super::types::text_enum;

text_enum! {
    Role {
        Admin => "ADMIN",
        Manager => "MANAGER",
        Auditor => "AUDITOR",
        Responsible => "RESPONSIBLE",
    }
}

pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
pub const MANAGEMENT: &[Role] = &[Role::Admin, Role::Manager];
pub const COMPLIANCE_WRITERS: &[Role] = &[Role::Admin, Role::Manager, Role::Auditor];
pub const ALL_ROLES: &[Role] = &[Role::Admin, Role::Manager, Role::Auditor, Role::Responsible];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectiveActionField {
    Title,
    Standard,
    Description,
    ResponsibleId,
    StartDate,
    DueDate,
    Status,
    Priority,
}

impl CorrectiveActionField {
    pub const ALL: &'static [CorrectiveActionField] = &[
        Self::Title,
        Self::Standard,
        Self::Description,
        Self::ResponsibleId,
        Self::StartDate,
        Self::DueDate,
        Self::Status,
        Self::Priority,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Standard => "standard",
            Self::Description => "description",
            Self::ResponsibleId => "responsible_id",
            Self::StartDate => "start_date",
            Self::DueDate => "due_date",
            Self::Status => "status",
            Self::Priority => "priority",
        }
    }
}

impl Role {
    /// Corrective-action fields this role may change on an existing action.
    pub fn corrective_action_fields(&self) -> &'static [CorrectiveActionField] {
        match self {
            Role::Admin | Role::Manager | Role::Auditor => CorrectiveActionField::ALL,
            Role::Responsible => &[CorrectiveActionField::Status],
        }
    }
}

/// The caller of a workflow operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    pub fn require_any(&self, roles: &[Role]) -> Result<(), CertificationError> {
        if self.has_any_role(roles) {
            return Ok(());
        }
        Err(CertificationError::Permission(format!(
            "Role {} cannot perform this operation",
            self.role
        )))
    }

    pub fn is_responsible(&self) -> bool {
        self.role == Role::Responsible
    }

    pub fn ensure_action_fields(
        &self,
        touched: &[CorrectiveActionField],
    ) -> Result<(), CertificationError> {
        let allowed = self.role.corrective_action_fields();
        let denied: Vec<&str> = touched
            .iter()
            .filter(|field| !allowed.contains(field))
            .map(|field| field.as_str())
            .collect();
        if denied.is_empty() {
            return Ok(());
        }
        Err(CertificationError::Permission(format!(
            "Role {} cannot change: {}",
            self.role,
            denied.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_role_wire_names() {
        assert_eq!(Role::Manager.to_string(), "MANAGER");
        assert_eq!(Role::from_str("RESPONSIBLE"), Ok(Role::Responsible));
        assert!(Role::from_str("admin").is_err());
    }

    #[test]
    fn test_require_any() {
        let auditor = Actor::new(Uuid::new_v4(), Role::Auditor);
        assert!(auditor.require_any(COMPLIANCE_WRITERS).is_ok());
        assert!(matches!(
            auditor.require_any(MANAGEMENT),
            Err(CertificationError::Permission(_))
        ));
    }

    #[test]
    fn test_responsible_may_only_change_status() {
        let responsible = Actor::new(Uuid::new_v4(), Role::Responsible);
        assert!(responsible
            .ensure_action_fields(&[CorrectiveActionField::Status])
            .is_ok());
        let err = responsible
            .ensure_action_fields(&[
                CorrectiveActionField::Status,
                CorrectiveActionField::DueDate,
                CorrectiveActionField::ResponsibleId,
            ])
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("due_date"));
        assert!(message.contains("responsible_id"));
        assert!(!message.contains("status,"));
    }

    #[test]
    fn test_writers_may_change_everything() {
        let manager = Actor::new(Uuid::new_v4(), Role::Manager);
        assert!(manager
            .ensure_action_fields(CorrectiveActionField::ALL)
            .is_ok());
    }
}
