use serde::{Deserialize, Deserializer};

/// Declares a status-like enum stored as text, with its wire name used for
/// serde, `Display` and `FromStr`.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Unknown {}: {s}", stringify!($name))),
                }
            }
        }
    };
}

pub(crate) use text_enum;

text_enum! {
    ConformityStatus {
        Conforme => "conforme",
        NcMenor => "nc_menor",
        NcMaior => "nc_maior",
        OportunidadeMelhoria => "oportunidade_melhoria",
        NaoSeAplica => "nao_se_aplica",
    }
}

impl Default for ConformityStatus {
    fn default() -> Self {
        Self::Conforme
    }
}

impl ConformityStatus {
    /// Statuses that need a remediation schedule on their corrective actions.
    pub fn requires_schedule(&self) -> bool {
        matches!(
            self,
            Self::NcMenor | Self::NcMaior | Self::OportunidadeMelhoria
        )
    }

    pub fn is_nonconformity(&self) -> bool {
        matches!(self, Self::NcMenor | Self::NcMaior)
    }
}

text_enum! {
    ActionStatus {
        Aberta => "aberta",
        EmAndamento => "em_andamento",
        EmValidacao => "em_validacao",
        Concluida => "concluida",
        Bloqueada => "bloqueada",
    }
}

impl Default for ActionStatus {
    fn default() -> Self {
        Self::Aberta
    }
}

impl ActionStatus {
    pub const ACTIVE: [ActionStatus; 3] = [Self::Aberta, Self::EmAndamento, Self::EmValidacao];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn active_values() -> Vec<&'static str> {
        Self::ACTIVE.iter().map(|s| s.as_str()).collect()
    }
}

text_enum! {
    Priority {
        Baixa => "baixa",
        Media => "media",
        Alta => "alta",
        Critica => "critica",
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Media
    }
}

text_enum! {
    EvidenceKind {
        Arquivo => "arquivo",
        Link => "link",
        Texto => "texto",
    }
}

text_enum! {
    DocumentStatus {
        EmConstrucao => "em_construcao",
        EmRevisao => "em_revisao",
        Aprovado => "aprovado",
        Reprovado => "reprovado",
    }
}

impl Default for DocumentStatus {
    fn default() -> Self {
        Self::EmConstrucao
    }
}

impl DocumentStatus {
    pub fn is_review_decision(&self) -> bool {
        matches!(self, Self::Aprovado | Self::Reprovado)
    }
}

text_enum! {
    MonitoringStatus {
        SemDados => "sem_dados",
        Conforme => "conforme",
        Alerta => "alerta",
        Critico => "critico",
    }
}

impl Default for MonitoringStatus {
    fn default() -> Self {
        Self::SemDados
    }
}

text_enum! {
    NotificationStatus {
        Aberta => "aberta",
        EmTratamento => "em_tratamento",
        Resolvida => "resolvida",
        Cancelada => "cancelada",
    }
}

impl Default for NotificationStatus {
    fn default() -> Self {
        Self::Aberta
    }
}

impl NotificationStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Aberta | Self::EmTratamento)
    }
}

text_enum! {
    AnalysisStatus {
        Aberta => "aberta",
        EmAnalise => "em_analise",
        Concluida => "concluida",
    }
}

impl Default for AnalysisStatus {
    fn default() -> Self {
        Self::Aberta
    }
}

/// Lets PATCH bodies tell an absent field (`None`) from an explicit `null`
/// (`Some(None)`).
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_conformity_status_text_round_trip() {
        for status in ConformityStatus::ALL {
            let parsed = ConformityStatus::from_str(status.as_str()).expect("known status");
            assert_eq!(&parsed, status);
            assert_eq!(status.to_string(), status.as_str());
        }
        assert!(ConformityStatus::from_str("NC_MAIOR").is_err());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&ConformityStatus::OportunidadeMelhoria).expect("json");
        assert_eq!(json, "\"oportunidade_melhoria\"");
        let status: ActionStatus = serde_json::from_str("\"em_validacao\"").expect("parse");
        assert_eq!(status, ActionStatus::EmValidacao);
    }

    #[test]
    fn test_schedule_and_active_sets() {
        assert!(ConformityStatus::NcMenor.requires_schedule());
        assert!(ConformityStatus::OportunidadeMelhoria.requires_schedule());
        assert!(!ConformityStatus::Conforme.requires_schedule());
        assert!(!ConformityStatus::NaoSeAplica.requires_schedule());

        assert!(ActionStatus::Aberta.is_active());
        assert!(ActionStatus::EmValidacao.is_active());
        assert!(!ActionStatus::Concluida.is_active());
        assert!(!ActionStatus::Bloqueada.is_active());
        assert_eq!(
            ActionStatus::active_values(),
            vec!["aberta", "em_andamento", "em_validacao"]
        );
    }

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "deserialize_some")]
        notes: Option<Option<String>>,
    }

    #[test]
    fn test_deserialize_some_distinguishes_null() {
        let absent: Patch = serde_json::from_str("{}").expect("absent");
        assert_eq!(absent.notes, None);
        let null: Patch = serde_json::from_str(r#"{"notes": null}"#).expect("null");
        assert_eq!(null.notes, Some(None));
        let set: Patch = serde_json::from_str(r#"{"notes": "x"}"#).expect("set");
        assert_eq!(set.notes, Some(Some("x".to_string())));
    }
}
