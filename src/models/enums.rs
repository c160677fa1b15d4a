use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(WorkflowStatus {
    Planning => "planning",
    CollectingInfo => "collecting_info",
    Researching => "researching",
    Drafting => "drafting",
    Reviewing => "reviewing",
    Complete => "complete",
});

str_enum!(SectionPriority {
    Essential => "essential",
    Important => "important",
    Optional => "optional",
});

str_enum!(SectionStatus {
    Draft => "draft",
    Reviewed => "reviewed",
    Final => "final",
});

str_enum!(SeverityTier {
    Critical => "critical",
    High => "high",
    Medium => "medium",
    Low => "low",
});

str_enum!(Stage {
    Intake => "intake",
    CollectInfo => "collect_info",
    JurisdictionAnalysis => "jurisdiction_analysis",
    TemplateDiscovery => "template_discovery",
    Architecture => "architecture",
    Drafting => "drafting",
    LegalReview => "legal_review",
    Complete => "complete",
});

str_enum!(MessageRole {
    User => "user",
    Assistant => "assistant",
    System => "system",
});

impl SeverityTier {
    /// Tier implied by a 1-10 risk score.
    pub fn from_score(score: u8) -> Self {
        match score {
            9.. => Self::Critical,
            7..=8 => Self::High,
            4..=6 => Self::Medium,
            _ => Self::Low,
        }
    }

    /// Lenient parse of generator output ("Severe", "HIGH", "med").
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "critical" | "severe" | "blocker" => Some(Self::Critical),
            "high" | "major" => Some(Self::High),
            "medium" | "med" | "moderate" => Some(Self::Medium),
            "low" | "minor" | "info" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn all() -> &'static [SeverityTier] {
        &[Self::Critical, Self::High, Self::Medium, Self::Low]
    }
}

impl Stage {
    /// Workflow status reported while this stage is the current step.
    pub fn status(&self) -> WorkflowStatus {
        match self {
            Self::Intake | Self::CollectInfo => WorkflowStatus::CollectingInfo,
            Self::JurisdictionAnalysis | Self::TemplateDiscovery => WorkflowStatus::Researching,
            Self::Architecture => WorkflowStatus::Planning,
            Self::Drafting => WorkflowStatus::Drafting,
            Self::LegalReview => WorkflowStatus::Reviewing,
            Self::Complete => WorkflowStatus::Complete,
        }
    }

    pub fn all() -> &'static [Stage] {
        &[
            Self::Intake,
            Self::CollectInfo,
            Self::JurisdictionAnalysis,
            Self::TemplateDiscovery,
            Self::Architecture,
            Self::Drafting,
            Self::LegalReview,
            Self::Complete,
        ]
    }
}

impl SectionPriority {
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "essential" | "required" | "critical" => Self::Essential,
            "optional" | "nice_to_have" => Self::Optional,
            _ => Self::Important,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn workflow_status_round_trips_through_str() {
        for status in [
            WorkflowStatus::Planning,
            WorkflowStatus::CollectingInfo,
            WorkflowStatus::Researching,
            WorkflowStatus::Drafting,
            WorkflowStatus::Reviewing,
            WorkflowStatus::Complete,
        ] {
            assert_eq!(WorkflowStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_value_is_invalid_enum() {
        let err = SectionStatus::from_str("published").unwrap_err();
        assert!(err.to_string().contains("SectionStatus"));
    }

    #[test]
    fn serde_uses_snake_case_names() {
        let json = serde_json::to_string(&WorkflowStatus::CollectingInfo).unwrap();
        assert_eq!(json, "\"collecting_info\"");
    }

    #[test]
    fn stage_names_parse() {
        for stage in Stage::all() {
            assert_eq!(Stage::from_str(stage.as_str()).unwrap(), *stage);
        }
        assert_eq!(Stage::LegalReview.status(), WorkflowStatus::Reviewing);
    }

    #[test]
    fn severity_from_score_boundaries() {
        assert_eq!(SeverityTier::from_score(10), SeverityTier::Critical);
        assert_eq!(SeverityTier::from_score(9), SeverityTier::Critical);
        assert_eq!(SeverityTier::from_score(7), SeverityTier::High);
        assert_eq!(SeverityTier::from_score(4), SeverityTier::Medium);
        assert_eq!(SeverityTier::from_score(3), SeverityTier::Low);
        assert_eq!(SeverityTier::from_score(1), SeverityTier::Low);
    }

    #[test]
    fn severity_parse_is_lenient() {
        assert_eq!(SeverityTier::parse_lenient(" HIGH "), Some(SeverityTier::High));
        assert_eq!(SeverityTier::parse_lenient("moderate"), Some(SeverityTier::Medium));
        assert_eq!(SeverityTier::parse_lenient("unknown"), None);
    }

    #[test]
    fn priority_defaults_to_important() {
        assert_eq!(SectionPriority::parse_lenient("essential"), SectionPriority::Essential);
        assert_eq!(SectionPriority::parse_lenient("???"), SectionPriority::Important);
    }
}
