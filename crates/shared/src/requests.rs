//! HTTP request bodies and query strings.
//!
//! Bodies carry raw strings; the engine turns them into validated value
//! objects before touching any aggregate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use liveplay_domain::{
    DecisionAction, DecisionOption, ParticipantRole, SessionAction, SessionSettings, TimerCommand,
    VariantVisibility,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
    #[serde(default)]
    pub activity_id: Option<Uuid>,
    #[serde(default)]
    pub settings: Option<SessionSettings>,
}

/// Host status action (`publish`, `start`, `pause`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionActionRequest {
    pub action: SessionAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetIndexRequest {
    pub index: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetBoardRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub overrides: BTreeMap<String, bool>,
}

pub type TimerRequest = TimerCommand;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub code: String,
    pub display_name: String,
    #[serde(default)]
    pub role: Option<ParticipantRole>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPositionRequest {
    /// `null` clears the position.
    pub position: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignmentRequest {
    pub participant_id: Uuid,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignRolesRequest {
    pub assignments: Vec<RoleAssignmentRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBankDeltaRequest {
    pub delta_seconds: i64,
    pub reason: String,
    #[serde(default)]
    pub min_balance: Option<i64>,
    #[serde(default)]
    pub max_balance: Option<i64>,
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// `?limit=` for list endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

fn default_max_choices() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDecisionRequest {
    pub title: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub options: Vec<DecisionOption>,
    #[serde(default)]
    pub allow_anonymous: bool,
    #[serde(default = "default_max_choices")]
    pub max_choices: u32,
}

/// Either a field edit, a status action, or both (edit applied first).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDecisionRequest {
    #[serde(default)]
    pub action: Option<DecisionAction>,
    #[serde(default)]
    pub title: Option<String>,
    /// Absent leaves the prompt, `null` clears it.
    #[serde(default, with = "double_option")]
    pub prompt: Option<Option<String>>,
    #[serde(default)]
    pub options: Option<Vec<DecisionOption>>,
    #[serde(default)]
    pub allow_anonymous: Option<bool>,
    #[serde(default)]
    pub max_choices: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub option_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateArtifactVariantRequest {
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub media_ref: Option<serde_json::Value>,
    #[serde(default)]
    pub variant_order: u32,
    #[serde(default)]
    pub visibility: VariantVisibility,
    /// Required for `role_private`, rejected otherwise.
    #[serde(default)]
    pub visible_to_role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOutcomeRequest {
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub outcome_type: Option<String>,
}

/// Distinguishes a missing field from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
