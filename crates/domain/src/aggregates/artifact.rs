//! Revealable content cards shown on the participant board.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{ArtifactVariantId, SessionId};
use crate::value_objects::{RoleName, Title};

const MAX_BODY_LENGTH: usize = 10_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantVisibility {
    #[default]
    Public,
    LeaderOnly,
    /// Shown to participants holding the variant's role, revealed or not.
    RolePrivate,
}

impl fmt::Display for VariantVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Public => "public",
            Self::LeaderOnly => "leader_only",
            Self::RolePrivate => "role_private",
        })
    }
}

pub(crate) fn normalize_body(body: Option<String>) -> Result<Option<String>, DomainError> {
    let body = body.map(|b| b.trim().to_string()).filter(|b| !b.is_empty());
    if body
        .as_ref()
        .is_some_and(|b| b.chars().count() > MAX_BODY_LENGTH)
    {
        return Err(DomainError::validation(format!(
            "Body cannot exceed {} characters",
            MAX_BODY_LENGTH
        )));
    }
    Ok(body)
}

/// One variant of a session artifact (a clue card, a map, a handout).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactVariant {
    id: ArtifactVariantId,
    session_id: SessionId,
    title: Title,
    body: Option<String>,
    #[serde(default)]
    media_ref: Option<serde_json::Value>,
    variant_order: u32,
    visibility: VariantVisibility,
    #[serde(default)]
    visible_to_role: Option<RoleName>,
    revealed_at: Option<DateTime<Utc>>,
    highlighted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ArtifactVariant {
    pub fn new(
        session_id: SessionId,
        title: Title,
        body: Option<String>,
        media_ref: Option<serde_json::Value>,
        variant_order: u32,
        visibility: VariantVisibility,
        visible_to_role: Option<RoleName>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        match (visibility, &visible_to_role) {
            (VariantVisibility::RolePrivate, None) => {
                return Err(DomainError::validation(
                    "Role-private variants must name a role",
                ))
            }
            (VariantVisibility::Public | VariantVisibility::LeaderOnly, Some(_)) => {
                return Err(DomainError::validation(
                    "Only role-private variants are addressed to a role",
                ))
            }
            _ => {}
        }
        Ok(Self {
            id: ArtifactVariantId::new(),
            session_id,
            title,
            body: normalize_body(body)?,
            media_ref,
            variant_order,
            visibility,
            visible_to_role,
            revealed_at: None,
            highlighted_at: None,
            created_at: now,
        })
    }

    pub fn id(&self) -> ArtifactVariantId {
        self.id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn title(&self) -> &Title {
        &self.title
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn media_ref(&self) -> Option<&serde_json::Value> {
        self.media_ref.as_ref()
    }

    pub fn variant_order(&self) -> u32 {
        self.variant_order
    }

    pub fn visibility(&self) -> VariantVisibility {
        self.visibility
    }

    pub fn visible_to_role(&self) -> Option<&RoleName> {
        self.visible_to_role.as_ref()
    }

    pub fn revealed_at(&self) -> Option<DateTime<Utc>> {
        self.revealed_at
    }

    pub fn highlighted_at(&self) -> Option<DateTime<Utc>> {
        self.highlighted_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed_at.is_some()
    }

    /// Only revealed public variants ever reach the board.
    pub fn is_board_visible(&self) -> bool {
        self.visibility == VariantVisibility::Public && self.is_revealed()
    }

    /// What a participant holding `role` may list: revealed public variants
    /// plus the role-private variants addressed to their role.
    pub fn is_visible_to(&self, role: Option<&RoleName>) -> bool {
        match self.visibility {
            VariantVisibility::Public => self.is_revealed(),
            VariantVisibility::LeaderOnly => false,
            VariantVisibility::RolePrivate => {
                role.is_some() && self.visible_to_role.as_ref() == role
            }
        }
    }

    /// Returns `false` when already revealed.
    pub fn reveal(&mut self, now: DateTime<Utc>) -> bool {
        if self.revealed_at.is_some() {
            return false;
        }
        self.revealed_at = Some(now);
        true
    }

    /// Hiding also drops the highlight.
    pub fn hide(&mut self) -> bool {
        let changed = self.revealed_at.is_some() || self.highlighted_at.is_some();
        self.revealed_at = None;
        self.highlighted_at = None;
        changed
    }

    pub fn highlight(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.is_board_visible() {
            return Err(DomainError::constraint(
                "Only revealed public variants can be highlighted",
            ));
        }
        self.highlighted_at = Some(now);
        Ok(())
    }

    pub fn clear_highlight(&mut self) -> bool {
        self.highlighted_at.take().is_some()
    }
}
