//! Team member model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Record, RecordId, RecordKind};
use crate::error::{Error, Result};
use crate::util::{now_millis, require_text};

/// Role of a member within the team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    /// Team owner
    Owner,
    /// Can manage members and files
    Admin,
    /// Regular member
    #[default]
    Member,
}

impl MemberRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            other => Err(Error::InvalidInput(format!("Unknown member role: {other}"))),
        }
    }
}

/// Membership status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    #[default]
    Active,
    Invited,
    Inactive,
}

impl MemberStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Invited => "invited",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "invited" => Ok(Self::Invited),
            "inactive" => Ok(Self::Inactive),
            other => Err(Error::InvalidInput(format!(
                "Unknown member status: {other}"
            ))),
        }
    }
}

/// A member of the team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    /// Record identifier
    pub id: RecordId,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Role within the team
    #[serde(default)]
    pub role: MemberRole,
    /// Membership status
    #[serde(default)]
    pub status: MemberStatus,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl TeamMember {
    /// Create a new member with a temporary local id.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        role: MemberRole,
    ) -> Result<Self> {
        Ok(Self {
            id: RecordId::new_local(),
            name: require_text(name, "Member name")?,
            email: validate_email(email)?,
            role,
            status: MemberStatus::Active,
            created_at: now_millis(),
        })
    }
}

impl Record for TeamMember {
    const KIND: RecordKind = RecordKind::Member;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }
}

/// Partial update of a member; unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MemberRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MemberStatus>,
}

impl MemberPatch {
    /// Patch that only renames the member
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.role.is_none() && self.status.is_none()
    }

    /// Trim and validate the provided fields.
    pub fn normalized(self) -> Result<Self> {
        if self.is_empty() {
            return Err(Error::InvalidInput(
                "Member update must change at least one field".to_string(),
            ));
        }
        Ok(Self {
            name: self
                .name
                .map(|name| require_text(name, "Member name"))
                .transpose()?,
            email: self.email.map(validate_email).transpose()?,
            role: self.role,
            status: self.status,
        })
    }

    /// Merge the patch into `member`.
    pub fn apply_to(&self, member: &mut TeamMember) {
        if let Some(name) = &self.name {
            member.name.clone_from(name);
        }
        if let Some(email) = &self.email {
            member.email.clone_from(email);
        }
        if let Some(role) = self.role {
            member.role = role;
        }
        if let Some(status) = self.status {
            member.status = status;
        }
    }
}

fn validate_email(email: impl Into<String>) -> Result<String> {
    let email = require_text(email, "Member email")?;
    match email.split_once('@') {
        Some((user, domain)) if !user.is_empty() && !domain.is_empty() => {
            Ok(email.to_ascii_lowercase())
        }
        _ => Err(Error::InvalidInput(format!("Invalid member email: {email}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_new() {
        let member = TeamMember::new("Ana", "Ana@Example.com", MemberRole::Admin).unwrap();
        assert_eq!(member.email, "ana@example.com");
        assert_eq!(member.status, MemberStatus::Active);
        assert!(member.id.is_local());
    }

    #[test]
    fn test_member_rejects_bad_email() {
        assert!(TeamMember::new("Ana", "ana", MemberRole::Member).is_err());
        assert!(TeamMember::new("Ana", "@example.com", MemberRole::Member).is_err());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Admin".parse::<MemberRole>().unwrap(), MemberRole::Admin);
        assert!("boss".parse::<MemberRole>().is_err());
    }

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut member = TeamMember::new("Ana", "ana@example.com", MemberRole::Member).unwrap();
        let patch = MemberPatch {
            role: Some(MemberRole::Owner),
            ..MemberPatch::name("X")
        };
        patch.apply_to(&mut member);

        assert_eq!(member.name, "X");
        assert_eq!(member.role, MemberRole::Owner);
        assert_eq!(member.email, "ana@example.com");
    }

    #[test]
    fn test_empty_patch_is_rejected() {
        assert!(MemberPatch::default().normalized().is_err());
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let json = serde_json::to_value(MemberPatch::name("X")).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "X" }));
    }
}
