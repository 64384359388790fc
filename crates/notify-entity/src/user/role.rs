//! Roles that gate restricted notification types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A forum or course role held by a user in one course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CourseRole {
    /// Forum administrator.
    #[serde(rename = "Administrator")]
    ForumAdministrator,
    /// Forum moderator.
    #[serde(rename = "Moderator")]
    ForumModerator,
    /// Forum community teaching assistant.
    #[serde(rename = "Community TA")]
    ForumCommunityTa,
    /// Course staff.
    #[serde(rename = "staff")]
    CourseStaff,
    /// Course instructor.
    #[serde(rename = "instructor")]
    CourseInstructor,
}

impl CourseRole {
    /// Roles that may see reported content.
    pub const FORUM_PRIVILEGED: [CourseRole; 3] = [
        CourseRole::ForumAdministrator,
        CourseRole::ForumModerator,
        CourseRole::ForumCommunityTa,
    ];

    /// Roles that may see staff grading notifications.
    pub const COURSE_STAFF: [CourseRole; 2] =
        [CourseRole::CourseStaff, CourseRole::CourseInstructor];

    /// Return the stored role name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ForumAdministrator => "Administrator",
            Self::ForumModerator => "Moderator",
            Self::ForumCommunityTa => "Community TA",
            Self::CourseStaff => "staff",
            Self::CourseInstructor => "instructor",
        }
    }
}

impl fmt::Display for CourseRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CourseRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Administrator" => Ok(Self::ForumAdministrator),
            "Moderator" => Ok(Self::ForumModerator),
            "Community TA" => Ok(Self::ForumCommunityTa),
            "staff" => Ok(Self::CourseStaff),
            "instructor" => Ok(Self::CourseInstructor),
            other => Err(format!("Unknown course role '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_names_round_trip() {
        for role in CourseRole::FORUM_PRIVILEGED
            .into_iter()
            .chain(CourseRole::COURSE_STAFF)
        {
            assert_eq!(role.as_str().parse::<CourseRole>(), Ok(role));
        }
    }
}
