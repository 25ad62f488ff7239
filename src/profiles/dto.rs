use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub course: Option<String>,
    pub age: Option<i32>,
    pub semester: Option<i32>,
    pub interests: Vec<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub bio: Option<String>,
    pub course: Option<String>,
    pub age: Option<i32>,
    pub semester: Option<i32>,
    #[serde(default)]
    pub interests: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

fn trimmed(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl UpdateProfileRequest {
    /// Trims text fields, drops blank and repeated interests, checks ranges.
    pub fn normalize(self) -> Result<Self, AppError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::InvalidArgument("Name is required".into()));
        }
        if matches!(self.age, Some(a) if !(1..=130).contains(&a)) {
            return Err(AppError::InvalidArgument("Invalid age".into()));
        }
        if matches!(self.semester, Some(s) if !(1..=20).contains(&s)) {
            return Err(AppError::InvalidArgument("Invalid semester".into()));
        }

        let mut interests: Vec<String> = Vec::with_capacity(self.interests.len());
        for i in self.interests {
            let i = i.trim().to_string();
            if !i.is_empty() && !interests.contains(&i) {
                interests.push(i);
            }
        }

        Ok(Self {
            name,
            bio: trimmed(self.bio),
            course: trimmed(self.course),
            age: self.age,
            semester: self.semester,
            interests,
        })
    }
}
