use std::collections::HashMap;

use async_trait::async_trait;

use notify_core::result::AppResult;
use notify_core::types::{CourseKey, UserId};
use notify_entity::user::{CourseRole, CourseSummary, UserProfile};

use super::MemoryStore;
use crate::store::{CourseCatalog, UserDirectory};

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_user(&self, id: UserId) -> AppResult<Option<UserProfile>> {
        Ok(self.tables.users.read().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<UserProfile>> {
        Ok(self
            .tables
            .users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_users(&self, ids: &[UserId]) -> AppResult<Vec<UserProfile>> {
        self.round_trip();
        let users = self.tables.users.read().await;
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn roles_in_course(
        &self,
        user_ids: &[UserId],
        course_id: &CourseKey,
    ) -> AppResult<HashMap<UserId, Vec<CourseRole>>> {
        self.round_trip();
        let roles = self.tables.roles.read().await;
        let mut by_user: HashMap<UserId, Vec<CourseRole>> = HashMap::new();
        for (user_id, course, role) in roles.iter() {
            if course == course_id && user_ids.contains(user_id) {
                by_user.entry(*user_id).or_default().push(*role);
            }
        }
        Ok(by_user)
    }

    async fn roles_anywhere(&self, user_id: UserId) -> AppResult<Vec<CourseRole>> {
        let roles = self.tables.roles.read().await;
        Ok(roles
            .iter()
            .filter(|(user, _, _)| *user == user_id)
            .map(|(_, _, role)| *role)
            .collect())
    }
}

#[async_trait]
impl CourseCatalog for MemoryStore {
    async fn find_course(&self, course_id: &CourseKey) -> AppResult<Option<CourseSummary>> {
        Ok(self.tables.courses.read().await.get(course_id).cloned())
    }
}
