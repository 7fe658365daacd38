//! Enrollment records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CourseId, UserId};

/// Grants a user access to a course.
///
/// Unique per (user, course) pair: redelivering a checkout-completed event
/// must never create a second enrollment for the same pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    /// The enrolled user.
    pub user_id: UserId,

    /// The course the user is enrolled in.
    pub course_id: CourseId,

    /// When the enrollment was created locally.
    pub created_at: DateTime<Utc>,
}

impl Enrollment {
    /// Create a new enrollment for a (user, course) pair.
    #[must_use]
    pub fn new(user_id: UserId, course_id: CourseId) -> Self {
        Self {
            user_id,
            course_id,
            created_at: Utc::now(),
        }
    }
}
