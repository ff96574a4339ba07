//! Update notifier: fire-and-forget domain events on the updates topic.
//!
//! Updates carry no correlation key and expect no reply. Each logical
//! operation publishes its events as one batch; consumers deduplicate on
//! their own (entity id + version).

use log::debug;
use serde_json::json;

use crate::envelope::{Datum, Envelope};
use crate::transport::{TransportError, TransportService};

pub const USER_ENROLLED: &str = "userEnrolled";
pub const USER_UNENROLLED: &str = "userUnenrolled";
pub const COURSE_ENROLLMENT: &str = "courseEnrollment";
pub const COURSE_CREATED: &str = "courseCreated";
pub const COURSE_UPDATED: &str = "courseUpdated";
pub const COURSE_DELETED: &str = "courseDeleted";

/// One domain event.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEvent {
    pub name: String,
    pub data: Vec<Datum>,
}

impl UpdateEvent {
    pub fn new(name: impl Into<String>, data: Vec<Datum>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn user_enrolled(user_id: &str, course_id: &str) -> Self {
        Self::new(
            USER_ENROLLED,
            vec![Datum::from(json!({ "userId": user_id, "courseId": course_id }))],
        )
    }

    pub fn user_unenrolled(user_id: &str, course_id: &str) -> Self {
        Self::new(
            USER_UNENROLLED,
            vec![Datum::from(json!({ "userId": user_id, "courseId": course_id }))],
        )
    }

    /// Aggregate event describing one enrollment change on a course.
    pub fn course_enrollment(course_id: &str, added: &[String], removed: &[String]) -> Self {
        Self::new(
            COURSE_ENROLLMENT,
            vec![Datum::from(json!({
                "courseId": course_id,
                "added": added,
                "removed": removed,
            }))],
        )
    }

    pub fn course_created(course: Datum) -> Self {
        Self::new(COURSE_CREATED, vec![course])
    }

    pub fn course_updated(course: Datum) -> Self {
        Self::new(COURSE_UPDATED, vec![course])
    }

    pub fn course_deleted(course_id: &str) -> Self {
        Self::new(
            COURSE_DELETED,
            vec![Datum::from(json!({ "courseId": course_id }))],
        )
    }

    fn into_envelope(self) -> Envelope {
        Envelope::update(self.name, self.data)
    }
}

/// Publishes [`UpdateEvent`]s to the updates topic.
#[derive(Clone)]
pub struct UpdateNotifier {
    transport: TransportService,
    topic: String,
}

impl UpdateNotifier {
    pub fn new(transport: TransportService, topic: impl Into<String>) -> Self {
        Self {
            transport,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish `events` as one batch, to `topic` or the default updates topic.
    pub fn notify(
        &self,
        events: Vec<UpdateEvent>,
        topic: Option<&str>,
    ) -> Result<Vec<Envelope>, TransportError> {
        let topic = topic.unwrap_or(self.topic.as_str());
        let envelopes: Vec<Envelope> = events.into_iter().map(UpdateEvent::into_envelope).collect();
        self.transport.send_many(topic, &envelopes)?;
        debug!("published {} updates to {}", envelopes.len(), topic);
        Ok(envelopes)
    }

    /// One event per affected user plus one aggregate event, in one batch.
    pub fn notify_enrollment(
        &self,
        course_id: &str,
        added: &[String],
        removed: &[String],
    ) -> Result<Vec<Envelope>, TransportError> {
        if added.is_empty() && removed.is_empty() {
            return Ok(Vec::new());
        }
        let mut events: Vec<UpdateEvent> = added
            .iter()
            .map(|user| UpdateEvent::user_enrolled(user, course_id))
            .chain(
                removed
                    .iter()
                    .map(|user| UpdateEvent::user_unenrolled(user, course_id)),
            )
            .collect();
        events.push(UpdateEvent::course_enrollment(course_id, added, removed));
        self.notify(events, None)
    }
}
