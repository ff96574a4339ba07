//! Handler: enroll_courses
//!
//! Touches the course and one enrollment document per new user, so the
//! service runs transactionally.

use serde_json::json;
use schoolbus::{CommandError, Datum};

use super::Ctx;

pub const METHOD: &str = "enroll";

pub fn handle(ctx: &mut Ctx<'_>) -> Result<Datum, CommandError> {
    let course_id: String = ctx.arg(0)?;
    let users: Vec<String> = ctx.arg(1)?;

    let mut course = ctx.repository("courses").get(&course_id)?;
    let mut enrolled: Vec<String> = serde_json::from_value(course["users"].clone())?;

    let mut added = Vec::new();
    for user in users {
        if enrolled.contains(&user) || added.contains(&user) {
            continue;
        }
        ctx.repository("enrollments").insert(json!({
            "_id": format!("{}:{}", course_id, user),
            "courseId": course_id,
            "userId": user,
        }))?;
        added.push(user);
    }

    enrolled.extend(added.iter().cloned());
    course["users"] = json!(enrolled);
    ctx.repository("courses").update(&course_id, course)?;
    ctx.notifier().notify_enrollment(&course_id, &added, &[])?;

    Ok(Datum::from(json!({ "courseId": course_id, "added": added })))
}
