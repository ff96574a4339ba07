//! Handler: createCourse_courses

use serde::Deserialize;
use serde_json::json;
use schoolbus::{CommandError, Datum, UpdateEvent};

use super::Ctx;

pub const METHOD: &str = "createCourse";

#[derive(Deserialize)]
pub struct Input {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
}

pub fn handle(ctx: &mut Ctx<'_>) -> Result<Datum, CommandError> {
    let input: Input = ctx.arg(0)?;
    let starts_at = ctx
        .raw_arg(0)
        .and_then(|course| course.get("startsAt"))
        .and_then(Datum::as_date)
        .copied()
        .ok_or_else(|| CommandError::Validation("startsAt must be a date".into()))?;

    let course = Datum::from(json!({
        "_id": input.id,
        "title": input.title,
        "startsAt": Datum::from(starts_at).to_json(),
        "users": [],
    }));
    ctx.repository("courses").insert(course.to_json())?;
    ctx.notifier()
        .notify(vec![UpdateEvent::course_created(course.clone())], None)?;

    Ok(course)
}
