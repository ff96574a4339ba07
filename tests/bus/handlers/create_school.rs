//! Handler: createSchool_schools
//!
//! The school id is derived from its name and code, so replaying the same
//! create hits the unique `_id` constraint.

use serde::Deserialize;
use serde_json::json;
use schoolbus::{CommandError, Datum};

use super::Ctx;

pub const METHOD: &str = "createSchool";

#[derive(Deserialize)]
pub struct Input {
    pub name: String,
    pub code: String,
}

pub fn handle(ctx: &mut Ctx<'_>) -> Result<Datum, CommandError> {
    let input: Input = ctx.arg(0)?;
    if input.name.trim().is_empty() {
        return Err(CommandError::Validation("school name is required".into()));
    }

    let id = format!("{}_{}", input.name, input.code);
    ctx.repository("schools")
        .insert(json!({ "_id": id, "name": input.name, "code": input.code }))?;

    ctx.producer().send_command_async(
        "audit",
        "record",
        vec![Datum::from(format!("school {} created", id))],
    )?;

    Ok(Datum::from(json!({ "_id": id })))
}
