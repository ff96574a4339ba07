//! Handler: record_audit: republishes its label on the updates topic.

use schoolbus::{CommandError, Datum, UpdateEvent};

use super::Ctx;

pub const METHOD: &str = "record";

pub const RECORDED: &str = "auditRecorded";

pub fn handle(ctx: &mut Ctx<'_>) -> Result<Datum, CommandError> {
    let label: String = ctx.arg(0)?;
    ctx.notifier()
        .notify(vec![UpdateEvent::new(RECORDED, vec![Datum::from(label)])], None)?;
    Ok(Datum::Null)
}
