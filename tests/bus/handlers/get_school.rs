//! Handler: getSchool_schools

use schoolbus::{CommandError, Datum};

use super::Ctx;

pub const METHOD: &str = "getSchool";

pub fn handle(ctx: &mut Ctx<'_>) -> Result<Datum, CommandError> {
    let id: String = ctx.arg(0)?;
    let school = ctx.repository("schools").get(&id)?;
    Ok(Datum::from(school))
}
