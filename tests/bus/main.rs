//! Command bus integration tests.

mod support;
mod handlers;
mod end_to_end;
mod delivery;
mod ordering;
mod retry;
