pub mod common;

mod retry_end_to_end;
mod single_flight;
