//! End-to-end scenarios driven through the public API.

mod test_utils;

mod continuation;
mod duplicates_csv;
mod general;
mod update_flow;
