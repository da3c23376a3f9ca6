//! Terminal formatting helpers.

mod tables;

pub use tables::{print_clients, print_separator, print_tools, status_label, truncate_string};
