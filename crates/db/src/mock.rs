pub mod repositories;

pub use repositories::{MockCallStore, MockSessionEventStore};
