pub mod toml_loader;

pub use toml_loader::{load_roster, load_rubric, load_submission_units};
