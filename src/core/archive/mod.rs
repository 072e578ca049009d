pub mod installer;

pub use installer::{extract_zip, place, Placement};
