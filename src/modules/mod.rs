//! Generation modules: request assembly, submission and polling.

pub mod image;
pub mod poll;
pub mod video;
