pub mod analysis;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod extract;
pub mod layout;
pub mod locate;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod util;
