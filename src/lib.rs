pub mod config;
pub mod dedup;
pub mod diag;
pub mod dom;
pub mod extract;
pub mod inject;
pub mod lifecycle;
pub mod processor;
pub mod translate;
