pub mod keys;
pub mod models;
pub mod pricing;
pub mod prompts;
pub mod run;
pub mod sessions;
