pub mod charset;
pub mod config;
pub mod lock;
pub mod recover;
pub mod relocate;
pub mod report;
pub mod rewrite;
pub mod score;
pub mod util;
pub mod warn;
