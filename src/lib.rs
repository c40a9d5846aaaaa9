pub mod app;
pub mod backup;
pub mod config;
pub mod domain;
pub mod error;
pub mod merge;
pub mod normalize;
pub mod output;
pub mod provenance;
pub mod reconcile;
pub mod source;
pub mod tsv;
pub mod unify;
