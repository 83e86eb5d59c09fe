pub mod app;
pub mod crypto;
pub mod generator;
pub mod input;
pub mod logging;
pub mod models;
pub mod selection;
pub mod storage;
pub mod ui;
