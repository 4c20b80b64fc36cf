pub mod alarm;
pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod reminder;
pub mod scanner;
pub mod storage;
pub mod suggest;
pub mod tui;
pub mod view;
