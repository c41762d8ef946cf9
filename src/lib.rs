pub mod ai;
pub mod app_service;
pub mod commands;
pub mod config;
pub mod storage;
pub mod survey;
pub mod ui;
