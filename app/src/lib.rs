pub mod models;
pub mod services;
pub mod tasks;

pub mod config;
pub mod db;

pub mod helper;
