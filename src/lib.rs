pub mod auth;
pub mod certification;
pub mod core;
pub mod drive;
pub mod main_module;
pub mod security;
pub mod settings;
