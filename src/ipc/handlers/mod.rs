pub mod auth;
pub mod core;
pub mod grades;
pub mod portal;
pub mod rankings;
pub mod students;
pub mod views;
