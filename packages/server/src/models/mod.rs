pub mod achievement;
pub mod admin;
pub mod announcement;
pub mod auth;
pub mod erp;
pub mod shared;
pub mod student;
pub mod upload;
