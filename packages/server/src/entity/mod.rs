pub mod achievement;
pub mod admin;
pub mod announcement;
pub mod erp_profile;
pub mod student;
