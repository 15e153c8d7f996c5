mod achievement;
mod admin;
mod common;
mod erp;
