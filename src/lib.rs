pub mod cache;
pub mod collector;
pub mod config;
pub mod contact;
pub mod keys;
pub mod source;
pub mod workbook;
