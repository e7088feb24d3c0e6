pub mod assignment;
pub mod catalog;
pub mod combine;
pub mod config;
pub mod due;
pub mod email;
pub mod error;
pub mod export;
pub mod header;
pub mod merge;
pub mod output;
pub mod report;
pub mod score;
pub mod section;
