pub mod catalog;
pub mod jobs;
pub mod pages;
