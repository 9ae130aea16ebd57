pub mod error;
pub mod projects;
pub mod repos;
pub mod site;
