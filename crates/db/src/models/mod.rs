pub mod site;
pub mod user;
