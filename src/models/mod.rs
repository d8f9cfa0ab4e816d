pub mod response;
pub mod table;
