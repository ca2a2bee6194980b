pub mod history;
pub mod media;
pub mod response;
pub mod segment;
pub mod turn;
