pub mod record;
pub mod strike;
pub mod ticket;
