pub mod check;
pub mod send;
pub mod serve;
pub mod sources;
