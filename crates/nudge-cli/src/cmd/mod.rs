pub mod channels;
pub mod db;
pub mod serve;
pub mod trigger;
pub mod upcoming;
