pub mod db;
pub mod hash;
pub mod http;
pub mod rate_limit;
