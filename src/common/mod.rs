pub mod api {
    pub mod client;
    pub mod error;
    pub mod models;
    pub mod service;
}

pub mod logger;
pub mod models;
pub mod storage;
pub mod utils;
