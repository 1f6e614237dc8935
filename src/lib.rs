pub mod api;
pub mod auth;
pub mod config;
pub mod deleter;
pub mod models;
pub mod redirect;
pub mod rpc;
pub mod shortener;
pub mod storage;
