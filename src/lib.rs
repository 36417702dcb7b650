pub mod audit;
pub mod auth;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod db;
pub mod dto;
pub mod error;
pub mod hooks;
pub mod middleware;
pub mod models;
pub mod order_link;
pub mod remote;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
