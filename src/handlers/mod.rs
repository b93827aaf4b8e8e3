/// HTTP and WebSocket handlers
pub mod auth;
pub mod rest;
pub mod websocket;
