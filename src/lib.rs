// Request user identification
pub mod auth;

// Service configuration
pub mod config;

// Encrypted credential storage
pub mod credentials;

// OAuth authorization-code flow
pub mod oauth;

// Settings-field mediation and redaction
pub mod settings;

// Connection/sync status aggregation
pub mod status;

// Webhook preset toggles
pub mod webhooks;

// HTTP API
pub mod api;
