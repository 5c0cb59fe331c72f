// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Security Level: JWT Authentication Required
// Route Prefix: /api/*
// Middleware: JWT validation, then active profile resolution. Handlers receive
// `AuthParent` and `ActiveIdentity` as request extensions.

pub mod logs; // Per-category activity logs
pub mod medications; // Medication schedules
pub mod profile; // Active profile, children, switching
pub mod rewards; // Balance, ledger, achievements, badges, leaderboard
