// handlers/mod.rs - Two handler tiers
//
// Public (no auth) → Protected (JWT auth + active profile resolution)
pub mod protected; // /api/*, behind jwt_auth_middleware + active_profile_middleware
pub mod public; // /, /health
