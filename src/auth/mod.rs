//! Authentication module for NutriZone
//!
//! The mock credential directory and its state machine, the form-level
//! flow in front of it, and the route guards that observe it.

pub mod delay;
pub mod guard;
pub mod handlers;
mod service;
pub mod validation;

pub use delay::{Delay, NoDelay, TokioDelay};
pub use guard::{GuardDecision, RouteGuard};
pub use handlers::{LoginForm, RegisterForm};
pub use service::{AuthResponse, AuthService, AuthSnapshot, AuthStatus};
pub use validation::{password_strength, PasswordStrength, StrengthLevel, ValidationErrors};
