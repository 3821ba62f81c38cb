use serde::Deserialize;
use tracing::{error, info};

use crate::auth::service::{AuthResponse, AuthService};
use crate::auth::validation::{
    validate_email, validate_login, validate_name, validate_new_password, ValidationErrors,
};
use crate::error::{AppError, AuthError};
use crate::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub accept_terms: bool,
}

pub async fn login(service: &AuthService, form: &LoginForm) -> Result<AuthResponse> {
    service.clear_error().await;
    validate_login(&form.email, &form.password)?;

    // lets the form tell "no such user" apart from a wrong password
    if service.find_by_email(&form.email).await.is_none() {
        info!("Login attempt for unknown email: {}", form.email);
        return Err(AuthError::UserNotFound.into());
    }

    info!("Submitting login for email: {}", form.email);
    service.login(&form.email, &form.password).await.map_err(|e| {
        error!("Login failed for email: {}: {}", form.email, e);
        e
    })
}

pub async fn register(service: &AuthService, form: &RegisterForm) -> Result<AuthResponse> {
    service.clear_error().await;

    let mut errors = ValidationErrors::new();
    if let Some(message) = validate_name(&form.name) {
        errors.add("name", message);
    }
    if let Some(message) = validate_email(&form.email) {
        errors.add("email", message);
    } else if service.is_email_taken(&form.email).await {
        errors.add("email", AuthError::EmailTaken.to_string());
    }
    if let Some(message) = validate_new_password(&form.password) {
        errors.add("password", message);
    }
    if form.password != form.confirm_password {
        errors.add("confirm_password", "Passwords do not match");
    }
    if !form.accept_terms {
        errors.add("accept_terms", "You must accept the terms and conditions");
    }
    errors.into_result().map_err(AppError::from)?;

    info!("Submitting registration for email: {}", form.email);
    service
        .register(&form.name, &form.email, &form.password)
        .await
        .map_err(|e| {
            error!("Registration failed for email: {}: {}", form.email, e);
            e
        })
}
