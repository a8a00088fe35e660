//! Sign-up, sign-in, and profile edits

use chrono::{DateTime, Local};
use gymtrack_api::{EnrollmentStatus, UserRole, collections};
use gymtrack_remote::{AuthProvider, DocumentStore};
use gymtrack_util::{CountryCode, GymError, Result, UserId, is_email_valid, is_valid_phone, validate_password};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::membership::{load_profile, object};

/// Fields collected by the registration screen
#[derive(Debug, Clone)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub country: CountryCode,
    pub phone: String,
    pub password: String,
    pub confirm_password: String,
}

/// Result of a successful sign-in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignIn {
    pub user_id: UserId,
    /// Older accounts may not have a phone number yet
    pub needs_phone: bool,
}

fn check_phone(country: &CountryCode, phone: &str) -> Result<()> {
    if !is_valid_phone(phone, country.max_length) {
        return Err(GymError::validation(format!(
            "Phone number must be {} digits.",
            country.max_length
        )));
    }
    Ok(())
}

pub struct AccountService {
    store: Arc<dyn DocumentStore>,
    auth: Arc<dyn AuthProvider>,
}

impl AccountService {
    pub fn new(store: Arc<dyn DocumentStore>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { store, auth }
    }

    pub async fn sign_up(&self, form: &SignUpForm, now: DateTime<Local>) -> Result<UserId> {
        let name = form.name.trim();
        let email = form.email.trim();

        if name.is_empty()
            || email.is_empty()
            || form.phone.trim().is_empty()
            || form.password.is_empty()
            || form.confirm_password.is_empty()
        {
            return Err(GymError::validation("Please fill all fields."));
        }
        if !is_email_valid(email) {
            return Err(GymError::validation("Please enter a valid email address."));
        }
        check_phone(&form.country, &form.phone)?;
        validate_password(&form.password)?;
        if form.password != form.confirm_password {
            return Err(GymError::validation("Passwords do not match."));
        }

        let user_id = self.auth.create_user(email, &form.password).await?;
        if let Err(e) = self.auth.update_display_name(&user_id, name).await {
            warn!(user_id = %user_id, error = %e, "Failed to set auth display name");
        }

        let profile = object(json!({
            "displayName": name,
            "email": email,
            "phone": form.country.full_number(&form.phone),
            "hasProvidedPhone": true,
            "role": UserRole::Member,
            "gymId": null,
            "enrollmentStatus": EnrollmentStatus::None,
            "planDuration": 1,
            "timeSlot": null,
            "createdAt": now.to_rfc3339(),
        }));
        self.store
            .set(collections::USERS, user_id.as_str(), profile)
            .await?;

        info!(user_id = %user_id, "Account created");
        Ok(user_id)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignIn> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(GymError::validation("Please enter email and password."));
        }

        let user_id = self.auth.sign_in(email, password).await?;
        let needs_phone = match load_profile(self.store.as_ref(), &user_id).await {
            Ok(profile) => {
                !profile.has_provided_phone
                    || profile.phone.as_deref().is_none_or(|p| p.trim().is_empty())
            }
            Err(GymError::UserNotFound(_)) => true,
            Err(e) => return Err(e),
        };

        info!(user_id = %user_id, needs_phone, "Signed in");
        Ok(SignIn {
            user_id,
            needs_phone,
        })
    }

    pub async fn update_phone(
        &self,
        user_id: &UserId,
        country: &CountryCode,
        phone: &str,
        now: DateTime<Local>,
    ) -> Result<()> {
        check_phone(country, phone)?;
        self.store
            .update(
                collections::USERS,
                user_id.as_str(),
                object(json!({
                    "phone": country.full_number(phone),
                    "hasProvidedPhone": true,
                    "updatedAt": now.to_rfc3339(),
                })),
            )
            .await?;
        Ok(())
    }

    pub async fn change_password(
        &self,
        user_id: &UserId,
        current: &str,
        new: &str,
        confirm: &str,
    ) -> Result<()> {
        if current.is_empty() || new.is_empty() || confirm.is_empty() {
            return Err(GymError::validation("Please fill all fields."));
        }
        validate_password(new)?;
        if new != confirm {
            return Err(GymError::validation(
                "New password and confirm password do not match",
            ));
        }
        if new == current {
            return Err(GymError::validation(
                "New password must be different from the current password",
            ));
        }

        self.auth.update_password(user_id, current, new).await?;
        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    pub async fn update_display_name(
        &self,
        user_id: &UserId,
        name: &str,
        now: DateTime<Local>,
    ) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GymError::validation("Display name cannot be empty"));
        }

        self.auth.update_display_name(user_id, name).await?;
        self.store
            .update(
                collections::USERS,
                user_id.as_str(),
                object(json!({
                    "displayName": name,
                    "updatedAt": now.to_rfc3339(),
                })),
            )
            .await?;
        Ok(())
    }
}
