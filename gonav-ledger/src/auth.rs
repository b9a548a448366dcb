//! Phone + PIN accounts
//!
//! PINs are stored as SHA-256 hex digests. This is credential matching,
//! not hardened authentication.

use crate::{
    types::{User, UserRole},
    Error, Ledger, Result, Store,
};
use chrono::Utc;
use sha2::{Digest, Sha256};

/// SHA-256 hex digest of a PIN
pub fn hash_pin(pin: &str) -> String {
    format!("{:x}", Sha256::digest(pin.as_bytes()))
}

fn find_by_phone(store: &Store, phone: &str) -> Result<Option<User>> {
    Ok(store.list_by_key::<User>("phone", phone)?.into_iter().next())
}

impl Ledger {
    /// Register a new leader account
    pub async fn register(
        &self,
        name: &str,
        phone: &str,
        pin: &str,
        group_id: Option<&str>,
    ) -> Result<User> {
        if pin.is_empty() {
            return Err(Error::InvalidCredentials);
        }

        let now = Utc::now();
        let user = User {
            id: String::new(),
            name: name.to_string(),
            phone: phone.to_string(),
            pin_hash: hash_pin(pin),
            role: UserRole::Leader,
            group_ids: group_id.map(str::to_string).into_iter().collect(),
            created_at: now,
            updated_at: now,
        };

        self.run("register", move |store| {
            if find_by_phone(store, &user.phone)?.is_some() {
                return Err(Error::ConstraintViolation(format!(
                    "phone {} is already registered",
                    user.phone
                )));
            }
            let user = store.insert(user)?;
            tracing::info!(user_id = %user.id, "User registered");
            Ok(user)
        })
        .await
    }

    /// Match a phone/PIN pair
    pub async fn login(&self, phone: &str, pin: &str) -> Result<User> {
        let phone = phone.to_string();
        let pin_hash = hash_pin(pin);

        self.run("login", move |store| {
            let user = find_by_phone(store, &phone)?
                .ok_or_else(|| Error::NotFound(format!("user with phone {}", phone)))?;
            if user.pin_hash != pin_hash {
                return Err(Error::InvalidCredentials);
            }
            Ok(user)
        })
        .await
    }

    /// Replace a user's PIN after checking the old one
    pub async fn change_pin(&self, user_id: &str, old_pin: &str, new_pin: &str) -> Result<User> {
        if new_pin.is_empty() {
            return Err(Error::InvalidCredentials);
        }

        let user_id = user_id.to_string();
        let old_hash = hash_pin(old_pin);
        let new_hash = hash_pin(new_pin);

        self.run("change_pin", move |store| {
            let mut user: User = store.require(&user_id)?;
            if user.pin_hash != old_hash {
                return Err(Error::InvalidCredentials);
            }
            user.pin_hash = new_hash;
            user.updated_at = Utc::now();
            store.put(user)
        })
        .await
    }

    /// Get user by id
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let user_id = user_id.to_string();
        self.run("get_user", move |store| store.get(&user_id)).await
    }

    /// Get user by phone number
    pub async fn get_user_by_phone(&self, phone: &str) -> Result<Option<User>> {
        let phone = phone.to_string();
        self.run("get_user_by_phone", move |store| find_by_phone(store, &phone))
            .await
    }

    /// Update a user's profile; the PIN only changes through [`Ledger::change_pin`]
    pub async fn update_user(&self, user: User) -> Result<User> {
        self.run("update_user", move |store| {
            let stored: User = store.require(&user.id)?;
            store.put(User {
                pin_hash: stored.pin_hash,
                created_at: stored.created_at,
                updated_at: Utc::now(),
                ..user
            })
        })
        .await
    }
}
