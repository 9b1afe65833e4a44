//! Who may create, change or remove which records.
//!
//! Reads are open to everyone. Every mutating handler goes through one of
//! the functions below before touching the repository.

use uuid::Uuid;

use crate::{
    auth::Caller,
    error::{AppError, AppResult},
    models::{image::LooImage, location::Loo, review::Review},
};

/// Records that remember who created them.
pub trait Owned {
    fn owner_id(&self) -> Option<Uuid>;
}

impl Owned for Loo {
    fn owner_id(&self) -> Option<Uuid> {
        self.owner_id
    }
}

impl Owned for LooImage {
    fn owner_id(&self) -> Option<Uuid> {
        self.uploader_id
    }
}

impl Owned for Review {
    fn owner_id(&self) -> Option<Uuid> {
        Some(self.reviewer_id)
    }
}

/// Loos may be added anonymously; an authenticated caller becomes the owner.
pub fn owner_for_new_loo(caller: &Caller) -> Option<Uuid> {
    caller.user_id()
}

pub fn authorize_upload(caller: &Caller) -> AppResult<Uuid> {
    Ok(caller.require_user()?.sub)
}

pub fn authorize_review(caller: &Caller) -> AppResult<Uuid> {
    Ok(caller.require_user()?.sub)
}

/// Only the recorded owner may mutate a record. A record without an owner
/// can never be mutated.
pub fn authorize_mutation(caller: &Caller, record: &impl Owned) -> AppResult<Uuid> {
    let user_id = caller.require_user()?.sub;
    match record.owner_id() {
        Some(owner) if owner == user_id => Ok(user_id),
        _ => {
            tracing::warn!("User {} tried to modify a record it does not own", user_id);
            Err(AppError::Authorization)
        }
    }
}
