//! Ownership decisions for mutating operations. Callers check existence
//! first (404 wins over 403); these functions only answer "may this
//! identity act on this loaded resource".

use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Comment, Post, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Update,
    Delete,
}

impl Action {
    fn verb(self) -> &'static str {
        match self {
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// Posts may be mutated by their author or by an admin.
pub fn authorize_post(actor: &User, post: &Post, action: Action) -> Result<(), ApiError> {
    if post.author_id == actor.id || actor.is_admin {
        Ok(())
    } else {
        Err(ApiError::forbidden_action(action.verb(), "post"))
    }
}

/// Comments may be mutated by their author only; no admin override.
pub fn authorize_comment(actor_id: Uuid, comment: &Comment, action: Action) -> Result<(), ApiError> {
    if comment.author_id == actor_id {
        Ok(())
    } else {
        Err(ApiError::forbidden_action(action.verb(), "comment"))
    }
}
