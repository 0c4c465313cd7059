//! Request payload validation. Required fields are `Option` +
//! `#[validate(required)]` so a missing field surfaces as a field error in
//! the standard envelope rather than a deserialization failure; unknown
//! input fields are dropped by serde. All violations are collected in one
//! pass and reported as `{field, message}` entries.

use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{ApiError, FieldError};
use crate::models::{slugify, NewComment, NewPost, PostPatch};

/// JSON extractor that validates the payload before the handler body runs.
/// Both malformed JSON and constraint violations come back as enveloped
/// 400s.
pub struct ValidJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(payload) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        payload
            .validate()
            .map_err(|errors| ApiError::Validation(flatten_errors(&errors)))?;
        Ok(ValidJson(payload))
    }
}

/// Flatten `ValidationErrors` into per-field entries, one per violated
/// constraint, with camelCase field paths matching the wire names.
/// Struct-level checks land under `__all__`; their error code names the
/// field they belong to.
pub fn flatten_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut out: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, violations)| {
            violations.iter().map(move |v| FieldError {
                field: if *field == "__all__" {
                    to_camel_case(&v.code)
                } else {
                    to_camel_case(field)
                },
                message: v
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| v.code.to_string()),
            })
        })
        .collect();
    out.sort_by(|a, b| a.field.cmp(&b.field));
    out
}

fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper_next = false;
    for c in field.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn validate_uuid(value: &str) -> Result<(), ValidationError> {
    if Uuid::parse_str(value).is_ok() {
        Ok(())
    } else {
        let mut err = ValidationError::new("uuid");
        err.message = Some("must be a valid UUID".into());
        Err(err)
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = passwords_match, skip_on_field_errors = false))]
pub struct RegisterRequest {
    #[validate(
        required(message = "email is required"),
        email(message = "must be a valid email")
    )]
    pub email: Option<String>,
    #[validate(
        required(message = "username is required"),
        length(min = 3, max = 50, message = "must be between 3 and 50 characters")
    )]
    pub username: Option<String>,
    #[validate(
        required(message = "firstName is required"),
        length(min = 1, max = 50, message = "must be between 1 and 50 characters")
    )]
    pub first_name: Option<String>,
    #[validate(
        required(message = "lastName is required"),
        length(min = 1, max = 50, message = "must be between 1 and 50 characters")
    )]
    pub last_name: Option<String>,
    #[validate(url(message = "must be a valid URL"))]
    pub avatar: Option<String>,
    #[validate(
        required(message = "password is required"),
        length(min = 6, message = "must be at least 6 characters")
    )]
    pub password: Option<String>,
    #[validate(required(message = "confirmPassword is required"))]
    pub confirm_password: Option<String>,
}

/// Cross-field rule: a present confirmation must equal the password.
/// Absent fields are the `required` checks' business, not a mismatch.
fn passwords_match(req: &RegisterRequest) -> Result<(), ValidationError> {
    match (&req.password, &req.confirm_password) {
        (Some(password), Some(confirm)) if password != confirm => {
            let mut err = ValidationError::new("confirm_password");
            err.message = Some("Passwords don't match".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

/// Validated registration data with the declared fields only.
#[derive(Debug)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub password: String,
}

impl RegisterRequest {
    pub fn into_registration(self) -> Result<Registration, ApiError> {
        match (self.email, self.username, self.first_name, self.last_name, self.password) {
            (Some(email), Some(username), Some(first_name), Some(last_name), Some(password)) => {
                Ok(Registration {
                    email,
                    username,
                    first_name,
                    last_name,
                    avatar: self.avatar,
                    password,
                })
            }
            // Unreachable after validation; kept total rather than panicking
            _ => Err(ApiError::internal("validated payload missing required fields")),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(
        required(message = "email is required"),
        email(message = "must be a valid email")
    )]
    pub email: Option<String>,
    #[validate(
        required(message = "password is required"),
        length(min = 6, message = "must be at least 6 characters")
    )]
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn into_credentials(self) -> Result<(String, String), ApiError> {
        match (self.email, self.password) {
            (Some(email), Some(password)) => Ok((email, password)),
            _ => Err(ApiError::internal("validated payload missing required fields")),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[validate(
        required(message = "title is required"),
        length(min = 1, max = 200, message = "must be between 1 and 200 characters")
    )]
    pub title: Option<String>,
    #[validate(
        required(message = "content is required"),
        length(min = 1, message = "must not be empty")
    )]
    pub content: Option<String>,
    pub published: Option<bool>,
}

impl CreatePostRequest {
    pub fn into_new_post(self) -> Result<NewPost, ApiError> {
        match (self.title, self.content) {
            (Some(title), Some(content)) => {
                let slug = slugify(&title);
                Ok(NewPost {
                    title,
                    slug,
                    content,
                    published: self.published.unwrap_or(false),
                })
            }
            _ => Err(ApiError::internal("validated payload missing required fields")),
        }
    }
}

/// Create-post schema with every field optional; absent fields are left
/// untouched by the write.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub content: Option<String>,
    pub published: Option<bool>,
}

impl UpdatePostRequest {
    pub fn into_patch(self) -> PostPatch {
        PostPatch {
            title: self.title,
            content: self.content,
            published: self.published,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    #[validate(
        required(message = "content is required"),
        length(min = 1, max = 1000, message = "must be between 1 and 1000 characters")
    )]
    pub content: Option<String>,
    #[validate(
        required(message = "postId is required"),
        custom(function = validate_uuid)
    )]
    pub post_id: Option<String>,
    #[validate(custom(function = validate_uuid))]
    pub parent_id: Option<String>,
}

impl CreateCommentRequest {
    pub fn into_new_comment(self) -> Result<NewComment, ApiError> {
        match (self.content, self.post_id) {
            (Some(content), Some(post_id)) => {
                let post_id = Uuid::parse_str(&post_id).map_err(|_| ApiError::InvalidId)?;
                let parent_id = match self.parent_id {
                    Some(raw) => Some(Uuid::parse_str(&raw).map_err(|_| ApiError::InvalidId)?),
                    None => None,
                };
                Ok(NewComment { post_id, parent_id, content })
            }
            _ => Err(ApiError::internal("validated payload missing required fields")),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCommentRequest {
    #[validate(
        required(message = "content is required"),
        length(min = 1, max = 1000, message = "must be between 1 and 1000 characters")
    )]
    pub content: Option<String>,
}

impl UpdateCommentRequest {
    pub fn into_content(self) -> Result<String, ApiError> {
        self.content
            .ok_or_else(|| ApiError::internal("validated payload missing required fields"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_names(errors: &[FieldError]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn empty_registration_reports_every_missing_field() {
        let req: RegisterRequest = serde_json::from_str("{}").expect("deserialize");
        let errors = req.validate().expect_err("must fail");
        let flat = flatten_errors(&errors);
        let fields = field_names(&flat);
        for expected in ["confirmPassword", "email", "firstName", "lastName", "password", "username"] {
            assert!(fields.contains(&expected), "missing error for {expected}: {fields:?}");
        }
    }

    #[test]
    fn bad_formats_collect_in_one_pass() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "not-an-email",
            "username": "ab",
            "firstName": "A",
            "lastName": "B",
            "avatar": "not a url",
            "password": "short",
            "confirmPassword": "short"
        }))
        .expect("deserialize");
        let flat = flatten_errors(&req.validate().expect_err("must fail"));
        let fields = field_names(&flat);
        assert!(fields.contains(&"email"));
        assert!(fields.contains(&"username"));
        assert!(fields.contains(&"avatar"));
        assert!(fields.contains(&"password"));
        assert!(!fields.contains(&"firstName"));
    }

    #[test]
    fn password_confirmation_must_match() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "a@b.co",
            "username": "alice",
            "firstName": "Alice",
            "lastName": "Smith",
            "password": "secret1",
            "confirmPassword": "secret2"
        }))
        .expect("deserialize");
        let flat = flatten_errors(&req.validate().expect_err("must fail"));
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].field, "confirmPassword");
        assert_eq!(flat[0].message, "Passwords don't match");
    }

    #[test]
    fn password_mismatch_reports_alongside_field_errors() {
        // Cross-field check is not skipped when other constraints also fail
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "a@b.co",
            "username": "ab",
            "firstName": "Alice",
            "lastName": "Smith",
            "password": "secret1",
            "confirmPassword": "secret2"
        }))
        .expect("deserialize");
        let flat = flatten_errors(&req.validate().expect_err("must fail"));
        let fields = field_names(&flat);
        assert!(fields.contains(&"username"));
        assert!(fields.contains(&"confirmPassword"), "{fields:?}");
    }

    #[test]
    fn extraneous_fields_are_dropped() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "a@b.co",
            "username": "alice",
            "firstName": "Alice",
            "lastName": "Smith",
            "password": "secret1",
            "confirmPassword": "secret1",
            "isAdmin": true,
            "role": "superuser"
        }))
        .expect("deserialize");
        assert!(req.validate().is_ok());
        let registration = req.into_registration().expect("registration");
        assert_eq!(registration.username, "alice");
    }

    #[test]
    fn comment_requires_uuid_post_id() {
        let req: CreateCommentRequest = serde_json::from_value(serde_json::json!({
            "content": "hello",
            "postId": "not-a-uuid"
        }))
        .expect("deserialize");
        let flat = flatten_errors(&req.validate().expect_err("must fail"));
        assert_eq!(flat[0].field, "postId");
        assert_eq!(flat[0].message, "must be a valid UUID");
    }

    #[test]
    fn update_post_accepts_partial_payloads() {
        let req: UpdatePostRequest = serde_json::from_value(serde_json::json!({
            "published": true
        }))
        .expect("deserialize");
        assert!(req.validate().is_ok());
        let patch = req.into_patch();
        assert!(patch.title.is_none());
        assert_eq!(patch.published, Some(true));
    }

    #[test]
    fn update_post_still_checks_present_fields() {
        let req: UpdatePostRequest = serde_json::from_value(serde_json::json!({
            "title": ""
        }))
        .expect("deserialize");
        let flat = flatten_errors(&req.validate().expect_err("must fail"));
        assert_eq!(flat[0].field, "title");
    }
}
