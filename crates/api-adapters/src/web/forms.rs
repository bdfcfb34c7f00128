//! Request shapes. Missing text fields read as empty strings so the services
//! report them with their own field-specific messages.

use std::collections::HashMap;

use axum::extract::Multipart;
use domains::Upload;
use serde::Deserialize;

use super::error::ApiError;

/// Name of the multipart field carrying an attachment.
pub const IMAGE_FIELD: &str = "image";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteThreadRequest {
    pub username: String,
    pub password: String,
    pub title: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteCommentRequest {
    pub username: String,
    pub password: String,
    #[serde(rename = "commentID")]
    pub comment_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LikeRequest {
    pub username: String,
    pub password: String,
    pub comment: Option<String>,
    pub thread: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UsernameQuery {
    pub username: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostQuery {
    pub post_id: String,
}

/// `amount` is a page size or `All`; `page` is 1-based.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DumpQuery {
    pub amount: Option<String>,
    pub page: Option<String>,
    pub order: Option<String>,
}

/// A fully-read multipart body: text fields by name plus the optional image.
#[derive(Debug, Default)]
pub struct PostForm {
    fields: HashMap<String, String>,
    image: Option<Upload>,
}

impl PostForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            if name == IMAGE_FIELD {
                let file_name = field.file_name().map(str::to_owned);
                let content_type = field.content_type().and_then(|ct| ct.parse::<mime::Mime>().ok());
                let data = field.bytes().await?;
                if !data.is_empty() {
                    form.image = Some(Upload {
                        data,
                        content_type,
                        file_name,
                    });
                }
            } else {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    /// The field's value, or `""` when absent.
    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    pub fn flag(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    pub fn take_image(&mut self) -> Option<Upload> {
        self.image.take()
    }
}
