//! Request extractors that report rejections in the API's error format.
//!
//! axum's own `Json` and `Path` answer a malformed body or path segment with
//! a plain-text response. These wrappers run the same extraction and convert
//! the rejection into [`AppError::InvalidRequest`], so clients always get the
//! `{"error":{"code","message"}}` envelope.

use axum::{
    extract::{FromRequest, FromRequestParts},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::AppError;

/// JSON body extractor and response wrapper.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Path parameter extractor.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);
