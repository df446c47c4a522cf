//! Request and response bodies.

use super::error::ApiError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use garde::Validate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use taskvault::{NewTask, TaskPatch};

const TITLE: TextRule = TextRule {
    label: "Title",
    min: 5,
    max: 100,
};
const DESCRIPTION: TextRule = TextRule {
    label: "Description",
    min: 8,
    max: 250,
};

/// Length bounds for a text field, counted in characters.
struct TextRule {
    label: &'static str,
    min: usize,
    max: usize,
}

impl TextRule {
    fn check(&self, value: &str, required: bool) -> garde::Result {
        let Self { label, min, max } = self;
        let len = value.chars().count();
        if required && len == 0 {
            Err(garde::Error::new(format!("{label} is required")))
        } else if len < *min {
            Err(garde::Error::new(format!(
                "{label} must be at least {min} characters"
            )))
        } else if len > *max {
            Err(garde::Error::new(format!(
                "{label} must not exceed {max} characters"
            )))
        } else {
            Ok(())
        }
    }

    fn check_present(&self, value: &Option<String>) -> garde::Result {
        value
            .as_deref()
            .map_or(Ok(()), |value| self.check(value, false))
    }
}

fn title_rule(value: &str, _: &()) -> garde::Result {
    TITLE.check(value, true)
}

fn description_rule(value: &str, _: &()) -> garde::Result {
    DESCRIPTION.check(value, true)
}

fn optional_title_rule(value: &Option<String>, _: &()) -> garde::Result {
    TITLE.check_present(value)
}

fn optional_description_rule(value: &Option<String>, _: &()) -> garde::Result {
    DESCRIPTION.check_present(value)
}

/// Missing fields decode as empty and are reported as required.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[serde(default)]
    #[garde(custom(title_rule))]
    pub title: String,
    #[serde(default)]
    #[garde(custom(description_rule))]
    pub description: String,
}

/// Fields omitted from the body are left unchanged. Present fields obey the
/// same bounds as on creation.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    #[garde(custom(optional_title_rule))]
    pub title: Option<String>,
    #[serde(default)]
    #[garde(custom(optional_description_rule))]
    pub description: Option<String>,
}

impl From<CreateTaskRequest> for NewTask {
    fn from(req: CreateTaskRequest) -> Self {
        NewTask::new(req.title, req.description)
    }
}

impl From<UpdateTaskRequest> for TaskPatch {
    fn from(req: UpdateTaskRequest) -> Self {
        TaskPatch {
            title: req.title,
            description: req.description,
        }
    }
}

/// Runs garde validation, collecting failures per field.
pub fn validated<T>(body: T) -> Result<T, ApiError>
where
    T: Validate<Context = ()>,
{
    body.validate().map_err(|report| {
        let mut fields = BTreeMap::new();
        for (path, error) in report.iter() {
            fields
                .entry(path.to_string())
                .or_insert_with(|| error.message().to_string());
        }
        ApiError::Validation(fields)
    })?;
    Ok(body)
}

/// Body of every 2xx JSON response.
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    #[serde(skip)]
    status: StatusCode,
    pub message: &'static str,
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn ok(message: &'static str, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message,
            data,
        }
    }

    pub fn created(message: &'static str, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            message,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for SuccessResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
