//! Request router and validator for the security controls collection.
//!
//! An invocation carries a route identifier, optional path parameters and an
//! optional raw JSON body. Dispatch is an exact string match on the route
//! identifier against a closed set of operations; everything else is
//! rejected with a 400. Failures past validation are caught once at the
//! [`RequestHandler::handle`] boundary and reported as a 500 envelope.

use std::{collections::HashMap, sync::Arc};

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{
    error::{RegistryError, RegistryResult},
    store::{ControlStore, SecurityControl, REQUIRED_FIELDS},
};

/// Invocation descriptor: `{routeKey, pathParameters, body}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    #[serde(rename = "routeKey")]
    pub route_key: String,
    #[serde(rename = "pathParameters", default)]
    pub path_parameters: PathParameters,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathParameters {
    #[serde(rename = "mainID", default)]
    pub main_id: Option<String>,
}

/// Response descriptor: `{statusCode, headers, body}` with the body already
/// serialized to a JSON string.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl ResponseEnvelope {
    fn with_value(status: StatusCode, body: &Value) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status_code: status.as_u16(),
            headers,
            // Serializing a serde_json::Value cannot fail
            body: serde_json::to_string(body).unwrap(),
        }
    }

    /// Plain string body, e.g. `"Deleted item C-1"`
    fn text(status: StatusCode, text: String) -> Self {
        Self::with_value(status, &Value::String(text))
    }

    /// `{"message": ...}` body used by the creation validation path
    fn message(status: StatusCode, text: String) -> Self {
        Self::with_value(status, &json!({ "message": text }))
    }
}

/// Closed enumeration of the supported operations. Anything that does not
/// match one of the five route identifiers exactly falls into the
/// unsupported arm of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteKey {
    DeleteItem,
    GetItem,
    ListItems,
    CreateItem,
    UpdateItem,
}

impl RouteKey {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "DELETE /items/{mainID}" => Some(RouteKey::DeleteItem),
            "GET /items/{mainID}" => Some(RouteKey::GetItem),
            "GET /items" => Some(RouteKey::ListItems),
            "PUT /items" => Some(RouteKey::CreateItem),
            "POST /items/{mainID}" => Some(RouteKey::UpdateItem),
            _ => None,
        }
    }
}

/// Creation payload. Fields are optional so that presence and emptiness can
/// be reported per field; extra body fields are ignored here since they only
/// enter the collection via partial update.
#[derive(Debug, Deserialize)]
struct CreateControl {
    #[serde(rename = "mainID", default)]
    main_id: Option<String>,
    #[serde(rename = "mainDescription", default)]
    main_description: Option<String>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl CreateControl {
    /// Required fields that are absent or empty, in reporting order
    fn missing_fields(&self) -> Vec<&'static str> {
        let values = [
            &self.main_id,
            &self.main_description,
            &self.domain,
            &self.scope,
        ];
        REQUIRED_FIELDS
            .iter()
            .zip(values)
            .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
            .map(|(name, _)| *name)
            .collect()
    }
}

pub struct RequestHandler {
    store: Arc<dyn ControlStore>,
}

impl RequestHandler {
    pub fn new(store: Arc<dyn ControlStore>) -> Self {
        Self { store }
    }

    /// Handle one invocation. Never panics past this boundary: any error the
    /// dispatcher propagates becomes a 500 envelope carrying the message.
    pub async fn handle(&self, event: &Event) -> ResponseEnvelope {
        log::debug!("handling event: {event:?}");
        match self.dispatch(event).await {
            Ok(response) => response,
            Err(err) => {
                log::error!("request failed: {err}");
                ResponseEnvelope::text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("An error occurred: {err}"),
                )
            }
        }
    }

    async fn dispatch(&self, event: &Event) -> RegistryResult<ResponseEnvelope> {
        let Some(route) = RouteKey::parse(&event.route_key) else {
            return Ok(ResponseEnvelope::text(
                StatusCode::BAD_REQUEST,
                format!("Unsupported route: {}", event.route_key),
            ));
        };

        match route {
            RouteKey::DeleteItem => self.delete_item(event).await,
            RouteKey::GetItem => self.get_item(event).await,
            RouteKey::ListItems => self.list_items().await,
            RouteKey::CreateItem => self.create_item(event).await,
            RouteKey::UpdateItem => self.update_item(event).await,
        }
    }

    fn main_id<'a>(&self, event: &'a Event) -> RegistryResult<&'a str> {
        event
            .path_parameters
            .main_id
            .as_deref()
            .ok_or_else(|| RegistryError::Request("missing path parameter mainID".to_string()))
    }

    fn body<'a>(&self, event: &'a Event) -> RegistryResult<&'a str> {
        event
            .body
            .as_deref()
            .ok_or_else(|| RegistryError::Request("missing request body".to_string()))
    }

    async fn delete_item(&self, event: &Event) -> RegistryResult<ResponseEnvelope> {
        let main_id = self.main_id(event)?;
        self.store.delete(main_id).await?;
        Ok(ResponseEnvelope::text(
            StatusCode::OK,
            format!("Deleted item {main_id}"),
        ))
    }

    async fn get_item(&self, event: &Event) -> RegistryResult<ResponseEnvelope> {
        let main_id = self.main_id(event)?;
        let item = self.store.get(main_id).await?.unwrap_or_default();
        Ok(ResponseEnvelope::with_value(
            StatusCode::OK,
            &Value::Object(item),
        ))
    }

    async fn list_items(&self) -> RegistryResult<ResponseEnvelope> {
        let items = self.store.scan().await?;
        let body = Value::Array(items.into_iter().map(Value::Object).collect());
        Ok(ResponseEnvelope::with_value(StatusCode::OK, &body))
    }

    async fn create_item(&self, event: &Event) -> RegistryResult<ResponseEnvelope> {
        let payload: CreateControl = serde_json::from_str(self.body(event)?)?;

        let missing = payload.missing_fields();
        if !missing.is_empty() {
            return Ok(ResponseEnvelope::message(
                StatusCode::BAD_REQUEST,
                format!("Missing required fields: {}", missing.join(", ")),
            ));
        }

        let control = SecurityControl {
            main_id: payload.main_id.unwrap_or_default(),
            domain: payload.domain.unwrap_or_default(),
            main_description: payload.main_description.unwrap_or_default(),
            scope: payload.scope.unwrap_or_default(),
        };

        // Uniqueness is case-insensitive, so compare against the whole
        // collection rather than a single exact-key lookup.
        let main_id_lower = control.main_id.to_lowercase();
        let duplicate = self.store.scan().await?.into_iter().any(|item| {
            item.get("mainID")
                .and_then(Value::as_str)
                .is_some_and(|id| id.to_lowercase() == main_id_lower)
        });
        if duplicate {
            return Ok(ResponseEnvelope::message(
                StatusCode::BAD_REQUEST,
                format!("Duplicate mainID found: {}", control.main_id),
            ));
        }

        self.store.put(&control).await?;
        Ok(ResponseEnvelope::text(
            StatusCode::CREATED,
            format!("Put item {}", control.main_id),
        ))
    }

    async fn update_item(&self, event: &Event) -> RegistryResult<ResponseEnvelope> {
        let main_id = self.main_id(event)?;
        let payload: Map<String, Value> = serde_json::from_str(self.body(event)?)?;

        // mainID is the key and is never reassigned; every other body key
        // becomes one field assignment, applied in a single store call.
        let fields: Map<String, Value> = payload
            .into_iter()
            .filter(|(key, _)| key != "mainID")
            .collect();

        if fields.is_empty() {
            return Ok(ResponseEnvelope::text(
                StatusCode::OK,
                format!("No updates for item {main_id}"),
            ));
        }

        self.store.update(main_id, &fields).await?;
        Ok(ResponseEnvelope::text(
            StatusCode::OK,
            format!("Updated item {main_id}"),
        ))
    }
}
