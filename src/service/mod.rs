//! HTTP surface for the registry.
//!
//! Translates each HTTP request into the handler's invocation descriptor:
//! the matched path template plus the method become the route identifier,
//! matchit parameters become path parameters, and the drained request body
//! becomes the raw body. Unmatched paths keep their literal path so the
//! handler answers them with its unsupported-route rejection.

use std::{error::Error, sync::Arc};

use async_trait::async_trait;
use http::{Method, Response, StatusCode};
use matchit::{Match, Router};
use pingora::{
    apps::http_app::ServeHttp, protocols::http::ServerSession, services::listening::Service,
};
use pingora_core::listeners::tls::TlsSettings;

use crate::{
    config::Config,
    handler::{Event, PathParameters, RequestHandler, ResponseEnvelope},
    store::etcd::EtcdStore,
};

const ITEMS: &str = "/items";
const ITEM_BY_ID: &str = "/items/{mainID}";

pub struct RegistryHttpApp {
    handler: RequestHandler,
    router: Router<&'static str>,
}

impl RegistryHttpApp {
    pub fn new(cfg: &Config) -> Self {
        let store = Arc::new(EtcdStore::new(cfg.etcd.clone()));

        let mut router = Router::new();
        router.insert(ITEMS, ITEMS).unwrap();
        router.insert(ITEM_BY_ID, ITEM_BY_ID).unwrap();

        Self {
            handler: RequestHandler::new(store),
            router,
        }
    }

    /// Build the invocation descriptor for a method/path pair. The body is
    /// attached by the caller after draining the session.
    fn resolve(&self, method: &Method, path: &str) -> Event {
        match self.router.at(path) {
            Ok(Match { value, params }) => Event {
                route_key: format!("{method} {value}"),
                path_parameters: PathParameters {
                    main_id: params.get("mainID").map(str::to_string),
                },
                body: None,
            },
            Err(_) => Event {
                route_key: format!("{method} {path}"),
                path_parameters: PathParameters::default(),
                body: None,
            },
        }
    }
}

#[async_trait]
impl ServeHttp for RegistryHttpApp {
    async fn response(&self, http_session: &mut ServerSession) -> Response<Vec<u8>> {
        http_session.set_keepalive(None);

        let (path, method) = {
            let req_header = http_session.req_header();
            (req_header.uri.path().to_string(), req_header.method.clone())
        };

        let mut event = self.resolve(&method, &path);
        match read_request_body(http_session).await {
            Ok(body_data) => {
                if !body_data.is_empty() {
                    event.body = Some(String::from_utf8_lossy(&body_data).into_owned());
                }
            }
            Err(e) => {
                return Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(e.to_string().into_bytes())
                    .unwrap()
            }
        }

        let envelope = self.handler.handle(&event).await;
        into_http_response(envelope)
    }
}

fn into_http_response(envelope: ResponseEnvelope) -> Response<Vec<u8>> {
    let mut builder = Response::builder().status(envelope.status_code);
    for (name, value) in &envelope.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.body(envelope.body.into_bytes()).unwrap()
}

async fn read_request_body(http_session: &mut ServerSession) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut body_data = Vec::new();
    while let Some(bytes) = http_session.read_request_body().await? {
        body_data.extend_from_slice(&bytes);
    }
    Ok(body_data)
}

pub fn registry_http_service(cfg: &Config) -> Service<RegistryHttpApp> {
    let app = RegistryHttpApp::new(cfg);
    let mut service = Service::new("Registry HTTP".to_string(), app);

    for listener in &cfg.listeners {
        let addr = listener.address.to_string();
        match &listener.tls {
            Some(tls) => {
                let mut settings = TlsSettings::intermediate(&tls.cert_path, &tls.key_path)
                    .expect("Adding TLS listener shouldn't fail");
                if listener.offer_h2 {
                    settings.enable_h2();
                }
                service.add_tls_with_settings(&addr, None, settings);
            }
            None => service.add_tcp(&addr),
        }
    }

    service
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Etcd;

    fn app() -> RegistryHttpApp {
        let cfg = Config {
            etcd: Etcd {
                host: vec!["http://127.0.0.1:2379".to_string()],
                prefix: "/secreg/controls".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        RegistryHttpApp::new(&cfg)
    }

    #[test]
    fn test_resolve_collection_routes() {
        let app = app();

        let event = app.resolve(&Method::GET, "/items");
        assert_eq!("GET /items", event.route_key);
        assert!(event.path_parameters.main_id.is_none());

        let event = app.resolve(&Method::PUT, "/items");
        assert_eq!("PUT /items", event.route_key);
    }

    #[test]
    fn test_resolve_item_routes() {
        let app = app();

        let event = app.resolve(&Method::GET, "/items/C-1");
        assert_eq!("GET /items/{mainID}", event.route_key);
        assert_eq!(Some("C-1"), event.path_parameters.main_id.as_deref());

        let event = app.resolve(&Method::DELETE, "/items/C-1");
        assert_eq!("DELETE /items/{mainID}", event.route_key);

        let event = app.resolve(&Method::POST, "/items/C-1");
        assert_eq!("POST /items/{mainID}", event.route_key);
    }

    #[test]
    fn test_resolve_unmatched_path_keeps_literal_route() {
        let app = app();

        let event = app.resolve(&Method::GET, "/unknown");
        assert_eq!("GET /unknown", event.route_key);
        assert!(event.path_parameters.main_id.is_none());
    }

    #[test]
    fn test_unsupported_method_on_known_path() {
        let app = app();

        // The template matches, but the handler's closed route set rejects it
        let event = app.resolve(&Method::PATCH, "/items/C-1");
        assert_eq!("PATCH /items/{mainID}", event.route_key);
    }
}
