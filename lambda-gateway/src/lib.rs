#![doc = include_str!("../../README.md")]
#![warn(missing_docs)]

// These are documented public exports since handlers and callers of `serve` depend on them.
pub use aws_lambda_events::apigw::ApiGatewayProxyRequestContext;
pub use http::{Extensions, Method, StatusCode};
pub use lambda_runtime::{Context as LambdaContext, LambdaEvent};

mod config;

pub use config::{Config, HOST_ENV_VAR};

/// Error handling.
pub mod error;

pub use error::EventError;

mod handler;

pub use handler::{Handler, NotFoundHandler};

/// API Gateway proxy event and response models.
pub mod models;

pub use models::{GatewayProxyRequest, GatewayProxyResponse};

mod multimap;

pub use multimap::MultiMap;

mod request;

pub use request::{Body, InvocationContext, Request, RequestUrl};

mod response;

pub use response::{Completion, ResponseRecorder, ResponseWriter, DEFAULT_CONTENT_TYPE};

mod runtime;

pub use runtime::{handle_event, serve, serve_with_config};
