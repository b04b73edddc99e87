//! Wiring of configured components.

use std::sync::Arc;

use hypatia_core::{FrameworkErrorGenerator, ParamTarget, ServiceErrorFinder, ServiceErrorManager};
use hypatia_ws::{
    BodyOrErrorWrapper, JsonMarshalingWriter, JsonResponseWrapper, Logic,
    MarshallingResponseWriter, ResponseWrapper, ResponseWriter, WsHandlerBuilder,
};

use crate::{ConfigError, HandlerConfig, WrapMode, WsFacilityConfig};

/// The shared components every web service handler needs, built from
/// [`WsFacilityConfig`].
///
/// # Example
///
/// ```
/// use hypatia_config::{WsFacility, WsFacilityConfig};
///
/// let facility = WsFacility::from_config(&WsFacilityConfig::default()).unwrap();
/// assert_eq!(facility.error_manager().len(), 0);
/// ```
#[derive(Clone)]
pub struct WsFacility {
    error_manager: Arc<ServiceErrorManager>,
    framework_errors: Arc<FrameworkErrorGenerator>,
    response_writer: Arc<MarshallingResponseWriter>,
    handler_defaults: HandlerConfig,
}

impl std::fmt::Debug for WsFacility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsFacility")
            .field("service_errors", &self.error_manager.len())
            .field("handler_defaults", &self.handler_defaults)
            .finish_non_exhaustive()
    }
}

impl WsFacility {
    /// Builds the error finder, framework error generator and JSON response
    /// writer described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(config: &WsFacilityConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let error_manager = ServiceErrorManager::from_definitions(config.service_errors.clone())?;

        let mut generator = FrameworkErrorGenerator::new();
        for (event, message) in &config.framework_errors.messages {
            generator = generator.with_message(*event, message.clone());
        }
        for (status, message) in config.framework_errors.http_statuses()? {
            generator = generator.with_http_message(status, message);
        }
        let framework_errors = Arc::new(generator);

        let writer_config = &config.response_writer;
        let wrapper: Arc<dyn ResponseWrapper> = match writer_config.wrap_mode {
            WrapMode::Wrap => Arc::new(JsonResponseWrapper::new(
                writer_config.wrapper.body_field.clone(),
                writer_config.wrapper.errors_field.clone(),
            )),
            WrapMode::Body => Arc::new(BodyOrErrorWrapper),
        };
        let marshaller = if writer_config.marshal.pretty_print {
            JsonMarshalingWriter::pretty(writer_config.marshal.indent.clone())
        } else {
            JsonMarshalingWriter::new()
        };

        let response_writer = MarshallingResponseWriter::builder()
            .framework_errors(Arc::clone(&framework_errors))
            .default_headers(writer_config.default_headers.clone())
            .response_wrapper(wrapper)
            .marshaling_writer(Arc::new(marshaller))
            .build();

        tracing::info!(
            target: "hypatia::config",
            service_errors = error_manager.len(),
            framework_messages = config.framework_errors.messages.len(),
            wrap_mode = ?writer_config.wrap_mode,
            "Web service facility configured"
        );

        Ok(Self {
            error_manager: Arc::new(error_manager),
            framework_errors,
            response_writer: Arc::new(response_writer),
            handler_defaults: config.handler,
        })
    }

    /// Returns the predefined service errors.
    #[must_use]
    pub fn error_manager(&self) -> &ServiceErrorManager {
        &self.error_manager
    }

    /// Returns the predefined service errors as an error finder.
    #[must_use]
    pub fn error_finder(&self) -> Arc<dyn ServiceErrorFinder> {
        Arc::clone(&self.error_manager) as Arc<dyn ServiceErrorFinder>
    }

    /// Returns the framework error generator.
    #[must_use]
    pub fn framework_errors(&self) -> Arc<FrameworkErrorGenerator> {
        Arc::clone(&self.framework_errors)
    }

    /// Returns the response writer.
    #[must_use]
    pub fn response_writer(&self) -> Arc<dyn ResponseWriter> {
        Arc::clone(&self.response_writer) as Arc<dyn ResponseWriter>
    }

    /// Returns the handler defaults.
    #[must_use]
    pub const fn handler_defaults(&self) -> HandlerConfig {
        self.handler_defaults
    }

    /// Starts a handler wired to the facility's components, applying the
    /// configured authentication requirement.
    pub fn handler<L: Logic>(&self, name: impl Into<String>, logic: L) -> WsHandlerBuilder<L> {
        WsHandlerBuilder::new(name, logic)
            .response_writer(self.response_writer())
            .framework_errors(self.framework_errors())
            .error_finder(self.error_finder())
            .require_authentication(self.handler_defaults.require_authentication)
    }

    /// Like [`handler`](Self::handler), also applying the configured
    /// automatic query binding.
    pub fn binding_handler<L>(&self, name: impl Into<String>, logic: L) -> WsHandlerBuilder<L>
    where
        L: Logic,
        L::Body: ParamTarget,
    {
        self.handler(name, logic)
            .auto_bind_query(self.handler_defaults.auto_bind_query)
    }
}
