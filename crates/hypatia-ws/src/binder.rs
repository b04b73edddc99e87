//! Binding of path and query parameters to the request body.

use hypatia_core::{
    BindError, FrameworkErrorEvent, FrameworkErrorGenerator, WsFrameworkError, WsParams,
};
use std::sync::Arc;

/// Binds one parameter to one named field of a body.
///
/// This is [`ParamTarget::bind_field`](hypatia_core::ParamTarget::bind_field)
/// for the body type, captured when the handler is built.
pub type BindFn<B> = fn(&mut B, &str, &WsParams, &str) -> Result<(), BindError>;

/// Binds request parameters to body fields, reporting failures as framework errors.
#[derive(Debug, Clone, Default)]
pub struct ParamBinder {
    generator: Arc<FrameworkErrorGenerator>,
}

impl ParamBinder {
    /// Creates a binder whose error messages come from `generator`.
    #[must_use]
    pub fn new(generator: Arc<FrameworkErrorGenerator>) -> Self {
        Self { generator }
    }

    /// Returns the error message generator.
    #[must_use]
    pub fn generator(&self) -> &FrameworkErrorGenerator {
        &self.generator
    }

    /// Binds path values to fields by position.
    ///
    /// `params` must have been built with [`WsParams::for_path`], so the
    /// value at position `i` is bound to the `i`th parameter name.
    pub fn bind_path<B>(
        &self,
        bind: BindFn<B>,
        params: &WsParams,
        body: &mut B,
    ) -> Vec<WsFrameworkError> {
        let mut errors = Vec::new();

        for (position, field) in params.param_names().iter().enumerate() {
            let key = position.to_string();
            let Err(e) = bind(body, field, params, &key) else {
                continue;
            };

            let value = params.string_value(&key).unwrap_or_default().to_string();
            let expected = expected_type(&e);
            let (message, code) = self
                .generator
                .message_code(FrameworkErrorEvent::PathWrongType, &[field.as_str(), expected]);

            errors.push(
                WsFrameworkError::path_bind(message, code, field.as_str())
                    .with_value(value)
                    .with_position(position),
            );
        }

        errors
    }

    /// Binds query parameters to fields.
    ///
    /// `targets` pairs each field name with the parameter that supplies it.
    /// Parameters that were not supplied are skipped.
    pub fn bind_query<B>(
        &self,
        bind: BindFn<B>,
        targets: &[(String, String)],
        params: &WsParams,
        body: &mut B,
    ) -> Vec<WsFrameworkError> {
        let mut errors = Vec::new();

        for (field, param) in targets {
            if !params.exists(param) {
                continue;
            }

            let (event, args): (FrameworkErrorEvent, Vec<&str>) =
                match bind(body, field, params, param) {
                    Ok(()) | Err(BindError::Missing) => continue,
                    Err(BindError::NoSuchField(_)) => {
                        (FrameworkErrorEvent::QueryNoTargetField, vec![param.as_str()])
                    }
                    Err(BindError::NotAList) => {
                        (FrameworkErrorEvent::QueryTargetNotArray, vec![param.as_str()])
                    }
                    Err(BindError::WrongType { expected, .. }) => {
                        (FrameworkErrorEvent::QueryWrongType, vec![param.as_str(), expected])
                    }
                };

            let (message, code) = self.generator.message_code(event, &args);
            let mut error = WsFrameworkError::query_bind(message, code, param.as_str(), field.as_str());
            if let Ok(values) = params.string_values(param) {
                error = error.with_value(values.join(","));
            }
            errors.push(error);
        }

        errors
    }

    /// Returns query targets that bind each field from the parameter of the same name.
    #[must_use]
    pub fn auto_query_targets(fields: &[&str]) -> Vec<(String, String)> {
        fields
            .iter()
            .map(|f| ((*f).to_string(), (*f).to_string()))
            .collect()
    }
}

fn expected_type(error: &BindError) -> &'static str {
    match error {
        BindError::WrongType { expected, .. } => expected,
        BindError::NotAList => "a single value",
        BindError::NoSuchField(_) | BindError::Missing => "a bindable value",
    }
}
