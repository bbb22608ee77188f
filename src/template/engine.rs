use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, JsonTruthy, Output, RenderContext,
    RenderErrorReason, Renderable,
};
use thiserror::Error;

use super::types::TemplateContext;

#[derive(Error, Debug)]
pub enum TemplateError {
    /// Malformed template. Only the offending file is skipped.
    #[error("Template syntax error: {0}")]
    Syntax(String),

    /// Reference to a variable missing from the context. Aborts the run.
    #[error("Undefined variable in template: {0}")]
    UndefinedVariable(String),

    /// Any other failure while rendering a well-formed template.
    #[error("Render error: {0}")]
    Render(String),
}

impl TemplateError {
    /// Whether the whole run must stop
    pub fn is_fatal(&self) -> bool {
        matches!(self, TemplateError::UndefinedVariable(_))
    }
}

/// Strict-mode handlebars renderer
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        // Rendered output is configuration, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        // Strict mode does not cover the built-in conditionals
        handlebars.register_helper("if", Box::new(StrictConditional { positive: true }));
        handlebars.register_helper("unless", Box::new(StrictConditional { positive: false }));
        Self { handlebars }
    }

    /// Render `content` against `context`
    pub fn render(&self, content: &str, context: &TemplateContext) -> Result<String, TemplateError> {
        self.handlebars
            .render_template(content, context)
            .map_err(|e| {
                let message = e.to_string();
                match e.reason() {
                    RenderErrorReason::MissingVariable(_) => {
                        TemplateError::UndefinedVariable(message)
                    }
                    RenderErrorReason::TemplateError(_) => TemplateError::Syntax(message),
                    _ => TemplateError::Render(message),
                }
            })
    }
}

/// `if` / `unless` that refuse to test a variable missing from the context
struct StrictConditional {
    positive: bool,
}

impl HelperDef for StrictConditional {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let name = if self.positive { "if" } else { "unless" };
        let param = h
            .param(0)
            .ok_or(RenderErrorReason::ParamNotFoundForIndex(name, 0))?;
        if param.is_value_missing() {
            let path = param.relative_path().cloned();
            return Err(RenderErrorReason::MissingVariable(path).into());
        }

        let include_zero = h
            .hash_get("includeZero")
            .and_then(|v| v.value().as_bool())
            .unwrap_or(false);
        let truthy = param.value().is_truthy(include_zero);

        let branch = if truthy == self.positive {
            h.template()
        } else {
            h.inverse()
        };
        match branch {
            Some(t) => t.render(r, ctx, rc, out),
            None => Ok(()),
        }
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}
