//! Template rendering seam.

use sweep_params::Context;

use crate::prelude::*;

/// Collaborator seam for template rendering.
///
/// Treated as a pure function of the template text and the point context;
/// any failure surfaces as a staging error.
pub trait Renderer: Send + Sync {
    /// Render `template` against `ctx`.
    fn render(&self, template: &str, ctx: &Context) -> Result<String>;
}

/// Built-in renderer: substitutes `${name}` references from the context.
///
/// Used for staged template files in the absence of an external template
/// engine, and for command-argument and log-directory interpolation.
#[derive(Debug, Clone, Copy, Default)]
pub struct VarRenderer;

impl Renderer for VarRenderer {
    fn render(&self, template: &str, ctx: &Context) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or(Error::UnterminatedVariable)?;
            let name = &after[..end];
            let value = ctx.get(name).ok_or_else(|| Error::UnknownVariable {
                name: name.to_string(),
            })?;
            out.push_str(&value.to_string());
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweep_params::Value;

    fn ctx() -> Context {
        let mut ctx = Context::new();
        ctx.insert("n".into(), Value::Int(4));
        ctx.insert("label".into(), Value::Str("fine".into()));
        ctx
    }

    #[test]
    fn substitutes_all_references() {
        let text = VarRenderer.render("mesh-${label}-${n}.cfg", &ctx()).unwrap();
        assert_eq!(text, "mesh-fine-4.cfg");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(VarRenderer.render("counts: 1", &ctx()).unwrap(), "counts: 1");
    }

    #[test]
    fn unknown_variable_is_an_error() {
        assert!(matches!(
            VarRenderer.render("${missing}", &ctx()),
            Err(Error::UnknownVariable { .. })
        ));
    }

    #[test]
    fn unterminated_reference_is_an_error() {
        assert!(matches!(
            VarRenderer.render("${n", &ctx()),
            Err(Error::UnterminatedVariable)
        ));
    }
}
