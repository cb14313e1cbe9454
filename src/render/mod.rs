//! Template rendering
//!
//! Tera engine seeded from templates embedded in the binary. Covers the
//! HTML pages, the XML feed, and the stub files written into newly created
//! article gists.

use anyhow::{Context, Result};
use rust_embed::RustEmbed;
use tera::Tera;

/// Templates compiled into the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
struct EmbeddedTemplates;

/// Template engine
pub struct Templates {
    tera: Tera,
}

impl Templates {
    /// Load all embedded templates
    pub fn new() -> Result<Self> {
        let mut sources = Vec::new();
        for name in EmbeddedTemplates::iter() {
            let file = EmbeddedTemplates::get(&name)
                .with_context(|| format!("Missing embedded template: {}", name))?;
            let source = std::str::from_utf8(file.data.as_ref())
                .with_context(|| format!("Template is not UTF-8: {}", name))?
                .to_string();
            sources.push((name.to_string(), source));
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(sources)
            .context("Failed to compile templates")?;

        Ok(Self { tera })
    }

    /// Render a template by name
    pub fn render(&self, name: &str, context: &tera::Context) -> Result<String> {
        self.tera
            .render(name, context)
            .with_context(|| format!("Failed to render template: {}", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_templates_compile() {
        Templates::new().expect("embedded templates should compile");
    }

    #[test]
    fn test_render_error_page() {
        let templates = Templates::new().unwrap();
        let mut context = tera::Context::new();
        context.insert("site_name", "Gistpress");
        let html = templates.render("error.html", &context).unwrap();
        assert!(html.contains("wrong"));
    }

    #[test]
    fn test_render_gist_stub() {
        let templates = Templates::new().unwrap();
        let mut context = tera::Context::new();
        context.insert("title", "My Post");
        context.insert("summary", "About things");
        context.insert("username", "alice");
        let markdown = templates.render("gist/article_stub.md", &context).unwrap();
        assert!(markdown.contains("My Post"));
        assert!(markdown.contains("About things"));
    }
}
