// Template engine for the page wrapper, page headings and index entries.
//
// Every function here is pure: it returns text and never touches the disk.

use crate::error::Result;
use crate::registry::{flatten_id, ModuleRecord};
use std::collections::HashMap;
use tera::{Context, Tera, Value};

/// Template engine wrapping Tera with the embedded site templates
pub struct TemplateEngine {
    tera: Tera,
    site_name: String,
    page_prefix: String,
    separator: char,
}

impl TemplateEngine {
    /// Create a new template engine with embedded templates
    pub fn new(site_name: impl Into<String>, page_prefix: impl Into<String>, separator: char) -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_templates(vec![
            ("header.html", include_str!("../../templates/header.html.tera")),
            ("footer.html", include_str!("../../templates/footer.html.tera")),
            ("page_heading.html", include_str!("../../templates/page_heading.html.tera")),
            ("index_open.html", include_str!("../../templates/index_open.html.tera")),
            ("index_entry.html", include_str!("../../templates/index_entry.html.tera")),
            ("index_close.html", include_str!("../../templates/index_close.html.tera")),
        ])?;

        // Titles, descriptions and license text go in verbatim
        tera.autoescape_on(vec![]);
        tera.register_filter("flatten", flatten_filter);

        Ok(Self {
            tera,
            site_name: site_name.into(),
            page_prefix: page_prefix.into(),
            separator,
        })
    }

    /// Document prologue up to the opening page container
    pub fn render_header(&self, title: &str) -> Result<String> {
        let mut context = Context::new();
        context.insert("title", title);
        Ok(self.tera.render("header.html", &context)?)
    }

    /// Closing block with the license embedded in a `<pre>`
    pub fn render_footer(&self, license: &str) -> Result<String> {
        let mut context = Context::new();
        context.insert("license", license);
        Ok(self.tera.render("footer.html", &context)?)
    }

    /// Header plus the `<h1>` heading of a package page
    pub fn render_page_header(&self, package: &ModuleRecord) -> Result<String> {
        let title = format!("{} &ndash; package {}", self.site_name, package.id);
        let mut html = self.render_header(&title)?;
        // The heading shares the header's line
        let len = html.trim_end_matches('\n').len();
        html.truncate(len);

        let mut context = self.site_context();
        context.insert("package", package);
        html.push_str(&self.tera.render("page_heading.html", &context)?);

        Ok(html)
    }

    /// One `<dd>` entry linking to the package page
    pub fn render_index_entry(&self, package: &ModuleRecord) -> Result<String> {
        let mut context = self.site_context();
        context.insert("package", package);
        Ok(self.tera.render("index_entry.html", &context)?)
    }

    /// Header, heading and listing opener of the index page
    pub fn render_index_header(&self) -> Result<String> {
        let title = format!("{} &ndash; Documentation", self.site_name);
        let mut html = self.render_header(&title)?;
        html.push_str(&self.tera.render("index_open.html", &self.site_context())?);
        Ok(html)
    }

    /// Closes the listing opened by [`render_index_header`](Self::render_index_header)
    pub fn render_index_close(&self) -> Result<String> {
        Ok(self.tera.render("index_close.html", &self.site_context())?)
    }

    fn site_context(&self) -> Context {
        let mut context = Context::new();
        context.insert("site", &self.site_name);
        context.insert("prefix", &self.page_prefix);
        context.insert("separator", &self.separator.to_string());
        context
    }
}

/// Replace `/` in a package identifier with the `sep` argument (default `-`)
fn flatten_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let id = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("flatten expects a string"))?;
    let separator = args
        .get("sep")
        .and_then(|v| v.as_str())
        .and_then(|s| s.chars().next())
        .unwrap_or('-');
    Ok(Value::String(flatten_id(id, separator)))
}
