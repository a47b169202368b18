// Rendering of resolved shortcodes as inline preview links.

use askama::Template;

use super::resolve::Resolved;

#[derive(Template)]
#[template(
    source = r#"<a href="{{ url|safe }}" class="shortcode-link" data-preview-type="{{ code|safe }}" data-preview-id="{{ id }}">{{ name }}</a>"#,
    ext = "html"
)]
struct LinkTemplate<'a> {
    url: String,
    code: &'a str,
    id: i64,
    name: &'a str,
}

/// `<a>` tag pointing at the entity's detail view. The stored display name
/// is used, so the link shows canonical casing rather than what was typed.
pub fn render_link(entity: &Resolved) -> askama::Result<String> {
    LinkTemplate {
        url: entity.kind.detail_url(entity.id),
        code: entity.kind.code(),
        id: entity.id,
        name: &entity.display_name,
    }
    .render()
}
