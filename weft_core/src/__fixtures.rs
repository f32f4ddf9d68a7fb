use crate::MemoryLoader;
use crate::TemplateRegistry;

/// A base layout with a named `head` slot, a default slot, and one style
/// import.
pub fn base_layout() -> &'static str {
	"<import src=\"styles/base.css\" />\n<html>\n<head><slot name=\"head\" /></head>\n<body><slot \
	 /></body>\n</html>\n"
}

/// A post layout that wraps [`base_layout`] and adds its own import.
pub fn post_layout() -> &'static str {
	"---\nlayout: layouts/base.html\n---\n<import src=\"styles/post.css\" />\n<article><slot \
	 /></article>\n"
}

/// A layout that interpolates frontmatter keys.
pub fn titled_layout() -> &'static str {
	"<h1>{{ title }}</h1>\n<main><slot /></main>\n"
}

/// A minimal page declaring [`base_layout`] as its layout.
pub fn base_page() -> &'static str {
	"---\nlayout: layouts/base.html\ntitle: Hello\n---\n<p>Hi!</p>\n"
}

/// A registry preloaded with the base and post layouts.
pub fn fixture_registry() -> TemplateRegistry {
	let registry = TemplateRegistry::new();
	registry
		.register("layouts/base.html", base_layout())
		.expect("base layout parses");
	registry
		.register("layouts/post.html", post_layout())
		.expect("post layout parses");
	registry
}

/// A loader holding the fixture layouts, for cache-miss paths.
pub fn fixture_loader() -> MemoryLoader {
	let mut loader = MemoryLoader::new();
	loader.insert("layouts/base.html", base_layout());
	loader.insert("layouts/post.html", post_layout());
	loader
}
